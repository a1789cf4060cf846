// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained-mode UI scene graph: nodes, animation, layout adjustment,
//! stencil clipping, and draw ordering.
//!
//! `guise_core` owns the state of a game-style UI and turns it into a sorted
//! list of draws each frame. It is `no_std` compatible (with `alloc`) and
//! stores nodes as struct-of-arrays with generational handles. Everything
//! outside the tree (scripting, text shaping, particle simulation, GPU
//! submission) is reached through the traits in [`collab`].
//!
//! # Architecture
//!
//! ```text
//!   Context ──► Scene::update(dt)
//!                  │  script hook, AnimationTable::update, flipbooks,
//!                  │  custom nodes, particle sync, deferred deletion
//!                  ▼
//!               NodeStore (properties, flags, links)
//!                  │
//!   Scene::render ─┤  flush_local_transforms ──► WorldCache
//!                  │  ClipAllocator::run ──► stencil scopes
//!                  │  RenderList::collect ──► RenderKey-sorted entries
//!                  ▼
//!               RenderList::resolve ──► [RenderNode] ──► Renderer
//! ```
//!
//! **[`node`]**: Struct-of-arrays node pool with generational
//! [`NodeHandle`](node::NodeHandle)s, sibling links, and per-node properties.
//!
//! **[`animation`]**: Per-component property animation with easing,
//! playback modes, and completion callbacks.
//!
//! **[`adjust`]**: Local and world transforms, including the adjust modes
//! that map authored coordinates onto the physical screen.
//!
//! **[`clipping`]**: Stencil reference, test, and write masks for clipping
//! subtrees.
//!
//! **[`render`]**: 64-bit [`RenderKey`](render::RenderKey)s and the flattened,
//! sorted draw list.
//!
//! **[`registry`]**: Bounded tables for textures, fonts, particle prototypes,
//! layers, and layouts.
//!
//! **[`scene`]** and **[`context`]**: The public entry points.
//!
//! **[`dirty`]**: Transform invalidation via `understory_dirty`.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! update and render instrumentation, with zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod adjust;
pub mod animation;
pub mod clipping;
pub mod collab;
pub mod config;
pub mod context;
pub mod dirty;
pub mod easing;
pub mod error;
pub mod hash;
pub mod node;
pub mod registry;
pub mod render;
pub mod scene;
pub mod trace;
pub mod transform;

pub use context::{Context, SceneId};
pub use error::{GuiError, Result};
pub use hash::NameHash;
pub use node::NodeHandle;
pub use scene::Scene;
