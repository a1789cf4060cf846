// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node pool, identity, properties, and tree traversal.
//!
//! A *node* is one element of a scene's tree. Each node has:
//!
//! - An identity ([`NodeHandle`]): a generational handle that becomes stale
//!   when the node is deleted.
//! - Topology: parent, first and last child, and sibling links. Parentless
//!   nodes live in the store's root list.
//! - **Properties**: ten four-component float vectors addressed by
//!   [`Property`], any component of which can be animated.
//! - **Attributes**: kind, pivot, anchors, modes, and resource bindings.
//! - **Computed state**: the local transform and adjust scale, written by the
//!   [`adjust`](crate::adjust) pass.
//!
//! # Dirty tracking
//!
//! Transform-affecting mutations mark the
//! [`LOCAL_TRANSFORM`](crate::dirty::LOCAL_TRANSFORM) channel. Position and
//! rotation mark only the node; size, scale, and reparenting also mark the
//! subtree, since children read their parent's adjust frame.

mod attrs;
mod id;
mod props;
mod store;
mod traverse;

pub use attrs::{Flipbook, NodeDesc, TextureBinding};
pub(crate) use attrs::NodeAttrs;
pub use id::{INVALID, NodeHandle};
pub use props::{
    AdjustMode, AdjustReference, AnimationTarget, BlendMode, ClippingMode, NodeFlags, NodeType,
    PieBounds, Pivot, Property, SizeMode, XAnchor, YAnchor,
};
pub use store::NodeStore;
pub use traverse::Children;
pub(crate) use traverse::sibling_indices;
