// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw-list collection and ordering.
//!
//! Once per frame the enabled tree is flattened into [`RenderEntry`] values,
//! each tagged with a 64-bit [`RenderKey`]. Sorting by key gives paint order;
//! the entries are then resolved into [`RenderNode`] records for the
//! [`Renderer`](crate::collab::Renderer).
//!
//! # Key layout
//!
//! ```text
//!   63      42 41  38 37        25 24      17 16    13 12          0
//!  ┌─────────┬──────┬────────────┬──────────┬────────┬─────────────┐
//!  │ unused  │layer │   index    │ clipper  │sublayer│  sub index  │
//!  └─────────┴──────┴────────────┴──────────┴────────┴─────────────┘
//! ```
//!
//! Outside clipping, a node's key is its resolved layer and a running index.
//! A top-level clipper takes one index on layer 0 for its whole subtree; inside
//! it, the `clipper` field counts segments (a new one begins at each nested
//! clipper and again after it), `sublayer` holds the resolved layer, and
//! `sub index` the paint order within the segment. Layers therefore reorder
//! draws only within a clipper, never across its boundary.

use alloc::vec::Vec;
use core::fmt;

use crate::adjust::{WorldCache, boundary_transform, pivot_offset};
use crate::clipping::{ClipAllocator, StencilScope};
use crate::collab::EmitterRenderData;
use crate::node::{INVALID, NodeFlags, NodeHandle, NodeStore, NodeType};
use crate::transform::Transform3d;

const SUB_INDEX_BITS: u32 = 13;
const SUB_LAYER_BITS: u32 = 4;
const CLIPPER_BITS: u32 = 8;
const INDEX_BITS: u32 = 13;
const LAYER_BITS: u32 = 4;

const SUB_LAYER_SHIFT: u32 = SUB_INDEX_BITS;
const CLIPPER_SHIFT: u32 = SUB_LAYER_SHIFT + SUB_LAYER_BITS;
const INDEX_SHIFT: u32 = CLIPPER_SHIFT + CLIPPER_BITS;
const LAYER_SHIFT: u32 = INDEX_SHIFT + INDEX_BITS;

const fn mask(bits: u32) -> u64 {
    (1 << bits) - 1
}

/// Sort key of a draw. Smaller keys paint first.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderKey(pub u64);

#[expect(
    clippy::cast_possible_truncation,
    reason = "accessors read fields masked to at most 13 bits"
)]
impl RenderKey {
    /// Packs the key fields. Values wider than their field are truncated.
    #[must_use]
    pub const fn new(layer: u32, index: u32, clipper: u32, sub_layer: u32, sub_index: u32) -> Self {
        Self(
            (layer as u64 & mask(LAYER_BITS)) << LAYER_SHIFT
                | (index as u64 & mask(INDEX_BITS)) << INDEX_SHIFT
                | (clipper as u64 & mask(CLIPPER_BITS)) << CLIPPER_SHIFT
                | (sub_layer as u64 & mask(SUB_LAYER_BITS)) << SUB_LAYER_SHIFT
                | (sub_index as u64 & mask(SUB_INDEX_BITS)),
        )
    }

    /// Resolved layer, or 0 inside a clipper.
    #[must_use]
    pub const fn layer(self) -> u32 {
        ((self.0 >> LAYER_SHIFT) & mask(LAYER_BITS)) as u32
    }

    /// Top-level paint slot.
    #[must_use]
    pub const fn index(self) -> u32 {
        ((self.0 >> INDEX_SHIFT) & mask(INDEX_BITS)) as u32
    }

    /// Segment within a clipper's subtree.
    #[must_use]
    pub const fn clipper(self) -> u32 {
        ((self.0 >> CLIPPER_SHIFT) & mask(CLIPPER_BITS)) as u32
    }

    /// Resolved layer inside a clipper.
    #[must_use]
    pub const fn sub_layer(self) -> u32 {
        ((self.0 >> SUB_LAYER_SHIFT) & mask(SUB_LAYER_BITS)) as u32
    }

    /// Paint order within a segment.
    #[must_use]
    pub const fn sub_index(self) -> u32 {
        (self.0 & mask(SUB_INDEX_BITS)) as u32
    }
}

impl fmt::Debug for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RenderKey(l{} i{} c{} sl{} si{})",
            self.layer(),
            self.index(),
            self.clipper(),
            self.sub_layer(),
            self.sub_index()
        )
    }
}

/// What an entry draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// The node itself.
    Node,
    /// A clipper's shape, writing stencil bits without color.
    ClipShape,
    /// A clipper's shape, drawn in color.
    ClipVisible,
    /// One emitter of a particle node.
    Emitter,
}

/// One collected draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderEntry {
    /// Node slot index.
    pub node: u16,
    /// Sort key.
    pub key: RenderKey,
    /// Emitter data for [`EntryKind::Emitter`] entries.
    pub emitter: Option<EmitterRenderData>,
    /// What the entry draws.
    pub kind: EntryKind,
}

/// A resolved draw, as handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderNode {
    /// The node to draw.
    pub node: NodeHandle,
    /// Sort key the draw was ordered by.
    pub key: RenderKey,
    /// Maps the node's geometry to screen space.
    ///
    /// Box, pie, template and custom nodes draw the unit square; text nodes
    /// draw in pixels from their pivot; particle nodes use the world
    /// transform as is.
    pub transform: Transform3d,
    /// Effective opacity.
    pub opacity: f32,
    /// Stencil state, or `None` outside every clipper.
    pub stencil: Option<StencilScope>,
    /// Emitter data for particle draws.
    pub emitter: Option<EmitterRenderData>,
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Enter(u16),
    /// Leaves a clipper after its children.
    Exit { node: u16, clipper: u16, layer: u32 },
}

#[derive(Clone, Copy, Debug)]
struct ClipRun {
    index: u32,
    segment: u32,
    sub_index: u32,
    depth: u32,
}

/// Per-scene draw-list scratch.
///
/// Buffers are reused from frame to frame and hold valid data only until
/// the next call to [`collect`](Self::collect).
#[derive(Debug, Default)]
pub struct RenderList {
    entries: Vec<RenderEntry>,
    nodes: Vec<RenderNode>,
    steps: Vec<Step>,
    emitters: Vec<EmitterRenderData>,
    saturated: bool,
}

impl RenderList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected entries, sorted once [`collect`](Self::collect) returns.
    #[must_use]
    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }

    /// Resolved draws from the last [`resolve`](Self::resolve).
    #[must_use]
    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    /// Flattens the enabled tree into sorted entries.
    ///
    /// `clips` must have been [run](ClipAllocator::run) on the same tree; the
    /// key of each clipper's colored draw is written back into it.
    /// `emitters` appends the emitter data of a particle node.
    pub fn collect(
        &mut self,
        store: &NodeStore,
        clips: &mut ClipAllocator,
        mut emitters: impl FnMut(u16, &mut Vec<EmitterRenderData>),
    ) {
        self.entries.clear();
        self.steps.clear();
        self.saturated = false;

        let mut order = 0u32;
        let mut run: Option<ClipRun> = None;
        self.steps.push(Step::Enter(store.root_head));
        while let Some(step) = self.steps.pop() {
            match step {
                Step::Enter(idx) => {
                    if idx == INVALID {
                        continue;
                    }
                    let i = idx as usize;
                    self.steps.push(Step::Enter(store.next_sibling[i]));
                    let flags = store.flags[i];
                    if !flags.contains(NodeFlags::ENABLED) || flags.contains(NodeFlags::PENDING_DELETE) {
                        continue;
                    }
                    let layer = resolve_layer(store, idx);
                    let clipper = clips
                        .clipper_of(idx)
                        .filter(|&c| clips.clippers()[c as usize].node_index == idx);

                    if let Some(c) = clipper {
                        if let Some(r) = run.as_mut() {
                            r.segment += 1;
                            r.sub_index = 0;
                            r.depth += 1;
                        } else {
                            run = Some(ClipRun {
                                index: order,
                                segment: 0,
                                sub_index: 0,
                                depth: 1,
                            });
                            order += 1;
                        }
                        let Some(r) = run.as_mut() else {
                            continue;
                        };
                        let shape = RenderKey::new(0, r.index, r.segment, 0, r.sub_index);
                        r.sub_index += 1;
                        self.entries.push(RenderEntry {
                            node: idx,
                            key: shape,
                            emitter: None,
                            kind: EntryKind::ClipShape,
                        });
                        let visible = flags.contains(NodeFlags::CLIPPING_VISIBLE);
                        if visible && layer == 0 {
                            let key = RenderKey::new(0, r.index, r.segment, 0, r.sub_index);
                            r.sub_index += 1;
                            self.push_visible(clips, c, idx, key);
                        }
                        let exit_layer = if visible { layer } else { 0 };
                        self.steps.push(Step::Exit {
                            node: idx,
                            clipper: c,
                            layer: exit_layer,
                        });
                    } else if store.attrs[i].node_type == NodeType::ParticleFx {
                        self.emitters.clear();
                        emitters(idx, &mut self.emitters);
                        for k in 0..self.emitters.len() {
                            let key = next_key(&mut run, &mut order, layer);
                            self.entries.push(RenderEntry {
                                node: idx,
                                key,
                                emitter: Some(self.emitters[k]),
                                kind: EntryKind::Emitter,
                            });
                        }
                    } else {
                        let key = next_key(&mut run, &mut order, layer);
                        self.entries.push(RenderEntry {
                            node: idx,
                            key,
                            emitter: None,
                            kind: EntryKind::Node,
                        });
                    }
                    self.steps.push(Step::Enter(store.first_child[i]));
                }
                Step::Exit {
                    node,
                    clipper,
                    layer,
                } => {
                    let Some(r) = &mut run else {
                        continue;
                    };
                    if layer != 0 {
                        let key = RenderKey::new(0, r.index, r.segment, layer, r.sub_index);
                        r.sub_index += 1;
                        self.push_visible(clips, clipper, node, key);
                    }
                    r.depth -= 1;
                    if r.depth == 0 {
                        run = None;
                    } else {
                        r.segment += 1;
                        r.sub_index = 0;
                    }
                }
            }
            if let Some(r) = &run {
                self.check_saturation(r.segment, CLIPPER_BITS, "clipper segment");
                self.check_saturation(r.sub_index, SUB_INDEX_BITS, "sub index");
            }
            self.check_saturation(order, INDEX_BITS, "index");
        }
        self.entries.sort_by_key(|e| e.key);
    }

    fn push_visible(&mut self, clips: &mut ClipAllocator, clipper: u16, node: u16, key: RenderKey) {
        clips.clippers_mut()[clipper as usize].visible_render_key = key.0;
        self.entries.push(RenderEntry {
            node,
            key,
            emitter: None,
            kind: EntryKind::ClipVisible,
        });
    }

    fn check_saturation(&mut self, value: u32, bits: u32, field: &str) {
        if !self.saturated && u64::from(value) > mask(bits) + 1 {
            log::warn!("render key {field} saturated ({value} > {}); draw order will be incorrect", mask(bits));
            self.saturated = true;
        }
    }

    /// Resolves sorted entries into draws, dropping those that would not
    /// show.
    ///
    /// Clip shapes are always kept since they write stencil bits. Other
    /// entries are dropped for bones, hidden nodes, and zero opacity.
    /// `size_of` gives the drawn size of a node slot.
    pub fn resolve(
        &mut self,
        store: &NodeStore,
        clips: &ClipAllocator,
        cache: &mut WorldCache,
        size_of: impl Fn(u16) -> [f64; 2],
    ) -> &[RenderNode] {
        self.nodes.clear();
        for entry in &self.entries {
            let i = entry.node as usize;
            let flags = store.flags[i];
            let (world, opacity) = cache.resolve(store, entry.node);
            if entry.kind != EntryKind::ClipShape
                && (flags.contains(NodeFlags::BONE)
                    || !flags.contains(NodeFlags::VISIBLE)
                    || opacity == 0.0)
            {
                continue;
            }
            let attrs = &store.attrs[i];
            let size = size_of(entry.node);
            let transform = match attrs.node_type {
                NodeType::Text => world * pivot_offset(attrs.pivot, size),
                NodeType::ParticleFx => world,
                _ => boundary_transform(world, attrs.pivot, size),
            };
            let governing = clips.clipper_of(entry.node).map(|c| clips.clippers()[c as usize]);
            let stencil = governing.map(|c| match entry.kind {
                EntryKind::ClipShape => StencilScope {
                    color_mask: 0,
                    ..c.scope
                },
                EntryKind::ClipVisible => StencilScope {
                    write_mask: 0,
                    ..c.scope
                },
                EntryKind::Node | EntryKind::Emitter => c.child_scope,
            });
            self.nodes.push(RenderNode {
                node: store.handle_at(entry.node),
                key: entry.key,
                transform,
                opacity,
                stencil,
                emitter: entry.emitter,
            });
        }
        &self.nodes
    }
}

/// The nearest non-default layer index at or above `idx`.
pub(crate) fn resolve_layer(store: &NodeStore, mut idx: u16) -> u32 {
    while idx != INVALID {
        let layer = store.attrs[idx as usize].layer_index;
        if layer != 0 {
            return u32::from(layer);
        }
        idx = store.parent[idx as usize];
    }
    0
}

fn next_key(run: &mut Option<ClipRun>, order: &mut u32, layer: u32) -> RenderKey {
    match run {
        Some(r) => {
            let key = RenderKey::new(0, r.index, r.segment, layer, r.sub_index);
            r.sub_index += 1;
            key
        }
        None => {
            let key = RenderKey::new(layer, *order, 0, 0, 0);
            *order += 1;
            key
        }
    }
}
