// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays node storage with allocation, topology, and property management.

use alloc::vec::Vec;

use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::dirty;
use crate::error::{GuiError, Resource, Result};
use crate::transform::Transform3d;

use super::attrs::NodeAttrs;
use super::id::{INVALID, NodeHandle, next_generation};
use super::props::{NodeFlags, NodeType, Property, default_properties};
use super::traverse::Children;

/// Struct-of-arrays storage for a fixed-size pool of nodes.
///
/// Nodes are addressed by [`NodeHandle`]s. All slots are allocated up front;
/// deleted nodes return their slot to a free list, and per-slot generation
/// counters reject stale handles.
///
/// Sibling lists are intrusive and doubly linked. Parentless nodes form the
/// root list, which the store owns. List order is paint order: the tail of a
/// list is drawn last, on top.
#[derive(Debug)]
pub struct NodeStore {
    // -- Topology --
    pub(crate) parent: Vec<u16>,
    pub(crate) first_child: Vec<u16>,
    pub(crate) last_child: Vec<u16>,
    pub(crate) prev_sibling: Vec<u16>,
    pub(crate) next_sibling: Vec<u16>,
    pub(crate) root_head: u16,
    pub(crate) root_tail: u16,

    // -- Properties --
    pub(crate) properties: Vec<[[f32; 4]; Property::COUNT]>,
    pub(crate) attrs: Vec<NodeAttrs>,
    pub(crate) flags: Vec<NodeFlags>,

    // -- Computed by the adjust pass --
    pub(crate) local_transform: Vec<Transform3d>,
    pub(crate) local_adjust_scale: Vec<[f64; 3]>,

    // -- Allocation --
    pub(crate) generation: Vec<u16>,
    pub(crate) index: Vec<u16>,
    pub(crate) free_list: Vec<u16>,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
}

impl NodeStore {
    /// Creates a store with room for `capacity` nodes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` does not fit below the invalid index `0xffff`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "capacity is clamped below 0xffff"
    )]
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < u32::from(INVALID), "node capacity {capacity} too large");
        let n = capacity as usize;
        let mut free_list: Vec<u16> = (0..capacity as u16).collect();
        // Pop order hands out slot 0 first.
        free_list.reverse();
        Self {
            parent: alloc::vec![INVALID; n],
            first_child: alloc::vec![INVALID; n],
            last_child: alloc::vec![INVALID; n],
            prev_sibling: alloc::vec![INVALID; n],
            next_sibling: alloc::vec![INVALID; n],
            root_head: INVALID,
            root_tail: INVALID,
            properties: alloc::vec![[[0.0; 4]; Property::COUNT]; n],
            attrs: (0..n).map(|_| NodeAttrs::default()).collect(),
            flags: alloc::vec![NodeFlags::empty(); n],
            local_transform: alloc::vec![Transform3d::IDENTITY; n],
            local_adjust_scale: alloc::vec![[1.0; 3]; n],
            generation: alloc::vec![1; n],
            index: alloc::vec![INVALID; n],
            free_list,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        }
    }

    // -- Allocation API --

    /// Allocates a node and links it at the top of the root list.
    ///
    /// The node starts with default properties, the default flags, and an
    /// identity local transform.
    pub fn allocate(
        &mut self,
        position: [f32; 3],
        size: [f32; 3],
        node_type: NodeType,
        custom_type: u32,
    ) -> Result<NodeHandle> {
        let Some(idx) = self.free_list.pop() else {
            return Err(GuiError::OutOfResources(Resource::Nodes));
        };
        let i = idx as usize;
        self.index[i] = idx;
        self.properties[i] = default_properties(position, size);
        self.attrs[i] = NodeAttrs::new(node_type, custom_type);
        self.flags[i] = NodeFlags::default();
        self.local_transform[i] = Transform3d::IDENTITY;
        self.local_adjust_scale[i] = [1.0; 3];
        self.link_last(idx, INVALID);
        self.dirty.mark(u32::from(idx), dirty::LOCAL_TRANSFORM);
        Ok(self.handle_at(idx))
    }

    /// Unlinks a node, clears its slot, and returns the slot to the free list.
    ///
    /// Children are not touched; callers release them first.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn release(&mut self, id: NodeHandle) {
        self.validate(id);
        let idx = id.index();
        if !self.flags[idx as usize].contains(NodeFlags::PENDING_DELETE) {
            self.unlink(idx);
        }
        self.dirty.remove_key(u32::from(idx));
        let i = idx as usize;
        self.attrs[i] = NodeAttrs::default();
        self.flags[i] = NodeFlags::empty();
        self.first_child[i] = INVALID;
        self.last_child[i] = INVALID;
        self.generation[i] = next_generation(self.generation[i]);
        self.index[i] = INVALID;
        self.free_list.push(idx);
    }

    /// Returns whether the handle refers to a live node.
    #[must_use]
    pub fn is_valid(&self, id: NodeHandle) -> bool {
        let i = id.index() as usize;
        i < self.index.len() && self.index[i] == id.index() && self.generation[i] == id.generation()
    }

    /// Number of live nodes, including nodes pending deletion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len() - self.free_list.len()
    }

    /// Returns `true` if no node is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.index.len()
    }

    /// Handle of the live node at slot `idx`.
    #[inline]
    pub(crate) fn handle_at(&self, idx: u16) -> NodeHandle {
        NodeHandle::new(idx, self.generation[idx as usize])
    }

    /// Slot indices of every live node, in slot order.
    pub(crate) fn live_indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.index
            .iter()
            .enumerate()
            .filter(|&(slot, &idx)| idx as usize == slot)
            .map(|(_, &idx)| idx)
    }

    // -- Topology API --

    /// Returns the parent, or `None` for root-level nodes.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn parent(&self, id: NodeHandle) -> Option<NodeHandle> {
        self.validate(id);
        let p = self.parent[id.index() as usize];
        (p != INVALID).then(|| self.handle_at(p))
    }

    /// Returns an iterator over the children of a node, in paint order.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn children(&self, id: NodeHandle) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.index() as usize])
    }

    /// Returns an iterator over the root-level nodes, in paint order.
    #[must_use]
    pub fn roots(&self) -> Children<'_> {
        Children::new(self, self.root_head)
    }

    /// Returns `true` if `node` is `ancestor` or lies below it.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale.
    #[must_use]
    pub fn is_in_subtree(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
        self.validate(node);
        self.validate(ancestor);
        let target = ancestor.index();
        let mut cur = node.index();
        while cur != INVALID {
            if cur == target {
                return true;
            }
            cur = self.parent[cur as usize];
        }
        false
    }

    /// Moves `id` to the end of `parent`'s children, or of the root list.
    ///
    /// Returns [`GuiError::InfiniteRecursion`] if `parent` is `id` or one of
    /// its descendants; the tree is left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale.
    pub fn set_parent(&mut self, id: NodeHandle, parent: Option<NodeHandle>) -> Result<()> {
        self.validate(id);
        let p = match parent {
            Some(p) => {
                if self.is_in_subtree(p, id) {
                    return Err(GuiError::InfiniteRecursion);
                }
                p.index()
            }
            None => INVALID,
        };
        let idx = id.index();
        self.unlink(idx);
        self.link_last(idx, p);
        self.mark_transform(idx, true);
        Ok(())
    }

    /// Moves `id` so it paints directly above `reference`, adopting the
    /// reference's parent. Without a reference the node moves to the top of
    /// its own sibling list.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale.
    pub fn move_above(&mut self, id: NodeHandle, reference: Option<NodeHandle>) -> Result<()> {
        self.validate(id);
        let idx = id.index();
        match reference {
            Some(r) if r == id => Ok(()),
            Some(r) => {
                self.validate(r);
                if self.is_in_subtree(r, id) {
                    return Err(GuiError::InfiniteRecursion);
                }
                self.unlink(idx);
                self.link_after(idx, r.index());
                self.mark_transform(idx, true);
                Ok(())
            }
            None => {
                let p = self.parent[idx as usize];
                self.unlink(idx);
                self.link_last(idx, p);
                Ok(())
            }
        }
    }

    /// Moves `id` so it paints directly below `reference`, adopting the
    /// reference's parent. Without a reference the node moves to the bottom
    /// of its own sibling list.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale.
    pub fn move_below(&mut self, id: NodeHandle, reference: Option<NodeHandle>) -> Result<()> {
        self.validate(id);
        let idx = id.index();
        match reference {
            Some(r) if r == id => Ok(()),
            Some(r) => {
                self.validate(r);
                if self.is_in_subtree(r, id) {
                    return Err(GuiError::InfiniteRecursion);
                }
                self.unlink(idx);
                self.link_before(idx, r.index());
                self.mark_transform(idx, true);
                Ok(())
            }
            None => {
                let p = self.parent[idx as usize];
                self.unlink(idx);
                self.link_first(idx, p);
                Ok(())
            }
        }
    }

    // -- Property API --

    /// Returns a property value.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn property(&self, id: NodeHandle, property: Property) -> [f32; 4] {
        self.validate(id);
        self.properties[id.index() as usize][property as usize]
    }

    /// Sets a property value.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn set_property(&mut self, id: NodeHandle, property: Property, value: [f32; 4]) {
        self.validate(id);
        let idx = id.index();
        self.properties[idx as usize][property as usize] = value;
        if property.affects_transform() {
            self.mark_transform(idx, property.propagates());
        }
    }

    /// Sets one component of a property.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or `component >= 4`.
    pub fn set_component(&mut self, id: NodeHandle, property: Property, component: u8, value: f32) {
        self.validate(id);
        self.set_component_at(id.index(), property, component, value);
    }

    pub(crate) fn set_component_at(&mut self, idx: u16, property: Property, component: u8, value: f32) {
        self.properties[idx as usize][property as usize][component as usize] = value;
        if property.affects_transform() {
            self.mark_transform(idx, property.propagates());
        }
    }

    /// Returns the node's flags.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn flags(&self, id: NodeHandle) -> NodeFlags {
        self.validate(id);
        self.flags[id.index() as usize]
    }

    /// Sets or clears flags.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn set_flags(&mut self, id: NodeHandle, flags: NodeFlags, on: bool) {
        self.validate(id);
        self.flags[id.index() as usize].set(flags, on);
    }

    /// Returns `true` if the node is enabled, and with `recursive` also every
    /// ancestor.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn is_enabled(&self, id: NodeHandle, recursive: bool) -> bool {
        self.validate(id);
        if recursive {
            self.is_enabled_at(id.index())
        } else {
            self.flags[id.index() as usize].contains(NodeFlags::ENABLED)
        }
    }

    pub(crate) fn is_enabled_at(&self, mut idx: u16) -> bool {
        while idx != INVALID {
            if !self.flags[idx as usize].contains(NodeFlags::ENABLED) {
                return false;
            }
            idx = self.parent[idx as usize];
        }
        true
    }

    /// Returns the node's kind.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn node_type(&self, id: NodeHandle) -> NodeType {
        self.validate(id);
        self.attrs[id.index() as usize].node_type
    }

    pub(crate) fn attrs(&self, id: NodeHandle) -> &NodeAttrs {
        self.validate(id);
        &self.attrs[id.index() as usize]
    }

    pub(crate) fn attrs_mut(&mut self, id: NodeHandle) -> &mut NodeAttrs {
        self.validate(id);
        &mut self.attrs[id.index() as usize]
    }

    /// Returns the most recently computed local transform.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn local_transform(&self, id: NodeHandle) -> Transform3d {
        self.validate(id);
        self.local_transform[id.index() as usize]
    }

    /// Returns the adjust scale computed with the local transform.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn adjust_scale(&self, id: NodeHandle) -> [f64; 3] {
        self.validate(id);
        self.local_adjust_scale[id.index() as usize]
    }

    /// Marks a node's local transform for recomputation.
    ///
    /// With `propagate`, descendants are marked too.
    pub(crate) fn mark_transform(&mut self, idx: u16, propagate: bool) {
        if propagate {
            self.dirty
                .mark_with(u32::from(idx), dirty::LOCAL_TRANSFORM, &EagerPolicy);
        } else {
            self.dirty.mark(u32::from(idx), dirty::LOCAL_TRANSFORM);
        }
    }

    /// Marks every live node's local transform for recomputation.
    pub(crate) fn mark_all_transforms(&mut self) {
        let live: Vec<u16> = self.live_indices().collect();
        for idx in live {
            self.dirty.mark(u32::from(idx), dirty::LOCAL_TRANSFORM);
        }
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: NodeHandle) {
        assert!(
            self.is_valid(id),
            "stale NodeHandle: {id:?} (current gen: {})",
            self.generation
                .get(id.index() as usize)
                .copied()
                .unwrap_or(0)
        );
    }

    fn head_of(&self, parent: u16) -> u16 {
        if parent == INVALID {
            self.root_head
        } else {
            self.first_child[parent as usize]
        }
    }

    fn set_head(&mut self, parent: u16, idx: u16) {
        if parent == INVALID {
            self.root_head = idx;
        } else {
            self.first_child[parent as usize] = idx;
        }
    }

    fn tail_of(&self, parent: u16) -> u16 {
        if parent == INVALID {
            self.root_tail
        } else {
            self.last_child[parent as usize]
        }
    }

    fn set_tail(&mut self, parent: u16, idx: u16) {
        if parent == INVALID {
            self.root_tail = idx;
        } else {
            self.last_child[parent as usize] = idx;
        }
    }

    /// Removes `idx` from its sibling list and drops its parent edge.
    pub(crate) fn unlink(&mut self, idx: u16) {
        let i = idx as usize;
        let p = self.parent[i];
        let prev = self.prev_sibling[i];
        let next = self.next_sibling[i];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.set_head(p, next);
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        } else {
            self.set_tail(p, prev);
        }

        if p != INVALID {
            self.dirty
                .remove_dependency(u32::from(idx), u32::from(p), dirty::LOCAL_TRANSFORM);
        }
        self.parent[i] = INVALID;
        self.prev_sibling[i] = INVALID;
        self.next_sibling[i] = INVALID;
    }

    fn adopt(&mut self, idx: u16, parent: u16) {
        self.parent[idx as usize] = parent;
        if parent != INVALID {
            let added = self.dirty.add_dependency(
                u32::from(idx),
                u32::from(parent),
                dirty::LOCAL_TRANSFORM,
            );
            debug_assert!(added.is_ok(), "dependency cycle through slot {idx}");
        }
    }

    /// Appends an unlinked `idx` to the end of `parent`'s list.
    pub(crate) fn link_last(&mut self, idx: u16, parent: u16) {
        self.adopt(idx, parent);
        let tail = self.tail_of(parent);
        self.prev_sibling[idx as usize] = tail;
        self.next_sibling[idx as usize] = INVALID;
        if tail != INVALID {
            self.next_sibling[tail as usize] = idx;
        } else {
            self.set_head(parent, idx);
        }
        self.set_tail(parent, idx);
    }

    fn link_first(&mut self, idx: u16, parent: u16) {
        self.adopt(idx, parent);
        let head = self.head_of(parent);
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = head;
        if head != INVALID {
            self.prev_sibling[head as usize] = idx;
        } else {
            self.set_tail(parent, idx);
        }
        self.set_head(parent, idx);
    }

    fn link_after(&mut self, idx: u16, reference: u16) {
        let parent = self.parent[reference as usize];
        self.adopt(idx, parent);
        let next = self.next_sibling[reference as usize];
        self.prev_sibling[idx as usize] = reference;
        self.next_sibling[idx as usize] = next;
        self.next_sibling[reference as usize] = idx;
        if next != INVALID {
            self.prev_sibling[next as usize] = idx;
        } else {
            self.set_tail(parent, idx);
        }
    }

    fn link_before(&mut self, idx: u16, reference: u16) {
        let parent = self.parent[reference as usize];
        self.adopt(idx, parent);
        let prev = self.prev_sibling[reference as usize];
        self.prev_sibling[idx as usize] = prev;
        self.next_sibling[idx as usize] = reference;
        self.prev_sibling[reference as usize] = idx;
        if prev != INVALID {
            self.next_sibling[prev as usize] = idx;
        } else {
            self.set_head(parent, idx);
        }
    }
}
