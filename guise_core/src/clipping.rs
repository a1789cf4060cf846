// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stencil bit allocation for clipping nodes.
//!
//! Clipping nodes mask their descendants through an 8-bit stencil buffer.
//! Each clipper draws its shape once, writing its reference value, and its
//! descendants are drawn with a test against the bits of every enclosing
//! clipper.
//!
//! # Bit layout
//!
//! Normal clippers are numbered within their sibling group. A group of `n`
//! clippers spends `bits(n)` bits, placed above the bits of enclosing groups,
//! and clipper `i` writes `i + 1` into them. Inverted clippers each take one
//! bit, counting down from bit 7, so they never collide with normal groups
//! until the buffer is full. When the two meet, a warning is logged and
//! clipping degrades; nothing fails.
//!
//! ```text
//!   bit  7 6 5 4 3 2 1 0
//!        ^ ^ inverted   ^^ root group, then nested groups upward
//! ```
//!
//! Allocation runs once per frame over the enabled tree, with an explicit
//! worklist rather than recursion.

use alloc::vec::Vec;

use crate::node::{ClippingMode, INVALID, NodeFlags, NodeStore};

/// Stencil state for one draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StencilScope {
    /// Value written on pass, and compared against.
    pub ref_value: u8,
    /// Bits that take part in the comparison.
    pub test_mask: u8,
    /// Bits the draw may write.
    pub write_mask: u8,
    /// RGBA color write mask, one bit per channel.
    pub color_mask: u8,
}

/// Per-frame allocation for one clipping node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClippingNode {
    /// Slot index of the clipping node.
    pub node_index: u16,
    /// Index of the enclosing clipper in the allocation, if any.
    pub parent_clipper: Option<u16>,
    /// Scope for drawing the clip shape.
    pub scope: StencilScope,
    /// Scope inherited by non-clipping descendants.
    pub child_scope: StencilScope,
    /// Render key of the visible shape draw, or 0 if it has none.
    pub visible_render_key: u64,
}

enum Task {
    /// Scope a collected group, starting at bit `offset`.
    Scope { group: Vec<u16>, offset: u32 },
    /// Collect and scope the clippers below clipper `clipper`.
    Descend { clipper: u16, offset: u32 },
}

/// Assigns stencil scopes to every enabled clipping node.
#[derive(Debug, Default)]
pub struct ClipAllocator {
    clippers: Vec<ClippingNode>,
    /// Per node slot: index of the nearest clipper at or above it.
    clipper_index: Vec<u16>,
    inverted: u32,
    overflow: bool,
    walk: Vec<(u16, Option<u16>)>,
}

impl ClipAllocator {
    /// Creates an allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clipping nodes found by the last [`run`](Self::run), in allocation
    /// order.
    #[must_use]
    pub fn clippers(&self) -> &[ClippingNode] {
        &self.clippers
    }

    pub(crate) fn clippers_mut(&mut self) -> &mut [ClippingNode] {
        &mut self.clippers
    }

    /// Index into [`clippers`](Self::clippers) of the clipper governing node
    /// slot `idx`: the node itself if it clips, otherwise its nearest
    /// clipping ancestor.
    #[must_use]
    pub fn clipper_of(&self, idx: u16) -> Option<u16> {
        self.clipper_index
            .get(idx as usize)
            .copied()
            .filter(|&c| c != INVALID)
    }

    /// Returns `true` if the last run needed more than 8 stencil bits.
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    /// Allocates scopes for the enabled tree of `store`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "sibling groups are bounded by the u16 node pool"
    )]
    pub fn run(&mut self, store: &NodeStore) {
        self.clippers.clear();
        self.clipper_index.clear();
        self.clipper_index.resize(store.capacity(), INVALID);
        self.inverted = 0;
        self.overflow = false;

        let mut root_group = Vec::new();
        self.collect(store, store.root_head, None, 0, &mut root_group);
        let mut tasks = alloc::vec![Task::Scope {
            group: root_group,
            offset: 0,
        }];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Scope { group, offset } => {
                    let range = bits_for(group.len());
                    for (i, &c) in group.iter().enumerate() {
                        self.scope_normal(store, c, i as u32, offset, range);
                    }
                    for &c in group.iter().rev() {
                        tasks.push(Task::Descend {
                            clipper: c,
                            offset: offset + range,
                        });
                    }
                }
                Task::Descend { clipper, offset } => {
                    let node = self.clippers[clipper as usize].node_index;
                    let mut group = Vec::new();
                    self.collect(
                        store,
                        store.first_child[node as usize],
                        Some(clipper),
                        offset,
                        &mut group,
                    );
                    tasks.push(Task::Scope { group, offset });
                }
            }
        }
    }

    /// Walks the sibling list at `first` and everything below it that is not
    /// under a normal clipper. Inverted clippers are scoped on the spot;
    /// normal clippers are appended to `group`. `offset` is the number of
    /// low bits taken by enclosing groups.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "clipper count is bounded by the u16 node pool"
    )]
    fn collect(
        &mut self,
        store: &NodeStore,
        first: u16,
        parent_clipper: Option<u16>,
        offset: u32,
        group: &mut Vec<u16>,
    ) {
        self.walk.clear();
        self.walk.push((first, parent_clipper));
        while let Some((idx, pc)) = self.walk.pop() {
            if idx == INVALID {
                continue;
            }
            let i = idx as usize;
            self.walk.push((store.next_sibling[i], pc));
            let flags = store.flags[i];
            if !flags.contains(NodeFlags::ENABLED) || flags.contains(NodeFlags::PENDING_DELETE) {
                continue;
            }
            self.clipper_index[i] = pc.unwrap_or(INVALID);
            if store.attrs[i].clipping_mode == ClippingMode::None {
                self.walk.push((store.first_child[i], pc));
                continue;
            }
            let c = self.clippers.len() as u16;
            self.clippers.push(ClippingNode {
                node_index: idx,
                parent_clipper: pc,
                scope: StencilScope::default(),
                child_scope: StencilScope::default(),
                visible_render_key: 0,
            });
            self.clipper_index[i] = c;
            if flags.contains(NodeFlags::CLIPPING_INVERTED) {
                self.scope_inverted(store, c, offset);
                self.walk.push((store.first_child[i], Some(c)));
            } else {
                group.push(c);
            }
        }
    }

    fn parent_scope(&self, c: u16) -> StencilScope {
        self.clippers[c as usize]
            .parent_clipper
            .map_or_else(StencilScope::default, |p| self.clippers[p as usize].child_scope)
    }

    fn color_mask(&self, store: &NodeStore, c: u16) -> u8 {
        let node = self.clippers[c as usize].node_index;
        if store.flags[node as usize].contains(NodeFlags::CLIPPING_VISIBLE) {
            0xf
        } else {
            0
        }
    }

    fn scope_inverted(&mut self, store: &NodeStore, c: u16, offset: u32) {
        let k = self.inverted;
        self.inverted += 1;
        // The bit taken from the top must stay clear of the enclosing groups.
        if k + offset + 1 > 8 {
            self.warn_overflow(c, k, offset, 1);
        }
        let bit = 7u32.checked_sub(k).map_or(0, |s| 1u8 << s);
        let ps = self.parent_scope(c);
        let color_mask = self.color_mask(store, c);
        let entry = &mut self.clippers[c as usize];
        entry.scope = StencilScope {
            ref_value: bit | ps.ref_value,
            test_mask: ps.test_mask,
            write_mask: 0xff,
            color_mask,
        };
        entry.child_scope = StencilScope {
            ref_value: ps.ref_value,
            test_mask: ps.test_mask | bit,
            write_mask: 0,
            color_mask: 0xf,
        };
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "stencil references are masked to 8 bits"
    )]
    fn scope_normal(&mut self, store: &NodeStore, c: u16, index: u32, offset: u32, range: u32) {
        if self.inverted + offset + range > 8 {
            self.warn_overflow(c, self.inverted, offset, range);
        }
        let ps = self.parent_scope(c);
        let color_mask = self.color_mask(store, c);
        let id = (index + 1).checked_shl(offset).unwrap_or(0) as u8;
        let group_mask = 1u32
            .checked_shl(offset + range)
            .map_or(u32::MAX, |b| b - 1) as u8;
        let entry = &mut self.clippers[c as usize];
        entry.scope = StencilScope {
            ref_value: id | ps.ref_value,
            test_mask: ps.test_mask,
            write_mask: 0xff,
            color_mask,
        };
        entry.child_scope = StencilScope {
            ref_value: id | ps.ref_value,
            test_mask: group_mask | ps.test_mask,
            write_mask: 0,
            color_mask: 0xf,
        };
    }

    fn warn_overflow(&mut self, c: u16, inverted: u32, offset: u32, range: u32) {
        if !self.overflow {
            log::warn!(
                "stencil buffer exceeded at clipping node slot {}: {inverted} inverted + {offset} nested + {range} group bits > 8; clipping will be incorrect",
                self.clippers[c as usize].node_index
            );
        }
        self.overflow = true;
    }
}

/// Number of bits needed to represent `n`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "group sizes are bounded by the u16 node pool"
)]
fn bits_for(n: usize) -> u32 {
    u32::BITS - (n as u32).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeHandle, NodeType};

    struct Tree {
        store: NodeStore,
    }

    impl Tree {
        fn new() -> Self {
            Self {
                store: NodeStore::new(32),
            }
        }

        fn node(&mut self, parent: Option<NodeHandle>) -> NodeHandle {
            let n = self
                .store
                .allocate([0.0; 3], [10.0, 10.0, 0.0], NodeType::Box, 0)
                .unwrap();
            if parent.is_some() {
                self.store.set_parent(n, parent).unwrap();
            }
            n
        }

        /// A clipper with one plain child.
        fn clipper(&mut self, parent: Option<NodeHandle>, inverted: bool) -> NodeHandle {
            let n = self.node(parent);
            self.store.attrs_mut(n).clipping_mode = ClippingMode::Stencil;
            self.store
                .set_flags(n, NodeFlags::CLIPPING_INVERTED, inverted);
            let _child = self.node(Some(n));
            n
        }

        fn run(&self) -> ClipAllocator {
            let mut alloc = ClipAllocator::new();
            alloc.run(&self.store);
            alloc
        }
    }

    fn entry(alloc: &ClipAllocator, n: NodeHandle) -> ClippingNode {
        let c = alloc.clipper_of(n.index()).unwrap();
        let e = alloc.clippers()[c as usize];
        assert_eq!(e.node_index, n.index());
        e
    }

    /// Asserts `(ref, test)` of the shape scope and of the child scope.
    fn assert_scopes(alloc: &ClipAllocator, n: NodeHandle, scope: (u8, u8), child: (u8, u8)) {
        let e = entry(alloc, n);
        assert_eq!(
            (e.scope.ref_value, e.scope.test_mask),
            scope,
            "scope of slot {}: {:#010b}/{:#010b}",
            n.index(),
            e.scope.ref_value,
            e.scope.test_mask
        );
        assert_eq!(e.scope.write_mask, 0xff);
        assert_eq!(
            (e.child_scope.ref_value, e.child_scope.test_mask),
            child,
            "child scope of slot {}",
            n.index()
        );
        assert_eq!(e.child_scope.write_mask, 0);
    }

    #[test]
    fn minimal() {
        let mut t = Tree::new();
        let a = t.clipper(None, true);
        let b = t.clipper(Some(a), false);
        let c = t.clipper(None, false);
        let alloc = t.run();

        assert_scopes(&alloc, a, (0b1000_0000, 0), (0, 0b1000_0000));
        assert_scopes(&alloc, b, (0b0000_0001, 0b1000_0000), (0b0000_0001, 0b1000_0011));
        assert_scopes(&alloc, c, (0b0000_0010, 0), (0b0000_0010, 0b0000_0011));
        assert!(!alloc.overflowed());
    }

    #[test]
    fn simple_hierarchy() {
        let mut t = Tree::new();
        let a = t.clipper(None, false);
        let b = t.clipper(Some(a), false);
        let c = t.clipper(Some(b), false);
        let d = t.clipper(Some(c), false);
        let e = t.clipper(Some(c), false);
        let f = t.clipper(None, false);
        let g = t.clipper(Some(f), false);
        let h = t.clipper(Some(g), false);
        let i = t.clipper(Some(f), false);
        let j = t.clipper(Some(f), false);
        let k = t.clipper(Some(f), false);
        let l = t.clipper(None, false);
        let alloc = t.run();

        assert_scopes(&alloc, a, (0b0000_0001, 0), (0b0000_0001, 0b0000_0011));
        assert_scopes(&alloc, b, (0b0000_0101, 0b0000_0011), (0b0000_0101, 0b0000_0111));
        assert_scopes(&alloc, c, (0b0000_1101, 0b0000_0111), (0b0000_1101, 0b0000_1111));
        assert_scopes(&alloc, d, (0b0001_1101, 0b0000_1111), (0b0001_1101, 0b0011_1111));
        assert_scopes(&alloc, e, (0b0010_1101, 0b0000_1111), (0b0010_1101, 0b0011_1111));
        assert_scopes(&alloc, f, (0b0000_0010, 0), (0b0000_0010, 0b0000_0011));
        assert_scopes(&alloc, g, (0b0000_0110, 0b0000_0011), (0b0000_0110, 0b0001_1111));
        assert_scopes(&alloc, h, (0b0010_0110, 0b0001_1111), (0b0010_0110, 0b0011_1111));
        assert_scopes(&alloc, i, (0b0000_1010, 0b0000_0011), (0b0000_1010, 0b0001_1111));
        assert_scopes(&alloc, j, (0b0000_1110, 0b0000_0011), (0b0000_1110, 0b0001_1111));
        assert_scopes(&alloc, k, (0b0001_0010, 0b0000_0011), (0b0001_0010, 0b0001_1111));
        assert_scopes(&alloc, l, (0b0000_0011, 0), (0b0000_0011, 0b0000_0011));
        assert!(!alloc.overflowed());
    }

    #[test]
    fn simple_inverted_hierarchy() {
        let mut t = Tree::new();
        let a = t.clipper(None, false);
        let b = t.clipper(Some(a), false);
        let c = t.clipper(Some(a), false);
        let d = t.clipper(Some(a), false);
        let e = t.clipper(Some(a), true);
        let f = t.clipper(Some(a), true);
        let g = t.clipper(Some(a), true);
        let h = t.clipper(Some(g), true);
        let alloc = t.run();

        assert_scopes(&alloc, a, (0b0000_0001, 0), (0b0000_0001, 0b0000_0001));
        assert_scopes(&alloc, b, (0b0000_0011, 0b0000_0001), (0b0000_0011, 0b0000_0111));
        assert_scopes(&alloc, c, (0b0000_0101, 0b0000_0001), (0b0000_0101, 0b0000_0111));
        assert_scopes(&alloc, d, (0b0000_0111, 0b0000_0001), (0b0000_0111, 0b0000_0111));
        assert_scopes(&alloc, e, (0b1000_0001, 0b0000_0001), (0b0000_0001, 0b1000_0001));
        assert_scopes(&alloc, f, (0b0100_0001, 0b0000_0001), (0b0000_0001, 0b0100_0001));
        assert_scopes(&alloc, g, (0b0010_0001, 0b0000_0001), (0b0000_0001, 0b0010_0001));
        assert_scopes(&alloc, h, (0b0001_0001, 0b0010_0001), (0b0000_0001, 0b0011_0001));
    }

    #[test]
    fn ref_ids() {
        let mut t = Tree::new();
        let a = t.clipper(None, true);
        let b = t.clipper(Some(a), true);
        let c = t.clipper(Some(b), false);
        let d = t.clipper(Some(c), true);
        let e = t.clipper(Some(b), true);
        let h = t.clipper(None, true);
        let i = t.clipper(Some(h), true);
        let j = t.clipper(None, true);
        let alloc = t.run();

        let refs = [a, b, c, d, e, h, i, j].map(|n| entry(&alloc, n).scope.ref_value);
        assert_eq!(
            refs,
            [
                0b1000_0000,
                0b0100_0000,
                0b0000_0001,
                0b0000_0011,
                0b0010_0000,
                0b0001_0000,
                0b0000_1000,
                0b0000_0100,
            ]
        );
    }

    #[test]
    fn descendants_resolve_to_nearest_clipper() {
        let mut t = Tree::new();
        let plain = t.node(None);
        let a = t.clipper(Some(plain), false);
        let inner = t.node(Some(a));
        let deeper = t.node(Some(inner));
        let alloc = t.run();

        assert_eq!(alloc.clipper_of(plain.index()), None);
        let c = alloc.clipper_of(a.index());
        assert!(c.is_some());
        assert_eq!(alloc.clipper_of(inner.index()), c);
        assert_eq!(alloc.clipper_of(deeper.index()), c);
    }

    #[test]
    fn disabled_subtrees_spend_no_bits() {
        let mut t = Tree::new();
        let a = t.clipper(None, false);
        let b = t.clipper(None, false);
        let c = t.clipper(None, false);
        t.store.set_flags(b, NodeFlags::ENABLED, false);
        let alloc = t.run();

        assert_eq!(alloc.clippers().len(), 2);
        assert_eq!(alloc.clipper_of(b.index()), None);
        assert_scopes(&alloc, a, (0b01, 0), (0b01, 0b11));
        assert_scopes(&alloc, c, (0b10, 0), (0b10, 0b11));
    }

    #[test]
    fn visible_flag_controls_color_mask() {
        let mut t = Tree::new();
        let a = t.clipper(None, false);
        let b = t.clipper(None, true);
        t.store.set_flags(a, NodeFlags::CLIPPING_VISIBLE, false);
        let alloc = t.run();

        assert_eq!(entry(&alloc, a).scope.color_mask, 0);
        assert_eq!(entry(&alloc, b).scope.color_mask, 0xf);
        assert_eq!(entry(&alloc, a).child_scope.color_mask, 0xf);
    }

    #[test]
    fn inverted_overflow() {
        for (children, overflow) in [(7, false), (8, true)] {
            let mut t = Tree::new();
            let a = t.clipper(None, true);
            for _ in 0..children {
                t.clipper(Some(a), true);
            }
            let alloc = t.run();
            assert_eq!(alloc.overflowed(), overflow, "{children} inverted children");
            assert_eq!(alloc.clippers().len(), children + 1);
        }
    }

    /// Builds
    ///
    /// ```text
    /// - a
    ///   - b (inv)
    ///     - c (inv)
    ///       - d
    ///       - e (inv)
    ///         - f
    ///           - g (inverted per `g`, absent for `None`)
    ///     - h (inv)
    /// - i
    ///   - j (inv)
    ///     - k (inv)
    /// ```
    ///
    /// with the `i` subtree first when `i_first` is set.
    fn crowded(g: Option<bool>, i_first: bool) -> Tree {
        let mut t = Tree::new();
        let roots = |t: &mut Tree| {
            let i = t.clipper(None, false);
            let j = t.clipper(Some(i), true);
            t.clipper(Some(j), true);
        };
        if i_first {
            roots(&mut t);
        }
        let a = t.clipper(None, false);
        let b = t.clipper(Some(a), true);
        let c = t.clipper(Some(b), true);
        t.clipper(Some(c), false);
        let e = t.clipper(Some(c), true);
        let f = t.clipper(Some(e), false);
        if let Some(inverted) = g {
            t.clipper(Some(f), inverted);
        }
        t.clipper(Some(b), true);
        if !i_first {
            roots(&mut t);
        }
        t
    }

    #[test]
    fn crowded_tree_fits_until_the_last_clipper() {
        assert!(!crowded(None, false).run().overflowed());
    }

    #[test]
    fn inverted_bit_collides_with_enclosing_groups() {
        let alloc = crowded(Some(true), false).run();
        assert!(alloc.overflowed());
        assert_eq!(alloc.clippers().len(), 11);
    }

    #[test]
    fn nested_group_collides_with_inverted_bits() {
        let alloc = crowded(Some(false), false).run();
        assert!(alloc.overflowed());
        assert_eq!(alloc.clippers().len(), 11);
    }

    #[test]
    fn overflow_detected_in_a_later_root() {
        let alloc = crowded(Some(true), true).run();
        assert!(alloc.overflowed());
        assert_eq!(alloc.clippers().len(), 11);
        for c in alloc.clippers() {
            assert_eq!(c.scope.write_mask, 0xff);
            assert_eq!(c.child_scope.write_mask, 0);
        }
    }

    #[test]
    fn overflow_warns_but_completes() {
        for (siblings, depth) in [(1usize, 8usize), (3, 4), (255, 1), (2, 20)] {
            let mut t = Tree {
                store: NodeStore::new(2048),
            };
            let mut parent = None;
            for _ in 0..depth {
                let mut first = None;
                for _ in 0..siblings {
                    let n = t.node(parent);
                    t.store.attrs_mut(n).clipping_mode = ClippingMode::Stencil;
                    first.get_or_insert(n);
                }
                parent = first;
            }
            let alloc = t.run();
            let bits = bits_for(siblings) as usize * depth;
            assert_eq!(alloc.overflowed(), bits > 8, "{siblings} x {depth}");
            assert_eq!(alloc.clippers().len(), siblings * depth);
        }
    }
}
