// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, NodeHandle};
use super::props::NodeFlags;
use super::store::NodeStore;

/// An iterator over a sibling list, in paint order.
///
/// Nodes pending deletion are skipped. Created by [`NodeStore::children`] and
/// [`NodeStore::roots`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a NodeStore,
    current: u16,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a NodeStore, first: u16) -> Self {
        Self {
            store,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<NodeHandle> {
        while self.current != INVALID {
            let idx = self.current;
            self.current = self.store.next_sibling[idx as usize];
            if !self.store.flags[idx as usize].contains(NodeFlags::PENDING_DELETE) {
                return Some(self.store.handle_at(idx));
            }
        }
        None
    }
}

/// Returns the raw slot indices of a sibling list starting at `first`.
pub(crate) fn sibling_indices(store: &NodeStore, first: u16) -> impl Iterator<Item = u16> + '_ {
    Children::new(store, first).map(NodeHandle::index)
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::node::NodeType;

    #[test]
    fn skips_pending_delete() {
        let mut store = NodeStore::new(4);
        let a = store.allocate([0.0; 3], [0.0; 3], NodeType::Box, 0).unwrap();
        let b = store.allocate([0.0; 3], [0.0; 3], NodeType::Box, 0).unwrap();
        let c = store.allocate([0.0; 3], [0.0; 3], NodeType::Box, 0).unwrap();
        store.set_flags(b, NodeFlags::PENDING_DELETE, true);
        assert_eq!(store.roots().collect::<Vec<_>>(), [a, c]);
        assert_eq!(
            sibling_indices(&store, store.root_head).collect::<Vec<_>>(),
            [a.index(), c.index()]
        );
    }
}
