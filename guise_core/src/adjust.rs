// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolution adjustment and transform resolution.
//!
//! Scenes are authored at a design resolution and displayed at a physical
//! one. Each node compensates for the difference according to its
//! [`AdjustMode`] and anchors, and the scene's [`AdjustReference`] decides
//! what a node adjusts against:
//!
//! - `Legacy`: the screen ratio, for every node.
//! - `Parent`: roots use the screen ratio; children use their parent's adjust
//!   scale, and their local transform undoes the scale the parent already
//!   applied.
//! - `Disabled`: nothing.
//!
//! Local transforms are recomputed lazily from the
//! [`LOCAL_TRANSFORM`](crate::dirty::LOCAL_TRANSFORM) channel. World
//! transforms are resolved on demand through a [`WorldCache`] that is
//! invalidated by bumping its epoch.

use alloc::vec::Vec;

use crate::dirty;
use crate::node::{AdjustMode, AdjustReference, INVALID, NodeFlags, NodeStore, Pivot, Property, XAnchor, YAnchor};
use crate::transform::Transform3d;

/// Physical and design sizes a scene adjusts between.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Physical size in pixels.
    pub physical: [f64; 2],
    /// Design size of the scene.
    pub design: [f64; 2],
    /// Adjustment policy.
    pub reference: AdjustReference,
}

impl Viewport {
    /// Ratio of physical to design size per axis. Degenerate sizes give 1.
    #[must_use]
    pub fn reference_scale(&self) -> [f64; 3] {
        let ratio = |p: f64, d: f64| if p > 0.0 && d > 0.0 { p / d } else { 1.0 };
        [
            ratio(self.physical[0], self.design[0]),
            ratio(self.physical[1], self.design[1]),
            1.0,
        ]
    }
}

/// Applies an adjust mode to a reference scale.
#[must_use]
pub fn adjust_scale(mode: AdjustMode, reference: [f64; 3]) -> [f64; 3] {
    match mode {
        AdjustMode::Fit => {
            let u = reference[0].min(reference[1]);
            [u, u, 1.0]
        }
        AdjustMode::Zoom => {
            let u = reference[0].max(reference[1]);
            [u, u, 1.0]
        }
        AdjustMode::Stretch => reference,
    }
}

/// Everything needed to map a node position to its adjusted position under a
/// given parent.
#[derive(Clone, Copy, Debug, PartialEq)]
struct AdjustFrame {
    reference: [f64; 3],
    adjust: [f64; 3],
    parent_dims: [f64; 2],
    ref_size: [f64; 2],
    offset: [f64; 2],
    /// Scale to undo on top of the local transform.
    parent_adjust: Option<[f64; 3]>,
    x_anchor: XAnchor,
    y_anchor: YAnchor,
}

impl AdjustFrame {
    /// Frame for node `idx` if it were a child of `parent` (`INVALID` for
    /// root level).
    fn new(store: &NodeStore, vp: &Viewport, idx: u16, parent: u16) -> Option<Self> {
        if vp.reference == AdjustReference::Disabled {
            return None;
        }
        let attrs = &store.attrs[idx as usize];
        let nested = vp.reference == AdjustReference::Parent && parent != INVALID;
        let reference = if nested {
            store.local_adjust_scale[parent as usize]
        } else {
            vp.reference_scale()
        };
        let adjust = adjust_scale(attrs.adjust_mode, reference);
        let (parent_dims, ref_size) = if nested {
            let size = store.properties[parent as usize][Property::Size as usize];
            let dims = [f64::from(size[0]), f64::from(size[1])];
            let pa = store.local_adjust_scale[parent as usize];
            (dims, [dims[0] * pa[0], dims[1] * pa[1]])
        } else {
            (vp.design, vp.physical)
        };
        let mut offset = [0.0; 2];
        if parent == INVALID {
            offset = [
                (ref_size[0] - parent_dims[0] * adjust[0]) * 0.5,
                (ref_size[1] - parent_dims[1] * adjust[1]) * 0.5,
            ];
        }
        if attrs.x_anchor != XAnchor::None {
            offset[0] = 0.0;
        }
        if attrs.y_anchor != YAnchor::None {
            offset[1] = 0.0;
        }
        Some(Self {
            reference,
            adjust,
            parent_dims,
            ref_size,
            offset,
            parent_adjust: nested.then(|| store.local_adjust_scale[parent as usize]),
            x_anchor: attrs.x_anchor,
            y_anchor: attrs.y_anchor,
        })
    }

    /// Adjusted position of a node authored at `pos`.
    fn forward(&self, pos: [f64; 3]) -> [f64; 3] {
        let x = match self.x_anchor {
            XAnchor::None => pos[0] * self.adjust[0],
            XAnchor::Left => pos[0] * self.reference[0],
            XAnchor::Right => self.ref_size[0] - (self.parent_dims[0] - pos[0]) * self.reference[0],
        };
        let y = match self.y_anchor {
            YAnchor::None => pos[1] * self.adjust[1],
            YAnchor::Bottom => pos[1] * self.reference[1],
            YAnchor::Top => self.ref_size[1] - (self.parent_dims[1] - pos[1]) * self.reference[1],
        };
        [x + self.offset[0], y + self.offset[1], pos[2]]
    }

    /// Authored position that adjusts to `adjusted`.
    fn inverse(&self, adjusted: [f64; 3]) -> [f64; 3] {
        let div = |a: f64, b: f64| if b != 0.0 { a / b } else { a };
        let ax = adjusted[0] - self.offset[0];
        let ay = adjusted[1] - self.offset[1];
        let x = match self.x_anchor {
            XAnchor::None => div(ax, self.adjust[0]),
            XAnchor::Left => div(ax, self.reference[0]),
            XAnchor::Right => self.parent_dims[0] - div(self.ref_size[0] - ax, self.reference[0]),
        };
        let y = match self.y_anchor {
            YAnchor::None => div(ay, self.adjust[1]),
            YAnchor::Bottom => div(ay, self.reference[1]),
            YAnchor::Top => self.parent_dims[1] - div(self.ref_size[1] - ay, self.reference[1]),
        };
        [x, y, adjusted[2]]
    }

    fn pre_scale(&self) -> Transform3d {
        match self.parent_adjust {
            Some(pa) => Transform3d::from_scale(recip(pa[0]), recip(pa[1]), recip(pa[2])),
            None => Transform3d::IDENTITY,
        }
    }
}

fn recip(v: f64) -> f64 {
    if v != 0.0 { 1.0 / v } else { 1.0 }
}

fn vec3(v: [f32; 4]) -> [f64; 3] {
    [f64::from(v[0]), f64::from(v[1]), f64::from(v[2])]
}

/// Recomputes the local transform and adjust scale of node `idx`.
pub(crate) fn update_local_transform(store: &mut NodeStore, vp: &Viewport, idx: u16) {
    let i = idx as usize;
    let props = &store.properties[i];
    let mut position = vec3(props[Property::Position as usize]);
    let rotation = vec3(props[Property::Rotation as usize]);
    let mut scale = vec3(props[Property::Scale as usize]);

    let frame = AdjustFrame::new(store, vp, idx, store.parent[i]);
    let mut pre = Transform3d::IDENTITY;
    let mut adjust = [1.0; 3];
    if let Some(frame) = &frame {
        adjust = frame.adjust;
        position = frame.forward(position);
        scale = [scale[0] * adjust[0], scale[1] * adjust[1], scale[2] * adjust[2]];
        pre = frame.pre_scale();
    }

    store.local_adjust_scale[i] = adjust;
    store.local_transform[i] = pre
        * Transform3d::from_translation(position[0], position[1], position[2])
        * Transform3d::from_euler_degrees(rotation[0], rotation[1], rotation[2])
        * Transform3d::from_scale(scale[0], scale[1], scale[2]);
}

/// Recomputes every dirty local transform, parents before children.
///
/// Returns the number of nodes recomputed.
pub fn flush_local_transforms(store: &mut NodeStore, vp: &Viewport) -> usize {
    let dirty: Vec<u32> = store
        .dirty
        .drain(dirty::LOCAL_TRANSFORM)
        .deterministic()
        .run()
        .collect();
    let mut count = 0;
    for key in dirty {
        let Ok(idx) = u16::try_from(key) else {
            continue;
        };
        if store.index.get(idx as usize) == Some(&idx) {
            update_local_transform(store, vp, idx);
            count += 1;
        }
    }
    count
}

/// Local position that places node `idx` at world point `world` when it is
/// a child of `parent` (`INVALID` for root level).
///
/// `parent_world` must be the parent's current world transform.
pub(crate) fn world_to_local_position(
    store: &NodeStore,
    vp: &Viewport,
    idx: u16,
    parent: u16,
    parent_world: Transform3d,
    world: [f64; 3],
) -> [f64; 3] {
    let frame = AdjustFrame::new(store, vp, idx, parent);
    let pre = frame.as_ref().map_or(Transform3d::IDENTITY, AdjustFrame::pre_scale);
    let to_local = (parent_world * pre).inverse_affine();
    let adjusted = to_local.map_or(world, |m| m.transform_point(world));
    match &frame {
        Some(frame) => frame.inverse(adjusted),
        None => adjusted,
    }
}

/// Appends the pivot and size to a world transform, mapping the unit square
/// onto the node's rectangle.
#[must_use]
pub fn boundary_transform(world: Transform3d, pivot: Pivot, size: [f64; 2]) -> Transform3d {
    world * pivot_offset(pivot, size) * Transform3d::from_scale(size[0], size[1], 1.0)
}

/// Translation that moves the node's pivot to its origin.
#[must_use]
pub fn pivot_offset(pivot: Pivot, size: [f64; 2]) -> Transform3d {
    let f = pivot.factor();
    Transform3d::from_translation(-f[0] * size[0], -f[1] * size[1], 0.0)
}

/// Returns `true` if the screen point hits the unit square of `boundary`.
///
/// The point is cast along +z; nodes seen edge-on are never hit.
#[must_use]
pub fn hit_test(boundary: Transform3d, point: [f64; 2]) -> bool {
    let Some(inv) = boundary.inverse_affine() else {
        return false;
    };
    let origin = inv.transform_point([point[0], point[1], 0.0]);
    let ahead = inv.transform_point([point[0], point[1], 1.0]);
    let dir = [ahead[0] - origin[0], ahead[1] - origin[1], ahead[2] - origin[2]];
    if dir[2].abs() < 1e-9 {
        return false;
    }
    let mut local = origin;
    if origin[2] != 0.0 {
        let t = -origin[2] / dir[2];
        local = [origin[0] + t * dir[0], origin[1] + t * dir[1], 0.0];
    }
    (0.0..=1.0).contains(&local[0]) && (0.0..=1.0).contains(&local[1])
}

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    epoch: u32,
    transform: Transform3d,
    opacity: f32,
}

/// Memoized world transforms and effective opacities.
///
/// An entry is valid while its epoch equals the cache's. Starting a new
/// frame bumps the epoch, invalidating every entry at once.
#[derive(Debug)]
pub struct WorldCache {
    epoch: u32,
    entries: Vec<CacheEntry>,
    stack: Vec<u16>,
}

impl WorldCache {
    /// Creates a cache for `capacity` node slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            epoch: 1,
            entries: alloc::vec![
                CacheEntry {
                    epoch: 0,
                    transform: Transform3d::IDENTITY,
                    opacity: 1.0,
                };
                capacity
            ],
            stack: Vec::new(),
        }
    }

    /// Invalidates every entry.
    pub fn invalidate(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            for e in &mut self.entries {
                e.epoch = 0;
            }
            self.epoch = 1;
        }
    }

    /// World transform and effective opacity of node `idx`.
    ///
    /// Local transforms must be flushed first.
    pub(crate) fn resolve(&mut self, store: &NodeStore, idx: u16) -> (Transform3d, f32) {
        self.stack.clear();
        let mut cur = idx;
        while cur != INVALID && self.entries[cur as usize].epoch != self.epoch {
            self.stack.push(cur);
            cur = store.parent[cur as usize];
        }
        while let Some(n) = self.stack.pop() {
            let i = n as usize;
            let p = store.parent[i];
            let (parent_world, parent_opacity) = if p == INVALID {
                (Transform3d::IDENTITY, 1.0)
            } else {
                let e = &self.entries[p as usize];
                (e.transform, e.opacity)
            };
            let alpha = store.properties[i][Property::Color as usize][3];
            let opacity = if store.flags[i].contains(NodeFlags::INHERIT_ALPHA) {
                alpha * parent_opacity
            } else {
                alpha
            };
            self.entries[i] = CacheEntry {
                epoch: self.epoch,
                transform: parent_world * store.local_transform[i],
                opacity,
            };
        }
        let e = &self.entries[idx as usize];
        (e.transform, e.opacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeHandle, NodeType};

    fn viewport(reference: AdjustReference) -> Viewport {
        Viewport {
            physical: [200.0, 100.0],
            design: [50.0, 50.0],
            reference,
        }
    }

    fn node(store: &mut NodeStore, mode: AdjustMode) -> NodeHandle {
        let n = store
            .allocate([10.0, 10.0, 0.0], [50.0, 50.0, 0.0], NodeType::Box, 0)
            .unwrap();
        store.attrs_mut(n).adjust_mode = mode;
        n
    }

    fn nested_scales(mode: AdjustMode) -> ([f64; 3], [f64; 3]) {
        let mut store = NodeStore::new(4);
        let n1 = node(&mut store, mode);
        let n2 = node(&mut store, mode);
        store.set_parent(n2, Some(n1)).unwrap();
        flush_local_transforms(&mut store, &viewport(AdjustReference::Parent));
        (store.adjust_scale(n1), store.adjust_scale(n2))
    }

    #[test]
    fn parent_reference_stretch() {
        assert_eq!(nested_scales(AdjustMode::Stretch), ([4.0, 2.0, 1.0], [4.0, 2.0, 1.0]));
    }

    #[test]
    fn parent_reference_fit() {
        assert_eq!(nested_scales(AdjustMode::Fit), ([2.0, 2.0, 1.0], [2.0, 2.0, 1.0]));
    }

    #[test]
    fn parent_reference_zoom() {
        assert_eq!(nested_scales(AdjustMode::Zoom), ([4.0, 4.0, 1.0], [4.0, 4.0, 1.0]));
    }

    #[test]
    fn disabled_reference_is_identity() {
        let mut store = NodeStore::new(2);
        let n = node(&mut store, AdjustMode::Stretch);
        flush_local_transforms(&mut store, &viewport(AdjustReference::Disabled));
        assert_eq!(store.adjust_scale(n), [1.0; 3]);
        assert_eq!(store.local_transform(n).translation(), [10.0, 10.0, 0.0]);
    }

    fn legacy_center(mode: AdjustMode) -> [f64; 2] {
        let vp = Viewport {
            physical: [1280.0, 320.0],
            design: [640.0, 320.0],
            reference: AdjustReference::Legacy,
        };
        let mut store = NodeStore::new(2);
        let n = store
            .allocate([15.0, 15.0, 0.0], [10.0, 10.0, 0.0], NodeType::Box, 0)
            .unwrap();
        store.attrs_mut(n).adjust_mode = mode;
        flush_local_transforms(&mut store, &vp);
        let mut cache = WorldCache::new(2);
        let (world, _) = cache.resolve(&store, n.index());
        let b = boundary_transform(world, Pivot::Center, [10.0, 10.0]);
        let t = b.translation();
        [t[0] + b.axis_length(0) * 0.5, t[1] + b.axis_length(1) * 0.5]
    }

    #[test]
    fn legacy_fit_centers_content() {
        assert_eq!(legacy_center(AdjustMode::Fit), [335.0, 15.0]);
    }

    #[test]
    fn legacy_stretch_fills_width() {
        assert_eq!(legacy_center(AdjustMode::Stretch), [30.0, 15.0]);
    }

    #[test]
    fn anchors_keep_edge_distance() {
        let vp = Viewport {
            physical: [200.0, 100.0],
            design: [100.0, 100.0],
            reference: AdjustReference::Legacy,
        };
        let mut store = NodeStore::new(2);
        let n = store
            .allocate([90.0, 90.0, 0.0], [10.0, 10.0, 0.0], NodeType::Box, 0)
            .unwrap();
        store.attrs_mut(n).x_anchor = XAnchor::Right;
        store.attrs_mut(n).y_anchor = YAnchor::Top;
        flush_local_transforms(&mut store, &vp);
        // 10 design pixels from the right edge stay 20 physical pixels from it.
        assert_eq!(store.local_transform(n).translation(), [180.0, 90.0, 0.0]);
    }

    #[test]
    fn world_to_local_inverts_adjustment() {
        for reference in [
            AdjustReference::Legacy,
            AdjustReference::Parent,
            AdjustReference::Disabled,
        ] {
            let vp = viewport(reference);
            let mut store = NodeStore::new(4);
            let p = node(&mut store, AdjustMode::Fit);
            let n = node(&mut store, AdjustMode::Stretch);
            store.attrs_mut(n).x_anchor = XAnchor::Left;
            store.set_parent(n, Some(p)).unwrap();
            flush_local_transforms(&mut store, &vp);
            let mut cache = WorldCache::new(4);
            let (pw, _) = cache.resolve(&store, p.index());
            let (nw, _) = cache.resolve(&store, n.index());
            let pos = world_to_local_position(&store, &vp, n.index(), p.index(), pw, nw.translation());
            assert!((pos[0] - 10.0).abs() < 1e-9, "{reference:?} {pos:?}");
            assert!((pos[1] - 10.0).abs() < 1e-9, "{reference:?} {pos:?}");
        }
    }

    #[test]
    fn inherit_alpha() {
        let mut store = NodeStore::new(4);
        let p = node(&mut store, AdjustMode::Fit);
        let a = node(&mut store, AdjustMode::Fit);
        let b = node(&mut store, AdjustMode::Fit);
        store.set_parent(a, Some(p)).unwrap();
        store.set_parent(b, Some(p)).unwrap();
        store.set_property(p, Property::Color, [1.0, 1.0, 1.0, 0.5]);
        store.set_flags(a, NodeFlags::INHERIT_ALPHA, true);
        flush_local_transforms(&mut store, &viewport(AdjustReference::Disabled));
        let mut cache = WorldCache::new(4);
        assert_eq!(cache.resolve(&store, a.index()).1, 0.5);
        assert_eq!(cache.resolve(&store, b.index()).1, 1.0);
    }

    #[test]
    fn cache_refreshes_after_invalidate() {
        let vp = viewport(AdjustReference::Disabled);
        let mut store = NodeStore::new(2);
        let n = node(&mut store, AdjustMode::Fit);
        flush_local_transforms(&mut store, &vp);
        let mut cache = WorldCache::new(2);
        assert_eq!(cache.resolve(&store, n.index()).0.translation(), [10.0, 10.0, 0.0]);
        store.set_property(n, Property::Position, [20.0, 10.0, 0.0, 1.0]);
        flush_local_transforms(&mut store, &vp);
        assert_eq!(cache.resolve(&store, n.index()).0.translation(), [10.0, 10.0, 0.0]);
        cache.invalidate();
        assert_eq!(cache.resolve(&store, n.index()).0.translation(), [20.0, 10.0, 0.0]);
    }

    #[test]
    fn hit_test_unit_square() {
        let b = boundary_transform(
            Transform3d::from_translation(100.0, 100.0, 0.0),
            Pivot::Center,
            [20.0, 10.0],
        );
        assert!(hit_test(b, [100.0, 100.0]));
        assert!(hit_test(b, [109.0, 104.0]));
        assert!(!hit_test(b, [111.0, 100.0]));
    }

    #[test]
    fn hit_test_edge_on_misses() {
        let world = Transform3d::from_translation(100.0, 100.0, 0.0)
            * Transform3d::from_euler_degrees(0.0, 90.0, 0.0);
        let b = boundary_transform(world, Pivot::Center, [20.0, 10.0]);
        assert!(!hit_test(b, [100.0, 100.0]));
    }
}
