// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property animations.
//!
//! The [`AnimationTable`] is a dense array kept sorted by
//! [`AnimationKey`], so each driven component has at most one animation and
//! lookups are a binary search. Entries are removed by shifting, which keeps
//! the order intact.
//!
//! Completion callbacks are not invoked inside the table. The table hands
//! them back to the [`Scene`], which calls them once the pass is over so they
//! may freely mutate the scene, including starting new animations.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::easing::Easing;
use crate::error::{GuiError, Resource, Result};
use crate::node::{NodeHandle, NodeStore, Property};
use crate::scene::Scene;

/// How an animation moves through its duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Playback {
    /// From start to end, once.
    #[default]
    OnceForward,
    /// From end to start, once.
    OnceBackward,
    /// Start to end and back, once.
    OncePingPong,
    /// Start to end, repeating.
    LoopForward,
    /// End to start, repeating.
    LoopBackward,
    /// Start to end and back, repeating.
    LoopPingPong,
}

impl Playback {
    /// Returns `true` for the repeating modes.
    #[inline]
    #[must_use]
    pub const fn is_looping(self) -> bool {
        matches!(
            self,
            Self::LoopForward | Self::LoopBackward | Self::LoopPingPong
        )
    }

    const fn is_backward(self) -> bool {
        matches!(self, Self::OnceBackward | Self::LoopBackward)
    }

    const fn is_ping_pong(self) -> bool {
        matches!(self, Self::OncePingPong | Self::LoopPingPong)
    }

    /// Maps normalized time to the position along the curve.
    #[must_use]
    pub fn remap(self, t: f32) -> f32 {
        self.remap_with(t, false)
    }

    fn remap_with(self, t: f32, backwards: bool) -> f32 {
        let mut t2 = if self.is_backward() || backwards {
            1.0 - t
        } else {
            t
        };
        if self.is_ping_pong() {
            t2 *= 2.0;
            if t2 > 1.0 {
                t2 = 2.0 - t2;
            }
        }
        t2
    }
}

/// Identifies the float an animation drives.
///
/// Ordering is by node, then property, then component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnimationKey {
    /// Animated node.
    pub node: NodeHandle,
    /// Animated property.
    pub property: Property,
    /// Component index `0..4`.
    pub component: u8,
}

/// Passed to a completion callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationDone {
    /// Animated node. Still valid while the callback runs, unless the
    /// animation ended because the node was deleted.
    pub node: NodeHandle,
    /// Animated property.
    pub property: Property,
    /// Animated component.
    pub component: u8,
    /// `false` if the animation was cancelled, replaced, or its node deleted.
    pub finished: bool,
    /// Opaque words supplied when the animation was started.
    pub userdata: [u64; 2],
}

/// A completion callback.
pub type Completion = Box<dyn FnOnce(&mut Scene, AnimationDone)>;

/// A completion callback together with its arguments, ready to invoke.
pub(crate) type Fired = (Completion, AnimationDone);

/// Parameters of an animation.
///
/// ```
/// use guise_core::animation::{AnimationSpec, Playback};
/// use guise_core::easing::{EaseDirection, Easing, EasingFamily};
///
/// let spec = AnimationSpec::new([100.0, 50.0, 0.0, 0.0], 0.5)
///     .easing(Easing::Builtin(EasingFamily::Quad, EaseDirection::Out))
///     .playback(Playback::LoopPingPong)
///     .delay(0.25);
/// # let _ = spec;
/// ```
pub struct AnimationSpec {
    /// Target value. A single-component animation reads the matching
    /// component.
    pub to: [f32; 4],
    /// Duration in seconds.
    pub duration: f32,
    /// Delay before the first step, in seconds.
    pub delay: f32,
    /// Multiplier applied to `dt`.
    pub rate: f32,
    /// Easing curve.
    pub easing: Easing,
    /// Playback mode.
    pub playback: Playback,
    /// Called once when the animation ends.
    pub on_complete: Option<Completion>,
    /// Opaque words passed back in [`AnimationDone`].
    pub userdata: [u64; 2],
}

impl AnimationSpec {
    /// A linear, play-once animation towards `to`.
    #[must_use]
    pub fn new(to: [f32; 4], duration: f32) -> Self {
        Self {
            to,
            duration,
            delay: 0.0,
            rate: 1.0,
            easing: Easing::LINEAR,
            playback: Playback::OnceForward,
            on_complete: None,
            userdata: [0; 2],
        }
    }

    /// Sets the easing curve.
    #[must_use]
    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Sets the playback mode.
    #[must_use]
    pub fn playback(mut self, playback: Playback) -> Self {
        self.playback = playback;
        self
    }

    /// Sets the start delay.
    #[must_use]
    pub fn delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the playback rate.
    #[must_use]
    pub fn rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the completion callback.
    #[must_use]
    pub fn on_complete(mut self, f: impl FnOnce(&mut Scene, AnimationDone) + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Sets the user-data words.
    #[must_use]
    pub fn userdata(mut self, a: u64, b: u64) -> Self {
        self.userdata = [a, b];
        self
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct AnimFlags: u8 {
        const FIRST_UPDATE = 1 << 0;
        const COMPLETION_CALLED = 1 << 1;
        const CANCELLED = 1 << 2;
        const BACKWARDS = 1 << 3;
    }
}

/// One running animation.
pub(crate) struct Animation {
    key: AnimationKey,
    from: f32,
    to: f32,
    delay: f32,
    elapsed: f32,
    duration: f32,
    rate: f32,
    easing: Easing,
    playback: Playback,
    callback: Option<Completion>,
    userdata: [u64; 2],
    flags: AnimFlags,
}

impl core::fmt::Debug for Animation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Animation")
            .field("key", &self.key)
            .field("elapsed", &self.elapsed)
            .field("duration", &self.duration)
            .field("playback", &self.playback)
            .finish_non_exhaustive()
    }
}

impl Animation {
    pub(crate) fn new(
        key: AnimationKey,
        to: f32,
        duration: f32,
        delay: f32,
        rate: f32,
        easing: Easing,
        playback: Playback,
    ) -> Self {
        Self {
            key,
            from: 0.0,
            to,
            delay: delay.max(0.0),
            elapsed: 0.0,
            duration: duration.max(0.0),
            rate,
            easing,
            playback,
            callback: None,
            userdata: [0; 2],
            flags: AnimFlags::FIRST_UPDATE,
        }
    }

    pub(crate) fn with_callback(mut self, callback: Option<Completion>, userdata: [u64; 2]) -> Self {
        self.callback = callback;
        self.userdata = userdata;
        self
    }

    fn done(&self, finished: bool) -> AnimationDone {
        AnimationDone {
            node: self.key.node,
            property: self.key.property,
            component: self.key.component,
            finished,
            userdata: self.userdata,
        }
    }

    /// Fires the callback unless it already ran.
    fn fire(&mut self, finished: bool, out: &mut Vec<Fired>) {
        if self.flags.contains(AnimFlags::COMPLETION_CALLED) {
            return;
        }
        self.flags.insert(AnimFlags::COMPLETION_CALLED);
        if let Some(cb) = self.callback.take() {
            out.push((cb, self.done(finished)));
        }
    }

    fn is_expired(&self) -> bool {
        self.flags.contains(AnimFlags::CANCELLED)
            || (self.elapsed >= self.duration
                && self.delay == 0.0
                && !self.playback.is_looping()
                && !self.flags.contains(AnimFlags::FIRST_UPDATE))
    }
}

/// Counters from one [`AnimationTable::update`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimationStats {
    /// Animations that advanced.
    pub stepped: u32,
    /// Animations that were removed.
    pub removed: u32,
}

/// Sorted, bounded table of running animations.
#[derive(Debug)]
pub struct AnimationTable {
    entries: Vec<Animation>,
    capacity: usize,
}

impl AnimationTable {
    /// Creates an empty table with room for `capacity` animations.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of running animations, including cancelled ones awaiting
    /// removal.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is animating.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of animations.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if a live (not cancelled) animation drives `key`.
    #[must_use]
    pub fn contains(&self, key: &AnimationKey) -> bool {
        self.find(key)
            .is_ok_and(|i| !self.entries[i].flags.contains(AnimFlags::CANCELLED))
    }

    /// Keys in table order.
    pub fn keys(&self) -> impl Iterator<Item = AnimationKey> + '_ {
        self.entries.iter().map(|a| a.key)
    }

    fn find(&self, key: &AnimationKey) -> core::result::Result<usize, usize> {
        self.entries.binary_search_by(|a| a.key.cmp(key))
    }

    /// Returns `true` if `keys` can all be inserted.
    pub(crate) fn has_room_for(&self, keys: &[AnimationKey]) -> bool {
        let new = keys.iter().filter(|k| self.find(k).is_err()).count();
        self.entries.len() + new <= self.capacity
    }

    /// Detaches the callback of the animation driving `key`, as if it ended
    /// unfinished.
    pub(crate) fn take_callback(&mut self, key: &AnimationKey) -> Option<Fired> {
        let i = self.find(key).ok()?;
        let anim = &mut self.entries[i];
        if anim.flags.contains(AnimFlags::COMPLETION_CALLED) {
            return None;
        }
        let cb = anim.callback.take()?;
        Some((cb, anim.done(false)))
    }

    /// Inserts `anim`, replacing any animation with the same key.
    pub(crate) fn insert(&mut self, anim: Animation) -> Result<()> {
        match self.find(&anim.key) {
            Ok(i) => self.entries[i] = anim,
            Err(i) => {
                if self.entries.len() >= self.capacity {
                    return Err(GuiError::OutOfResources(Resource::Animations));
                }
                self.entries.insert(i, anim);
            }
        }
        Ok(())
    }

    /// Marks animations on `node` cancelled. `component == None` cancels all
    /// four components of `property`.
    pub(crate) fn cancel(&mut self, node: NodeHandle, property: Property, component: Option<u8>) {
        for anim in &mut self.entries {
            if anim.key.node == node
                && anim.key.property == property
                && component.is_none_or(|c| c == anim.key.component)
            {
                anim.flags.insert(AnimFlags::CANCELLED);
            }
        }
    }

    /// Removes every animation on `node`, firing unfinished callbacks.
    pub(crate) fn remove_node(&mut self, node: NodeHandle, out: &mut Vec<Fired>) {
        let start = self.entries.partition_point(|a| a.key.node < node);
        let end = self.entries.partition_point(|a| a.key.node <= node);
        for anim in &mut self.entries[start..end] {
            anim.fire(false, out);
        }
        self.entries.drain(start..end);
    }

    /// Removes every animation, firing unfinished callbacks.
    pub(crate) fn clear(&mut self, out: &mut Vec<Fired>) {
        for anim in &mut self.entries {
            anim.fire(false, out);
        }
        self.entries.clear();
    }

    /// Advances every animation whose node is enabled, writes the driven
    /// values, then removes expired animations.
    ///
    /// Callbacks of animations that ended are appended to `out`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "table length is bounded by a u32 capacity"
    )]
    pub(crate) fn update(
        &mut self,
        store: &mut NodeStore,
        dt: f32,
        out: &mut Vec<Fired>,
    ) -> AnimationStats {
        let mut stats = AnimationStats::default();
        for anim in &mut self.entries {
            if anim
                .flags
                .intersects(AnimFlags::CANCELLED | AnimFlags::COMPLETION_CALLED)
            {
                continue;
            }
            let idx = anim.key.node.index();
            if !store.is_enabled_at(idx) {
                continue;
            }
            stats.stepped += 1;

            if anim.delay > 0.0 && anim.delay >= dt {
                anim.delay -= dt;
                continue;
            }
            if anim.flags.contains(AnimFlags::FIRST_UPDATE) {
                anim.from = store.properties[idx as usize][anim.key.property as usize]
                    [anim.key.component as usize];
                anim.flags.remove(AnimFlags::FIRST_UPDATE);
                // The part of `dt` past the end of the delay is time already
                // spent animating.
                anim.elapsed = -anim.delay.max(0.0);
                anim.delay = 0.0;
            }

            anim.elapsed += dt * anim.rate;
            if anim.elapsed + dt * 0.5 - anim.duration >= 0.0 {
                anim.elapsed = anim.duration;
            }
            let t = if anim.elapsed < anim.duration {
                anim.elapsed / anim.duration
            } else {
                1.0
            };
            let t2 = anim
                .playback
                .remap_with(t, anim.flags.contains(AnimFlags::BACKWARDS));
            let x = anim.easing.eval(t2);
            let value = anim.from * (1.0 - x) + anim.to * x;
            store.set_component_at(idx, anim.key.property, anim.key.component, value);

            if t >= 1.0 {
                if anim.playback.is_looping() {
                    anim.elapsed -= anim.duration;
                    if anim.playback == Playback::LoopPingPong {
                        anim.flags.toggle(AnimFlags::BACKWARDS);
                    }
                } else {
                    anim.fire(true, out);
                }
            }
        }

        let before = self.entries.len();
        let mut i = 0;
        while i < self.entries.len() {
            let anim = &mut self.entries[i];
            let cancelled = anim.flags.contains(AnimFlags::CANCELLED);
            if !cancelled && !store.is_enabled_at(anim.key.node.index()) {
                i += 1;
                continue;
            }
            if anim.is_expired() {
                anim.fire(!cancelled, out);
                self.entries.remove(i);
            } else {
                i += 1;
            }
        }
        stats.removed = (before - self.entries.len()) as u32;
        stats
    }
}
