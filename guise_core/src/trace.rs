// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for scene updates and renders.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that a
//! [`Scene`](crate::scene::Scene) calls at the end of each update and render.
//! All method bodies default to no-ops, so implementing only the events you
//! care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace` enables the `Tracer` method bodies (one branch per call).

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted at the end of [`Scene::update`](crate::scene::Scene::update).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UpdateEvent {
    /// Per-scene update counter.
    pub frame_index: u64,
    /// Time step in seconds.
    pub dt: f32,
    /// Animations that advanced.
    pub animations_stepped: u32,
    /// Animations removed because they finished or were cancelled.
    pub animations_removed: u32,
    /// Completion callbacks invoked.
    pub callbacks_fired: u32,
    /// Node slots returned to the pool by deferred deletion.
    pub nodes_released: u32,
}

/// Emitted at the end of [`Scene::render`](crate::scene::Scene::render).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderEvent {
    /// Per-scene render counter.
    pub frame_index: u64,
    /// Entries collected from the tree, before pruning.
    pub collected: u32,
    /// Draws handed to the renderer.
    pub emitted: u32,
    /// Clipping nodes that received a stencil scope.
    pub clippers: u32,
    /// The stencil buffer ran out of bits.
    pub stencil_overflow: bool,
    /// Dynamic textures uploaded.
    pub textures_uploaded: u32,
    /// Dynamic textures freed.
    pub textures_deleted: u32,
}

/// Emitted when a scene's resolution changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeEvent {
    /// New physical width.
    pub width: u32,
    /// New physical height.
    pub height: u32,
}

// ---------------------------------------------------------------------------
// TraceSink
// ---------------------------------------------------------------------------

/// Receives trace events. Every method defaults to a no-op.
pub trait TraceSink {
    /// Called after an update.
    fn on_update(&mut self, e: &UpdateEvent) {
        _ = e;
    }

    /// Called after a render.
    fn on_render(&mut self, e: &RenderEvent) {
        _ = e;
    }

    /// Called after a resize.
    fn on_resize(&mut self, e: &ResizeEvent) {
        _ = e;
    }
}

/// A sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits an [`UpdateEvent`].
    #[inline]
    pub fn update(&mut self, e: &UpdateEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_update(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RenderEvent`].
    #[inline]
    pub fn render(&mut self, e: &RenderEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_render(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ResizeEvent`].
    #[inline]
    pub fn resize(&mut self, e: &ResizeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_resize(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        updates: u32,
        renders: u32,
    }

    impl TraceSink for Recorder {
        fn on_update(&mut self, _e: &UpdateEvent) {
            self.updates += 1;
        }

        fn on_render(&mut self, _e: &RenderEvent) {
            self.renders += 1;
        }
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let mut sink = NoopSink;
        sink.on_update(&UpdateEvent::default());
        sink.on_render(&RenderEvent::default());
        sink.on_resize(&ResizeEvent {
            width: 1,
            height: 1,
        });
    }

    #[test]
    fn none_tracer_is_silent() {
        let mut t = Tracer::none();
        t.update(&UpdateEvent::default());
        t.render(&RenderEvent::default());
    }

    #[test]
    fn tracer_dispatches_when_enabled() {
        let mut rec = Recorder::default();
        {
            let mut t = Tracer::new(&mut rec);
            t.update(&UpdateEvent::default());
            t.render(&RenderEvent::default());
            t.render(&RenderEvent::default());
        }
        if cfg!(feature = "trace") {
            assert_eq!((rec.updates, rec.renders), (1, 2));
        } else {
            assert_eq!((rec.updates, rec.renders), (0, 0));
        }
    }
}
