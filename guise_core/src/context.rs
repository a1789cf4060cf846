// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared display state and the scenes that use it.

use alloc::vec::Vec;
use core::fmt;

use crate::config::{ContextConfig, Resolution, SceneConfig};
use crate::error::{GuiError, Resource, Result};
use crate::scene::Scene;
use crate::trace::Tracer;

/// Identifies a scene within a [`Context`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneId(u32);

impl SceneId {
    /// Slot index of the scene.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Owns scenes and the resolutions they share.
///
/// Changing a resolution here updates every live scene and runs each
/// script's `on_resize` hook.
pub struct Context {
    config: ContextConfig,
    scenes: Vec<Option<Scene>>,
    max_scenes: usize,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("scenes", &self.len())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Default bound on live scenes.
    pub const DEFAULT_MAX_SCENES: usize = 32;

    /// Creates a context with no scenes.
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self::with_max_scenes(config, Self::DEFAULT_MAX_SCENES)
    }

    /// Creates a context holding at most `max_scenes` live scenes.
    #[must_use]
    pub fn with_max_scenes(config: ContextConfig, max_scenes: usize) -> Self {
        Self {
            config,
            scenes: Vec::new(),
            max_scenes,
        }
    }

    /// Current display configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Number of live scenes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.iter().filter(|s| s.is_some()).count()
    }

    /// Returns `true` if there are no live scenes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a scene. Freed slots are reused.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "scene count is bounded by max_scenes"
    )]
    pub fn new_scene(&mut self, config: SceneConfig) -> Result<SceneId> {
        if self.len() >= self.max_scenes {
            return Err(GuiError::OutOfResources(Resource::Scenes));
        }
        let scene = Scene::new(config, &self.config);
        let slot = match self.scenes.iter().position(Option::is_none) {
            Some(i) => {
                self.scenes[i] = Some(scene);
                i
            }
            None => {
                self.scenes.push(Some(scene));
                self.scenes.len() - 1
            }
        };
        log::debug!("scene {slot} created");
        Ok(SceneId(slot as u32))
    }

    /// The scene with this id, if live.
    #[must_use]
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Mutable access to the scene with this id, if live.
    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Finalizes the scene's script and drops the scene.
    ///
    /// Returns the script's error, if any; the scene is dropped either way.
    pub fn delete_scene(&mut self, id: SceneId) -> Result<()> {
        let Some(mut scene) = self.scenes.get_mut(id.0 as usize).and_then(Option::take) else {
            return Err(GuiError::InvalidValue("no scene with this id"));
        };
        let result = scene.finalize_script();
        scene.clear_nodes();
        result
    }

    /// Size of the window or back buffer.
    #[must_use]
    pub fn physical_resolution(&self) -> Resolution {
        self.config.physical
    }

    /// Resolution content is authored for.
    #[must_use]
    pub fn default_resolution(&self) -> Resolution {
        self.config.default
    }

    /// Display density.
    #[must_use]
    pub fn dpi(&self) -> f32 {
        self.config.dpi
    }

    /// Sets the display density.
    pub fn set_dpi(&mut self, dpi: f32) {
        self.config.dpi = dpi;
        self.propagate(&mut Tracer::none()).ok();
    }

    /// Resizes the window. Every scene is told through `on_resize`.
    ///
    /// All scenes are updated even if a script fails; the first error is
    /// returned.
    pub fn set_physical_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        self.set_physical_resolution_traced(width, height, &mut Tracer::none())
    }

    /// [`set_physical_resolution`](Self::set_physical_resolution), reporting to
    /// `tracer`.
    pub fn set_physical_resolution_traced(
        &mut self,
        width: u32,
        height: u32,
        tracer: &mut Tracer<'_>,
    ) -> Result<()> {
        self.config.physical = Resolution::new(width, height);
        self.propagate(tracer)
    }

    /// Changes the authored resolution of every scene without its own.
    pub fn set_default_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        self.config.default = Resolution::new(width, height);
        self.propagate(&mut Tracer::none())
    }

    fn propagate(&mut self, tracer: &mut Tracer<'_>) -> Result<()> {
        let mut first = Ok(());
        for scene in self.scenes.iter_mut().flatten() {
            let result = scene.apply_context(&self.config, tracer);
            if first.is_ok() {
                first = result;
            }
        }
        first
    }
}
