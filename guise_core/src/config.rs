// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene and context configuration.

use crate::node::AdjustReference;

/// A resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a resolution.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `[width, height]` as floats.
    #[inline]
    #[must_use]
    pub fn as_f64(self) -> [f64; 2] {
        [f64::from(self.width), f64::from(self.height)]
    }
}

/// Capacities and policies for a [`Scene`](crate::scene::Scene).
///
/// Every table a scene owns is bounded. Exceeding a bound returns
/// [`GuiError::OutOfResources`](crate::error::GuiError::OutOfResources).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneConfig {
    /// Node pool size. Clamped below `0xffff`, which is reserved as the
    /// invalid index.
    pub max_nodes: u32,
    /// Animation table size.
    pub max_animations: u32,
    /// Texture registry size.
    pub max_textures: u32,
    /// Dynamic texture registry size.
    pub max_dynamic_textures: u32,
    /// Font registry size.
    pub max_fonts: u32,
    /// Particle effect prototype registry size, and the number of live
    /// particle instances.
    pub max_particlefx: u32,
    /// Layer registry size, including the default layer. At most 16 layers fit
    /// in a render key.
    pub max_layers: u32,
    /// Layout table size, including the default layout.
    pub max_layouts: u32,
    /// Adjustment reference policy.
    pub adjust_reference: AdjustReference,
}

impl SceneConfig {
    /// Capacities that suit a typical menu or HUD scene.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            max_nodes: 128,
            max_animations: 128,
            max_textures: 32,
            max_dynamic_textures: 32,
            max_fonts: 4,
            max_particlefx: 8,
            max_layers: 16,
            max_layouts: 8,
            adjust_reference: AdjustReference::Legacy,
        }
    }

    /// Capacities for scenes with many nodes, such as inventory grids.
    #[must_use]
    pub const fn large() -> Self {
        Self {
            max_nodes: 1024,
            max_animations: 1024,
            max_textures: 128,
            max_dynamic_textures: 64,
            max_fonts: 16,
            max_particlefx: 32,
            max_layers: 16,
            max_layouts: 16,
            adjust_reference: AdjustReference::Parent,
        }
    }

    /// Returns a copy with `adjust_reference` replaced.
    #[must_use]
    pub const fn with_adjust_reference(mut self, reference: AdjustReference) -> Self {
        self.adjust_reference = reference;
        self
    }

    /// Node capacity after clamping to the handle's index range.
    #[inline]
    #[must_use]
    pub const fn node_capacity(&self) -> u32 {
        if self.max_nodes > 0xfffe {
            0xfffe
        } else {
            self.max_nodes
        }
    }

    /// Layer capacity after clamping to the render key's layer field.
    #[inline]
    #[must_use]
    pub const fn layer_capacity(&self) -> u32 {
        if self.max_layers > 16 {
            16
        } else {
            self.max_layers
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Engine-wide settings shared by every scene of a
/// [`Context`](crate::context::Context).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContextConfig {
    /// Size of the window or back buffer.
    pub physical: Resolution,
    /// Resolution the content was authored for.
    pub default: Resolution,
    /// Display density.
    pub dpi: f32,
}

impl ContextConfig {
    /// A 1280x720 window showing 1280x720 content.
    #[must_use]
    pub const fn hd() -> Self {
        Self {
            physical: Resolution::new(1280, 720),
            default: Resolution::new(1280, 720),
            dpi: 1.0,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::hd()
    }
}
