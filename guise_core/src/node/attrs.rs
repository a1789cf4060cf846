// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Non-animatable node attributes: kind, modes, resource bindings, text, and
//! layout overrides.

use alloc::string::String;
use alloc::vec::Vec;

use crate::animation::Playback;
use crate::collab::{CustomData, FontHandle, ParticlefxPrototype, TextureHandle, TextureKind};
use crate::hash::NameHash;

use super::props::{
    AdjustMode, BlendMode, ClippingMode, NodeType, PieBounds, Pivot, Property, SizeMode, XAnchor,
    YAnchor,
};

/// A texture bound to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureBinding {
    /// Registry key.
    pub id: NameHash,
    /// Which registry the texture came from.
    pub kind: TextureKind,
    /// Renderer handle, or `None` until a dynamic texture is first uploaded.
    pub handle: Option<TextureHandle>,
}

/// A flipbook animation playing on a node's texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Flipbook {
    /// Animation name within the bound texture set.
    pub animation: NameHash,
    /// Number of frames.
    pub frame_count: u32,
    /// Frames per second.
    pub fps: f32,
    /// Playback mode.
    pub playback: Playback,
    /// Normalized position in `[0, 1]`.
    pub cursor: f32,
    elapsed: f32,
}

impl Flipbook {
    /// Starts a flipbook at the beginning.
    #[must_use]
    pub fn new(animation: NameHash, frame_count: u32, fps: f32, playback: Playback) -> Self {
        let cursor = playback.remap(0.0);
        Self {
            animation,
            frame_count,
            fps,
            playback,
            cursor,
            elapsed: 0.0,
        }
    }

    /// Index of the frame under the cursor.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "frame index is clamped to frame_count"
    )]
    pub fn frame(&self) -> u32 {
        if self.frame_count == 0 {
            return 0;
        }
        let last = self.frame_count - 1;
        let f = (self.cursor * self.frame_count as f32) as u32;
        f.min(last)
    }

    /// Advances the cursor by `dt` seconds. Returns `true` once a non-looping
    /// flipbook has reached its end.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "whole loop count of a small positive ratio"
    )]
    pub(crate) fn advance(&mut self, dt: f32) -> bool {
        if self.frame_count == 0 || self.fps <= 0.0 {
            return true;
        }
        let duration = self.frame_count as f32 / self.fps;
        self.elapsed += dt;
        let mut t = self.elapsed / duration;
        let done = t >= 1.0 && !self.playback.is_looping();
        if t >= 1.0 && self.playback.is_looping() {
            self.elapsed -= duration * (t as u32) as f32;
            t = self.elapsed / duration;
        }
        self.cursor = self.playback.remap(t.min(1.0));
        done
    }
}

/// A per-layout snapshot of a node's authored state.
///
/// Applied by [`Scene::set_layout`](crate::scene::Scene::set_layout).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeDesc {
    /// Property values.
    pub properties: [[f32; 4]; Property::COUNT],
    /// Pivot.
    pub pivot: Pivot,
    /// Horizontal anchor.
    pub x_anchor: XAnchor,
    /// Vertical anchor.
    pub y_anchor: YAnchor,
    /// Adjust mode.
    pub adjust_mode: AdjustMode,
    /// Size mode.
    pub size_mode: SizeMode,
}

/// Attributes of one node slot.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeAttrs {
    pub(crate) node_type: NodeType,
    pub(crate) custom_type: u32,
    pub(crate) custom_data: Option<CustomData>,
    pub(crate) id: Option<NameHash>,

    pub(crate) pivot: Pivot,
    pub(crate) x_anchor: XAnchor,
    pub(crate) y_anchor: YAnchor,
    pub(crate) adjust_mode: AdjustMode,
    pub(crate) size_mode: SizeMode,
    pub(crate) blend_mode: BlendMode,
    pub(crate) pie_bounds: PieBounds,
    pub(crate) clipping_mode: ClippingMode,

    pub(crate) layer: NameHash,
    pub(crate) layer_index: u16,
    pub(crate) texture: Option<TextureBinding>,
    pub(crate) font: Option<(NameHash, FontHandle)>,
    pub(crate) particlefx: Option<(NameHash, ParticlefxPrototype)>,

    pub(crate) text: Option<String>,
    pub(crate) flipbook: Option<Flipbook>,
    pub(crate) layouts: Vec<Option<NodeDesc>>,
}

impl NodeAttrs {
    pub(crate) fn new(node_type: NodeType, custom_type: u32) -> Self {
        Self {
            node_type,
            custom_type,
            size_mode: if node_type == NodeType::Text {
                SizeMode::Auto
            } else {
                SizeMode::Manual
            },
            ..Self::default()
        }
    }

    pub(crate) fn describe(&self, properties: &[[f32; 4]; Property::COUNT]) -> NodeDesc {
        NodeDesc {
            properties: *properties,
            pivot: self.pivot,
            x_anchor: self.x_anchor,
            y_anchor: self.y_anchor,
            adjust_mode: self.adjust_mode,
            size_mode: self.size_mode,
        }
    }

    pub(crate) fn apply(&mut self, desc: &NodeDesc) {
        self.pivot = desc.pivot;
        self.x_anchor = desc.x_anchor;
        self.y_anchor = desc.y_anchor;
        self.adjust_mode = desc.adjust_mode;
        self.size_mode = desc.size_mode;
    }
}
