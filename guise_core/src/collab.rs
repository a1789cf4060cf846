// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contracts for the collaborators a scene drives.
//!
//! The core owns the node tree, animations, clipping, and draw ordering. Work
//! that depends on a platform or runtime is delegated through traits:
//!
//! - **[`SceneScript`]**: per-scene behavior. Hooks run during
//!   [`Scene::update`](crate::scene::Scene::update) and when messages, input,
//!   or resizes are dispatched.
//! - **[`Renderer`]**: receives the sorted draw list once per frame and owns
//!   GPU textures.
//! - **[`TextMetricsProvider`]**: measures text for auto-sized text nodes.
//! - **[`ParticleEngine`]**: simulates particle effects bound to nodes.
//! - **[`CustomNodeHandler`]**: owns the payload of custom node types.
//!
//! Handles crossing these boundaries are opaque `u64` newtypes; the core
//! stores and returns them without interpreting them.

use kurbo::{Point, Vec2};

use crate::error::ScriptError;
use crate::hash::NameHash;
use crate::node::NodeHandle;
use crate::render::RenderNode;
use crate::scene::Scene;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);
    };
}

opaque_handle!(
    /// A renderer texture.
    TextureHandle
);
opaque_handle!(
    /// A loaded font.
    FontHandle
);
opaque_handle!(
    /// A particle effect prototype.
    ParticlefxPrototype
);
opaque_handle!(
    /// A running particle effect instance.
    ParticleInstance
);
opaque_handle!(
    /// Per-emitter data handed through to the renderer.
    EmitterRenderData
);
opaque_handle!(
    /// Payload of a custom node.
    CustomData
);

/// Where a texture binding was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// A texture registered with [`Scene::add_texture`](crate::scene::Scene::add_texture).
    Static,
    /// A buffer-backed texture created with
    /// [`Scene::new_dynamic_texture`](crate::scene::Scene::new_dynamic_texture).
    Dynamic,
}

/// Pixel layout of a texture buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One byte per pixel.
    Luminance,
    /// Three bytes per pixel.
    Rgb,
    /// Four bytes per pixel.
    Rgba,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Luminance => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// A message delivered to a scene.
#[derive(Clone, Copy, Debug)]
pub struct Message<'a> {
    /// Message name.
    pub id: NameHash,
    /// Encoded body.
    pub payload: &'a [u8],
    /// Opaque sender address.
    pub sender: u64,
}

/// An input action delivered to a scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputAction {
    /// Action name.
    pub action_id: NameHash,
    /// Analog value, 1.0 for digital buttons.
    pub value: f32,
    /// Went down this frame.
    pub pressed: bool,
    /// Went up this frame.
    pub released: bool,
    /// Repeat event while held.
    pub repeated: bool,
    /// Pointer position in screen space, if the action has one.
    pub position: Option<Point>,
    /// Pointer movement since last frame.
    pub delta: Vec2,
}

/// Measured text.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextMetrics {
    /// Width of the widest line.
    pub width: f32,
    /// Total height.
    pub height: f32,
    /// Number of lines after wrapping.
    pub line_count: u32,
    /// Largest ascent of any glyph.
    pub max_ascent: f32,
    /// Largest descent of any glyph.
    pub max_descent: f32,
    /// Largest advance of any glyph.
    pub max_advance: f32,
}

/// Per-scene behavior.
///
/// Every hook receives the scene mutably; while a hook runs the script is
/// detached from the scene, so a hook cannot re-enter itself. A hook that
/// fails returns a [`ScriptError`], which the scene passes to its caller.
/// Changes the hook made before failing are kept.
///
/// # Frame loop pseudocode
///
/// ```rust,ignore
/// fn on_frame(dt: f32) -> Result<(), GuiError> {
///     for input in pending_input.drain(..) {
///         if scene.dispatch_input(&input)? {
///             continue; // consumed by the UI
///         }
///         game.handle(input);
///     }
///     scene.update(dt)?;       // runs SceneScript::update, animations, flipbooks
///     scene.render(&mut gpu);  // hands the draw list to Renderer::render_nodes
///     Ok(())
/// }
/// ```
pub trait SceneScript {
    /// Runs once, when the script is attached with
    /// [`Scene::init_script`](crate::scene::Scene::init_script).
    fn init(&mut self, scene: &mut Scene) -> Result<(), ScriptError> {
        _ = scene;
        Ok(())
    }

    /// Runs once, before the script is detached.
    fn finalize(&mut self, scene: &mut Scene) -> Result<(), ScriptError> {
        _ = scene;
        Ok(())
    }

    /// Runs at the start of every update.
    fn update(&mut self, scene: &mut Scene, dt: f32) -> Result<(), ScriptError> {
        _ = (scene, dt);
        Ok(())
    }

    /// Handles a message.
    fn on_message(&mut self, scene: &mut Scene, message: &Message<'_>) -> Result<(), ScriptError> {
        _ = (scene, message);
        Ok(())
    }

    /// Handles input. Returns `true` if the input was consumed.
    fn on_input(&mut self, scene: &mut Scene, action: &InputAction) -> Result<bool, ScriptError> {
        _ = (scene, action);
        Ok(false)
    }

    /// Runs after the script's code was reloaded.
    fn on_reload(&mut self, scene: &mut Scene) -> Result<(), ScriptError> {
        _ = scene;
        Ok(())
    }

    /// Runs after the physical resolution changed.
    fn on_resize(&mut self, scene: &mut Scene, width: u32, height: u32) -> Result<(), ScriptError> {
        _ = (scene, width, height);
        Ok(())
    }
}

/// Draws nodes and owns GPU textures.
pub trait Renderer {
    /// Draws one frame's nodes, back to front.
    ///
    /// `scene` can be queried for node attributes such as texture, blend mode,
    /// or text.
    fn render_nodes(&mut self, scene: &Scene, nodes: &[RenderNode]);

    /// Creates a texture and uploads `data`.
    fn new_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: &[u8],
    ) -> TextureHandle;

    /// Replaces the contents (and possibly the size) of a texture.
    fn set_texture_data(
        &mut self,
        texture: TextureHandle,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: &[u8],
    );

    /// Frees a texture.
    fn delete_texture(&mut self, texture: TextureHandle);
}

/// Measures text.
pub trait TextMetricsProvider {
    /// Measures `text` set in `font`.
    ///
    /// With `line_break`, lines wrap at `max_width`.
    fn measure(
        &self,
        font: FontHandle,
        text: &str,
        max_width: f32,
        line_break: bool,
        leading: f32,
        tracking: f32,
    ) -> TextMetrics;
}

/// Simulates particle effects.
pub trait ParticleEngine {
    /// Creates an instance of `prototype`, or `None` if the engine is full.
    fn create_instance(&mut self, prototype: ParticlefxPrototype) -> Option<ParticleInstance>;
    /// Destroys an instance.
    fn destroy_instance(&mut self, instance: ParticleInstance);
    /// Starts emitting.
    fn start(&mut self, instance: ParticleInstance);
    /// Stops emitting. Live particles finish their lifetime.
    fn stop(&mut self, instance: ParticleInstance);
    /// Returns `true` once the instance has stopped and has no live particles.
    fn is_sleeping(&self, instance: ParticleInstance) -> bool;
    /// Moves the instance.
    fn set_position(&mut self, instance: ParticleInstance, position: [f64; 3]);
    /// Rotates the instance (quaternion `[x, y, z, w]`).
    fn set_rotation(&mut self, instance: ParticleInstance, rotation: [f64; 4]);
    /// Scales the instance uniformly.
    fn set_scale(&mut self, instance: ParticleInstance, scale: f64);
    /// Number of emitters.
    fn emitter_count(&self, instance: ParticleInstance) -> u32;
    /// Data the renderer needs to draw emitter `emitter`.
    fn emitter_render_data(&self, instance: ParticleInstance, emitter: u32) -> EmitterRenderData;
    /// Overrides a shader constant on an emitter.
    fn set_render_constant(
        &mut self,
        instance: ParticleInstance,
        emitter: NameHash,
        constant: NameHash,
        value: [f32; 4],
    );
    /// Removes a shader constant override.
    fn reset_render_constant(&mut self, instance: ParticleInstance, emitter: NameHash, constant: NameHash);
}

/// Owns the payload of custom node types.
pub trait CustomNodeHandler {
    /// Creates the payload for a new node.
    fn create(&mut self, node: NodeHandle, custom_type: u32) -> Option<CustomData>;

    /// Frees a node's payload.
    fn destroy(&mut self, node: NodeHandle, custom_type: u32, data: CustomData);

    /// Copies a payload for a cloned node. `node` is the clone.
    fn clone_data(&mut self, node: NodeHandle, custom_type: u32, data: CustomData) -> Option<CustomData>;

    /// Advances a payload by `dt` and returns its replacement.
    fn update(
        &mut self,
        scene: &Scene,
        node: NodeHandle,
        custom_type: u32,
        data: CustomData,
        dt: f32,
    ) -> CustomData {
        _ = (scene, node, custom_type, dt);
        data
    }
}
