// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene: one UI tree with its resources, animations, and collaborators.
//!
//! A [`Scene`] owns a [`NodeStore`], an [`AnimationTable`], the resource
//! registries, and per-frame scratch. The host drives it with two calls per
//! frame:
//!
//! 1. [`Scene::update`] runs the script's update hook, steps animations and
//!    flipbooks, updates custom nodes and particle instances, and finishes
//!    deferred deletions.
//! 2. [`Scene::render`] uploads dynamic textures, recomputes transforms,
//!    allocates stencil scopes, and hands the sorted draw list to a
//!    [`Renderer`].
//!
//! Node handles stay valid until [`Scene::delete_node`]. Deleting a node
//! whose subtree still has live particles hides it at once but keeps its
//! slots until the particles have died out.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::adjust::{
    Viewport, WorldCache, boundary_transform, flush_local_transforms, hit_test,
    world_to_local_position,
};
use crate::animation::{Animation, AnimationKey, AnimationSpec, AnimationTable, Fired, Playback};
use crate::clipping::ClipAllocator;
use crate::collab::{
    CustomData, CustomNodeHandler, FontHandle, InputAction, Message, ParticleEngine,
    ParticleInstance, ParticlefxPrototype, PixelFormat, Renderer, SceneScript, TextMetrics,
    TextMetricsProvider, TextureHandle, TextureKind,
};
use crate::config::{ContextConfig, Resolution, SceneConfig};
use crate::error::{GuiError, Resource, Result, ScriptError};
use crate::hash::NameHash;
use crate::node::{
    AdjustMode, AnimationTarget, BlendMode, ClippingMode, Flipbook, INVALID, NodeDesc, NodeFlags,
    NodeHandle, NodeStore, NodeType, PieBounds, Pivot, Property, SizeMode, TextureBinding,
    XAnchor, YAnchor,
};
use crate::registry::{DynamicTextures, FontRegistry, NameTable, Registry, TextureData, TextureEvent};
use crate::render::{RenderList, resolve_layer};
use crate::trace::{RenderEvent, ResizeEvent, Tracer, UpdateEvent};
use crate::transform::{Transform3d, euler_to_quat};

#[derive(Clone, Copy, Debug)]
struct ParticleSlot {
    node: NodeHandle,
    instance: ParticleInstance,
    stopped: bool,
}

/// Sizes nodes for drawing and picking.
struct Sizer<'a> {
    nodes: &'a NodeStore,
    fonts: &'a FontRegistry,
    default_font: Option<NameHash>,
    metrics: Option<&'a dyn TextMetricsProvider>,
}

impl Sizer<'_> {
    fn font(&self, idx: u16) -> Option<FontHandle> {
        match self.nodes.attrs[idx as usize].font {
            Some((_, handle)) => Some(handle),
            None => self
                .default_font
                .and_then(|f| self.fonts.get(f))
                .map(|f| f.handle),
        }
    }

    fn measure(&self, idx: u16) -> Option<TextMetrics> {
        let i = idx as usize;
        let metrics = self.metrics?;
        let font = self.font(idx)?;
        let text = self.nodes.attrs[i].text.as_deref().unwrap_or("");
        let props = &self.nodes.properties[i];
        let params = props[Property::TextParams as usize];
        Some(metrics.measure(
            font,
            text,
            props[Property::Size as usize][0],
            self.nodes.flags[i].contains(NodeFlags::LINE_BREAK),
            params[0],
            params[1],
        ))
    }

    fn size(&self, idx: u16) -> [f64; 2] {
        let i = idx as usize;
        let attrs = &self.nodes.attrs[i];
        if attrs.node_type == NodeType::Text && attrs.size_mode == SizeMode::Auto {
            if let Some(m) = self.measure(idx) {
                return [f64::from(m.width), f64::from(m.max_ascent + m.max_descent)];
            }
        }
        let s = self.nodes.properties[i][Property::Size as usize];
        [f64::from(s[0]), f64::from(s[1])]
    }
}

/// Pre-order slot indices of the subtree at `root`, pending nodes included.
fn subtree_indices(nodes: &NodeStore, root: u16) -> Vec<u16> {
    let mut out = Vec::new();
    let mut stack = alloc::vec![root];
    while let Some(idx) = stack.pop() {
        out.push(idx);
        let mut child = nodes.first_child[idx as usize];
        while child != INVALID {
            stack.push(child);
            child = nodes.next_sibling[child as usize];
        }
    }
    out
}

fn is_under(nodes: &NodeStore, mut idx: u16, root: u16) -> bool {
    while idx != INVALID {
        if idx == root {
            return true;
        }
        idx = nodes.parent[idx as usize];
    }
    false
}

/// One UI scene.
pub struct Scene {
    config: SceneConfig,
    nodes: NodeStore,
    animations: AnimationTable,

    textures: Registry<TextureHandle>,
    dynamic_textures: DynamicTextures,
    fonts: FontRegistry,
    default_font: Option<NameHash>,
    particlefx: Registry<ParticlefxPrototype>,
    layers: NameTable,
    layouts: NameTable,
    layout: u16,

    physical: Resolution,
    default_resolution: Resolution,
    resolution: Option<Resolution>,
    dpi: f32,

    world: WorldCache,
    clips: ClipAllocator,
    draws: RenderList,
    fired: Vec<Fired>,
    doomed: Vec<NodeHandle>,
    instances: Vec<ParticleSlot>,

    script: Option<Box<dyn SceneScript>>,
    text_metrics: Option<Box<dyn TextMetricsProvider>>,
    particles: Option<Box<dyn ParticleEngine>>,
    custom_nodes: Option<Box<dyn CustomNodeHandler>>,

    update_count: u64,
    render_count: u64,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.nodes.len())
            .field("animations", &self.animations.len())
            .field("resolution", &self.resolution())
            .field("script", &self.script.is_some())
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Creates an empty scene sized by `config`, using the resolutions of
    /// `context`.
    #[must_use]
    pub fn new(config: SceneConfig, context: &ContextConfig) -> Self {
        let node_capacity = config.node_capacity();
        Self {
            config,
            nodes: NodeStore::new(node_capacity),
            animations: AnimationTable::new(config.max_animations as usize),
            textures: Registry::new(config.max_textures as usize, Resource::Textures),
            dynamic_textures: DynamicTextures::new(config.max_dynamic_textures as usize),
            fonts: FontRegistry::new(config.max_fonts as usize),
            default_font: None,
            particlefx: Registry::new(config.max_particlefx as usize, Resource::Particlefx),
            layers: NameTable::new(config.layer_capacity() as usize, Resource::Layers),
            layouts: NameTable::new(config.max_layouts as usize, Resource::Layouts),
            layout: 0,
            physical: context.physical,
            default_resolution: context.default,
            resolution: None,
            dpi: context.dpi,
            world: WorldCache::new(node_capacity as usize),
            clips: ClipAllocator::new(),
            draws: RenderList::new(),
            fired: Vec::new(),
            doomed: Vec::new(),
            instances: Vec::new(),
            script: None,
            text_metrics: None,
            particles: None,
            custom_nodes: None,
            update_count: 0,
            render_count: 0,
        }
    }

    /// The configuration the scene was created with.
    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Read access to the node tree.
    #[must_use]
    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    /// Read access to running animations.
    #[must_use]
    pub fn animations(&self) -> &AnimationTable {
        &self.animations
    }

    // -- Collaborators --

    /// Attaches `script` and runs its `init` hook. A script already attached
    /// is finalized first.
    pub fn init_script(&mut self, script: Box<dyn SceneScript>) -> Result<()> {
        self.finalize_script()?;
        self.script = Some(script);
        self.with_script(|s, scene| s.init(scene))
    }

    /// Runs the `finalize` hook and detaches the script.
    pub fn finalize_script(&mut self) -> Result<()> {
        let result = self.with_script(|s, scene| s.finalize(scene));
        self.script = None;
        result
    }

    /// Runs the `on_reload` hook.
    pub fn reload_script(&mut self) -> Result<()> {
        self.with_script(|s, scene| s.on_reload(scene))
    }

    /// Installs the text measurer.
    pub fn set_text_metrics(&mut self, provider: Box<dyn TextMetricsProvider>) {
        self.text_metrics = Some(provider);
    }

    /// Installs the particle engine.
    pub fn set_particle_engine(&mut self, engine: Box<dyn ParticleEngine>) {
        self.particles = Some(engine);
    }

    /// Installs the custom node handler.
    pub fn set_custom_node_handler(&mut self, handler: Box<dyn CustomNodeHandler>) {
        self.custom_nodes = Some(handler);
    }

    fn with_script<R: Default>(
        &mut self,
        f: impl FnOnce(&mut dyn SceneScript, &mut Self) -> core::result::Result<R, ScriptError>,
    ) -> Result<R> {
        let Some(mut script) = self.script.take() else {
            return Ok(R::default());
        };
        let result = f(&mut *script, self);
        if self.script.is_none() {
            self.script = Some(script);
        }
        result.map_err(GuiError::from)
    }

    // -- Resolution --

    /// Size of the window or back buffer.
    #[must_use]
    pub fn physical_resolution(&self) -> Resolution {
        self.physical
    }

    /// Resolution content is authored for, from the context.
    #[must_use]
    pub fn default_resolution(&self) -> Resolution {
        self.default_resolution
    }

    /// Logical resolution: the scene override if set, else the default.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.resolution.unwrap_or(self.default_resolution)
    }

    /// Display density.
    #[must_use]
    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Overrides the logical resolution of this scene.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = Some(Resolution::new(width, height));
        self.nodes.mark_all_transforms();
    }

    /// Takes new context resolutions and runs the `on_resize` hook.
    pub(crate) fn apply_context(&mut self, context: &ContextConfig, tracer: &mut Tracer<'_>) -> Result<()> {
        self.physical = context.physical;
        self.default_resolution = context.default;
        self.dpi = context.dpi;
        self.nodes.mark_all_transforms();
        let Resolution { width, height } = context.physical;
        tracer.resize(&ResizeEvent { width, height });
        self.with_script(|s, scene| s.on_resize(scene, width, height))
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            physical: self.physical.as_f64(),
            design: self.resolution().as_f64(),
            reference: self.config.adjust_reference,
        }
    }

    fn sizer(&self) -> Sizer<'_> {
        Sizer {
            nodes: &self.nodes,
            fonts: &self.fonts,
            default_font: self.default_font,
            metrics: self.text_metrics.as_deref(),
        }
    }

    // -- Node lifecycle --

    /// Creates a node at the top of the root list.
    pub fn new_node(&mut self, position: [f32; 3], size: [f32; 3], node_type: NodeType) -> Result<NodeHandle> {
        self.nodes.allocate(position, size, node_type, 0)
    }

    /// Creates a custom node, asking the installed handler for its payload.
    pub fn new_custom_node(&mut self, position: [f32; 3], size: [f32; 3], custom_type: u32) -> Result<NodeHandle> {
        let node = self.nodes.allocate(position, size, NodeType::Custom, custom_type)?;
        if let Some(handler) = self.custom_nodes.as_deref_mut() {
            self.nodes.attrs_mut(node).custom_data = handler.create(node, custom_type);
        }
        Ok(node)
    }

    /// Returns `true` if `node` is live and not deleted.
    #[must_use]
    pub fn is_valid(&self, node: NodeHandle) -> bool {
        self.nodes.is_valid(node)
            && !self.nodes.flags[node.index() as usize].contains(NodeFlags::PENDING_DELETE)
    }

    /// Deletes `node` and its subtree.
    ///
    /// Animations on the subtree end, firing their callbacks unfinished, and
    /// particle instances stop. The nodes leave the tree at once; their slots
    /// are reclaimed once no particle instance under them is still alive.
    /// Deleting a node twice is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn delete_node(&mut self, node: NodeHandle) {
        self.nodes.validate(node);
        let root = node.index();
        if self.nodes.flags[root as usize].contains(NodeFlags::PENDING_DELETE) {
            return;
        }
        self.nodes.unlink(root);
        for idx in subtree_indices(&self.nodes, root) {
            let handle = self.nodes.handle_at(idx);
            self.animations.remove_node(handle, &mut self.fired);
            self.nodes.flags[idx as usize].insert(NodeFlags::PENDING_DELETE);
        }
        if let Some(engine) = self.particles.as_deref_mut() {
            for slot in &mut self.instances {
                if !slot.stopped && is_under(&self.nodes, slot.node.index(), root) {
                    engine.stop(slot.instance);
                    slot.stopped = true;
                }
            }
        }
        self.doomed.push(node);
        self.reap_particles();
        let released = self.sweep_doomed();
        if released == 0 {
            log::debug!("deletion of {node:?} deferred until its particles die out");
        }
        self.run_callbacks();
    }

    /// Deletes `node` and its subtree without waiting for particles.
    ///
    /// Particle instances under the node are destroyed at once. Also finishes
    /// an earlier deferred deletion of the same node.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn delete_node_immediate(&mut self, node: NodeHandle) {
        self.nodes.validate(node);
        let root = node.index();
        if let Some(engine) = self.particles.as_deref_mut() {
            let nodes = &self.nodes;
            self.instances.retain(|slot| {
                if is_under(nodes, slot.node.index(), root) {
                    engine.destroy_instance(slot.instance);
                    false
                } else {
                    true
                }
            });
        }
        if self.nodes.flags[root as usize].contains(NodeFlags::PENDING_DELETE) {
            self.sweep_doomed();
        } else {
            self.delete_node(node);
        }
    }

    /// Deletes every node, ending all animations and particle instances.
    pub fn clear_nodes(&mut self) {
        self.animations.clear(&mut self.fired);
        if let Some(engine) = self.particles.as_deref_mut() {
            for slot in self.instances.drain(..) {
                engine.destroy_instance(slot.instance);
            }
        }
        self.instances.clear();
        let live: Vec<u16> = self.nodes.live_indices().collect();
        for &idx in &live {
            self.nodes.flags[idx as usize].insert(NodeFlags::PENDING_DELETE);
        }
        for idx in live {
            self.release_slot(idx);
        }
        self.nodes.root_head = INVALID;
        self.nodes.root_tail = INVALID;
        self.doomed.clear();
        self.run_callbacks();
    }

    fn release_slot(&mut self, idx: u16) {
        let handle = self.nodes.handle_at(idx);
        let attrs = &mut self.nodes.attrs[idx as usize];
        if let (Some(data), Some(handler)) = (attrs.custom_data.take(), self.custom_nodes.as_deref_mut()) {
            handler.destroy(handle, attrs.custom_type, data);
        }
        self.nodes.release(handle);
    }

    /// Releases doomed subtrees that hold no particle instance. Returns the
    /// number of slots freed.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "subtree sizes are bounded by the u16 node pool"
    )]
    fn sweep_doomed(&mut self) -> u32 {
        let mut released = 0;
        let mut i = 0;
        while i < self.doomed.len() {
            let root = self.doomed[i].index();
            if self
                .instances
                .iter()
                .any(|s| is_under(&self.nodes, s.node.index(), root))
            {
                i += 1;
                continue;
            }
            self.doomed.swap_remove(i);
            let order = subtree_indices(&self.nodes, root);
            for &idx in order.iter().rev() {
                self.release_slot(idx);
            }
            released += order.len() as u32;
        }
        released
    }

    /// Copies `node` without its children. The copy is placed at the top of
    /// the root list and keeps the flipbook position; particle instances and
    /// animations are not copied.
    pub fn clone_node(&mut self, node: NodeHandle) -> Result<NodeHandle> {
        self.nodes.validate(node);
        self.clone_slot(node.index())
    }

    fn clone_slot(&mut self, src: u16) -> Result<NodeHandle> {
        let s = src as usize;
        let (node_type, custom_type) = (self.nodes.attrs[s].node_type, self.nodes.attrs[s].custom_type);
        let copy = self.nodes.allocate([0.0; 3], [0.0; 3], node_type, custom_type)?;
        let c = copy.index() as usize;
        self.nodes.properties[c] = self.nodes.properties[s];
        let mut attrs = self.nodes.attrs[s].clone();
        if let Some(data) = attrs.custom_data.take() {
            if let Some(handler) = self.custom_nodes.as_deref_mut() {
                attrs.custom_data = handler.clone_data(copy, attrs.custom_type, data);
            }
        }
        self.nodes.attrs[c] = attrs;
        self.nodes.flags[c] = self.nodes.flags[s] - NodeFlags::PENDING_DELETE;
        self.nodes.mark_transform(copy.index(), true);
        Ok(copy)
    }

    /// Copies `node` and its subtree. The copy is appended to the original's
    /// parent.
    ///
    /// Fails without creating anything if the pool cannot hold the copy.
    pub fn clone_tree(&mut self, node: NodeHandle) -> Result<NodeHandle> {
        self.nodes.validate(node);
        let count = subtree_indices(&self.nodes, node.index()).len();
        if self.nodes.len() + count > self.nodes.capacity() {
            return Err(GuiError::OutOfResources(Resource::Nodes));
        }
        let parent = self.nodes.parent(node);
        let root = self.clone_slot(node.index())?;
        self.nodes.set_parent(root, parent)?;
        let mut stack = alloc::vec![(node, root)];
        while let Some((src, dst)) = stack.pop() {
            let children: Vec<NodeHandle> = self.nodes.children(src).collect();
            for child in children {
                let copy = self.clone_slot(child.index())?;
                self.nodes.set_parent(copy, Some(dst))?;
                stack.push((child, copy));
            }
        }
        Ok(root)
    }

    /// Finds a node by id.
    ///
    /// Deleted nodes awaiting reclamation are skipped; among live matches the
    /// lowest slot wins.
    #[must_use]
    pub fn node_by_id(&self, id: NameHash) -> Option<NodeHandle> {
        self.nodes
            .live_indices()
            .find(|&idx| {
                let i = idx as usize;
                self.nodes.attrs[i].id == Some(id)
                    && !self.nodes.flags[i].contains(NodeFlags::PENDING_DELETE)
            })
            .map(|idx| self.nodes.handle_at(idx))
    }

    /// Sets the node's id.
    pub fn set_node_id(&mut self, node: NodeHandle, id: NameHash) {
        self.nodes.attrs_mut(node).id = Some(id);
    }

    /// The node's id.
    #[must_use]
    pub fn node_id(&self, node: NodeHandle) -> Option<NameHash> {
        self.nodes.attrs(node).id
    }

    // -- Tree --

    /// Moves `node` under `parent`, or to the root list.
    ///
    /// With `keep_world`, the node's position is recomputed so it stays at
    /// the same place on screen.
    pub fn set_parent(&mut self, node: NodeHandle, parent: Option<NodeHandle>, keep_world: bool) -> Result<()> {
        if !keep_world {
            return self.nodes.set_parent(node, parent);
        }
        let world = self.world_transform(node).translation();
        self.nodes.set_parent(node, parent)?;
        self.place_at_world(node, world);
        Ok(())
    }

    /// Moves `node` so it paints directly above `reference`. See
    /// [`NodeStore::move_above`].
    pub fn move_above(&mut self, node: NodeHandle, reference: Option<NodeHandle>) -> Result<()> {
        self.nodes.move_above(node, reference)
    }

    /// Moves `node` so it paints directly below `reference`. See
    /// [`NodeStore::move_below`].
    pub fn move_below(&mut self, node: NodeHandle, reference: Option<NodeHandle>) -> Result<()> {
        self.nodes.move_below(node, reference)
    }

    // -- Spatial queries --

    fn flush(&mut self) {
        let vp = self.viewport();
        flush_local_transforms(&mut self.nodes, &vp);
        self.world.invalidate();
    }

    /// Current world transform of `node`.
    pub fn world_transform(&mut self, node: NodeHandle) -> Transform3d {
        self.nodes.validate(node);
        self.flush();
        self.world.resolve(&self.nodes, node.index()).0
    }

    /// Local position that would put `node` at `world` under its current
    /// parent.
    fn local_for_world(&mut self, node: NodeHandle, world: [f64; 3]) -> [f64; 3] {
        self.flush();
        let idx = node.index();
        let parent = self.nodes.parent[idx as usize];
        let parent_world = if parent == INVALID {
            Transform3d::IDENTITY
        } else {
            self.world.resolve(&self.nodes, parent).0
        };
        let vp = self.viewport();
        world_to_local_position(&self.nodes, &vp, idx, parent, parent_world, world)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "properties are stored as f32"
    )]
    fn place_at_world(&mut self, node: NodeHandle, world: [f64; 3]) {
        let local = self.local_for_world(node, world);
        let w = self.nodes.property(node, Property::Position)[3];
        self.nodes.set_property(
            node,
            Property::Position,
            [local[0] as f32, local[1] as f32, local[2] as f32, w],
        );
    }

    /// Position in `node`'s parent space that corresponds to screen point
    /// `screen`, keeping the node's current depth.
    pub fn screen_to_local(&mut self, node: NodeHandle, screen: [f64; 2]) -> [f64; 3] {
        let z = self.world_transform(node).translation()[2];
        self.local_for_world(node, [screen[0], screen[1], z])
    }

    /// Moves `node` so its pivot lands on screen point `screen`.
    pub fn set_screen_position(&mut self, node: NodeHandle, screen: [f64; 2]) {
        let z = self.world_transform(node).translation()[2];
        self.place_at_world(node, [screen[0], screen[1], z]);
    }

    /// Returns `true` if screen point `(x, y)` lies on the node's rectangle.
    pub fn pick_node(&mut self, node: NodeHandle, x: f64, y: f64) -> bool {
        let world = self.world_transform(node);
        let idx = node.index();
        let size = self.sizer().size(idx);
        let pivot = self.nodes.attrs[idx as usize].pivot;
        hit_test(boundary_transform(world, pivot, size), [x, y])
    }

    // -- Properties and flags --

    /// A property value.
    #[must_use]
    pub fn property(&self, node: NodeHandle, property: Property) -> [f32; 4] {
        self.nodes.property(node, property)
    }

    /// Sets a property value. Running animations on it keep running.
    pub fn set_property(&mut self, node: NodeHandle, property: Property, value: [f32; 4]) {
        self.nodes.set_property(node, property, value);
    }

    /// The node's flags.
    #[must_use]
    pub fn flags(&self, node: NodeHandle) -> NodeFlags {
        self.nodes.flags(node)
    }

    /// Sets or clears flags. Use [`set_enabled`](Self::set_enabled) for
    /// [`NodeFlags::ENABLED`].
    pub fn set_flags(&mut self, node: NodeHandle, flags: NodeFlags, on: bool) {
        self.nodes
            .set_flags(node, flags - NodeFlags::PENDING_DELETE, on);
    }

    /// Enables or disables a node. Disabled subtrees are not drawn and their
    /// animations pause.
    pub fn set_enabled(&mut self, node: NodeHandle, enabled: bool) {
        self.nodes.set_flags(node, NodeFlags::ENABLED, enabled);
    }

    /// Returns `true` if the node, and with `recursive` every ancestor, is
    /// enabled.
    #[must_use]
    pub fn is_enabled(&self, node: NodeHandle, recursive: bool) -> bool {
        self.nodes.is_enabled(node, recursive)
    }

    /// Shows or hides a node. Hidden nodes still clip and their children
    /// still draw.
    pub fn set_visible(&mut self, node: NodeHandle, visible: bool) {
        self.nodes.set_flags(node, NodeFlags::VISIBLE, visible);
    }

    /// The node's kind.
    #[must_use]
    pub fn node_type(&self, node: NodeHandle) -> NodeType {
        self.nodes.node_type(node)
    }

    /// Custom type id, for custom nodes.
    #[must_use]
    pub fn custom_type(&self, node: NodeHandle) -> u32 {
        self.nodes.attrs(node).custom_type
    }

    /// Payload of a custom node.
    #[must_use]
    pub fn custom_data(&self, node: NodeHandle) -> Option<CustomData> {
        self.nodes.attrs(node).custom_data
    }

    /// The node's pivot.
    #[must_use]
    pub fn pivot(&self, node: NodeHandle) -> Pivot {
        self.nodes.attrs(node).pivot
    }

    /// Sets the pivot.
    pub fn set_pivot(&mut self, node: NodeHandle, pivot: Pivot) {
        self.nodes.attrs_mut(node).pivot = pivot;
        self.nodes.mark_transform(node.index(), true);
    }

    /// Sets the anchors.
    pub fn set_anchors(&mut self, node: NodeHandle, x: XAnchor, y: YAnchor) {
        let attrs = self.nodes.attrs_mut(node);
        attrs.x_anchor = x;
        attrs.y_anchor = y;
        self.nodes.mark_transform(node.index(), false);
    }

    /// The node's anchors.
    #[must_use]
    pub fn anchors(&self, node: NodeHandle) -> (XAnchor, YAnchor) {
        let attrs = self.nodes.attrs(node);
        (attrs.x_anchor, attrs.y_anchor)
    }

    /// The node's adjust mode.
    #[must_use]
    pub fn adjust_mode(&self, node: NodeHandle) -> AdjustMode {
        self.nodes.attrs(node).adjust_mode
    }

    /// Sets the adjust mode.
    pub fn set_adjust_mode(&mut self, node: NodeHandle, mode: AdjustMode) {
        self.nodes.attrs_mut(node).adjust_mode = mode;
        self.nodes.mark_transform(node.index(), true);
    }

    /// The node's size mode.
    #[must_use]
    pub fn size_mode(&self, node: NodeHandle) -> SizeMode {
        self.nodes.attrs(node).size_mode
    }

    /// Sets the size mode.
    pub fn set_size_mode(&mut self, node: NodeHandle, mode: SizeMode) {
        self.nodes.attrs_mut(node).size_mode = mode;
    }

    /// The node's blend mode.
    #[must_use]
    pub fn blend_mode(&self, node: NodeHandle) -> BlendMode {
        self.nodes.attrs(node).blend_mode
    }

    /// Sets the blend mode.
    pub fn set_blend_mode(&mut self, node: NodeHandle, mode: BlendMode) {
        self.nodes.attrs_mut(node).blend_mode = mode;
    }

    /// The pie node's outer bounds.
    #[must_use]
    pub fn pie_bounds(&self, node: NodeHandle) -> PieBounds {
        self.nodes.attrs(node).pie_bounds
    }

    /// Sets the pie node's outer bounds.
    pub fn set_pie_bounds(&mut self, node: NodeHandle, bounds: PieBounds) {
        self.nodes.attrs_mut(node).pie_bounds = bounds;
    }

    /// The node's clipping mode.
    #[must_use]
    pub fn clipping_mode(&self, node: NodeHandle) -> ClippingMode {
        self.nodes.attrs(node).clipping_mode
    }

    /// Sets the clipping mode.
    pub fn set_clipping_mode(&mut self, node: NodeHandle, mode: ClippingMode) {
        self.nodes.attrs_mut(node).clipping_mode = mode;
    }

    // -- Layers --

    /// Registers a layer. Layers paint in registration order, after the
    /// default layer.
    pub fn add_layer(&mut self, name: NameHash) -> Result<u16> {
        self.layers.add(name)
    }

    /// Index of a registered layer.
    #[must_use]
    pub fn layer_index(&self, name: NameHash) -> Option<u16> {
        self.layers.index_of(name)
    }

    /// Puts `node` on a registered layer. The empty name selects the default
    /// layer, which inherits the parent's.
    pub fn set_node_layer(&mut self, node: NodeHandle, layer: NameHash) -> Result<()> {
        self.nodes.validate(node);
        let index = self
            .layers
            .index_of(layer)
            .ok_or(GuiError::ResourceNotFound(layer))?;
        let attrs = self.nodes.attrs_mut(node);
        attrs.layer = layer;
        attrs.layer_index = index;
        Ok(())
    }

    /// The node's own layer.
    #[must_use]
    pub fn node_layer(&self, node: NodeHandle) -> NameHash {
        self.nodes.attrs(node).layer
    }

    /// Index of the layer the node paints on, after inheritance.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "layer indices are at most 4 bits"
    )]
    pub fn resolved_layer_index(&self, node: NodeHandle) -> u16 {
        self.nodes.validate(node);
        resolve_layer(&self.nodes, node.index()) as u16
    }

    // -- Textures --

    /// Registers a renderer texture. Nodes already bound to `name` pick it up.
    pub fn add_texture(&mut self, name: NameHash, texture: TextureHandle) -> Result<()> {
        self.textures.insert(name, texture)?;
        self.rebind_textures(name, TextureKind::Static, Some(texture));
        Ok(())
    }

    /// Unregisters a texture. Nodes bound to it draw untextured.
    pub fn remove_texture(&mut self, name: NameHash) {
        self.textures.remove(name);
        self.rebind_textures(name, TextureKind::Static, None);
    }

    /// Unregisters every texture.
    pub fn clear_textures(&mut self) {
        let names: Vec<NameHash> = self.textures.iter().map(|(k, _)| k).collect();
        for name in names {
            self.remove_texture(name);
        }
    }

    fn rebind_textures(&mut self, name: NameHash, kind: TextureKind, handle: Option<TextureHandle>) {
        for attrs in &mut self.nodes.attrs {
            if let Some(binding) = &mut attrs.texture {
                if binding.id == name && binding.kind == kind {
                    binding.handle = handle;
                }
            }
        }
    }

    /// Stages a buffer-backed texture. It is uploaded on the next render.
    pub fn new_dynamic_texture(
        &mut self,
        name: NameHash,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: &[u8],
    ) -> Result<()> {
        self.dynamic_textures.create(name, width, height, format, data)
    }

    /// Stages new contents for a dynamic texture.
    pub fn set_dynamic_texture_data(
        &mut self,
        name: NameHash,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: &[u8],
    ) -> Result<()> {
        self.dynamic_textures.set_data(name, width, height, format, data)
    }

    /// Stages deletion of a dynamic texture.
    pub fn delete_dynamic_texture(&mut self, name: NameHash) -> Result<()> {
        self.dynamic_textures.delete(name)
    }

    /// Contents of a dynamic texture.
    pub fn dynamic_texture_data(&self, name: NameHash) -> Result<TextureData<'_>> {
        self.dynamic_textures.data(name)
    }

    /// Binds a texture by name, looking in registered textures first, then
    /// dynamic ones.
    ///
    /// If neither has `name`, the node's texture is cleared and
    /// [`GuiError::ResourceNotFound`] is returned.
    pub fn set_node_texture(&mut self, node: NodeHandle, name: NameHash) -> Result<()> {
        self.nodes.validate(node);
        let binding = if let Some(&handle) = self.textures.get(name) {
            Some(TextureBinding {
                id: name,
                kind: TextureKind::Static,
                handle: Some(handle),
            })
        } else if self.dynamic_textures.contains(name) {
            Some(TextureBinding {
                id: name,
                kind: TextureKind::Dynamic,
                handle: self.dynamic_textures.handle(name),
            })
        } else {
            None
        };
        let attrs = self.nodes.attrs_mut(node);
        attrs.texture = binding;
        match binding {
            Some(_) => Ok(()),
            None => {
                attrs.flipbook = None;
                Err(GuiError::ResourceNotFound(name))
            }
        }
    }

    /// The node's texture binding.
    #[must_use]
    pub fn node_texture(&self, node: NodeHandle) -> Option<TextureBinding> {
        self.nodes.attrs(node).texture
    }

    // -- Fonts and text --

    /// Registers a font loaded from `path`. The first font registered becomes
    /// the default for text nodes without one.
    pub fn add_font(&mut self, name: NameHash, font: FontHandle, path: NameHash) -> Result<()> {
        self.fonts.insert(name, font, path)?;
        self.default_font.get_or_insert(name);
        for attrs in &mut self.nodes.attrs {
            if let Some((id, handle)) = &mut attrs.font {
                if *id == name {
                    *handle = font;
                }
            }
        }
        Ok(())
    }

    /// Unregisters a font. Nodes using it fall back to the default font.
    pub fn remove_font(&mut self, name: NameHash) {
        if self.fonts.remove(name).is_none() {
            return;
        }
        if self.default_font == Some(name) {
            self.default_font = None;
        }
        for attrs in &mut self.nodes.attrs {
            if attrs.font.is_some_and(|(id, _)| id == name) {
                attrs.font = None;
            }
        }
    }

    /// Resource path of a registered font.
    #[must_use]
    pub fn font_path(&self, name: NameHash) -> Option<NameHash> {
        self.fonts.path_of(name)
    }

    /// Name of the font loaded from `path`.
    #[must_use]
    pub fn font_for_path(&self, path: NameHash) -> Option<NameHash> {
        self.fonts.id_for_path(path)
    }

    /// Sets the node's font. An unknown name clears it and returns
    /// [`GuiError::ResourceNotFound`].
    pub fn set_node_font(&mut self, node: NodeHandle, name: NameHash) -> Result<()> {
        self.nodes.validate(node);
        let font = self.fonts.get(name).map(|f| (name, f.handle));
        self.nodes.attrs_mut(node).font = font;
        font.map(|_| ()).ok_or(GuiError::ResourceNotFound(name))
    }

    /// The node's font.
    #[must_use]
    pub fn node_font(&self, node: NodeHandle) -> Option<NameHash> {
        self.nodes.attrs(node).font.map(|(id, _)| id)
    }

    /// Sets the node's text.
    pub fn set_text(&mut self, node: NodeHandle, text: &str) {
        self.nodes.attrs_mut(node).text = Some(String::from(text));
    }

    /// The node's text.
    #[must_use]
    pub fn text(&self, node: NodeHandle) -> Option<&str> {
        self.nodes.attrs(node).text.as_deref()
    }

    /// Measures `text` in a registered font.
    pub fn text_metrics(
        &self,
        font: NameHash,
        text: &str,
        max_width: f32,
        line_break: bool,
        leading: f32,
        tracking: f32,
    ) -> Result<TextMetrics> {
        let entry = self.fonts.get(font).ok_or(GuiError::ResourceNotFound(font))?;
        let metrics = self
            .text_metrics
            .as_deref()
            .ok_or(GuiError::InvalidValue("no text metrics provider installed"))?;
        Ok(metrics.measure(entry.handle, text, max_width, line_break, leading, tracking))
    }

    /// Measures the node's text with its font, width, and text parameters.
    pub fn node_text_metrics(&self, node: NodeHandle) -> Result<TextMetrics> {
        self.nodes.validate(node);
        let idx = node.index();
        let sizer = self.sizer();
        if sizer.metrics.is_none() {
            return Err(GuiError::InvalidValue("no text metrics provider installed"));
        }
        sizer.measure(idx).ok_or_else(|| {
            GuiError::ResourceNotFound(self.node_font(node).unwrap_or(NameHash::EMPTY))
        })
    }

    // -- Flipbooks --

    /// Starts a flipbook on the node's texture, replacing any running one.
    pub fn play_flipbook(
        &mut self,
        node: NodeHandle,
        animation: NameHash,
        frame_count: u32,
        fps: f32,
        playback: Playback,
    ) -> Result<()> {
        if frame_count == 0 {
            return Err(GuiError::InvalidValue("flipbook needs at least one frame"));
        }
        if fps.is_nan() || fps <= 0.0 {
            return Err(GuiError::InvalidValue("flipbook fps must be positive"));
        }
        self.nodes.attrs_mut(node).flipbook = Some(Flipbook::new(animation, frame_count, fps, playback));
        Ok(())
    }

    /// Stops the node's flipbook.
    pub fn cancel_flipbook(&mut self, node: NodeHandle) {
        self.nodes.attrs_mut(node).flipbook = None;
    }

    /// The node's flipbook.
    #[must_use]
    pub fn flipbook(&self, node: NodeHandle) -> Option<Flipbook> {
        self.nodes.attrs(node).flipbook
    }

    // -- Layouts --

    /// Registers a layout.
    pub fn add_layout(&mut self, name: NameHash) -> Result<u16> {
        self.layouts.add(name)
    }

    /// The active layout. The empty name is the default layout.
    #[must_use]
    pub fn layout(&self) -> NameHash {
        self.layouts.name_of(self.layout).unwrap_or(NameHash::EMPTY)
    }

    /// Snapshot of the node's layout-controlled state.
    #[must_use]
    pub fn node_desc(&self, node: NodeHandle) -> NodeDesc {
        self.nodes.validate(node);
        let i = node.index() as usize;
        self.nodes.attrs[i].describe(&self.nodes.properties[i])
    }

    /// Stores the node's state for `layout`.
    ///
    /// The first override for a non-default layout also records the node's
    /// current state as its default.
    pub fn set_node_layout_desc(&mut self, node: NodeHandle, layout: NameHash, desc: NodeDesc) -> Result<()> {
        let index = self
            .layouts
            .index_of(layout)
            .ok_or(GuiError::ResourceNotFound(layout))? as usize;
        let current = self.node_desc(node);
        let table = &mut self.nodes.attrs_mut(node).layouts;
        if table.len() <= index {
            table.resize(index + 1, None);
        }
        if index != 0 && table[0].is_none() {
            table[0] = Some(current);
        }
        table[index] = Some(desc);
        Ok(())
    }

    /// Switches layouts. Each node takes its override for `layout`, or its
    /// default state if it has none.
    pub fn set_layout(&mut self, layout: NameHash) -> Result<()> {
        let index = self
            .layouts
            .index_of(layout)
            .ok_or(GuiError::ResourceNotFound(layout))?;
        let live: Vec<u16> = self.nodes.live_indices().collect();
        for idx in live {
            let i = idx as usize;
            let table = &self.nodes.attrs[i].layouts;
            let desc = table
                .get(index as usize)
                .copied()
                .flatten()
                .or_else(|| table.first().copied().flatten());
            if let Some(desc) = desc {
                self.nodes.properties[i] = desc.properties;
                self.nodes.attrs[i].apply(&desc);
                self.nodes.mark_transform(idx, true);
            }
        }
        self.layout = index;
        Ok(())
    }

    // -- Particle effects --

    fn require_type(&self, node: NodeHandle, expected: NodeType) -> Result<()> {
        let found = self.nodes.node_type(node);
        if found == expected {
            Ok(())
        } else {
            Err(GuiError::WrongType { expected, found })
        }
    }

    /// Registers a particle effect prototype.
    pub fn add_particlefx(&mut self, name: NameHash, prototype: ParticlefxPrototype) -> Result<()> {
        self.particlefx.insert(name, prototype).map(|_| ())
    }

    /// Unregisters a particle effect prototype. Running instances continue.
    pub fn remove_particlefx(&mut self, name: NameHash) {
        self.particlefx.remove(name);
    }

    /// Binds a registered prototype to a particle node.
    pub fn set_node_particlefx(&mut self, node: NodeHandle, name: NameHash) -> Result<()> {
        self.require_type(node, NodeType::ParticleFx)?;
        let prototype = *self.particlefx.require(name)?;
        self.nodes.attrs_mut(node).particlefx = Some((name, prototype));
        Ok(())
    }

    /// The prototype bound to a particle node.
    #[must_use]
    pub fn node_particlefx(&self, node: NodeHandle) -> Option<NameHash> {
        self.nodes.attrs(node).particlefx.map(|(name, _)| name)
    }

    /// Starts a new instance of the node's prototype.
    pub fn play_node_particlefx(&mut self, node: NodeHandle) -> Result<ParticleInstance> {
        self.require_type(node, NodeType::ParticleFx)?;
        let (_, prototype) = self
            .nodes
            .attrs(node)
            .particlefx
            .ok_or(GuiError::ResourceNotFound(NameHash::EMPTY))?;
        if self.instances.len() >= self.config.max_particlefx as usize {
            return Err(GuiError::OutOfResources(Resource::ParticleInstances));
        }
        let engine = self
            .particles
            .as_deref_mut()
            .ok_or(GuiError::InvalidValue("no particle engine installed"))?;
        let instance = engine
            .create_instance(prototype)
            .ok_or(GuiError::OutOfResources(Resource::ParticleInstances))?;
        engine.start(instance);
        self.instances.push(ParticleSlot {
            node,
            instance,
            stopped: false,
        });
        Ok(instance)
    }

    /// Stops every instance on the node. Live particles finish their
    /// lifetime.
    pub fn stop_node_particlefx(&mut self, node: NodeHandle) -> Result<()> {
        self.require_type(node, NodeType::ParticleFx)?;
        if let Some(engine) = self.particles.as_deref_mut() {
            for slot in self.instances.iter_mut().filter(|s| s.node == node && !s.stopped) {
                engine.stop(slot.instance);
                slot.stopped = true;
            }
        }
        Ok(())
    }

    /// Overrides a shader constant on every instance of the node.
    pub fn set_node_particlefx_constant(
        &mut self,
        node: NodeHandle,
        emitter: NameHash,
        constant: NameHash,
        value: [f32; 4],
    ) -> Result<()> {
        self.require_type(node, NodeType::ParticleFx)?;
        if let Some(engine) = self.particles.as_deref_mut() {
            for slot in self.instances.iter().filter(|s| s.node == node) {
                engine.set_render_constant(slot.instance, emitter, constant, value);
            }
        }
        Ok(())
    }

    /// Removes a shader constant override from every instance of the node.
    pub fn reset_node_particlefx_constant(
        &mut self,
        node: NodeHandle,
        emitter: NameHash,
        constant: NameHash,
    ) -> Result<()> {
        self.require_type(node, NodeType::ParticleFx)?;
        if let Some(engine) = self.particles.as_deref_mut() {
            for slot in self.instances.iter().filter(|s| s.node == node) {
                engine.reset_render_constant(slot.instance, emitter, constant);
            }
        }
        Ok(())
    }

    /// Destroys stopped instances that have no live particles left.
    fn reap_particles(&mut self) {
        let Some(engine) = self.particles.as_deref_mut() else {
            return;
        };
        self.instances.retain(|slot| {
            if slot.stopped && engine.is_sleeping(slot.instance) {
                engine.destroy_instance(slot.instance);
                false
            } else {
                true
            }
        });
    }

    fn sync_particles(&mut self) {
        if self.instances.is_empty() {
            return;
        }
        self.flush();
        let Some(engine) = self.particles.as_deref_mut() else {
            return;
        };
        for slot in &self.instances {
            let idx = slot.node.index();
            let (world, _) = self.world.resolve(&self.nodes, idx);
            let rotation = self.nodes.properties[idx as usize][Property::Rotation as usize];
            engine.set_position(slot.instance, world.translation());
            engine.set_rotation(
                slot.instance,
                euler_to_quat(
                    f64::from(rotation[0]),
                    f64::from(rotation[1]),
                    f64::from(rotation[2]),
                ),
            );
            engine.set_scale(slot.instance, world.axis_length(0));
        }
    }

    // -- Animation --

    /// Animates a property, or one component of it, towards `spec.to`.
    ///
    /// An animation already driving a component is replaced; its callback
    /// runs with `finished == false` before the new animation is inserted.
    /// A whole-property animation creates one animation per component and
    /// reports completion once, through component 0. Fails without changes
    /// if the table cannot hold every new component.
    pub fn animate(&mut self, node: NodeHandle, target: AnimationTarget, spec: AnimationSpec) -> Result<()> {
        self.nodes.validate(node);
        let components = match target.component {
            Some(c) if c >= 4 => return Err(GuiError::InvalidValue("component out of range")),
            Some(c) => c..c + 1,
            None => 0..4,
        };
        let keys: Vec<AnimationKey> = components
            .map(|component| AnimationKey {
                node,
                property: target.property,
                component,
            })
            .collect();
        if !self.animations.has_room_for(&keys) {
            return Err(GuiError::OutOfResources(Resource::Animations));
        }
        // Replaced callbacks run before their slots are reused. They may
        // animate the same components again, so repeat until none are left.
        loop {
            for key in &keys {
                if let Some(fired) = self.animations.take_callback(key) {
                    self.fired.push(fired);
                }
            }
            if self.fired.is_empty() {
                break;
            }
            self.run_callbacks();
        }
        if !self.is_valid(node) {
            return Err(GuiError::InvalidValue("node deleted by a replaced animation's callback"));
        }
        if !self.animations.has_room_for(&keys) {
            return Err(GuiError::OutOfResources(Resource::Animations));
        }

        let AnimationSpec {
            to,
            duration,
            delay,
            rate,
            easing,
            playback,
            on_complete,
            userdata,
        } = spec;
        let mut shared: Vec<_> = keys.iter().skip(1).map(|_| easing.share()).collect();
        let mut easing = Some(easing);
        let mut on_complete = on_complete;
        for key in keys {
            let easing = easing
                .take()
                .or_else(|| shared.pop())
                .unwrap_or_default();
            let anim = Animation::new(
                key,
                to[key.component as usize],
                duration,
                delay,
                rate,
                easing,
                playback,
            )
            .with_callback(on_complete.take(), userdata);
            self.animations.insert(anim)?;
        }
        Ok(())
    }

    /// Cancels animations on a property, or on one component. Callbacks are
    /// not run; the animations are dropped at the next update.
    pub fn cancel_animation(&mut self, node: NodeHandle, target: AnimationTarget) {
        self.nodes.validate(node);
        self.animations.cancel(node, target.property, target.component);
    }

    fn run_callbacks(&mut self) -> u32 {
        let mut count = 0;
        while !self.fired.is_empty() {
            let batch = core::mem::take(&mut self.fired);
            for (callback, done) in batch {
                callback(self, done);
                count += 1;
            }
        }
        count
    }

    // -- Frame --

    /// Advances the scene by `dt` seconds.
    ///
    /// A failing script hook does not stop the rest of the update; its error
    /// is returned at the end.
    pub fn update(&mut self, dt: f32) -> Result<()> {
        self.update_traced(dt, &mut Tracer::none())
    }

    /// [`update`](Self::update), reporting to `tracer`.
    pub fn update_traced(&mut self, dt: f32, tracer: &mut Tracer<'_>) -> Result<()> {
        self.update_count += 1;
        let script = self.with_script(|s, scene| s.update(scene, dt));

        let stats = self.animations.update(&mut self.nodes, dt, &mut self.fired);
        let callbacks = self.run_callbacks();

        let live: Vec<u16> = self.nodes.live_indices().collect();
        for &idx in &live {
            if !self.nodes.is_enabled_at(idx) {
                continue;
            }
            if let Some(flipbook) = &mut self.nodes.attrs[idx as usize].flipbook {
                flipbook.advance(dt);
            }
        }
        self.update_custom_nodes(&live, dt);

        self.reap_particles();
        self.sync_particles();
        let released = self.sweep_doomed();

        tracer.update(&UpdateEvent {
            frame_index: self.update_count,
            dt,
            animations_stepped: stats.stepped,
            animations_removed: stats.removed,
            callbacks_fired: callbacks,
            nodes_released: released,
        });
        script
    }

    fn update_custom_nodes(&mut self, live: &[u16], dt: f32) {
        let Some(mut handler) = self.custom_nodes.take() else {
            return;
        };
        let mut updates = Vec::new();
        for &idx in live {
            let i = idx as usize;
            let attrs = &self.nodes.attrs[i];
            if attrs.node_type != NodeType::Custom
                || self.nodes.flags[i].contains(NodeFlags::PENDING_DELETE)
            {
                continue;
            }
            let (Some(data), custom_type) = (attrs.custom_data, attrs.custom_type) else {
                continue;
            };
            let node = self.nodes.handle_at(idx);
            updates.push((i, handler.update(self, node, custom_type, data, dt)));
        }
        for (i, data) in updates {
            self.nodes.attrs[i].custom_data = Some(data);
        }
        if self.custom_nodes.is_none() {
            self.custom_nodes = Some(handler);
        }
    }

    /// Draws the scene.
    pub fn render(&mut self, renderer: &mut dyn Renderer) {
        self.render_traced(renderer, &mut Tracer::none());
    }

    /// [`render`](Self::render), reporting to `tracer`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "draw counts are bounded by the u16 node pool"
    )]
    pub fn render_traced(&mut self, renderer: &mut dyn Renderer, tracer: &mut Tracer<'_>) {
        self.render_count += 1;

        let mut events = Vec::new();
        self.dynamic_textures.flush(renderer, |e| events.push(e));
        let (mut uploaded, mut deleted) = (0, 0);
        for event in events {
            match event {
                TextureEvent::Uploaded(name, handle) => {
                    uploaded += 1;
                    self.rebind_textures(name, TextureKind::Dynamic, Some(handle));
                }
                TextureEvent::Deleted(name) => {
                    deleted += 1;
                    self.rebind_textures(name, TextureKind::Dynamic, None);
                }
            }
        }

        self.flush();
        self.clips.run(&self.nodes);
        let instances = &self.instances;
        let engine = self.particles.as_deref();
        self.draws.collect(&self.nodes, &mut self.clips, |idx, out| {
            let Some(engine) = engine else {
                return;
            };
            for slot in instances.iter().filter(|s| s.node.index() == idx) {
                for e in 0..engine.emitter_count(slot.instance) {
                    out.push(engine.emitter_render_data(slot.instance, e));
                }
            }
        });
        let collected = self.draws.entries().len();

        let sizer = Sizer {
            nodes: &self.nodes,
            fonts: &self.fonts,
            default_font: self.default_font,
            metrics: self.text_metrics.as_deref(),
        };
        self.draws
            .resolve(&self.nodes, &self.clips, &mut self.world, |idx| sizer.size(idx));
        let emitted = self.draws.nodes().len();
        log::trace!("render: {collected} entries collected, {emitted} emitted");
        renderer.render_nodes(self, self.draws.nodes());

        tracer.render(&RenderEvent {
            frame_index: self.render_count,
            collected: collected as u32,
            emitted: emitted as u32,
            clippers: self.clips.clippers().len() as u32,
            stencil_overflow: self.clips.overflowed(),
            textures_uploaded: uploaded,
            textures_deleted: deleted,
        });
    }

    // -- Messages and input --

    /// Delivers a message to the script.
    pub fn dispatch_message(&mut self, message: &Message<'_>) -> Result<()> {
        self.with_script(|s, scene| s.on_message(scene, message))
    }

    /// Delivers input to the script. Returns `true` if it was consumed.
    pub fn dispatch_input(&mut self, action: &InputAction) -> Result<bool> {
        self.with_script(|s, scene| s.on_input(scene, action))
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::{Cell, RefCell};

    use super::*;
    use crate::animation::AnimationDone;
    use crate::clipping::StencilScope;
    use crate::collab::EmitterRenderData;
    use crate::node::AdjustReference;
    use crate::render::RenderNode;

    fn scene() -> Scene {
        Scene::new(SceneConfig::standard(), &ContextConfig::hd())
    }

    fn boxed(scene: &mut Scene) -> NodeHandle {
        scene
            .new_node([0.0; 3], [10.0, 10.0, 0.0], NodeType::Box)
            .unwrap()
    }

    #[derive(Default)]
    struct Frame {
        nodes: Vec<RenderNode>,
        textures: u64,
    }

    #[derive(Default, Clone)]
    struct Gpu(Rc<RefCell<Frame>>);

    impl Renderer for Gpu {
        fn render_nodes(&mut self, _scene: &Scene, nodes: &[RenderNode]) {
            self.0.borrow_mut().nodes = nodes.to_vec();
        }

        fn new_texture(&mut self, _w: u32, _h: u32, _f: PixelFormat, _d: &[u8]) -> TextureHandle {
            let mut frame = self.0.borrow_mut();
            frame.textures += 1;
            TextureHandle(100 + frame.textures)
        }

        fn set_texture_data(&mut self, _t: TextureHandle, _w: u32, _h: u32, _f: PixelFormat, _d: &[u8]) {}

        fn delete_texture(&mut self, _t: TextureHandle) {}
    }

    /// Renderer that rasterizes clip shapes into a one-row, eight-pixel
    /// stencil buffer. Bit `i` of a shape covers pixel `i`.
    #[derive(Default)]
    struct StencilRow {
        shapes: Vec<(NodeHandle, u8)>,
        pixels: [u8; 8],
        scopes: Vec<(NodeHandle, StencilScope)>,
    }

    fn passes(scope: StencilScope, pixel: u8) -> bool {
        scope.ref_value & scope.test_mask == pixel & scope.test_mask
    }

    impl StencilRow {
        fn shape(&mut self, clipper: NodeHandle, shape: u8) {
            self.shapes.push((clipper, shape));
        }

        /// Stencil state of the first draw of `node`.
        fn scope(&self, node: NodeHandle) -> StencilScope {
            self.scopes
                .iter()
                .find(|(n, _)| *n == node)
                .map(|&(_, scope)| scope)
                .unwrap()
        }

        /// Pixels of `shape` that survive the stencil test of `node`.
        fn clipped(&self, node: NodeHandle, shape: u8) -> u8 {
            let scope = self.scope(node);
            assert_eq!(scope.write_mask, 0);
            (0..8)
                .filter(|&i| (shape >> i) & 1 != 0 && passes(scope, self.pixels[i]))
                .fold(0, |acc, i| acc | (1 << i))
        }
    }

    impl Renderer for StencilRow {
        fn render_nodes(&mut self, scene: &Scene, nodes: &[RenderNode]) {
            self.pixels = [0; 8];
            self.scopes.clear();
            for draw in nodes {
                let Some(scope) = draw.stencil else {
                    continue;
                };
                if !self.scopes.iter().any(|(n, _)| *n == draw.node) {
                    self.scopes.push((draw.node, scope));
                }
                if scene.clipping_mode(draw.node) != ClippingMode::Stencil {
                    continue;
                }
                let Some(&(_, shape)) = self.shapes.iter().find(|(n, _)| *n == draw.node) else {
                    continue;
                };
                for (i, pixel) in self.pixels.iter_mut().enumerate() {
                    if (shape >> i) & 1 != 0 && passes(scope, *pixel) {
                        *pixel = (scope.ref_value & scope.write_mask) | (*pixel & !scope.write_mask);
                    }
                }
            }
        }

        fn new_texture(&mut self, _w: u32, _h: u32, _f: PixelFormat, _d: &[u8]) -> TextureHandle {
            TextureHandle(0)
        }

        fn set_texture_data(&mut self, _t: TextureHandle, _w: u32, _h: u32, _f: PixelFormat, _d: &[u8]) {}

        fn delete_texture(&mut self, _t: TextureHandle) {}
    }

    fn clipper(scene: &mut Scene, parent: Option<NodeHandle>, inverted: bool) -> NodeHandle {
        let n = child(scene, parent);
        scene.set_clipping_mode(n, ClippingMode::Stencil);
        scene.set_flags(n, NodeFlags::CLIPPING_INVERTED, inverted);
        n
    }

    fn child(scene: &mut Scene, parent: Option<NodeHandle>) -> NodeHandle {
        let n = boxed(scene);
        if parent.is_some() {
            scene.set_parent(n, parent, false).unwrap();
        }
        n
    }

    /// Particle engine whose instances never fall asleep.
    #[derive(Default)]
    struct Awake {
        destroyed: Rc<Cell<u32>>,
    }
    impl ParticleEngine for Awake {
        fn create_instance(&mut self, p: ParticlefxPrototype) -> Option<ParticleInstance> {
            Some(ParticleInstance(p.0))
        }
        fn destroy_instance(&mut self, _i: ParticleInstance) {
            self.destroyed.set(self.destroyed.get() + 1);
        }
        fn start(&mut self, _i: ParticleInstance) {}
        fn stop(&mut self, _i: ParticleInstance) {}
        fn is_sleeping(&self, _i: ParticleInstance) -> bool {
            false
        }
        fn set_position(&mut self, _i: ParticleInstance, _p: [f64; 3]) {}
        fn set_rotation(&mut self, _i: ParticleInstance, _r: [f64; 4]) {}
        fn set_scale(&mut self, _i: ParticleInstance, _s: f64) {}
        fn emitter_count(&self, _i: ParticleInstance) -> u32 {
            0
        }
        fn emitter_render_data(&self, _i: ParticleInstance, _e: u32) -> EmitterRenderData {
            EmitterRenderData(0)
        }
        fn set_render_constant(&mut self, _i: ParticleInstance, _e: NameHash, _c: NameHash, _v: [f32; 4]) {}
        fn reset_render_constant(&mut self, _i: ParticleInstance, _e: NameHash, _c: NameHash) {}
    }

    #[test]
    fn handles_die_with_their_node() {
        let mut s = scene();
        let a = boxed(&mut s);
        assert!(s.is_valid(a));
        s.delete_node(a);
        assert!(!s.is_valid(a));
        let b = boxed(&mut s);
        assert_eq!(b.index(), a.index());
        assert!(!s.is_valid(a));
        assert!(s.is_valid(b));
    }

    #[test]
    fn delete_is_recursive() {
        let mut s = scene();
        let a = boxed(&mut s);
        let b = boxed(&mut s);
        let c = boxed(&mut s);
        s.set_parent(b, Some(a), false).unwrap();
        s.set_parent(c, Some(b), false).unwrap();
        s.delete_node(a);
        assert!(!s.is_valid(b));
        assert!(!s.is_valid(c));
        assert!(s.nodes().is_empty());
    }

    #[test]
    fn layer_scenario() {
        let mut s = scene();
        let layer = NameHash::of("layer1");
        assert_eq!(s.add_layer(layer), Ok(1));
        let r = s
            .new_node([0.0; 3], [100.0, 100.0, 0.0], NodeType::Box)
            .unwrap();
        let c = boxed(&mut s);
        s.set_parent(c, Some(r), false).unwrap();
        s.set_node_layer(c, layer).unwrap();
        assert_eq!(s.resolved_layer_index(c), 1);
        assert_eq!(s.resolved_layer_index(r), 0);
        assert_eq!(s.layer_index(NameHash::EMPTY), Some(0));
        assert_eq!(
            s.set_node_layer(c, NameHash::of("missing")),
            Err(GuiError::ResourceNotFound(NameHash::of("missing")))
        );
    }

    #[test]
    fn node_by_id_skips_pending_delete() {
        let mut s = scene();
        s.set_particle_engine(Box::new(Awake::default()));
        let fx = NameHash::of("sparks");
        s.add_particlefx(fx, ParticlefxPrototype(1)).unwrap();
        let id = NameHash::of("dup");

        let first = s.new_node([0.0; 3], [0.0; 3], NodeType::ParticleFx).unwrap();
        let second = boxed(&mut s);
        s.set_node_id(first, id);
        s.set_node_id(second, id);
        assert_eq!(s.node_by_id(id), Some(first));

        s.set_node_particlefx(first, fx).unwrap();
        s.play_node_particlefx(first).unwrap();
        s.delete_node(first);
        assert!(s.nodes().is_valid(first), "slot held while particles live");
        assert!(!s.is_valid(first));
        assert_eq!(s.node_by_id(id), Some(second));
        assert_eq!(s.nodes().roots().collect::<Vec<_>>(), vec![second]);
    }

    #[test]
    fn immediate_delete_destroys_live_particles() {
        let engine = Awake::default();
        let destroyed = engine.destroyed.clone();
        let mut s = scene();
        s.set_particle_engine(Box::new(engine));
        let fx = NameHash::of("smoke");
        s.add_particlefx(fx, ParticlefxPrototype(2)).unwrap();
        let parent = boxed(&mut s);
        let emitter = s.new_node([0.0; 3], [0.0; 3], NodeType::ParticleFx).unwrap();
        s.set_parent(emitter, Some(parent), false).unwrap();
        s.set_node_particlefx(emitter, fx).unwrap();
        s.play_node_particlefx(emitter).unwrap();

        s.delete_node(parent);
        s.update(1.0).unwrap();
        assert!(s.nodes().is_valid(emitter), "awake particles hold the slot");
        assert_eq!(destroyed.get(), 0);

        s.delete_node_immediate(parent);
        assert_eq!(destroyed.get(), 1);
        assert!(s.nodes().is_empty());
    }

    #[test]
    fn particle_operations_check_node_type() {
        let mut s = scene();
        let b = boxed(&mut s);
        assert_eq!(
            s.play_node_particlefx(b),
            Err(GuiError::WrongType {
                expected: NodeType::ParticleFx,
                found: NodeType::Box
            })
        );
    }

    #[test]
    fn reparent_keeps_world_position() {
        for reference in [
            AdjustReference::Legacy,
            AdjustReference::Parent,
            AdjustReference::Disabled,
        ] {
            let config = SceneConfig::standard().with_adjust_reference(reference);
            let context = ContextConfig {
                physical: Resolution::new(1280, 720),
                default: Resolution::new(640, 480),
                dpi: 1.0,
            };
            let mut s = Scene::new(config, &context);
            let parent = s
                .new_node([100.0, 50.0, 0.0], [200.0, 100.0, 0.0], NodeType::Box)
                .unwrap();
            s.set_property(parent, Property::Scale, [2.0, 0.5, 1.0, 0.0]);
            s.set_adjust_mode(parent, AdjustMode::Stretch);
            let node = s
                .new_node([30.0, 40.0, 0.0], [10.0, 10.0, 0.0], NodeType::Box)
                .unwrap();

            let before = s.world_transform(node).translation();
            s.set_parent(node, Some(parent), true).unwrap();
            let after = s.world_transform(node).translation();
            for k in 0..3 {
                assert!(
                    (before[k] - after[k]).abs() < 1e-3,
                    "{reference:?}: {before:?} vs {after:?}"
                );
            }

            s.set_parent(node, None, true).unwrap();
            let back = s.world_transform(node).translation();
            assert!((before[0] - back[0]).abs() < 1e-3, "{reference:?}");
        }
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut s = scene();
        let a = boxed(&mut s);
        let b = boxed(&mut s);
        s.set_parent(b, Some(a), false).unwrap();
        assert_eq!(s.set_parent(a, Some(b), true), Err(GuiError::InfiniteRecursion));
        assert_eq!(s.nodes().parent(b), Some(a));
        assert_eq!(s.nodes().parent(a), None);
    }

    #[test]
    fn cancelled_animation_completes_once_unfinished() {
        let mut s = scene();
        let n = boxed(&mut s);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let log = calls.clone();
        let spec = AnimationSpec::new([10.0; 4], 1.0)
            .userdata(7, 9)
            .on_complete(move |_, done: AnimationDone| log.borrow_mut().push(done));
        s.animate(n, AnimationTarget::component(Property::Position, 0), spec)
            .unwrap();
        s.cancel_animation(n, AnimationTarget::property(Property::Position));
        s.update(1.0 / 60.0).unwrap();
        s.update(1.0 / 60.0).unwrap();
        assert!(s.animations().is_empty());
        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].finished);
        assert_eq!(calls[0].userdata, [7, 9]);
    }

    #[test]
    fn whole_property_animation_reports_once() {
        let mut s = scene();
        let n = boxed(&mut s);
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let spec = AnimationSpec::new([1.0, 2.0, 3.0, 4.0], 0.1).on_complete(move |scene, done| {
            assert!(done.finished);
            assert_eq!(done.component, 0);
            assert_eq!(scene.property(done.node, Property::Color), [1.0, 2.0, 3.0, 4.0]);
            c.set(c.get() + 1);
        });
        s.animate(n, AnimationTarget::property(Property::Color), spec).unwrap();
        assert_eq!(s.animations().len(), 4);
        for _ in 0..10 {
            s.update(1.0 / 30.0).unwrap();
        }
        assert_eq!(count.get(), 1);
        assert!(s.animations().is_empty());
    }

    #[test]
    fn replacing_an_animation_fires_the_old_callback() {
        let mut s = scene();
        let n = boxed(&mut s);
        let finished = Rc::new(RefCell::new(Vec::new()));
        let f = finished.clone();
        let spec = AnimationSpec::new([5.0; 4], 1.0).on_complete(move |_, d| f.borrow_mut().push(d.finished));
        let target = AnimationTarget::component(Property::Position, 1);
        s.animate(n, target, spec).unwrap();
        s.animate(n, target, AnimationSpec::new([6.0; 4], 1.0)).unwrap();
        assert_eq!(*finished.borrow(), vec![false]);
        assert_eq!(s.animations().len(), 1);
    }

    #[test]
    fn replaced_callback_cannot_override_the_new_animation() {
        let mut s = scene();
        let n = boxed(&mut s);
        let target = AnimationTarget::component(Property::Position, 1);
        let chain = AnimationSpec::new([5.0; 4], 1.0).on_complete(move |scene, d| {
            assert!(!d.finished);
            scene
                .animate(d.node, target, AnimationSpec::new([99.0; 4], 0.1))
                .unwrap();
        });
        s.animate(n, target, chain).unwrap();
        s.animate(n, target, AnimationSpec::new([6.0; 4], 0.1)).unwrap();
        assert_eq!(s.animations().len(), 1);
        for _ in 0..10 {
            s.update(1.0 / 30.0).unwrap();
        }
        assert_eq!(s.property(n, Property::Position)[1], 6.0);
    }

    #[test]
    fn animation_table_full_changes_nothing() {
        let config = SceneConfig {
            max_animations: 3,
            ..SceneConfig::standard()
        };
        let mut s = Scene::new(config, &ContextConfig::hd());
        let n = boxed(&mut s);
        assert_eq!(
            s.animate(n, AnimationTarget::property(Property::Scale), AnimationSpec::new([2.0; 4], 1.0)),
            Err(GuiError::OutOfResources(Resource::Animations))
        );
        assert!(s.animations().is_empty());
        assert_eq!(
            s.animate(n, AnimationTarget::component(Property::Scale, 4), AnimationSpec::new([2.0; 4], 1.0)),
            Err(GuiError::InvalidValue("component out of range"))
        );
    }

    #[test]
    fn deleting_a_node_ends_its_animations() {
        let mut s = scene();
        let parent = boxed(&mut s);
        let child = boxed(&mut s);
        s.set_parent(child, Some(parent), false).unwrap();
        let finished = Rc::new(Cell::new(None));
        let f = finished.clone();
        s.animate(
            child,
            AnimationTarget::component(Property::Rotation, 2),
            AnimationSpec::new([90.0; 4], 1.0).on_complete(move |_, d| f.set(Some(d.finished))),
        )
        .unwrap();
        s.delete_node(parent);
        assert_eq!(finished.get(), Some(false));
        assert!(s.animations().is_empty());
    }

    #[test]
    fn script_hooks_and_errors() {
        struct Script {
            updates: Rc<Cell<u32>>,
        }
        impl SceneScript for Script {
            fn update(&mut self, _scene: &mut Scene, _dt: f32) -> core::result::Result<(), ScriptError> {
                self.updates.set(self.updates.get() + 1);
                if self.updates.get() == 2 {
                    return Err(ScriptError::new("update", "second frame"));
                }
                Ok(())
            }

            fn on_input(&mut self, scene: &mut Scene, action: &InputAction) -> core::result::Result<bool, ScriptError> {
                let node = scene
                    .new_node([0.0; 3], [1.0; 3], NodeType::Box)
                    .map_err(|_| ScriptError::new("on_input", "pool full"))?;
                scene.set_node_id(node, action.action_id);
                Ok(action.pressed)
            }
        }

        let mut s = scene();
        assert_eq!(s.update(0.1), Ok(()));
        let updates = Rc::new(Cell::new(0));
        s.init_script(Box::new(Script {
            updates: updates.clone(),
        }))
        .unwrap();
        s.update(0.1).unwrap();
        assert_eq!(
            s.update(0.1),
            Err(GuiError::Script(ScriptError::new("update", "second frame")))
        );
        s.update(0.1).unwrap();
        assert_eq!(updates.get(), 3);

        let tap = NameHash::of("tap");
        let action = InputAction {
            action_id: tap,
            value: 1.0,
            pressed: true,
            released: false,
            repeated: false,
            position: None,
            delta: kurbo::Vec2::ZERO,
        };
        assert_eq!(s.dispatch_input(&action), Ok(true));
        assert!(s.node_by_id(tap).is_some());

        s.finalize_script().unwrap();
        s.update(0.1).unwrap();
        assert_eq!(updates.get(), 3);
    }

    #[test]
    fn render_hands_sorted_draws_to_renderer() {
        let mut s = scene();
        let a = boxed(&mut s);
        let b = boxed(&mut s);
        let hidden = boxed(&mut s);
        s.set_visible(hidden, false);
        s.move_below(b, Some(a)).unwrap();
        let gpu = Gpu::default();
        s.render(&mut gpu.clone());
        let drawn: Vec<_> = gpu.0.borrow().nodes.iter().map(|n| n.node).collect();
        assert_eq!(drawn, vec![b, a]);
    }

    #[test]
    fn render_traced_reports_counts() {
        #[derive(Default)]
        struct Sink(Option<RenderEvent>);
        impl crate::trace::TraceSink for Sink {
            fn on_render(&mut self, e: &RenderEvent) {
                self.0 = Some(*e);
            }
        }
        let mut s = scene();
        let clip = boxed(&mut s);
        s.set_clipping_mode(clip, ClippingMode::Stencil);
        let _inside = {
            let n = boxed(&mut s);
            s.set_parent(n, Some(clip), false).unwrap();
            n
        };
        let mut sink = Sink::default();
        s.render_traced(&mut Gpu::default(), &mut Tracer::new(&mut sink));
        if cfg!(feature = "trace") {
            let e = sink.0.unwrap();
            assert_eq!((e.collected, e.emitted, e.clippers), (3, 3, 1));
            assert!(!e.stencil_overflow);
        }
    }

    #[test]
    fn stencil_clips_nested_shapes() {
        // (outer inverted, inner inverted, outer shape, inner shape,
        //  pixels left to the outer child, pixels left to the inner child)
        let cases = [
            (false, false, 0b1111_1000, 0b0001_1100, 0b1111_1000, 0b0001_1000),
            (false, true, 0b1111_1000, 0b0001_1000, 0b1111_1000, 0b1110_0000),
            (true, false, 0b1111_1000, 0b0001_1110, 0b0000_0111, 0b0000_0110),
            (true, true, 0b1111_1000, 0b0000_1110, 0b0000_0111, 0b0000_0001),
            (true, true, 0b0110_0000, 0b0000_0110, 0b1001_1111, 0b1001_1001),
        ];
        for (outer_inv, inner_inv, outer_shape, inner_shape, outer_px, inner_px) in cases {
            let mut s = scene();
            let a = clipper(&mut s, None, outer_inv);
            let a_child = child(&mut s, Some(a));
            let b = clipper(&mut s, Some(a), inner_inv);
            let b_child = child(&mut s, Some(b));

            let mut row = StencilRow::default();
            row.shape(a, outer_shape);
            row.shape(b, inner_shape);
            s.render(&mut row);

            assert_eq!(
                row.clipped(a_child, 0xff),
                outer_px,
                "outer child, inverted {outer_inv}/{inner_inv}"
            );
            assert_eq!(
                row.clipped(b_child, 0xff),
                inner_px,
                "inner child, inverted {outer_inv}/{inner_inv}"
            );
        }
    }

    #[test]
    fn stencil_inverted_roots_stay_clear_of_normal_bits() {
        let mut s = scene();
        let a = clipper(&mut s, None, false);
        let a_child = child(&mut s, Some(a));
        let b = clipper(&mut s, Some(a), false);
        let b_child = child(&mut s, Some(b));
        let c = clipper(&mut s, None, true);
        let c_child = child(&mut s, Some(c));
        let d = clipper(&mut s, Some(c), true);
        let d_child = child(&mut s, Some(d));

        let mut row = StencilRow::default();
        row.shape(a, 0b1110_0000);
        row.shape(b, 0b1100_0000);
        row.shape(c, 0b0011_0000);
        row.shape(d, 0b0001_1000);
        s.render(&mut row);

        let masks = |n| {
            let scope = row.scope(n);
            (scope.ref_value, scope.test_mask, scope.write_mask)
        };
        assert_eq!(masks(a), (0b0000_0001, 0b0000_0000, 0xff));
        assert_eq!(masks(a_child), (0b0000_0001, 0b0000_0001, 0));
        assert_eq!(masks(b), (0b0000_0011, 0b0000_0001, 0xff));
        assert_eq!(masks(b_child), (0b0000_0011, 0b0000_0011, 0));
        assert_eq!(masks(c), (0b1000_0000, 0b0000_0000, 0xff));
        assert_eq!(masks(c_child), (0b0000_0000, 0b1000_0000, 0));
        assert_eq!(masks(d), (0b0100_0000, 0b1000_0000, 0xff));
        assert_eq!(masks(d_child), (0b0000_0000, 0b1100_0000, 0));

        assert_eq!(row.clipped(c_child, 0xff), 0b1100_1111);
        assert_eq!(row.clipped(d_child, 0xff), 0b1100_0111);
    }

    #[test]
    fn dynamic_textures_bind_on_upload() {
        let mut s = scene();
        let n = boxed(&mut s);
        let name = NameHash::of("canvas");
        assert_eq!(
            s.set_node_texture(n, name),
            Err(GuiError::ResourceNotFound(name))
        );
        s.new_dynamic_texture(name, 2, 2, PixelFormat::Rgba, &[0; 16]).unwrap();
        s.set_node_texture(n, name).unwrap();
        assert_eq!(s.node_texture(n).unwrap().handle, None);

        let gpu = Gpu::default();
        s.render(&mut gpu.clone());
        assert_eq!(s.node_texture(n).unwrap().handle, Some(TextureHandle(101)));

        s.delete_dynamic_texture(name).unwrap();
        assert_eq!(
            s.dynamic_texture_data(name).err(),
            Some(GuiError::ResourceNotFound(name))
        );
        s.render(&mut gpu.clone());
        let binding = s.node_texture(n).unwrap();
        assert_eq!((binding.id, binding.handle), (name, None));
    }

    #[test]
    fn static_textures_rebind() {
        let mut s = scene();
        let n = boxed(&mut s);
        let name = NameHash::of("atlas");
        s.add_texture(name, TextureHandle(1)).unwrap();
        s.set_node_texture(n, name).unwrap();
        s.remove_texture(name);
        assert_eq!(s.node_texture(n).unwrap().handle, None);
        s.add_texture(name, TextureHandle(2)).unwrap();
        assert_eq!(s.node_texture(n).unwrap().handle, Some(TextureHandle(2)));
    }

    #[test]
    fn clone_tree_copies_subtree_and_flipbook() {
        let mut s = scene();
        let root = boxed(&mut s);
        let a = boxed(&mut s);
        let b = boxed(&mut s);
        s.set_parent(a, Some(root), false).unwrap();
        s.set_parent(b, Some(a), false).unwrap();
        s.set_property(b, Property::Color, [0.5, 0.5, 0.5, 1.0]);
        s.play_flipbook(a, NameHash::of("walk"), 4, 4.0, Playback::LoopForward)
            .unwrap();
        s.update(0.5).unwrap();

        let copy = s.clone_tree(a).unwrap();
        assert_eq!(s.nodes().parent(copy), Some(root));
        assert_eq!(s.flipbook(copy), s.flipbook(a));
        let kids: Vec<_> = s.nodes().children(copy).collect();
        assert_eq!(kids.len(), 1);
        assert_ne!(kids[0], b);
        assert_eq!(s.property(kids[0], Property::Color), [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(s.nodes().len(), 5);
    }

    #[test]
    fn clone_tree_is_all_or_nothing() {
        let config = SceneConfig {
            max_nodes: 3,
            ..SceneConfig::standard()
        };
        let mut s = Scene::new(config, &ContextConfig::hd());
        let a = boxed(&mut s);
        let b = boxed(&mut s);
        s.set_parent(b, Some(a), false).unwrap();
        assert_eq!(s.clone_tree(a), Err(GuiError::OutOfResources(Resource::Nodes)));
        assert_eq!(s.nodes().len(), 2);
    }

    #[test]
    fn layouts_switch_node_state() {
        let mut s = scene();
        let n = boxed(&mut s);
        let portrait = NameHash::of("portrait");
        s.add_layout(portrait).unwrap();
        let mut desc = s.node_desc(n);
        desc.properties[Property::Position as usize] = [5.0, 6.0, 0.0, 1.0];
        desc.pivot = Pivot::NorthWest;
        s.set_node_layout_desc(n, portrait, desc).unwrap();

        s.set_layout(portrait).unwrap();
        assert_eq!(s.layout(), portrait);
        assert_eq!(s.property(n, Property::Position), [5.0, 6.0, 0.0, 1.0]);
        assert_eq!(s.pivot(n), Pivot::NorthWest);

        s.set_layout(NameHash::EMPTY).unwrap();
        assert_eq!(s.property(n, Property::Position), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(s.pivot(n), Pivot::Center);
        assert_eq!(
            s.set_layout(NameHash::of("landscape")),
            Err(GuiError::ResourceNotFound(NameHash::of("landscape")))
        );
    }

    #[test]
    fn text_nodes_size_from_metrics() {
        struct Mono;
        impl TextMetricsProvider for Mono {
            fn measure(&self, _f: FontHandle, text: &str, _w: f32, _lb: bool, _l: f32, _t: f32) -> TextMetrics {
                TextMetrics {
                    width: 10.0 * text.len() as f32,
                    height: 20.0,
                    line_count: 1,
                    max_ascent: 15.0,
                    max_descent: 5.0,
                    max_advance: 10.0,
                }
            }
        }
        let mut s = scene();
        s.set_text_metrics(Box::new(Mono));
        let font = NameHash::of("body");
        s.add_font(font, FontHandle(1), NameHash::of("/body.font")).unwrap();
        assert_eq!(s.font_for_path(NameHash::of("/body.font")), Some(font));
        let t = s
            .new_node([640.0, 360.0, 0.0], [1.0, 1.0, 0.0], NodeType::Text)
            .unwrap();
        s.set_text(t, "hello");
        assert_eq!(s.node_text_metrics(t).unwrap().width, 50.0);
        // 50x20 around the screen center.
        assert!(s.pick_node(t, 615.0 + 1.0, 350.0 + 1.0));
        assert!(!s.pick_node(t, 600.0, 360.0));

        s.set_size_mode(t, SizeMode::Manual);
        assert!(!s.pick_node(t, 620.0, 360.0));
    }

    #[test]
    fn screen_position_round_trip() {
        let mut s = scene();
        let parent = s
            .new_node([200.0, 100.0, 0.0], [50.0, 50.0, 0.0], NodeType::Box)
            .unwrap();
        s.set_property(parent, Property::Rotation, [0.0, 0.0, 90.0, 0.0]);
        let n = boxed(&mut s);
        s.set_parent(n, Some(parent), false).unwrap();
        s.set_screen_position(n, [300.0, 150.0]);
        let t = s.world_transform(n).translation();
        assert!((t[0] - 300.0).abs() < 1e-3 && (t[1] - 150.0).abs() < 1e-3, "{t:?}");
        let local = s.screen_to_local(n, [300.0, 150.0]);
        let pos = s.property(n, Property::Position);
        assert!((local[0] - f64::from(pos[0])).abs() < 1e-3);
    }

    #[test]
    fn custom_nodes_round_trip_payloads() {
        #[derive(Default)]
        struct Counter {
            destroyed: Rc<Cell<u32>>,
        }
        impl CustomNodeHandler for Counter {
            fn create(&mut self, _node: NodeHandle, custom_type: u32) -> Option<CustomData> {
                Some(CustomData(u64::from(custom_type) * 1000))
            }
            fn destroy(&mut self, _node: NodeHandle, _custom_type: u32, _data: CustomData) {
                self.destroyed.set(self.destroyed.get() + 1);
            }
            fn clone_data(&mut self, _node: NodeHandle, _custom_type: u32, data: CustomData) -> Option<CustomData> {
                Some(CustomData(data.0 + 1))
            }
            fn update(&mut self, _s: &Scene, _n: NodeHandle, _t: u32, data: CustomData, _dt: f32) -> CustomData {
                CustomData(data.0 + 10)
            }
        }

        let destroyed = Rc::new(Cell::new(0));
        let mut s = scene();
        s.set_custom_node_handler(Box::new(Counter {
            destroyed: destroyed.clone(),
        }));
        let n = s.new_custom_node([0.0; 3], [1.0; 3], 3).unwrap();
        assert_eq!(s.custom_data(n), Some(CustomData(3000)));
        s.update(0.1).unwrap();
        assert_eq!(s.custom_data(n), Some(CustomData(3010)));
        let copy = s.clone_node(n).unwrap();
        assert_eq!(s.custom_data(copy), Some(CustomData(3011)));
        assert_eq!(s.custom_type(copy), 3);
        s.clear_nodes();
        assert_eq!(destroyed.get(), 2);
        assert!(s.nodes().is_empty());
        assert!(!s.is_valid(n));
    }

    #[test]
    fn disabled_nodes_pause_flipbooks() {
        let mut s = scene();
        let n = boxed(&mut s);
        s.play_flipbook(n, NameHash::of("spin"), 10, 10.0, Playback::LoopForward)
            .unwrap();
        s.set_enabled(n, false);
        s.update(0.35).unwrap();
        assert_eq!(s.flipbook(n).unwrap().frame(), 0);
        s.set_enabled(n, true);
        s.update(0.35).unwrap();
        assert_eq!(s.flipbook(n).unwrap().frame(), 3);
        s.cancel_flipbook(n);
        assert_eq!(s.flipbook(n), None);
    }
}
