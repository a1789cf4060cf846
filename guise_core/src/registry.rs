// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded name-keyed resource tables owned by a scene.
//!
//! Resources are registered under a [`NameHash`] and looked up by it when a
//! node binds to them. Every table has a fixed capacity taken from
//! [`SceneConfig`](crate::config::SceneConfig); registering past it fails
//! with [`GuiError::OutOfResources`] and changes nothing.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::collab::{FontHandle, PixelFormat, Renderer, TextureHandle};
use crate::error::{GuiError, Resource, Result};
use crate::hash::NameHash;

/// A bounded map from names to values.
#[derive(Debug)]
pub struct Registry<V> {
    map: HashMap<NameHash, V>,
    capacity: usize,
    resource: Resource,
}

impl<V> Registry<V> {
    /// Creates a table holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, resource: Resource) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            capacity,
            resource,
        }
    }

    /// Registers `value` under `id`, replacing any previous value.
    pub fn insert(&mut self, id: NameHash, value: V) -> Result<Option<V>> {
        if !self.map.contains_key(&id) && self.map.len() >= self.capacity {
            return Err(GuiError::OutOfResources(self.resource));
        }
        Ok(self.map.insert(id, value))
    }

    /// Value registered under `id`.
    #[must_use]
    pub fn get(&self, id: NameHash) -> Option<&V> {
        self.map.get(&id)
    }

    /// Value registered under `id`, or [`GuiError::ResourceNotFound`].
    pub fn require(&self, id: NameHash) -> Result<&V> {
        self.map.get(&id).ok_or(GuiError::ResourceNotFound(id))
    }

    /// Removes `id`.
    pub fn remove(&mut self, id: NameHash) -> Option<V> {
        self.map.remove(&id)
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (NameHash, &V)> {
        self.map.iter().map(|(k, v)| (*k, v))
    }
}

/// A registered font.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontEntry {
    /// Renderer-side font.
    pub handle: FontHandle,
    /// Resource path the font was loaded from.
    pub path: NameHash,
}

/// Fonts, addressable by name and by resource path.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Registry<FontEntry>,
    by_path: HashMap<NameHash, NameHash>,
}

impl FontRegistry {
    /// Creates a table holding at most `capacity` fonts.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            fonts: Registry::new(capacity, Resource::Fonts),
            by_path: HashMap::new(),
        }
    }

    /// Registers a font.
    pub fn insert(&mut self, id: NameHash, handle: FontHandle, path: NameHash) -> Result<()> {
        if let Some(old) = self.fonts.insert(id, FontEntry { handle, path })? {
            self.by_path.remove(&old.path);
        }
        self.by_path.insert(path, id);
        Ok(())
    }

    /// Font registered under `id`.
    #[must_use]
    pub fn get(&self, id: NameHash) -> Option<&FontEntry> {
        self.fonts.get(id)
    }

    /// Resource path of the font registered under `id`.
    #[must_use]
    pub fn path_of(&self, id: NameHash) -> Option<NameHash> {
        self.fonts.get(id).map(|f| f.path)
    }

    /// Name of the font loaded from `path`.
    #[must_use]
    pub fn id_for_path(&self, path: NameHash) -> Option<NameHash> {
        self.by_path.get(&path).copied()
    }

    /// Unregisters a font.
    pub fn remove(&mut self, id: NameHash) -> Option<FontEntry> {
        let entry = self.fonts.remove(id)?;
        self.by_path.remove(&entry.path);
        Some(entry)
    }

    /// Unregisters every font.
    pub fn clear(&mut self) {
        self.fonts.clear();
        self.by_path.clear();
    }

    /// Number of fonts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Returns `true` if no font is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

#[derive(Debug)]
struct DynamicTexture {
    handle: Option<TextureHandle>,
    width: u32,
    height: u32,
    format: PixelFormat,
    buffer: Vec<u8>,
    dirty: bool,
    deleted: bool,
}

/// A change applied by [`DynamicTextures::flush`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureEvent {
    /// The texture was created or re-uploaded.
    Uploaded(NameHash, TextureHandle),
    /// The texture was freed.
    Deleted(NameHash),
}

/// Buffer-backed textures created at runtime.
///
/// Changes are staged and reach the renderer on the next
/// [`flush`](Self::flush), which a scene runs at the start of rendering.
/// A deleted texture keeps its slot until then, and creating it again
/// before the flush revives it.
#[derive(Debug)]
pub struct DynamicTextures {
    textures: HashMap<NameHash, DynamicTexture>,
    capacity: usize,
}

/// Borrowed contents of a dynamic texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureData<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Pixel bytes, row by row.
    pub buffer: &'a [u8],
}

fn check_buffer(width: u32, height: u32, format: PixelFormat, buffer: &[u8]) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(GuiError::InvalidValue("texture dimensions must be nonzero"));
    }
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(format.bytes_per_pixel()));
    if expected != Some(buffer.len()) {
        return Err(GuiError::DataError(
            "buffer length does not match width * height * bytes per pixel",
        ));
    }
    Ok(())
}

impl DynamicTextures {
    /// Creates a table holding at most `capacity` textures.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            textures: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Stages a new texture.
    pub fn create(
        &mut self,
        id: NameHash,
        width: u32,
        height: u32,
        format: PixelFormat,
        buffer: &[u8],
    ) -> Result<()> {
        check_buffer(width, height, format, buffer)?;
        match self.textures.get_mut(&id) {
            Some(t) if !t.deleted => Err(GuiError::TextureAlreadyExists(id)),
            Some(t) => {
                t.deleted = false;
                t.width = width;
                t.height = height;
                t.format = format;
                t.buffer.clear();
                t.buffer.extend_from_slice(buffer);
                t.dirty = true;
                log::debug!("dynamic texture {id:?} revived before deletion");
                Ok(())
            }
            None => {
                if self.textures.len() >= self.capacity {
                    return Err(GuiError::OutOfResources(Resource::DynamicTextures));
                }
                self.textures.insert(
                    id,
                    DynamicTexture {
                        handle: None,
                        width,
                        height,
                        format,
                        buffer: buffer.into(),
                        dirty: true,
                        deleted: false,
                    },
                );
                Ok(())
            }
        }
    }

    fn live_mut(&mut self, id: NameHash) -> Result<&mut DynamicTexture> {
        match self.textures.get_mut(&id) {
            Some(t) if !t.deleted => Ok(t),
            _ => Err(GuiError::ResourceNotFound(id)),
        }
    }

    /// Stages new contents, possibly with a new size.
    pub fn set_data(
        &mut self,
        id: NameHash,
        width: u32,
        height: u32,
        format: PixelFormat,
        buffer: &[u8],
    ) -> Result<()> {
        check_buffer(width, height, format, buffer)?;
        let t = self.live_mut(id)?;
        t.width = width;
        t.height = height;
        t.format = format;
        t.buffer.clear();
        t.buffer.extend_from_slice(buffer);
        t.dirty = true;
        Ok(())
    }

    /// Stages deletion.
    pub fn delete(&mut self, id: NameHash) -> Result<()> {
        self.live_mut(id)?.deleted = true;
        Ok(())
    }

    /// Current contents of a live texture.
    pub fn data(&self, id: NameHash) -> Result<TextureData<'_>> {
        match self.textures.get(&id) {
            Some(t) if !t.deleted => Ok(TextureData {
                width: t.width,
                height: t.height,
                format: t.format,
                buffer: &t.buffer,
            }),
            _ => Err(GuiError::ResourceNotFound(id)),
        }
    }

    /// Returns `true` if `id` names a live texture.
    #[must_use]
    pub fn contains(&self, id: NameHash) -> bool {
        self.textures.get(&id).is_some_and(|t| !t.deleted)
    }

    /// Renderer handle of a live texture, once uploaded.
    #[must_use]
    pub fn handle(&self, id: NameHash) -> Option<TextureHandle> {
        self.textures
            .get(&id)
            .filter(|t| !t.deleted)
            .and_then(|t| t.handle)
    }

    /// Number of textures, including those awaiting deletion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Applies staged changes to `renderer`, reporting each one.
    pub fn flush(&mut self, renderer: &mut dyn Renderer, mut on_event: impl FnMut(TextureEvent)) {
        self.textures.retain(|&id, t| {
            if t.deleted {
                if let Some(handle) = t.handle {
                    renderer.delete_texture(handle);
                }
                log::debug!("dynamic texture {id:?} deleted");
                on_event(TextureEvent::Deleted(id));
                return false;
            }
            if t.dirty {
                let handle = match t.handle {
                    Some(handle) => {
                        renderer.set_texture_data(handle, t.width, t.height, t.format, &t.buffer);
                        handle
                    }
                    None => {
                        let handle = renderer.new_texture(t.width, t.height, t.format, &t.buffer);
                        log::debug!("dynamic texture {id:?} created as {handle:?}");
                        t.handle = Some(handle);
                        handle
                    }
                };
                t.dirty = false;
                on_event(TextureEvent::Uploaded(id, handle));
            }
            true
        });
    }
}

/// An ordered list of names with a reserved default entry at index 0.
///
/// Used for layers, whose index orders draws, and layouts.
#[derive(Debug)]
pub struct NameTable {
    names: Vec<NameHash>,
    capacity: usize,
    resource: Resource,
}

impl NameTable {
    /// Creates a table with only the default entry. `capacity` counts it.
    #[must_use]
    pub fn new(capacity: usize, resource: Resource) -> Self {
        let mut names = Vec::with_capacity(capacity.max(1));
        names.push(NameHash::EMPTY);
        Self {
            names,
            capacity: capacity.max(1),
            resource,
        }
    }

    /// Registers `name` and returns its index. Registering a name twice
    /// returns the first index.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "name tables hold at most 16 bits of entries"
    )]
    pub fn add(&mut self, name: NameHash) -> Result<u16> {
        if let Some(i) = self.index_of(name) {
            return Ok(i);
        }
        if self.names.len() >= self.capacity {
            return Err(GuiError::OutOfResources(self.resource));
        }
        self.names.push(name);
        Ok((self.names.len() - 1) as u16)
    }

    /// Index of `name`. The empty name is always index 0.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "name tables hold at most 16 bits of entries"
    )]
    pub fn index_of(&self, name: NameHash) -> Option<u16> {
        self.names.iter().position(|&n| n == name).map(|i| i as u16)
    }

    /// Name at `index`.
    #[must_use]
    pub fn name_of(&self, index: u16) -> Option<NameHash> {
        self.names.get(index as usize).copied()
    }

    /// Number of entries, including the default.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always `false`; the default entry is permanent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Removes everything but the default entry.
    pub fn clear(&mut self) {
        self.names.truncate(1);
    }
}
