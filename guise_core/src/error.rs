// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types returned by scene operations.
//!
//! Recoverable failures (exhausted pools, failed lookups, malformed input)
//! surface as [`GuiError`]. Contract violations such as using a stale
//! [`NodeHandle`](crate::node::NodeHandle) panic instead.

use alloc::string::String;
use core::fmt;

use crate::hash::NameHash;
use crate::node::NodeType;

/// A bounded pool or table that can run out of room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// The node pool.
    Nodes,
    /// The animation table.
    Animations,
    /// The texture registry.
    Textures,
    /// The dynamic texture registry.
    DynamicTextures,
    /// The font registry.
    Fonts,
    /// The particle effect prototype registry.
    Particlefx,
    /// The particle instance table.
    ParticleInstances,
    /// The layer registry.
    Layers,
    /// The layout table.
    Layouts,
    /// The scene table of a [`Context`](crate::context::Context).
    Scenes,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nodes => "node pool",
            Self::Animations => "animation table",
            Self::Textures => "texture registry",
            Self::DynamicTextures => "dynamic texture registry",
            Self::Fonts => "font registry",
            Self::Particlefx => "particlefx registry",
            Self::ParticleInstances => "particle instance table",
            Self::Layers => "layer registry",
            Self::Layouts => "layout table",
            Self::Scenes => "scene table",
        };
        f.write_str(name)
    }
}

/// A failure reported by a [`SceneScript`](crate::collab::SceneScript) hook.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("script hook `{hook}` failed: {message}")]
pub struct ScriptError {
    /// Name of the hook that failed, e.g. `"update"`.
    pub hook: &'static str,
    /// Message supplied by the script.
    pub message: String,
}

impl ScriptError {
    /// Creates a script error for `hook`.
    #[must_use]
    pub fn new(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
        }
    }
}

/// Errors returned by [`Scene`](crate::scene::Scene) and
/// [`Context`](crate::context::Context) operations.
///
/// An operation that returns an error has not mutated any state.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GuiError {
    /// A pool or table is full.
    #[error("out of resources: {0} is full")]
    OutOfResources(Resource),
    /// A lookup by name hash failed.
    #[error("resource not found: {0:?}")]
    ResourceNotFound(NameHash),
    /// An argument was out of range.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    /// A data buffer disagrees with its declared shape.
    #[error("data error: {0}")]
    DataError(&'static str),
    /// The operation requires a different node type.
    #[error("wrong node type: expected {expected:?}, found {found:?}")]
    WrongType {
        /// Type the operation requires.
        expected: NodeType,
        /// Type of the node that was passed.
        found: NodeType,
    },
    /// Reparenting would create a cycle.
    #[error("infinite recursion: a node cannot be parented to itself or a descendant")]
    InfiniteRecursion,
    /// A script hook failed.
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// A dynamic texture with this name is already live.
    #[error("texture already exists: {0:?}")]
    TextureAlreadyExists(NameHash),
}

/// Result alias used throughout the crate.
pub type Result<T, E = GuiError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            GuiError::OutOfResources(Resource::Nodes).to_string(),
            "out of resources: node pool is full"
        );
        let err: GuiError = ScriptError::new("update", "boom").into();
        assert_eq!(err.to_string(), "script hook `update` failed: boom");
    }
}
