// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node properties, kinds, and per-node modes.

/// An animatable four-component node property.
///
/// Every property is stored as `[f32; 4]`, so any single component can be
/// driven independently by an animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Property {
    /// Position in the parent's space. `w` is unused.
    Position = 0,
    /// Euler rotation in degrees around x, y, z.
    Rotation = 1,
    /// Scale factor per axis.
    Scale = 2,
    /// Fill color. `w` is the node's own alpha.
    Color = 3,
    /// Size in design pixels.
    Size = 4,
    /// Text outline color.
    Outline = 5,
    /// Text shadow color.
    Shadow = 6,
    /// Nine-slice insets: left, top, right, bottom.
    Slice9 = 7,
    /// Pie parameters: inner radius, fill angle.
    PieParams = 8,
    /// Text parameters: leading, tracking.
    TextParams = 9,
}

impl Property {
    /// Number of properties.
    pub const COUNT: usize = 10;

    /// All properties in storage order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Position,
        Self::Rotation,
        Self::Scale,
        Self::Color,
        Self::Size,
        Self::Outline,
        Self::Shadow,
        Self::Slice9,
        Self::PieParams,
        Self::TextParams,
    ];

    /// Returns `true` if changing this property moves the node or its
    /// descendants.
    #[inline]
    #[must_use]
    pub const fn affects_transform(self) -> bool {
        matches!(
            self,
            Self::Position | Self::Rotation | Self::Scale | Self::Size
        )
    }

    /// Returns `true` if the change must propagate to descendants immediately.
    ///
    /// Size feeds into children's adjust frames in parent-relative mode, and
    /// scale is inherited through the world transform.
    #[inline]
    #[must_use]
    pub(crate) const fn propagates(self) -> bool {
        matches!(self, Self::Scale | Self::Size)
    }
}

/// What an animation drives: a whole property or one of its components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimationTarget {
    /// Property to drive.
    pub property: Property,
    /// Component `0..4`, or `None` for all four.
    pub component: Option<u8>,
}

impl AnimationTarget {
    /// Targets every component of `property`.
    #[must_use]
    pub const fn property(property: Property) -> Self {
        Self {
            property,
            component: None,
        }
    }

    /// Targets one component of `property`.
    #[must_use]
    pub const fn component(property: Property, component: u8) -> Self {
        Self {
            property,
            component: Some(component),
        }
    }
}

/// Node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum NodeType {
    /// A textured or flat-colored quad, optionally nine-sliced.
    #[default]
    Box,
    /// A run of text rendered with a font.
    Text,
    /// A circular or rectangular pie slice.
    Pie,
    /// A grouping node that stands in for an instantiated template.
    Template,
    /// A node that hosts particle effect instances.
    ParticleFx,
    /// A node whose payload is owned by a
    /// [`CustomNodeHandler`](crate::collab::CustomNodeHandler).
    Custom,
}

/// The point of a node that its position refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Pivot {
    /// Middle of the node.
    #[default]
    Center,
    /// Top edge.
    North,
    /// Top right corner.
    NorthEast,
    /// Right edge.
    East,
    /// Bottom right corner.
    SouthEast,
    /// Bottom edge.
    South,
    /// Bottom left corner.
    SouthWest,
    /// Left edge.
    West,
    /// Top left corner.
    NorthWest,
}

impl Pivot {
    /// Pivot position as a fraction of size, measured from the bottom left.
    #[must_use]
    pub const fn factor(self) -> [f64; 2] {
        match self {
            Self::Center => [0.5, 0.5],
            Self::North => [0.5, 1.0],
            Self::NorthEast => [1.0, 1.0],
            Self::East => [1.0, 0.5],
            Self::SouthEast => [1.0, 0.0],
            Self::South => [0.5, 0.0],
            Self::SouthWest => [0.0, 0.0],
            Self::West => [0.0, 0.5],
            Self::NorthWest => [0.0, 1.0],
        }
    }
}

/// Horizontal anchoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum XAnchor {
    /// Centered with the rest of the content.
    #[default]
    None,
    /// Keeps its distance to the left edge.
    Left,
    /// Keeps its distance to the right edge.
    Right,
}

/// Vertical anchoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum YAnchor {
    /// Centered with the rest of the content.
    #[default]
    None,
    /// Keeps its distance to the top edge.
    Top,
    /// Keeps its distance to the bottom edge.
    Bottom,
}

/// How a node reacts when the physical resolution differs from the design
/// resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AdjustMode {
    /// Uniform scale by the smaller axis ratio; content stays fully visible.
    #[default]
    Fit,
    /// Uniform scale by the larger axis ratio; content fills the screen.
    Zoom,
    /// Independent scale per axis.
    Stretch,
}

/// Where a node takes its reference scale from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AdjustReference {
    /// Every node adjusts against the whole screen.
    #[default]
    Legacy,
    /// Nodes adjust against their parent's adjusted frame.
    Parent,
    /// No adjustment.
    Disabled,
}

/// Whether the node's size is authored or derived from its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SizeMode {
    /// Size comes from the `Size` property.
    #[default]
    Manual,
    /// Size comes from the content (text metrics, texture size).
    Auto,
}

/// Blend equation used when drawing a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Standard alpha blending.
    #[default]
    Alpha,
    /// Additive.
    Add,
    /// Multiplicative.
    Multiply,
    /// Screen.
    Screen,
}

/// Outer shape of a pie node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PieBounds {
    /// The slice is bounded by an ellipse.
    #[default]
    Ellipse,
    /// The slice is bounded by the node rectangle.
    Rectangle,
}

/// Whether a node clips its descendants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ClippingMode {
    /// No clipping.
    #[default]
    None,
    /// Descendants are masked by the node's shape through the stencil buffer.
    Stencil,
}

bitflags::bitflags! {
    /// Per-node state flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u16 {
        /// The node and its subtree update and render.
        const ENABLED = 1 << 0;
        /// The node draws. Unlike `ENABLED`, children are unaffected.
        const VISIBLE = 1 << 1;
        /// Alpha is multiplied by the parent's effective alpha.
        const INHERIT_ALPHA = 1 << 2;
        /// Text wraps at the node width.
        const LINE_BREAK = 1 << 3;
        /// The node only carries a transform for its children.
        const BONE = 1 << 4;
        /// A clipping node also draws its own shape.
        const CLIPPING_VISIBLE = 1 << 5;
        /// A clipping node cuts out instead of masking in.
        const CLIPPING_INVERTED = 1 << 6;
        /// Unlinked and waiting for a particle instance to finish.
        const PENDING_DELETE = 1 << 7;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::ENABLED | Self::VISIBLE | Self::CLIPPING_VISIBLE
    }
}

/// Initial property values for a new node.
pub(crate) fn default_properties(
    position: [f32; 3],
    size: [f32; 3],
) -> [[f32; 4]; Property::COUNT] {
    let mut props = [[0.0; 4]; Property::COUNT];
    props[Property::Position as usize] = [position[0], position[1], position[2], 1.0];
    props[Property::Scale as usize] = [1.0, 1.0, 1.0, 0.0];
    props[Property::Color as usize] = [1.0, 1.0, 1.0, 1.0];
    props[Property::Size as usize] = [size[0], size[1], size[2], 0.0];
    props[Property::Outline as usize] = [0.0, 0.0, 0.0, 1.0];
    props[Property::Shadow as usize] = [0.0, 0.0, 0.0, 1.0];
    props[Property::PieParams as usize] = [0.0, 360.0, 0.0, 0.0];
    props[Property::TextParams as usize] = [1.0, 0.0, 0.0, 0.0];
    props
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_factors_are_bottom_left_relative() {
        assert_eq!(Pivot::SouthWest.factor(), [0.0, 0.0]);
        assert_eq!(Pivot::NorthEast.factor(), [1.0, 1.0]);
        assert_eq!(Pivot::West.factor(), [0.0, 0.5]);
    }

    #[test]
    fn defaults() {
        let props = default_properties([1.0, 2.0, 0.0], [10.0, 20.0, 0.0]);
        assert_eq!(props[Property::Position as usize], [1.0, 2.0, 0.0, 1.0]);
        assert_eq!(props[Property::Color as usize], [1.0; 4]);
        assert_eq!(props[Property::PieParams as usize][1], 360.0);
        let flags = NodeFlags::default();
        assert!(flags.contains(NodeFlags::ENABLED | NodeFlags::VISIBLE));
        assert!(!flags.contains(NodeFlags::INHERIT_ALPHA));
    }
}
