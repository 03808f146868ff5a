//! Resource kinds and extents.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// ResourceKind
// ============================================================================

/// Kind of data flowing along an edge.
///
/// Every kind is stored as 32-bit float texels; the kind fixes the channel
/// count and which ports may be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// RGBA radiance or reflectance.
    Color,
    /// Single-channel coverage or weight.
    Mask,
    /// Single-channel linear depth.
    Depth,
    /// Packed primary hit information.
    Visibility,
    /// Four-channel structured records (positions, normals, samples).
    Structured,
}

impl ResourceKind {
    /// All kinds, in declaration order.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Color,
        ResourceKind::Mask,
        ResourceKind::Depth,
        ResourceKind::Visibility,
        ResourceKind::Structured,
    ];

    /// Number of f32 channels per texel.
    pub fn channels(self) -> usize {
        match self {
            Self::Mask | Self::Depth => 1,
            Self::Color | Self::Visibility | Self::Structured => 4,
        }
    }

    /// Whether data of this kind may feed a port of kind `dst`.
    ///
    /// Identical kinds are always compatible. Depth and mask share a layout
    /// and may be connected to each other.
    pub fn is_compatible_with(self, dst: ResourceKind) -> bool {
        self == dst
            || matches!(
                (self, dst),
                (Self::Depth, Self::Mask) | (Self::Mask, Self::Depth)
            )
    }

    /// Lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Mask => "mask",
            Self::Depth => "depth",
            Self::Visibility => "visibility",
            Self::Structured => "structured",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Extent2d
// ============================================================================

/// 2D extent in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl Extent2d {
    /// Create a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of texels covered.
    pub fn texel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the extent covers no texels.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Extent2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a port sizes its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PortExtent {
    /// Follows the graph's frame resolution.
    #[default]
    Frame,
    /// Fixed size chosen by the pass.
    Fixed(Extent2d),
}

impl PortExtent {
    /// Resolve against the current frame resolution.
    pub fn resolve(self, frame: Extent2d) -> Extent2d {
        match self {
            Self::Frame => frame,
            Self::Fixed(extent) => extent,
        }
    }
}

// ============================================================================
// ResourceDesc
// ============================================================================

/// Fully resolved description of one piece of storage.
///
/// Two resources may share a storage slot only if their descriptions are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    /// Data kind.
    pub kind: ResourceKind,
    /// Size in texels.
    pub extent: Extent2d,
}

impl ResourceDesc {
    /// Create a new description.
    pub fn new(kind: ResourceKind, extent: Extent2d) -> Self {
        Self { kind, extent }
    }

    /// Channels per texel.
    pub fn channels(&self) -> usize {
        self.kind.channels()
    }

    /// Number of f32 values needed to store the resource.
    pub fn element_count(&self) -> usize {
        self.extent.texel_count() * self.channels()
    }

    /// Storage size in bytes.
    pub fn byte_size(&self) -> u64 {
        (self.element_count() * std::mem::size_of::<f32>()) as u64
    }

    /// Whether storage for `self` can be reused for `other`.
    ///
    /// Depth and mask are interchangeable because they share a layout.
    pub fn is_layout_compatible(&self, other: &ResourceDesc) -> bool {
        self.extent == other.extent && self.channels() == other.channels()
    }
}
