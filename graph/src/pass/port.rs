//! Port declarations and port references.

use std::fmt;

use bitflags::bitflags;

use crate::error::ConstructionError;
use crate::types::{Extent2d, PortExtent, ResourceKind};

/// Direction of a port relative to its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Consumed by the pass.
    Input,
    /// Produced by the pass.
    Output,
    /// Consumed and produced in place. Acts as an input for edges arriving at
    /// the pass and as an output for edges leaving it.
    InputOutput,
}

impl PortDirection {
    /// Whether an edge may arrive at this port.
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::InputOutput)
    }

    /// Whether an edge may leave this port.
    pub fn is_output(self) -> bool {
        matches!(self, Self::Output | Self::InputOutput)
    }
}

bitflags! {
    /// Modifiers on a port declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PortFlags: u8 {
        /// Inputs: may be left unconnected. Outputs: storage may be elided
        /// when nothing consumes or observes the output.
        const OPTIONAL = 1 << 0;
        /// Output storage survives across frames and is never aliased.
        const PERSISTENT = 1 << 1;
        /// Input has a built-in default and never needs an edge.
        const HAS_DEFAULT = 1 << 2;
    }
}

/// A typed, named port declared by a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDesc {
    pub name: String,
    pub direction: PortDirection,
    pub kind: ResourceKind,
    pub extent: PortExtent,
    pub flags: PortFlags,
}

impl PortDesc {
    fn new(name: impl Into<String>, direction: PortDirection, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            direction,
            kind,
            extent: PortExtent::Frame,
            flags: PortFlags::empty(),
        }
    }

    /// Declare an input.
    pub fn input(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self::new(name, PortDirection::Input, kind)
    }

    /// Declare an output.
    pub fn output(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self::new(name, PortDirection::Output, kind)
    }

    /// Declare a read-modify-write port.
    pub fn input_output(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self::new(name, PortDirection::InputOutput, kind)
    }

    /// Mark as optional.
    pub fn optional(mut self) -> Self {
        self.flags |= PortFlags::OPTIONAL;
        self
    }

    /// Mark output storage as persistent.
    pub fn persistent(mut self) -> Self {
        self.flags |= PortFlags::PERSISTENT;
        self
    }

    /// Mark input as having a built-in default.
    pub fn with_default(mut self) -> Self {
        self.flags |= PortFlags::HAS_DEFAULT;
        self
    }

    /// Use a fixed size instead of the frame resolution.
    pub fn with_fixed_extent(mut self, width: u32, height: u32) -> Self {
        self.extent = PortExtent::Fixed(Extent2d::new(width, height));
        self
    }

    pub fn is_optional(&self) -> bool {
        self.flags.contains(PortFlags::OPTIONAL)
    }

    pub fn is_persistent(&self) -> bool {
        self.flags.contains(PortFlags::PERSISTENT)
    }

    /// Whether the resolver demands an incoming edge.
    ///
    /// Only plain inputs can be required; the input side of an in-place port
    /// starts from cleared storage when nothing feeds it.
    pub fn is_required_input(&self) -> bool {
        self.direction == PortDirection::Input
            && !self
                .flags
                .intersects(PortFlags::OPTIONAL | PortFlags::HAS_DEFAULT)
    }
}

/// Reference to a port as `pass.port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub pass: String,
    pub port: String,
}

impl PortRef {
    pub fn new(pass: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            pass: pass.into(),
            port: port.into(),
        }
    }

    /// Parse a `pass.port` path.
    ///
    /// The path splits at the first `.`; both halves must be non-empty.
    pub fn parse(path: &str) -> Result<Self, ConstructionError> {
        match path.split_once('.') {
            Some((pass, port)) if !pass.is_empty() && !port.is_empty() => {
                Ok(Self::new(pass, port))
            }
            _ => Err(ConstructionError::MalformedPortPath {
                path: path.to_string(),
            }),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pass, self.port)
    }
}
