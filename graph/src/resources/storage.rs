//! CPU texel storage.

use crate::error::PassError;
use crate::types::{Extent2d, ResourceDesc, ResourceKind};

/// Storage for one typed 2D resource.
///
/// Texels are stored row-major, `channels()` consecutive f32 values each.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    desc: ResourceDesc,
    data: Vec<f32>,
}

impl Resource {
    /// Allocate zero-filled storage.
    pub fn new(desc: ResourceDesc) -> Self {
        Self {
            desc,
            data: vec![0.0; desc.element_count()],
        }
    }

    /// Wrap existing data. Returns `None` if the length does not match.
    pub fn from_data(desc: ResourceDesc, data: Vec<f32>) -> Option<Self> {
        (data.len() == desc.element_count()).then_some(Self { desc, data })
    }

    pub fn desc(&self) -> ResourceDesc {
        self.desc
    }

    pub fn kind(&self) -> ResourceKind {
        self.desc.kind
    }

    pub fn extent(&self) -> Extent2d {
        self.desc.extent
    }

    pub fn channels(&self) -> usize {
        self.desc.channels()
    }

    pub fn byte_size(&self) -> u64 {
        self.desc.byte_size()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.desc.extent.width && y < self.desc.extent.height);
        (y as usize * self.desc.extent.width as usize + x as usize) * self.channels()
    }

    /// Channels of the texel at `(x, y)`.
    pub fn texel(&self, x: u32, y: u32) -> &[f32] {
        let offset = self.offset(x, y);
        &self.data[offset..offset + self.channels()]
    }

    pub fn texel_mut(&mut self, x: u32, y: u32) -> &mut [f32] {
        let offset = self.offset(x, y);
        let channels = self.channels();
        &mut self.data[offset..offset + channels]
    }

    /// Iterate mutable texels with their coordinates.
    pub fn texels_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut [f32])> {
        let width = self.desc.extent.width.max(1) as usize;
        let channels = self.channels();
        self.data
            .chunks_exact_mut(channels)
            .enumerate()
            .map(move |(index, texel)| ((index % width) as u32, (index / width) as u32, texel))
    }

    /// Set every channel of every texel to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    /// Copy the contents of `other` into `self`.
    ///
    /// Both resources must have the same extent and channel count.
    pub fn copy_from(&mut self, other: &Resource) -> Result<(), PassError> {
        if !self.desc.is_layout_compatible(&other.desc) {
            return Err(PassError::InvalidConfiguration(format!(
                "cannot copy {} {} into {} {}",
                other.desc.extent, other.desc.kind, self.desc.extent, self.desc.kind
            )));
        }
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Per-channel mean over all texels. Empty resources yield zeros.
    pub fn channel_means(&self) -> Vec<f32> {
        let channels = self.channels();
        let mut sums = vec![0.0f64; channels];
        for texel in self.data.chunks_exact(channels) {
            for (sum, value) in sums.iter_mut().zip(texel) {
                *sum += *value as f64;
            }
        }
        let count = self.desc.extent.texel_count().max(1) as f64;
        sums.into_iter().map(|sum| (sum / count) as f32).collect()
    }
}
