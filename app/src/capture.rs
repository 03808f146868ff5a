//! Writing graph outputs to image files.

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage};
use lantern_graph::Resource;

/// Errors reported while capturing outputs.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No frame has completed since the graph last changed.
    #[error("no completed frame to capture")]
    NoFrame,

    #[error("output index {index} out of range ({count} marked outputs)")]
    OutputIndex { index: usize, count: usize },

    #[error("output has no texels")]
    Empty,

    #[error("failed to create capture directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert a resource to 8-bit RGBA by clamping to `[0, 1]`.
///
/// Single-channel resources become gray. Alpha is always opaque.
pub fn to_rgba8(resource: &Resource) -> Result<RgbaImage, CaptureError> {
    let extent = resource.extent();
    if extent.is_empty() {
        return Err(CaptureError::Empty);
    }
    let channels = resource.channels();
    Ok(RgbaImage::from_fn(extent.width, extent.height, |x, y| {
        let texel = resource.texel(x, y);
        let [r, g, b] = match channels {
            1 => [texel[0]; 3],
            _ => [texel[0], texel[1], texel[2]],
        };
        Rgba([to_u8(r), to_u8(g), to_u8(b), 255])
    }))
}

/// Write a resource as an 8-bit PNG.
pub fn write_png(resource: &Resource, path: &Path) -> Result<(), CaptureError> {
    to_rgba8(resource)?
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| CaptureError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    log::debug!("Captured {} to {}", resource.extent(), path.display());
    Ok(())
}
