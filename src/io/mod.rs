//! I/O collaborators: static mask sources, image collections and persistence sinks

#[cfg(feature = "raster")]
pub mod fits;
pub mod memory;
#[cfg(feature = "raster")]
pub mod raster;

use crate::types::{CcdImage, ImageSummary, Mask, MaskResult};

pub use memory::{MemoryCollection, MemoryMaskSource};
#[cfg(feature = "raster")]
pub use raster::RasterDirectory;

/// Supplies session-wide static masks by file name
pub trait StaticMaskSource {
    /// Load a mask, converting nonzero values to `true`
    fn load_mask(&self, name: &str) -> MaskResult<Mask>;
}

/// A directory-like collection of images
pub trait ImageCollection {
    /// Every image with its IMAGETYP header value, in enumeration order
    fn summaries(&self) -> MaskResult<Vec<ImageSummary>>;

    /// Load pixel data and any existing mask of one image
    fn load(&self, file_name: &str) -> MaskResult<CcdImage>;

    /// File names whose IMAGETYP matches `imagetyp` (case-insensitive)
    fn files_filtered(&self, imagetyp: &str) -> MaskResult<Vec<String>> {
        Ok(self
            .summaries()?
            .into_iter()
            .filter(|summary| summary.is_type(imagetyp))
            .map(|summary| summary.file_name)
            .collect())
    }
}

/// Writes an image (pixels and mask) back to where it came from
pub trait PersistenceSink {
    /// Fails with `OverwriteDenied` if the target exists and `overwrite` is false
    fn persist(&self, image: &CcdImage, overwrite: bool) -> MaskResult<()>;
}
