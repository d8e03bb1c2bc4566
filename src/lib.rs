//! ccdmask: static and cosmic-ray masking for calibrated CCD frames
//!
//! Combines a session's hot-pixel and flat-field bad-pixel masks with a
//! per-frame cosmic-ray mask and any mask the frame already carries, then
//! writes the result back into each science image.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    CcdImage, ImageSummary, Mask, MaskError, MaskResult, MaskStatistics, PixelData,
};
pub use config::MaskConfig;
pub use crate::core::{
    apply_masks, combine_masks, merge_existing, CombinedStaticMask, CosmicRayDetector,
    CosmicRayParams, MaskSession, ProcessingReport, StaticMaskSet,
};
pub use io::{ImageCollection, MemoryCollection, MemoryMaskSource, PersistenceSink, StaticMaskSource};
#[cfg(feature = "raster")]
pub use io::RasterDirectory;
