//! Core mask processing modules

pub mod combine;
pub mod cosmic_ray;
pub mod static_mask;
pub mod pipeline;

// Re-export main types
pub use combine::{combine_masks, mask_from_numeric, mask_statistics, merge_existing};
pub use cosmic_ray::{CosmicRayDetector, CosmicRayParams};
pub use static_mask::{CombinedStaticMask, StaticMaskSet};
pub use pipeline::{apply_masks, MaskSession, ProcessedImage, ProcessingReport};
