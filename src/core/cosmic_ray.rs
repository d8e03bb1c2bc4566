use crate::types::{Mask, MaskResult, PixelData};
use serde::{Deserialize, Serialize};

/// Parameters handed to the cosmic-ray detector for every frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CosmicRayParams {
    /// Read noise of the camera in electrons
    pub read_noise: f64,
    /// Sigma-clipping threshold for flagging a cosmic-ray hit
    pub sigma_clip: f64,
    /// Let the detector report its own progress
    pub verbose: bool,
}

impl Default for CosmicRayParams {
    fn default() -> Self {
        Self {
            read_noise: 10.0,
            sigma_clip: 8.0,
            verbose: true,
        }
    }
}

/// Source of per-frame cosmic-ray masks.
///
/// The detection algorithm itself lives outside this crate; implementors wrap
/// whatever detector is available. The returned mask must have the same shape
/// as `data`.
pub trait CosmicRayDetector {
    fn detect(&self, data: &PixelData, params: &CosmicRayParams) -> MaskResult<Mask>;
}

impl<F> CosmicRayDetector for F
where
    F: Fn(&PixelData, &CosmicRayParams) -> MaskResult<Mask>,
{
    fn detect(&self, data: &PixelData, params: &CosmicRayParams) -> MaskResult<Mask> {
        self(data, params)
    }
}
