//! Session configuration for mask processing

use crate::core::cosmic_ray::CosmicRayParams;
use crate::types::{MaskError, MaskResult};
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the driver needs besides its collaborators.
///
/// Can be read from an XML document whose root element holds the fields in
/// camelCase, e.g.
///
/// ```xml
/// <maskConfig>
///     <hotPixelMask>mask_from_dark_current.fits</hotPixelMask>
///     <cosmicRay><sigmaClip>6.5</sigmaClip></cosmicRay>
///     <overwrite>true</overwrite>
/// </maskConfig>
/// ```
///
/// Missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaskConfig {
    /// Bad-pixel mask derived from flat-field defects
    pub bad_pixel_mask: String,
    /// Hot-pixel mask derived from dark-current analysis
    pub hot_pixel_mask: String,
    /// IMAGETYP of the frames that get masked
    pub science_imagetyp: String,
    pub cosmic_ray: CosmicRayParams,
    /// Replace each calibrated frame in place
    pub overwrite: bool,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            bad_pixel_mask: "mask_from_ccdmask_flat.fits".to_string(),
            hot_pixel_mask: "mask_from_dark_current.fits".to_string(),
            science_imagetyp: "light".to_string(),
            cosmic_ray: CosmicRayParams::default(),
            overwrite: false,
        }
    }
}

impl MaskConfig {
    pub fn from_xml_str(xml: &str) -> MaskResult<Self> {
        let config: MaskConfig =
            from_str(xml).map_err(|e| MaskError::Config(format!("Failed to parse XML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_xml_file<P: AsRef<Path>>(path: P) -> MaskResult<Self> {
        let path = path.as_ref();
        log::info!("Reading mask configuration from: {}", path.display());

        if !path.exists() {
            return Err(MaskError::MissingFile(path.to_path_buf()));
        }
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml_str(&xml)
    }

    pub fn validate(&self) -> MaskResult<()> {
        if self.bad_pixel_mask.trim().is_empty() || self.hot_pixel_mask.trim().is_empty() {
            return Err(MaskError::Config(
                "Static mask file names must not be empty".to_string(),
            ));
        }
        if self.science_imagetyp.trim().is_empty() {
            return Err(MaskError::Config(
                "Science IMAGETYP must not be empty".to_string(),
            ));
        }
        if !(self.cosmic_ray.read_noise > 0.0) {
            return Err(MaskError::Config(format!(
                "Read noise must be positive, got {}",
                self.cosmic_ray.read_noise
            )));
        }
        if !(self.cosmic_ray.sigma_clip > 0.0) {
            return Err(MaskError::Config(format!(
                "Sigma clip must be positive, got {}",
                self.cosmic_ray.sigma_clip
            )));
        }
        Ok(())
    }
}
