use crate::core::combine::{check_shape, combine_masks, mask_statistics};
use crate::io::StaticMaskSource;
use crate::types::{Mask, MaskResult, MaskStatistics};

/// The masks that apply identically to every frame of a session
#[derive(Debug, Clone)]
pub struct StaticMaskSet {
    hot_pixels: Mask,
    bad_pixels: Mask,
}

impl StaticMaskSet {
    /// Both masks must share a shape
    pub fn new(hot_pixels: Mask, bad_pixels: Mask) -> MaskResult<Self> {
        check_shape(hot_pixels.dim(), bad_pixels.dim())?;
        Ok(Self {
            hot_pixels,
            bad_pixels,
        })
    }

    /// Load the hot-pixel and flat-field bad-pixel masks by name
    pub fn load<S: StaticMaskSource + ?Sized>(
        source: &S,
        hot_pixel_name: &str,
        bad_pixel_name: &str,
    ) -> MaskResult<Self> {
        log::info!("Loading hot-pixel mask: {}", hot_pixel_name);
        let hot_pixels = source.load_mask(hot_pixel_name)?;
        log::info!("Loading bad-pixel mask: {}", bad_pixel_name);
        let bad_pixels = source.load_mask(bad_pixel_name)?;

        log::debug!(
            "Hot pixels: {}; bad pixels: {}",
            mask_statistics(&hot_pixels),
            mask_statistics(&bad_pixels)
        );
        Self::new(hot_pixels, bad_pixels)
    }

    pub fn hot_pixels(&self) -> &Mask {
        &self.hot_pixels
    }

    pub fn bad_pixels(&self) -> &Mask {
        &self.bad_pixels
    }

    pub fn shape(&self) -> (usize, usize) {
        self.hot_pixels.dim()
    }

    /// Reduce the set to a single mask
    pub fn combine(&self) -> MaskResult<CombinedStaticMask> {
        let mask = combine_masks([&self.hot_pixels, &self.bad_pixels])?;
        Ok(CombinedStaticMask { mask })
    }
}

/// OR of every static mask; read-only once built
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedStaticMask {
    mask: Mask,
}

impl CombinedStaticMask {
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mask.dim()
    }

    pub fn statistics(&self) -> MaskStatistics {
        mask_statistics(&self.mask)
    }
}

impl From<CombinedStaticMask> for Mask {
    fn from(combined: CombinedStaticMask) -> Self {
        combined.mask
    }
}
