use crate::config::MaskConfig;
use crate::core::combine::{check_shape, combine_masks, mask_statistics, merge_existing};
use crate::core::cosmic_ray::CosmicRayDetector;
use crate::core::static_mask::{CombinedStaticMask, StaticMaskSet};
use crate::io::{ImageCollection, PersistenceSink, StaticMaskSource};
use crate::types::{MaskResult, MaskStatistics};

/// Where an image is in its read-compute-write cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageStage {
    Pending,
    CosmicRayDetected,
    Merged,
    Persisted,
}

/// Outcome for one persisted frame
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub file_name: String,
    /// Whether the frame carried a mask before processing
    pub had_existing_mask: bool,
    pub statistics: MaskStatistics,
}

/// Summary of a completed batch
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingReport {
    pub static_mask: MaskStatistics,
    pub images: Vec<ProcessedImage>,
}

impl ProcessingReport {
    pub fn processed_count(&self) -> usize {
        self.images.len()
    }
}

/// A mask-processing session: configuration plus the static mask built once
/// up front and shared read-only by every frame.
pub struct MaskSession {
    config: MaskConfig,
    static_mask: CombinedStaticMask,
}

impl MaskSession {
    /// Build the session's combined static mask from the configured mask files
    pub fn new<S: StaticMaskSource + ?Sized>(config: MaskConfig, source: &S) -> MaskResult<Self> {
        config.validate()?;
        let static_set =
            StaticMaskSet::load(source, &config.hot_pixel_mask, &config.bad_pixel_mask)?;
        Ok(Self::with_static_mask(config, static_set.combine()?))
    }

    pub fn with_static_mask(config: MaskConfig, static_mask: CombinedStaticMask) -> Self {
        log::info!("Combined static mask: {}", static_mask.statistics());
        Self {
            config,
            static_mask,
        }
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    pub fn static_mask(&self) -> &CombinedStaticMask {
        &self.static_mask
    }

    /// Merge static, cosmic-ray and existing masks into every science frame of
    /// `collection` and write each frame back through `sink`.
    ///
    /// Frames are handled one at a time in enumeration order. The first failure
    /// stops the batch; frames written before it stay written.
    pub fn apply<C, D, P>(
        &self,
        collection: &C,
        detector: &D,
        sink: &P,
    ) -> MaskResult<ProcessingReport>
    where
        C: ImageCollection + ?Sized,
        D: CosmicRayDetector + ?Sized,
        P: PersistenceSink + ?Sized,
    {
        let file_names = collection.files_filtered(&self.config.science_imagetyp)?;
        log::info!(
            "Found {} '{}' frames to mask",
            file_names.len(),
            self.config.science_imagetyp
        );

        let mut images = Vec::with_capacity(file_names.len());
        for (index, file_name) in file_names.iter().enumerate() {
            log::info!(
                "Working on {} ({}/{})",
                file_name,
                index + 1,
                file_names.len()
            );
            let processed = self
                .process_image(collection, detector, sink, file_name)
                .map_err(|e| e.for_image(file_name.as_str()))?;
            images.push(processed);
        }

        log::info!("Masked {} frames", images.len());
        Ok(ProcessingReport {
            static_mask: self.static_mask.statistics(),
            images,
        })
    }

    fn process_image<C, D, P>(
        &self,
        collection: &C,
        detector: &D,
        sink: &P,
        file_name: &str,
    ) -> MaskResult<ProcessedImage>
    where
        C: ImageCollection + ?Sized,
        D: CosmicRayDetector + ?Sized,
        P: PersistenceSink + ?Sized,
    {
        let mut stage = ImageStage::Pending;
        let mut image = collection.load(file_name)?;
        check_shape(self.static_mask.shape(), image.shape())?;

        let cosmic_rays = detector.detect(&image.data, &self.config.cosmic_ray)?;
        check_shape(image.shape(), cosmic_rays.dim())?;
        advance(&mut stage, ImageStage::CosmicRayDetected, file_name);
        log::debug!("Cosmic rays: {}", mask_statistics(&cosmic_rays));

        let overall = combine_masks([&cosmic_rays, self.static_mask.mask()])?;
        let had_existing_mask = image.mask.is_some();
        let final_mask = merge_existing(image.mask.as_ref(), overall)?;
        let statistics = mask_statistics(&final_mask);
        image.mask = Some(final_mask);
        advance(&mut stage, ImageStage::Merged, file_name);

        sink.persist(&image, self.config.overwrite)?;
        advance(&mut stage, ImageStage::Persisted, file_name);
        log::info!("{}: {}", file_name, statistics);

        Ok(ProcessedImage {
            file_name: file_name.to_string(),
            had_existing_mask,
            statistics,
        })
    }
}

fn advance(stage: &mut ImageStage, next: ImageStage, file_name: &str) {
    log::debug!("{}: {:?} -> {:?}", file_name, stage, next);
    *stage = next;
}

/// Load the static masks, then mask and persist every science frame
pub fn apply_masks<S, C, D, P>(
    config: MaskConfig,
    mask_source: &S,
    collection: &C,
    detector: &D,
    sink: &P,
) -> MaskResult<ProcessingReport>
where
    S: StaticMaskSource + ?Sized,
    C: ImageCollection + ?Sized,
    D: CosmicRayDetector + ?Sized,
    P: PersistenceSink + ?Sized,
{
    MaskSession::new(config, mask_source)?.apply(collection, detector, sink)
}
