use crate::core::combine::mask_from_numeric;
use crate::types::{CcdImage, ImageSummary, Mask, MaskError, MaskResult, IMAGETYP_KEY};
use ndarray::Array2;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;

use super::{ImageCollection, PersistenceSink, StaticMaskSource};

/// Static masks held in memory, keyed by file name
#[derive(Debug, Clone, Default)]
pub struct MemoryMaskSource {
    masks: HashMap<String, Array2<f32>>,
}

impl MemoryMaskSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a numeric mask grid; nonzero entries are flagged on load
    pub fn insert(&mut self, name: impl Into<String>, values: Array2<f32>) {
        self.masks.insert(name.into(), values);
    }

    pub fn with_mask(mut self, name: impl Into<String>, values: Array2<f32>) -> Self {
        self.insert(name, values);
        self
    }
}

impl StaticMaskSource for MemoryMaskSource {
    fn load_mask(&self, name: &str) -> MaskResult<Mask> {
        self.masks
            .get(name)
            .map(mask_from_numeric)
            .ok_or_else(|| MaskError::MissingFile(PathBuf::from(name)))
    }
}

/// Image collection kept in memory, preserving insertion order.
///
/// Acts as both the collection and the sink, so a processed frame replaces
/// its stored copy the same way an on-disk overwrite would.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    images: RefCell<Vec<CcdImage>>,
    write_count: Cell<usize>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image, replacing any stored image with the same file name
    pub fn insert(&mut self, image: CcdImage) {
        let images = self.images.get_mut();
        match images.iter().position(|i| i.file_name == image.file_name) {
            Some(index) => images[index] = image,
            None => images.push(image),
        }
    }

    /// Add an image tagged with an IMAGETYP header value
    pub fn with_image(mut self, imagetyp: &str, image: CcdImage) -> Self {
        self.insert(image.with_header_value(IMAGETYP_KEY, imagetyp));
        self
    }

    /// Current stored version of an image
    pub fn get(&self, file_name: &str) -> Option<CcdImage> {
        self.images
            .borrow()
            .iter()
            .find(|i| i.file_name == file_name)
            .cloned()
    }

    /// Number of successful `persist` calls
    pub fn write_count(&self) -> usize {
        self.write_count.get()
    }
}

impl ImageCollection for MemoryCollection {
    fn summaries(&self) -> MaskResult<Vec<ImageSummary>> {
        Ok(self
            .images
            .borrow()
            .iter()
            .map(|i| ImageSummary {
                file_name: i.file_name.clone(),
                imagetyp: i.imagetyp().map(str::to_string),
            })
            .collect())
    }

    fn load(&self, file_name: &str) -> MaskResult<CcdImage> {
        self.get(file_name)
            .ok_or_else(|| MaskError::MissingFile(PathBuf::from(file_name)))
    }
}

impl PersistenceSink for MemoryCollection {
    fn persist(&self, image: &CcdImage, overwrite: bool) -> MaskResult<()> {
        let mut images = self.images.borrow_mut();
        match images.iter().position(|i| i.file_name == image.file_name) {
            Some(_) if !overwrite => {
                return Err(MaskError::OverwriteDenied(PathBuf::from(&image.file_name)))
            }
            Some(index) => images[index] = image.clone(),
            None => images.push(image.clone()),
        }
        self.write_count.set(self.write_count.get() + 1);
        Ok(())
    }
}
