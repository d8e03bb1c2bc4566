use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Boolean pixel mask, `true` flags a pixel to exclude
pub type Mask = Array2<bool>;

/// Calibrated pixel values (rows x columns)
pub type PixelData = Array2<f32>;

/// Header keyword naming the frame type (light, dark, flat, bias)
pub const IMAGETYP_KEY: &str = "IMAGETYP";

/// A science frame together with its optional mask
#[derive(Debug, Clone)]
pub struct CcdImage {
    /// File name of the image inside its directory
    pub file_name: String,
    pub data: PixelData,
    /// Pre-existing mask; `None` when the file carries no mask
    pub mask: Option<Mask>,
    /// Header keywords carried through a rewrite
    pub header: BTreeMap<String, String>,
}

impl CcdImage {
    pub fn new(file_name: impl Into<String>, data: PixelData) -> Self {
        Self {
            file_name: file_name.into(),
            data,
            mask: None,
            header: BTreeMap::new(),
        }
    }

    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_header_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }

    /// IMAGETYP keyword, if present
    pub fn imagetyp(&self) -> Option<&str> {
        self.header.get(IMAGETYP_KEY).map(String::as_str)
    }

    /// (rows, columns) of the pixel grid
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Header summary of one file in an image collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub file_name: String,
    /// Value of the IMAGETYP keyword, if the header has one
    pub imagetyp: Option<String>,
}

impl ImageSummary {
    /// Case-insensitive match against an `imagetyp` value
    pub fn is_type(&self, imagetyp: &str) -> bool {
        self.imagetyp
            .as_deref()
            .map(|t| t.trim().trim_matches('\'').trim().eq_ignore_ascii_case(imagetyp.trim()))
            .unwrap_or(false)
    }
}

/// Counts of flagged pixels in a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub masked_pixels: usize,
}

impl MaskStatistics {
    /// Fraction of pixels flagged, in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.masked_pixels as f64 / self.total_pixels as f64
        }
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }
}

impl std::fmt::Display for MaskStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} pixels masked ({:.3}%)",
            self.masked_pixels,
            self.total_pixels,
            self.percent()
        )
    }
}

/// Error types for mask processing
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Refusing to overwrite {} without the overwrite flag", .0.display())]
    OverwriteDenied(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(String),

    #[error("FITS I/O error: {0}")]
    Fits(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cosmic-ray detection failed: {0}")]
    Detection(String),

    #[error("Failed to process {file_name}: {source}")]
    Image {
        file_name: String,
        #[source]
        source: Box<MaskError>,
    },
}

impl MaskError {
    /// Attach the name of the image being processed
    pub fn for_image(self, file_name: impl Into<String>) -> Self {
        MaskError::Image {
            file_name: file_name.into(),
            source: Box::new(self),
        }
    }

    /// The error underneath any `Image` wrapping
    pub fn root(&self) -> &MaskError {
        match self {
            MaskError::Image { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for mask operations
pub type MaskResult<T> = Result<T, MaskError>;
