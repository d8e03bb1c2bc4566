use crate::core::combine::{check_shape, mask_from_numeric, mask_to_numeric};
use crate::types::{CcdImage, ImageSummary, Mask, MaskError, MaskResult, IMAGETYP_KEY};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::fits::{self, FITS_EXTENSIONS};
use super::{ImageCollection, PersistenceSink, StaticMaskSource};

/// Band holding pixel values
const DATA_BAND: isize = 1;
/// Band holding the 0/1 mask in non-FITS rasters, when the file has one
const MASK_BAND: isize = 2;

impl From<gdal::errors::GdalError> for MaskError {
    fn from(err: gdal::errors::GdalError) -> Self {
        MaskError::Gdal(err.to_string())
    }
}

/// One directory of calibrated frames.
///
/// FITS files go through cfitsio in the CCDData layout (see [`super::fits`]):
/// pixels in the primary HDU, the mask in a `MASK` extension, IMAGETYP from
/// the primary header. Any other extension registered with
/// [`with_extension`](Self::with_extension) goes through GDAL, with pixels in
/// band 1, the mask in band 2 and header keywords as default-domain metadata.
#[derive(Debug, Clone)]
pub struct RasterDirectory {
    root: PathBuf,
    driver_name: String,
    extensions: Vec<String>,
}

impl RasterDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> MaskResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(MaskError::MissingFile(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            driver_name: "GTiff".to_string(),
            extensions: FITS_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        })
    }

    /// GDAL driver used when writing non-FITS images
    pub fn with_driver(mut self, driver_name: impl Into<String>) -> Self {
        self.driver_name = driver_name.into();
        self
    }

    /// Also enumerate files with this extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into().trim_start_matches('.').to_ascii_lowercase();
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    fn existing_path(&self, file_name: &str) -> MaskResult<PathBuf> {
        let path = self.path_of(file_name);
        if !path.is_file() {
            return Err(MaskError::MissingFile(path));
        }
        Ok(path)
    }

    fn has_known_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn read_imagetyp(&self, path: &Path) -> MaskResult<Option<String>> {
        if fits::is_fits_path(path) {
            return fits::read_imagetyp(path);
        }
        let dataset = Dataset::open(path)?;
        Ok(dataset.metadata_item(IMAGETYP_KEY, ""))
    }

    /// Write `image` as a new file at `path`
    pub fn write_image(&self, image: &CcdImage, path: &Path) -> MaskResult<()> {
        if let Some(mask) = &image.mask {
            check_shape(image.shape(), mask.dim())?;
        }
        if fits::is_fits_path(path) {
            log::debug!("Writing {} as FITS", path.display());
            fits::create_image(image, path)
        } else {
            self.write_raster(image, path)
        }
    }

    fn write_raster(&self, image: &CcdImage, path: &Path) -> MaskResult<()> {
        log::debug!(
            "Writing {} with driver {}",
            path.display(),
            self.driver_name
        );

        let (height, width) = image.shape();
        let band_count = if image.mask.is_some() { 2 } else { 1 };

        let driver = DriverManager::get_driver_by_name(&self.driver_name)?;
        let mut dataset = driver.create_with_band_type::<f32, _>(
            path,
            width as isize,
            height as isize,
            band_count,
        )?;

        for (key, value) in &image.header {
            dataset.set_metadata_item(key, value, "")?;
        }

        write_band(&dataset, DATA_BAND, &image.data)?;
        if let Some(mask) = &image.mask {
            write_band(&dataset, MASK_BAND, &mask_to_numeric(mask))?;
        }

        Ok(())
    }
}

impl StaticMaskSource for RasterDirectory {
    fn load_mask(&self, name: &str) -> MaskResult<Mask> {
        let path = self.existing_path(name)?;
        let values = if fits::is_fits_path(&path) {
            fits::read_primary(&path)?
        } else {
            read_band(&Dataset::open(&path)?, DATA_BAND)?
        };
        Ok(mask_from_numeric(&values))
    }
}

impl ImageCollection for RasterDirectory {
    fn summaries(&self) -> MaskResult<Vec<ImageSummary>> {
        let mut file_names: Vec<String> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if !path.is_file() || !self.has_known_extension(&path) {
                    return None;
                }
                path.file_name()?.to_str().map(str::to_string)
            })
            .collect();
        file_names.sort();

        let mut summaries = Vec::with_capacity(file_names.len());
        for file_name in file_names {
            let imagetyp = self
                .read_imagetyp(&self.path_of(&file_name))
                .map_err(|e| e.for_image(file_name.as_str()))?;
            summaries.push(ImageSummary {
                file_name,
                imagetyp,
            });
        }

        log::debug!(
            "Enumerated {} images in {}",
            summaries.len(),
            self.root.display()
        );
        Ok(summaries)
    }

    fn load(&self, file_name: &str) -> MaskResult<CcdImage> {
        let path = self.existing_path(file_name)?;
        if fits::is_fits_path(&path) {
            return fits::read_image(&path, file_name);
        }

        let dataset = Dataset::open(&path)?;
        let data = read_band(&dataset, DATA_BAND)?;

        let mask = if dataset.raster_count() >= MASK_BAND {
            let values = read_band(&dataset, MASK_BAND)?;
            check_shape(data.dim(), values.dim())?;
            Some(mask_from_numeric(&values))
        } else {
            None
        };

        Ok(CcdImage {
            file_name: file_name.to_string(),
            data,
            mask,
            header: read_header(&dataset),
        })
    }
}

impl PersistenceSink for RasterDirectory {
    fn persist(&self, image: &CcdImage, overwrite: bool) -> MaskResult<()> {
        let path = self.path_of(&image.file_name);
        if !path.exists() {
            return self.write_image(image, &path);
        }
        if !overwrite {
            return Err(MaskError::OverwriteDenied(path));
        }
        if let Some(mask) = &image.mask {
            check_shape(image.shape(), mask.dim())?;
        }

        if fits::is_fits_path(&path) {
            fits::update_image(image, &path)
        } else {
            // GDAL drivers do not all support create over an existing file
            std::fs::remove_file(&path)?;
            self.write_raster(image, &path)
        }
    }
}

fn read_band(dataset: &Dataset, index: isize) -> MaskResult<Array2<f32>> {
    let (width, height) = dataset.raster_size();
    let band = dataset.rasterband(index)?;
    let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

    Array2::from_shape_vec((height, width), buffer.data)
        .map_err(|e| MaskError::InvalidFormat(format!("Failed to reshape band {}: {}", index, e)))
}

fn write_band(dataset: &Dataset, index: isize, values: &Array2<f32>) -> MaskResult<()> {
    let (height, width) = values.dim();
    let mut band = dataset.rasterband(index)?;
    let flat_data: Vec<f32> = values.iter().cloned().collect();
    let buffer = Buffer::new((width, height), flat_data);
    band.write((0, 0), (width, height), &buffer)?;
    Ok(())
}

fn read_header(dataset: &Dataset) -> BTreeMap<String, String> {
    dataset
        .metadata_domain("")
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
