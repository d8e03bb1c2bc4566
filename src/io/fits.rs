//! FITS frames in the CCDData layout: pixel data in the primary HDU, the mask
//! as an 8-bit image extension named `MASK`. Other extensions (`UNCERT`, WCS
//! tables) are left alone when a frame is updated in place.

use crate::core::combine::{check_shape, mask_from_numeric};
use crate::types::{CcdImage, Mask, MaskError, MaskResult, PixelData, IMAGETYP_KEY};
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::Path;

/// EXTNAME of the mask extension
pub const MASK_EXTNAME: &str = "MASK";

/// File extensions handled by cfitsio rather than GDAL
pub const FITS_EXTENSIONS: [&str; 3] = ["fits", "fit", "fts"];

/// Keywords cfitsio writes itself
const STRUCTURAL_KEYS: [&str; 7] = ["SIMPLE", "BITPIX", "EXTEND", "BZERO", "BSCALE", "EXTNAME", "END"];

impl From<fitsio::errors::Error> for MaskError {
    fn from(err: fitsio::errors::Error) -> Self {
        MaskError::Fits(err.to_string())
    }
}

pub fn is_fits_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FITS_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_structural_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    key.starts_with("NAXIS") || STRUCTURAL_KEYS.contains(&key.as_str())
}

/// (rows, columns) of a 2-D image HDU
fn image_shape(hdu: &FitsHdu) -> MaskResult<(usize, usize)> {
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => Ok((shape[0], shape[1])),
        HduInfo::ImageInfo { shape, .. } => Err(MaskError::InvalidFormat(format!(
            "Expected a 2-D image, found {} axes",
            shape.len()
        ))),
        _ => Err(MaskError::InvalidFormat(
            "HDU does not hold an image".to_string(),
        )),
    }
}

fn read_pixels(fptr: &mut FitsFile, hdu: &FitsHdu) -> MaskResult<Array2<f32>> {
    let shape = image_shape(hdu)?;
    let pixels: Vec<f32> = hdu.read_image(fptr)?;
    Array2::from_shape_vec(shape, pixels)
        .map_err(|e| MaskError::InvalidFormat(format!("Failed to reshape FITS image: {}", e)))
}

fn mask_hdu(fptr: &mut FitsFile) -> Option<FitsHdu> {
    fptr.hdu(MASK_EXTNAME).ok()
}

fn mask_bytes(mask: &Mask) -> Vec<u8> {
    mask.iter().map(|&flagged| u8::from(flagged)).collect()
}

fn write_mask(fptr: &mut FitsFile, mask: &Mask) -> MaskResult<()> {
    let hdu = match mask_hdu(fptr) {
        Some(hdu) => {
            check_shape(mask.dim(), image_shape(&hdu)?)?;
            hdu
        }
        None => {
            let (height, width) = mask.dim();
            let description = ImageDescription {
                data_type: ImageType::UnsignedByte,
                dimensions: &[height, width],
            };
            fptr.create_image(MASK_EXTNAME.to_string(), &description)?
        }
    };
    hdu.write_image(fptr, &mask_bytes(mask))?;
    Ok(())
}

/// Primary HDU pixels, used for static masks
pub fn read_primary(path: &Path) -> MaskResult<Array2<f32>> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.primary_hdu()?;
    read_pixels(&mut fptr, &hdu)
}

/// IMAGETYP card of the primary header, if present
pub fn read_imagetyp(path: &Path) -> MaskResult<Option<String>> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.primary_hdu()?;
    Ok(hdu.read_key::<String>(&mut fptr, IMAGETYP_KEY).ok())
}

/// Primary data plus the `MASK` extension when the file has one
pub fn read_image(path: &Path, file_name: &str) -> MaskResult<CcdImage> {
    let mut fptr = FitsFile::open(path)?;
    let primary = fptr.primary_hdu()?;
    let data: PixelData = read_pixels(&mut fptr, &primary)?;

    let mut header = BTreeMap::new();
    if let Ok(imagetyp) = primary.read_key::<String>(&mut fptr, IMAGETYP_KEY) {
        header.insert(IMAGETYP_KEY.to_string(), imagetyp);
    }

    let mask = match mask_hdu(&mut fptr) {
        Some(hdu) => {
            let values = read_pixels(&mut fptr, &hdu)?;
            check_shape(data.dim(), values.dim())?;
            Some(mask_from_numeric(&values))
        }
        None => None,
    };
    log::debug!(
        "Read {} {:?} from FITS, mask extension: {}",
        file_name,
        data.dim(),
        mask.is_some()
    );

    Ok(CcdImage {
        file_name: file_name.to_string(),
        data,
        mask,
        header,
    })
}

/// Write a new file. `path` must not exist.
pub fn create_image(image: &CcdImage, path: &Path) -> MaskResult<()> {
    let (height, width) = image.shape();
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &[height, width],
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .open()?;
    let primary = fptr.primary_hdu()?;

    let pixels: Vec<f32> = image.data.iter().copied().collect();
    primary.write_image(&mut fptr, &pixels)?;
    for (key, value) in image.header.iter().filter(|(key, _)| !is_structural_key(key)) {
        primary.write_key(&mut fptr, key, value.as_str())?;
    }

    if let Some(mask) = &image.mask {
        write_mask(&mut fptr, mask)?;
    }
    Ok(())
}

/// Rewrite pixels and mask of an existing file, keeping its header and any
/// other extensions. A file without a `MASK` extension gains one.
pub fn update_image(image: &CcdImage, path: &Path) -> MaskResult<()> {
    let mut fptr = FitsFile::edit(path)?;
    let primary = fptr.primary_hdu()?;
    check_shape(image_shape(&primary)?, image.shape())?;

    let pixels: Vec<f32> = image.data.iter().copied().collect();
    primary.write_image(&mut fptr, &pixels)?;

    if let Some(mask) = &image.mask {
        write_mask(&mut fptr, mask)?;
    }
    Ok(())
}
