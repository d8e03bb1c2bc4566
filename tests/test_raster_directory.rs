#![cfg(feature = "raster")]

use ccdmask::io::fits::MASK_EXTNAME;
use ccdmask::io::{ImageCollection, PersistenceSink, RasterDirectory, StaticMaskSource};
use ccdmask::types::{CcdImage, Mask, MaskError, MaskResult, PixelData, IMAGETYP_KEY};
use ccdmask::{apply_masks, CosmicRayParams, MaskConfig};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::{array, Array2};
use std::path::Path;
use tempfile::TempDir;

/// GeoTIFF keeps arbitrary metadata items and is built into every GDAL
const DRIVER: &str = "GTiff";

fn raster_dir(dir: &TempDir) -> Option<RasterDirectory> {
    if gdal::DriverManager::get_driver_by_name(DRIVER).is_err() {
        println!("GDAL driver {} not available, skipping test", DRIVER);
        return None;
    }
    Some(
        RasterDirectory::new(dir.path())
            .unwrap()
            .with_driver(DRIVER)
            .with_extension("tif"),
    )
}

fn write(raster: &RasterDirectory, image: &CcdImage) {
    raster
        .write_image(image, &raster.path_of(&image.file_name))
        .expect("Failed to write test raster");
}

#[test]
fn test_image_round_trip_keeps_mask_and_header() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let Some(raster) = raster_dir(&dir) else { return };

    let image = CcdImage::new("frame.tif", array![[1.5f32, 2.0, 3.0], [4.0, 5.0, 6.25]])
        .with_mask(array![[false, true, false], [false, false, true]])
        .with_header_value(IMAGETYP_KEY, "LIGHT");
    write(&raster, &image);

    let loaded = raster.load("frame.tif").unwrap();
    assert_eq!(loaded.data, image.data);
    assert_eq!(loaded.mask, image.mask);
    assert_eq!(loaded.imagetyp(), Some("LIGHT"));

    let summaries = raster.summaries().unwrap();
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].is_type("light"));
}

#[test]
fn test_unmasked_image_loads_without_mask() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let Some(raster) = raster_dir(&dir) else { return };

    write(&raster, &CcdImage::new("plain.tif", Array2::zeros((3, 2))));
    let loaded = raster.load("plain.tif").unwrap();
    assert!(loaded.mask.is_none());
    assert_eq!(loaded.shape(), (3, 2));
}

#[test]
fn test_static_mask_nonzero_is_flagged() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let Some(raster) = raster_dir(&dir) else { return };

    write(
        &raster,
        &CcdImage::new("hot.tif", array![[0.0f32, 3.0], [0.0, -1.0]]),
    );
    let mask = raster.load_mask("hot.tif").unwrap();
    assert_eq!(mask, array![[false, true], [false, true]]);
}

#[test]
fn test_persist_refuses_silent_overwrite() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let Some(raster) = raster_dir(&dir) else { return };

    let image = CcdImage::new("frame.tif", Array2::from_elem((2, 2), 7.0));
    write(&raster, &image);

    let updated = image.clone().with_mask(Mask::from_elem((2, 2), true));
    assert!(matches!(
        raster.persist(&updated, false),
        Err(MaskError::OverwriteDenied(_))
    ));
    assert!(raster.load("frame.tif").unwrap().mask.is_none());

    raster.persist(&updated, true).unwrap();
    assert_eq!(
        raster.load("frame.tif").unwrap().mask,
        Some(Mask::from_elem((2, 2), true))
    );
}

#[test]
fn test_bad_mask_shape_keeps_original_raster() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let Some(raster) = raster_dir(&dir) else { return };

    let image = CcdImage::new("frame.tif", Array2::from_elem((2, 2), 7.0));
    write(&raster, &image);

    let bad = image.clone().with_mask(Mask::from_elem((1, 4), true));
    assert!(matches!(
        raster.persist(&bad, true),
        Err(MaskError::ShapeMismatch { .. })
    ));
    assert_eq!(raster.load("frame.tif").unwrap().data, image.data);
}

#[test]
fn test_directory_batch() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = TempDir::new().expect("Failed to create temp directory");
    let Some(raster) = raster_dir(&dir) else { return };

    let config = MaskConfig {
        bad_pixel_mask: "mask_from_ccdmask_flat.tif".to_string(),
        hot_pixel_mask: "mask_from_dark_current.tif".to_string(),
        overwrite: true,
        ..MaskConfig::default()
    };

    write(
        &raster,
        &CcdImage::new(&config.bad_pixel_mask, array![[0.0f32, 1.0], [0.0, 0.0]]),
    );
    write(
        &raster,
        &CcdImage::new(&config.hot_pixel_mask, array![[0.0f32, 0.0], [1.0, 0.0]]),
    );
    write(
        &raster,
        &CcdImage::new("a-light.tif", Array2::from_elem((2, 2), 100.0))
            .with_header_value(IMAGETYP_KEY, "light"),
    );
    write(
        &raster,
        &CcdImage::new("b-light.tif", Array2::from_elem((2, 2), 200.0))
            .with_mask(array![[false, false], [false, true]])
            .with_header_value(IMAGETYP_KEY, "LIGHT"),
    );
    write(
        &raster,
        &CcdImage::new("c-flat.tif", Array2::from_elem((2, 2), 1.0))
            .with_header_value(IMAGETYP_KEY, "flat"),
    );

    let detector = |data: &PixelData, _: &CosmicRayParams| -> MaskResult<Mask> {
        // flag the top-left pixel of the first frame only
        let mut mask = Mask::from_elem(data.dim(), false);
        mask[[0, 0]] = data[[0, 0]] < 150.0;
        Ok(mask)
    };

    let report = apply_masks(config, &raster, &raster, &detector, &raster).unwrap();
    assert_eq!(report.processed_count(), 2);

    let a = raster.load("a-light.tif").unwrap();
    assert_eq!(a.mask, Some(array![[true, true], [true, false]]));
    assert_eq!(a.data, Array2::from_elem((2, 2), 100.0));
    assert_eq!(a.imagetyp(), Some("light"));

    let b = raster.load("b-light.tif").unwrap();
    assert_eq!(b.mask, Some(array![[false, true], [true, true]]));

    assert!(raster.load("c-flat.tif").unwrap().mask.is_none());
}

/// Write a frame the way CCDData does: float primary with IMAGETYP, then
/// optional `MASK` (uint8) and `UNCERT` extensions.
fn write_ccddata(path: &Path, data: &Array2<f32>, imagetyp: &str, mask: Option<&Mask>) {
    let (height, width) = data.dim();
    let primary_description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &[height, width],
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&primary_description)
        .open()
        .expect("Failed to create FITS fixture");
    let primary = fptr.primary_hdu().unwrap();
    let pixels: Vec<f32> = data.iter().copied().collect();
    primary.write_image(&mut fptr, &pixels).unwrap();
    primary.write_key(&mut fptr, IMAGETYP_KEY, imagetyp).unwrap();

    if let Some(mask) = mask {
        let description = ImageDescription {
            data_type: ImageType::UnsignedByte,
            dimensions: &[height, width],
        };
        let hdu = fptr.create_image(MASK_EXTNAME.to_string(), &description).unwrap();
        let bytes: Vec<u8> = mask.iter().map(|&m| u8::from(m)).collect();
        hdu.write_image(&mut fptr, &bytes).unwrap();
    }

    let uncert = fptr
        .create_image("UNCERT".to_string(), &primary_description)
        .unwrap();
    uncert.write_image(&mut fptr, &vec![0.25f32; height * width]).unwrap();
}

fn write_fits_mask(path: &Path, values: &[i32], shape: (usize, usize)) {
    let description = ImageDescription {
        data_type: ImageType::Long,
        dimensions: &[shape.0, shape.1],
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .open()
        .expect("Failed to create FITS mask");
    let primary = fptr.primary_hdu().unwrap();
    primary.write_image(&mut fptr, values).unwrap();
}

fn read_uncert(path: &Path) -> Vec<f32> {
    let mut fptr = FitsFile::open(path).unwrap();
    let hdu = fptr.hdu("UNCERT").unwrap();
    hdu.read_image(&mut fptr).unwrap()
}

#[test]
fn test_fits_mask_extension_is_read() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let raster = RasterDirectory::new(dir.path()).unwrap();

    let mask = array![[false, true, false], [false, false, false]];
    write_ccddata(
        &raster.path_of("wasp-001.fits"),
        &array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]],
        "LIGHT",
        Some(&mask),
    );
    write_ccddata(
        &raster.path_of("wasp-002.fits"),
        &Array2::zeros((2, 3)),
        "light",
        None,
    );

    let masked = raster.load("wasp-001.fits").unwrap();
    assert_eq!(masked.mask, Some(mask));
    assert_eq!(masked.data, array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    assert_eq!(masked.imagetyp(), Some("LIGHT"));

    assert!(raster.load("wasp-002.fits").unwrap().mask.is_none());

    let summaries = raster.summaries().unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.is_type("light")));
}

#[test]
fn test_fits_round_trip_of_new_file() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let raster = RasterDirectory::new(dir.path()).unwrap();

    let image = CcdImage::new("new.fits", array![[0.5f32, 1.5], [2.5, 3.5]])
        .with_mask(array![[true, false], [false, true]])
        .with_header_value(IMAGETYP_KEY, "light");
    raster.persist(&image, false).unwrap();

    let loaded = raster.load("new.fits").unwrap();
    assert_eq!(loaded.data, image.data);
    assert_eq!(loaded.mask, image.mask);
    assert_eq!(loaded.imagetyp(), Some("light"));
}

#[test]
fn test_fits_overwrite_keeps_other_extensions() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let raster = RasterDirectory::new(dir.path()).unwrap();
    let path = raster.path_of("frame.fits");
    write_ccddata(&path, &Array2::from_elem((2, 2), 3.0), "light", None);

    let updated = raster
        .load("frame.fits")
        .unwrap()
        .with_mask(array![[false, false], [true, false]]);
    assert!(matches!(
        raster.persist(&updated, false),
        Err(MaskError::OverwriteDenied(_))
    ));
    assert!(raster.load("frame.fits").unwrap().mask.is_none());

    raster.persist(&updated, true).unwrap();
    let loaded = raster.load("frame.fits").unwrap();
    assert_eq!(loaded.mask, Some(array![[false, false], [true, false]]));
    assert_eq!(loaded.imagetyp(), Some("light"));
    assert_eq!(read_uncert(&path), vec![0.25; 4]);
}

#[test]
fn test_fits_directory_batch_merges_existing_masks() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = TempDir::new().expect("Failed to create temp directory");
    let raster = RasterDirectory::new(dir.path()).unwrap();
    let config = MaskConfig {
        overwrite: true,
        ..MaskConfig::default()
    };

    write_fits_mask(&raster.path_of(&config.bad_pixel_mask), &[0, 1, 0, 0], (2, 2));
    write_fits_mask(&raster.path_of(&config.hot_pixel_mask), &[0, 0, 7, 0], (2, 2));
    write_ccddata(
        &raster.path_of("a-light.fits"),
        &Array2::from_elem((2, 2), 100.0),
        "light",
        None,
    );
    write_ccddata(
        &raster.path_of("b-light.fits"),
        &Array2::from_elem((2, 2), 200.0),
        "LIGHT",
        Some(&array![[false, false], [false, true]]),
    );
    write_ccddata(
        &raster.path_of("c-flat.fits"),
        &Array2::from_elem((2, 2), 1.0),
        "flat",
        None,
    );

    let detector = |data: &PixelData, _: &CosmicRayParams| -> MaskResult<Mask> {
        let mut mask = Mask::from_elem(data.dim(), false);
        mask[[0, 0]] = data[[0, 0]] < 150.0;
        Ok(mask)
    };

    let report = apply_masks(config, &raster, &raster, &detector, &raster).unwrap();
    assert_eq!(report.processed_count(), 2);
    assert!(!report.images[0].had_existing_mask);
    assert!(report.images[1].had_existing_mask);

    let a = raster.load("a-light.fits").unwrap();
    assert_eq!(a.mask, Some(array![[true, true], [true, false]]));
    assert_eq!(a.data, Array2::from_elem((2, 2), 100.0));

    let b = raster.load("b-light.fits").unwrap();
    assert_eq!(b.mask, Some(array![[false, true], [true, true]]));
    assert_eq!(read_uncert(&raster.path_of("b-light.fits")), vec![0.25; 4]);

    assert!(raster.load("c-flat.fits").unwrap().mask.is_none());
}
