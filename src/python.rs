//! Python bindings

use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2, ToPyArray};
use pyo3::prelude::*;

use crate::config::MaskConfig;
use crate::core::{combine, CosmicRayDetector, CosmicRayParams, MaskSession};
use crate::io::RasterDirectory;
use crate::types::{Mask, MaskError, MaskResult, PixelData};

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(combine_masks, m)?)?;
    m.add_function(wrap_pyfunction!(mask_statistics, m)?)?;
    m.add_function(wrap_pyfunction!(apply_masks, m)?)?;
    Ok(())
}

fn to_py_err(err: MaskError) -> PyErr {
    match err.root() {
        MaskError::ShapeMismatch { .. } | MaskError::InvalidInput(_) | MaskError::Config(_) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", err))
        }
        MaskError::MissingFile(_) => {
            PyErr::new::<pyo3::exceptions::PyFileNotFoundError, _>(format!("{}", err))
        }
        MaskError::OverwriteDenied(_) => {
            PyErr::new::<pyo3::exceptions::PyFileExistsError, _>(format!("{}", err))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", err)),
    }
}

/// OR together a list of same-shape boolean arrays
#[pyfunction]
fn combine_masks<'py>(
    py: Python<'py>,
    masks: Vec<PyReadonlyArray2<'py, bool>>,
) -> PyResult<&'py PyArray2<bool>> {
    let owned: Vec<Mask> = masks.iter().map(|m| m.as_array().to_owned()).collect();
    let combined = combine::combine_masks(&owned).map_err(to_py_err)?;
    Ok(combined.into_pyarray(py))
}

/// (masked pixels, total pixels, fraction masked)
#[pyfunction]
fn mask_statistics(mask: PyReadonlyArray2<'_, bool>) -> (usize, usize, f64) {
    let stats = combine::mask_statistics(&mask.as_array().to_owned());
    (stats.masked_pixels, stats.total_pixels, stats.fraction())
}

/// Wraps a Python callable `(data, read_noise, sigclip, verbose) -> bool array`
struct PyCosmicRayDetector {
    callable: PyObject,
}

impl CosmicRayDetector for PyCosmicRayDetector {
    fn detect(&self, data: &PixelData, params: &CosmicRayParams) -> MaskResult<Mask> {
        Python::with_gil(|py| {
            let result = self
                .callable
                .call1(
                    py,
                    (
                        data.to_pyarray(py),
                        params.read_noise,
                        params.sigma_clip,
                        params.verbose,
                    ),
                )
                .map_err(|e| MaskError::Detection(format!("{}", e)))?;

            let mask: PyReadonlyArray2<bool> = result
                .extract(py)
                .map_err(|e| MaskError::Detection(format!("Detector must return a 2D bool array: {}", e)))?;
            Ok(mask.as_array().to_owned())
        })
    }
}

/// Mask every science frame in `directory` and rewrite it in place.
///
/// Returns `(file_name, masked_pixels, total_pixels)` per frame.
#[pyfunction]
#[pyo3(signature = (directory, detector, config_path=None, overwrite=false))]
fn apply_masks(
    directory: String,
    detector: PyObject,
    config_path: Option<String>,
    overwrite: bool,
) -> PyResult<Vec<(String, usize, usize)>> {
    let mut config = match config_path {
        Some(path) => MaskConfig::from_xml_file(path).map_err(to_py_err)?,
        None => MaskConfig::default(),
    };
    config.overwrite = config.overwrite || overwrite;

    let raster = RasterDirectory::new(&directory).map_err(to_py_err)?;
    let session = MaskSession::new(config, &raster).map_err(to_py_err)?;
    let detector = PyCosmicRayDetector { callable: detector };

    let report = session
        .apply(&raster, &detector, &raster)
        .map_err(to_py_err)?;

    Ok(report
        .images
        .into_iter()
        .map(|image| {
            (
                image.file_name,
                image.statistics.masked_pixels,
                image.statistics.total_pixels,
            )
        })
        .collect())
}
