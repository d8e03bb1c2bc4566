use crate::types::{Mask, MaskError, MaskResult, MaskStatistics};
use ndarray::{Array2, Zip};
use num_traits::Zero;

/// Combine masks by element-wise logical OR.
///
/// All masks must share one shape. A single mask comes back as a copy; an
/// empty sequence is rejected rather than producing an all-false mask.
pub fn combine_masks<'a, I>(masks: I) -> MaskResult<Mask>
where
    I: IntoIterator<Item = &'a Mask>,
{
    let mut masks = masks.into_iter();
    let first = masks
        .next()
        .ok_or_else(|| MaskError::InvalidInput("No masks provided".to_string()))?;

    let mut combined = first.clone();
    let mut count = 1;
    for mask in masks {
        check_shape(first.dim(), mask.dim())?;
        or_assign(&mut combined, mask);
        count += 1;
    }

    log::debug!(
        "Combined {} masks of shape {:?}",
        count,
        combined.dim()
    );
    Ok(combined)
}

/// OR a freshly computed mask into the image's existing mask, if it has one
pub fn merge_existing(existing: Option<&Mask>, computed: Mask) -> MaskResult<Mask> {
    match existing {
        Some(existing) => {
            check_shape(existing.dim(), computed.dim())?;
            let mut merged = computed;
            or_assign(&mut merged, existing);
            Ok(merged)
        }
        None => Ok(computed),
    }
}

/// Convert a numeric grid into a mask, nonzero values become `true`
pub fn mask_from_numeric<T>(values: &Array2<T>) -> Mask
where
    T: Zero + Copy,
{
    values.mapv(|v| !v.is_zero())
}

/// Numeric 0/1 form of a mask, for writers that only store numbers
pub fn mask_to_numeric(mask: &Mask) -> Array2<f32> {
    mask.mapv(|v| if v { 1.0 } else { 0.0 })
}

/// Count flagged pixels
pub fn mask_statistics(mask: &Mask) -> MaskStatistics {
    MaskStatistics {
        total_pixels: mask.len(),
        masked_pixels: count_masked(mask),
    }
}

pub(crate) fn check_shape(expected: (usize, usize), found: (usize, usize)) -> MaskResult<()> {
    if expected != found {
        return Err(MaskError::ShapeMismatch { expected, found });
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn or_assign(target: &mut Mask, other: &Mask) {
    Zip::from(target)
        .and(other)
        .par_for_each(|t, &o| *t |= o);
}

#[cfg(not(feature = "parallel"))]
fn or_assign(target: &mut Mask, other: &Mask) {
    Zip::from(target).and(other).for_each(|t, &o| *t |= o);
}

#[cfg(feature = "parallel")]
fn count_masked(mask: &Mask) -> usize {
    use rayon::prelude::*;

    match mask.as_slice_memory_order() {
        Some(pixels) => pixels.par_iter().filter(|&&v| v).count(),
        None => mask.iter().filter(|&&v| v).count(),
    }
}

#[cfg(not(feature = "parallel"))]
fn count_masked(mask: &Mask) -> usize {
    mask.iter().filter(|&&v| v).count()
}
