use crate::error::QuantizationError;
use crate::models::{QuantizationScheme, TargetDtype, ValidRange};

/// Scale used when every valid sample has the same value.
pub const DEGENERATE_SCALE: f64 = 1.0;

/// Derives the affine map that stretches `range` over the code range of
/// `dtype`.
///
/// With `reserve_missing` the dtype's sentinel is reserved for NaN samples
/// and removed from the code range; dtypes without a sentinel fail.
///
/// `min` always encodes to the lowest code and `max` to the highest. A
/// degenerate range uses [`DEGENERATE_SCALE`] with `offset = min`, so every
/// sample encodes to code 0 and decodes back to `min` exactly.
pub fn derive_scheme(
    range: ValidRange,
    dtype: TargetDtype,
    reserve_missing: bool,
) -> Result<QuantizationScheme, QuantizationError> {
    let ValidRange {
        valid_min: min,
        valid_max: max,
    } = range;

    if !min.is_finite() || !max.is_finite() || max < min {
        return Err(QuantizationError::InvalidRange { min, max });
    }

    let fill_value = if reserve_missing {
        Some(dtype.missing_sentinel().ok_or(
            QuantizationError::UnrepresentableMissingValue {
                dtype,
                missing: 0,
            },
        )?)
    } else {
        None
    };

    let code_min = match fill_value {
        Some(_) => dtype.int_min() + 1,
        None => dtype.int_min(),
    };
    let code_max = dtype.int_max();

    let scale = if range.is_degenerate() {
        DEGENERATE_SCALE
    } else {
        range.span() / (code_max - code_min) as f64
    };

    // A span near f64::MAX overflows; a subnormal span can round to zero.
    if !scale.is_finite() || scale <= 0.0 {
        return Err(QuantizationError::InvalidRange { min, max });
    }

    // Code 0 lies inside the code range of every dtype, sentinel or not.
    let offset = if range.is_degenerate() {
        min
    } else {
        min - code_min as f64 * scale
    };
    if !offset.is_finite() {
        return Err(QuantizationError::InvalidRange { min, max });
    }

    Ok(QuantizationScheme::new_unchecked(
        scale, offset, dtype, fill_value,
    ))
}
