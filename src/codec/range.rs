use crate::error::QuantizationError;
use crate::models::{RangeEstimate, ValidRange};

/// Min and max over the non-NaN samples of `values`.
pub fn estimate_range(values: &[f64]) -> Result<RangeEstimate, QuantizationError> {
    let mut bounds: Option<(f64, f64)> = None;
    let mut missing_count = 0;

    for &value in values {
        if value.is_nan() {
            missing_count += 1;
            continue;
        }
        bounds = Some(match bounds {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }

    let (valid_min, valid_max) = bounds.ok_or(QuantizationError::EmptyRange)?;

    Ok(RangeEstimate {
        range: ValidRange::new(valid_min, valid_max),
        valid_count: values.len() - missing_count,
        missing_count,
    })
}
