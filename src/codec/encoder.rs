use crate::error::QuantizationError;
use crate::models::{EncodedArray, EncodedData, QuantizationScheme};

/// Code for one sample: round half to even, then clip to the code range.
/// NaN maps to the scheme's sentinel.
pub fn encode_value(value: f64, scheme: &QuantizationScheme) -> Result<i64, QuantizationError> {
    if value.is_nan() {
        return scheme
            .fill_value()
            .ok_or(QuantizationError::UnrepresentableMissingValue {
                dtype: scheme.dtype(),
                missing: 1,
            });
    }

    let code = ((value - scheme.offset()) / scheme.scale()).round_ties_even();
    let clipped = code.clamp(scheme.code_min() as f64, scheme.code_max() as f64);

    Ok(clipped as i64)
}

/// Encodes `values` (row-major, `shape`) into a new integer array.
///
/// Every missing sample is counted before any code is produced, so a scheme
/// without a sentinel fails up front instead of leaving a partial array.
pub fn encode(
    values: &[f64],
    shape: &[usize],
    scheme: &QuantizationScheme,
) -> Result<EncodedArray, QuantizationError> {
    if !scheme.supports_missing() {
        let missing = values.iter().filter(|v| v.is_nan()).count();
        if missing > 0 {
            return Err(QuantizationError::UnrepresentableMissingValue {
                dtype: scheme.dtype(),
                missing,
            });
        }
    }

    let codes = values
        .iter()
        .map(|&value| encode_value(value, scheme))
        .collect::<Result<Vec<i64>, _>>()?;

    EncodedArray::new(
        shape.to_vec(),
        EncodedData::from_codes(scheme.dtype(), &codes),
    )
}
