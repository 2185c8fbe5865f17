use crate::error::QuantizationError;
use crate::models::{EncodedArray, QuantizationScheme};

pub fn decode_value(code: i64, scheme: &QuantizationScheme) -> f64 {
    if scheme.fill_value() == Some(code) {
        return f64::NAN;
    }
    code as f64 * scheme.scale() + scheme.offset()
}

/// Recovers approximate floats from `encoded`. Sentinel codes decode to NaN.
pub fn decode(
    encoded: &EncodedArray,
    scheme: &QuantizationScheme,
) -> Result<Vec<f64>, QuantizationError> {
    if encoded.dtype() != scheme.dtype() {
        return Err(QuantizationError::SchemeMismatch {
            expected: scheme.dtype(),
            actual: encoded.dtype(),
        });
    }

    Ok(encoded
        .codes()
        .into_iter()
        .map(|code| decode_value(code, scheme))
        .collect())
}
