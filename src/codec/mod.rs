//! Scale/offset quantization of float arrays into fixed-width integers.
//!
//! Encoding runs three stages: [`estimate_range`] scans the samples,
//! [`derive_scheme`] fits `(scale, offset)` to the observed range, and
//! [`encode`] maps each sample to `round((x - offset) / scale)`, clipped to
//! the code range. [`decode`] needs only the scheme:
//! `x ≈ code * scale + offset`.

pub mod calculator;
pub mod decoder;
pub mod encoder;
pub mod metadata;
pub mod range;

pub use calculator::{derive_scheme, DEGENERATE_SCALE};
pub use decoder::{decode, decode_value};
pub use encoder::{encode, encode_value};
pub use metadata::QuantizationAttributes;
pub use range::estimate_range;

use crate::error::QuantizationError;
use crate::models::{QuantizedVariable, TargetDtype, Variable};

/// Runs the full encode pipeline for one variable. A sentinel is reserved
/// only when the variable actually has missing samples.
pub fn quantize_variable(
    variable: &Variable,
    dtype: TargetDtype,
) -> Result<QuantizedVariable, QuantizationError> {
    let estimate = estimate_range(&variable.data)?;
    if estimate.has_missing() && dtype.missing_sentinel().is_none() {
        return Err(QuantizationError::UnrepresentableMissingValue {
            dtype,
            missing: estimate.missing_count,
        });
    }

    let scheme = derive_scheme(estimate.range, dtype, estimate.has_missing())?;
    let encoded = encode(&variable.data, &variable.shape, &scheme)?;

    Ok(QuantizedVariable {
        name: variable.name.clone(),
        encoded,
        scheme,
        valid_range: estimate.range,
        source_width: variable.source_width,
    })
}
