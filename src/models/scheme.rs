use serde::{Deserialize, Serialize};

use crate::error::QuantizationError;
use crate::models::TargetDtype;

/// Observed float bounds of a variable before quantization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidRange {
    pub valid_min: f64,
    pub valid_max: f64,
}

impl ValidRange {
    pub fn new(valid_min: f64, valid_max: f64) -> Self {
        Self {
            valid_min,
            valid_max,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.valid_min == self.valid_max
    }

    pub fn span(&self) -> f64 {
        self.valid_max - self.valid_min
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.valid_min..=self.valid_max).contains(&value)
    }
}

/// Result of scanning a float array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeEstimate {
    pub range: ValidRange,
    pub valid_count: usize,
    pub missing_count: usize,
}

impl RangeEstimate {
    pub fn has_missing(&self) -> bool {
        self.missing_count > 0
    }
}

/// Affine map between a float variable and its integer codes:
/// `value = code * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantizationScheme {
    scale: f64,
    offset: f64,
    dtype: TargetDtype,
    fill_value: Option<i64>,
}

impl QuantizationScheme {
    /// Rebuilds a scheme from persisted parameters.
    pub fn from_parts(
        scale: f64,
        offset: f64,
        dtype: TargetDtype,
        fill_value: Option<i64>,
    ) -> Result<Self, QuantizationError> {
        if !(scale.is_finite() && scale > 0.0) || !offset.is_finite() {
            return Err(QuantizationError::InvalidRange {
                min: offset,
                max: offset + scale,
            });
        }
        if let Some(fill) = fill_value {
            if fill < dtype.int_min() || fill > dtype.int_max() {
                return Err(QuantizationError::UnsupportedDtype(format!(
                    "fill value {} outside {} range",
                    fill, dtype
                )));
            }
        }
        Ok(Self {
            scale,
            offset,
            dtype,
            fill_value,
        })
    }

    pub(crate) fn new_unchecked(
        scale: f64,
        offset: f64,
        dtype: TargetDtype,
        fill_value: Option<i64>,
    ) -> Self {
        Self {
            scale,
            offset,
            dtype,
            fill_value,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn dtype(&self) -> TargetDtype {
        self.dtype
    }

    pub fn fill_value(&self) -> Option<i64> {
        self.fill_value
    }

    pub fn supports_missing(&self) -> bool {
        self.fill_value.is_some()
    }

    /// Lowest code a valid sample can take.
    pub fn code_min(&self) -> i64 {
        match self.fill_value {
            Some(fill) if fill == self.dtype.int_min() => fill + 1,
            _ => self.dtype.int_min(),
        }
    }

    pub fn code_max(&self) -> i64 {
        match self.fill_value {
            Some(fill) if fill == self.dtype.int_max() => fill - 1,
            _ => self.dtype.int_max(),
        }
    }

    /// Largest round-trip error for an in-range sample.
    pub fn max_error(&self) -> f64 {
        self.scale / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_rejects_bad_scale() {
        assert!(QuantizationScheme::from_parts(0.0, 1.0, TargetDtype::U1, None).is_err());
        assert!(QuantizationScheme::from_parts(-1.0, 1.0, TargetDtype::U1, None).is_err());
        assert!(QuantizationScheme::from_parts(f64::NAN, 1.0, TargetDtype::U1, None).is_err());
        assert!(QuantizationScheme::from_parts(0.5, f64::INFINITY, TargetDtype::U1, None).is_err());
        assert!(QuantizationScheme::from_parts(0.5, 1.0, TargetDtype::I1, Some(-200)).is_err());
    }

    #[test]
    fn test_code_range_with_sentinel() {
        let plain = QuantizationScheme::from_parts(1.0, 0.0, TargetDtype::I1, None).unwrap();
        assert_eq!((plain.code_min(), plain.code_max()), (-128, 127));

        let reserved =
            QuantizationScheme::from_parts(1.0, 0.0, TargetDtype::I1, Some(-128)).unwrap();
        assert_eq!((reserved.code_min(), reserved.code_max()), (-127, 127));
        assert!(reserved.supports_missing());
    }

    #[test]
    fn test_valid_range_helpers() {
        let range = ValidRange::new(-2.0, 6.0);
        assert_eq!(range.span(), 8.0);
        assert!(range.contains(0.0));
        assert!(!range.contains(6.5));
        assert!(!range.is_degenerate());
        assert!(ValidRange::new(5.0, 5.0).is_degenerate());
    }
}
