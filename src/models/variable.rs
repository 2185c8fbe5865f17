use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::QuantizationError;
use crate::models::FloatWidth;

/// A named n-dimensional float array. Missing samples are stored as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Variable {
    #[validate(length(min = 1))]
    pub name: String,

    pub shape: Vec<usize>,

    pub data: Vec<f64>,

    #[serde(default)]
    pub source_width: FloatWidth,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        shape: Vec<usize>,
        data: Vec<f64>,
    ) -> Result<Self, QuantizationError> {
        check_shape(&shape, data.len())?;
        Ok(Self {
            name: name.into(),
            shape,
            data,
            source_width: FloatWidth::F8,
        })
    }

    /// One-dimensional variable spanning all of `data`.
    pub fn from_vec(name: impl Into<String>, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            shape: vec![data.len()],
            data,
            source_width: FloatWidth::F8,
        }
    }

    pub fn with_source_width(mut self, width: FloatWidth) -> Self {
        self.source_width = width;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }
}

pub(crate) fn check_shape(shape: &[usize], actual: usize) -> Result<(), QuantizationError> {
    let expected: usize = shape.iter().product();
    if expected != actual {
        return Err(QuantizationError::ShapeMismatch {
            shape: shape.to_vec(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_validation() {
        assert!(Variable::new("u10", vec![2, 3], vec![0.0; 6]).is_ok());

        let err = Variable::new("u10", vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            QuantizationError::ShapeMismatch {
                shape: vec![2, 3],
                expected: 6,
                actual: 5,
            }
        );
    }

    #[test]
    fn test_missing_samples_are_counted() {
        let var = Variable::from_vec("t2m", vec![1.0, f64::NAN, 3.0]);

        assert_eq!(var.missing_count(), 1);
    }

    #[test]
    fn test_empty_name_fails_validation() {
        let var = Variable::from_vec("", vec![1.0]);
        assert!(var.validate().is_err());
    }
}
