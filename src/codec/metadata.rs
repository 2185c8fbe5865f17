use serde::Serialize;
use std::collections::HashMap;

use crate::error::{ProcessingError, Result};
use crate::models::{QuantizationScheme, TargetDtype, ValidRange};
use crate::utils::constants::{
    ATTR_ADD_OFFSET, ATTR_DTYPE, ATTR_FILL_VALUE, ATTR_SCALE_FACTOR, ATTR_VALID_MAX,
    ATTR_VALID_MIN,
};

/// Decode attributes persisted alongside an encoded variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantizationAttributes {
    pub scale_factor: f64,
    pub add_offset: f64,
    pub valid_min: f64,
    pub valid_max: f64,
    pub dtype: TargetDtype,
    #[serde(rename = "_FillValue", skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<i64>,
}

impl QuantizationAttributes {
    pub fn new(scheme: &QuantizationScheme, valid_range: ValidRange) -> Self {
        Self {
            scale_factor: scheme.scale(),
            add_offset: scheme.offset(),
            valid_min: valid_range.valid_min,
            valid_max: valid_range.valid_max,
            dtype: scheme.dtype(),
            fill_value: scheme.fill_value(),
        }
    }

    pub fn scheme(&self) -> Result<QuantizationScheme> {
        Ok(QuantizationScheme::from_parts(
            self.scale_factor,
            self.add_offset,
            self.dtype,
            self.fill_value,
        )?)
    }

    pub fn valid_range(&self) -> ValidRange {
        ValidRange::new(self.valid_min, self.valid_max)
    }

    /// Writes the attributes into `metadata`. Floats use the shortest decimal
    /// that parses back to the same bits.
    pub fn write_to(&self, metadata: &mut HashMap<String, String>) {
        metadata.insert(ATTR_SCALE_FACTOR.to_string(), self.scale_factor.to_string());
        metadata.insert(ATTR_ADD_OFFSET.to_string(), self.add_offset.to_string());
        metadata.insert(ATTR_VALID_MIN.to_string(), self.valid_min.to_string());
        metadata.insert(ATTR_VALID_MAX.to_string(), self.valid_max.to_string());
        metadata.insert(ATTR_DTYPE.to_string(), self.dtype.code().to_string());
        if let Some(fill) = self.fill_value {
            metadata.insert(ATTR_FILL_VALUE.to_string(), fill.to_string());
        }
    }

    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        self.write_to(&mut metadata);
        metadata
    }

    pub fn from_metadata(variable: &str, metadata: &HashMap<String, String>) -> Result<Self> {
        let fill_value = match metadata.get(ATTR_FILL_VALUE) {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                ProcessingError::InvalidFormat(format!(
                    "'{}' on variable '{}' is not an integer: '{}'",
                    ATTR_FILL_VALUE, variable, raw
                ))
            })?),
            None => None,
        };

        let dtype = required(variable, metadata, ATTR_DTYPE)?
            .parse::<TargetDtype>()
            .map_err(|e| ProcessingError::variable(variable, e))?;

        Ok(Self {
            scale_factor: parse_float(variable, metadata, ATTR_SCALE_FACTOR)?,
            add_offset: parse_float(variable, metadata, ATTR_ADD_OFFSET)?,
            valid_min: parse_float(variable, metadata, ATTR_VALID_MIN)?,
            valid_max: parse_float(variable, metadata, ATTR_VALID_MAX)?,
            dtype,
            fill_value,
        })
    }
}

fn required<'a>(
    variable: &str,
    metadata: &'a HashMap<String, String>,
    attribute: &str,
) -> Result<&'a str> {
    metadata
        .get(attribute)
        .map(String::as_str)
        .ok_or_else(|| ProcessingError::MissingAttribute {
            variable: variable.to_string(),
            attribute: attribute.to_string(),
        })
}

fn parse_float(variable: &str, metadata: &HashMap<String, String>, attribute: &str) -> Result<f64> {
    let raw = required(variable, metadata, attribute)?;
    raw.trim().parse::<f64>().map_err(|_| {
        ProcessingError::InvalidFormat(format!(
            "'{}' on variable '{}' is not a number: '{}'",
            attribute, variable, raw
        ))
    })
}
