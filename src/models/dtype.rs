use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QuantizationError;

/// Integer storage type of an encoded variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetDtype {
    U1,
    U2,
    U4,
    I1,
    I2,
    I4,
}

impl TargetDtype {
    pub const ALL: [TargetDtype; 6] = [
        TargetDtype::U1,
        TargetDtype::U2,
        TargetDtype::U4,
        TargetDtype::I1,
        TargetDtype::I2,
        TargetDtype::I4,
    ];

    pub fn from_width(width_bits: u32, signed: bool) -> Result<Self, QuantizationError> {
        match (width_bits, signed) {
            (8, false) => Ok(TargetDtype::U1),
            (16, false) => Ok(TargetDtype::U2),
            (32, false) => Ok(TargetDtype::U4),
            (8, true) => Ok(TargetDtype::I1),
            (16, true) => Ok(TargetDtype::I2),
            (32, true) => Ok(TargetDtype::I4),
            _ => Err(QuantizationError::UnsupportedDtype(format!(
                "{}-bit {}",
                width_bits,
                if signed { "signed" } else { "unsigned" }
            ))),
        }
    }

    pub fn width_bits(&self) -> u32 {
        match self {
            TargetDtype::U1 | TargetDtype::I1 => 8,
            TargetDtype::U2 | TargetDtype::I2 => 16,
            TargetDtype::U4 | TargetDtype::I4 => 32,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, TargetDtype::I1 | TargetDtype::I2 | TargetDtype::I4)
    }

    pub fn int_min(&self) -> i64 {
        if self.is_signed() {
            -(1i64 << (self.width_bits() - 1))
        } else {
            0
        }
    }

    pub fn int_max(&self) -> i64 {
        if self.is_signed() {
            (1i64 << (self.width_bits() - 1)) - 1
        } else {
            (1i64 << self.width_bits()) - 1
        }
    }

    /// Code reserved for missing samples. Signed types give up their most
    /// negative value; unsigned types have none.
    pub fn missing_sentinel(&self) -> Option<i64> {
        self.is_signed().then(|| self.int_min())
    }

    pub fn code(&self) -> &'static str {
        match self {
            TargetDtype::U1 => "u1",
            TargetDtype::U2 => "u2",
            TargetDtype::U4 => "u4",
            TargetDtype::I1 => "i1",
            TargetDtype::I2 => "i2",
            TargetDtype::I4 => "i4",
        }
    }

    pub fn arrow_type(&self) -> DataType {
        match self {
            TargetDtype::U1 => DataType::UInt8,
            TargetDtype::U2 => DataType::UInt16,
            TargetDtype::U4 => DataType::UInt32,
            TargetDtype::I1 => DataType::Int8,
            TargetDtype::I2 => DataType::Int16,
            TargetDtype::I4 => DataType::Int32,
        }
    }

    pub fn from_arrow(data_type: &DataType) -> Result<Self, QuantizationError> {
        match data_type {
            DataType::UInt8 => Ok(TargetDtype::U1),
            DataType::UInt16 => Ok(TargetDtype::U2),
            DataType::UInt32 => Ok(TargetDtype::U4),
            DataType::Int8 => Ok(TargetDtype::I1),
            DataType::Int16 => Ok(TargetDtype::I2),
            DataType::Int32 => Ok(TargetDtype::I4),
            other => Err(QuantizationError::UnsupportedDtype(other.to_string())),
        }
    }
}

impl FromStr for TargetDtype {
    type Err = QuantizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "u1" | "uint8" => Ok(TargetDtype::U1),
            "u2" | "uint16" => Ok(TargetDtype::U2),
            "u4" | "uint32" => Ok(TargetDtype::U4),
            "i1" | "int8" => Ok(TargetDtype::I1),
            "i2" | "int16" => Ok(TargetDtype::I2),
            "i4" | "int32" => Ok(TargetDtype::I4),
            _ => Err(QuantizationError::UnsupportedDtype(s.to_string())),
        }
    }
}

impl TryFrom<String> for TargetDtype {
    type Error = QuantizationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetDtype> for String {
    fn from(dtype: TargetDtype) -> Self {
        dtype.code().to_string()
    }
}

impl fmt::Display for TargetDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Float width of a source variable, restored on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FloatWidth {
    #[serde(rename = "f4")]
    F4,
    #[default]
    #[serde(rename = "f8")]
    F8,
}

impl FloatWidth {
    pub fn code(&self) -> &'static str {
        match self {
            FloatWidth::F4 => "f4",
            FloatWidth::F8 => "f8",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "f4" | "float32" => Some(FloatWidth::F4),
            "f8" | "float64" => Some(FloatWidth::F8),
            _ => None,
        }
    }

    pub fn arrow_type(&self) -> DataType {
        match self {
            FloatWidth::F4 => DataType::Float32,
            FloatWidth::F8 => DataType::Float64,
        }
    }
}
