use arrow::array::{
    Array, ArrayRef, Int16Array, Int32Array, Int8Array, UInt16Array, UInt32Array, UInt8Array,
};
use std::sync::Arc;

use crate::error::QuantizationError;
use crate::models::variable::check_shape;
use crate::models::{FloatWidth, QuantizationScheme, TargetDtype, ValidRange};

/// Integer codes in their storage width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedData {
    U1(Vec<u8>),
    U2(Vec<u16>),
    U4(Vec<u32>),
    I1(Vec<i8>),
    I2(Vec<i16>),
    I4(Vec<i32>),
}

impl EncodedData {
    /// Narrows codes into `dtype` storage. Codes must already lie inside the
    /// dtype's limits.
    pub(crate) fn from_codes(dtype: TargetDtype, codes: &[i64]) -> Self {
        match dtype {
            TargetDtype::U1 => EncodedData::U1(codes.iter().map(|&c| c as u8).collect()),
            TargetDtype::U2 => EncodedData::U2(codes.iter().map(|&c| c as u16).collect()),
            TargetDtype::U4 => EncodedData::U4(codes.iter().map(|&c| c as u32).collect()),
            TargetDtype::I1 => EncodedData::I1(codes.iter().map(|&c| c as i8).collect()),
            TargetDtype::I2 => EncodedData::I2(codes.iter().map(|&c| c as i16).collect()),
            TargetDtype::I4 => EncodedData::I4(codes.iter().map(|&c| c as i32).collect()),
        }
    }

    pub fn dtype(&self) -> TargetDtype {
        match self {
            EncodedData::U1(_) => TargetDtype::U1,
            EncodedData::U2(_) => TargetDtype::U2,
            EncodedData::U4(_) => TargetDtype::U4,
            EncodedData::I1(_) => TargetDtype::I1,
            EncodedData::I2(_) => TargetDtype::I2,
            EncodedData::I4(_) => TargetDtype::I4,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EncodedData::U1(v) => v.len(),
            EncodedData::U2(v) => v.len(),
            EncodedData::U4(v) => v.len(),
            EncodedData::I1(v) => v.len(),
            EncodedData::I2(v) => v.len(),
            EncodedData::I4(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widened codes in storage order.
    pub fn codes(&self) -> Vec<i64> {
        match self {
            EncodedData::U1(v) => v.iter().map(|&c| i64::from(c)).collect(),
            EncodedData::U2(v) => v.iter().map(|&c| i64::from(c)).collect(),
            EncodedData::U4(v) => v.iter().map(|&c| i64::from(c)).collect(),
            EncodedData::I1(v) => v.iter().map(|&c| i64::from(c)).collect(),
            EncodedData::I2(v) => v.iter().map(|&c| i64::from(c)).collect(),
            EncodedData::I4(v) => v.iter().map(|&c| i64::from(c)).collect(),
        }
    }

    /// Arrow array over the codes in `start..end`.
    pub fn slice_to_arrow(&self, start: usize, end: usize) -> ArrayRef {
        match self {
            EncodedData::U1(v) => Arc::new(UInt8Array::from(v[start..end].to_vec())),
            EncodedData::U2(v) => Arc::new(UInt16Array::from(v[start..end].to_vec())),
            EncodedData::U4(v) => Arc::new(UInt32Array::from(v[start..end].to_vec())),
            EncodedData::I1(v) => Arc::new(Int8Array::from(v[start..end].to_vec())),
            EncodedData::I2(v) => Arc::new(Int16Array::from(v[start..end].to_vec())),
            EncodedData::I4(v) => Arc::new(Int32Array::from(v[start..end].to_vec())),
        }
    }

    /// Appends the values of an Arrow integer column. Nulls are rejected;
    /// encoded stores mark missing samples with a sentinel code instead.
    pub fn extend_from_arrow(&mut self, array: &dyn Array) -> Result<(), QuantizationError> {
        let actual = TargetDtype::from_arrow(array.data_type())?;
        if actual != self.dtype() {
            return Err(QuantizationError::SchemeMismatch {
                expected: self.dtype(),
                actual,
            });
        }
        if array.null_count() > 0 {
            return Err(QuantizationError::UnrepresentableMissingValue {
                dtype: actual,
                missing: array.null_count(),
            });
        }

        macro_rules! extend {
            ($vec:expr, $array_type:ty) => {{
                let typed = array
                    .as_any()
                    .downcast_ref::<$array_type>()
                    .ok_or_else(|| QuantizationError::UnsupportedDtype(array.data_type().to_string()))?;
                $vec.extend_from_slice(typed.values());
            }};
        }

        match self {
            EncodedData::U1(v) => extend!(v, UInt8Array),
            EncodedData::U2(v) => extend!(v, UInt16Array),
            EncodedData::U4(v) => extend!(v, UInt32Array),
            EncodedData::I1(v) => extend!(v, Int8Array),
            EncodedData::I2(v) => extend!(v, Int16Array),
            EncodedData::I4(v) => extend!(v, Int32Array),
        }
        Ok(())
    }

    pub fn empty(dtype: TargetDtype) -> Self {
        Self::from_codes(dtype, &[])
    }
}

/// Integer array with the shape of its source variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArray {
    shape: Vec<usize>,
    data: EncodedData,
}

impl EncodedArray {
    pub fn new(shape: Vec<usize>, data: EncodedData) -> Result<Self, QuantizationError> {
        check_shape(&shape, data.len())?;
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &EncodedData {
        &self.data
    }

    pub fn dtype(&self) -> TargetDtype {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn codes(&self) -> Vec<i64> {
        self.data.codes()
    }
}

/// An encoded variable together with everything needed to decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedVariable {
    pub name: String,
    pub encoded: EncodedArray,
    pub scheme: QuantizationScheme,
    pub valid_range: ValidRange,
    pub source_width: FloatWidth,
}

impl QuantizedVariable {
    pub fn dtype(&self) -> TargetDtype {
        self.encoded.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        self.encoded.shape()
    }
}
