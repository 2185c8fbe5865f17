pub mod dtype;
pub mod encoded;
pub mod scheme;
pub mod variable;

pub use dtype::{FloatWidth, TargetDtype};
pub use encoded::{EncodedArray, EncodedData, QuantizedVariable};
pub use scheme::{QuantizationScheme, RangeEstimate, ValidRange};
pub use variable::Variable;
