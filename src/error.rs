use crate::models::TargetDtype;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Failures of the quantization core. Always raised for a single variable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantizationError {
    #[error("no valid samples: every element is missing")]
    EmptyRange,

    #[error("invalid range [{min}, {max}]: bounds must be finite with min <= max")]
    InvalidRange { min: f64, max: f64 },

    #[error("unsupported target dtype: {0}")]
    UnsupportedDtype(String),

    #[error("{missing} missing sample(s) cannot be represented: dtype {dtype} reserves no sentinel")]
    UnrepresentableMissingValue { dtype: TargetDtype, missing: usize },

    #[error("scheme declares dtype {expected} but the array is stored as {actual}")]
    SchemeMismatch {
        expected: TargetDtype,
        actual: TargetDtype,
    },

    #[error("shape {shape:?} holds {expected} elements but {actual} were supplied")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Quantization error: {0}")]
    Quantization(#[from] QuantizationError),

    #[error("Variable '{name}': {source}")]
    Variable {
        name: String,
        #[source]
        source: QuantizationError,
    },

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid variable name: '{0}'")]
    InvalidVariableName(String),

    #[error("Missing attribute '{attribute}' on variable '{variable}'")]
    MissingAttribute { variable: String, attribute: String },

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("{failed} of {total} variables failed")]
    PartialFailure { failed: usize, total: usize },

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// A variable or store entry that failed while the rest of its pass went on.
#[derive(Debug)]
pub struct EntryFailure {
    pub name: String,
    pub error: ProcessingError,
}

impl ProcessingError {
    pub fn variable(name: &str, source: QuantizationError) -> Self {
        ProcessingError::Variable {
            name: name.to_string(),
            source,
        }
    }
}
