pub mod cli;
pub mod codec;
pub mod error;
pub mod models;
pub mod processors;
pub mod readers;
pub mod utils;
pub mod writers;

pub use error::{EntryFailure, ProcessingError, QuantizationError, Result};
