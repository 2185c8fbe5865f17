pub mod constants;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use filename::{generate_default_decoded_path, generate_default_store_path};
pub use progress::ProgressReporter;
