use crate::error::Result;
use crate::models::TargetDtype;
use crate::utils::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_COMPRESSION, DEFAULT_ROW_GROUP_SIZE, DEFAULT_TARGET_DTYPE,
    SETTINGS_ENV_PREFIX,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::{Validate, ValidationError};

/// Run settings resolved from defaults, an optional settings file and
/// `GRID_QUANTIZER_*` environment variables. CLI flags override these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(custom(function = "validate_dtype"))]
    pub dtype: String,

    #[validate(range(min = 1))]
    pub max_workers: usize,

    #[validate(range(min = 1))]
    pub chunk_size: usize,

    #[validate(range(min = 1))]
    pub row_group_size: usize,

    pub compression: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dtype: DEFAULT_TARGET_DTYPE.to_string(),
            max_workers: num_cpus::get(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            compression: DEFAULT_COMPRESSION.to_string(),
        }
    }
}

impl Settings {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::load_from(
            config_file,
            config::Environment::with_prefix(SETTINGS_ENV_PREFIX),
        )
    }

    /// Layers defaults, `config_file` and `environment`, later sources
    /// winning.
    pub fn load_from(
        config_file: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self> {
        let defaults = Settings::default();
        let mut builder = config::Config::builder()
            .set_default("dtype", defaults.dtype)?
            .set_default("max_workers", defaults.max_workers as u64)?
            .set_default("chunk_size", defaults.chunk_size as u64)?
            .set_default("row_group_size", defaults.row_group_size as u64)?
            .set_default("compression", defaults.compression)?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn target_dtype(&self) -> Result<TargetDtype> {
        Ok(self.dtype.parse::<TargetDtype>()?)
    }
}

fn validate_dtype(dtype: &str) -> std::result::Result<(), ValidationError> {
    dtype
        .parse::<TargetDtype>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("unsupported_dtype"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn settings_file(contents: &str) -> std::io::Result<NamedTempFile> {
        let mut file = Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "{}", contents)?;
        Ok(file)
    }

    /// An environment layer over a fixed variable map instead of the process
    /// environment.
    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let vars: config::Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        config::Environment::with_prefix(SETTINGS_ENV_PREFIX).source(Some(vars))
    }

    #[test]
    fn test_defaults_without_sources() -> Result<()> {
        let settings = Settings::load_from(None, environment(&[]))?;
        assert_eq!(settings.dtype, "u1");
        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.target_dtype()?, TargetDtype::U1);
        Ok(())
    }

    #[test]
    fn test_file_then_environment() -> Result<()> {
        let file = settings_file("dtype = \"i2\"\nchunk_size = 512\ncompression = \"zstd\"")?;

        let env = environment(&[
            ("GRID_QUANTIZER_CHUNK_SIZE", "2048"),
            ("UNRELATED_CHUNK_SIZE", "7"),
        ]);
        let settings = Settings::load_from(Some(file.path()), env)?;

        assert_eq!(settings.target_dtype()?, TargetDtype::I2);
        assert_eq!(settings.compression, "zstd");
        assert_eq!(settings.chunk_size, 2048);
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_rejected() -> Result<()> {
        let file = settings_file("dtype = \"f4\"\nmax_workers = 0")?;

        let result = Settings::load_from(Some(file.path()), environment(&[]));
        match result {
            Err(ProcessingError::Validation(errors)) => {
                let fields = errors.field_errors();
                assert!(fields.contains_key("dtype"));
                assert!(fields.contains_key("max_workers"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = Settings::load_from(
            Some(Path::new("/nonexistent/grid-quantizer.toml")),
            environment(&[]),
        );
        assert!(matches!(result, Err(ProcessingError::Settings(_))));
    }
}
