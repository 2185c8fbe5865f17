use chrono::{Datelike, Local};
use std::path::{Path, PathBuf};

use crate::utils::constants::DEFAULT_OUTPUT_DIR;

/// Default store path: output/{input-stem}-quantized-{YYMMDD}
pub fn generate_default_store_path(input: &Path) -> PathBuf {
    store_path_with_suffix(input, "quantized")
}

/// Default decoded store path: output/{input-stem}-decoded-{YYMMDD}
pub fn generate_default_decoded_path(input: &Path) -> PathBuf {
    store_path_with_suffix(input, "decoded")
}

fn store_path_with_suffix(input: &Path, suffix: &str) -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("dataset");

    let name = format!(
        "{}-{}-{:02}{:02}{:02}",
        stem,
        suffix,
        year,
        now.month(),
        now.day()
    );
    PathBuf::from(DEFAULT_OUTPUT_DIR).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_store_path() {
        let path = generate_default_store_path(Path::new("data/era5_wind.parquet"));
        let path_str = path.to_string_lossy();

        assert!(path_str.starts_with("output/"));
        let parts: Vec<&str> = path_str.split('/').collect();
        assert_eq!(parts.len(), 2);

        let dir = parts[1];
        assert!(dir.starts_with("era5_wind-quantized-"));
        let date = dir.trim_start_matches("era5_wind-quantized-");
        assert_eq!(date.len(), 6);
        assert!(date.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_default_decoded_path() {
        let path = generate_default_decoded_path(Path::new("stores/wind-quantized-260101"));
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("wind-quantized-260101-decoded-"));
    }

    #[test]
    fn test_missing_stem_falls_back() {
        let path = generate_default_store_path(Path::new("/"));
        assert!(path.to_string_lossy().contains("dataset-quantized-"));
    }
}
