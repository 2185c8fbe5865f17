use crate::codec::QuantizationAttributes;
use crate::error::{ProcessingError, Result};
use crate::models::{QuantizedVariable, Variable};
use crate::utils::constants::{
    ATTR_SHAPE, ATTR_SOURCE_DTYPE, ATTR_VARIABLE, COMPRESSION_GZIP, COMPRESSION_LZ4,
    COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD, DEFAULT_CHUNK_SIZE,
    DEFAULT_ROW_GROUP_SIZE, STORE_FILE_EXTENSION,
};
use arrow::array::{ArrayRef, Float32Array, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Writes variables into an array store: one Parquet file per variable,
/// attributes on both the field and the file schema.
#[derive(Debug, Clone)]
pub struct StoreWriter {
    compression: Compression,
    row_group_size: usize,
    chunk_size: usize,
}

impl StoreWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Path of `name` inside `store`. Names that could escape the store
    /// directory are rejected.
    pub fn variable_path(store: &Path, name: &str) -> Result<PathBuf> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(&['/', '\\', '\0'][..]);
        if invalid {
            return Err(ProcessingError::InvalidVariableName(name.to_string()));
        }
        Ok(store.join(format!("{}.{}", name, STORE_FILE_EXTENSION)))
    }

    /// Persists an encoded variable with its decode attributes.
    pub fn write_quantized(&self, store: &Path, variable: &QuantizedVariable) -> Result<PathBuf> {
        let mut metadata =
            QuantizationAttributes::new(&variable.scheme, variable.valid_range).to_metadata();
        metadata.insert(ATTR_SHAPE.to_string(), serde_json::to_string(variable.shape())?);
        metadata.insert(
            ATTR_SOURCE_DTYPE.to_string(),
            variable.source_width.code().to_string(),
        );

        let data = variable.encoded.data();
        let path = Self::variable_path(store, &variable.name)?;
        self.write_column(
            &path,
            &variable.name,
            variable.dtype().arrow_type(),
            metadata,
            data.len(),
            |start, end| data.slice_to_arrow(start, end),
        )?;

        debug!(
            variable = %variable.name,
            dtype = %variable.dtype(),
            path = %path.display(),
            "wrote encoded variable"
        );
        Ok(path)
    }

    /// Persists a float variable at its source width.
    pub fn write_variable(&self, store: &Path, variable: &Variable) -> Result<PathBuf> {
        let mut metadata = HashMap::new();
        metadata.insert(ATTR_SHAPE.to_string(), serde_json::to_string(&variable.shape)?);
        metadata.insert(
            ATTR_SOURCE_DTYPE.to_string(),
            variable.source_width.code().to_string(),
        );

        let data_type = variable.source_width.arrow_type();
        let values = &variable.data;
        let path = Self::variable_path(store, &variable.name)?;
        self.write_column(
            &path,
            &variable.name,
            data_type.clone(),
            metadata,
            values.len(),
            |start, end| match data_type {
                DataType::Float32 => Arc::new(Float32Array::from(
                    values[start..end].iter().map(|&v| v as f32).collect::<Vec<f32>>(),
                )) as ArrayRef,
                _ => Arc::new(Float64Array::from(values[start..end].to_vec())) as ArrayRef,
            },
        )?;

        debug!(
            variable = %variable.name,
            path = %path.display(),
            "wrote float variable"
        );
        Ok(path)
    }

    /// Writes one column in batches of `chunk_size` rows. The file only
    /// appears under its final name once the writer has closed cleanly.
    fn write_column<F>(
        &self,
        path: &Path,
        name: &str,
        data_type: DataType,
        mut metadata: HashMap<String, String>,
        len: usize,
        slice: F,
    ) -> Result<()>
    where
        F: Fn(usize, usize) -> ArrayRef,
    {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        metadata.insert(ATTR_VARIABLE.to_string(), name.to_string());
        let field = Field::new(name, data_type, false).with_metadata(metadata.clone());
        let schema = Arc::new(Schema::new_with_metadata(vec![field], metadata));

        let tmp_path = path.with_extension(format!("{}.tmp", STORE_FILE_EXTENSION));
        let result = self.write_batches(&tmp_path, schema, len, slice);

        match result {
            Ok(()) => {
                fs::rename(&tmp_path, path)?;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    fn write_batches<F>(&self, path: &Path, schema: Arc<Schema>, len: usize, slice: F) -> Result<()>
    where
        F: Fn(usize, usize) -> ArrayRef,
    {
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let mut start = 0;
        while start < len {
            let end = (start + self.chunk_size).min(len);
            let batch = RecordBatch::try_new(schema.clone(), vec![slice(start, end)])?;
            writer.write(&batch)?;
            start = end;
        }

        writer.close()?;
        Ok(())
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<StoreFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let file_metadata = metadata.file_metadata();
        let row_groups = metadata.num_row_groups();
        let compression = if row_groups > 0 && metadata.row_group(0).num_columns() > 0 {
            metadata.row_group(0).column(0).compression()
        } else {
            self.compression
        };

        Ok(StoreFileInfo {
            path: path.to_path_buf(),
            total_rows: file_metadata.num_rows(),
            row_groups: row_groups as i32,
            file_size: fs::metadata(path)?.len(),
            compression,
        })
    }
}

impl Default for StoreWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct StoreFileInfo {
    pub path: PathBuf,
    pub total_rows: i64,
    pub row_groups: i32,
    pub file_size: u64,
    pub compression: Compression,
}

impl StoreFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "{}: {} values, {} row group(s), {:.2} KB, {:?}",
            self.path.display(),
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1024.0,
            self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::quantize_variable;
    use crate::models::TargetDtype;
    use tempfile::TempDir;

    #[test]
    fn test_variable_path_rejects_escapes() {
        let store = Path::new("store");
        assert_eq!(
            StoreWriter::variable_path(store, "u10").unwrap(),
            PathBuf::from("store/u10.parquet")
        );
        for bad in ["", ".", "..", "a/b", "..\\x"] {
            assert!(StoreWriter::variable_path(store, bad).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_write_quantized_creates_file() -> Result<()> {
        let store = TempDir::new()?;
        let var = Variable::new("t2m", vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        let quantized = quantize_variable(&var, TargetDtype::U2)?;

        let writer = StoreWriter::new().with_chunk_size(4);
        let path = writer.write_quantized(store.path(), &quantized)?;

        assert!(path.exists());
        assert!(!path.with_extension("parquet.tmp").exists());
        let info = writer.get_file_info(&path)?;
        assert_eq!(info.total_rows, 6);
        Ok(())
    }

    #[test]
    fn test_different_compressions() -> Result<()> {
        let compressions = ["snappy", "gzip", "lz4", "zstd", "none"];
        let var = Variable::from_vec("v100", vec![0.5, -3.0, 7.25]);

        for compression in &compressions {
            let store = TempDir::new()?;
            let writer = StoreWriter::new().with_compression(compression)?;
            let result = writer.write_variable(store.path(), &var);
            assert!(result.is_ok(), "Failed with compression: {}", compression);
        }

        assert!(StoreWriter::new().with_compression("brotli-max").is_err());
        Ok(())
    }
}
