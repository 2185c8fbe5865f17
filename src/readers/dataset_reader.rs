use crate::codec::QuantizationAttributes;
use crate::error::{EntryFailure, ProcessingError, Result};
use crate::models::{EncodedArray, EncodedData, FloatWidth, QuantizedVariable, TargetDtype, Variable};
use crate::utils::constants::{
    ATTR_FILL_VALUE, ATTR_MISSING_VALUE, ATTR_SCALE_FACTOR, ATTR_SHAPE, ATTR_SOURCE_DTYPE,
    STORE_FILE_EXTENSION,
};
use arrow::array::{Array, Float32Array, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use validator::Validate;

const DEFAULT_BATCH_SIZE: usize = 8192;

/// What a single store file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEntryKind {
    Float(FloatWidth),
    Encoded(TargetDtype),
}

/// Entries read from a dataset or store, and the files that failed.
#[derive(Debug)]
pub struct StoreScan<T> {
    pub entries: Vec<T>,
    pub failures: Vec<EntryFailure>,
}

impl<T> StoreScan<T> {
    fn with_entries(entries: Vec<T>) -> Self {
        Self {
            entries,
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, file: &Path, error: ProcessingError) {
        warn!(path = %file.display(), error = %error, "unreadable store entry");
        let name = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        self.failures.push(EntryFailure { name, error });
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The entries, or the error of the first file that failed.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.entries),
        }
    }
}

/// Reads float datasets and array stores.
///
/// A dataset is either a single Parquet file whose float columns are the
/// variables, or a store directory holding one Parquet file per variable.
pub struct DatasetReader {
    batch_size: usize,
}

impl DatasetReader {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Reads every float variable under `path`, failing on the first
    /// unreadable file.
    pub fn read_dataset(&self, path: &Path) -> Result<Vec<Variable>> {
        self.scan_dataset(path)?.into_result()
    }

    /// Reads every float variable under `path`. Unreadable files of a store
    /// directory are recorded and the rest are still read.
    pub fn scan_dataset(&self, path: &Path) -> Result<StoreScan<Variable>> {
        if path.is_dir() {
            let mut scan = StoreScan::with_entries(Vec::new());
            for file in Self::list_store(path)? {
                let result = self.entry_kind(&file).and_then(|kind| match kind {
                    StoreEntryKind::Float(_) => self.read_float_file(&file),
                    StoreEntryKind::Encoded(dtype) => {
                        warn!(path = %file.display(), %dtype, "skipping already encoded variable");
                        Ok(Vec::new())
                    }
                });
                match result {
                    Ok(variables) => scan.entries.extend(variables),
                    Err(error) => scan.record_failure(&file, error),
                }
            }
            Ok(scan)
        } else if path.is_file() {
            Ok(StoreScan::with_entries(self.read_float_file(path)?))
        } else {
            Err(ProcessingError::MissingData(format!(
                "Dataset not found: {}",
                path.display()
            )))
        }
    }

    /// Reads every encoded variable stored in the `store` directory,
    /// failing on the first unreadable file.
    pub fn read_store(&self, store: &Path) -> Result<Vec<QuantizedVariable>> {
        self.scan_store(store)?.into_result()
    }

    /// Reads every encoded variable of `store`, recording the files that
    /// cannot be read.
    pub fn scan_store(&self, store: &Path) -> Result<StoreScan<QuantizedVariable>> {
        let mut scan = StoreScan::with_entries(Vec::new());
        for file in Self::list_store(store)? {
            let result = self.entry_kind(&file).and_then(|kind| match kind {
                StoreEntryKind::Encoded(_) => self.read_quantized(&file).map(Some),
                StoreEntryKind::Float(_) => {
                    warn!(path = %file.display(), "skipping float variable in encoded store");
                    Ok(None)
                }
            });
            match result {
                Ok(Some(variable)) => scan.entries.push(variable),
                Ok(None) => {}
                Err(error) => scan.record_failure(&file, error),
            }
        }
        Ok(scan)
    }

    /// Parquet files of a store directory in name order.
    pub fn list_store(store: &Path) -> Result<Vec<PathBuf>> {
        if !store.is_dir() {
            return Err(ProcessingError::MissingData(format!(
                "Store directory not found: {}",
                store.display()
            )));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(store)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension().and_then(|e| e.to_str()) == Some(STORE_FILE_EXTENSION)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Classifies a single-variable store file by its column type.
    pub fn entry_kind(&self, path: &Path) -> Result<StoreEntryKind> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let schema = builder.schema();
        let field = single_field(schema, path)?;

        match field.data_type() {
            DataType::Float32 => Ok(StoreEntryKind::Float(FloatWidth::F4)),
            DataType::Float64 => Ok(StoreEntryKind::Float(FloatWidth::F8)),
            other => {
                let dtype = TargetDtype::from_arrow(other)
                    .map_err(|e| ProcessingError::variable(field.name(), e))?;
                if attribute(field, schema, ATTR_SCALE_FACTOR).is_none() {
                    return Err(ProcessingError::MissingAttribute {
                        variable: field.name().to_string(),
                        attribute: ATTR_SCALE_FACTOR.to_string(),
                    });
                }
                Ok(StoreEntryKind::Encoded(dtype))
            }
        }
    }

    /// Reads the float columns of a Parquet file as variables. Nulls and
    /// values equal to a declared fill value become NaN.
    pub fn read_float_file(&self, path: &Path) -> Result<Vec<Variable>> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let schema = builder.schema().clone();

        let mut columns: Vec<(usize, &Field, FloatWidth, Vec<f64>)> = Vec::new();
        for (index, field) in schema.fields().iter().enumerate() {
            let field: &Field = field.as_ref();
            match field.data_type() {
                DataType::Float32 => columns.push((index, field, FloatWidth::F4, Vec::new())),
                DataType::Float64 => columns.push((index, field, FloatWidth::F8, Vec::new())),
                other => {
                    warn!(column = %field.name(), data_type = %other, "skipping non-float column");
                }
            }
        }

        let reader = builder.with_batch_size(self.batch_size).build()?;
        for batch_result in reader {
            let batch = batch_result?;
            for (index, field, _, values) in columns.iter_mut() {
                append_floats(batch.column(*index).as_ref(), field.name(), values)?;
            }
        }

        let mut variables = Vec::with_capacity(columns.len());
        for (_, field, width, mut values) in columns {
            if let Some(fill) = float_fill_value(field, &schema)? {
                let is_fill = |v: f64| match width {
                    FloatWidth::F4 => v as f32 == fill as f32,
                    FloatWidth::F8 => v == fill,
                };
                for v in values.iter_mut().filter(|v| is_fill(**v)) {
                    *v = f64::NAN;
                }
            }

            let shape = shape_attribute(field, &schema)?.unwrap_or_else(|| vec![values.len()]);
            let variable = Variable::new(field.name().clone(), shape, values)
                .map_err(|e| ProcessingError::variable(field.name(), e))?
                .with_source_width(width);
            variable.validate()?;

            debug!(
                variable = %variable.name,
                shape = ?variable.shape,
                missing = variable.missing_count(),
                "read float variable"
            );
            variables.push(variable);
        }

        Ok(variables)
    }

    /// Reads one encoded store file with its decode attributes.
    pub fn read_quantized(&self, path: &Path) -> Result<QuantizedVariable> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let schema = builder.schema().clone();
        let field = single_field(&schema, path)?;
        let name = field.name().clone();

        let metadata = merged_metadata(field, &schema);
        let attributes = QuantizationAttributes::from_metadata(&name, &metadata)?;

        let storage = TargetDtype::from_arrow(field.data_type())
            .map_err(|e| ProcessingError::variable(&name, e))?;
        let mut data = EncodedData::empty(storage);

        let reader = builder.with_batch_size(self.batch_size).build()?;
        for batch_result in reader {
            let batch = batch_result?;
            data.extend_from_arrow(batch.column(0).as_ref())
                .map_err(|e| ProcessingError::variable(&name, e))?;
        }

        let shape = shape_attribute(field, &schema)?.unwrap_or_else(|| vec![data.len()]);
        let encoded =
            EncodedArray::new(shape, data).map_err(|e| ProcessingError::variable(&name, e))?;
        let scheme = attributes.scheme()?;
        let source_width = attribute(field, &schema, ATTR_SOURCE_DTYPE)
            .and_then(FloatWidth::parse)
            .unwrap_or_default();

        Ok(QuantizedVariable {
            name,
            encoded,
            scheme,
            valid_range: attributes.valid_range(),
            source_width,
        })
    }
}

impl Default for DatasetReader {
    fn default() -> Self {
        Self::new()
    }
}

fn single_field<'a>(schema: &'a Schema, path: &Path) -> Result<&'a Field> {
    match schema.fields().len() {
        1 => Ok(schema.field(0)),
        n => Err(ProcessingError::InvalidFormat(format!(
            "Store file {} holds {} columns, expected exactly one",
            path.display(),
            n
        ))),
    }
}

/// Field metadata first, file metadata second.
fn attribute<'a>(field: &'a Field, schema: &'a Schema, key: &str) -> Option<&'a str> {
    field
        .metadata()
        .get(key)
        .or_else(|| schema.metadata().get(key))
        .map(String::as_str)
}

fn merged_metadata(field: &Field, schema: &Schema) -> HashMap<String, String> {
    let mut metadata = schema.metadata().clone();
    metadata.extend(field.metadata().iter().map(|(k, v)| (k.clone(), v.clone())));
    metadata
}

fn shape_attribute(field: &Field, schema: &Schema) -> Result<Option<Vec<usize>>> {
    match attribute(field, schema, ATTR_SHAPE) {
        Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        None => Ok(None),
    }
}

/// File metadata only applies when the file holds a single column.
fn float_fill_value(field: &Field, schema: &Schema) -> Result<Option<f64>> {
    let raw = field
        .metadata()
        .get(ATTR_FILL_VALUE)
        .or_else(|| field.metadata().get(ATTR_MISSING_VALUE))
        .or_else(|| {
            (schema.fields().len() == 1)
                .then(|| schema.metadata().get(ATTR_MISSING_VALUE))
                .flatten()
        });

    match raw {
        Some(raw) => raw.trim().parse::<f64>().map(Some).map_err(|_| {
            ProcessingError::InvalidFormat(format!(
                "Fill value on column '{}' is not a number: '{}'",
                field.name(),
                raw
            ))
        }),
        None => Ok(None),
    }
}

fn append_floats(array: &dyn Array, column: &str, values: &mut Vec<f64>) -> Result<()> {
    if let Some(typed) = array.as_any().downcast_ref::<Float64Array>() {
        values.extend(typed.iter().map(|v| v.unwrap_or(f64::NAN)));
    } else if let Some(typed) = array.as_any().downcast_ref::<Float32Array>() {
        values.extend(typed.iter().map(|v| v.map(f64::from).unwrap_or(f64::NAN)));
    } else {
        return Err(ProcessingError::InvalidFormat(format!(
            "Column '{}' is not a float column",
            column
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::quantize_variable;
    use crate::writers::StoreWriter;
    use arrow::array::{ArrayRef, Int32Array};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_dataset(path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<()> {
        let batch = RecordBatch::try_new(schema.clone(), columns)?;
        let mut writer = ArrowWriter::try_new(File::create(path)?, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    #[test]
    fn test_read_multi_column_dataset() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("era5.parquet");

        let mut u10_meta = HashMap::new();
        u10_meta.insert(ATTR_FILL_VALUE.to_string(), "-9999".to_string());
        let schema = Arc::new(Schema::new(vec![
            Field::new("u10", DataType::Float32, true).with_metadata(u10_meta),
            Field::new("time", DataType::Int32, false),
            Field::new("v10", DataType::Float64, true),
        ]));
        write_dataset(
            &path,
            schema,
            vec![
                Arc::new(Float32Array::from(vec![Some(1.5), None, Some(-9999.0)])),
                Arc::new(Int32Array::from(vec![0, 1, 2])),
                Arc::new(Float64Array::from(vec![0.25, 0.5, 0.75])),
            ],
        )?;

        let variables = DatasetReader::new().read_dataset(&path)?;
        assert_eq!(variables.len(), 2);

        let u10 = &variables[0];
        assert_eq!(u10.name, "u10");
        assert_eq!(u10.source_width, FloatWidth::F4);
        assert_eq!(u10.data[0], 1.5);
        assert!(u10.data[1].is_nan());
        assert!(u10.data[2].is_nan());

        let v10 = &variables[1];
        assert_eq!(v10.name, "v10");
        assert_eq!(v10.shape, vec![3]);
        assert_eq!(v10.data, vec![0.25, 0.5, 0.75]);
        Ok(())
    }

    #[test]
    fn test_store_round_trip_preserves_attributes() -> Result<()> {
        let store = TempDir::new()?;
        let var = Variable::new("t2m", vec![2, 2], vec![270.0, 280.5, f64::NAN, 301.25])?;
        let quantized = quantize_variable(&var, TargetDtype::I2)?;
        StoreWriter::new().write_quantized(store.path(), &quantized)?;

        let reader = DatasetReader::new();
        let restored = reader.read_store(store.path())?;
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0], quantized);
        Ok(())
    }

    #[test]
    fn test_store_directory_as_dataset() -> Result<()> {
        let store = TempDir::new()?;
        let writer = StoreWriter::new();
        let float_var = Variable::new("sp", vec![1, 3], vec![1.0, 2.0, 3.0])?;
        writer.write_variable(store.path(), &float_var)?;

        let encoded = quantize_variable(&Variable::from_vec("msl", vec![1.0, 2.0]), TargetDtype::U1)?;
        writer.write_quantized(store.path(), &encoded)?;

        let reader = DatasetReader::new();
        let variables = reader.read_dataset(store.path())?;
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0], float_var);

        assert_eq!(
            reader.entry_kind(&store.path().join("msl.parquet"))?,
            StoreEntryKind::Encoded(TargetDtype::U1)
        );
        Ok(())
    }

    #[test]
    fn test_unreadable_files_do_not_block_the_store() -> Result<()> {
        let store = TempDir::new()?;
        let writer = StoreWriter::new();
        let encoded = quantize_variable(&Variable::from_vec("msl", vec![1.0, 2.0]), TargetDtype::U1)?;
        writer.write_quantized(store.path(), &encoded)?;
        writer.write_variable(store.path(), &Variable::from_vec("sp", vec![3.0, 4.0]))?;
        fs::write(store.path().join("broken.parquet"), b"not a parquet file")?;

        let reader = DatasetReader::new();
        let scan = reader.scan_store(store.path())?;
        assert_eq!(scan.entries, vec![encoded]);
        assert_eq!(scan.failures.len(), 1);
        assert_eq!(scan.failures[0].name, "broken");
        assert!(matches!(scan.failures[0].error, ProcessingError::Parquet(_)));
        assert!(reader.read_store(store.path()).is_err());

        let floats = reader.scan_dataset(store.path())?;
        assert!(!floats.is_complete());
        assert_eq!(floats.entries.len(), 1);
        assert_eq!(floats.entries[0].name, "sp");
        Ok(())
    }

    #[test]
    fn test_missing_dataset() {
        let result = DatasetReader::new().read_dataset(Path::new("/nonexistent/data.parquet"));
        assert!(matches!(result, Err(ProcessingError::MissingData(_))));
    }
}
