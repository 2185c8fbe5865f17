/// Attribute names attached to every encoded variable
pub const ATTR_SCALE_FACTOR: &str = "scale_factor";
pub const ATTR_ADD_OFFSET: &str = "add_offset";
pub const ATTR_VALID_MIN: &str = "valid_min";
pub const ATTR_VALID_MAX: &str = "valid_max";
pub const ATTR_DTYPE: &str = "dtype";
pub const ATTR_FILL_VALUE: &str = "_FillValue";

/// Store attributes
pub const ATTR_SHAPE: &str = "shape";
pub const ATTR_SOURCE_DTYPE: &str = "source_dtype";
pub const ATTR_VARIABLE: &str = "variable";

/// Float sentinels recognised on input variables
pub const ATTR_MISSING_VALUE: &str = "missing_value";

/// Store layout
pub const STORE_FILE_EXTENSION: &str = "parquet";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Processing defaults
pub const DEFAULT_TARGET_DTYPE: &str = "u1";
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 1_048_576;

/// Environment prefix for settings overrides (GRID_QUANTIZER_DTYPE, ...)
pub const SETTINGS_ENV_PREFIX: &str = "GRID_QUANTIZER";

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
pub const DEFAULT_COMPRESSION: &str = COMPRESSION_SNAPPY;
