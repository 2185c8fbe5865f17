use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grid-quantizer")]
#[command(about = "Scale/offset quantization of gridded float variables into integer array stores")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Settings file (TOML/JSON/YAML); GRID_QUANTIZER_* variables override it"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Quantize every float variable of a dataset into an array store
    Encode {
        #[arg(short, long, help = "Input Parquet dataset or array store directory")]
        input: PathBuf,

        #[arg(
            short,
            long,
            help = "Output store directory [default: output/{input}-quantized-{YYMMDD}]"
        )]
        output: Option<PathBuf>,

        #[arg(short, long, help = "Target dtype: u1, u2, u4, i1, i2, i4 [default: u1]")]
        dtype: Option<String>,

        #[arg(short, long, help = "snappy, gzip, lz4, zstd or none [default: snappy]")]
        compression: Option<String>,

        #[arg(long = "variable", value_name = "NAME", help = "Only encode the named variable(s)")]
        variables: Vec<String>,

        #[arg(long, default_value = "false")]
        validate_only: bool,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Samples per record batch")]
        chunk_size: Option<usize>,
    },

    /// Decode an array store back to float variables
    Decode {
        #[arg(short, long, help = "Input array store directory")]
        input: PathBuf,

        #[arg(
            short,
            long,
            help = "Output store directory [default: output/{input}-decoded-{YYMMDD}]"
        )]
        output: Option<PathBuf>,

        #[arg(short, long)]
        compression: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Quantize in memory and report round-trip errors without writing
    Verify {
        #[arg(short, long, help = "Input Parquet dataset or array store directory")]
        input: PathBuf,

        #[arg(short, long)]
        dtype: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Display the variables and attributes of an array store
    Info {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "false", help = "Print attributes as JSON")]
        json: bool,
    },
}
