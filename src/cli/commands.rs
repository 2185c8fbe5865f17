use crate::cli::args::{Cli, Commands};
use crate::cli::settings::Settings;
use crate::codec::QuantizationAttributes;
use crate::error::{EntryFailure, ProcessingError, Result};
use crate::models::{TargetDtype, Variable};
use crate::processors::{ParallelQuantizer, QuantizationOutcome, RoundTripChecker};
use crate::readers::{DatasetReader, StoreEntryKind, StoreScan};
use crate::utils::filename::{generate_default_decoded_path, generate_default_store_path};
use crate::utils::progress::ProgressReporter;
use crate::writers::StoreWriter;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn, Level};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let settings = Settings::load(cli.config.as_deref())?;
    debug!(?settings, "resolved settings");

    match cli.command {
        Commands::Encode {
            input,
            output,
            dtype,
            compression,
            variables,
            validate_only,
            max_workers,
            chunk_size,
        } => {
            let options = EncodeOptions {
                dtype: resolve_dtype(dtype, &settings)?,
                compression: compression.unwrap_or_else(|| settings.compression.clone()),
                max_workers: max_workers.unwrap_or(settings.max_workers),
                chunk_size: chunk_size.unwrap_or(settings.chunk_size),
                row_group_size: settings.row_group_size,
                variables,
                validate_only,
            };
            let output = output.unwrap_or_else(|| generate_default_store_path(&input));
            encode(input, output, options).await
        }

        Commands::Decode {
            input,
            output,
            compression,
            max_workers,
        } => {
            let output = output.unwrap_or_else(|| generate_default_decoded_path(&input));
            let writer = StoreWriter::new()
                .with_compression(compression.as_deref().unwrap_or(&settings.compression))?
                .with_chunk_size(settings.chunk_size)
                .with_row_group_size(settings.row_group_size);
            let quantizer = ParallelQuantizer::new(max_workers.unwrap_or(settings.max_workers));
            decode(input, output, quantizer, writer).await
        }

        Commands::Verify {
            input,
            dtype,
            max_workers,
        } => {
            let quantizer = ParallelQuantizer::new(max_workers.unwrap_or(settings.max_workers))
                .with_dtype(resolve_dtype(dtype, &settings)?);
            verify(input, quantizer).await
        }

        Commands::Info { input, json } => {
            tokio::task::spawn_blocking(move || info_command(&input, json)).await?
        }
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    // A subscriber is already installed when `run` is called more than once
    // in the same process.
    if installed.is_err() {
        debug!("tracing subscriber already installed");
    }
    Ok(())
}

fn resolve_dtype(flag: Option<String>, settings: &Settings) -> Result<TargetDtype> {
    match flag {
        Some(dtype) => Ok(dtype.parse::<TargetDtype>()?),
        None => settings.target_dtype(),
    }
}

struct EncodeOptions {
    dtype: TargetDtype,
    compression: String,
    max_workers: usize,
    chunk_size: usize,
    row_group_size: usize,
    variables: Vec<String>,
    validate_only: bool,
}

/// Reads the dataset's float variables along with the store files that
/// could not be read.
async fn load_dataset(
    reader: DatasetReader,
    input: PathBuf,
    names: Vec<String>,
) -> Result<(Vec<Variable>, Vec<EntryFailure>)> {
    let scan = tokio::task::spawn_blocking(move || -> Result<StoreScan<Variable>> {
        let progress = ProgressReporter::new_spinner("Reading dataset...", false);
        let scan = reader.scan_dataset(&input)?;
        progress.finish_with_message(&format!("Read {} variable(s)", scan.entries.len()));
        Ok(scan)
    })
    .await??;
    let StoreScan {
        entries: mut variables,
        failures: mut read_failures,
    } = scan;

    if !names.is_empty() {
        let missing: Vec<&str> = names
            .iter()
            .filter(|name| {
                !variables.iter().any(|v| &v.name == *name)
                    && !read_failures.iter().any(|f| &f.name == *name)
            })
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ProcessingError::MissingData(format!(
                "Variable(s) not found in dataset: {}",
                missing.join(", ")
            )));
        }
        variables.retain(|v| names.contains(&v.name));
        read_failures.retain(|f| names.contains(&f.name));
    }

    Ok((variables, read_failures))
}

async fn quantize(
    quantizer: ParallelQuantizer,
    variables: Vec<Variable>,
) -> Result<(Vec<Variable>, QuantizationOutcome)> {
    tokio::task::spawn_blocking(move || -> Result<(Vec<Variable>, QuantizationOutcome)> {
        let progress = ProgressReporter::new(variables.len() as u64, "Quantizing...", false);
        let outcome = quantizer.quantize_all(&variables, Some(&progress))?;
        Ok((variables, outcome))
    })
    .await?
}

fn print_outcome(outcome: &QuantizationOutcome) {
    for variable in &outcome.quantized {
        println!(
            "Variable {} has been quantized to {} with scale {} and offset {}.",
            variable.name,
            variable.dtype(),
            variable.scheme.scale(),
            variable.scheme.offset()
        );
    }
    for failure in &outcome.failures {
        println!("Variable {} could not be quantized: {}", failure.name, failure.error);
    }
}

fn print_failures(stage: &str, failures: &[EntryFailure]) {
    for failure in failures {
        println!("Variable {} could not be {}: {}", failure.name, stage, failure.error);
    }
}

fn partial_failure(failed: usize, total: usize) -> Result<()> {
    if failed == 0 {
        Ok(())
    } else {
        Err(ProcessingError::PartialFailure { failed, total })
    }
}

async fn encode(input: PathBuf, output: PathBuf, options: EncodeOptions) -> Result<()> {
    println!("Quantizing dataset...");
    println!("Input: {}", input.display());
    println!("Output store: {}", output.display());
    println!(
        "Dtype: {}, Workers: {}, Chunk size: {}",
        options.dtype, options.max_workers, options.chunk_size
    );

    // Settle the writer configuration before any work is done.
    let writer = StoreWriter::new()
        .with_compression(&options.compression)?
        .with_chunk_size(options.chunk_size)
        .with_row_group_size(options.row_group_size);

    let reader = DatasetReader::new().with_batch_size(options.chunk_size);
    let (variables, read_failures) = load_dataset(reader, input, options.variables).await?;
    print_failures("read", &read_failures);
    if variables.is_empty() {
        println!("No float variables to quantize");
        return partial_failure(read_failures.len(), read_failures.len());
    }

    let quantizer = ParallelQuantizer::new(options.max_workers).with_dtype(options.dtype);
    let (_, outcome) = quantize(quantizer, variables).await?;
    print_outcome(&outcome);

    let total = read_failures.len() + outcome.total();
    let mut failed = read_failures.len() + outcome.failures.len();

    if options.validate_only {
        println!("\n{}", outcome.summary());
        println!("Validation complete - no store written");
        return partial_failure(failed, total);
    }

    if outcome.quantized.is_empty() {
        println!("Nothing to write");
        return partial_failure(failed, total);
    }

    println!(
        "\nWriting {} variable(s) to {}...",
        outcome.quantized.len(),
        output.display()
    );
    let (written, write_failures) =
        tokio::task::spawn_blocking(move || -> Result<(usize, Vec<EntryFailure>)> {
            let progress =
                ProgressReporter::new(outcome.quantized.len() as u64, "Writing store...", false);
            let mut written = 0;
            let mut failures = Vec::new();
            for (i, variable) in outcome.quantized.iter().enumerate() {
                let result = writer
                    .write_quantized(&output, variable)
                    .and_then(|path| writer.get_file_info(&path));
                match result {
                    Ok(file_info) => {
                        progress.println(&file_info.summary());
                        written += 1;
                    }
                    Err(error) => {
                        warn!(variable = %variable.name, error = %error, "write failed");
                        failures.push(EntryFailure {
                            name: variable.name.clone(),
                            error,
                        });
                    }
                }
                progress.update(i as u64 + 1);
            }
            progress.finish_with_message(&format!("Wrote {} variable(s)", written));
            Ok((written, failures))
        })
        .await??;
    print_failures("written", &write_failures);
    failed += write_failures.len();

    info!(written, failed, "encode finished");
    partial_failure(failed, total)?;
    println!("Quantization complete!");
    Ok(())
}

async fn decode(
    input: PathBuf,
    output: PathBuf,
    quantizer: ParallelQuantizer,
    writer: StoreWriter,
) -> Result<()> {
    println!("Decoding store: {}", input.display());
    println!("Output store: {}", output.display());

    tokio::task::spawn_blocking(move || -> Result<()> {
        let scan = DatasetReader::new().scan_store(&input)?;
        print_failures("read", &scan.failures);
        let total = scan.entries.len() + scan.failures.len();
        let mut failed = scan.failures.len();
        if scan.entries.is_empty() {
            println!("No encoded variables found");
            return partial_failure(failed, total);
        }

        let progress = ProgressReporter::new(scan.entries.len() as u64, "Decoding...", false);
        let outcome = quantizer.decode_all(&scan.entries, Some(&progress))?;
        print_failures("decoded", &outcome.failures);
        failed += outcome.failures.len();

        let mut write_failures = Vec::new();
        for variable in &outcome.decoded {
            let result = writer
                .write_variable(&output, variable)
                .and_then(|path| writer.get_file_info(&path));
            match result {
                Ok(file_info) => println!("{}", file_info.summary()),
                Err(error) => write_failures.push(EntryFailure {
                    name: variable.name.clone(),
                    error,
                }),
            }
        }
        print_failures("written", &write_failures);
        failed += write_failures.len();

        info!(
            decoded = outcome.decoded.len() - write_failures.len(),
            failed,
            "decode finished"
        );
        partial_failure(failed, total)
    })
    .await??;

    println!("Decoding complete!");
    Ok(())
}

async fn verify(input: PathBuf, quantizer: ParallelQuantizer) -> Result<()> {
    println!("Verifying round trip for {}", input.display());
    println!("Dtype: {}", quantizer.dtype());

    let (variables, read_failures) = load_dataset(DatasetReader::new(), input, Vec::new()).await?;
    print_failures("read", &read_failures);
    let (variables, outcome) = quantize(quantizer, variables).await?;
    print_outcome(&outcome);

    let checker = RoundTripChecker::new();
    let report = checker.check_all(&variables, &outcome.quantized)?;
    println!("\n{}", checker.generate_summary(&report));

    if report.is_clean() {
        println!("✅ All decoded values are within half a quantization step");
    } else {
        println!("⚠️  Found {} bound violations", report.total_violations);
    }

    partial_failure(
        read_failures.len() + outcome.failures.len(),
        read_failures.len() + outcome.total(),
    )
}

#[derive(Debug, Serialize)]
struct StoreEntrySummary {
    variable: String,
    dtype: String,
    shape: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<QuantizationAttributes>,
    rows: i64,
    row_groups: i32,
    file_size: u64,
}

fn info_command(store: &Path, json: bool) -> Result<()> {
    let reader = DatasetReader::new();
    let writer = StoreWriter::new();

    let mut entries = Vec::new();
    for path in DatasetReader::list_store(store)? {
        let file_info = writer.get_file_info(&path)?;
        let entry = match reader.entry_kind(&path)? {
            StoreEntryKind::Encoded(dtype) => {
                let variable = reader.read_quantized(&path)?;
                StoreEntrySummary {
                    dtype: dtype.to_string(),
                    shape: variable.shape().to_vec(),
                    attributes: Some(QuantizationAttributes::new(
                        &variable.scheme,
                        variable.valid_range,
                    )),
                    variable: variable.name,
                    rows: file_info.total_rows,
                    row_groups: file_info.row_groups,
                    file_size: file_info.file_size,
                }
            }
            StoreEntryKind::Float(width) => {
                for variable in reader.read_float_file(&path)? {
                    entries.push(StoreEntrySummary {
                        variable: variable.name,
                        dtype: width.code().to_string(),
                        shape: variable.shape,
                        attributes: None,
                        rows: file_info.total_rows,
                        row_groups: file_info.row_groups,
                        file_size: file_info.file_size,
                    });
                }
                continue;
            }
        };
        entries.push(entry);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Store: {}", store.display());
    println!("Variables: {}", entries.len());
    for entry in &entries {
        println!("\n{} [{}] shape {:?}", entry.variable, entry.dtype, entry.shape);
        if let Some(attributes) = &entry.attributes {
            println!("  scale_factor: {}", attributes.scale_factor);
            println!("  add_offset:   {}", attributes.add_offset);
            println!(
                "  valid range:  [{}, {}]",
                attributes.valid_min, attributes.valid_max
            );
            if let Some(fill) = attributes.fill_value {
                println!("  _FillValue:   {}", fill);
            }
        }
        println!(
            "  {} values, {} row group(s), {:.2} KB",
            entry.rows,
            entry.row_groups,
            entry.file_size as f64 / 1024.0
        );
    }

    Ok(())
}
