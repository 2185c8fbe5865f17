use crate::codec::{decode, quantize_variable};
use crate::error::{EntryFailure, ProcessingError, QuantizationError, Result};
use crate::models::{QuantizedVariable, TargetDtype, Variable};
use crate::utils::progress::ProgressReporter;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// A variable that could not be quantized, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableFailure {
    pub name: String,
    pub error: QuantizationError,
}

/// Per-variable results of a dataset pass, in input order.
#[derive(Debug, Clone, Default)]
pub struct QuantizationOutcome {
    pub quantized: Vec<QuantizedVariable>,
    pub failures: Vec<VariableFailure>,
}

impl QuantizationOutcome {
    pub fn total(&self) -> usize {
        self.quantized.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!(
            "Quantized {} of {} variables\n",
            self.quantized.len(),
            self.total()
        ));
        for variable in &self.quantized {
            summary.push_str(&format!(
                "  {} -> {} (scale={:e}, offset={}, valid=[{}, {}])\n",
                variable.name,
                variable.dtype(),
                variable.scheme.scale(),
                variable.scheme.offset(),
                variable.valid_range.valid_min,
                variable.valid_range.valid_max,
            ));
        }
        for failure in &self.failures {
            summary.push_str(&format!("  {} FAILED: {}\n", failure.name, failure.error));
        }
        summary
    }
}

/// Per-variable results of a decode pass, in input order.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    pub decoded: Vec<Variable>,
    pub failures: Vec<EntryFailure>,
}

impl DecodeOutcome {
    pub fn total(&self) -> usize {
        self.decoded.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Quantizes every variable of a dataset with one target dtype on a
/// dedicated rayon pool. Variables are independent; a failing variable is
/// recorded and the rest carry on.
pub struct ParallelQuantizer {
    max_workers: usize,
    dtype: TargetDtype,
}

impl ParallelQuantizer {
    /// Targets `u1` until [`with_dtype`](Self::with_dtype) says otherwise.
    /// Decoding reads the dtype from each stored scheme.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            dtype: TargetDtype::U1,
        }
    }

    pub fn with_dtype(mut self, dtype: TargetDtype) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn dtype(&self) -> TargetDtype {
        self.dtype
    }

    fn build_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))
    }

    pub fn quantize_all(
        &self,
        variables: &[Variable],
        progress: Option<&ProgressReporter>,
    ) -> Result<QuantizationOutcome> {
        let total = variables.len();
        let processed_count = Arc::new(AtomicUsize::new(0));

        if let Some(p) = progress {
            p.set_length(total as u64);
            p.set_message(&format!("Quantizing {} variables to {}...", total, self.dtype));
        }

        let pool = self.build_pool()?;
        let results: Vec<std::result::Result<QuantizedVariable, VariableFailure>> =
            pool.install(|| {
                variables
                    .par_iter()
                    .map(|variable| {
                        let result = quantize_variable(variable, self.dtype).map_err(|error| {
                            VariableFailure {
                                name: variable.name.clone(),
                                error,
                            }
                        });

                        let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                        if let Some(p) = progress {
                            p.update(count as u64);
                        }

                        result
                    })
                    .collect()
            });

        let mut outcome = QuantizationOutcome::default();
        for result in results {
            match result {
                Ok(quantized) => {
                    info!(
                        variable = %quantized.name,
                        dtype = %quantized.dtype(),
                        scale = quantized.scheme.scale(),
                        offset = quantized.scheme.offset(),
                        "quantized variable"
                    );
                    outcome.quantized.push(quantized);
                }
                Err(failure) => {
                    warn!(variable = %failure.name, error = %failure.error, "quantization failed");
                    outcome.failures.push(failure);
                }
            }
        }

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Quantized {}/{} variables",
                outcome.quantized.len(),
                total
            ));
        }

        Ok(outcome)
    }

    /// Decodes stored variables back to floats at their source width. A
    /// variable that fails to decode is recorded and the rest carry on.
    pub fn decode_all(
        &self,
        variables: &[QuantizedVariable],
        progress: Option<&ProgressReporter>,
    ) -> Result<DecodeOutcome> {
        let processed_count = Arc::new(AtomicUsize::new(0));

        if let Some(p) = progress {
            p.set_length(variables.len() as u64);
            p.set_message(&format!("Decoding {} variables...", variables.len()));
        }

        let pool = self.build_pool()?;
        let results: Vec<Result<Variable>> = pool.install(|| {
            variables
                .par_iter()
                .map(|variable| {
                    let result = decode_variable(variable);

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(p) = progress {
                        p.update(count as u64);
                    }

                    result
                })
                .collect()
        });

        let mut outcome = DecodeOutcome::default();
        for (variable, result) in variables.iter().zip(results) {
            match result {
                Ok(decoded) => outcome.decoded.push(decoded),
                Err(error) => {
                    warn!(variable = %variable.name, error = %error, "decoding failed");
                    outcome.failures.push(EntryFailure {
                        name: variable.name.clone(),
                        error,
                    });
                }
            }
        }

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Decoded {}/{} variables",
                outcome.decoded.len(),
                variables.len()
            ));
        }

        Ok(outcome)
    }
}

impl Default for ParallelQuantizer {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

pub fn decode_variable(variable: &QuantizedVariable) -> Result<Variable> {
    let values = decode(&variable.encoded, &variable.scheme)
        .map_err(|e| ProcessingError::variable(&variable.name, e))?;

    Variable::new(variable.name.clone(), variable.shape().to_vec(), values)
        .map(|v| v.with_source_width(variable.source_width))
        .map_err(|e| ProcessingError::variable(&variable.name, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuantizationScheme;

    fn dataset() -> Vec<Variable> {
        vec![
            Variable::from_vec("u10", vec![-3.0, 0.0, 4.5, 12.0]),
            Variable::from_vec("gappy", vec![1.0, f64::NAN, 2.0]),
            Variable::from_vec("missing", vec![f64::NAN, f64::NAN]),
            Variable::from_vec("v10", vec![2.0, 2.0]),
        ]
    }

    #[test]
    fn test_failures_do_not_block_other_variables() -> Result<()> {
        let quantizer = ParallelQuantizer::new(2);
        let outcome = quantizer.quantize_all(&dataset(), None)?;

        let names: Vec<&str> = outcome.quantized.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["u10", "v10"]);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].name, "gappy");
        assert!(matches!(
            outcome.failures[0].error,
            QuantizationError::UnrepresentableMissingValue { .. }
        ));
        assert_eq!(outcome.failures[1].error, QuantizationError::EmptyRange);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.total(), 4);
        Ok(())
    }

    #[test]
    fn test_signed_dtype_handles_missing() -> Result<()> {
        let quantizer = ParallelQuantizer::new(2).with_dtype(TargetDtype::I2);
        let outcome = quantizer.quantize_all(&dataset(), None)?;
        assert_eq!(outcome.quantized.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        Ok(())
    }

    #[test]
    fn test_decode_all_restores_values() -> Result<()> {
        let quantizer = ParallelQuantizer::new(2).with_dtype(TargetDtype::U2);
        let source = vec![Variable::from_vec("u10", vec![-3.0, 0.0, 4.5, 12.0])];
        let outcome = quantizer.quantize_all(&source, None)?;
        let decoded = quantizer.decode_all(&outcome.quantized, None)?;
        assert!(decoded.is_complete());

        let bound = outcome.quantized[0].scheme.max_error() + 1e-12;
        for (restored, original) in decoded.decoded[0].data.iter().zip(&source[0].data) {
            assert!((restored - original).abs() <= bound);
        }
        Ok(())
    }

    #[test]
    fn test_decode_failures_do_not_block_other_variables() -> Result<()> {
        let quantizer = ParallelQuantizer::new(2).with_dtype(TargetDtype::U2);
        let source = vec![
            Variable::from_vec("u10", vec![-3.0, 0.0, 4.5, 12.0]),
            Variable::from_vec("v10", vec![1.0, 2.0, 3.0]),
        ];
        let mut stored = quantizer.quantize_all(&source, None)?.quantized;
        // Codes stored as u2 cannot be read with a u1 scheme.
        stored[0].scheme = QuantizationScheme::from_parts(1.0, 0.0, TargetDtype::U1, None)?;

        let outcome = quantizer.decode_all(&stored, None)?;

        assert_eq!(outcome.total(), 2);
        assert_eq!(outcome.decoded.len(), 1);
        assert_eq!(outcome.decoded[0].name, "v10");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].name, "u10");
        assert!(matches!(
            outcome.failures[0].error,
            ProcessingError::Variable {
                source: QuantizationError::SchemeMismatch { .. },
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_summary_lists_failures() -> Result<()> {
        let outcome = ParallelQuantizer::new(1).quantize_all(&dataset(), None)?;
        let summary = outcome.summary();
        assert!(summary.contains("Quantized 2 of 4 variables"));
        assert!(summary.contains("missing FAILED"));
        Ok(())
    }
}
