use crate::codec::decode;
use crate::error::{ProcessingError, Result};
use crate::models::{QuantizedVariable, TargetDtype, Variable};
use std::collections::BTreeMap;

/// Relative slack added to the `scale / 2` bound for float rounding in
/// `code * scale + offset`.
const FLOAT_SLACK_ULPS: f64 = 16.0;

#[derive(Debug, Clone, Default)]
pub struct RoundTripReport {
    pub total_samples: usize,
    pub missing_samples: usize,
    pub clipped_samples: usize,
    pub total_violations: usize,
    /// The first violations found, capped by the checker's report limit.
    pub violations: Vec<BoundViolation>,
    pub variable_statistics: BTreeMap<String, VariableStatistics>,
}

impl RoundTripReport {
    pub fn is_clean(&self) -> bool {
        self.total_violations == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundViolation {
    pub variable: String,
    pub index: usize,
    pub original: f64,
    pub decoded: f64,
    pub bound: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VariableStatistics {
    pub dtype: Option<TargetDtype>,
    pub samples: usize,
    pub missing: usize,
    pub clipped: usize,
    pub violations: usize,
    pub max_abs_error: f64,
    pub mean_abs_error: f64,
    pub error_bound: f64,
}

/// Compares decoded values against the floats they were encoded from.
pub struct RoundTripChecker {
    max_reported_violations: usize,
}

impl RoundTripChecker {
    pub fn new() -> Self {
        Self {
            max_reported_violations: 100,
        }
    }

    pub fn with_max_reported_violations(mut self, limit: usize) -> Self {
        self.max_reported_violations = limit;
        self
    }

    /// Pairs originals with encoded variables by name. Every encoded
    /// variable must have an original.
    pub fn check_all(
        &self,
        originals: &[Variable],
        quantized: &[QuantizedVariable],
    ) -> Result<RoundTripReport> {
        let mut report = RoundTripReport::default();
        for encoded in quantized {
            let original = originals
                .iter()
                .find(|v| v.name == encoded.name)
                .ok_or_else(|| {
                    ProcessingError::MissingData(format!(
                        "no source variable named '{}'",
                        encoded.name
                    ))
                })?;
            self.check_variable(original, encoded, &mut report)?;
        }
        Ok(report)
    }

    pub fn check_variable(
        &self,
        original: &Variable,
        encoded: &QuantizedVariable,
        report: &mut RoundTripReport,
    ) -> Result<()> {
        let decoded = decode(&encoded.encoded, &encoded.scheme)
            .map_err(|e| ProcessingError::variable(&encoded.name, e))?;
        if decoded.len() != original.len() {
            return Err(ProcessingError::InvalidFormat(format!(
                "variable '{}' decodes to {} samples, source has {}",
                encoded.name,
                decoded.len(),
                original.len()
            )));
        }

        let scheme = &encoded.scheme;
        let range = encoded.valid_range;
        let mut stats = VariableStatistics {
            dtype: Some(encoded.dtype()),
            samples: original.len(),
            error_bound: scheme.max_error(),
            ..Default::default()
        };
        let mut error_sum = 0.0;
        let mut compared = 0usize;

        for (index, (&value, &restored)) in original.data.iter().zip(&decoded).enumerate() {
            if value.is_nan() {
                stats.missing += 1;
                continue;
            }
            if !range.contains(value) {
                // Clipped samples lose more than half a step by construction.
                stats.clipped += 1;
                continue;
            }

            let error = (restored - value).abs();
            let slack = FLOAT_SLACK_ULPS
                * f64::EPSILON
                * (value.abs() + scheme.offset().abs() + scheme.scale());
            let bound = scheme.max_error() + slack;

            compared += 1;
            error_sum += error;
            stats.max_abs_error = stats.max_abs_error.max(error);

            if error.is_nan() || error > bound {
                stats.violations += 1;
                report.total_violations += 1;
                if report.violations.len() < self.max_reported_violations {
                    report.violations.push(BoundViolation {
                        variable: encoded.name.clone(),
                        index,
                        original: value,
                        decoded: restored,
                        bound,
                    });
                }
            }
        }

        if compared > 0 {
            stats.mean_abs_error = error_sum / compared as f64;
        }

        report.total_samples += stats.samples;
        report.missing_samples += stats.missing;
        report.clipped_samples += stats.clipped;
        report
            .variable_statistics
            .insert(encoded.name.clone(), stats);
        Ok(())
    }

    pub fn generate_summary(&self, report: &RoundTripReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Round-Trip Report ===\n");
        summary.push_str(&format!("Variables: {}\n", report.variable_statistics.len()));
        summary.push_str(&format!("Total Samples: {}\n", report.total_samples));
        summary.push_str(&format!("Missing Samples: {}\n", report.missing_samples));
        summary.push_str(&format!("Clipped Samples: {}\n", report.clipped_samples));

        for (name, stats) in &report.variable_statistics {
            let dtype = stats
                .dtype
                .map(|d| d.to_string())
                .unwrap_or_else(|| "?".to_string());
            summary.push_str(&format!(
                "  {} [{}]: max |err| {:.3e}, mean |err| {:.3e}, bound {:.3e}, {} violation(s)\n",
                name,
                dtype,
                stats.max_abs_error,
                stats.mean_abs_error,
                stats.error_bound,
                stats.violations
            ));
        }

        summary.push_str(&format!("\nBound Violations: {}\n", report.total_violations));
        if !report.violations.is_empty() {
            let shown = report.violations.len().min(10);
            summary.push_str(&format!(
                "\nSample of Violations ({} of {}):\n",
                shown, report.total_violations
            ));
            for (i, violation) in report.violations.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. {}[{}]: {} decoded as {} (bound {:.3e})\n",
                    i + 1,
                    violation.variable,
                    violation.index,
                    violation.original,
                    violation.decoded,
                    violation.bound
                ));
            }
        }

        summary
    }
}

impl Default for RoundTripChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::quantize_variable;
    use crate::models::{QuantizationScheme, ValidRange};

    #[test]
    fn test_clean_round_trip() -> Result<()> {
        let source = Variable::from_vec("t2m", vec![271.3, 280.0, 295.75, 301.1, f64::NAN]);
        let encoded = quantize_variable(&source, TargetDtype::I1)?;

        let checker = RoundTripChecker::new();
        let report = checker.check_all(&[source], &[encoded])?;

        assert!(report.is_clean());
        assert_eq!(report.total_samples, 5);
        assert_eq!(report.missing_samples, 1);
        let stats = &report.variable_statistics["t2m"];
        assert!(stats.max_abs_error <= stats.error_bound + 1e-9);
        assert!(stats.mean_abs_error <= stats.max_abs_error);
        Ok(())
    }

    #[test]
    fn test_out_of_range_samples_are_clipped() -> Result<()> {
        let fitted = Variable::from_vec("sp", vec![0.0, 10.0]);
        let mut encoded = quantize_variable(&fitted, TargetDtype::U1)?;
        encoded.encoded = crate::codec::encode(&[0.0, 10.0, 25.0], &[3], &encoded.scheme)?;

        let source = Variable::from_vec("sp", vec![0.0, 10.0, 25.0]);
        let mut report = RoundTripReport::default();
        RoundTripChecker::new().check_variable(&source, &encoded, &mut report)?;

        assert_eq!(report.clipped_samples, 1);
        assert!(report.is_clean());
        Ok(())
    }

    #[test]
    fn test_wrong_scheme_reports_violations() -> Result<()> {
        let source = Variable::from_vec("u10", vec![0.0, 100.0, 200.0]);
        let mut encoded = quantize_variable(&source, TargetDtype::U1)?;
        // Same codes read back with a scheme whose offset is shifted.
        encoded.scheme = QuantizationScheme::from_parts(
            encoded.scheme.scale(),
            encoded.scheme.offset() + 5.0,
            TargetDtype::U1,
            None,
        )?;
        encoded.valid_range = ValidRange::new(0.0, 200.0);

        let checker = RoundTripChecker::new().with_max_reported_violations(2);
        let report = checker.check_all(&[source], &[encoded])?;

        assert_eq!(report.variable_statistics["u10"].violations, 3);
        assert_eq!(report.total_violations, 3);
        assert_eq!(report.violations.len(), 2);
        let summary = checker.generate_summary(&report);
        assert!(summary.contains("Bound Violations: 3"));
        assert!(summary.contains("Sample of Violations (2 of 3)"));
        Ok(())
    }

    #[test]
    fn test_violation_count_is_not_capped() -> Result<()> {
        let data: Vec<f64> = (0..500).map(|i| i as f64).collect();
        let source = Variable::from_vec("msl", data);
        let mut encoded = quantize_variable(&source, TargetDtype::U2)?;
        encoded.scheme = QuantizationScheme::from_parts(
            encoded.scheme.scale(),
            encoded.scheme.offset() + 1.0,
            TargetDtype::U2,
            None,
        )?;

        let checker = RoundTripChecker::new();
        let report = checker.check_all(&[source], &[encoded])?;

        assert!(!report.is_clean());
        assert_eq!(report.total_violations, 500);
        assert_eq!(report.violations.len(), 100);
        let summary = checker.generate_summary(&report);
        assert!(summary.contains("Bound Violations: 500"));
        assert!(summary.contains("Sample of Violations (10 of 500)"));
        Ok(())
    }

    #[test]
    fn test_unknown_variable_is_missing_data() -> Result<()> {
        let source = Variable::from_vec("a", vec![1.0, 2.0]);
        let encoded = quantize_variable(&source, TargetDtype::U1)?;
        let result = RoundTripChecker::new().check_all(&[], &[encoded]);
        assert!(matches!(result, Err(ProcessingError::MissingData(_))));
        Ok(())
    }
}
