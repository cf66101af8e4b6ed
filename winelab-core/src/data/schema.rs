//! Dataset schema validation and the status-file gate.
//!
//! Validation compares the dataset's columns and inferred dtypes against the
//! expected column → dtype mapping from `schema.yaml`. All mismatches are
//! collected; nothing stops at the first problem. The outcome is always
//! persisted as a status file, which the transformation stage reads as its
//! gate.

use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of the single status line in the status file.
pub const STATUS_PREFIX: &str = "Validation status:";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("failed to load dataset {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed status file {}: {reason}", path.display())]
    MalformedStatus { path: PathBuf, reason: String },
}

/// One schema problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingColumn(String),
    ExtraColumn(String),
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingColumn(c) => write!(f, "Missing column: '{c}'"),
            ValidationIssue::ExtraColumn(c) => write!(f, "Extra column: '{c}'"),
            ValidationIssue::TypeMismatch {
                column,
                expected,
                actual,
            } => write!(
                f,
                "Type mismatch for '{column}': expected {expected}, got {actual}"
            ),
        }
    }
}

/// Outcome of validating one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn mentions(&self, column: &str) -> bool {
        self.issues.iter().any(|issue| match issue {
            ValidationIssue::MissingColumn(c) | ValidationIssue::ExtraColumn(c) => c == column,
            ValidationIssue::TypeMismatch { column: c, .. } => c == column,
        })
    }
}

/// Pandas-style label for a polars dtype, matching the labels in `schema.yaml`.
pub fn dtype_label(dtype: &DataType) -> String {
    match dtype {
        DataType::Int64 => "int64".to_string(),
        DataType::Int32 => "int32".to_string(),
        DataType::Float64 => "float64".to_string(),
        DataType::Float32 => "float32".to_string(),
        DataType::String => "object".to_string(),
        DataType::Boolean => "bool".to_string(),
        other => other.to_string().to_lowercase(),
    }
}

/// Load a `;`-delimited dataset and infer each column's dtype label, in
/// header order.
///
/// Every row takes part in inference. An integer column with empty cells is
/// labelled `float64`, the way pandas upcasts it to hold `NaN`.
pub fn infer_dtypes(path: &Path) -> Result<Vec<(String, String)>, ValidationError> {
    let load_err = |reason: String| ValidationError::Load {
        path: path.to_path_buf(),
        reason,
    };

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(CsvParseOptions::default().with_separator(b';'))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| load_err(e.to_string()))?
        .finish()
        .map_err(|e| load_err(e.to_string()))?;

    Ok(df
        .get_columns()
        .iter()
        .map(|col| {
            let label = if col.dtype().is_integer() && col.null_count() > 0 {
                "float64".to_string()
            } else {
                dtype_label(col.dtype())
            };
            (col.name().to_string(), label)
        })
        .collect())
}

/// Compare actual `(column, dtype)` pairs against the expected schema.
///
/// Reports missing and extra columns (sorted by name), then dtype mismatches
/// in dataset column order.
pub fn validate_columns(
    actual: &[(String, String)],
    schema: &BTreeMap<String, String>,
) -> ValidationReport {
    let mut issues = Vec::new();

    let actual_names: BTreeSet<&str> = actual.iter().map(|(name, _)| name.as_str()).collect();
    let expected_names: BTreeSet<&str> = schema.keys().map(String::as_str).collect();

    for missing in expected_names.difference(&actual_names) {
        issues.push(ValidationIssue::MissingColumn(missing.to_string()));
    }
    for extra in actual_names.difference(&expected_names) {
        issues.push(ValidationIssue::ExtraColumn(extra.to_string()));
    }

    for (name, actual_type) in actual {
        if let Some(expected_type) = schema.get(name) {
            if expected_type != actual_type {
                issues.push(ValidationIssue::TypeMismatch {
                    column: name.clone(),
                    expected: expected_type.clone(),
                    actual: actual_type.clone(),
                });
            }
        }
    }

    ValidationReport {
        passed: issues.is_empty(),
        issues,
    }
}

/// Validate the dataset at `path` against `schema`.
pub fn validate_dataset(
    path: &Path,
    schema: &BTreeMap<String, String>,
) -> Result<ValidationReport, ValidationError> {
    let actual = infer_dtypes(path)?;
    Ok(validate_columns(&actual, schema))
}

/// Reader/writer for the status file.
pub struct StatusFile;

impl StatusFile {
    /// Render the status file contents.
    ///
    /// Exactly one status line, then (only when there are issues) a blank
    /// line, a details header and one line per issue.
    pub fn render(report: &ValidationReport) -> String {
        let mut out = format!("{STATUS_PREFIX} {}\n", report.passed);
        if !report.issues.is_empty() {
            out.push_str("\nValidation details:\n");
            for issue in &report.issues {
                out.push_str(&issue.to_string());
                out.push('\n');
            }
        }
        out
    }

    pub fn write(path: &Path, report: &ValidationReport) -> Result<(), ValidationError> {
        let io_err = |source| ValidationError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, Self::render(report)).map_err(io_err)
    }

    /// Parse the status boolean back out of a status file.
    pub fn read(path: &Path) -> Result<bool, ValidationError> {
        let text = fs::read_to_string(path).map_err(|source| ValidationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|reason| ValidationError::MalformedStatus {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(text: &str) -> Result<bool, String> {
        let line = text
            .lines()
            .find(|l| l.trim_start().starts_with(STATUS_PREFIX))
            .ok_or_else(|| format!("no '{STATUS_PREFIX}' line"))?;
        let value = line.trim_start()[STATUS_PREFIX.len()..].trim();
        match value.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(format!("status value '{other}' is not a boolean")),
        }
    }
}
