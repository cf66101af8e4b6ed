//! Stage contract shared by the five pipeline steps.
//!
//! Every stage returns the same `Result<StageOutcome, StageError>`, so the
//! orchestrator can apply one failure policy to all of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use winelab_core::config::ConfigError;
use winelab_core::data::{IngestError, ParseError, SplitError, ValidationError};
use winelab_core::metrics::{MetricsError, RegressionMetrics};
use winelab_core::model::{ArtifactError, ModelError};

use crate::tracker::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Ingestion,
    Validation,
    Transformation,
    Training,
    Evaluation,
}

impl StageName {
    /// Execution order.
    pub const ALL: [StageName; 5] = [
        StageName::Ingestion,
        StageName::Validation,
        StageName::Transformation,
        StageName::Training,
        StageName::Evaluation,
    ];

    /// Name used in log banners.
    pub fn label(self) -> &'static str {
        match self {
            StageName::Ingestion => "Data Ingestion stage",
            StageName::Validation => "Data Validation stage",
            StageName::Transformation => "Data Transformation stage",
            StageName::Training => "Model Training stage",
            StageName::Evaluation => "Model Evaluation stage",
        }
    }

    /// Short name accepted on the command line.
    pub fn short(self) -> &'static str {
        match self {
            StageName::Ingestion => "ingest",
            StageName::Validation => "validate",
            StageName::Transformation => "transform",
            StageName::Training => "train",
            StageName::Evaluation => "evaluate",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        StageName::ALL
            .into_iter()
            .find(|stage| {
                stage.short() == s || format!("{stage:?}").to_ascii_lowercase() == s
            })
            .ok_or_else(|| {
                format!("unknown stage '{s}' (expected ingest, validate, transform, train or evaluate)")
            })
    }
}

/// Stage-specific result detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageDetail {
    Ingested {
        archive: PathBuf,
        files: Vec<PathBuf>,
    },
    Validated {
        passed: bool,
        issues: Vec<String>,
        status_file: PathBuf,
    },
    Split {
        train_rows: usize,
        test_rows: usize,
        train_path: PathBuf,
        test_path: PathBuf,
    },
    Trained {
        model_path: PathBuf,
        rows: usize,
        dropped_rows: usize,
        features: usize,
    },
    Evaluated {
        metrics: RegressionMetrics,
        metrics_path: PathBuf,
        run_id: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: StageName,
    pub detail: StageDetail,
}

impl StageOutcome {
    pub fn new(stage: StageName, detail: StageDetail) -> Self {
        Self { stage, detail }
    }

    /// One-line human summary for the report.
    pub fn summary(&self) -> String {
        match &self.detail {
            StageDetail::Ingested { files, .. } => format!("extracted {} file(s)", files.len()),
            StageDetail::Validated { passed, issues, .. } => {
                if *passed {
                    "schema valid".to_string()
                } else {
                    format!("schema invalid ({} issue(s))", issues.len())
                }
            }
            StageDetail::Split {
                train_rows,
                test_rows,
                ..
            } => format!("{train_rows} train rows, {test_rows} test rows"),
            StageDetail::Trained {
                rows, dropped_rows, ..
            } => format!("fitted on {rows} rows ({dropped_rows} dropped)"),
            StageDetail::Evaluated { metrics, .. } => format!(
                "rmse={:.4} mae={:.4} r2={:.4}",
                metrics.rmse, metrics.mae, metrics.r2
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("data validation did not pass ({}): {reason}", status_file.display())]
    GateClosed { status_file: PathBuf, reason: String },

    #[error("parse error in {}: {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },

    #[error("split error: {0}")]
    Split(#[from] SplitError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("feature mismatch: model expects {expected:?}, data has {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl StageError {
    pub(crate) fn parse(path: &std::path::Path, source: ParseError) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One step of the training pipeline.
pub trait Stage {
    fn name(&self) -> StageName;

    /// Execute the stage once.
    fn run(&mut self) -> Result<StageOutcome, StageError>;
}
