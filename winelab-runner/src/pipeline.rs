//! Pipeline orchestrator.
//!
//! Runs stages in order, each exactly once, inside its own tracing span. What
//! happens after a failure is decided here and nowhere else: every stage has
//! a `FailurePolicy`, and an `Abort` marks the remaining stages as skipped.
//! The run is summarized in a `PipelineReport`, optionally written as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, info_span, warn};

use winelab_core::config::{ConfigError, ConfigurationManager};

use crate::stage::{Stage, StageDetail, StageError, StageName, StageOutcome};
use crate::stages::{
    DataIngestion, DataTransformation, DataValidation, ModelEvaluation, ModelTrainer,
};
use crate::tracker::{tracker_from_config, TrackerError};

/// File name of the report under the artifacts root.
pub const REPORT_FILE: &str = "pipeline_report.json";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("stage setup failed: {0}")]
    Setup(#[from] StageError),

    #[error("tracker setup failed: {0}")]
    Tracker(#[from] TrackerError),

    #[error("{stage} failed: {source}")]
    StageFailed {
        stage: StageName,
        #[source]
        source: StageError,
        report: Box<PipelineReport>,
    },

    #[error("failed to write pipeline report {}: {reason}", path.display())]
    Report { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the pipeline; later stages are skipped.
    Abort,
    /// Record the failure and keep going.
    Continue,
}

impl FailurePolicy {
    /// Validation continues because Transformation enforces its gate.
    pub fn default_for(stage: StageName) -> Self {
        match stage {
            StageName::Validation => FailurePolicy::Continue,
            _ => FailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageName,
    pub status: StageStatus,
    pub duration_ms: u64,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<StageDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::Succeeded)
    }

    pub fn status_of(&self, stage: StageName) -> Option<StageStatus> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| s.status)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), PipelineError> {
        let report_err = |reason: String| PipelineError::Report {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| report_err(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| report_err(e.to_string()))?;
        fs::write(path, json).map_err(|e| report_err(e.to_string()))
    }
}

/// Ordered list of stages plus the failure policy.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    policies: BTreeMap<StageName, FailurePolicy>,
    report_path: Option<PathBuf>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            policies: BTreeMap::new(),
            report_path: None,
        }
    }

    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_policy(mut self, stage: StageName, policy: FailurePolicy) -> Self {
        self.policies.insert(stage, policy);
        self
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    pub fn policy_for(&self, stage: StageName) -> FailurePolicy {
        self.policies
            .get(&stage)
            .copied()
            .unwrap_or_else(|| FailurePolicy::default_for(stage))
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Build the selected stages (all five when `selection` is empty) from
    /// configuration. The report goes to `<artifacts_root>/pipeline_report.json`.
    pub fn from_config(
        manager: &ConfigurationManager,
        selection: &[StageName],
    ) -> Result<Self, PipelineError> {
        let wanted = |stage: StageName| selection.is_empty() || selection.contains(&stage);
        let mut pipeline =
            Pipeline::new().with_report_path(manager.artifacts_root().join(REPORT_FILE));

        for stage in StageName::ALL {
            if !wanted(stage) {
                continue;
            }
            let built: Box<dyn Stage> = match stage {
                StageName::Ingestion => {
                    Box::new(DataIngestion::over_http(manager.data_ingestion_config()?)?)
                }
                StageName::Validation => {
                    Box::new(DataValidation::new(manager.data_validation_config()?))
                }
                StageName::Transformation => {
                    Box::new(DataTransformation::new(manager.data_transformation_config()?))
                }
                StageName::Training => Box::new(ModelTrainer::new(manager.model_trainer_config()?)),
                StageName::Evaluation => {
                    let tracking = manager.tracking_config();
                    let tracker = tracker_from_config(&tracking)?;
                    Box::new(
                        ModelEvaluation::new(manager.model_evaluation_config()?, tracker)
                            .with_run_name(tracking.run_name.clone()),
                    )
                }
            };
            pipeline = pipeline.with_stage(built);
        }
        Ok(pipeline)
    }

    /// Run every stage once, in order.
    pub fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(self.stages.len());
        let mut aborted: Option<(StageName, StageError)> = None;

        let policies: Vec<FailurePolicy> =
            self.stages.iter().map(|s| self.policy_for(s.name())).collect();

        for (stage, policy) in self.stages.iter_mut().zip(policies) {
            let name = stage.name();
            if let Some((failed, _)) = &aborted {
                info!(stage = name.short(), after = failed.short(), "stage skipped");
                reports.push(StageReport {
                    stage: name,
                    status: StageStatus::Skipped,
                    duration_ms: 0,
                    summary: format!("skipped after {failed} failed"),
                    detail: None,
                    error: None,
                });
                continue;
            }

            let span = info_span!("stage", stage = name.short());
            let _enter = span.enter();
            info!(">>>>>> stage {name} started <<<<<<");
            let start = Instant::now();
            let result = stage.run();
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(outcome) => {
                    info!(duration_ms, ">>>>>> stage {name} completed <<<<<<");
                    reports.push(succeeded(outcome, duration_ms));
                }
                Err(e) => {
                    error!(error = %e, duration_ms, "stage {name} failed");
                    reports.push(StageReport {
                        stage: name,
                        status: StageStatus::Failed,
                        duration_ms,
                        summary: "failed".to_string(),
                        detail: None,
                        error: Some(e.to_string()),
                    });
                    match policy {
                        FailurePolicy::Abort => aborted = Some((name, e)),
                        FailurePolicy::Continue => {
                            warn!("continuing after {name} failure");
                        }
                    }
                }
            }
        }

        let report = PipelineReport {
            started_at,
            finished_at: Utc::now(),
            stages: reports,
        };
        if let Some(path) = &self.report_path {
            match report.write_json(path) {
                Ok(()) => info!(path = %path.display(), "pipeline report written"),
                // the stage failure is the error worth surfacing
                Err(e) if aborted.is_some() => warn!(error = %e, "pipeline report not written"),
                Err(e) => return Err(e),
            }
        }

        match aborted {
            Some((stage, source)) => Err(PipelineError::StageFailed {
                stage,
                source,
                report: Box::new(report),
            }),
            None => Ok(report),
        }
    }
}

fn succeeded(outcome: StageOutcome, duration_ms: u64) -> StageReport {
    if let StageDetail::Validated { passed: false, .. } = &outcome.detail {
        warn!("data validation did not pass; transformation gate is closed");
    }
    StageReport {
        stage: outcome.stage,
        status: StageStatus::Succeeded,
        duration_ms,
        summary: outcome.summary(),
        detail: Some(outcome.detail),
        error: None,
    }
}
