//! Model evaluation: score the persisted model on the test partition, save
//! the metrics, and report the run to the experiment tracker.
//!
//! Failing to attach the model file to the run is logged and tolerated;
//! failing to record params or metrics fails the stage.

use tracing::{info, warn};

use winelab_core::config::ModelEvaluationConfig;
use winelab_core::metrics::RegressionMetrics;
use winelab_core::model::ModelArtifact;

use super::load_partition;
use crate::stage::{Stage, StageDetail, StageError, StageName, StageOutcome};
use crate::tracker::{ExperimentTracker, RunHandle, RunStatus, TrackerError};

pub struct ModelEvaluation {
    config: ModelEvaluationConfig,
    tracker: Box<dyn ExperimentTracker>,
    run_name: Option<String>,
}

impl ModelEvaluation {
    pub fn new(config: ModelEvaluationConfig, tracker: Box<dyn ExperimentTracker>) -> Self {
        Self {
            config,
            tracker,
            run_name: None,
        }
    }

    pub fn with_run_name(mut self, run_name: Option<String>) -> Self {
        self.run_name = run_name;
        self
    }

    fn log_scores(
        &self,
        run: &mut RunHandle,
        metrics: &RegressionMetrics,
    ) -> Result<(), TrackerError> {
        self.tracker.log_params(run, &self.config.all_params)?;
        self.tracker.log_metrics(run, &metrics.as_pairs())
    }

    fn track(&self, metrics: &RegressionMetrics) -> Result<String, StageError> {
        let mut run = self.tracker.start_run(self.run_name.as_deref())?;

        if let Err(e) = self.log_scores(&mut run, metrics) {
            let run_id = run.run_id.clone();
            if let Err(end_err) = self.tracker.end_run(run, RunStatus::Failed) {
                warn!(run_id, error = %end_err, "could not close failed run");
            }
            return Err(e.into());
        }

        match self.tracker.log_model(&mut run, &self.config.model_path) {
            Ok(()) => info!(run_id = %run.run_id, "model logged successfully"),
            Err(e) => warn!(
                run_id = %run.run_id,
                error = %e,
                "error while logging model, continuing with metric logging"
            ),
        }

        let run_id = run.run_id.clone();
        self.tracker.end_run(run, RunStatus::Finished)?;
        Ok(run_id)
    }
}

impl Stage for ModelEvaluation {
    fn name(&self) -> StageName {
        StageName::Evaluation
    }

    fn run(&mut self) -> Result<StageOutcome, StageError> {
        let test = load_partition(&self.config.test_data_path, &self.config.target_column)?;
        let artifact = ModelArtifact::load(&self.config.model_path)?;
        if artifact.feature_names != test.feature_names {
            return Err(StageError::FeatureMismatch {
                expected: artifact.feature_names,
                found: test.feature_names,
            });
        }

        let predicted = artifact.model.predict(&test.x)?;
        let metrics = RegressionMetrics::compute(&test.y, &predicted)?;
        metrics.save_json(&self.config.metrics_file_name)?;
        info!(
            rmse = metrics.rmse,
            mae = metrics.mae,
            r2 = metrics.r2,
            path = %self.config.metrics_file_name.display(),
            "metrics saved"
        );

        let run_id = self.track(&metrics)?;
        info!(tracker = self.tracker.name(), run_id, "evaluation tracked");

        Ok(StageOutcome::new(
            StageName::Evaluation,
            StageDetail::Evaluated {
                metrics,
                metrics_path: self.config.metrics_file_name.clone(),
                run_id: Some(run_id),
            },
        ))
    }
}
