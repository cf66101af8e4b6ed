//! WineLab Runner: stages, orchestration, experiment tracking, prediction.
//!
//! This crate builds on `winelab-core` to provide:
//! - The `Stage` contract and the five training stages
//! - The pipeline orchestrator with its central failure policy
//! - Experiment trackers (local JSONL store, MLflow REST)
//! - Prediction with a persisted model

pub mod pipeline;
pub mod predict;
pub mod stage;
pub mod stages;
pub mod tracker;

pub use pipeline::{FailurePolicy, Pipeline, PipelineError, PipelineReport, StageStatus};
pub use predict::{PredictError, PredictionPipeline};
pub use stage::{Stage, StageDetail, StageError, StageName, StageOutcome};
pub use tracker::{
    tracker_from_config, ExperimentTracker, LocalTracker, MlflowTracker, RunHandle, RunRecord,
    RunStatus, TrackerError,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<PipelineReport>();
        assert_sync::<PipelineReport>();
        assert_send::<StageOutcome>();
        assert_sync::<StageOutcome>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
        assert_send::<PredictError>();
        assert_sync::<PredictError>();
    }

    #[test]
    fn run_records_are_send_sync() {
        assert_send::<RunHandle>();
        assert_sync::<RunHandle>();
        assert_send::<RunRecord>();
        assert_sync::<RunRecord>();
    }
}
