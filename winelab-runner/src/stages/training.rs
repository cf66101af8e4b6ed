//! Model training: fit ElasticNet on the train partition and persist it.

use tracing::info;

use winelab_core::config::ModelTrainerConfig;
use winelab_core::model::{ElasticNet, ModelArtifact};

use super::load_partition;
use crate::stage::{Stage, StageDetail, StageError, StageName, StageOutcome};

pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    fn model(&self) -> ElasticNet {
        let mut model = ElasticNet::new(self.config.alpha, self.config.l1_ratio);
        if let Some(max_iter) = self.config.max_iter {
            model = model.with_max_iter(max_iter);
        }
        if let Some(tol) = self.config.tol {
            model = model.with_tol(tol);
        }
        model
    }
}

impl Stage for ModelTrainer {
    fn name(&self) -> StageName {
        StageName::Training
    }

    fn run(&mut self) -> Result<StageOutcome, StageError> {
        let target = &self.config.target_column;
        let train = load_partition(&self.config.train_data_path, target)?;
        let test = load_partition(&self.config.test_data_path, target)?;
        if test.feature_names != train.feature_names {
            return Err(StageError::FeatureMismatch {
                expected: train.feature_names,
                found: test.feature_names,
            });
        }

        if let Some(kind) = train.target_kind {
            info!(target_column = %target, ?kind, "target column kind");
        }

        let mut model = self.model();
        model.fit(&train.x, &train.y)?;
        if let Some(fitted) = &model.fitted {
            info!(
                iterations = fitted.n_iter,
                converged = fitted.converged,
                intercept = fitted.intercept,
                "elastic net fitted"
            );
        }

        let features = train.feature_names.len();
        let artifact = ModelArtifact::new(train.feature_names, target.clone(), model);
        let model_path = self.config.model_path();
        artifact.save(&model_path)?;
        info!(path = %model_path.display(), "model training completed");

        Ok(StageOutcome::new(
            StageName::Training,
            StageDetail::Trained {
                model_path,
                rows: train.x.len(),
                dropped_rows: train.dropped,
                features,
            },
        ))
    }
}
