//! Prediction with a persisted model.
//!
//! Input files go through the same parser as training. Columns are matched
//! to the model by name, so column order in the input does not matter, and a
//! target column, if present, is ignored.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use winelab_core::data::{ParseError, Table};
use winelab_core::model::{ArtifactError, ModelArtifact, ModelError};

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("parse error in {}: {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("input has no column '{0}' required by the model")]
    MissingFeature(String),
}

pub struct PredictionPipeline {
    artifact: ModelArtifact,
}

impl PredictionPipeline {
    pub fn load(model_path: &Path) -> Result<Self, PredictError> {
        let artifact = ModelArtifact::load(model_path)?;
        info!(
            path = %model_path.display(),
            features = artifact.feature_names.len(),
            trained_at = %artifact.trained_at,
            "model loaded"
        );
        Ok(Self { artifact })
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    /// Predict rows already in model feature order.
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, PredictError> {
        Ok(self.artifact.model.predict(rows)?)
    }

    /// One prediction per data row of the file; `None` where the row has a
    /// missing or malformed feature value.
    pub fn predict_file(&self, path: &Path) -> Result<Vec<Option<f64>>, PredictError> {
        let parse_err = |source| PredictError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let table = Table::read(path).map_err(parse_err)?;
        let target = self.artifact.target_name.as_str();
        let target = table.column_index(target).map(|_| target);
        let frame = table.into_frame(target).map_err(parse_err)?;

        let positions = self
            .artifact
            .feature_names
            .iter()
            .map(|name| {
                frame
                    .feature_names
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| PredictError::MissingFeature(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if positions.len() < frame.feature_names.len() {
            debug!(
                extra = frame.feature_names.len() - positions.len(),
                "ignoring input columns unknown to the model"
            );
        }

        let mut predictions = Vec::with_capacity(frame.len());
        let mut skipped = 0;
        for row in &frame.features {
            let ordered: Option<Vec<f64>> = positions.iter().map(|&i| row[i]).collect();
            match ordered {
                Some(values) => predictions.push(Some(self.artifact.model.predict_one(&values)?)),
                None => {
                    skipped += 1;
                    predictions.push(None);
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "rows with missing values were not predicted");
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use winelab_core::model::ElasticNet;

    fn pipeline() -> PredictionPipeline {
        // quality = 2a + b
        let x = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0], vec![2.0, 3.0]];
        let y = vec![2.0, 1.0, 3.0, 7.0];
        let mut model = ElasticNet::new(1e-8, 0.5).with_tol(1e-12).with_max_iter(50_000);
        model.fit(&x, &y).unwrap();
        PredictionPipeline::from_artifact(ModelArtifact::new(
            vec!["a".into(), "b".into()],
            "quality".into(),
            model,
        ))
    }

    #[test]
    fn predict_rows_in_feature_order() {
        let preds = pipeline().predict_rows(&[vec![3.0, 1.0]]).unwrap();
        assert!((preds[0] - 7.0).abs() < 1e-3);
    }

    #[test]
    fn file_columns_are_matched_by_name_and_target_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("input.csv");
        fs::write(&path, "\"b\";\"quality\";\"a\"\n1;9;3\n;9;1\n").unwrap();

        let preds = pipeline().predict_file(&path).unwrap();
        assert_eq!(preds.len(), 2);
        assert!((preds[0].unwrap() - 7.0).abs() < 1e-3);
        assert_eq!(preds[1], None);
    }

    #[test]
    fn missing_feature_column_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("input.csv");
        fs::write(&path, "a\n1\n").unwrap();
        assert!(matches!(
            pipeline().predict_file(&path),
            Err(PredictError::MissingFeature(name)) if name == "b"
        ));
    }

    #[test]
    fn load_round_trips_through_artifact_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("model.bin");
        pipeline().artifact.save(&path).unwrap();
        let loaded = PredictionPipeline::load(&path).unwrap();
        assert_eq!(loaded.feature_names(), ["a".to_string(), "b".to_string()]);
    }
}
