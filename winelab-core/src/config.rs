//! Typed pipeline configuration.
//!
//! Three YAML documents feed the pipeline:
//! - `config/config.yaml`: artifact paths for every stage, plus tracking
//! - `params.yaml`: ElasticNet hyperparameters and the train/test split policy
//! - `schema.yaml`: expected column → dtype mapping and the target column
//!
//! Every struct denies unknown fields, so a typo in a key fails at load time
//! instead of at first access. `ConfigurationManager` loads the three files
//! once and hands out immutable per-stage records.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default location of the pipeline paths file.
pub const CONFIG_FILE_PATH: &str = "config/config.yaml";
/// Default location of the hyperparameter file.
pub const PARAMS_FILE_PATH: &str = "params.yaml";
/// Default location of the dataset schema file.
pub const SCHEMA_FILE_PATH: &str = "schema.yaml";

/// Environment variable overriding `tracking.uri`.
pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";
const TRACKING_USERNAME_ENV: &str = "MLFLOW_TRACKING_USERNAME";
const TRACKING_PASSWORD_ENV: &str = "MLFLOW_TRACKING_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at: {}", .0.display())]
    NotFound(PathBuf),

    #[error("yaml file is empty: {}", .0.display())]
    Empty(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid yaml in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Locations of the three configuration documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub config: PathBuf,
    pub params: PathBuf,
    pub schema: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            config: PathBuf::from(CONFIG_FILE_PATH),
            params: PathBuf::from(PARAMS_FILE_PATH),
            schema: PathBuf::from(SCHEMA_FILE_PATH),
        }
    }
}

// ─── File layouts ────────────────────────────────────────────────────

/// `config/config.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineFile {
    pub artifacts_root: PathBuf,
    pub data_ingestion: DataIngestionConfig,
    pub data_validation: DataValidationSection,
    pub data_transformation: DataTransformationSection,
    pub model_trainer: ModelTrainerSection,
    pub model_evaluation: ModelEvaluationSection,
    #[serde(default)]
    pub tracking: TrackingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataValidationSection {
    pub root_dir: PathBuf,
    pub unzip_data_dir: PathBuf,
    #[serde(rename = "STATUS_FILE")]
    pub status_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataTransformationSection {
    pub root_dir: PathBuf,
    pub data_path: PathBuf,
    /// Gate file to consult. Defaults to the validation stage's `STATUS_FILE`.
    #[serde(default)]
    pub status_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelTrainerSection {
    pub root_dir: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    pub model_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEvaluationSection {
    pub root_dir: PathBuf,
    pub test_data_path: PathBuf,
    pub model_path: PathBuf,
    pub metrics_file_name: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingSection {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub run_name: Option<String>,
}

/// `params.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Params {
    #[serde(rename = "ElasticNet")]
    pub elastic_net: ElasticNetParams,
    #[serde(rename = "TrainTestSplit", default)]
    pub split: SplitParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElasticNetParams {
    pub alpha: f64,
    pub l1_ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iter: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tol: Option<f64>,
}

impl ElasticNetParams {
    /// Flat name → value map, as reported to the experiment tracker.
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("alpha".to_string(), self.alpha);
        map.insert("l1_ratio".to_string(), self.l1_ratio);
        if let Some(max_iter) = self.max_iter {
            map.insert("max_iter".to_string(), max_iter as f64);
        }
        if let Some(tol) = self.tol {
            map.insert("tol".to_string(), tol);
        }
        map
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitParams {
    pub test_size: f64,
    pub seed: u64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            seed: 42,
        }
    }
}

/// `schema.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    #[serde(rename = "COLUMNS")]
    pub columns: BTreeMap<String, String>,
    #[serde(rename = "TARGET_COLUMN")]
    pub target_column: TargetColumn,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetColumn {
    pub name: String,
}

// ─── Per-stage records ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataIngestionConfig {
    pub root_dir: PathBuf,
    #[serde(rename = "source_URL")]
    pub source_url: String,
    pub local_data_file: PathBuf,
    pub unzip_dir: PathBuf,
    /// HTTP timeout for the archive download.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub root_dir: PathBuf,
    pub unzip_data_dir: PathBuf,
    pub status_file: PathBuf,
    pub all_schema: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub root_dir: PathBuf,
    pub data_path: PathBuf,
    pub status_file: PathBuf,
    pub split: SplitParams,
}

#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub root_dir: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    pub model_name: String,
    pub alpha: f64,
    pub l1_ratio: f64,
    pub max_iter: Option<usize>,
    pub tol: Option<f64>,
    pub target_column: String,
}

impl ModelTrainerConfig {
    /// Where the fitted model artifact is written.
    pub fn model_path(&self) -> PathBuf {
        self.root_dir.join(&self.model_name)
    }
}

#[derive(Debug, Clone)]
pub struct ModelEvaluationConfig {
    pub root_dir: PathBuf,
    pub test_data_path: PathBuf,
    pub model_path: PathBuf,
    pub metrics_file_name: PathBuf,
    pub all_params: BTreeMap<String, f64>,
    pub target_column: String,
}

/// Experiment tracker settings after environment overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingConfig {
    /// `http(s)://` selects a remote MLflow server; anything else is a local
    /// directory (an optional `file://` prefix is stripped). `None` means the
    /// default local store.
    pub uri: Option<String>,
    pub experiment_id: String,
    pub run_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

// ─── Manager ─────────────────────────────────────────────────────────

/// Loads the configuration documents once and builds per-stage records.
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    config: PipelineFile,
    params: Params,
    schema: SchemaFile,
}

impl ConfigurationManager {
    /// Load all three documents and create the artifacts root.
    pub fn new(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        debug!(path = %paths.config.display(), "config file path");
        debug!(path = %paths.params.display(), "params file path");
        debug!(path = %paths.schema.display(), "schema file path");

        let config: PipelineFile = read_yaml(&paths.config)?;
        let params: Params = read_yaml(&paths.params)?;
        let schema: SchemaFile = read_yaml(&paths.schema)?;

        let manager = Self::from_parts(config, params, schema)?;
        create_directories(&[manager.config.artifacts_root.clone()])?;
        Ok(manager)
    }

    /// Build a manager from already-parsed documents (no filesystem access).
    pub fn from_parts(
        config: PipelineFile,
        params: Params,
        schema: SchemaFile,
    ) -> Result<Self, ConfigError> {
        if !schema.columns.contains_key(&schema.target_column.name) {
            return Err(ConfigError::Invalid(format!(
                "target column '{}' is not listed in COLUMNS",
                schema.target_column.name
            )));
        }
        let split = params.split;
        if !(split.test_size > 0.0 && split.test_size < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "TrainTestSplit.test_size must be in (0, 1), got {}",
                split.test_size
            )));
        }
        Ok(Self {
            config,
            params,
            schema,
        })
    }

    pub fn artifacts_root(&self) -> &Path {
        &self.config.artifacts_root
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn schema(&self) -> &SchemaFile {
        &self.schema
    }

    pub fn target_column(&self) -> &str {
        &self.schema.target_column.name
    }

    pub fn data_ingestion_config(&self) -> Result<DataIngestionConfig, ConfigError> {
        let config = self.config.data_ingestion.clone();
        create_directories(&[config.root_dir.clone()])?;
        Ok(config)
    }

    pub fn data_validation_config(&self) -> Result<DataValidationConfig, ConfigError> {
        let section = &self.config.data_validation;
        create_directories(&[section.root_dir.clone()])?;
        Ok(DataValidationConfig {
            root_dir: section.root_dir.clone(),
            unzip_data_dir: section.unzip_data_dir.clone(),
            status_file: section.status_file.clone(),
            all_schema: self.schema.columns.clone(),
        })
    }

    pub fn data_transformation_config(&self) -> Result<DataTransformationConfig, ConfigError> {
        let section = &self.config.data_transformation;
        create_directories(&[section.root_dir.clone()])?;
        let status_file = section
            .status_file
            .clone()
            .unwrap_or_else(|| self.config.data_validation.status_file.clone());
        Ok(DataTransformationConfig {
            root_dir: section.root_dir.clone(),
            data_path: section.data_path.clone(),
            status_file,
            split: self.params.split,
        })
    }

    pub fn model_trainer_config(&self) -> Result<ModelTrainerConfig, ConfigError> {
        let section = &self.config.model_trainer;
        create_directories(&[section.root_dir.clone()])?;
        let params = &self.params.elastic_net;
        Ok(ModelTrainerConfig {
            root_dir: section.root_dir.clone(),
            train_data_path: section.train_data_path.clone(),
            test_data_path: section.test_data_path.clone(),
            model_name: section.model_name.clone(),
            alpha: params.alpha,
            l1_ratio: params.l1_ratio,
            max_iter: params.max_iter,
            tol: params.tol,
            target_column: self.schema.target_column.name.clone(),
        })
    }

    pub fn model_evaluation_config(&self) -> Result<ModelEvaluationConfig, ConfigError> {
        let section = &self.config.model_evaluation;
        create_directories(&[section.root_dir.clone()])?;
        Ok(ModelEvaluationConfig {
            root_dir: section.root_dir.clone(),
            test_data_path: section.test_data_path.clone(),
            model_path: section.model_path.clone(),
            metrics_file_name: section.metrics_file_name.clone(),
            all_params: self.params.elastic_net.as_map(),
            target_column: self.schema.target_column.name.clone(),
        })
    }

    /// Tracker settings, with `MLFLOW_TRACKING_*` environment variables taking
    /// precedence over the file.
    pub fn tracking_config(&self) -> TrackingConfig {
        self.tracking_config_with(|key| std::env::var(key).ok())
    }

    fn tracking_config_with<F>(&self, env: F) -> TrackingConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = &self.config.tracking;
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        TrackingConfig {
            uri: non_empty(env(TRACKING_URI_ENV)).or_else(|| section.uri.clone()),
            experiment_id: section
                .experiment_id
                .clone()
                .unwrap_or_else(|| "0".to_string()),
            run_name: section.run_name.clone(),
            username: non_empty(env(TRACKING_USERNAME_ENV)),
            password: non_empty(env(TRACKING_PASSWORD_ENV)),
        }
    }
}

// ─── File helpers ────────────────────────────────────────────────────

/// Read and deserialize a YAML document.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(ConfigError::Empty(path.to_path_buf()));
    }
    let value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "yaml file loaded");
    Ok(value)
}

/// Create each directory (and its parents) if missing.
pub fn create_directories(paths: &[PathBuf]) -> Result<(), ConfigError> {
    for path in paths {
        fs::create_dir_all(path).map_err(|source| ConfigError::CreateDir {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "created directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG_YAML: &str = r#"
artifacts_root: artifacts
data_ingestion:
  root_dir: artifacts/data_ingestion
  source_URL: https://example.com/data.zip
  local_data_file: artifacts/data_ingestion/data.zip
  unzip_dir: artifacts/data_ingestion
data_validation:
  root_dir: artifacts/data_validation
  unzip_data_dir: artifacts/data_ingestion/winequality-red.csv
  STATUS_FILE: artifacts/data_validation/status.txt
data_transformation:
  root_dir: artifacts/data_transformation
  data_path: artifacts/data_ingestion/winequality-red.csv
model_trainer:
  root_dir: artifacts/model_trainer
  train_data_path: artifacts/data_transformation/train.csv
  test_data_path: artifacts/data_transformation/test.csv
  model_name: model.bin
model_evaluation:
  root_dir: artifacts/model_evaluation
  test_data_path: artifacts/data_transformation/test.csv
  model_path: artifacts/model_trainer/model.bin
  metrics_file_name: artifacts/model_evaluation/metrics.json
"#;

    const PARAMS_YAML: &str = r#"
ElasticNet:
  alpha: 0.2
  l1_ratio: 0.1
"#;

    const SCHEMA_YAML: &str = r#"
COLUMNS:
  fixed acidity: float64
  quality: int64
TARGET_COLUMN:
  name: quality
"#;

    fn manager() -> ConfigurationManager {
        ConfigurationManager::from_parts(
            serde_yaml::from_str(CONFIG_YAML).unwrap(),
            serde_yaml::from_str(PARAMS_YAML).unwrap(),
            serde_yaml::from_str(SCHEMA_YAML).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn parses_all_three_documents() {
        let m = manager();
        assert_eq!(m.artifacts_root(), Path::new("artifacts"));
        assert_eq!(m.target_column(), "quality");
        assert_eq!(m.params().elastic_net.alpha, 0.2);
        assert_eq!(m.params().split, SplitParams::default());
    }

    #[test]
    fn source_url_uses_original_key() {
        let m = manager();
        assert_eq!(
            m.config.data_ingestion.source_url,
            "https://example.com/data.zip"
        );
        assert_eq!(m.config.data_ingestion.timeout_secs, 60);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let yaml = PARAMS_YAML.replace("l1_ratio", "l1_ration");
        let result: Result<Params, _> = serde_yaml::from_str(&yaml);
        assert!(result.is_err());
    }

    #[test]
    fn missing_key_is_rejected() {
        let yaml = CONFIG_YAML.replace("  model_name: model.bin\n", "");
        let result: Result<PipelineFile, _> = serde_yaml::from_str(&yaml);
        assert!(result.is_err());
    }

    #[test]
    fn target_must_be_in_schema() {
        let schema: SchemaFile =
            serde_yaml::from_str(&SCHEMA_YAML.replace("name: quality", "name: rating")).unwrap();
        let result = ConfigurationManager::from_parts(
            serde_yaml::from_str(CONFIG_YAML).unwrap(),
            serde_yaml::from_str(PARAMS_YAML).unwrap(),
            schema,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn split_ratio_out_of_range_is_rejected() {
        let params: Params = serde_yaml::from_str(&format!(
            "{PARAMS_YAML}TrainTestSplit:\n  test_size: 1.5\n  seed: 7\n"
        ))
        .unwrap();
        let result = ConfigurationManager::from_parts(
            serde_yaml::from_str(CONFIG_YAML).unwrap(),
            params,
            serde_yaml::from_str(SCHEMA_YAML).unwrap(),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn evaluation_record_carries_all_params() {
        let m = manager();
        let all = m.params().elastic_net.as_map();
        assert_eq!(all.len(), 2);
        assert_eq!(all["alpha"], 0.2);
        assert_eq!(all["l1_ratio"], 0.1);
    }

    #[test]
    fn transformation_gate_defaults_to_validation_status_file() {
        let tmp = TempDir::new().unwrap();
        let yaml = CONFIG_YAML.replace(
            "root_dir: artifacts/data_transformation",
            &format!("root_dir: {}", tmp.path().join("dt").display()),
        );
        let m = ConfigurationManager::from_parts(
            serde_yaml::from_str(&yaml).unwrap(),
            serde_yaml::from_str(PARAMS_YAML).unwrap(),
            serde_yaml::from_str(SCHEMA_YAML).unwrap(),
        )
        .unwrap();
        let dt = m.data_transformation_config().unwrap();
        assert_eq!(
            dt.status_file,
            PathBuf::from("artifacts/data_validation/status.txt")
        );
        assert!(tmp.path().join("dt").is_dir());
    }

    #[test]
    fn env_overrides_tracking_uri() {
        let m = manager();
        let tracking = m.tracking_config_with(|key| match key {
            TRACKING_URI_ENV => Some("http://localhost:5000".to_string()),
            _ => None,
        });
        assert_eq!(tracking.uri.as_deref(), Some("http://localhost:5000"));
        assert_eq!(tracking.experiment_id, "0");
        assert!(tracking.username.is_none());
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let result: Result<Params, _> = read_yaml(&tmp.path().join("nope.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn empty_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.yaml");
        fs::write(&path, "   \n").unwrap();
        let result: Result<Params, _> = read_yaml(&path);
        assert!(matches!(result, Err(ConfigError::Empty(_))));
    }

    #[test]
    fn create_directories_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/c");
        create_directories(&[dir.clone()]).unwrap();
        create_directories(&[dir.clone()]).unwrap();
        assert!(dir.is_dir());
    }
}
