//! Shared fixtures: a zipped two-column wine dataset, a local fetcher, and a
//! configuration rooted in a temp directory.

#![allow(dead_code)]

use std::cell::Cell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use winelab_core::config::{ConfigurationManager, Params, PipelineFile, SchemaFile};
use winelab_core::data::{Fetcher, IngestError};

pub const DATA_FILE: &str = "winequality-red.csv";

/// `;`-delimited dataset where quality tracks x closely.
pub fn dataset_text(rows: usize) -> String {
    let mut text = String::from("\"x\";\"quality\"\n");
    for i in 0..rows {
        let x = i as f64 * 0.1;
        let quality = (3.0 + x * 0.5 + if i % 3 == 0 { 0.4 } else { 0.0 }).round() as i64;
        text.push_str(&format!("{x:.2};{quality}\n"));
    }
    text
}

pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Copies a local file into place, counting calls. Each call may serve a
/// different payload file.
pub struct LocalFetcher {
    pub payloads: Vec<PathBuf>,
    pub calls: Rc<Cell<usize>>,
}

impl LocalFetcher {
    pub fn new(payloads: Vec<PathBuf>) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Self {
                payloads,
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl Fetcher for LocalFetcher {
    fn name(&self) -> &str {
        "local-file"
    }

    fn fetch(&self, _url: &str, dest: &Path) -> Result<u64, IngestError> {
        let n = self.calls.get();
        self.calls.set(n + 1);
        let source = &self.payloads[n.min(self.payloads.len() - 1)];
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| IngestError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::copy(source, dest).map_err(|e| IngestError::Io {
            path: source.clone(),
            source: e,
        })
    }
}

pub fn config_yaml(root: &Path) -> String {
    let a = root.join("artifacts");
    format!(
        r#"
artifacts_root: {a}
data_ingestion:
  root_dir: {a}/data_ingestion
  source_URL: https://example.com/winequality.zip
  local_data_file: {a}/data_ingestion/data.zip
  unzip_dir: {a}/data_ingestion
data_validation:
  root_dir: {a}/data_validation
  unzip_data_dir: {a}/data_ingestion/{DATA_FILE}
  STATUS_FILE: {a}/data_validation/status.txt
data_transformation:
  root_dir: {a}/data_transformation
  data_path: {a}/data_ingestion/{DATA_FILE}
model_trainer:
  root_dir: {a}/model_trainer
  train_data_path: {a}/data_transformation/train.csv
  test_data_path: {a}/data_transformation/test.csv
  model_name: model.bin
model_evaluation:
  root_dir: {a}/model_evaluation
  test_data_path: {a}/data_transformation/test.csv
  model_path: {a}/model_trainer/model.bin
  metrics_file_name: {a}/model_evaluation/metrics.json
tracking:
  uri: {root}/mlruns
  experiment_id: "0"
"#,
        a = a.display(),
        root = root.display(),
    )
}

pub const PARAMS_YAML: &str = r#"
ElasticNet:
  alpha: 0.2
  l1_ratio: 0.5
TrainTestSplit:
  test_size: 0.2
  seed: 42
"#;

pub const SCHEMA_YAML: &str = r#"
COLUMNS:
  x: float64
  quality: int64
TARGET_COLUMN:
  name: quality
"#;

pub fn manager(root: &Path, schema_yaml: &str) -> ConfigurationManager {
    let config: PipelineFile = serde_yaml::from_str(&config_yaml(root)).unwrap();
    let params: Params = serde_yaml::from_str(PARAMS_YAML).unwrap();
    let schema: SchemaFile = serde_yaml::from_str(schema_yaml).unwrap();
    ConfigurationManager::from_parts(config, params, schema).unwrap()
}

/// Zip of a 50-row dataset at `<root>/source.zip`.
pub fn source_zip(root: &Path) -> PathBuf {
    let path = root.join("source.zip");
    write_zip(&path, &[(DATA_FILE, &dataset_text(50))]);
    path
}
