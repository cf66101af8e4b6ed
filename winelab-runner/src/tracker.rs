//! Experiment tracking: run parameters, metrics and the model artifact.
//!
//! Two backends behind one trait:
//! - `LocalTracker`: a directory store. Finished runs are appended to
//!   `runs.jsonl` (one JSON object per line) and model files are copied to
//!   `<run_id>/artifacts/model/`.
//! - `MlflowTracker`: the MLflow REST API over blocking HTTP.
//!
//! A run is an owned `RunHandle` threaded through the calls, so trackers hold
//! no per-run state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use winelab_core::config::TrackingConfig;

/// Default directory of the local run store.
pub const DEFAULT_LOCAL_STORE: &str = "mlruns";
const RUNS_FILE: &str = "runs.jsonl";

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("tracker serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tracking server request to {endpoint} failed: {reason}")]
    Http { endpoint: String, reason: String },

    #[error("tracking server returned HTTP {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("unexpected tracking server response: {0}")]
    Protocol(String),
}

impl TrackerError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    fn as_str(self) -> &'static str {
        match self {
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// An open run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Artifact locations as reported by the backend.
    pub artifacts: Vec<String>,
}

impl RunHandle {
    fn new(run_id: String, experiment_id: String, run_name: Option<&str>) -> Self {
        Self {
            run_id,
            experiment_id,
            run_name: run_name.map(str::to_string),
            started_at: Utc::now(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }
}

/// Line of `runs.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
}

pub trait ExperimentTracker {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    fn start_run(&self, run_name: Option<&str>) -> Result<RunHandle, TrackerError>;

    fn log_params(
        &self,
        run: &mut RunHandle,
        params: &BTreeMap<String, f64>,
    ) -> Result<(), TrackerError>;

    fn log_metrics(
        &self,
        run: &mut RunHandle,
        metrics: &[(&str, f64)],
    ) -> Result<(), TrackerError>;

    /// Attach the model file at `model_path` to the run under `model/`.
    fn log_model(&self, run: &mut RunHandle, model_path: &Path) -> Result<(), TrackerError>;

    fn end_run(&self, run: RunHandle, status: RunStatus) -> Result<(), TrackerError>;
}

/// Derive a 32-hex-char run id from the run's start instant and name.
fn new_run_id(experiment_id: &str, run_name: Option<&str>, at: DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(experiment_id.as_bytes());
    hasher.update(run_name.unwrap_or("").as_bytes());
    hasher.update(&at.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..32].to_string()
}

/// Format a parameter the way it is shown in tracker UIs.
fn param_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

// ─── Local store ─────────────────────────────────────────────────────

pub struct LocalTracker {
    root: PathBuf,
    experiment_id: String,
}

impl LocalTracker {
    pub fn new(root: impl Into<PathBuf>, experiment_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            experiment_id: experiment_id.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runs_file(&self) -> PathBuf {
        self.root.join(RUNS_FILE)
    }

    /// Read every finished run. Malformed lines are skipped.
    pub fn read_runs(&self) -> Result<Vec<RunRecord>, TrackerError> {
        let path = self.runs_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(|e| TrackerError::io(&path, e))?;
        let mut records = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line.map_err(|e| TrackerError::io(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping malformed run record"),
            }
        }
        Ok(records)
    }
}

impl ExperimentTracker for LocalTracker {
    fn name(&self) -> &str {
        "local"
    }

    fn start_run(&self, run_name: Option<&str>) -> Result<RunHandle, TrackerError> {
        let started_at = Utc::now();
        let run_id = new_run_id(&self.experiment_id, run_name, started_at);
        let run_dir = self.root.join(&run_id);
        fs::create_dir_all(&run_dir).map_err(|e| TrackerError::io(&run_dir, e))?;

        let mut run = RunHandle::new(run_id, self.experiment_id.clone(), run_name);
        run.started_at = started_at;
        info!(run_id = %run.run_id, store = %self.root.display(), "started tracking run");
        Ok(run)
    }

    fn log_params(
        &self,
        run: &mut RunHandle,
        params: &BTreeMap<String, f64>,
    ) -> Result<(), TrackerError> {
        for (key, value) in params {
            run.params.insert(key.clone(), param_value(*value));
        }
        Ok(())
    }

    fn log_metrics(
        &self,
        run: &mut RunHandle,
        metrics: &[(&str, f64)],
    ) -> Result<(), TrackerError> {
        for (key, value) in metrics {
            run.metrics.insert(key.to_string(), *value);
        }
        Ok(())
    }

    fn log_model(&self, run: &mut RunHandle, model_path: &Path) -> Result<(), TrackerError> {
        let file_name = model_path
            .file_name()
            .ok_or_else(|| TrackerError::Protocol(format!("{} has no file name", model_path.display())))?;
        let dest_dir = self.root.join(&run.run_id).join("artifacts").join("model");
        fs::create_dir_all(&dest_dir).map_err(|e| TrackerError::io(&dest_dir, e))?;
        let dest = dest_dir.join(file_name);
        fs::copy(model_path, &dest).map_err(|e| TrackerError::io(model_path, e))?;
        run.artifacts.push(dest.display().to_string());
        info!(run_id = %run.run_id, artifact = %dest.display(), "model logged");
        Ok(())
    }

    fn end_run(&self, run: RunHandle, status: RunStatus) -> Result<(), TrackerError> {
        let record = RunRecord {
            run_id: run.run_id,
            experiment_id: run.experiment_id,
            run_name: run.run_name,
            status,
            started_at: run.started_at,
            ended_at: Utc::now(),
            params: run.params,
            metrics: run.metrics,
            artifacts: run.artifacts,
        };
        let json = serde_json::to_string(&record)?;

        let path = self.runs_file();
        fs::create_dir_all(&self.root).map_err(|e| TrackerError::io(&self.root, e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TrackerError::io(&path, e))?;
        writeln!(file, "{json}").map_err(|e| TrackerError::io(&path, e))?;
        file.flush().map_err(|e| TrackerError::io(&path, e))?;

        info!(run_id = %record.run_id, status = status.as_str(), "ended tracking run");
        Ok(())
    }
}

// ─── MLflow REST ─────────────────────────────────────────────────────

pub struct MlflowTracker {
    base_url: String,
    experiment_id: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::blocking::Client,
}

impl MlflowTracker {
    pub fn new(config: &TrackingConfig, base_url: &str) -> Result<Self, TrackerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TrackerError::Http {
                endpoint: base_url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            experiment_id: config.experiment_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/2.0/{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.username {
            Some(user) => req.basic_auth(user, self.password.as_deref()),
            None => req,
        }
    }

    fn send(
        &self,
        endpoint: &str,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<serde_json::Value, TrackerError> {
        let resp = self.authed(req).send().map_err(|e| TrackerError::Http {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let status = resp.status();
        let body = resp.text().map_err(|e| TrackerError::Http {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(TrackerError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        debug!(endpoint, "tracking request ok");
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, TrackerError> {
        let endpoint = self.endpoint(path);
        let req = self.client.post(&endpoint).json(&body);
        self.send(&endpoint, req)
    }
}

impl ExperimentTracker for MlflowTracker {
    fn name(&self) -> &str {
        "mlflow"
    }

    fn start_run(&self, run_name: Option<&str>) -> Result<RunHandle, TrackerError> {
        let started_at = Utc::now();
        let mut body = json!({
            "experiment_id": self.experiment_id,
            "start_time": started_at.timestamp_millis(),
        });
        if let Some(name) = run_name {
            body["run_name"] = json!(name);
        }
        let resp = self.post("mlflow/runs/create", body)?;
        let run_id = resp["run"]["info"]["run_id"]
            .as_str()
            .ok_or_else(|| TrackerError::Protocol("runs/create response has no run_id".into()))?
            .to_string();

        let mut run = RunHandle::new(run_id, self.experiment_id.clone(), run_name);
        run.started_at = started_at;
        info!(run_id = %run.run_id, server = %self.base_url, "started tracking run");
        Ok(run)
    }

    fn log_params(
        &self,
        run: &mut RunHandle,
        params: &BTreeMap<String, f64>,
    ) -> Result<(), TrackerError> {
        for (key, value) in params {
            let value = param_value(*value);
            self.post(
                "mlflow/runs/log-parameter",
                json!({ "run_id": run.run_id, "key": key, "value": value }),
            )?;
            run.params.insert(key.clone(), value);
        }
        Ok(())
    }

    fn log_metrics(
        &self,
        run: &mut RunHandle,
        metrics: &[(&str, f64)],
    ) -> Result<(), TrackerError> {
        let timestamp = Utc::now().timestamp_millis();
        for (key, value) in metrics {
            self.post(
                "mlflow/runs/log-metric",
                json!({
                    "run_id": run.run_id,
                    "key": key,
                    "value": value,
                    "timestamp": timestamp,
                    "step": 0,
                }),
            )?;
            run.metrics.insert(key.to_string(), *value);
        }
        Ok(())
    }

    fn log_model(&self, run: &mut RunHandle, model_path: &Path) -> Result<(), TrackerError> {
        let file_name = model_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrackerError::Protocol(format!("{} has no file name", model_path.display())))?;
        let bytes = fs::read(model_path).map_err(|e| TrackerError::io(model_path, e))?;

        let endpoint = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}/artifacts/model/{}",
            self.base_url, self.experiment_id, run.run_id, file_name
        );
        let req = self
            .client
            .put(&endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        self.send(&endpoint, req)?;
        run.artifacts.push(format!("model/{file_name}"));
        info!(run_id = %run.run_id, "model logged");
        Ok(())
    }

    fn end_run(&self, run: RunHandle, status: RunStatus) -> Result<(), TrackerError> {
        self.post(
            "mlflow/runs/update",
            json!({
                "run_id": run.run_id,
                "status": status.as_str(),
                "end_time": Utc::now().timestamp_millis(),
            }),
        )?;
        info!(run_id = %run.run_id, status = status.as_str(), "ended tracking run");
        Ok(())
    }
}

// ─── Selection ───────────────────────────────────────────────────────

/// `http(s)://` URIs select MLflow; anything else (or nothing) is a local
/// store directory, with an optional `file://` prefix stripped.
pub fn tracker_from_config(
    config: &TrackingConfig,
) -> Result<Box<dyn ExperimentTracker>, TrackerError> {
    match config.uri.as_deref().map(str::trim) {
        Some(uri) if uri.starts_with("http://") || uri.starts_with("https://") => {
            info!(uri, "using MLflow tracking server");
            Ok(Box::new(MlflowTracker::new(config, uri)?))
        }
        Some(uri) if !uri.is_empty() => {
            let dir = uri.strip_prefix("file://").unwrap_or(uri);
            info!(store = dir, "using local tracking store");
            Ok(Box::new(LocalTracker::new(dir, config.experiment_id.clone())))
        }
        _ => {
            info!(store = DEFAULT_LOCAL_STORE, "using local tracking store");
            Ok(Box::new(LocalTracker::new(
                DEFAULT_LOCAL_STORE,
                config.experiment_id.clone(),
            )))
        }
    }
}
