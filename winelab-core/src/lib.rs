//! WineLab Core: configuration, data handling, model and metrics.
//!
//! This crate holds everything the pipeline stages are built from:
//! - Typed YAML configuration and per-stage records
//! - Explicit logging context (stdout + log file)
//! - Archive download/verification/extraction
//! - Shared `;`-delimited dataset parser
//! - Schema validation and the status-file gate
//! - Seeded train/test split
//! - ElasticNet regression and its checksummed artifact
//! - Regression metrics

pub mod config;
pub mod data;
pub mod logging;
pub mod metrics;
pub mod model;

pub use config::{ConfigError, ConfigPaths, ConfigurationManager};
pub use logging::{LogContext, LogSettings};
pub use metrics::{MetricsError, RegressionMetrics};
pub use model::{ArtifactError, ElasticNet, ModelArtifact, ModelError};
