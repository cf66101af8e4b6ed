//! Regression model and its on-disk artifact.

pub mod artifact;
pub mod elastic_net;

pub use artifact::{ArtifactError, ModelArtifact, ARTIFACT_MAGIC, ARTIFACT_VERSION};
pub use elastic_net::{ElasticNet, Fitted, ModelError};
