//! Persisted model artifact.
//!
//! Binary envelope, little-endian:
//!
//! ```text
//! magic   4 bytes   b"WLMD"
//! version u32
//! digest  32 bytes  blake3 of the payload
//! length  u64       payload length in bytes
//! payload JSON      ModelArtifact
//! ```
//!
//! `load` rejects anything whose magic, version, length or digest does not
//! match, so a truncated or edited file never produces a model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::elastic_net::ElasticNet;

pub const ARTIFACT_MAGIC: [u8; 4] = *b"WLMD";
pub const ARTIFACT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 32 + 8;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("not a model artifact (bad magic)")]
    BadMagic,

    #[error("unsupported artifact version {0} (expected {ARTIFACT_VERSION})")]
    UnsupportedVersion(u32),

    #[error("artifact truncated: header says {expected} payload bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    #[error("artifact checksum mismatch")]
    ChecksumMismatch,

    #[error("artifact payload is invalid: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("model is not fitted; refusing to save")]
    Unfitted,
}

/// A fitted model plus what is needed to apply it to new data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Feature columns in the order the model expects them.
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub model: ElasticNet,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn new(feature_names: Vec<String>, target_name: String, model: ElasticNet) -> Self {
        Self {
            feature_names,
            target_name,
            model,
            trained_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        if !self.model.is_fitted() {
            return Err(ArtifactError::Unfitted);
        }
        let payload = serde_json::to_vec(self)?;
        let digest = blake3::hash(&payload);

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&ARTIFACT_MAGIC);
        out.extend_from_slice(&ARTIFACT_VERSION.to_le_bytes());
        out.extend_from_slice(digest.as_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        if bytes.len() < 4 || bytes[..4] != ARTIFACT_MAGIC {
            return Err(ArtifactError::BadMagic);
        }
        if bytes.len() < HEADER_LEN {
            return Err(ArtifactError::Truncated {
                expected: 0,
                found: bytes.len() as u64,
            });
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != ARTIFACT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[8..40]);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[40..48]);
        let expected = u64::from_le_bytes(len_bytes);

        let payload = &bytes[HEADER_LEN..];
        if payload.len() as u64 != expected {
            return Err(ArtifactError::Truncated {
                expected,
                found: payload.len() as u64,
            });
        }
        if blake3::hash(payload) != blake3::Hash::from(digest) {
            return Err(ArtifactError::ChecksumMismatch);
        }

        Ok(serde_json::from_slice(payload)?)
    }

    /// Write the envelope to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, bytes).map_err(io_err)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Hex blake3 digest of the payload, used as the model's identity.
    pub fn digest(&self) -> Result<String, ArtifactError> {
        let payload = serde_json::to_vec(self)?;
        Ok(blake3::hash(&payload).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fitted_artifact() -> ModelArtifact {
        let x = vec![vec![1.0, 0.0], vec![2.0, 1.0], vec![3.0, 0.5], vec![4.0, 2.0]];
        let y = vec![2.0, 4.5, 5.5, 8.5];
        let mut model = ElasticNet::new(0.01, 0.5);
        model.fit(&x, &y).unwrap();
        ModelArtifact::new(vec!["a".into(), "b".into()], "quality".into(), model)
    }

    #[test]
    fn save_then_load_gives_identical_predictions() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/model.bin");
        let artifact = fitted_artifact();
        artifact.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
        let row = [2.5, 1.5];
        assert_eq!(
            loaded.model.predict_one(&row).unwrap(),
            artifact.model.predict_one(&row).unwrap()
        );
    }

    #[test]
    fn header_layout() {
        let bytes = fitted_artifact().to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"WLMD");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
        let len = u64::from_le_bytes(bytes[40..48].try_into().unwrap());
        assert_eq!(len as usize, bytes.len() - HEADER_LEN);
    }

    #[test]
    fn flipped_payload_byte_is_detected() {
        let mut bytes = fitted_artifact().to_bytes().unwrap();
        let last = bytes.len() - 2;
        bytes[last] ^= 0x01;
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(ArtifactError::ChecksumMismatch)
        ));
    }

    #[test]
    fn truncation_is_detected() {
        let bytes = fitted_artifact().to_bytes().unwrap();
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes[..bytes.len() - 10]),
            Err(ArtifactError::Truncated { .. })
        ));
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes[..20]),
            Err(ArtifactError::Truncated { .. })
        ));
    }

    #[test]
    fn wrong_magic_and_version_are_rejected() {
        let mut bytes = fitted_artifact().to_bytes().unwrap();
        bytes[4] = 9;
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(ArtifactError::UnsupportedVersion(9))
        ));
        assert!(matches!(
            ModelArtifact::from_bytes(b"PK\x03\x04whatever"),
            Err(ArtifactError::BadMagic)
        ));
    }

    #[test]
    fn unfitted_model_is_not_saved() {
        let artifact = ModelArtifact::new(vec![], "y".into(), ElasticNet::default());
        assert!(matches!(artifact.to_bytes(), Err(ArtifactError::Unfitted)));
    }

    #[test]
    fn digest_is_stable() {
        let artifact = fitted_artifact();
        assert_eq!(artifact.digest().unwrap(), artifact.digest().unwrap());
        assert_eq!(artifact.digest().unwrap().len(), 64);
    }
}
