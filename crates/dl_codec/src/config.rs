//! Codec configuration.
//!
//! ```json
//! {
//!   "limits": { "content_max_bytes": 65536 },
//!   "verify_signatures": true,
//!   "compression": "gzip",
//!   "attachment_chunk_bytes": 65536
//! }
//! ```
//!
//! Every field is optional; missing fields take the protocol defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compressor::CompressionMode;
use crate::limits::Limits;
use crate::provider::VerifySignature;

pub const DEFAULT_ATTACHMENT_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub limits: Limits,
    pub verify_signatures: bool,
    pub compression: CompressionMode,
    pub attachment_chunk_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            verify_signatures: true,
            compression: CompressionMode::Gzip,
            attachment_chunk_bytes: DEFAULT_ATTACHMENT_CHUNK_BYTES,
        }
    }
}

impl CodecConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        tracing::info!("[config] loaded codec config from {}", path.display());
        Ok(config)
    }

    pub fn verify(&self) -> VerifySignature {
        VerifySignature::from(self.verify_signatures)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.attachment_chunk_bytes == 0 {
            return Err(ConfigError::Invalid("attachment_chunk_bytes must be positive".into()));
        }
        let l = &self.limits;
        if l.key_safe_max_bytes <= 4 || l.content_max_bytes == 0 || l.meta_max_bytes < 4 {
            return Err(ConfigError::Invalid("size limits are too small to hold any message".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(CodecConfig::from_json_str("{}").unwrap(), CodecConfig::default());
    }

    #[test]
    fn partial_overrides() {
        let config = CodecConfig::from_json_str(
            r#"{"limits": {"content_max_bytes": 1000}, "compression": "none", "verify_signatures": false}"#,
        )
        .unwrap();
        assert_eq!(config.limits.content_max_bytes, 1000);
        assert_eq!(config.limits.meta_max_bytes, 1024);
        assert_eq!(config.compression, CompressionMode::None);
        assert_eq!(config.verify(), VerifySignature::False);
    }

    #[test]
    fn rejects_nonsense() {
        assert!(matches!(
            CodecConfig::from_json_str(r#"{"attachment_chunk_bytes": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CodecConfig::from_json_str(r#"{"compression": "zstd"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"attachment_chunk_bytes": 4096}}"#).unwrap();
        let config = CodecConfig::load(file.path()).unwrap();
        assert_eq!(config.attachment_chunk_bytes, 4096);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CodecConfig::load(dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
