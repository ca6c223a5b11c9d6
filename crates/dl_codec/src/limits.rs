//! Protocol size ceilings and version constants.
//!
//! Every ceiling is checked before any cryptographic work is attempted.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

pub const KEY_SAFE_MAX_BYTES: usize = 1024;
pub const CONTENT_MAX_BYTES: usize = 64 * 1024;
pub const META_MAX_BYTES: usize = 1024;
pub const ATTACHMENTS_MAX_BYTES: usize = 100 * 1024 * 1024;

/// The only keySafe message format understood.
pub const MSG_FORMAT: u32 = 1;
pub const SYMM_CIPHER: &str = "AES-256/GCM";
pub const HASH_ALGO: &str = "SHA-512";

/// Newest meta envelope version; the one always written.
pub const LATEST_META_VERSION: u32 = 1;

/// Size ceilings, overridable through `CodecConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub key_safe_max_bytes: usize,
    pub content_max_bytes: usize,
    pub meta_max_bytes: usize,
    pub attachments_max_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            key_safe_max_bytes: KEY_SAFE_MAX_BYTES,
            content_max_bytes: CONTENT_MAX_BYTES,
            meta_max_bytes: META_MAX_BYTES,
            attachments_max_bytes: ATTACHMENTS_MAX_BYTES,
        }
    }
}

impl Limits {
    pub fn check_key_safe(&self, len: usize) -> Result<()> {
        check("keySafe", len, self.key_safe_max_bytes)
    }

    pub fn check_content(&self, len: usize) -> Result<()> {
        check("content", len, self.content_max_bytes)
    }

    pub fn check_meta(&self, len: usize) -> Result<()> {
        check("meta", len, self.meta_max_bytes)
    }

    pub fn check_attachments(&self, len: usize) -> Result<()> {
        if len > self.attachments_max_bytes {
            return Err(CodecError::invalid("attachments are too large"));
        }
        Ok(())
    }
}

fn check(what: &str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(CodecError::invalid(format!("{what} too large: {len}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_limit_passes_one_more_fails() {
        let limits = Limits::default();
        assert!(limits.check_key_safe(KEY_SAFE_MAX_BYTES).is_ok());
        assert!(limits.check_key_safe(KEY_SAFE_MAX_BYTES + 1).is_err());
        assert!(limits.check_content(CONTENT_MAX_BYTES).is_ok());
        assert!(limits.check_content(CONTENT_MAX_BYTES + 1).is_err());
        assert!(limits.check_meta(META_MAX_BYTES).is_ok());
        assert!(limits.check_meta(META_MAX_BYTES + 1).is_err());
        assert!(limits.check_attachments(ATTACHMENTS_MAX_BYTES).is_ok());
        assert!(limits.check_attachments(ATTACHMENTS_MAX_BYTES + 1).is_err());
    }

    #[test]
    fn error_names_the_buffer() {
        let err = Limits::default().check_meta(2000).unwrap_err();
        assert_eq!(err.to_string(), "Invalid content format: meta too large: 2000");
        assert!(err.is_bad_wire_data());
    }
}
