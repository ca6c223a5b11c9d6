//! Opens the envelopes of a received message: keySafe, then content.  Meta
//! is size-checked and handed on sealed; the decoder opens it once it knows
//! the sender.  Parsing of the content body is left to the decoder too.

use tracing::debug;

use dl_crypto::SymmetricKey;

use crate::content;
use crate::error::Result;
use crate::keysafe;
use crate::limits::Limits;
use crate::meta::SealedMeta;
use crate::provider::PrivateKeyProvider;
use crate::types::{DecryptedMessage, WireMessage};

pub struct MessageDecryptor<'a> {
    keys: &'a dyn PrivateKeyProvider,
    private_data_key: &'a SymmetricKey,
    limits: Limits,
}

impl<'a> MessageDecryptor<'a> {
    pub fn new(keys: &'a dyn PrivateKeyProvider, private_data_key: &'a SymmetricKey) -> Self {
        Self {
            keys,
            private_data_key,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Reject oversized buffers before any cryptographic work.
    pub fn check_size(&self, wire: &WireMessage) -> Result<()> {
        self.limits.check_key_safe(wire.key_safe.len())?;
        self.limits.check_content(wire.content.len())?;
        self.limits.check_meta(wire.meta.len())
    }

    pub fn decrypt(&self, wire: WireMessage) -> Result<DecryptedMessage> {
        self.check_size(&wire)?;

        let key_safe = keysafe::parse(&wire.key_safe, self.keys)?;
        let content = content::decrypt(&wire.content, &key_safe.symm_key)?;
        let meta = SealedMeta::new(wire.meta, self.private_data_key.clone());

        debug!(
            id = wire.id,
            sig_key_id = content.sig_key_id,
            meta_version = meta.version(),
            "[decryptor] message decrypted"
        );

        Ok(DecryptedMessage {
            id: wire.id,
            last_modified: wire.last_modified,
            date_received: wire.date_received,
            key_safe,
            content,
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use dl_crypto::{AsymmetricKeyType, PrivateKey};

    use crate::error::{BoxError, CodecError};
    use crate::limits::{CONTENT_MAX_BYTES, KEY_SAFE_MAX_BYTES, META_MAX_BYTES};

    struct NoKeys;

    impl PrivateKeyProvider for NoKeys {
        fn private_key(&self, _: AsymmetricKeyType, key_id: u32) -> Result<PrivateKey, BoxError> {
            Err(format!("no key {key_id}").into())
        }
    }

    fn wire(key_safe: usize, content: usize, meta: usize) -> WireMessage {
        WireMessage {
            id: 1,
            last_modified: 2,
            date_received: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            key_safe: vec![0; key_safe],
            content: vec![0; content],
            meta: vec![0; meta],
        }
    }

    #[test]
    fn size_boundaries() {
        let key = SymmetricKey::generate_private_data_key();
        let decryptor = MessageDecryptor::new(&NoKeys, &key);

        assert!(decryptor
            .check_size(&wire(KEY_SAFE_MAX_BYTES, CONTENT_MAX_BYTES, META_MAX_BYTES))
            .is_ok());

        for (w, what) in [
            (wire(KEY_SAFE_MAX_BYTES + 1, 0, 0), "keySafe"),
            (wire(0, CONTENT_MAX_BYTES + 1, 0), "content"),
            (wire(0, 0, META_MAX_BYTES + 1), "meta"),
        ] {
            let err = decryptor.decrypt(w).unwrap_err();
            assert!(err.to_string().contains(&format!("{what} too large")), "{err}");
        }
    }

    #[test]
    fn configured_limits_apply() {
        let key = SymmetricKey::generate_private_data_key();
        let decryptor = MessageDecryptor::new(&NoKeys, &key).with_limits(Limits {
            content_max_bytes: 10,
            ..Limits::default()
        });
        assert!(decryptor.check_size(&wire(5, 10, 0)).is_ok());
        assert!(decryptor.check_size(&wire(5, 11, 0)).is_err());
    }

    #[test]
    fn size_check_runs_before_key_lookup() {
        let key = SymmetricKey::generate_private_data_key();
        let decryptor = MessageDecryptor::new(&NoKeys, &key);
        // a key lookup would fail with DecryptionKeyMissing
        assert!(matches!(
            decryptor.decrypt(wire(KEY_SAFE_MAX_BYTES + 1, 0, 0)),
            Err(CodecError::InvalidContentFormat { .. })
        ));
        assert!(matches!(
            decryptor.decrypt(wire(8, 0, 0)),
            Err(CodecError::DecryptionKeyMissing { key_id: 0, .. })
        ));
    }
}
