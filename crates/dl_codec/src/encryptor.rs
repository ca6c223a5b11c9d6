//! Turns an `EncodedMessage` into the three ciphertext buffers sent to the
//! server, and encrypts meta state for upload.

use tracing::debug;

use dl_crypto::{PrivateKey, PublicKey, SymmetricKey};

use crate::attachments;
use crate::content;
use crate::error::Result;
use crate::keysafe;
use crate::limits::Limits;
use crate::meta;
use crate::types::{EncodedMessage, SendableMessage};

#[derive(Debug, Clone, Default)]
pub struct MessageEncryptor {
    limits: Limits,
}

impl MessageEncryptor {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Seal `encoded` for the recipient key `enc_key` and sign it with
    /// `sig_key`.  Compression, if any, has already been applied.
    pub fn make_sendable_message(
        &self,
        encoded: &EncodedMessage,
        enc_key_id: u32,
        enc_key: &PublicKey,
        sig_key_id: u32,
        sig_key: &PrivateKey,
    ) -> Result<SendableMessage> {
        let (key_safe, symm_key) = keysafe::build(enc_key_id, enc_key)?;
        let content = content::encrypt(&encoded.content, sig_key_id, sig_key, &symm_key)?;

        let attachments = if encoded.attachments.is_empty() {
            Vec::new()
        } else {
            attachments::encrypt(&encoded.attachments, &symm_key)?
        };
        self.limits.check_attachments(attachments.len())?;

        debug!(
            enc_key_id,
            sig_key_id,
            key_safe_len = key_safe.len(),
            content_len = content.len(),
            attachments_len = attachments.len(),
            "[encryptor] message sealed"
        );

        Ok(SendableMessage {
            key_safe,
            content,
            attachments,
        })
    }

    /// Encrypt serialized meta under the private data key (always the
    /// latest meta version).
    pub fn encrypt_meta(&self, plaintext: &[u8], private_data_key: &SymmetricKey) -> Result<Vec<u8>> {
        meta::encrypt(plaintext, private_data_key)
    }
}
