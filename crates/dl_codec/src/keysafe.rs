//! KeySafe: the per-message symmetric key, sealed for the recipient.
//!
//! Wire layout:
//!   [ enc_key_id: u32 BE | RSA-OAEP-SHA512(keySafe JSON) ]
//!
//! JSON body (compact):
//!   {"msgFormat":1,"symmCipher":"AES-256/GCM","symmKey":"<base64>","hashAlgo":"SHA-512"}

use serde_json::{json, Value};
use tracing::debug;

use dl_crypto::symmetric::MESSAGE_SYMM_KEY_BITS;
use dl_crypto::{asymmetric, AsymmetricKeyType, PublicKey, SymmetricKey};

use crate::checked::{self, AllowEmpty, FieldExt};
use crate::error::{CodecError, Result};
use crate::limits::{HASH_ALGO, MSG_FORMAT, SYMM_CIPHER};
use crate::provider::PrivateKeyProvider;
use crate::wire::read_u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySafe {
    pub msg_format: u32,
    pub symm_cipher: String,
    pub hash_algo: String,
    pub symm_key: SymmetricKey,
}

/// Generate a fresh message key and seal it for `recipient_key`.
///
/// Returns the keySafe bytes and the key used for content and attachments.
pub fn build(enc_key_id: u32, recipient_key: &PublicKey) -> Result<(Vec<u8>, SymmetricKey)> {
    let symm_key = SymmetricKey::generate_message_key();
    let body = json!({
        "msgFormat": MSG_FORMAT,
        "symmCipher": SYMM_CIPHER,
        "symmKey": symm_key.to_base64(),
        "hashAlgo": HASH_ALGO,
    });
    let sealed = asymmetric::encrypt(body.to_string().as_bytes(), recipient_key)?;

    let mut out = Vec::with_capacity(4 + sealed.len());
    out.extend_from_slice(&enc_key_id.to_be_bytes());
    out.extend_from_slice(&sealed);
    Ok((out, symm_key))
}

/// Open and validate a keySafe.
pub fn parse(bytes: &[u8], keys: &dyn PrivateKeyProvider) -> Result<KeySafe> {
    // at least one byte of ciphertext after the key id
    if bytes.len() <= 4 {
        return Err(CodecError::invalid("keySafe too short"));
    }
    let (id_bytes, sealed) = bytes.split_at(4);
    let enc_key_id = read_u32(id_bytes);

    let private_key = keys
        .private_key(AsymmetricKeyType::Encryption, enc_key_id)
        .map_err(|source| CodecError::DecryptionKeyMissing {
            key_id: enc_key_id,
            source,
        })?;

    debug!(enc_key_id, len = bytes.len(), "[keysafe] decrypting");
    let plaintext = asymmetric::decrypt(sealed, &private_key)
        .map_err(|e| CodecError::invalid_with("keySafe decryption failed", e))?;

    let json: Value = serde_json::from_slice(&plaintext)
        .map_err(|e| CodecError::invalid_with("keySafe invalid", e))?;
    parse_json(&json)
}

fn parse_json(json: &Value) -> Result<KeySafe> {
    if !json.is_object() {
        return Err(CodecError::invalid("keySafe is not an object"));
    }

    let msg_format = checked::to_u32(&json["msgFormat"]).field("keySafe msgFormat")?;
    if msg_format != MSG_FORMAT {
        return Err(CodecError::UnsupportedContentVersion(msg_format));
    }

    let symm_cipher = checked::to_string(&json["symmCipher"], AllowEmpty::No)
        .field("keySafe symmCipher")?;
    if symm_cipher != SYMM_CIPHER {
        return Err(CodecError::invalid("keySafe: bad symmCipher"));
    }

    let hash_algo =
        checked::to_string(&json["hashAlgo"], AllowEmpty::No).field("keySafe hashAlgo")?;
    if hash_algo != HASH_ALGO {
        return Err(CodecError::invalid("keySafe: bad hashAlgo"));
    }

    let raw_key =
        checked::to_base64_bytes(&json["symmKey"], AllowEmpty::No).field("keySafe symmKey")?;
    let symm_key = SymmetricKey::from_bytes(&raw_key);
    if symm_key.bit_size() != MESSAGE_SYMM_KEY_BITS {
        return Err(CodecError::invalid("keySafe: bad symmKey"));
    }

    Ok(KeySafe {
        msg_format,
        symm_cipher,
        hash_algo,
        symm_key,
    })
}
