//! Meta envelope: per-message read/done state, synced between the user's
//! own devices and encrypted under the account's private data key.
//!
//! Wire layout: [ version: u32 BE | ciphertext ]
//!
//! | version | IV                           | read/done encoding           |
//! |---------|------------------------------|------------------------------|
//! | 0       | fixed `"meta"`               | JSON bools, absent = false   |
//! | 1       | random 16 bytes, prepended   | JSON 0/1, absent = 0         |
//! | > 1     | not decrypted                | read = done = true           |
//!
//! Only version 1 is ever written.  The reserved `delivery` field is never
//! emitted and not read back while delivery sync is disabled.

use serde_json::{json, Value};
use tracing::debug;

use dl_crypto::symmetric::{self, META_V0_IV, RANDOM_IV_BYTES};
use dl_crypto::SymmetricKey;

use crate::checked::{self, FieldExt};
use crate::delivery::Delivery;
use crate::error::{CodecError, Result};
use crate::limits::{LATEST_META_VERSION, META_MAX_BYTES};
use crate::wire::read_u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaVersion {
    /// Fixed IV, boolean flags.
    V0,
    /// Random IV, integer flags.
    V1,
    /// Written by a newer client.
    Unknown(u32),
}

impl From<u32> for MetaVersion {
    fn from(version: u32) -> Self {
        match version {
            0 => Self::V0,
            1 => Self::V1,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetaState {
    pub version: u32,
    pub read: bool,
    pub done: bool,
    pub delivery: Vec<Delivery>,
}

impl MessageMetaState {
    /// State of a message the user sent: nothing left to do.
    pub fn self_sent() -> Self {
        Self {
            version: LATEST_META_VERSION,
            read: true,
            done: true,
            delivery: Vec::new(),
        }
    }
}

/// Meta as received, still sealed under the private data key.  Messages the
/// user sent never open it.
#[derive(Debug, Clone)]
pub struct SealedMeta {
    bytes: Vec<u8>,
    private_data_key: SymmetricKey,
}

impl SealedMeta {
    pub fn new(bytes: Vec<u8>, private_data_key: SymmetricKey) -> Self {
        Self {
            bytes,
            private_data_key,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Version from the header; nothing is decrypted.
    pub fn version(&self) -> u32 {
        if self.bytes.len() < 4 {
            LATEST_META_VERSION
        } else {
            read_u32(&self.bytes[..4])
        }
    }

    /// Decrypt and interpret.
    pub fn open(&self) -> Result<MessageMetaState> {
        let (version, plaintext) = decode(&self.bytes, &self.private_data_key)?;
        interpret(version, &plaintext)
    }
}

/// Split off the version and decrypt if the version is known.
pub fn decode(bytes: &[u8], private_data_key: &SymmetricKey) -> Result<(u32, String)> {
    if bytes.len() < 4 {
        return Ok((LATEST_META_VERSION, String::new()));
    }
    let version = read_u32(&bytes[..4]);
    let ciphertext = &bytes[4..];

    let plaintext = match MetaVersion::from(version) {
        MetaVersion::V0 => symmetric::decrypt(private_data_key, META_V0_IV, ciphertext),
        MetaVersion::V1 => symmetric::decrypt_prepended(private_data_key, RANDOM_IV_BYTES, ciphertext),
        MetaVersion::Unknown(v) => {
            debug!(version = v, "[meta] unknown version, not decrypting");
            return Ok((version, String::new()));
        }
    }
    .map_err(|e| CodecError::invalid_with(format!("meta (version {version}) decryption failed"), e))?;

    let text = String::from_utf8(plaintext.to_vec())
        .map_err(|e| CodecError::invalid_with(format!("meta (version {version}) invalid"), e))?;
    Ok((version, text))
}

/// Turn decrypted meta into read/done state using the rules of `version`.
pub fn interpret(version: u32, plaintext: &str) -> Result<MessageMetaState> {
    let (read, done) = match MetaVersion::from(version) {
        MetaVersion::V0 => {
            let json = read_object(version, plaintext)?;
            (
                checked::to_bool_or(&json["read"], false).field("meta (version 0) read")?,
                checked::to_bool_or(&json["done"], false).field("meta (version 0) done")?,
            )
        }
        MetaVersion::V1 => {
            let json = read_object(version, plaintext)?;
            (
                checked::to_u32_or(&json["read"], 0).field("meta (version 1) read")? != 0,
                checked::to_u32_or(&json["done"], 0).field("meta (version 1) done")? != 0,
            )
        }
        MetaVersion::Unknown(_) => (true, true),
    };

    Ok(MessageMetaState {
        version,
        read,
        done,
        delivery: Vec::new(),
    })
}

fn read_object(version: u32, plaintext: &str) -> Result<Value> {
    if plaintext.is_empty() {
        return Ok(Value::Null);
    }
    let json: Value = serde_json::from_str(plaintext)
        .map_err(|e| CodecError::invalid_with(format!("meta (version {version}) invalid"), e))?;
    if !json.is_object() {
        return Err(CodecError::invalid(format!("meta (version {version}) is not an object")));
    }
    Ok(json)
}

/// Serialize state in the latest format.  `delivery` is accepted but not
/// written: delivery sync is disabled on the wire.
pub fn encode(read: bool, done: bool, delivery: &[Delivery]) -> Vec<u8> {
    if !delivery.is_empty() {
        debug!(entries = delivery.len(), "[meta] delivery sync disabled, not encoding");
    }
    json!({
        "read": u32::from(read),
        "done": u32::from(done),
    })
    .to_string()
    .into_bytes()
}

/// Encrypt serialized meta as the latest version.
pub fn encrypt(plaintext: &[u8], private_data_key: &SymmetricKey) -> Result<Vec<u8>> {
    let ciphertext = symmetric::encrypt_with_random_iv(private_data_key, plaintext)?;
    let mut out = Vec::with_capacity(4 + ciphertext.len());
    out.extend_from_slice(&LATEST_META_VERSION.to_be_bytes());
    out.extend_from_slice(&ciphertext);
    if out.len() > META_MAX_BYTES {
        return Err(CodecError::invalid(format!("meta too large: {}", out.len())));
    }
    Ok(out)
}
