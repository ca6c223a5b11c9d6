//! dl_codec: message codec and envelope engine for Darklock messaging
//!
//! A message travels as three buffers:
//!   - keySafe: the per-message AES key, RSA-OAEP sealed for the recipient
//!   - content: the signed JSON body, AES-GCM sealed under that key
//!   - meta:    read/done state, sealed under the account's private data key
//! plus an optional attachments blob sealed under the message key.
//!
//! # Modules
//! - `keysafe`: build/parse the keySafe
//! - `content`: sign/encrypt, decrypt/verify, body JSON
//! - `meta`: versioned meta envelope
//! - `delivery`: per-recipient delivery status (parsed, never emitted)
//! - `attachments`: index, concatenation, receive-side splitting
//! - `compressor`: gzip applied before encryption
//! - `encoder` / `encryptor`: send path
//! - `decryptor` / `decoder`: receive path
//! - `provider`: collaborator traits (keys, conversations, storage)
//! - `limits`, `config`, `error`, `address`, `checked`, `types`

pub mod address;
pub mod attachments;
pub mod checked;
pub mod compressor;
pub mod config;
pub mod content;
pub mod decoder;
pub mod decryptor;
pub mod delivery;
pub mod encoder;
pub mod encryptor;
pub mod error;
pub mod keysafe;
pub mod limits;
pub mod meta;
pub mod provider;
pub mod types;
mod wire;

pub use address::Address;
pub use compressor::{CompressionMode, Gzip, MessageCompressor, Uncompressed};
pub use config::CodecConfig;
pub use decoder::{DecodedMessage, MaterializedMessage, MessageDecoder};
pub use decryptor::MessageDecryptor;
pub use error::{CodecError, IntegrityError};
pub use encryptor::MessageEncryptor;
pub use provider::VerifySignature;
pub use types::{DecryptedMessage, EncodedMessage, SendableMessage, WireMessage};
