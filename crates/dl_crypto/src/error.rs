use thiserror::Error;

use crate::asymmetric::AsymmetricKeyType;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Wrong key type: expected {expected} key, got {actual} key")]
    WrongKeyType {
        expected: AsymmetricKeyType,
        actual: AsymmetricKeyType,
    },

    #[error("Asymmetric encryption failed: {0}")]
    AsymmetricEncrypt(String),

    #[error("Asymmetric decryption failed")]
    AsymmetricDecrypt,

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch, possible tampering)")]
    AeadDecrypt,

    #[error("Unsupported IV length: {0} bytes")]
    UnsupportedIvLength(usize),

    #[error("Ciphertext is shorter than its {0} byte IV")]
    MissingIv(usize),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
