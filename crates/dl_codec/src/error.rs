use thiserror::Error;

use dl_crypto::CryptoError;

/// Boxed cause carried by nested errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = CodecError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed, oversized or semantically invalid wire data.
    #[error("Invalid content format: {context}")]
    InvalidContentFormat {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Decryption key {key_id} is missing")]
    DecryptionKeyMissing {
        key_id: u32,
        #[source]
        source: BoxError,
    },

    #[error("Signature verification key {key_id} of {address} is missing")]
    SignatureVerificationKeyMissing { address: String, key_id: u32 },

    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    #[error("Unsupported content version: {0}")]
    UnsupportedContentVersion(u32),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl CodecError {
    pub fn invalid(context: impl Into<String>) -> Self {
        Self::InvalidContentFormat {
            context: context.into(),
            source: None,
        }
    }

    pub fn invalid_with(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::InvalidContentFormat {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    /// True for errors caused by the received bytes themselves.  A message
    /// failing with one of these is quarantined; processing of other
    /// messages continues.
    pub fn is_bad_wire_data(&self) -> bool {
        matches!(
            self,
            Self::InvalidContentFormat { .. }
                | Self::DecryptionKeyMissing { .. }
                | Self::SignatureVerificationKeyMissing { .. }
                | Self::SignatureVerificationFailed
                | Self::UnsupportedContentVersion(_)
        )
    }
}

/// Inconsistencies in data handed over by collaborators.  These point at a
/// bug in the calling layer or its storage, never at bad wire input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("couldn't find conversation {0} for draft")]
    MissingConversation(u64),

    #[error("couldn't find message {0}")]
    MissingMessage(u64),

    #[error("couldn't find sender for message {0}")]
    MissingSender(u64),

    #[error("attachment sizes don't match: index {index} declares {declared} bytes, has {actual}")]
    AttachmentSizeMismatch {
        index: u32,
        declared: u32,
        actual: usize,
    },

    #[error("attachment stream is too long")]
    StreamTooLong,

    #[error("attachment stream is too short")]
    StreamTooShort,

    #[error("hash mismatch for attachment {index}")]
    HashMismatch { index: u32 },
}

/// Failure converting a single JSON value into a typed field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("expected {0}")]
    WrongType(&'static str),

    #[error("couldn't convert value to non-empty string")]
    EmptyString,

    #[error("value out of range for {0}")]
    OutOfRange(&'static str),

    #[error("not a valid hex string")]
    InvalidHex,

    #[error("couldn't decode value from base64")]
    InvalidBase64,

    #[error("not a valid date/time: {0}")]
    InvalidDateTime(String),

    #[error("not a valid address: {0}")]
    InvalidAddress(String),

    #[error("invalid {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
