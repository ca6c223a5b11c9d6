use dl_crypto::AsymmetricKeyType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("{key_type} key {key_id} is already registered")]
    KeyConflict {
        key_type: AsymmetricKeyType,
        key_id: u32,
    },

    #[error("Attachment of {0} bytes exceeds the 4 GiB index limit")]
    AttachmentTooLarge(usize),

    #[error("Crypto error: {0}")]
    Crypto(#[from] dl_crypto::CryptoError),

    #[error("Codec error: {0}")]
    Codec(#[from] dl_codec::CodecError),
}
