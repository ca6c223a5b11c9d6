//! SHA-2 hash utilities
//!
//! - SHA-512 hex digests identify attachment payloads in the content index
//! - `eight_byte_hash` derives compact 64-bit ids from SHA-256
//! - `Sha512Hasher` hashes streamed data chunk by chunk

use sha2::{Digest, Sha256, Sha512};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

pub fn sha512(data: &[u8]) -> [u8; 64] {
    Sha512::digest(data).into()
}

pub fn sha512_hex(data: &[u8]) -> String {
    hex::encode(sha512(data))
}

/// First eight bytes of SHA-256, read as a big-endian signed integer.
pub fn eight_byte_hash(data: &[u8]) -> i64 {
    let digest = sha256(data);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(head)
}

/// Incremental SHA-512 for streamed payloads.
#[derive(Clone, Default)]
pub struct Sha512Hasher {
    inner: Sha512,
}

impl Sha512Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> [u8; 64] {
        self.inner.finalize().into()
    }

    pub fn hex_digest(self) -> String {
        hex::encode(self.finalize())
    }
}
