//! Authenticated symmetric encryption
//!
//! Uses AES-256/GCM.  Key size: 32 bytes.  Tag: 16 bytes.
//!
//! The message protocol uses two IV disciplines:
//!   - fixed ASCII IVs (`"content"`, `"attachments"`, `"meta"`) for data that
//!     is encrypted under a key used for exactly one message or one legacy
//!     meta blob; the IV is never transmitted.
//!   - random 16-byte IVs, prepended to the ciphertext:
//!     [ iv (16 bytes) | ciphertext + tag ]
//!
//! GCM accepts IVs of any length; IVs other than 96 bits are run through
//! GHASH to derive the initial counter block.
//!
//! Empty input maps to empty output in both directions (no tag is emitted
//! for an empty plaintext).

use std::fmt;

use aes_gcm::aead::consts::{U11, U12, U16, U4, U7};
use aes_gcm::aead::generic_array::{ArrayLength, GenericArray};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

/// Fixed IV of the content envelope.
pub const CONTENT_IV: &[u8] = b"content";

/// Fixed IV of the attachments blob.
pub const ATTACHMENTS_IV: &[u8] = b"attachments";

/// Fixed IV of version 0 meta envelopes.
pub const META_V0_IV: &[u8] = b"meta";

/// Length of random IVs.
pub const RANDOM_IV_BYTES: usize = 128 / 8;

/// Bit size of the per-message symmetric key.
pub const MESSAGE_SYMM_KEY_BITS: usize = 256;

/// Bit size of the per-account private data key.
pub const PRIVATE_DATA_KEY_BITS: usize = 256;

/// Whether the IV is written in front of the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvMode {
    /// `iv || ciphertext`
    Prepend,
    /// ciphertext only, the IV is known to both sides.
    Omit,
}

// ── Key ───────────────────────────────────────────────────────────────────────

/// Raw symmetric key bytes.  Drop clears memory via ZeroizeOnDrop.
///
/// The length is not validated on construction: a key read off the wire is
/// checked against the expected size by the caller (`bit_size`), and the
/// cipher rejects anything that isn't 32 bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey(Vec<u8>);

impl SymmetricKey {
    /// Fresh random key of `bits` bits (must be a multiple of 8).
    pub fn generate(bits: usize) -> Self {
        debug_assert!(bits % 8 == 0);
        let mut bytes = vec![0u8; bits / 8];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Fresh per-message key.
    pub fn generate_message_key() -> Self {
        Self::generate(MESSAGE_SYMM_KEY_BITS)
    }

    /// Fresh per-account private data key.
    pub fn generate_private_data_key() -> Self {
        Self::generate(PRIVATE_DATA_KEY_BITS)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        Ok(Self(STANDARD.decode(encoded)?))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn bit_size(&self) -> usize {
        self.0.len() * 8
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({} bits, redacted)", self.bit_size())
    }
}

/// Random IV of `len` bytes.
pub fn random_iv(len: usize) -> Vec<u8> {
    let mut iv = vec![0u8; len];
    OsRng.fill_bytes(&mut iv);
    iv
}

// ── Encrypt / decrypt ─────────────────────────────────────────────────────────

/// Encrypt `plaintext` under `key` with an explicit IV.
pub fn encrypt(
    key: &SymmetricKey,
    iv: &[u8],
    plaintext: &[u8],
    mode: IvMode,
) -> Result<Vec<u8>, CryptoError> {
    if plaintext.is_empty() {
        return Ok(Vec::new());
    }

    let ciphertext = match iv.len() {
        4 => seal::<U4>(key, iv, plaintext)?,
        7 => seal::<U7>(key, iv, plaintext)?,
        11 => seal::<U11>(key, iv, plaintext)?,
        12 => seal::<U12>(key, iv, plaintext)?,
        16 => seal::<U16>(key, iv, plaintext)?,
        other => return Err(CryptoError::UnsupportedIvLength(other)),
    };

    match mode {
        IvMode::Omit => Ok(ciphertext),
        IvMode::Prepend => {
            let mut out = Vec::with_capacity(iv.len() + ciphertext.len());
            out.extend_from_slice(iv);
            out.extend_from_slice(&ciphertext);
            Ok(out)
        }
    }
}

/// Encrypt with a fresh random IV, prepended to the output.
pub fn encrypt_with_random_iv(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let iv = random_iv(RANDOM_IV_BYTES);
    encrypt(key, &iv, plaintext, IvMode::Prepend)
}

/// Decrypt ciphertext produced with a known IV (`IvMode::Omit`).
pub fn decrypt(
    key: &SymmetricKey,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.is_empty() {
        return Ok(Zeroizing::new(Vec::new()));
    }

    let plaintext = match iv.len() {
        4 => open::<U4>(key, iv, ciphertext)?,
        7 => open::<U7>(key, iv, ciphertext)?,
        11 => open::<U11>(key, iv, ciphertext)?,
        12 => open::<U12>(key, iv, ciphertext)?,
        16 => open::<U16>(key, iv, ciphertext)?,
        other => return Err(CryptoError::UnsupportedIvLength(other)),
    };
    Ok(Zeroizing::new(plaintext))
}

/// Decrypt wire-format bytes (iv || ciphertext+tag) where the IV is
/// `iv_len` bytes long.
pub fn decrypt_prepended(
    key: &SymmetricKey,
    iv_len: usize,
    data: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if data.is_empty() {
        return Ok(Zeroizing::new(Vec::new()));
    }
    if data.len() < iv_len {
        return Err(CryptoError::MissingIv(iv_len));
    }
    let (iv, ciphertext) = data.split_at(iv_len);
    decrypt(key, iv, ciphertext)
}

fn seal<N: ArrayLength<u8>>(
    key: &SymmetricKey,
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesGcm::<Aes256, N>::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::InvalidKey(format!("AES-256 key must be 32 bytes, got {}", key.as_bytes().len())))?;
    cipher
        .encrypt(GenericArray::from_slice(iv), plaintext)
        .map_err(|_| CryptoError::AeadEncrypt)
}

fn open<N: ArrayLength<u8>>(
    key: &SymmetricKey,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = AesGcm::<Aes256, N>::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::AeadDecrypt)?;
    cipher
        .decrypt(GenericArray::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::AeadDecrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_iv_roundtrip() {
        let key = SymmetricKey::generate_message_key();
        for iv in [CONTENT_IV, ATTACHMENTS_IV, META_V0_IV] {
            let ct = encrypt(&key, iv, b"hello world", IvMode::Omit).unwrap();
            assert_eq!(ct.len(), b"hello world".len() + 16);
            let pt = decrypt(&key, iv, &ct).unwrap();
            assert_eq!(pt.as_slice(), b"hello world");
        }
    }

    #[test]
    fn random_iv_is_prepended() {
        let key = SymmetricKey::generate_private_data_key();
        let ct = encrypt_with_random_iv(&key, b"{\"read\":1}").unwrap();
        assert_eq!(ct.len(), RANDOM_IV_BYTES + 10 + 16);
        let pt = decrypt_prepended(&key, RANDOM_IV_BYTES, &ct).unwrap();
        assert_eq!(pt.as_slice(), b"{\"read\":1}");
    }

    #[test]
    fn empty_input_is_empty_output() {
        let key = SymmetricKey::generate_message_key();
        assert!(encrypt(&key, CONTENT_IV, b"", IvMode::Omit).unwrap().is_empty());
        assert!(decrypt(&key, CONTENT_IV, b"").unwrap().is_empty());
        assert!(decrypt_prepended(&key, RANDOM_IV_BYTES, b"").unwrap().is_empty());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = SymmetricKey::generate_message_key();
        let mut ct = encrypt(&key, CONTENT_IV, b"payload", IvMode::Omit).unwrap();
        ct[0] ^= 0x01;
        assert!(matches!(decrypt(&key, CONTENT_IV, &ct), Err(CryptoError::AeadDecrypt)));
    }

    #[test]
    fn wrong_iv_fails() {
        let key = SymmetricKey::generate_message_key();
        let ct = encrypt(&key, CONTENT_IV, b"payload", IvMode::Omit).unwrap();
        assert!(decrypt(&key, ATTACHMENTS_IV, &ct).is_err());
    }

    #[test]
    fn unsupported_iv_length_rejected() {
        let key = SymmetricKey::generate_message_key();
        assert!(matches!(
            encrypt(&key, b"xy", b"payload", IvMode::Omit),
            Err(CryptoError::UnsupportedIvLength(2))
        ));
    }

    #[test]
    fn short_prepended_data_rejected() {
        let key = SymmetricKey::generate_message_key();
        assert!(matches!(
            decrypt_prepended(&key, RANDOM_IV_BYTES, &[1, 2, 3]),
            Err(CryptoError::MissingIv(16))
        ));
    }

    #[test]
    fn wrong_key_size_rejected() {
        let key = SymmetricKey::from_bytes(&[7u8; 16]);
        assert!(matches!(
            encrypt(&key, CONTENT_IV, b"payload", IvMode::Omit),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn key_base64_roundtrip() {
        let key = SymmetricKey::generate_message_key();
        let decoded = SymmetricKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.bit_size(), MESSAGE_SYMM_KEY_BITS);
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = SymmetricKey::from_bytes(&[0xAB; 32]);
        assert_eq!(format!("{key:?}"), "SymmetricKey(256 bits, redacted)");
    }
}
