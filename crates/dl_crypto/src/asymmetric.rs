//! Asymmetric key management
//!
//! Each account owns two families of RSA key pairs, both rotated over time
//! and addressed by a numeric key id:
//!   - *encryption* keys protect the per-message keySafe (OAEP, SHA-512)
//!   - *signature* keys sign message content (PSS, SHA-512, see `signer`)
//!
//! Keys carry their `AsymmetricKeyType`; every operation checks it so an
//! encryption key can never be used to sign and vice versa.

use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Modulus size used for freshly generated account keys.
pub const ASYMMETRIC_KEY_BITS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AsymmetricKeyType {
    Encryption,
    Signature,
}

impl fmt::Display for AsymmetricKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encryption => f.write_str("encryption"),
            Self::Signature => f.write_str("signature"),
        }
    }
}

pub(crate) fn ensure_type(
    expected: AsymmetricKeyType,
    actual: AsymmetricKeyType,
) -> Result<(), CryptoError> {
    if expected != actual {
        return Err(CryptoError::WrongKeyType { expected, actual });
    }
    Ok(())
}

// ── Private key ───────────────────────────────────────────────────────────────

/// RSA private key tagged with its purpose.  The inner key zeroizes itself
/// on drop.
#[derive(Clone)]
pub struct PrivateKey {
    key_type: AsymmetricKeyType,
    inner: RsaPrivateKey,
}

impl PrivateKey {
    pub fn generate(key_type: AsymmetricKeyType, bits: usize) -> Result<Self, CryptoError> {
        let inner = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self { key_type, inner })
    }

    /// Load from PKCS#8 DER.
    pub fn from_pkcs8_der(key_type: AsymmetricKeyType, der: &[u8]) -> Result<Self, CryptoError> {
        let inner = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { key_type, inner })
    }

    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let doc = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    pub fn key_type(&self) -> AsymmetricKeyType {
        self.key_type
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key_type: self.key_type,
            inner: RsaPublicKey::from(&self.inner),
        }
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, redacted)", self.key_type)
    }
}

// ── Public key ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    key_type: AsymmetricKeyType,
    inner: RsaPublicKey,
}

impl PublicKey {
    /// Load from SubjectPublicKeyInfo DER.
    pub fn from_der(key_type: AsymmetricKeyType, der: &[u8]) -> Result<Self, CryptoError> {
        let inner = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { key_type, inner })
    }

    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        let doc = self
            .inner
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(doc.as_bytes().to_vec())
    }

    pub fn key_type(&self) -> AsymmetricKeyType {
        self.key_type
    }

    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.inner
    }
}

// ── OAEP ──────────────────────────────────────────────────────────────────────

/// Encrypt `plaintext` for the holder of `key` (OAEP, SHA-512).
pub fn encrypt(plaintext: &[u8], key: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    ensure_type(AsymmetricKeyType::Encryption, key.key_type())?;
    key.rsa()
        .encrypt(&mut OsRng, Oaep::new::<Sha512>(), plaintext)
        .map_err(|e| CryptoError::AsymmetricEncrypt(e.to_string()))
}

/// Decrypt an OAEP (SHA-512) ciphertext.
pub fn decrypt(ciphertext: &[u8], key: &PrivateKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    ensure_type(AsymmetricKeyType::Encryption, key.key_type())?;
    let plaintext = key
        .rsa()
        .decrypt(Oaep::new::<Sha512>(), ciphertext)
        .map_err(|_| CryptoError::AsymmetricDecrypt)?;
    Ok(Zeroizing::new(plaintext))
}
