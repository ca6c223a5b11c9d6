//! Content signatures: RSA-PSS with SHA-512 (salt length = digest length).
//!
//! Signing is randomized, so two signatures over the same data differ;
//! `verify` only reports whether a signature holds, never why it doesn't.

use rand::rngs::OsRng;
use rsa::pss::{BlindedSigningKey, Signature as PssSignature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use sha2::Sha512;

use crate::asymmetric::{ensure_type, AsymmetricKeyType, PrivateKey, PublicKey};
use crate::error::CryptoError;

/// Sign `data` with a signature key.
pub fn sign(data: &[u8], key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
    ensure_type(AsymmetricKeyType::Signature, key.key_type())?;
    let signing_key = BlindedSigningKey::<Sha512>::new(key.rsa().clone());
    let signature = signing_key
        .try_sign_with_rng(&mut OsRng, data)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(signature.to_vec())
}

/// Check `signature` over `data`.  Malformed signatures verify as `false`.
pub fn verify(data: &[u8], signature: &[u8], key: &PublicKey) -> Result<bool, CryptoError> {
    ensure_type(AsymmetricKeyType::Signature, key.key_type())?;
    let verifying_key = VerifyingKey::<Sha512>::new(key.rsa().clone());
    let signature = match PssSignature::try_from(signature) {
        Ok(signature) => signature,
        Err(_) => return Ok(false),
    };
    Ok(verifying_key.verify(data, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig_key() -> PrivateKey {
        PrivateKey::generate(AsymmetricKeyType::Signature, 2048).unwrap()
    }

    #[test]
    fn sign_verify_roundtrip() {
        let key = sig_key();
        let sig = sign(b"message body", &key).unwrap();
        assert_eq!(sig.len(), 256);
        assert!(verify(b"message body", &sig, &key.public_key()).unwrap());
    }

    #[test]
    fn tampered_data_does_not_verify() {
        let key = sig_key();
        let sig = sign(b"message body", &key).unwrap();
        assert!(!verify(b"message bodY", &sig, &key.public_key()).unwrap());
    }

    #[test]
    fn garbage_signature_does_not_verify() {
        let key = sig_key();
        assert!(!verify(b"message body", &[1, 2, 3], &key.public_key()).unwrap());
    }

    #[test]
    fn encryption_keys_cannot_sign() {
        let key = PrivateKey::generate(AsymmetricKeyType::Encryption, 2048).unwrap();
        assert!(matches!(sign(b"x", &key), Err(CryptoError::WrongKeyType { .. })));
    }
}
