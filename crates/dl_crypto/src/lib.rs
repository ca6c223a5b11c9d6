//! dl_crypto: primitives adapter for the Darklock message codec
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Key types are tagged (encryption vs. signature) and checked on use.
//!
//! # Module layout
//! - `asymmetric`: RSA key pairs, OAEP(SHA-512) encrypt/decrypt
//! - `signer`: PSS(SHA-512) sign/verify
//! - `symmetric`: AES-256/GCM with fixed or random (prepended) IVs
//! - `hash`: SHA-256 / SHA-512 helpers, truncated 8-byte hash
//! - `error`: unified error type

pub mod asymmetric;
pub mod error;
pub mod hash;
pub mod signer;
pub mod symmetric;

pub use asymmetric::{AsymmetricKeyType, PrivateKey, PublicKey};
pub use error::CryptoError;
pub use symmetric::{IvMode, SymmetricKey};
