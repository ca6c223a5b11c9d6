//! dl_store: in-memory collaborators for the Darklock message codec
//!
//! The codec reaches storage and key material only through the traits in
//! `dl_codec::provider`.  This crate implements all of them in memory:
//!   - `MemoryStore`: conversations, drafts, received messages, avatars,
//!     attachment payloads and both key rings
//!   - `CachingPrivateKeyProvider`: memoizes private key lookups of any
//!     other provider
//!
//! Both are `Send + Sync`; state sits behind `parking_lot::Mutex`.

pub mod error;
pub mod key_cache;
pub mod memory;

pub use error::StoreError;
pub use key_cache::CachingPrivateKeyProvider;
pub use memory::{MemoryAttachmentFactory, MemoryStore};
