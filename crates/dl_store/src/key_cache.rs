//! Memoizing wrapper around a `PrivateKeyProvider`.
//!
//! Loading a private key usually means decrypting it with the account's
//! master key; the decoder asks for the same encryption key once per message.
//! Failed lookups are not cached.

use std::collections::HashMap;

use dl_codec::error::BoxError;
use dl_codec::provider::PrivateKeyProvider;
use dl_crypto::{AsymmetricKeyType, PrivateKey};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Default)]
struct CacheState {
    keys: HashMap<(AsymmetricKeyType, u32), PrivateKey>,
    hits: u64,
    misses: u64,
}

pub struct CachingPrivateKeyProvider<P> {
    inner: P,
    state: Mutex<CacheState>,
}

impl<P: PrivateKeyProvider> CachingPrivateKeyProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn hits(&self) -> u64 {
        self.state.lock().hits
    }

    pub fn misses(&self) -> u64 {
        self.state.lock().misses
    }

    /// Drop every cached key, e.g. after the account is locked.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.keys.len();
        state.keys.clear();
        debug!(dropped, "[key_cache] cleared");
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: PrivateKeyProvider> PrivateKeyProvider for CachingPrivateKeyProvider<P> {
    fn private_key(&self, key_type: AsymmetricKeyType, key_id: u32) -> Result<PrivateKey, BoxError> {
        {
            let mut state = self.state.lock();
            if let Some(key) = state.keys.get(&(key_type, key_id)).cloned() {
                state.hits += 1;
                return Ok(key);
            }
            state.misses += 1;
        }

        // The lock is not held across the inner lookup, which may block.
        let key = self.inner.private_key(key_type, key_id)?;
        debug!(%key_type, key_id, "[key_cache] loaded");
        self.state
            .lock()
            .keys
            .entry((key_type, key_id))
            .or_insert_with(|| key.clone());
        Ok(key)
    }
}
