//! Attachments: the index written into the content JSON, the concatenated
//! payload blob, and the receive-side pipeline that splits the decrypted
//! blob back into one sink per attachment.
//!
//! Receive pipeline, outermost first:
//!
//!   ciphertext chunks
//!     → size limit (attachments ceiling, counted on ciphertext)
//!     → AES-256/GCM open, IV `"attachments"`
//!     → streaming decompress, `chunk_bytes` of output at a time
//!     → AttachmentSplitter → HashVerifyingSink → storage sink
//!
//! The splitter routes exactly `size[i]` bytes to attachment `i` however
//! the incoming chunks fall across attachment boundaries.

use std::collections::VecDeque;

use tracing::{debug, warn};

use dl_crypto::hash::Sha512Hasher;
use dl_crypto::symmetric::{self, ATTACHMENTS_IV};
use dl_crypto::{IvMode, SymmetricKey};

use crate::compressor::MessageCompressor;
use crate::error::{CodecError, IntegrityError, Result};
use crate::limits::Limits;
use crate::provider::AttachmentStreamFactory;
use crate::types::{AttachmentMeta, StoredAttachment};

/// Destination of one attachment's plaintext.
pub trait AttachmentSink {
    fn write(&mut self, data: &[u8]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

// ── Send side ─────────────────────────────────────────────────────────────────

/// Build the index and the concatenated payload, in stored order.
pub fn concat(attachments: Vec<StoredAttachment>) -> Result<(Vec<AttachmentMeta>, Vec<u8>)> {
    let total: usize = attachments.iter().map(|a| a.content.len()).sum();
    let mut index = Vec::with_capacity(attachments.len());
    let mut data = Vec::with_capacity(total);

    for StoredAttachment { meta, content } in attachments {
        if meta.size as usize != content.len() {
            return Err(IntegrityError::AttachmentSizeMismatch {
                index: meta.index,
                declared: meta.size,
                actual: content.len(),
            }
            .into());
        }
        data.extend_from_slice(&content);
        index.push(meta);
    }
    Ok((index, data))
}

/// Seal the attachments blob under the message key.  Empty stays empty.
pub fn encrypt(data: &[u8], symm_key: &SymmetricKey) -> Result<Vec<u8>> {
    Ok(symmetric::encrypt(symm_key, ATTACHMENTS_IV, data, IvMode::Omit)?)
}

// ── Splitter ──────────────────────────────────────────────────────────────────

struct Pending {
    index: u32,
    size: u32,
    hash: String,
}

pub struct AttachmentSplitter<'f> {
    factory: &'f mut dyn AttachmentStreamFactory,
    pending: VecDeque<Pending>,
    current: Option<Box<dyn AttachmentSink>>,
    remaining: u64,
}

impl<'f> AttachmentSplitter<'f> {
    pub fn new(index: &[AttachmentMeta], factory: &'f mut dyn AttachmentStreamFactory) -> Result<Self> {
        let pending = index
            .iter()
            .map(|a| Pending {
                index: a.index,
                size: a.size,
                hash: a.hash.clone(),
            })
            .collect();
        let mut splitter = Self {
            factory,
            pending,
            current: None,
            remaining: 0,
        };
        splitter.open_next()?;
        Ok(splitter)
    }

    /// Bytes still expected across all attachments.
    pub fn bytes_expected(&self) -> u64 {
        self.remaining + self.pending.iter().map(|p| u64::from(p.size)).sum::<u64>()
    }

    /// Route `data` to the current attachment(s).  Bytes beyond the last
    /// attachment fail this write.
    pub fn write(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let Some(sink) = self.current.as_mut() else {
                warn!(excess = data.len(), "[attachments] stream is too long");
                return Err(IntegrityError::StreamTooLong.into());
            };

            let n = data.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
            if n > 0 {
                sink.write(&data[..n])?;
            }
            data = &data[n..];
            self.remaining -= n as u64;

            if self.remaining == 0 {
                self.close_current()?;
                self.open_next()?;
            }
        }
        Ok(())
    }

    /// Finish: trailing empty attachments complete here, anything still
    /// expected fails.
    pub fn close(mut self) -> Result<()> {
        while self.current.is_some() && self.remaining == 0 {
            self.close_current()?;
            self.open_next()?;
        }
        if self.current.is_some() || !self.pending.is_empty() {
            warn!(missing = self.bytes_expected(), "[attachments] stream is too short");
            return Err(IntegrityError::StreamTooShort.into());
        }
        Ok(())
    }

    fn open_next(&mut self) -> Result<()> {
        if let Some(next) = self.pending.pop_front() {
            debug!(index = next.index, size = next.size, "[attachments] opening sink");
            self.current = Some(self.factory.make_sink(next.index, next.size, &next.hash)?);
            self.remaining = u64::from(next.size);
        }
        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        if let Some(mut sink) = self.current.take() {
            sink.close()?;
        }
        Ok(())
    }
}

// ── Sink filters ──────────────────────────────────────────────────────────────

/// Checks the SHA-512 of everything written against the index hash on close.
pub struct HashVerifyingSink {
    inner: Box<dyn AttachmentSink>,
    hasher: Sha512Hasher,
    expected: String,
    index: u32,
}

impl HashVerifyingSink {
    pub fn new(index: u32, expected_hash: &str, inner: Box<dyn AttachmentSink>) -> Self {
        Self {
            inner,
            hasher: Sha512Hasher::new(),
            expected: expected_hash.to_owned(),
            index,
        }
    }
}

impl AttachmentSink for HashVerifyingSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.hasher.update(data);
        self.inner.write(data)
    }

    fn close(&mut self) -> Result<()> {
        let actual = std::mem::take(&mut self.hasher).hex_digest();
        if !actual.eq_ignore_ascii_case(&self.expected) {
            warn!(index = self.index, "[attachments] hash mismatch");
            return Err(IntegrityError::HashMismatch { index: self.index }.into());
        }
        self.inner.close()
    }
}

/// Fails once more than `max_bytes` have been written in total.
pub struct SizeLimitingSink<S> {
    inner: S,
    max_bytes: usize,
    written: usize,
}

impl<S: AttachmentSink> SizeLimitingSink<S> {
    pub fn new(inner: S, max_bytes: usize) -> Self {
        Self {
            inner,
            max_bytes,
            written: 0,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AttachmentSink> AttachmentSink for SizeLimitingSink<S> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.written = self.written.saturating_add(data.len());
        if self.written > self.max_bytes {
            return Err(CodecError::invalid("attachments are too large"));
        }
        self.inner.write(data)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Collects ciphertext until the transfer is complete; AES-GCM only
/// authenticates the blob as a whole.
#[derive(Default)]
struct CiphertextBuffer(Vec<u8>);

impl AttachmentSink for CiphertextBuffer {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.0.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receive-side attachment processing for one message.
pub struct AttachmentPipeline<'a> {
    input: SizeLimitingSink<CiphertextBuffer>,
    symm_key: &'a SymmetricKey,
    compressor: &'a dyn MessageCompressor,
    splitter: AttachmentSplitter<'a>,
    chunk_bytes: usize,
}

impl<'a> AttachmentPipeline<'a> {
    pub fn new(
        symm_key: &'a SymmetricKey,
        compressor: &'a dyn MessageCompressor,
        splitter: AttachmentSplitter<'a>,
        limits: &Limits,
        chunk_bytes: usize,
    ) -> Self {
        Self {
            input: SizeLimitingSink::new(CiphertextBuffer::default(), limits.attachments_max_bytes),
            symm_key,
            compressor,
            splitter,
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Feed one chunk of ciphertext as it arrives.
    pub fn write(&mut self, ciphertext: &[u8]) -> Result<()> {
        self.input.write(ciphertext)
    }

    /// Decrypt, then inflate straight into the splitter `chunk_bytes` at a
    /// time, so excess plaintext fails before the rest is inflated.
    pub fn finish(self) -> Result<()> {
        let ciphertext = self.input.into_inner().0;
        let mut splitter = self.splitter;
        if !ciphertext.is_empty() {
            let plaintext = symmetric::decrypt(self.symm_key, ATTACHMENTS_IV, &ciphertext)
                .map_err(|e| CodecError::invalid_with("attachments decryption failed", e))?;
            debug!(
                ciphertext = ciphertext.len(),
                expected = splitter.bytes_expected(),
                "[attachments] splitting"
            );
            self.compressor
                .decompress_to(&plaintext, self.chunk_bytes, &mut |chunk| splitter.write(chunk))?;
        }
        splitter.close()
    }

    /// Process a fully received ciphertext blob.
    pub fn open(mut self, ciphertext: &[u8]) -> Result<()> {
        self.write(ciphertext)?;
        self.finish()
    }
}
