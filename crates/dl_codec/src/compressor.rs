//! Payload compression applied before encryption.
//!
//! Content is always compressed; the attachments blob only when non-empty.
//! The compressor is chosen by the caller and passed in, usually built from
//! `CodecConfig::compression`.

use std::io::{ErrorKind, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

pub trait MessageCompressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress `data` and hand the output to `out` at most `chunk_bytes`
    /// at a time.  The output is never held in full; an error from `out`
    /// stops inflation.
    fn decompress_to(
        &self,
        data: &[u8],
        chunk_bytes: usize,
        out: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()>;
}

/// gzip (RFC 1952), the format spoken on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gzip;

impl MessageCompressor for Gzip {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .and_then(|_| encoder.finish())
            .map_err(|e| CodecError::invalid_with("gzip compression failed", e))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::invalid_with("gzip data invalid", e))?;
        Ok(out)
    }

    fn decompress_to(
        &self,
        data: &[u8],
        chunk_bytes: usize,
        out: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        let mut decoder = GzDecoder::new(data);
        let mut buf = vec![0u8; chunk_bytes.max(1)];
        loop {
            let n = match decoder.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CodecError::invalid_with("gzip data invalid", e)),
            };
            out(&buf[..n])?;
        }
    }
}

/// Pass-through, for peers and tests that exchange raw payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl MessageCompressor for Uncompressed {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress_to(
        &self,
        data: &[u8],
        chunk_bytes: usize,
        out: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        data.chunks(chunk_bytes.max(1)).try_for_each(|chunk| out(chunk))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    #[default]
    Gzip,
    None,
}

impl CompressionMode {
    pub fn compressor(self) -> Box<dyn MessageCompressor> {
        match self {
            Self::Gzip => Box::new(Gzip),
            Self::None => Box::new(Uncompressed),
        }
    }
}
