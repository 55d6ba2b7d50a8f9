//! Payload compression (`zip` header parameter)

use crate::algorithm::{AlgorithmRegistry, Named};
use crate::error::{JweError, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

/// A compression method identified by its `zip` value
pub trait CompressionMethod: Send + Sync {
    fn name(&self) -> &str;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Fails with [`JweError::DecompressionFailed`] on a malformed stream or
    /// when the output would exceed the method's size limit
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Upper bound on an inflated payload unless configured otherwise (16 MiB)
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 16 * 1024 * 1024;

/// Raw DEFLATE (RFC 1951), `zip: "DEF"`
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    level: Compression,
    max_decompressed_size: usize,
}

impl Deflate {
    /// Compress at `level` (0 to 9, higher values are clamped)
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
            ..Self::default()
        }
    }

    /// Refuse to inflate payloads larger than `max` bytes
    #[must_use]
    pub fn with_max_decompressed_size(self, max: usize) -> Self {
        Self {
            max_decompressed_size: max,
            ..self
        }
    }

    pub fn max_decompressed_size(&self) -> usize {
        self.max_decompressed_size
    }
}

impl Default for Deflate {
    fn default() -> Self {
        Self {
            level: Compression::default(),
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
        }
    }
}

impl CompressionMethod for Deflate {
    fn name(&self) -> &str {
        "DEF"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
        encoder
            .write_all(data)
            .map_err(|e| JweError::CompressionFailed(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| JweError::CompressionFailed(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let limit = u64::try_from(self.max_decompressed_size)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let mut decompressed = Vec::new();
        DeflateDecoder::new(data)
            .take(limit)
            .read_to_end(&mut decompressed)
            .map_err(|_| JweError::DecompressionFailed)?;
        if decompressed.len() > self.max_decompressed_size {
            debug!(limit = self.max_decompressed_size, "inflated payload exceeds limit");
            return Err(JweError::DecompressionFailed);
        }
        Ok(decompressed)
    }
}

impl Named for Arc<dyn CompressionMethod> {
    fn name(&self) -> &str {
        CompressionMethod::name(self.as_ref())
    }
}

/// Lookup table from `zip` value to compression method
pub type CompressionRegistry = AlgorithmRegistry<Arc<dyn CompressionMethod>>;

impl AlgorithmRegistry<Arc<dyn CompressionMethod>> {
    /// Registry holding `DEF`
    pub fn standard() -> Self {
        let methods: Vec<Arc<dyn CompressionMethod>> = vec![Arc::new(Deflate::default())];
        Self::new(methods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_round_trip() -> Result<()> {
        let data = b"Live long and prosper. Live long and prosper. Live long and prosper.";
        let deflate = Deflate::default();
        let compressed = deflate.compress(data)?;
        assert!(compressed.len() < data.len());
        assert_eq!(deflate.decompress(&compressed)?, data);
        Ok(())
    }

    #[test]
    fn test_malformed_stream() {
        // 0xff starts a block with the reserved type 0b11
        let result = Deflate::new(6).decompress(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(JweError::DecompressionFailed)));
    }

    #[test]
    fn test_decompressed_size_limit() -> Result<()> {
        let data = vec![0u8; 64 * 1024];
        let compressed = Deflate::default().compress(&data)?;
        assert!(compressed.len() < 1024);

        let capped = Deflate::default().with_max_decompressed_size(data.len() - 1);
        assert!(matches!(
            capped.decompress(&compressed),
            Err(JweError::DecompressionFailed)
        ));

        // Exactly at the limit is fine
        let exact = Deflate::default().with_max_decompressed_size(data.len());
        assert_eq!(exact.decompress(&compressed)?, data);
        assert_eq!(Deflate::new(9).max_decompressed_size(), DEFAULT_MAX_DECOMPRESSED_SIZE);
        Ok(())
    }

    #[test]
    fn test_registry() -> Result<()> {
        let registry = CompressionRegistry::standard();
        assert_eq!(registry.list(), vec!["DEF"]);
        assert_eq!(registry.get("DEF")?.name(), "DEF");
        assert!(registry.get("GZIP").is_err());
        Ok(())
    }
}
