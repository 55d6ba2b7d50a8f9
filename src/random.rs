//! Injectable randomness
//!
//! CEKs, IVs, salts, RSA padding and ephemeral EC keys all draw from a
//! [`RandomSource`]. Production code uses [`OsRandom`]; tests may plug in a
//! deterministic source.

use rand::{rngs::OsRng, CryptoRng, RngCore};

/// A cryptographically secure source of random bytes
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes
    fn fill(&self, dest: &mut [u8]);
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Allocate `len` random bytes from `source`
pub fn random_bytes(source: &dyn RandomSource, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    source.fill(&mut bytes);
    bytes
}

/// Adapter exposing a [`RandomSource`] through the `rand` traits
///
/// Primitive crates (RSA padding, EC key generation) expect an
/// `RngCore + CryptoRng` value.
pub(crate) struct SourceRng<'a>(pub(crate) &'a dyn RandomSource);

impl RngCore for SourceRng<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.0.fill(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.0.fill(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.fill(dest);
        Ok(())
    }
}

impl CryptoRng for SourceRng<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    impl RandomSource for Counter {
        fn fill(&self, dest: &mut [u8]) {
            for (i, b) in dest.iter_mut().enumerate() {
                *b = i as u8;
            }
        }
    }

    #[test]
    fn test_os_random_differs() {
        let a = random_bytes(&OsRandom, 32);
        let b = random_bytes(&OsRandom, 32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_adapter_uses_source() {
        let mut rng = SourceRng(&Counter);
        let mut buf = [0xffu8; 4];
        rng.fill_bytes(&mut buf);
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(rng.next_u32(), u32::from_le_bytes([0, 1, 2, 3]));
    }
}
