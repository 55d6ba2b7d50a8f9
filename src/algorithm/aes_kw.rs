//! AES Key Wrap (RFC 3394): `A128KW`, `A192KW`, `A256KW`

use super::{symmetric_key, Algorithm, KeyWrapping};
use crate::error::{JweError, Result};
use crate::jwe::Header;
use crate::jwk::Jwk;
use crate::random::RandomSource;
use aes_kw::{KekAes128, KekAes192, KekAes256};
use zeroize::Zeroizing;

/// Wrap `cek` under `kek`, choosing AES-128/192/256 by KEK length
pub(crate) fn wrap(kek: &[u8], cek: &[u8]) -> Result<Vec<u8>> {
    let wrapped = match kek.len() {
        16 => kek_error(KekAes128::try_from(kek))?.wrap_vec(cek),
        24 => kek_error(KekAes192::try_from(kek))?.wrap_vec(cek),
        32 => kek_error(KekAes256::try_from(kek))?.wrap_vec(cek),
        len => {
            return Err(JweError::InvalidKey(format!(
                "unsupported key wrap KEK size: {} bits",
                len * 8
            )))
        }
    };
    wrapped.map_err(|e| JweError::Crypto(e.to_string()))
}

/// Unwrap an RFC 3394 blob; integrity check failures surface as errors
pub(crate) fn unwrap(kek: &[u8], wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let unwrapped = match kek.len() {
        16 => kek_error(KekAes128::try_from(kek))?.unwrap_vec(wrapped),
        24 => kek_error(KekAes192::try_from(kek))?.unwrap_vec(wrapped),
        32 => kek_error(KekAes256::try_from(kek))?.unwrap_vec(wrapped),
        len => {
            return Err(JweError::InvalidKey(format!(
                "unsupported key wrap KEK size: {} bits",
                len * 8
            )))
        }
    };
    unwrapped
        .map(Zeroizing::new)
        .map_err(|e| JweError::Crypto(e.to_string()))
}

fn kek_error<T>(result: std::result::Result<T, aes_kw::Error>) -> Result<T> {
    result.map_err(|e| JweError::InvalidKey(e.to_string()))
}

/// AES Key Wrap with a symmetric `oct` key
#[derive(Debug, Clone, Copy)]
pub struct AesKw {
    name: &'static str,
    key_len: usize,
}

impl AesKw {
    /// `A128KW`
    pub fn a128kw() -> Self {
        Self { name: "A128KW", key_len: 16 }
    }

    /// `A192KW`
    pub fn a192kw() -> Self {
        Self { name: "A192KW", key_len: 24 }
    }

    /// `A256KW`
    pub fn a256kw() -> Self {
        Self { name: "A256KW", key_len: 32 }
    }
}

impl Algorithm for AesKw {
    fn name(&self) -> &str {
        self.name
    }

    fn allowed_key_types(&self) -> &[&'static str] {
        &["oct"]
    }
}

impl KeyWrapping for AesKw {
    fn wrap_key(
        &self,
        recipient_key: &Jwk,
        cek: &[u8],
        _header: &Header,
        _random: &dyn RandomSource,
    ) -> Result<(Vec<u8>, Header)> {
        let kek = symmetric_key(recipient_key, self.key_len)?;
        Ok((wrap(&kek, cek)?, Header::new()))
    }

    fn unwrap_key(
        &self,
        recipient_key: &Jwk,
        encrypted_cek: &[u8],
        _header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let kek = symmetric_key(recipient_key, self.key_len)?;
        unwrap(&kek, encrypted_cek)
    }
}
