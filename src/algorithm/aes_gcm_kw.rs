//! Key wrapping with AES-GCM: `A128GCMKW`, `A192GCMKW`, `A256GCMKW`
//!
//! The wrapping IV and tag travel as the `iv` and `tag` header parameters.

use super::content::{gcm_open, gcm_seal};
use super::{symmetric_key, Algorithm, KeyWrapping};
use crate::encoding;
use crate::error::Result;
use crate::jwe::{header_bytes, Header};
use crate::jwk::Jwk;
use crate::random::{random_bytes, RandomSource};
use serde_json::Value;
use zeroize::Zeroizing;

const IV_LEN: usize = 12;

/// AES-GCM key wrapping with a 96-bit random IV per wrap
#[derive(Debug, Clone, Copy)]
pub struct AesGcmKw {
    name: &'static str,
    key_len: usize,
}

impl AesGcmKw {
    /// `A128GCMKW`, 128-bit KEK
    pub fn a128gcmkw() -> Self {
        Self { name: "A128GCMKW", key_len: 16 }
    }

    /// `A192GCMKW`, 192-bit KEK
    pub fn a192gcmkw() -> Self {
        Self { name: "A192GCMKW", key_len: 24 }
    }

    /// `A256GCMKW`, 256-bit KEK
    pub fn a256gcmkw() -> Self {
        Self { name: "A256GCMKW", key_len: 32 }
    }
}

impl Algorithm for AesGcmKw {
    fn name(&self) -> &str {
        self.name
    }

    fn allowed_key_types(&self) -> &[&'static str] {
        &["oct"]
    }
}

impl KeyWrapping for AesGcmKw {
    fn wrap_key(
        &self,
        recipient_key: &Jwk,
        cek: &[u8],
        _header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Vec<u8>, Header)> {
        let kek = symmetric_key(recipient_key, self.key_len)?;
        let iv = random_bytes(random, IV_LEN);
        let (encrypted, tag) = gcm_seal(&kek, &iv, &[], cek)?;

        let mut additional = Header::new();
        additional.insert("iv".to_string(), Value::from(encoding::encode(&iv)));
        additional.insert("tag".to_string(), Value::from(encoding::encode(&tag)));
        Ok((encrypted, additional))
    }

    fn unwrap_key(
        &self,
        recipient_key: &Jwk,
        encrypted_cek: &[u8],
        header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let kek = symmetric_key(recipient_key, self.key_len)?;
        let iv = header_bytes(header, "iv")?;
        let tag = header_bytes(header, "tag")?;
        gcm_open(&kek, &iv, &[], encrypted_cek, &tag).map(Zeroizing::new)
    }
}
