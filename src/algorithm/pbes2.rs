//! Password-based key wrapping (RFC 7518 §4.8)
//!
//! `PBES2-HS256+A128KW`, `PBES2-HS384+A192KW` and `PBES2-HS512+A256KW`
//! derive an AES key wrap KEK with PBKDF2. The password is the `k` member of
//! an `oct` key. The salt input is `UTF8(alg) || 0x00 || p2s`.
//!
//! `p2c` is attacker controlled on decryption, so unwrapping refuses counts
//! above [`Pbes2::max_iterations`].

use super::{aes_kw, Algorithm, KeyWrapping};
use crate::encoding;
use crate::error::{JweError, Result};
use crate::jwe::{header_bytes, Header};
use crate::jwk::Jwk;
use crate::random::{random_bytes, RandomSource};
use pbkdf2::pbkdf2_hmac;
use serde_json::Value;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

/// Default `p2s` length in bytes
pub const DEFAULT_SALT_SIZE: usize = 16;
/// Default `p2c` written when wrapping
pub const DEFAULT_ITERATIONS: u32 = 4096;
/// Default ceiling on a received `p2c`
pub const DEFAULT_MAX_ITERATIONS: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prf {
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

/// One PBES2 variant with its wrapping parameters
#[derive(Debug, Clone)]
pub struct Pbes2 {
    name: &'static str,
    prf: Prf,
    kek_len: usize,
    salt_size: usize,
    iterations: u32,
    max_iterations: u32,
}

impl Pbes2 {
    fn with_prf(name: &'static str, prf: Prf, kek_len: usize) -> Self {
        Self {
            name,
            prf,
            kek_len,
            salt_size: DEFAULT_SALT_SIZE,
            iterations: DEFAULT_ITERATIONS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// `PBES2-HS256+A128KW`
    pub fn hs256_a128kw() -> Self {
        Self::with_prf("PBES2-HS256+A128KW", Prf::HmacSha256, 16)
    }

    /// `PBES2-HS384+A192KW`
    pub fn hs384_a192kw() -> Self {
        Self::with_prf("PBES2-HS384+A192KW", Prf::HmacSha384, 24)
    }

    /// `PBES2-HS512+A256KW`
    pub fn hs512_a256kw() -> Self {
        Self::with_prf("PBES2-HS512+A256KW", Prf::HmacSha512, 32)
    }

    /// Salt length in bytes used when wrapping
    #[must_use]
    pub fn with_salt_size(mut self, salt_size: usize) -> Self {
        self.salt_size = salt_size;
        self
    }

    /// PBKDF2 iteration count used when wrapping
    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Largest `p2c` accepted when unwrapping
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn salt_size(&self) -> usize {
        self.salt_size
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    fn derive_kek(&self, password: &[u8], p2s: &[u8], p2c: u32) -> Zeroizing<Vec<u8>> {
        let mut salt = Vec::with_capacity(self.name.len() + 1 + p2s.len());
        salt.extend_from_slice(self.name.as_bytes());
        salt.push(0);
        salt.extend_from_slice(p2s);

        let mut kek = Zeroizing::new(vec![0u8; self.kek_len]);
        match self.prf {
            Prf::HmacSha256 => pbkdf2_hmac::<Sha256>(password, &salt, p2c, &mut kek),
            Prf::HmacSha384 => pbkdf2_hmac::<Sha384>(password, &salt, p2c, &mut kek),
            Prf::HmacSha512 => pbkdf2_hmac::<Sha512>(password, &salt, p2c, &mut kek),
        }
        kek
    }

    fn iteration_count(&self, header: &Header) -> Result<u32> {
        let p2c = header
            .get("p2c")
            .ok_or_else(|| JweError::MissingParameter("p2c".to_string()))?
            .as_u64()
            .ok_or_else(|| JweError::InvalidParameter("p2c".to_string()))?;
        if p2c == 0 || p2c > u64::from(self.max_iterations) {
            return Err(JweError::InvalidParameter("p2c".to_string()));
        }
        u32::try_from(p2c).map_err(|_| JweError::InvalidParameter("p2c".to_string()))
    }
}

impl Algorithm for Pbes2 {
    fn name(&self) -> &str {
        self.name
    }

    fn allowed_key_types(&self) -> &[&'static str] {
        &["oct"]
    }
}

impl KeyWrapping for Pbes2 {
    fn wrap_key(
        &self,
        recipient_key: &Jwk,
        cek: &[u8],
        _header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Vec<u8>, Header)> {
        if self.iterations == 0 {
            return Err(JweError::InvalidParameter("p2c".to_string()));
        }
        let password = recipient_key.bytes("k")?;
        let p2s = random_bytes(random, self.salt_size);
        let kek = self.derive_kek(&password, &p2s, self.iterations);

        let mut additional = Header::new();
        additional.insert("p2s".to_string(), Value::from(encoding::encode(&p2s)));
        additional.insert("p2c".to_string(), Value::from(self.iterations));
        Ok((aes_kw::wrap(&kek, cek)?, additional))
    }

    fn unwrap_key(
        &self,
        recipient_key: &Jwk,
        encrypted_cek: &[u8],
        header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let p2c = self.iteration_count(header)?;
        let p2s = header_bytes(header, "p2s")?;
        let password = recipient_key.bytes("k")?;
        let kek = self.derive_kek(&password, &p2s, p2c);
        aes_kw::unwrap(&kek, encrypted_cek)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::OsRandom;
    use serde_json::json;

    fn header(value: Value) -> Header {
        match value {
            Value::Object(map) => map,
            _ => Header::new(),
        }
    }

    #[test]
    fn test_rfc7517_appendix_c() -> Result<()> {
        let key = Jwk::oct(b"Thus from my lips, by yours, my sin is purged.");
        let encrypted = encoding::decode("TrqXOwuNUfDV9VPTNbyGvEJ9JMjefAVn-TR1uIxR9p6hsRQh9Tk7BA")?;
        let h = header(json!({"p2s": "2WCTcJZ1Rvd_CJuJripQ1w", "p2c": 4096}));

        let cek = Pbes2::hs256_a128kw().unwrap_key(&key, &encrypted, &h)?;
        assert_eq!(
            cek.as_slice(),
            &[
                111, 27, 25, 52, 66, 29, 20, 78, 92, 176, 56, 240, 65, 208, 82, 112, 161, 131, 36,
                55, 202, 236, 185, 172, 129, 23, 153, 194, 195, 48, 253, 182
            ]
        );
        Ok(())
    }

    #[test]
    fn test_wrap_emits_salt_and_count() -> Result<()> {
        let alg = Pbes2::hs384_a192kw().with_salt_size(8).with_iterations(1000);
        let key = Jwk::oct(b"correct horse battery staple");

        let (wrapped, h) = alg.wrap_key(&key, &[7u8; 24], &Header::new(), &OsRandom)?;
        assert_eq!(header_bytes(&h, "p2s")?.len(), 8);
        assert_eq!(h["p2c"], 1000);
        assert_eq!(alg.unwrap_key(&key, &wrapped, &h)?.as_slice(), &[7u8; 24]);
        Ok(())
    }

    #[test]
    fn test_iteration_bounds() -> Result<()> {
        let alg = Pbes2::hs512_a256kw().with_iterations(10).with_max_iterations(100);
        let key = Jwk::oct(b"pw");
        let (wrapped, _) = alg.wrap_key(&key, &[1u8; 16], &Header::new(), &OsRandom)?;

        for p2c in [json!(0), json!(101), json!("10"), json!(-5)] {
            let h = header(json!({"p2s": "AAAA", "p2c": p2c}));
            assert!(matches!(
                alg.unwrap_key(&key, &wrapped, &h),
                Err(JweError::InvalidParameter(p)) if p == "p2c"
            ));
        }

        let h = header(json!({"p2s": "AAAA"}));
        assert!(matches!(
            alg.unwrap_key(&key, &wrapped, &h),
            Err(JweError::MissingParameter(p)) if p == "p2c"
        ));
        Ok(())
    }
}
