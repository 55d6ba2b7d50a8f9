//! RSA key encryption: `RSA1_5`, `RSA-OAEP`, `RSA-OAEP-256`

use super::{Algorithm, KeyEncryption};
use crate::error::{JweError, Result};
use crate::jwe::Header;
use crate::jwk::Jwk;
use crate::random::{random_bytes, OsRandom, RandomSource, SourceRng};
use ::rsa::{BigUint, Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Padding {
    Pkcs1v15,
    OaepSha1,
    OaepSha256,
}

/// RSA key encryption, one instance per padding scheme
#[derive(Debug, Clone, Copy)]
pub struct Rsa {
    name: &'static str,
    padding: Padding,
}

impl Rsa {
    /// `RSA1_5`: PKCS #1 v1.5 padding
    pub fn rsa1_5() -> Self {
        Self {
            name: "RSA1_5",
            padding: Padding::Pkcs1v15,
        }
    }

    /// `RSA-OAEP`: OAEP with SHA-1 and MGF1-SHA-1
    pub fn oaep() -> Self {
        Self {
            name: "RSA-OAEP",
            padding: Padding::OaepSha1,
        }
    }

    /// `RSA-OAEP-256`: OAEP with SHA-256 and MGF1-SHA-256
    pub fn oaep_256() -> Self {
        Self {
            name: "RSA-OAEP-256",
            padding: Padding::OaepSha256,
        }
    }
}

fn big_uint(key: &Jwk, name: &str) -> Result<BigUint> {
    Ok(BigUint::from_bytes_be(&key.bytes(name)?))
}

/// Public half of an `RSA` JWK
pub fn public_key(key: &Jwk) -> Result<RsaPublicKey> {
    RsaPublicKey::new(big_uint(key, "n")?, big_uint(key, "e")?)
        .map_err(|e| JweError::InvalidKey(e.to_string()))
}

/// Private `RSA` JWK; `p` and `q` are recovered from `d` when absent
pub fn private_key(key: &Jwk) -> Result<RsaPrivateKey> {
    let primes = if key.has_param("p") && key.has_param("q") {
        vec![big_uint(key, "p")?, big_uint(key, "q")?]
    } else {
        Vec::new()
    };
    RsaPrivateKey::from_components(
        big_uint(key, "n")?,
        big_uint(key, "e")?,
        big_uint(key, "d")?,
        primes,
    )
    .map_err(|e| JweError::InvalidKey(e.to_string()))
}

impl Algorithm for Rsa {
    fn name(&self) -> &str {
        self.name
    }

    fn allowed_key_types(&self) -> &[&'static str] {
        &["RSA"]
    }
}

impl KeyEncryption for Rsa {
    fn encrypt_key(
        &self,
        recipient_key: &Jwk,
        cek: &[u8],
        _header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Vec<u8>, Header)> {
        let public = public_key(recipient_key)?;
        let mut rng = SourceRng(random);
        let encrypted = match self.padding {
            Padding::Pkcs1v15 => public.encrypt(&mut rng, Pkcs1v15Encrypt, cek),
            Padding::OaepSha1 => public.encrypt(&mut rng, Oaep::new::<Sha1>(), cek),
            Padding::OaepSha256 => public.encrypt(&mut rng, Oaep::new::<Sha256>(), cek),
        }
        .map_err(|e| JweError::Crypto(e.to_string()))?;
        Ok((encrypted, Header::new()))
    }

    fn decrypt_key(
        &self,
        recipient_key: &Jwk,
        encrypted_cek: &[u8],
        cek_size_bits: usize,
        _header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let private = private_key(recipient_key)?;
        let decrypted = match self.padding {
            Padding::Pkcs1v15 => {
                // RFC 7516 section 11.5: a padding or length failure must look
                // the same as a wrong CEK, so substitute a random one.
                let substitute = Zeroizing::new(random_bytes(&OsRandom, cek_size_bits / 8));
                return Ok(match private.decrypt(Pkcs1v15Encrypt, encrypted_cek) {
                    Ok(cek) if cek.len() * 8 == cek_size_bits => Zeroizing::new(cek),
                    _ => substitute,
                });
            }
            Padding::OaepSha1 => private.decrypt(Oaep::new::<Sha1>(), encrypted_cek),
            Padding::OaepSha256 => private.decrypt(Oaep::new::<Sha256>(), encrypted_cek),
        }
        .map_err(|e| JweError::Crypto(e.to_string()))?;
        Ok(Zeroizing::new(decrypted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding;
    use rand::rngs::OsRng;
    use ::rsa::traits::{PrivateKeyParts, PublicKeyParts};
    use serde_json::json;

    fn generated_jwk(with_primes: bool) -> Jwk {
        let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let mut value = json!({
            "kty": "RSA",
            "n": encoding::encode(private.n().to_bytes_be()),
            "e": encoding::encode(private.e().to_bytes_be()),
            "d": encoding::encode(private.d().to_bytes_be()),
        });
        if with_primes {
            value["p"] = json!(encoding::encode(private.primes()[0].to_bytes_be()));
            value["q"] = json!(encoding::encode(private.primes()[1].to_bytes_be()));
        }
        Jwk::from_value(value).unwrap()
    }

    #[test]
    fn test_all_paddings_round_trip() -> Result<()> {
        let key = generated_jwk(true);
        let public = key.to_public();
        let cek = [0x5au8; 32];

        for alg in [Rsa::rsa1_5(), Rsa::oaep(), Rsa::oaep_256()] {
            let (encrypted, extra) = alg.encrypt_key(&public, &cek, &Header::new(), &OsRandom)?;
            assert!(extra.is_empty());
            assert_eq!(encrypted.len(), 256);
            assert_eq!(alg.decrypt_key(&key, &encrypted, 256, &Header::new())?.as_slice(), &cek);
        }
        Ok(())
    }

    #[test]
    fn test_primes_recovered() -> Result<()> {
        let key = generated_jwk(false);
        let alg = Rsa::oaep_256();
        let (encrypted, _) = alg.encrypt_key(&key.to_public(), b"cek", &Header::new(), &OsRandom)?;
        assert_eq!(alg.decrypt_key(&key, &encrypted, 24, &Header::new())?.as_slice(), b"cek");
        Ok(())
    }

    #[test]
    fn test_public_key_cannot_decrypt() {
        let key = generated_jwk(true).to_public();
        let result = Rsa::oaep().decrypt_key(&key, &[0u8; 256], 128, &Header::new());
        assert!(matches!(result, Err(JweError::MissingKeyParameter(p)) if p == "d"));
    }

    #[test]
    fn test_padding_mismatch_fails() -> Result<()> {
        let key = generated_jwk(true);
        let (encrypted, _) = Rsa::oaep().encrypt_key(&key.to_public(), &[1u8; 16], &Header::new(), &OsRandom)?;
        assert!(Rsa::oaep_256()
            .decrypt_key(&key, &encrypted, 128, &Header::new())
            .is_err());
        Ok(())
    }

    #[test]
    fn test_pkcs1v15_failure_yields_random_cek() -> Result<()> {
        let key = generated_jwk(true);
        let alg = Rsa::rsa1_5();

        // Not a valid PKCS #1 v1.5 block
        let first = alg.decrypt_key(&key, &[0x5a; 256], 128, &Header::new())?;
        let second = alg.decrypt_key(&key, &[0x5a; 256], 128, &Header::new())?;
        assert_eq!(first.len(), 16);
        assert_ne!(first.as_slice(), second.as_slice());

        // Valid padding, but a 24-byte key where 16 bytes are expected
        let (encrypted, _) = alg.encrypt_key(&key.to_public(), &[7u8; 24], &Header::new(), &OsRandom)?;
        let substituted = alg.decrypt_key(&key, &encrypted, 128, &Header::new())?;
        assert_eq!(substituted.len(), 16);
        assert_ne!(substituted.as_slice(), &[7u8; 16]);
        Ok(())
    }
}
