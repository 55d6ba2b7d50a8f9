//! Elliptic curve key agreement (RFC 7518 §4.6)
//!
//! `ECDH-ES` uses the Concat KDF output directly as the CEK, with the `enc`
//! identifier as AlgorithmID. `ECDH-ES+A*KW` derive a key wrap KEK instead,
//! with the `alg` identifier as AlgorithmID.
//!
//! Supported curves are P-256 and P-384. The sender's ephemeral public key is
//! returned as the `epk` header parameter.

use super::{aes_kw, Algorithm, KeyAgreement, KeyAgreementWrapping};
use crate::encoding;
use crate::error::{JweError, Result};
use crate::jwe::{header_bytes, Header};
use crate::jwk::Jwk;
use crate::random::{RandomSource, SourceRng};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Curve {
    P256,
    P384,
}

impl Curve {
    fn of(key: &Jwk) -> Result<Self> {
        match key.string_param("crv") {
            Some("P-256") => Ok(Curve::P256),
            Some("P-384") => Ok(Curve::P384),
            Some(other) => Err(JweError::InvalidKey(format!("unsupported curve: {}", other))),
            None => Err(JweError::MissingKeyParameter("crv".to_string())),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
        }
    }
}

/// A shared secret `Z` plus the ephemeral public coordinates that produced it
struct Ephemeral {
    z: Zeroizing<Vec<u8>>,
    x: Vec<u8>,
    y: Vec<u8>,
}

macro_rules! curve_ops {
    ($module:ident, $curve:ident) => {
        mod $module {
            use super::Ephemeral;
            use crate::error::{JweError, Result};
            use crate::random::SourceRng;
            use $curve::ecdh::diffie_hellman;
            use $curve::elliptic_curve::sec1::ToEncodedPoint;
            use $curve::{PublicKey, SecretKey};
            use zeroize::Zeroizing;

            fn public_key(x: &[u8], y: &[u8]) -> Result<PublicKey> {
                let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
                sec1.push(0x04);
                sec1.extend_from_slice(x);
                sec1.extend_from_slice(y);
                PublicKey::from_sec1_bytes(&sec1)
                    .map_err(|_| JweError::InvalidKey("invalid EC public key".to_string()))
            }

            pub(super) fn ephemeral(rng: &mut SourceRng<'_>, x: &[u8], y: &[u8]) -> Result<Ephemeral> {
                let recipient = public_key(x, y)?;
                let secret = SecretKey::random(rng);
                let shared = diffie_hellman(secret.to_nonzero_scalar(), recipient.as_affine());

                let point = secret.public_key().to_encoded_point(false);
                let (Some(epk_x), Some(epk_y)) = (point.x(), point.y()) else {
                    return Err(JweError::Crypto("ephemeral key at infinity".to_string()));
                };
                Ok(Ephemeral {
                    z: Zeroizing::new(shared.raw_secret_bytes().to_vec()),
                    x: epk_x.to_vec(),
                    y: epk_y.to_vec(),
                })
            }

            pub(super) fn agree(d: &[u8], x: &[u8], y: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
                let secret = SecretKey::from_slice(d)
                    .map_err(|_| JweError::InvalidKey("invalid EC private key".to_string()))?;
                let sender = public_key(x, y)?;
                let shared = diffie_hellman(secret.to_nonzero_scalar(), sender.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
        }
    };
}

curve_ops!(p256_ops, p256);
curve_ops!(p384_ops, p384);

/// Concat KDF (NIST SP 800-56A §5.8.1) with SHA-256, as profiled by JWA
pub(crate) fn concat_kdf(
    z: &[u8],
    algorithm_id: &str,
    apu: &[u8],
    apv: &[u8],
    key_bits: usize,
) -> Zeroizing<Vec<u8>> {
    let key_len = key_bits / 8;
    let mut output = Zeroizing::new(Vec::with_capacity(key_len + 32));
    let mut counter: u32 = 1;

    while output.len() < key_len {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(z);
        for field in [algorithm_id.as_bytes(), apu, apv] {
            hasher.update((field.len() as u32).to_be_bytes());
            hasher.update(field);
        }
        hasher.update((key_bits as u32).to_be_bytes());
        output.extend_from_slice(&hasher.finalize());
        counter += 1;
    }

    output.truncate(key_len);
    output
}

fn party_info(header: &Header, name: &str) -> Result<Vec<u8>> {
    if header.contains_key(name) {
        header_bytes(header, name)
    } else {
        Ok(Vec::new())
    }
}

/// Sender side: fresh ephemeral key against the recipient's public key
fn sender_agreement(
    recipient_key: &Jwk,
    header: &Header,
    algorithm_id: &str,
    key_bits: usize,
    random: &dyn RandomSource,
) -> Result<(Zeroizing<Vec<u8>>, Header)> {
    let curve = Curve::of(recipient_key)?;
    let x = recipient_key.bytes("x")?;
    let y = recipient_key.bytes("y")?;

    let mut rng = SourceRng(random);
    let ephemeral = match curve {
        Curve::P256 => p256_ops::ephemeral(&mut rng, &x, &y)?,
        Curve::P384 => p384_ops::ephemeral(&mut rng, &x, &y)?,
    };

    let key = concat_kdf(
        &ephemeral.z,
        algorithm_id,
        &party_info(header, "apu")?,
        &party_info(header, "apv")?,
        key_bits,
    );

    let mut additional = Header::new();
    additional.insert(
        "epk".to_string(),
        json!({
            "kty": "EC",
            "crv": curve.name(),
            "x": encoding::encode(&ephemeral.x),
            "y": encoding::encode(&ephemeral.y),
        }),
    );
    Ok((key, additional))
}

/// Recipient side: static private key against the sender's `epk`
fn recipient_agreement(
    recipient_key: &Jwk,
    header: &Header,
    algorithm_id: &str,
    key_bits: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let epk = match header.get("epk") {
        Some(value @ Value::Object(_)) => Jwk::from_value(value.clone())
            .map_err(|_| JweError::InvalidParameter("epk".to_string()))?,
        Some(_) => return Err(JweError::InvalidParameter("epk".to_string())),
        None => return Err(JweError::MissingParameter("epk".to_string())),
    };

    let curve = Curve::of(recipient_key)?;
    if Curve::of(&epk)? != curve {
        return Err(JweError::InvalidParameter("epk".to_string()));
    }

    let d = recipient_key.bytes("d")?;
    let x = epk.bytes("x")?;
    let y = epk.bytes("y")?;
    let z = match curve {
        Curve::P256 => p256_ops::agree(&d, &x, &y)?,
        Curve::P384 => p384_ops::agree(&d, &x, &y)?,
    };

    Ok(concat_kdf(
        &z,
        algorithm_id,
        &party_info(header, "apu")?,
        &party_info(header, "apv")?,
        key_bits,
    ))
}

/// Direct key agreement (`ECDH-ES`)
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdhEs;

impl Algorithm for EcdhEs {
    fn name(&self) -> &str {
        "ECDH-ES"
    }

    fn allowed_key_types(&self) -> &[&'static str] {
        &["EC"]
    }
}

impl KeyAgreement for EcdhEs {
    fn derive_key(
        &self,
        cek_size_bits: usize,
        enc: &str,
        recipient_key: &Jwk,
        header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Zeroizing<Vec<u8>>, Header)> {
        sender_agreement(recipient_key, header, enc, cek_size_bits, random)
    }

    fn recover_key(
        &self,
        cek_size_bits: usize,
        enc: &str,
        recipient_key: &Jwk,
        header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>> {
        recipient_agreement(recipient_key, header, enc, cek_size_bits)
    }
}

/// Key agreement with AES key wrap (`ECDH-ES+A128KW`, `+A192KW`, `+A256KW`)
#[derive(Debug, Clone, Copy)]
pub struct EcdhEsKw {
    name: &'static str,
    kek_bits: usize,
}

impl EcdhEsKw {
    pub fn a128kw() -> Self {
        Self {
            name: "ECDH-ES+A128KW",
            kek_bits: 128,
        }
    }

    pub fn a192kw() -> Self {
        Self {
            name: "ECDH-ES+A192KW",
            kek_bits: 192,
        }
    }

    pub fn a256kw() -> Self {
        Self {
            name: "ECDH-ES+A256KW",
            kek_bits: 256,
        }
    }
}

impl Algorithm for EcdhEsKw {
    fn name(&self) -> &str {
        self.name
    }

    fn allowed_key_types(&self) -> &[&'static str] {
        &["EC"]
    }
}

impl KeyAgreementWrapping for EcdhEsKw {
    fn wrap_agreement_key(
        &self,
        recipient_key: &Jwk,
        cek: &[u8],
        _cek_size_bits: usize,
        header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Vec<u8>, Header)> {
        let (kek, additional) =
            sender_agreement(recipient_key, header, self.name, self.kek_bits, random)?;
        Ok((aes_kw::wrap(&kek, cek)?, additional))
    }

    fn unwrap_agreement_key(
        &self,
        recipient_key: &Jwk,
        encrypted_cek: &[u8],
        _cek_size_bits: usize,
        header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let kek = recipient_agreement(recipient_key, header, self.name, self.kek_bits)?;
        aes_kw::unwrap(&kek, encrypted_cek)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::OsRandom;

    // RFC 7518 Appendix C
    fn alice_epk() -> Value {
        json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "gI0GAILBdu7T53akrFmMyGcsF3n5dO7MmwNBHKW5SV0",
            "y": "SLW_xSffzlPWrHEVI30DHM_4egVwt3NQqeUD7nMFpps"
        })
    }

    fn bob_key() -> Jwk {
        Jwk::from_value(json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "weNJy2HscCSM6AEDTDg04biOvhFhyyWvOHQfeF_PxMQ",
            "y": "e8lnCO-AlStT-NJVX-crhB7QRYhiix03illJOVAOyck",
            "d": "VEmDZpDXXK8p8N0Cndsxs924q6nS1RXFASRl6BfUqdw"
        }))
        .unwrap()
    }

    fn p384_key() -> Jwk {
        let secret = p384::SecretKey::random(&mut rand::rngs::OsRng);
        let point = p384::elliptic_curve::sec1::ToEncodedPoint::to_encoded_point(
            &secret.public_key(),
            false,
        );
        Jwk::from_value(json!({
            "kty": "EC",
            "crv": "P-384",
            "x": encoding::encode(point.x().unwrap()),
            "y": encoding::encode(point.y().unwrap()),
            "d": encoding::encode(secret.to_bytes()),
        }))
        .unwrap()
    }

    #[test]
    fn test_rfc7518_appendix_c() -> Result<()> {
        let mut header = Header::new();
        header.insert("epk".to_string(), alice_epk());
        header.insert("apu".to_string(), json!("QWxpY2U"));
        header.insert("apv".to_string(), json!("Qm9i"));

        let cek = EcdhEs.recover_key(128, "A128GCM", &bob_key(), &header)?;
        assert_eq!(encoding::encode(cek.as_slice()), "VqqN6vgjbSBcIijNcacQGg");
        Ok(())
    }

    #[test]
    fn test_concat_kdf_multiple_rounds() {
        let short = concat_kdf(b"z", "A256CBC-HS512", b"", b"", 256);
        let long = concat_kdf(b"z", "A256CBC-HS512", b"", b"", 512);
        assert_eq!(short.len(), 32);
        assert_eq!(long.len(), 64);
        // keydatalen is part of every round's input
        assert_ne!(&long[..32], short.as_slice());
    }

    #[test]
    fn test_agreement_round_trip() -> Result<()> {
        for key in [bob_key(), p384_key()] {
            let (cek, additional) =
                EcdhEs.derive_key(256, "A128CBC-HS256", &key.to_public(), &Header::new(), &OsRandom)?;
            assert_eq!(cek.len(), 32);
            assert_eq!(additional["epk"]["crv"], key.param("crv").cloned().unwrap());
            assert!(additional["epk"].get("d").is_none());

            let recovered = EcdhEs.recover_key(256, "A128CBC-HS256", &key, &additional)?;
            assert_eq!(recovered, cek);
        }
        Ok(())
    }

    #[test]
    fn test_agreement_wrapping_round_trip() -> Result<()> {
        let alg = EcdhEsKw::a256kw();
        let cek = [0x11u8; 32];
        let mut header = Header::new();
        header.insert("apu".to_string(), json!(encoding::encode(b"sender")));

        let (wrapped, additional) =
            alg.wrap_agreement_key(&bob_key().to_public(), &cek, 256, &header, &OsRandom)?;
        header.extend(additional);
        let unwrapped = alg.unwrap_agreement_key(&bob_key(), &wrapped, 256, &header)?;
        assert_eq!(unwrapped.as_slice(), &cek);

        // Party info is bound into the KEK
        header.insert("apu".to_string(), json!(encoding::encode(b"mallory")));
        assert!(alg.unwrap_agreement_key(&bob_key(), &wrapped, 256, &header).is_err());
        Ok(())
    }

    #[test]
    fn test_curve_mismatch_rejected() {
        let mut header = Header::new();
        header.insert("epk".to_string(), alice_epk());
        let result = EcdhEs.recover_key(128, "A128GCM", &p384_key(), &header);
        assert!(matches!(result, Err(JweError::InvalidParameter(p)) if p == "epk"));
    }

    #[test]
    fn test_unsupported_curve() -> Result<()> {
        let key = Jwk::from_value(json!({"kty": "EC", "crv": "P-521", "x": "AA", "y": "AA"}))?;
        let result = EcdhEs.derive_key(128, "A128GCM", &key, &Header::new(), &OsRandom);
        assert!(matches!(result, Err(JweError::InvalidKey(_))));
        Ok(())
    }

    #[test]
    fn test_missing_epk() {
        let result = EcdhEs.recover_key(128, "A128GCM", &bob_key(), &Header::new());
        assert!(matches!(result, Err(JweError::MissingParameter(p)) if p == "epk"));
    }
}
