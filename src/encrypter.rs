//! JWE encryption pipeline
//!
//! [`Encrypter::encrypt`] turns a `Building` JWE into an `Encrypted` one:
//!
//! 1. Resolve the single content encryption algorithm (`enc`)
//! 2. Resolve the optional compression method (`zip`)
//! 3. Resolve each recipient's key management algorithm and check that
//!    their modes can share a message
//! 4. Determine the CEK once for all recipients
//! 5. Encrypt or wrap the CEK for each recipient
//! 6. Fix the encoded shared protected header
//! 7. Encrypt the payload once
//!
//! The input JWE is never modified; on error nothing is returned.

use crate::algorithm::{
    check_key, ContentEncryption, ContentEncryptionRegistry, KeyManagement,
    KeyManagementMode, KeyManagementRegistry,
};
use crate::compression::{CompressionMethod, CompressionRegistry};
use crate::error::{JweError, Result};
use crate::jwe::{header_opt_str, header_str, Header, Jwe, Recipient};
use crate::jwk::{Jwk, KeyUsage};
use crate::random::{random_bytes, OsRandom, RandomSource};
use std::sync::Arc;
use tracing::{debug, trace};
use zeroize::Zeroizing;

/// Encrypts JWE messages with algorithms drawn from shared registries
#[derive(Clone)]
pub struct Encrypter {
    key_algorithms: KeyManagementRegistry,
    content_algorithms: ContentEncryptionRegistry,
    compression: CompressionRegistry,
    random: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for Encrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encrypter")
            .field("key_algorithms", &self.key_algorithms)
            .field("content_algorithms", &self.content_algorithms)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

impl Encrypter {
    pub fn new(
        key_algorithms: KeyManagementRegistry,
        content_algorithms: ContentEncryptionRegistry,
        compression: CompressionRegistry,
    ) -> Self {
        Self {
            key_algorithms,
            content_algorithms,
            compression,
            random: Arc::new(OsRandom),
        }
    }

    /// Replace the operating system RNG used for CEKs, IVs and salts
    #[must_use]
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn key_algorithms(&self) -> &KeyManagementRegistry {
        &self.key_algorithms
    }

    pub fn content_algorithms(&self) -> &ContentEncryptionRegistry {
        &self.content_algorithms
    }

    pub fn compression(&self) -> &CompressionRegistry {
        &self.compression
    }

    /// Encrypt `jwe`, returning the `Encrypted` message
    ///
    /// Recipient keys are discarded from the result.
    pub fn encrypt(&self, jwe: &Jwe) -> Result<Jwe> {
        if jwe.is_encrypted() {
            return Err(JweError::AlreadyEncrypted);
        }
        if jwe.recipients().is_empty() {
            return Err(JweError::NoRecipient);
        }
        let payload = jwe.payload().ok_or(JweError::MissingPayload)?;

        let headers: Vec<Header> = jwe
            .recipients()
            .iter()
            .map(|recipient| jwe.complete_header(recipient))
            .collect();

        let content = self.content_algorithm(&headers)?;
        let compression = self.compression_method(&headers)?;
        let key_algorithms = self.key_management_algorithms(&headers)?;
        let mode = key_algorithms[0].mode();

        debug!(
            enc = content.name(),
            mode = mode.as_str(),
            recipients = headers.len(),
            "encrypting JWE"
        );

        let (cek, mut protected) = self.determine_cek(
            jwe,
            &headers,
            &key_algorithms,
            content.as_ref(),
        )?;

        let single = jwe.recipient_count() == 1;
        let mut recipients = Vec::with_capacity(jwe.recipient_count());
        for (index, recipient) in jwe.recipients().iter().enumerate() {
            let Some(key) = recipient.key() else {
                recipients.push(recipient.clone());
                continue;
            };

            let algorithm = &key_algorithms[index];
            check_key(key, algorithm, content.name(), KeyUsage::Encryption)?;

            let (encrypted_key, additional) = self.encrypt_cek(
                algorithm,
                key,
                &cek,
                content.cek_size_bits(),
                &headers[index],
            )?;
            trace!(index, alg = algorithm.name(), "recipient key processed");

            // Per-recipient parameters stay with the recipient once the
            // shared headers apply to more than one
            let mut recipient_header = recipient.header().clone();
            if single {
                protected.extend(additional);
            } else {
                recipient_header.extend(additional);
            }
            recipients.push(
                recipient
                    .with_header(recipient_header)
                    .with_encrypted_key(encrypted_key),
            );
        }

        let finalized = jwe
            .with_shared_protected_header(protected)
            .with_recipients(recipients);

        let iv = random_bytes(self.random.as_ref(), content.iv_size_bits() / 8);
        let plaintext = match &compression {
            Some(method) => method.compress(payload)?,
            None => payload.to_vec(),
        };
        let (ciphertext, tag) = content.encrypt(
            &plaintext,
            &cek,
            &iv,
            finalized.aad(),
            finalized.encoded_shared_protected_header(),
        )?;

        Ok(finalized.with_content(ciphertext, Some(iv), Some(tag)))
    }

    fn content_algorithm(&self, headers: &[Header]) -> Result<Arc<dyn ContentEncryption>> {
        let enc = header_str(&headers[0], "enc")?;
        for header in &headers[1..] {
            if header_str(header, "enc")? != enc {
                return Err(JweError::InconsistentParameter("enc".to_string()));
            }
        }
        self.content_algorithms.get(enc).cloned()
    }

    fn compression_method(&self, headers: &[Header]) -> Result<Option<Arc<dyn CompressionMethod>>> {
        let zip = header_opt_str(&headers[0], "zip")?;
        for header in &headers[1..] {
            if header_opt_str(header, "zip")? != zip {
                return Err(JweError::InconsistentParameter("zip".to_string()));
            }
        }
        zip.map(|name| self.compression.get(name).cloned())
            .transpose()
    }

    fn key_management_algorithms(&self, headers: &[Header]) -> Result<Vec<KeyManagement>> {
        let algorithms = headers
            .iter()
            .map(|header| {
                let alg = header_str(header, "alg")?;
                self.key_algorithms.get(alg).cloned()
            })
            .collect::<Result<Vec<_>>>()?;

        let first = algorithms[0].mode();
        let compatible = algorithms
            .iter()
            .all(|algorithm| first.is_compatible_with(algorithm.mode(), algorithms.len()));
        if !compatible {
            return Err(JweError::ForeignKeyManagementMode);
        }
        Ok(algorithms)
    }

    /// The CEK plus any parameters bound for the shared protected header
    fn determine_cek(
        &self,
        jwe: &Jwe,
        headers: &[Header],
        key_algorithms: &[KeyManagement],
        content: &dyn ContentEncryption,
    ) -> Result<(Zeroizing<Vec<u8>>, Header)> {
        let protected = jwe.shared_protected_header().clone();
        match key_algorithms[0].mode() {
            KeyManagementMode::Encrypt | KeyManagementMode::Wrap => {
                let cek = random_bytes(self.random.as_ref(), content.cek_size_bits() / 8);
                Ok((Zeroizing::new(cek), protected))
            }
            KeyManagementMode::Agreement | KeyManagementMode::Direct => {
                if jwe.recipient_count() != 1 {
                    return Err(JweError::ForeignKeyManagementMode);
                }
                let key = recipient_key(&jwe.recipients()[0])?;
                let algorithm = &key_algorithms[0];
                check_key(key, algorithm, content.name(), KeyUsage::Encryption)?;

                match algorithm {
                    KeyManagement::Direct(direct) => Ok((direct.cek(key)?, protected)),
                    KeyManagement::Agreement(agreement) => {
                        let (cek, additional) = agreement.derive_key(
                            content.cek_size_bits(),
                            content.name(),
                            key,
                            &headers[0],
                            self.random.as_ref(),
                        )?;
                        let mut protected = protected;
                        protected.extend(additional);
                        Ok((cek, protected))
                    }
                    _ => Err(JweError::ForeignKeyManagementMode),
                }
            }
        }
    }

    /// Encrypted key for one recipient plus its additional header parameters
    fn encrypt_cek(
        &self,
        algorithm: &KeyManagement,
        key: &Jwk,
        cek: &[u8],
        cek_size_bits: usize,
        header: &Header,
    ) -> Result<(Option<Vec<u8>>, Header)> {
        let random = self.random.as_ref();
        let (encrypted_key, additional) = match algorithm {
            // No key travels on the wire; agreement parameters were
            // produced while determining the CEK
            KeyManagement::Direct(_) | KeyManagement::Agreement(_) => return Ok((None, Header::new())),
            KeyManagement::AgreementWrapping(a) => {
                a.wrap_agreement_key(key, cek, cek_size_bits, header, random)?
            }
            KeyManagement::Encryption(a) => a.encrypt_key(key, cek, header, random)?,
            KeyManagement::Wrapping(a) => a.wrap_key(key, cek, header, random)?,
        };
        Ok((Some(encrypted_key), additional))
    }
}

fn recipient_key(recipient: &Recipient) -> Result<&Jwk> {
    recipient
        .key()
        .ok_or_else(|| JweError::InvalidKey("recipient has no key".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::JweBuilder;
    use serde_json::{json, Value};

    fn header(value: Value) -> Header {
        match value {
            Value::Object(map) => map,
            _ => Header::new(),
        }
    }

    fn encrypter() -> Encrypter {
        Encrypter::new(
            KeyManagementRegistry::standard(),
            ContentEncryptionRegistry::standard(),
            CompressionRegistry::standard(),
        )
    }

    struct Zeros;

    impl RandomSource for Zeros {
        fn fill(&self, dest: &mut [u8]) {
            dest.fill(0);
        }
    }

    #[test]
    fn test_already_encrypted() -> Result<()> {
        let jwe = JweBuilder::new()
            .payload(b"p".to_vec())
            .shared_protected_header(header(json!({"alg": "A128KW", "enc": "A128GCM"})))
            .add_recipient(Jwk::oct(&[1u8; 16]), Header::new())
            .build()?;
        let encrypted = encrypter().encrypt(&jwe)?;
        assert!(matches!(
            encrypter().encrypt(&encrypted),
            Err(JweError::AlreadyEncrypted)
        ));
        Ok(())
    }

    #[test]
    fn test_no_recipient() {
        let jwe = Jwe::new(b"p".to_vec());
        assert!(matches!(encrypter().encrypt(&jwe), Err(JweError::NoRecipient)));
    }

    #[test]
    fn test_missing_enc() -> Result<()> {
        let jwe = JweBuilder::new()
            .payload(b"p".to_vec())
            .add_recipient(Jwk::oct(&[1u8; 16]), header(json!({"alg": "A128KW"})))
            .build()?;
        assert!(matches!(
            encrypter().encrypt(&jwe),
            Err(JweError::MissingParameter(p)) if p == "enc"
        ));
        Ok(())
    }

    #[test]
    fn test_inconsistent_zip() -> Result<()> {
        let jwe = JweBuilder::new()
            .payload(b"p".to_vec())
            .shared_header(header(json!({"enc": "A128GCM", "alg": "A128KW"})))
            .add_recipient(Jwk::oct(&[1u8; 16]), header(json!({"zip": "DEF"})))
            .add_recipient(Jwk::oct(&[2u8; 16]), Header::new())
            .build()?;
        assert!(matches!(
            encrypter().encrypt(&jwe),
            Err(JweError::InconsistentParameter(p)) if p == "zip"
        ));
        Ok(())
    }

    #[test]
    fn test_unsupported_algorithm() -> Result<()> {
        let jwe = JweBuilder::new()
            .payload(b"p".to_vec())
            .shared_protected_header(header(json!({"alg": "A128KW", "enc": "A512GCM"})))
            .add_recipient(Jwk::oct(&[1u8; 16]), Header::new())
            .build()?;
        assert!(matches!(
            encrypter().encrypt(&jwe),
            Err(JweError::UnsupportedAlgorithm(name)) if name == "A512GCM"
        ));
        Ok(())
    }

    #[test]
    fn test_direct_with_wrap_is_foreign() -> Result<()> {
        let jwe = JweBuilder::new()
            .payload(b"p".to_vec())
            .shared_protected_header(header(json!({"enc": "A128GCM"})))
            .add_recipient(Jwk::oct(&[1u8; 16]), header(json!({"alg": "dir"})))
            .add_recipient(Jwk::oct(&[2u8; 16]), header(json!({"alg": "A128KW"})))
            .build()?;
        assert!(matches!(
            encrypter().encrypt(&jwe),
            Err(JweError::ForeignKeyManagementMode)
        ));
        Ok(())
    }

    #[test]
    fn test_key_usage_surfaced() -> Result<()> {
        let jwe = JweBuilder::new()
            .payload(b"p".to_vec())
            .shared_protected_header(header(json!({"alg": "A128KW", "enc": "A128GCM"})))
            .add_recipient(Jwk::oct(&[1u8; 16]).with_param("use", "sig"), Header::new())
            .build()?;
        assert!(matches!(
            encrypter().encrypt(&jwe),
            Err(JweError::KeyUsageRejected(_))
        ));
        Ok(())
    }

    #[test]
    fn test_additional_headers_placement() -> Result<()> {
        // Single recipient: GCMKW parameters land in the protected header
        let single = JweBuilder::new()
            .payload(b"p".to_vec())
            .shared_protected_header(header(json!({"alg": "A128GCMKW", "enc": "A128GCM"})))
            .add_recipient(Jwk::oct(&[1u8; 16]), Header::new())
            .build()?;
        let encrypted = encrypter().encrypt(&single)?;
        assert!(encrypted.shared_protected_header().contains_key("iv"));
        assert!(encrypted.recipients()[0].header().is_empty());

        // Several recipients: each keeps its own parameters
        let multi = JweBuilder::new()
            .payload(b"p".to_vec())
            .shared_protected_header(header(json!({"enc": "A128GCM"})))
            .add_recipient(Jwk::oct(&[1u8; 16]), header(json!({"alg": "A128GCMKW"})))
            .add_recipient(Jwk::oct(&[2u8; 16]), header(json!({"alg": "A128KW"})))
            .build()?;
        let encrypted = encrypter().encrypt(&multi)?;
        assert!(!encrypted.shared_protected_header().contains_key("iv"));
        assert!(encrypted.recipients()[0].header().contains_key("tag"));
        assert!(!encrypted.recipients()[1].header().contains_key("tag"));
        Ok(())
    }

    #[test]
    fn test_direct_output_shape() -> Result<()> {
        let jwe = JweBuilder::new()
            .payload(b"Live long and Prosper.".to_vec())
            .shared_protected_header(header(json!({"alg": "dir", "enc": "A192CBC-HS384"})))
            .add_recipient(Jwk::oct(&[7u8; 48]), Header::new())
            .build()?;
        let encrypted = encrypter().with_random_source(Arc::new(Zeros)).encrypt(&jwe)?;

        assert!(encrypted.recipients()[0].encrypted_key().is_none());
        assert!(encrypted.recipients()[0].key().is_none());
        assert_eq!(encrypted.iv(), Some([0u8; 16].as_slice()));
        assert_eq!(encrypted.tag().map(<[u8]>::len), Some(24));
        assert!(!encrypted.shared_protected_header().contains_key("zip"));
        assert_eq!(
            encrypted.encoded_shared_protected_header(),
            crate::encoding::encode(br#"{"alg":"dir","enc":"A192CBC-HS384"}"#)
        );
        // The input is left untouched
        assert!(!jwe.is_encrypted());
        Ok(())
    }

    #[test]
    fn test_direct_key_size_mismatch() -> Result<()> {
        let jwe = JweBuilder::new()
            .payload(b"p".to_vec())
            .shared_protected_header(header(json!({"alg": "dir", "enc": "A256GCM"})))
            .add_recipient(Jwk::oct(&[7u8; 16]), Header::new())
            .build()?;
        assert!(matches!(encrypter().encrypt(&jwe), Err(JweError::InvalidKey(_))));
        Ok(())
    }
}
