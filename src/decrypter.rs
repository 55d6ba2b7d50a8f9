//! JWE decryption pipeline
//!
//! Recipients are tried in wire order, and for each recipient every
//! candidate key in order. A key that fails its checks or cannot recover the
//! CEK is skipped without recording why. Once a CEK is recovered, content
//! decryption either succeeds or fails the whole operation.

use crate::algorithm::{
    check_key, ContentEncryption, ContentEncryptionRegistry, KeyManagement,
    KeyManagementRegistry,
};
use crate::compression::CompressionRegistry;
use crate::error::{JweError, Result};
use crate::jwe::{header_opt_str, header_str, Header, Jwe, Recipient};
use crate::jwk::{Jwk, JwkSet, KeyUsage};
use tracing::{debug, trace};
use zeroize::Zeroizing;

/// Decrypts parsed JWE messages against candidate key sets
#[derive(Debug, Clone)]
pub struct Decrypter {
    key_algorithms: KeyManagementRegistry,
    content_algorithms: ContentEncryptionRegistry,
    compression: CompressionRegistry,
}

impl Decrypter {
    pub fn new(
        key_algorithms: KeyManagementRegistry,
        content_algorithms: ContentEncryptionRegistry,
        compression: CompressionRegistry,
    ) -> Self {
        Self {
            key_algorithms,
            content_algorithms,
            compression,
        }
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

    /// Decrypt `jwe` with the first working recipient/key pair
    ///
    /// Returns the `Decrypted` message and the index of the recipient whose
    /// encrypted key was recovered.
    pub fn decrypt_using_key_set(&self, jwe: &Jwe, keys: &JwkSet) -> Result<(Jwe, usize)> {
        self.check_preconditions(jwe, keys)?;
        self.try_recipients(jwe, keys, 0..jwe.recipient_count())
    }

    /// Decrypt `jwe` with a single key
    ///
    /// With `recipient` set, only that recipient is tried.
    pub fn decrypt_using_key(&self, jwe: &Jwe, key: &Jwk, recipient: Option<usize>) -> Result<Jwe> {
        let keys = JwkSet::from(key.clone());
        self.check_preconditions(jwe, &keys)?;
        let (decrypted, _) = match recipient {
            Some(index) if index >= jwe.recipient_count() => {
                return Err(JweError::InvalidParameter(format!("recipient index {}", index)))
            }
            Some(index) => self.try_recipients(jwe, &keys, index..index + 1)?,
            None => self.try_recipients(jwe, &keys, 0..jwe.recipient_count())?,
        };
        Ok(decrypted)
    }

    fn check_preconditions(&self, jwe: &Jwe, keys: &JwkSet) -> Result<()> {
        if jwe.payload().is_some() {
            return Err(JweError::AlreadyDecrypted);
        }
        if jwe.recipients().is_empty() {
            return Err(JweError::NoRecipient);
        }
        if keys.is_empty() {
            return Err(JweError::EmptyKeySet);
        }
        Ok(())
    }

    fn try_recipients(
        &self,
        jwe: &Jwe,
        keys: &JwkSet,
        indices: std::ops::Range<usize>,
    ) -> Result<(Jwe, usize)> {
        for index in indices {
            let recipient = &jwe.recipients()[index];
            let header = jwe.complete_header(recipient);

            let algorithm = self.key_algorithms.get(header_str(&header, "alg")?)?;
            let content = self.content_algorithms.get(header_str(&header, "enc")?)?;
            trace!(index, alg = algorithm.name(), enc = content.name(), "trying recipient");

            for key in keys {
                if check_key(key, algorithm, content.name(), KeyUsage::Decryption).is_err() {
                    continue;
                }
                // Which stage rejected the key is deliberately not kept
                let Ok(cek) = recover_cek(algorithm, key, recipient, &header, content.as_ref())
                else {
                    continue;
                };

                let decrypted = self.decrypt_content(jwe, &header, &cek, content.as_ref())?;
                debug!(recipient = index, "decrypted JWE");
                return Ok((decrypted, index));
            }
        }
        Err(JweError::UnableToDecrypt)
    }

    fn decrypt_content(
        &self,
        jwe: &Jwe,
        header: &Header,
        cek: &[u8],
        content: &dyn ContentEncryption,
    ) -> Result<Jwe> {
        let ciphertext = jwe
            .ciphertext()
            .ok_or_else(|| JweError::MissingParameter("ciphertext".to_string()))?;

        let plaintext = content
            .decrypt(
                ciphertext,
                cek,
                jwe.iv().unwrap_or_default(),
                jwe.aad(),
                jwe.encoded_shared_protected_header(),
                jwe.tag().unwrap_or_default(),
            )
            .map_err(|_| JweError::DecryptionFailed)?;

        let payload = match header_opt_str(header, "zip")? {
            Some(zip) => self.compression.get(zip)?.decompress(&plaintext)?,
            None => plaintext,
        };
        Ok(jwe.with_payload(payload))
    }
}

/// Recover the CEK for one recipient with one key
fn recover_cek(
    algorithm: &KeyManagement,
    key: &Jwk,
    recipient: &Recipient,
    header: &Header,
    content: &dyn ContentEncryption,
) -> Result<Zeroizing<Vec<u8>>> {
    let cek_size_bits = content.cek_size_bits();
    let encrypted_key = || {
        recipient
            .encrypted_key()
            .ok_or_else(|| JweError::MissingParameter("encrypted_key".to_string()))
    };

    let cek = match algorithm {
        KeyManagement::Direct(a) => a.cek(key)?,
        KeyManagement::Agreement(a) => a.recover_key(cek_size_bits, content.name(), key, header)?,
        KeyManagement::AgreementWrapping(a) => {
            a.unwrap_agreement_key(key, encrypted_key()?, cek_size_bits, header)?
        }
        KeyManagement::Encryption(a) => {
            a.decrypt_key(key, encrypted_key()?, cek_size_bits, header)?
        }
        KeyManagement::Wrapping(a) => a.unwrap_key(key, encrypted_key()?, header)?,
    };

    if cek.len() * 8 != cek_size_bits {
        return Err(JweError::InvalidKey("CEK size does not match enc".to_string()));
    }
    Ok(cek)
}
