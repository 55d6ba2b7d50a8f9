//! JWE message model
//!
//! [`Jwe`] and [`Recipient`] are immutable values. Every `with_*` method
//! returns a modified copy, so a message observed by one caller never changes
//! under it.
//!
//! A message moves through `Building → Encrypted → Parsed → Decrypted`:
//! - `Building`: no ciphertext, payload present
//! - `Encrypted`: ciphertext present, produced by the encrypter
//! - `Parsed`: ciphertext present, payload absent, produced by a serializer
//! - `Decrypted`: ciphertext and payload present, produced by the decrypter

use crate::encoding;
use crate::error::{JweError, Result};
use crate::jwk::Jwk;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A JOSE header: JSON object of header parameters
pub type Header = Map<String, Value>;

/// Per-recipient key material
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recipient {
    header: Header,
    encrypted_key: Option<Vec<u8>>,
    key: Option<Jwk>,
}

impl Recipient {
    /// Recipient as read from the wire
    pub fn new(header: Header, encrypted_key: Option<Vec<u8>>) -> Self {
        Self {
            header,
            encrypted_key,
            key: None,
        }
    }

    /// Recipient awaiting encryption to `key`
    pub fn for_key(key: Jwk, header: Header) -> Self {
        Self {
            header,
            encrypted_key: None,
            key: Some(key),
        }
    }

    /// Per-recipient unprotected header
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_param(&self, name: &str) -> Option<&Value> {
        self.header.get(name)
    }

    /// Encrypted CEK, absent for direct encryption and direct key agreement
    pub fn encrypted_key(&self) -> Option<&[u8]> {
        self.encrypted_key.as_deref()
    }

    /// Key used on the encryption path; never serialized
    pub fn key(&self) -> Option<&Jwk> {
        self.key.as_ref()
    }

    #[must_use]
    pub fn with_header(&self, header: Header) -> Self {
        Self {
            header,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_encrypted_key(&self, encrypted_key: Option<Vec<u8>>) -> Self {
        Self {
            encrypted_key,
            ..self.clone()
        }
    }

    /// Copy of this recipient with the encryption key discarded
    #[must_use]
    pub fn without_key(&self) -> Self {
        Self {
            key: None,
            ..self.clone()
        }
    }
}

/// A JSON Web Encryption message
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Jwe {
    ciphertext: Option<Vec<u8>>,
    iv: Option<Vec<u8>>,
    tag: Option<Vec<u8>>,
    aad: Option<Vec<u8>>,
    shared_protected_header: Header,
    encoded_shared_protected_header: Option<String>,
    shared_header: Header,
    recipients: Vec<Recipient>,
    payload: Option<Vec<u8>>,
}

impl Jwe {
    /// Message in the `Building` state
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    /// Message in the `Parsed` state, as produced by a serializer
    ///
    /// `encoded_shared_protected_header` is the verbatim wire value and is
    /// what content decryption authenticates.
    #[allow(clippy::too_many_arguments)]
    pub fn parsed(
        ciphertext: Vec<u8>,
        iv: Option<Vec<u8>>,
        tag: Option<Vec<u8>>,
        aad: Option<Vec<u8>>,
        shared_protected_header: Header,
        encoded_shared_protected_header: Option<String>,
        shared_header: Header,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self {
            ciphertext: Some(ciphertext),
            iv,
            tag,
            aad: aad.filter(|aad| !aad.is_empty()),
            shared_protected_header,
            encoded_shared_protected_header,
            shared_header,
            recipients,
            payload: None,
        }
    }

    pub fn ciphertext(&self) -> Option<&[u8]> {
        self.ciphertext.as_deref()
    }

    pub fn iv(&self) -> Option<&[u8]> {
        self.iv.as_deref()
    }

    pub fn tag(&self) -> Option<&[u8]> {
        self.tag.as_deref()
    }

    /// Additional authenticated data supplied by the caller (raw bytes)
    ///
    /// Never `Some` of an empty slice: empty AAD is stored as absent.
    pub fn aad(&self) -> Option<&[u8]> {
        self.aad.as_deref()
    }

    /// Decrypted or to-be-encrypted payload; `None` means not yet decrypted
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Decode the payload as JSON
    pub fn payload_json<T: DeserializeOwned>(&self) -> Result<T> {
        let payload = self.payload().ok_or(JweError::MissingPayload)?;
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn shared_protected_header(&self) -> &Header {
        &self.shared_protected_header
    }

    pub fn shared_header(&self) -> &Header {
        &self.shared_header
    }

    /// Base64URL(JSON(shared protected header)) exactly as authenticated
    ///
    /// Empty when there is no shared protected header.
    pub fn encoded_shared_protected_header(&self) -> &str {
        self.encoded_shared_protected_header
            .as_deref()
            .unwrap_or_default()
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn recipient(&self, index: usize) -> Option<&Recipient> {
        self.recipients.get(index)
    }

    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_encrypted(&self) -> bool {
        self.ciphertext.is_some()
    }

    pub fn is_decrypted(&self) -> bool {
        self.ciphertext.is_some() && self.payload.is_some()
    }

    /// Shared protected, shared unprotected and recipient headers merged
    ///
    /// Later scopes win on key collision.
    pub fn complete_header(&self, recipient: &Recipient) -> Header {
        let mut header = self.shared_protected_header.clone();
        header.extend(
            self.shared_header
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        header.extend(
            recipient
                .header
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        header
    }

    #[must_use]
    pub fn with_payload(&self, payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            ..self.clone()
        }
    }

    /// Replace the AAD; an empty value is the same as none
    #[must_use]
    pub fn with_aad(&self, aad: Option<Vec<u8>>) -> Self {
        Self {
            aad: aad.filter(|aad| !aad.is_empty()),
            ..self.clone()
        }
    }

    /// Replace the shared protected header; its encoding is recomputed
    #[must_use]
    pub fn with_shared_protected_header(&self, header: Header) -> Self {
        let encoded = encode_header(&header);
        Self {
            shared_protected_header: header,
            encoded_shared_protected_header: encoded,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_shared_header(&self, header: Header) -> Self {
        Self {
            shared_header: header,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_recipient(&self, recipient: Recipient) -> Self {
        let mut recipients = self.recipients.clone();
        recipients.push(recipient);
        Self {
            recipients,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_recipients(&self, recipients: Vec<Recipient>) -> Self {
        Self {
            recipients,
            ..self.clone()
        }
    }

    /// Attach encryption output; recipients lose their encryption keys
    #[must_use]
    pub(crate) fn with_content(
        &self,
        ciphertext: Vec<u8>,
        iv: Option<Vec<u8>>,
        tag: Option<Vec<u8>>,
    ) -> Self {
        Self {
            ciphertext: Some(ciphertext),
            iv,
            tag,
            recipients: self.recipients.iter().map(Recipient::without_key).collect(),
            ..self.clone()
        }
    }
}

/// Base64URL(JSON(header)), or `None` for an empty header
pub(crate) fn encode_header(header: &Header) -> Option<String> {
    if header.is_empty() {
        return None;
    }
    // A map of JSON values always serializes
    serde_json::to_vec(header).ok().map(encoding::encode)
}

/// Required string header parameter
pub(crate) fn header_str<'a>(header: &'a Header, name: &str) -> Result<&'a str> {
    match header.get(name) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(JweError::InvalidParameter(name.to_string())),
        None => Err(JweError::MissingParameter(name.to_string())),
    }
}

/// Optional string header parameter
pub(crate) fn header_opt_str<'a>(header: &'a Header, name: &str) -> Result<Option<&'a str>> {
    match header.get(name) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(JweError::InvalidParameter(name.to_string())),
    }
}

/// Required Base64URL-encoded header parameter
pub(crate) fn header_bytes(header: &Header, name: &str) -> Result<Vec<u8>> {
    encoding::decode(header_str(header, name)?)
        .map_err(|_| JweError::InvalidParameter(name.to_string()))
}
