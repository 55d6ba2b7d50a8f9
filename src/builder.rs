//! Assembling an unencrypted JWE

use crate::error::{JweError, Result};
use crate::jwe::{Header, Jwe, Recipient};
use crate::jwk::Jwk;
use serde::Serialize;

/// Builder for a JWE in the `Building` state
///
/// The builder only gathers payload, headers and recipients; CEK
/// determination and all cryptography happen in [`crate::Encrypter`].
///
/// # Example
///
/// ```rust
/// use jose_jwe::{Header, JweBuilder, Jwk};
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut protected = Header::new();
/// protected.insert("alg".into(), json!("A128KW"));
/// protected.insert("enc".into(), json!("A128GCM"));
///
/// let jwe = JweBuilder::new()
///     .payload(b"Hello, World!".to_vec())
///     .shared_protected_header(protected)
///     .add_recipient(Jwk::oct(&[0u8; 16]), Header::new())
///     .build()?;
///
/// assert_eq!(jwe.recipient_count(), 1);
/// assert!(!jwe.is_encrypted());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct JweBuilder {
    payload: Option<Vec<u8>>,
    shared_protected_header: Header,
    shared_header: Header,
    aad: Option<Vec<u8>>,
    recipients: Vec<Recipient>,
}

impl JweBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw payload
    #[must_use]
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the payload to the JSON encoding of `value`
    pub fn payload_json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_vec(value)?);
        Ok(self)
    }

    /// Header authenticated by content encryption
    #[must_use]
    pub fn shared_protected_header(mut self, header: Header) -> Self {
        self.shared_protected_header = header;
        self
    }

    /// Unprotected header shared by all recipients
    #[must_use]
    pub fn shared_header(mut self, header: Header) -> Self {
        self.shared_header = header;
        self
    }

    /// Additional authenticated data
    #[must_use]
    pub fn aad(mut self, aad: Vec<u8>) -> Self {
        self.aad = Some(aad);
        self
    }

    /// Add a recipient with its own unprotected header
    #[must_use]
    pub fn add_recipient(mut self, key: Jwk, header: Header) -> Self {
        self.recipients.push(Recipient::for_key(key, header));
        self
    }

    /// Produce the unencrypted JWE
    pub fn build(self) -> Result<Jwe> {
        let payload = self.payload.ok_or(JweError::MissingPayload)?;
        if self.recipients.is_empty() {
            return Err(JweError::NoRecipient);
        }

        let jwe = Jwe::new(payload)
            .with_shared_protected_header(self.shared_protected_header)
            .with_shared_header(self.shared_header)
            .with_aad(self.aad)
            .with_recipients(self.recipients);
        Ok(jwe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_requires_payload() {
        let result = JweBuilder::new()
            .add_recipient(Jwk::oct(b"k"), Header::new())
            .build();
        assert!(matches!(result, Err(JweError::MissingPayload)));
    }

    #[test]
    fn test_build_requires_recipient() {
        let result = JweBuilder::new().payload(b"p".to_vec()).build();
        assert!(matches!(result, Err(JweError::NoRecipient)));
    }

    #[test]
    fn test_build_keeps_order_and_headers() -> Result<()> {
        let mut first = Header::new();
        first.insert("kid".to_string(), json!("first"));
        let mut second = Header::new();
        second.insert("kid".to_string(), json!("second"));

        let jwe = JweBuilder::new()
            .payload_json(&json!({"iss": "joe"}))?
            .aad(b"aad".to_vec())
            .add_recipient(Jwk::oct(b"1"), first)
            .add_recipient(Jwk::oct(b"2"), second)
            .build()?;

        assert_eq!(jwe.recipient_count(), 2);
        assert_eq!(jwe.recipients()[1].header_param("kid"), Some(&json!("second")));
        assert!(jwe.recipients()[0].key().is_some());
        assert_eq!(jwe.aad(), Some(b"aad".as_slice()));
        assert_eq!(jwe.payload(), Some(br#"{"iss":"joe"}"#.as_slice()));
        assert_eq!(jwe.encoded_shared_protected_header(), "");
        Ok(())
    }
}
