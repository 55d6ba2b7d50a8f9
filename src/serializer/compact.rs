//! JWE Compact Serialization (RFC 7516 §7.1)

use super::{ciphertext, decode_member, parse_protected, select_recipient, JweSerializer};
use crate::encoding;
use crate::error::{JweError, Result};
use crate::jwe::{Header, Jwe, Recipient};

/// Five dot-separated base64url parts; one recipient, no unprotected header or AAD
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactSerializer;

impl JweSerializer for CompactSerializer {
    fn name(&self) -> &str {
        "jwe_compact"
    }

    fn serialize(&self, jwe: &Jwe, recipient_index: Option<usize>) -> Result<String> {
        let ciphertext = ciphertext(jwe)?;
        let recipient = select_recipient(jwe, recipient_index)?;

        if jwe.aad().is_some() {
            return Err(JweError::CannotSerialize(
                "additional authenticated data cannot be compact serialized".to_string(),
            ));
        }
        if !jwe.shared_header().is_empty() {
            return Err(JweError::CannotSerialize(
                "shared unprotected header cannot be compact serialized".to_string(),
            ));
        }
        if !recipient.header().is_empty() {
            return Err(JweError::CannotSerialize(
                "recipient header cannot be compact serialized".to_string(),
            ));
        }
        if jwe.encoded_shared_protected_header().is_empty() {
            return Err(JweError::CannotSerialize(
                "compact serialization requires a protected header".to_string(),
            ));
        }

        Ok(format!(
            "{}.{}.{}.{}.{}",
            jwe.encoded_shared_protected_header(),
            encoding::encode(recipient.encrypted_key().unwrap_or_default()),
            encoding::encode(jwe.iv().unwrap_or_default()),
            encoding::encode(ciphertext),
            encoding::encode(jwe.tag().unwrap_or_default()),
        ))
    }

    fn unserialize(&self, input: &str) -> Result<Jwe> {
        let parts: Vec<&str> = input.split('.').collect();
        let [protected, encrypted_key, iv, ciphertext, tag] = parts[..] else {
            return Err(JweError::InvalidFormat(
                "compact JWE must have five segments".to_string(),
            ));
        };

        if protected.is_empty() {
            return Err(JweError::InvalidFormat("missing protected header".to_string()));
        }
        let (protected_header, encoded) = parse_protected(Some(protected))?;

        // Empty segments stand for absent values
        let optional = |value: &str, name: &str| -> Result<Option<Vec<u8>>> {
            if value.is_empty() {
                Ok(None)
            } else {
                decode_member(value, name).map(Some)
            }
        };

        Ok(Jwe::parsed(
            decode_member(ciphertext, "ciphertext")?,
            optional(iv, "iv")?,
            optional(tag, "tag")?,
            None,
            protected_header,
            encoded,
            Header::new(),
            vec![Recipient::new(
                Header::new(),
                optional(encrypted_key, "encrypted_key")?,
            )],
        ))
    }
}
