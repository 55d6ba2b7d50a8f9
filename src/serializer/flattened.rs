//! Flattened JWE JSON Serialization (RFC 7516 §7.2.2)

use super::{
    ciphertext, decode_member, decode_optional, encode_optional, non_empty, parse_protected,
    select_recipient, JweSerializer,
};
use crate::encoding;
use crate::error::{JweError, Result};
use crate::jwe::{Header, Jwe, Recipient};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
struct FlattenedJwe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unprotected: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encrypted_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aad: Option<String>,
    ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

/// JSON object carrying a single recipient at the top level
#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenedSerializer;

impl JweSerializer for FlattenedSerializer {
    fn name(&self) -> &str {
        "jwe_json_flattened"
    }

    fn serialize(&self, jwe: &Jwe, recipient_index: Option<usize>) -> Result<String> {
        let ciphertext = ciphertext(jwe)?;
        let recipient = select_recipient(jwe, recipient_index)?;

        let flattened = FlattenedJwe {
            protected: non_empty_str(jwe.encoded_shared_protected_header()),
            unprotected: non_empty(jwe.shared_header()),
            header: non_empty(recipient.header()),
            encrypted_key: encode_optional(recipient.encrypted_key()),
            iv: encode_optional(jwe.iv()),
            aad: encode_optional(jwe.aad()),
            ciphertext: encoding::encode(ciphertext),
            tag: encode_optional(jwe.tag()),
        };
        Ok(serde_json::to_string(&flattened)?)
    }

    fn unserialize(&self, input: &str) -> Result<Jwe> {
        let value: Value = serde_json::from_str(input)
            .map_err(|_| JweError::InvalidFormat("not a JSON object".to_string()))?;
        if value.get("recipients").is_some() {
            return Err(JweError::InvalidFormat(
                "general JSON is not flattened JSON".to_string(),
            ));
        }
        let flattened: FlattenedJwe = serde_json::from_value(value)
            .map_err(|e| JweError::InvalidFormat(e.to_string()))?;

        let (protected, encoded) = parse_protected(flattened.protected.as_deref())?;
        let recipient = Recipient::new(
            flattened.header.unwrap_or_default(),
            decode_optional(flattened.encrypted_key.as_deref(), "encrypted_key")?,
        );

        Ok(Jwe::parsed(
            decode_member(&flattened.ciphertext, "ciphertext")?,
            decode_optional(flattened.iv.as_deref(), "iv")?,
            decode_optional(flattened.tag.as_deref(), "tag")?,
            decode_optional(flattened.aad.as_deref(), "aad")?,
            protected,
            encoded,
            flattened.unprotected.unwrap_or_default(),
            vec![recipient],
        ))
    }
}

fn non_empty_str(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
