//! General JWE JSON Serialization (RFC 7516 §7.2.1)

use super::{
    ciphertext, decode_member, decode_optional, encode_optional, non_empty, parse_protected,
    JweSerializer,
};
use crate::encoding;
use crate::error::{JweError, Result};
use crate::jwe::{Header, Jwe, Recipient};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct GeneralRecipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encrypted_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeneralJwe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unprotected: Option<Header>,
    recipients: Vec<GeneralRecipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aad: Option<String>,
    ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

/// JSON object with a `recipients` array
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralSerializer;

impl JweSerializer for GeneralSerializer {
    fn name(&self) -> &str {
        "jwe_json_general"
    }

    /// Every recipient is rendered; `recipient_index` is ignored
    fn serialize(&self, jwe: &Jwe, _recipient_index: Option<usize>) -> Result<String> {
        let ciphertext = ciphertext(jwe)?;
        if jwe.recipients().is_empty() {
            return Err(JweError::CannotSerialize("the JWE has no recipient".to_string()));
        }

        let encoded = jwe.encoded_shared_protected_header();
        let general = GeneralJwe {
            protected: (!encoded.is_empty()).then(|| encoded.to_string()),
            unprotected: non_empty(jwe.shared_header()),
            recipients: jwe
                .recipients()
                .iter()
                .map(|recipient| GeneralRecipient {
                    header: non_empty(recipient.header()),
                    encrypted_key: encode_optional(recipient.encrypted_key()),
                })
                .collect(),
            iv: encode_optional(jwe.iv()),
            aad: encode_optional(jwe.aad()),
            ciphertext: encoding::encode(ciphertext),
            tag: encode_optional(jwe.tag()),
        };
        Ok(serde_json::to_string(&general)?)
    }

    fn unserialize(&self, input: &str) -> Result<Jwe> {
        let general: GeneralJwe = serde_json::from_str(input)
            .map_err(|e| JweError::InvalidFormat(e.to_string()))?;
        if general.recipients.is_empty() {
            return Err(JweError::InvalidFormat("empty \"recipients\"".to_string()));
        }

        let (protected, encoded) = parse_protected(general.protected.as_deref())?;
        let recipients = general
            .recipients
            .into_iter()
            .map(|recipient| {
                Ok(Recipient::new(
                    recipient.header.unwrap_or_default(),
                    decode_optional(recipient.encrypted_key.as_deref(), "encrypted_key")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Jwe::parsed(
            decode_member(&general.ciphertext, "ciphertext")?,
            decode_optional(general.iv.as_deref(), "iv")?,
            decode_optional(general.tag.as_deref(), "tag")?,
            decode_optional(general.aad.as_deref(), "aad")?,
            protected,
            encoded,
            general.unprotected.unwrap_or_default(),
            recipients,
        ))
    }
}
