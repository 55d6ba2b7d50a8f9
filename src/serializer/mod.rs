//! Wire formats
//!
//! Three serializations are provided:
//! - [`CompactSerializer`] (`jwe_compact`): five dot-separated segments
//! - [`FlattenedSerializer`] (`jwe_json_flattened`): single-recipient JSON
//! - [`GeneralSerializer`] (`jwe_json_general`): JSON with a `recipients` array
//!
//! Parsing keeps the `protected` member verbatim. That exact string, not a
//! re-encoding of the decoded header, is what content decryption
//! authenticates.

use crate::encoding;
use crate::error::{JweError, Result};
use crate::jwe::{Header, Jwe, Recipient};
use std::sync::Arc;

mod compact;
mod flattened;
mod general;

pub use compact::CompactSerializer;
pub use flattened::FlattenedSerializer;
pub use general::GeneralSerializer;

/// Conversion between [`Jwe`] and one wire format
pub trait JweSerializer: Send + Sync {
    /// Identifier used by [`JweSerializerManager`]
    fn name(&self) -> &str;

    /// Render an encrypted JWE
    ///
    /// Single-recipient formats need `recipient_index` when the message has
    /// more than one recipient; `None` then requires exactly one.
    fn serialize(&self, jwe: &Jwe, recipient_index: Option<usize>) -> Result<String>;

    /// Parse wire input into a JWE in the `Parsed` state
    fn unserialize(&self, input: &str) -> Result<Jwe>;
}

/// Ordered set of serializers, addressable by name
#[derive(Clone)]
pub struct JweSerializerManager {
    serializers: Vec<Arc<dyn JweSerializer>>,
}

impl std::fmt::Debug for JweSerializerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JweSerializerManager")
            .field("serializers", &self.names())
            .finish()
    }
}

impl JweSerializerManager {
    pub fn new(serializers: Vec<Arc<dyn JweSerializer>>) -> Self {
        Self { serializers }
    }

    /// Compact, flattened JSON and general JSON, in that order
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(CompactSerializer),
            Arc::new(FlattenedSerializer),
            Arc::new(GeneralSerializer),
        ])
    }

    pub fn names(&self) -> Vec<&str> {
        self.serializers.iter().map(|s| s.name()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&dyn JweSerializer> {
        self.serializers
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
            .ok_or_else(|| JweError::UnsupportedAlgorithm(name.to_string()))
    }

    pub fn serialize(&self, name: &str, jwe: &Jwe, recipient_index: Option<usize>) -> Result<String> {
        self.get(name)?.serialize(jwe, recipient_index)
    }

    /// Parse `input` with the first serializer that accepts it
    ///
    /// Returns the message and the name of the matching serializer.
    pub fn unserialize(&self, input: &str) -> Result<(Jwe, String)> {
        for serializer in &self.serializers {
            if let Ok(jwe) = serializer.unserialize(input) {
                return Ok((jwe, serializer.name().to_string()));
            }
        }
        Err(JweError::InvalidFormat("unsupported input".to_string()))
    }
}

/// Ciphertext of an encrypted JWE
fn ciphertext(jwe: &Jwe) -> Result<&[u8]> {
    jwe.ciphertext()
        .ok_or_else(|| JweError::CannotSerialize("the JWE is not encrypted".to_string()))
}

/// The recipient a single-recipient format renders
fn select_recipient(jwe: &Jwe, recipient_index: Option<usize>) -> Result<&Recipient> {
    match recipient_index {
        None if jwe.recipient_count() == 1 => Ok(&jwe.recipients()[0]),
        None => Err(JweError::CannotSerialize(
            "exactly one recipient is required".to_string(),
        )),
        Some(index) => jwe.recipient(index).ok_or_else(|| {
            JweError::CannotSerialize(format!("no recipient at index {}", index))
        }),
    }
}

fn encode_optional(bytes: Option<&[u8]>) -> Option<String> {
    bytes.map(encoding::encode)
}

fn non_empty(header: &Header) -> Option<Header> {
    (!header.is_empty()).then(|| header.clone())
}

fn decode_member(value: &str, name: &str) -> Result<Vec<u8>> {
    encoding::decode(value).map_err(|_| JweError::InvalidFormat(format!("invalid \"{}\"", name)))
}

fn decode_optional(value: Option<&str>, name: &str) -> Result<Option<Vec<u8>>> {
    value.map(|v| decode_member(v, name)).transpose()
}

/// Decode `protected`, keeping the encoded form alongside the header
fn parse_protected(encoded: Option<&str>) -> Result<(Header, Option<String>)> {
    match encoded {
        None | Some("") => Ok((Header::new(), None)),
        Some(encoded) => {
            let json = decode_member(encoded, "protected")?;
            let header: Header = serde_json::from_slice(&json)
                .map_err(|_| JweError::InvalidFormat("invalid \"protected\"".to_string()))?;
            Ok((header, Some(encoded.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPACT: &str = "eyJhbGciOiJBMTI4S1ciLCJlbmMiOiJBMTI4Q0JDLUhTMjU2In0.6KB707dM9YTIgHtLvtgWQ8mKwboJW3of9locizkDTHzBC2IlrT1oOQ.AxY8DCtDaGlsbGljb3RoZQ.KDlTtXchhZTGufMYmOYGS4HffxPSUrfmqCHXaI9wOGY.U0m_YmjN04DJvceFICbCVQ";

    #[test]
    fn test_manager_detects_format() -> Result<()> {
        let manager = JweSerializerManager::standard();
        assert_eq!(
            manager.names(),
            vec!["jwe_compact", "jwe_json_flattened", "jwe_json_general"]
        );

        let (jwe, name) = manager.unserialize(COMPACT)?;
        assert_eq!(name, "jwe_compact");

        let flattened = manager.serialize("jwe_json_flattened", &jwe, None)?;
        let (reparsed, name) = manager.unserialize(&flattened)?;
        assert_eq!(name, "jwe_json_flattened");
        assert_eq!(reparsed, jwe);

        let general = manager.serialize("jwe_json_general", &jwe, None)?;
        let (reparsed, name) = manager.unserialize(&general)?;
        assert_eq!(name, "jwe_json_general");
        assert_eq!(reparsed, jwe);
        Ok(())
    }

    #[test]
    fn test_manager_unknown() {
        let manager = JweSerializerManager::standard();
        assert!(matches!(
            manager.unserialize("not a jwe"),
            Err(JweError::InvalidFormat(_))
        ));
        assert!(manager.serialize("jws_compact", &Jwe::default(), None).is_err());
    }

    #[test]
    fn test_parse_protected() -> Result<()> {
        let (header, encoded) = parse_protected(Some("eyJlbmMiOiJBMTI4R0NNIn0"))?;
        assert_eq!(header["enc"], "A128GCM");
        assert_eq!(encoded.as_deref(), Some("eyJlbmMiOiJBMTI4R0NNIn0"));

        let (header, encoded) = parse_protected(Some(""))?;
        assert!(header.is_empty());
        assert!(encoded.is_none());

        // Base64URL of `[1]`
        assert!(matches!(
            parse_protected(Some("WzFd")),
            Err(JweError::InvalidFormat(_))
        ));
        Ok(())
    }

    #[test]
    fn test_select_recipient() {
        let jwe = Jwe::default()
            .with_recipient(Recipient::default())
            .with_recipient(Recipient::default());
        assert!(matches!(
            select_recipient(&jwe, None),
            Err(JweError::CannotSerialize(_))
        ));
        assert!(select_recipient(&jwe, Some(1)).is_ok());
        assert!(select_recipient(&jwe, Some(2)).is_err());
    }
}
