//! JSON Web Key model and key checks
//!
//! Keys are immutable parameter maps. The checks in this module decide
//! whether a key may take part in a given operation; the encrypter surfaces
//! their failures while the decrypter silently skips the key.

use crate::encoding;
use crate::error::{JweError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use zeroize::Zeroizing;

/// Members carrying private or symmetric key material
const PRIVATE_MEMBERS: [&str; 8] = ["d", "p", "q", "dp", "dq", "qi", "oth", "k"];

/// A JSON Web Key (RFC 7517)
#[derive(Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Jwk {
    params: Map<String, Value>,
}

impl Jwk {
    /// Create a key from its parameters; `kty` is mandatory
    pub fn from_params(params: Map<String, Value>) -> Result<Self> {
        match params.get("kty") {
            Some(Value::String(_)) => Ok(Self { params }),
            Some(_) => Err(JweError::InvalidKey("\"kty\" must be a string".to_string())),
            None => Err(JweError::MissingKeyParameter("kty".to_string())),
        }
    }

    /// Create a key from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(params) => Self::from_params(params),
            _ => Err(JweError::InvalidKey("a JWK must be a JSON object".to_string())),
        }
    }

    /// Parse a key from its JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Create a symmetric (`oct`) key from raw bytes
    pub fn oct(key: &[u8]) -> Self {
        let mut params = Map::new();
        params.insert("kty".to_string(), Value::from("oct"));
        params.insert("k".to_string(), Value::from(encoding::encode(key)));
        Self { params }
    }

    /// Return a copy of this key with `name` set to `value`
    #[must_use]
    pub fn with_param(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut params = self.params.clone();
        params.insert(name.into(), value.into());
        Self { params }
    }

    /// Key type (`oct`, `RSA`, `EC`, ...)
    pub fn kty(&self) -> &str {
        self.params
            .get("kty")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Key identifier, if any
    pub fn kid(&self) -> Option<&str> {
        self.string_param("kid")
    }

    /// Algorithm the key is restricted to, if any
    pub fn alg(&self) -> Option<&str> {
        self.string_param("alg")
    }

    /// Raw parameter lookup
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// String parameter lookup
    pub fn string_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Base64URL-decoded binary parameter
    pub fn bytes(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        let encoded = self
            .string_param(name)
            .ok_or_else(|| JweError::MissingKeyParameter(name.to_string()))?;
        Ok(Zeroizing::new(encoding::decode(encoded)?))
    }

    /// All parameters
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Copy of this key without private or symmetric members
    #[must_use]
    pub fn to_public(&self) -> Self {
        let mut params = self.params.clone();
        for member in PRIVATE_MEMBERS {
            params.remove(member);
        }
        Self { params }
    }

    /// Convert to a JSON value
    pub fn to_value(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

// Key material never reaches logs
impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty())
            .field("kid", &self.kid())
            .field("alg", &self.alg())
            .finish_non_exhaustive()
    }
}

/// The operation a key is about to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Encryption,
    Decryption,
}

impl KeyUsage {
    fn as_str(self) -> &'static str {
        match self {
            KeyUsage::Encryption => "encryption",
            KeyUsage::Decryption => "decryption",
        }
    }

    fn operations(self) -> &'static [&'static str] {
        match self {
            KeyUsage::Encryption => &["encrypt", "wrapKey", "deriveKey"],
            KeyUsage::Decryption => &["decrypt", "unwrapKey", "deriveBits"],
        }
    }
}

/// Check the key's `use` and `key_ops` members against `usage`
///
/// Absent members place no restriction on the key.
pub fn check_usage(key: &Jwk, usage: KeyUsage) -> Result<()> {
    if let Some(key_use) = key.param("use") {
        if key_use.as_str() != Some("enc") {
            return Err(JweError::KeyUsageRejected(usage.as_str()));
        }
    }

    if let Some(ops) = key.param("key_ops") {
        let allowed = match ops {
            Value::Array(ops) => ops
                .iter()
                .filter_map(Value::as_str)
                .any(|op| usage.operations().contains(&op)),
            Value::String(op) => usage.operations().contains(&op.as_str()),
            _ => false,
        };
        if !allowed {
            return Err(JweError::KeyUsageRejected(usage.as_str()));
        }
    }

    Ok(())
}

/// Check the key's `alg` member, if present, equals `algorithm`
pub fn check_algorithm(key: &Jwk, algorithm: &str) -> Result<()> {
    match key.param("alg") {
        None => Ok(()),
        Some(alg) if alg.as_str() == Some(algorithm) => Ok(()),
        Some(alg) => Err(JweError::KeyAlgorithmRejected {
            allowed: alg.as_str().unwrap_or_default().to_string(),
            requested: algorithm.to_string(),
        }),
    }
}

/// Check the key's `kty` is one of `allowed`
pub fn check_key_type(key: &Jwk, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&key.kty()) {
        Ok(())
    } else {
        Err(JweError::KeyTypeRejected(key.kty().to_string()))
    }
}

/// An ordered set of candidate keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JwkSet {
    keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Parse a `{"keys": [...]}` document
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let keys = value
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| JweError::InvalidKey("missing \"keys\" array".to_string()))?;
        let keys = keys
            .iter()
            .cloned()
            .map(Jwk::from_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    pub fn push(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Jwk> {
        self.keys.iter()
    }
}

impl From<Jwk> for JwkSet {
    fn from(key: Jwk) -> Self {
        Self { keys: vec![key] }
    }
}

impl FromIterator<Jwk> for JwkSet {
    fn from_iter<I: IntoIterator<Item = Jwk>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a JwkSet {
    type Item = &'a Jwk;
    type IntoIter = std::slice::Iter<'a, Jwk>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}
