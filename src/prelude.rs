//! JOSE JWE Prelude
//!
//! Commonly used types and traits in one import.
//!
//! # Example
//!
//! ```rust
//! use jose_jwe::prelude::*;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keys = JwkSet::from_json(r#"{"keys":[{"kty":"oct","k":"GZy6sIZ6wl9NJOKB-jnmVQ"}]}"#)?;
//! let serializers = JweSerializerManager::standard();
//! assert_eq!(keys.len(), 1);
//! assert!(serializers.get("jwe_compact").is_ok());
//! # Ok(())
//! # }
//! ```

// Message model
pub use crate::builder::JweBuilder;
pub use crate::error::JweError;
pub use crate::jwe::{Header, Jwe, Recipient};
pub use crate::jwk::{Jwk, JwkSet, KeyUsage};

// Pipeline
pub use crate::algorithm::{ContentEncryptionRegistry, KeyManagementRegistry};
pub use crate::compression::CompressionRegistry;
pub use crate::decrypter::Decrypter;
pub use crate::encrypter::Encrypter;

// Wire formats; the trait is needed to call serializers directly
pub use crate::serializer::{JweSerializer, JweSerializerManager};
