//! JSON Web Encryption (RFC 7516) with the RFC 7518 algorithm set
//!
//! A message is assembled with [`JweBuilder`], encrypted for one or more
//! recipients by an [`Encrypter`], rendered by a serializer, parsed back, and
//! decrypted by a [`Decrypter`] holding one or more candidate keys.
//!
//! ```rust
//! use jose_jwe::prelude::*;
//!
//! # fn example() -> jose_jwe::Result<()> {
//! let key = Jwk::oct(&[7u8; 16]);
//! let mut header = Header::new();
//! header.insert("alg".into(), "A128KW".into());
//! header.insert("enc".into(), "A128GCM".into());
//!
//! let jwe = JweBuilder::new()
//!     .payload(b"Live long and prosper.".to_vec())
//!     .shared_protected_header(header)
//!     .add_recipient(key.clone(), Header::new())
//!     .build()?;
//!
//! let encrypter = Encrypter::new(
//!     KeyManagementRegistry::standard(),
//!     ContentEncryptionRegistry::standard(),
//!     CompressionRegistry::standard(),
//! );
//! let serializers = JweSerializerManager::standard();
//! let token = serializers.serialize("jwe_compact", &encrypter.encrypt(&jwe)?, None)?;
//!
//! let decrypter = Decrypter::new(
//!     KeyManagementRegistry::standard(),
//!     ContentEncryptionRegistry::standard(),
//!     CompressionRegistry::standard(),
//! );
//! let (parsed, _) = serializers.unserialize(&token)?;
//! let decrypted = decrypter.decrypt_using_key(&parsed, &key, None)?;
//! assert_eq!(decrypted.payload(), Some(b"Live long and prosper.".as_slice()));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod algorithm;
mod builder;
pub mod compression;
mod decrypter;
pub mod encoding;
mod encrypter;
mod error;
mod jwe;
mod jwk;
pub mod prelude;
pub mod random;
pub mod serializer;

pub use algorithm::{
    ContentEncryption, ContentEncryptionRegistry, KeyManagement, KeyManagementMode,
    KeyManagementRegistry,
};
pub use builder::JweBuilder;
pub use compression::{CompressionMethod, CompressionRegistry, Deflate};
pub use decrypter::Decrypter;
pub use encrypter::Encrypter;
pub use error::{JweError, Result};
pub use jwe::{Header, Jwe, Recipient};
pub use jwk::{check_algorithm, check_key_type, check_usage, Jwk, JwkSet, KeyUsage};
pub use random::{OsRandom, RandomSource};
pub use serializer::{
    CompactSerializer, FlattenedSerializer, GeneralSerializer, JweSerializer,
    JweSerializerManager,
};
