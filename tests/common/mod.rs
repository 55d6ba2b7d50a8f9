//! Common test utilities for jose-jwe integration tests
//!
//! This module provides shared helper functions to reduce code duplication
//! across integration test files.

#![allow(dead_code)]

use jose_jwe::{
    encoding, CompressionRegistry, ContentEncryptionRegistry, Decrypter, Encrypter, Header, Jwe,
    JweSerializerManager, Jwk, KeyManagementRegistry,
};
use serde_json::{json, Value};

/// Test data for encryption/decryption
pub const TEST_PLAINTEXT: &[u8] = b"Live long and Prosper.";

/// RFC 7520 §5 plaintext; the dashes are U+2013
pub const FRODO: &str = "You can trust us to stick with you through thick and thin\u{2013}to the bitter end. And you can trust us to keep any secret of yours\u{2013}closer than you keep it yourself. But you cannot trust us to let you face trouble alone, and go off without a word. We are your friends, Frodo.";

/// Install a test subscriber so `RUST_LOG=jose_jwe=trace` shows pipeline logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Turn a `json!` object into a header
pub fn header(value: Value) -> Header {
    match value {
        Value::Object(map) => map,
        other => panic!("header must be a JSON object, got {}", other),
    }
}

pub fn encrypter() -> Encrypter {
    Encrypter::new(
        KeyManagementRegistry::standard(),
        ContentEncryptionRegistry::standard(),
        CompressionRegistry::standard(),
    )
}

pub fn decrypter() -> Decrypter {
    Decrypter::new(
        KeyManagementRegistry::standard(),
        ContentEncryptionRegistry::standard(),
        CompressionRegistry::standard(),
    )
}

/// Serialize `jwe` in `format` and parse it back, leaving it in the `Parsed` state
pub fn reparse(jwe: &Jwe, format: &str) -> Jwe {
    let serializers = JweSerializerManager::standard();
    let token = serializers.serialize(format, jwe, Some(0)).unwrap();
    serializers.unserialize(&token).unwrap().0
}

/// Symmetric key filled with `byte`
pub fn oct_key(len: usize, byte: u8) -> Jwk {
    Jwk::oct(&vec![byte; len])
}

/// RFC 7520 §5.8.1 AES key
pub fn rfc7520_aes_key() -> Jwk {
    Jwk::from_value(json!({
        "kty": "oct",
        "kid": "81b20965-8332-43d9-a468-82160ad91ac8",
        "use": "enc",
        "alg": "A128KW",
        "k": "GZy6sIZ6wl9NJOKB-jnmVQ"
    }))
    .unwrap()
}

/// RFC 7516 Appendix A.3 key
pub fn rfc7516_a3_key() -> Jwk {
    Jwk::from_value(json!({"kty": "oct", "k": "GawgguFyGrWKav7AX4VKUg"})).unwrap()
}

/// Password key for PBES2
pub fn password_key(password: &str) -> Jwk {
    Jwk::oct(password.as_bytes())
}

/// A fresh 2048-bit RSA private key
#[cfg(feature = "rsa")]
pub fn rsa_key() -> Jwk {
    use rand::rngs::OsRng;
    use rsa::traits::{PrivateKeyParts, PublicKeyParts};
    use rsa::RsaPrivateKey;

    let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    Jwk::from_value(json!({
        "kty": "RSA",
        "n": encoding::encode(private.n().to_bytes_be()),
        "e": encoding::encode(private.e().to_bytes_be()),
        "d": encoding::encode(private.d().to_bytes_be()),
        "p": encoding::encode(private.primes()[0].to_bytes_be()),
        "q": encoding::encode(private.primes()[1].to_bytes_be()),
    }))
    .unwrap()
}

/// A fresh P-256 private key
#[cfg(feature = "ecdh")]
pub fn p256_key() -> Jwk {
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
    let point = secret.public_key().to_encoded_point(false);
    Jwk::from_value(json!({
        "kty": "EC",
        "crv": "P-256",
        "x": encoding::encode(point.x().unwrap()),
        "y": encoding::encode(point.y().unwrap()),
        "d": encoding::encode(secret.to_bytes()),
    }))
    .unwrap()
}

/// A fresh P-384 private key
#[cfg(feature = "ecdh")]
pub fn p384_key() -> Jwk {
    use p384::elliptic_curve::sec1::ToEncodedPoint;

    let secret = p384::SecretKey::random(&mut rand::rngs::OsRng);
    let point = secret.public_key().to_encoded_point(false);
    Jwk::from_value(json!({
        "kty": "EC",
        "crv": "P-384",
        "x": encoding::encode(point.x().unwrap()),
        "y": encoding::encode(point.y().unwrap()),
        "d": encoding::encode(secret.to_bytes()),
    }))
    .unwrap()
}
