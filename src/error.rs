//! Unified error type for JWE operations
//!
//! Encryption works on trusted local configuration, so its failures are
//! precise. Decryption works on untrusted input: per-key failures never leave
//! the [`Decrypter`](crate::Decrypter) and callers only ever observe
//! [`JweError::UnableToDecrypt`] or [`JweError::DecryptionFailed`].
//!
//! # Example
//!
//! ```no_run
//! use jose_jwe::JweError;
//!
//! fn process() -> Result<(), JweError> {
//!     // All JWE operations return JweError
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, JweError>;

/// Unified error type for all JWE operations
///
/// # Error Categories
///
/// - **Precondition**: the message is in the wrong lifecycle state or empty
/// - **Header**: a required header is missing, inconsistent, or unsupported
/// - **Key**: a key is malformed or may not be used with an algorithm
/// - **Format**: wire input could not be decoded
/// - **Crypto**: a primitive failed
#[derive(Debug, Error)]
pub enum JweError {
    /// `encrypt` was called on a message that already has ciphertext
    #[error("The JWE is already encrypted")]
    AlreadyEncrypted,

    /// Decryption was attempted on a message whose payload is known
    #[error("The JWE is already decrypted")]
    AlreadyDecrypted,

    /// The message lists no recipients
    #[error("The JWE has no recipient")]
    NoRecipient,

    /// No keys were supplied to decrypt with
    #[error("The key set is empty")]
    EmptyKeySet,

    /// Encryption needs a payload
    #[error("The JWE has no payload")]
    MissingPayload,

    /// A required header parameter or message member is absent
    #[error("Parameter \"{0}\" is missing")]
    MissingParameter(String),

    /// A header parameter has the wrong type or value
    #[error("Parameter \"{0}\" is invalid")]
    InvalidParameter(String),

    /// `alg`, `enc` or `zip` names something not in the registry
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Recipients mix key management modes that cannot share a CEK
    #[error("Foreign key management mode forbidden")]
    ForeignKeyManagementMode,

    /// Recipients disagree on a parameter that must be shared, such as `enc`
    #[error("Inconsistent parameter \"{0}\" across recipients")]
    InconsistentParameter(String),

    /// The key's `use` or `key_ops` forbid this operation
    #[error("Key cannot be used for {0}")]
    KeyUsageRejected(&'static str),

    /// The key is pinned to another algorithm through its `alg` member
    #[error("Key is only allowed for algorithm \"{allowed}\", not \"{requested}\"")]
    KeyAlgorithmRejected { allowed: String, requested: String },

    /// The key's `kty` does not fit the algorithm
    #[error("Key type \"{0}\" is not allowed for this algorithm")]
    KeyTypeRejected(String),

    /// Key material is malformed or the wrong size
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A JWK member the algorithm needs, e.g. `d` or `k`
    #[error("Key parameter \"{0}\" is missing")]
    MissingKeyParameter(String),

    /// The payload could not be compressed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    /// The plaintext is not a valid stream or inflates past the size limit
    #[error("Decompression failed")]
    DecompressionFailed,

    /// A cryptographic primitive reported an error
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// A CEK was recovered but content decryption or authentication failed
    #[error("Unable to decrypt the content")]
    DecryptionFailed,

    /// No recipient and key pair yielded a CEK
    #[error("Unable to decrypt the JWE")]
    UnableToDecrypt,

    /// The message cannot be written in the requested format
    #[error("Cannot serialize: {0}")]
    CannotSerialize(String),

    /// Input does not match any serialization
    #[error("Invalid JWE format: {0}")]
    InvalidFormat(String),

    /// Invalid base64url
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Invalid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JweError {
    /// Returns true if the error reports a lifecycle or shape precondition
    ///
    /// These are programmer errors rather than data errors.
    pub fn is_precondition_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyEncrypted
                | Self::AlreadyDecrypted
                | Self::NoRecipient
                | Self::EmptyKeySet
                | Self::MissingPayload
        )
    }

    /// Returns true if a key was rejected or could not be parsed
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::KeyUsageRejected(_)
                | Self::KeyAlgorithmRejected { .. }
                | Self::KeyTypeRejected(_)
                | Self::InvalidKey(_)
                | Self::MissingKeyParameter(_)
        )
    }

    /// Returns true if wire input could not be decoded
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_) | Self::Base64(_) | Self::Json(_)
        )
    }

    /// Returns true if a header was missing, inconsistent or unsupported
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter(_)
                | Self::InvalidParameter(_)
                | Self::UnsupportedAlgorithm(_)
                | Self::ForeignKeyManagementMode
                | Self::InconsistentParameter(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(JweError::AlreadyEncrypted.is_precondition_error());
        assert!(JweError::EmptyKeySet.is_precondition_error());
        assert!(!JweError::UnableToDecrypt.is_precondition_error());

        let key_err = JweError::KeyAlgorithmRejected {
            allowed: "A128KW".to_string(),
            requested: "A256KW".to_string(),
        };
        assert!(key_err.is_key_error());
        assert!(!key_err.is_header_error());

        assert!(JweError::InvalidFormat("x".to_string()).is_format_error());
        assert!(JweError::InconsistentParameter("zip".to_string()).is_header_error());
    }

    #[test]
    fn test_error_display() {
        let msg = JweError::MissingParameter("enc".to_string()).to_string();
        assert!(msg.contains("\"enc\""));

        // Decryption failures stay deliberately vague
        assert_eq!(
            JweError::UnableToDecrypt.to_string(),
            "Unable to decrypt the JWE"
        );
    }
}
