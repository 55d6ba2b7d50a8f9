//! Algorithm capabilities and registries
//!
//! Key management algorithms are grouped by capability into the closed
//! [`KeyManagement`] enum; orchestration code matches on it exhaustively and
//! never inspects algorithm names. Content encryption algorithms share the
//! single [`ContentEncryption`] capability.
//!
//! Capabilities that emit header parameters (`epk`, `iv`/`tag`, `p2s`/`p2c`)
//! return them alongside their result instead of mutating shared state.

use crate::error::{JweError, Result};
use crate::jwe::Header;
use crate::jwk::{check_algorithm, check_key_type, check_usage, Jwk, KeyUsage};
use crate::random::RandomSource;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

pub mod aes_gcm_kw;
pub mod aes_kw;
pub mod content;
pub mod direct;
pub mod pbes2;

#[cfg(feature = "ecdh")]
pub mod ecdh;

#[cfg(feature = "rsa")]
pub mod rsa;

/// Behaviour shared by all key management algorithms
pub trait Algorithm: Send + Sync {
    /// JOSE `alg` identifier
    fn name(&self) -> &str;

    /// Key types (`kty`) this algorithm accepts
    fn allowed_key_types(&self) -> &[&'static str];
}

/// The recipient key is the CEK (`dir`)
pub trait DirectEncryption: Algorithm {
    fn cek(&self, key: &Jwk) -> Result<Zeroizing<Vec<u8>>>;
}

/// The CEK is agreed upon directly (`ECDH-ES`)
pub trait KeyAgreement: Algorithm {
    /// Sender side: derive a CEK and the header parameters the recipient needs
    fn derive_key(
        &self,
        cek_size_bits: usize,
        enc: &str,
        recipient_key: &Jwk,
        header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Zeroizing<Vec<u8>>, Header)>;

    /// Recipient side: recover the CEK from the sender's header parameters
    fn recover_key(
        &self,
        cek_size_bits: usize,
        enc: &str,
        recipient_key: &Jwk,
        header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>>;
}

/// An agreed key wraps the CEK (`ECDH-ES+A*KW`)
pub trait KeyAgreementWrapping: Algorithm {
    fn wrap_agreement_key(
        &self,
        recipient_key: &Jwk,
        cek: &[u8],
        cek_size_bits: usize,
        header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Vec<u8>, Header)>;

    fn unwrap_agreement_key(
        &self,
        recipient_key: &Jwk,
        encrypted_cek: &[u8],
        cek_size_bits: usize,
        header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>>;
}

/// The CEK is encrypted to an asymmetric key (`RSA-OAEP*`, `RSA1_5`)
pub trait KeyEncryption: Algorithm {
    fn encrypt_key(
        &self,
        recipient_key: &Jwk,
        cek: &[u8],
        header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Vec<u8>, Header)>;

    /// Recover a CEK of `cek_size_bits` from `encrypted_cek`
    ///
    /// Implementations may return a CEK that does not match the sender's
    /// (see `RSA1_5`); content decryption then fails instead.
    fn decrypt_key(
        &self,
        recipient_key: &Jwk,
        encrypted_cek: &[u8],
        cek_size_bits: usize,
        header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>>;
}

/// The CEK is wrapped with a symmetric key (`A*KW`, `A*GCMKW`, `PBES2-*`)
pub trait KeyWrapping: Algorithm {
    fn wrap_key(
        &self,
        recipient_key: &Jwk,
        cek: &[u8],
        header: &Header,
        random: &dyn RandomSource,
    ) -> Result<(Vec<u8>, Header)>;

    fn unwrap_key(
        &self,
        recipient_key: &Jwk,
        encrypted_cek: &[u8],
        header: &Header,
    ) -> Result<Zeroizing<Vec<u8>>>;
}

/// Authenticated content encryption (`enc`)
pub trait ContentEncryption: Send + Sync {
    /// JOSE `enc` identifier
    fn name(&self) -> &str;

    fn cek_size_bits(&self) -> usize;

    fn iv_size_bits(&self) -> usize;

    /// Encrypt `plaintext`, returning `(ciphertext, tag)`
    ///
    /// The authenticated data is `encoded_protected_header`, followed by
    /// `'.' || BASE64URL(aad)` when `aad` is present.
    fn encrypt(
        &self,
        plaintext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        encoded_protected_header: &str,
    ) -> Result<(Vec<u8>, Vec<u8>)>;

    fn decrypt(
        &self,
        ciphertext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        encoded_protected_header: &str,
        tag: &[u8],
    ) -> Result<Vec<u8>>;
}

/// How a key management algorithm determines the CEK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyManagementMode {
    Encrypt,
    Wrap,
    Agreement,
    Direct,
}

impl KeyManagementMode {
    /// Whether recipients using `self` and `other` can share one message
    ///
    /// Encrypt and wrap modes mix freely; agreement and direct modes only
    /// ever apply to a single recipient.
    pub fn is_compatible_with(self, other: KeyManagementMode, recipient_count: usize) -> bool {
        use KeyManagementMode::*;
        match (self, other) {
            (Encrypt | Wrap, Encrypt | Wrap) => true,
            (Agreement, Agreement) | (Direct, Direct) => recipient_count == 1,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyManagementMode::Encrypt => "enc",
            KeyManagementMode::Wrap => "wrap",
            KeyManagementMode::Agreement => "agree",
            KeyManagementMode::Direct => "dir",
        }
    }
}

/// A key management algorithm tagged with its capability
#[derive(Clone)]
pub enum KeyManagement {
    Direct(Arc<dyn DirectEncryption>),
    Agreement(Arc<dyn KeyAgreement>),
    AgreementWrapping(Arc<dyn KeyAgreementWrapping>),
    Encryption(Arc<dyn KeyEncryption>),
    Wrapping(Arc<dyn KeyWrapping>),
}

impl KeyManagement {
    pub fn direct(algorithm: impl DirectEncryption + 'static) -> Self {
        Self::Direct(Arc::new(algorithm))
    }

    pub fn agreement(algorithm: impl KeyAgreement + 'static) -> Self {
        Self::Agreement(Arc::new(algorithm))
    }

    pub fn agreement_wrapping(algorithm: impl KeyAgreementWrapping + 'static) -> Self {
        Self::AgreementWrapping(Arc::new(algorithm))
    }

    pub fn encryption(algorithm: impl KeyEncryption + 'static) -> Self {
        Self::Encryption(Arc::new(algorithm))
    }

    pub fn wrapping(algorithm: impl KeyWrapping + 'static) -> Self {
        Self::Wrapping(Arc::new(algorithm))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Direct(a) => a.name(),
            Self::Agreement(a) => a.name(),
            Self::AgreementWrapping(a) => a.name(),
            Self::Encryption(a) => a.name(),
            Self::Wrapping(a) => a.name(),
        }
    }

    pub fn allowed_key_types(&self) -> &[&'static str] {
        match self {
            Self::Direct(a) => a.allowed_key_types(),
            Self::Agreement(a) => a.allowed_key_types(),
            Self::AgreementWrapping(a) => a.allowed_key_types(),
            Self::Encryption(a) => a.allowed_key_types(),
            Self::Wrapping(a) => a.allowed_key_types(),
        }
    }

    pub fn mode(&self) -> KeyManagementMode {
        match self {
            Self::Direct(_) => KeyManagementMode::Direct,
            Self::Agreement(_) => KeyManagementMode::Agreement,
            Self::AgreementWrapping(_) | Self::Wrapping(_) => KeyManagementMode::Wrap,
            Self::Encryption(_) => KeyManagementMode::Encrypt,
        }
    }
}

impl fmt::Debug for KeyManagement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManagement")
            .field("name", &self.name())
            .field("mode", &self.mode())
            .finish()
    }
}

/// Anything carrying a JOSE identifier, so it can live in a registry
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for KeyManagement {
    fn name(&self) -> &str {
        KeyManagement::name(self)
    }
}

impl Named for Arc<dyn ContentEncryption> {
    fn name(&self) -> &str {
        ContentEncryption::name(self.as_ref())
    }
}

/// Read-only lookup table from identifier to algorithm
///
/// Registries are built once and then shared; they have no interior
/// mutability and are safe to read from many threads.
#[derive(Clone)]
pub struct AlgorithmRegistry<A> {
    algorithms: HashMap<String, A>,
}

pub type KeyManagementRegistry = AlgorithmRegistry<KeyManagement>;
pub type ContentEncryptionRegistry = AlgorithmRegistry<Arc<dyn ContentEncryption>>;

impl<A: Named> AlgorithmRegistry<A> {
    /// Build a registry; a later algorithm replaces an earlier one of the same name
    pub fn new(algorithms: impl IntoIterator<Item = A>) -> Self {
        let algorithms = algorithms
            .into_iter()
            .map(|a| (a.name().to_string(), a))
            .collect();
        Self { algorithms }
    }

    /// Look up an algorithm by identifier
    pub fn get(&self, name: &str) -> Result<&A> {
        self.algorithms
            .get(name)
            .ok_or_else(|| JweError::UnsupportedAlgorithm(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.algorithms.contains_key(name)
    }

    /// Identifiers of all registered algorithms, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.algorithms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }
}

impl<A: Named + Clone> AlgorithmRegistry<A> {
    /// Registry restricted to the given identifiers of `self`
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let algorithms = names
            .iter()
            .map(|name| self.get(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(algorithms))
    }
}

impl<A> fmt::Debug for AlgorithmRegistry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.algorithms.keys().collect();
        names.sort_unstable();
        f.debug_struct("AlgorithmRegistry")
            .field("algorithms", &names)
            .finish()
    }
}

impl AlgorithmRegistry<KeyManagement> {
    /// Every key management algorithm this crate implements
    pub fn standard() -> Self {
        #[allow(unused_mut)]
        let mut algorithms = vec![
            KeyManagement::direct(direct::Dir),
            KeyManagement::wrapping(aes_kw::AesKw::a128kw()),
            KeyManagement::wrapping(aes_kw::AesKw::a192kw()),
            KeyManagement::wrapping(aes_kw::AesKw::a256kw()),
            KeyManagement::wrapping(aes_gcm_kw::AesGcmKw::a128gcmkw()),
            KeyManagement::wrapping(aes_gcm_kw::AesGcmKw::a192gcmkw()),
            KeyManagement::wrapping(aes_gcm_kw::AesGcmKw::a256gcmkw()),
            KeyManagement::wrapping(pbes2::Pbes2::hs256_a128kw()),
            KeyManagement::wrapping(pbes2::Pbes2::hs384_a192kw()),
            KeyManagement::wrapping(pbes2::Pbes2::hs512_a256kw()),
        ];

        #[cfg(feature = "rsa")]
        algorithms.extend([
            KeyManagement::encryption(rsa::Rsa::rsa1_5()),
            KeyManagement::encryption(rsa::Rsa::oaep()),
            KeyManagement::encryption(rsa::Rsa::oaep_256()),
        ]);

        #[cfg(feature = "ecdh")]
        algorithms.extend([
            KeyManagement::agreement(ecdh::EcdhEs),
            KeyManagement::agreement_wrapping(ecdh::EcdhEsKw::a128kw()),
            KeyManagement::agreement_wrapping(ecdh::EcdhEsKw::a192kw()),
            KeyManagement::agreement_wrapping(ecdh::EcdhEsKw::a256kw()),
        ]);

        Self::new(algorithms)
    }

    /// Standard algorithms restricted to `names`
    pub fn from_names(names: &[&str]) -> Result<Self> {
        Self::standard().select(names)
    }
}

impl AlgorithmRegistry<Arc<dyn ContentEncryption>> {
    /// Every content encryption algorithm this crate implements
    pub fn standard() -> Self {
        let algorithms: Vec<Arc<dyn ContentEncryption>> = vec![
            Arc::new(content::AesCbcHmac::a128cbc_hs256()),
            Arc::new(content::AesCbcHmac::a192cbc_hs384()),
            Arc::new(content::AesCbcHmac::a256cbc_hs512()),
            Arc::new(content::AesGcm::a128gcm()),
            Arc::new(content::AesGcm::a192gcm()),
            Arc::new(content::AesGcm::a256gcm()),
        ];
        Self::new(algorithms)
    }

    /// Standard algorithms restricted to `names`
    pub fn from_names(names: &[&str]) -> Result<Self> {
        Self::standard().select(names)
    }
}

/// Usage, algorithm restriction and key type checks for `key` under `algorithm`
///
/// A `dir` key's `alg` restriction names the content encryption algorithm.
pub(crate) fn check_key(
    key: &Jwk,
    algorithm: &KeyManagement,
    content_algorithm: &str,
    usage: KeyUsage,
) -> Result<()> {
    check_usage(key, usage)?;
    let restricted_to = match algorithm.mode() {
        KeyManagementMode::Direct => content_algorithm,
        _ => algorithm.name(),
    };
    check_algorithm(key, restricted_to)?;
    check_key_type(key, algorithm.allowed_key_types())
}

/// Fetch a symmetric key's `k` value, checking its length
pub(crate) fn symmetric_key(key: &Jwk, expected_len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let k = key.bytes("k")?;
    if k.len() != expected_len {
        return Err(JweError::InvalidKey(format!(
            "expected a {}-bit key, got {} bits",
            expected_len * 8,
            k.len() * 8
        )));
    }
    Ok(k)
}
