//! Content encryption: AES-GCM and AES-CBC with HMAC-SHA2
//!
//! Both families authenticate the same data: the encoded shared protected
//! header, followed by `'.' || BASE64URL(aad)` when the message carries
//! additional authenticated data.

use super::ContentEncryption;
use crate::encoding;
use crate::error::{JweError, Result};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm as GcmCipher};
use hmac::{digest::KeyInit as MacKeyInit, Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

type Aes192Gcm = GcmCipher<Aes192, U12>;

const GCM_TAG_LEN: usize = 16;
const GCM_IV_LEN: usize = 12;
const CBC_IV_LEN: usize = 16;

/// Additional authenticated data fed to the content cipher
pub(crate) fn authenticated_data(encoded_protected_header: &str, aad: Option<&[u8]>) -> Vec<u8> {
    let mut data = encoded_protected_header.as_bytes().to_vec();
    if let Some(aad) = aad {
        data.push(b'.');
        data.extend_from_slice(encoding::encode(aad).as_bytes());
    }
    data
}

/// `A128GCM`, `A192GCM` and `A256GCM`
#[derive(Debug, Clone, Copy)]
pub struct AesGcm {
    name: &'static str,
    key_len: usize,
}

impl AesGcm {
    pub fn a128gcm() -> Self {
        Self { name: "A128GCM", key_len: 16 }
    }

    pub fn a192gcm() -> Self {
        Self { name: "A192GCM", key_len: 24 }
    }

    pub fn a256gcm() -> Self {
        Self { name: "A256GCM", key_len: 32 }
    }

    fn check_inputs(&self, cek: &[u8], iv: &[u8]) -> Result<()> {
        if cek.len() != self.key_len {
            return Err(JweError::InvalidKey(format!(
                "{} requires a {}-bit CEK",
                self.name,
                self.key_len * 8
            )));
        }
        if iv.len() != GCM_IV_LEN {
            return Err(JweError::InvalidParameter("iv".to_string()));
        }
        Ok(())
    }
}

/// AES-GCM seal returning `(ciphertext, tag)`
pub(crate) fn gcm_seal(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    if iv.len() != GCM_IV_LEN {
        return Err(JweError::InvalidParameter("iv".to_string()));
    }
    let mut sealed = match key.len() {
        16 => seal_with::<Aes128Gcm>(key, iv, aad, plaintext)?,
        24 => seal_with::<Aes192Gcm>(key, iv, aad, plaintext)?,
        32 => seal_with::<Aes256Gcm>(key, iv, aad, plaintext)?,
        len => {
            return Err(JweError::InvalidKey(format!(
                "unsupported AES key size: {} bits",
                len * 8
            )))
        }
    };
    let tag = sealed.split_off(sealed.len() - GCM_TAG_LEN);
    Ok((sealed, tag))
}

/// AES-GCM open; any failure is reported as [`JweError::DecryptionFailed`]
pub(crate) fn gcm_open(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>> {
    if iv.len() != GCM_IV_LEN || tag.len() != GCM_TAG_LEN {
        return Err(JweError::DecryptionFailed);
    }
    let mut sealed = Vec::with_capacity(ciphertext.len() + GCM_TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    match key.len() {
        16 => open_with::<Aes128Gcm>(key, iv, aad, &sealed),
        24 => open_with::<Aes192Gcm>(key, iv, aad, &sealed),
        32 => open_with::<Aes256Gcm>(key, iv, aad, &sealed),
        _ => Err(JweError::DecryptionFailed),
    }
}

fn seal_with<C: Aead + KeyInit>(key: &[u8], iv: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key).map_err(|_| JweError::InvalidKey("AES key".to_string()))?;
    cipher
        .encrypt(Nonce::<C>::from_slice(iv), Payload { msg, aad })
        .map_err(|e| JweError::Crypto(e.to_string()))
}

fn open_with<C: Aead + KeyInit>(key: &[u8], iv: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key).map_err(|_| JweError::DecryptionFailed)?;
    cipher
        .decrypt(Nonce::<C>::from_slice(iv), Payload { msg, aad })
        .map_err(|_| JweError::DecryptionFailed)
}

impl ContentEncryption for AesGcm {
    fn name(&self) -> &str {
        self.name
    }

    fn cek_size_bits(&self) -> usize {
        self.key_len * 8
    }

    fn iv_size_bits(&self) -> usize {
        GCM_IV_LEN * 8
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        encoded_protected_header: &str,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        self.check_inputs(cek, iv)?;
        let data = authenticated_data(encoded_protected_header, aad);
        gcm_seal(cek, iv, &data, plaintext)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        encoded_protected_header: &str,
        tag: &[u8],
    ) -> Result<Vec<u8>> {
        if cek.len() != self.key_len {
            return Err(JweError::DecryptionFailed);
        }
        let data = authenticated_data(encoded_protected_header, aad);
        gcm_open(cek, iv, &data, ciphertext, tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacHash {
    Sha256,
    Sha384,
    Sha512,
}

/// `A128CBC-HS256`, `A192CBC-HS384` and `A256CBC-HS512` (RFC 7518 §5.2)
///
/// The CEK is `MAC_KEY || ENC_KEY`, each half the CEK length. The tag is
/// the HMAC over `AAD || IV || ciphertext || AL` truncated to half its size.
#[derive(Debug, Clone, Copy)]
pub struct AesCbcHmac {
    name: &'static str,
    half_key_len: usize,
    hash: MacHash,
}

impl AesCbcHmac {
    pub fn a128cbc_hs256() -> Self {
        Self {
            name: "A128CBC-HS256",
            half_key_len: 16,
            hash: MacHash::Sha256,
        }
    }

    pub fn a192cbc_hs384() -> Self {
        Self {
            name: "A192CBC-HS384",
            half_key_len: 24,
            hash: MacHash::Sha384,
        }
    }

    pub fn a256cbc_hs512() -> Self {
        Self {
            name: "A256CBC-HS512",
            half_key_len: 32,
            hash: MacHash::Sha512,
        }
    }

    fn split_key<'a>(&self, cek: &'a [u8]) -> Option<(&'a [u8], &'a [u8])> {
        (cek.len() == self.half_key_len * 2).then(|| cek.split_at(self.half_key_len))
    }

    fn tag(&self, mac_key: &[u8], aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let al = (aad.len() as u64 * 8).to_be_bytes();
        let parts = [aad, iv, ciphertext, &al[..]];
        let mut tag = match self.hash {
            MacHash::Sha256 => hmac_parts::<Hmac<Sha256>>(mac_key, &parts)?,
            MacHash::Sha384 => hmac_parts::<Hmac<Sha384>>(mac_key, &parts)?,
            MacHash::Sha512 => hmac_parts::<Hmac<Sha512>>(mac_key, &parts)?,
        };
        tag.truncate(self.half_key_len);
        Ok(tag)
    }
}

fn hmac_parts<M: Mac + MacKeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>> {
    let mut mac = <M as MacKeyInit>::new_from_slice(key)
        .map_err(|_| JweError::InvalidKey("HMAC key".to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

fn cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let invalid = |_| JweError::InvalidKey("AES-CBC key or IV".to_string());
    let ciphertext = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        len => {
            return Err(JweError::InvalidKey(format!(
                "unsupported AES key size: {} bits",
                len * 8
            )))
        }
    };
    Ok(ciphertext)
}

fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let failed = |_| JweError::DecryptionFailed;
    match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(failed)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| JweError::DecryptionFailed),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(failed)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| JweError::DecryptionFailed),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(failed)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| JweError::DecryptionFailed),
        _ => Err(JweError::DecryptionFailed),
    }
}

impl ContentEncryption for AesCbcHmac {
    fn name(&self) -> &str {
        self.name
    }

    fn cek_size_bits(&self) -> usize {
        self.half_key_len * 16
    }

    fn iv_size_bits(&self) -> usize {
        CBC_IV_LEN * 8
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        encoded_protected_header: &str,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let (mac_key, enc_key) = self.split_key(cek).ok_or_else(|| {
            JweError::InvalidKey(format!(
                "{} requires a {}-bit CEK",
                self.name,
                self.half_key_len * 16
            ))
        })?;
        if iv.len() != CBC_IV_LEN {
            return Err(JweError::InvalidParameter("iv".to_string()));
        }

        let ciphertext = cbc_encrypt(enc_key, iv, plaintext)?;
        let data = authenticated_data(encoded_protected_header, aad);
        let tag = self.tag(mac_key, &data, iv, &ciphertext)?;
        Ok((ciphertext, tag))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        encoded_protected_header: &str,
        tag: &[u8],
    ) -> Result<Vec<u8>> {
        let (mac_key, enc_key) = self.split_key(cek).ok_or(JweError::DecryptionFailed)?;

        // Authenticate before touching the padding
        let data = authenticated_data(encoded_protected_header, aad);
        let expected = self.tag(mac_key, &data, iv, ciphertext)?;
        if !bool::from(expected.as_slice().ct_eq(tag)) {
            return Err(JweError::DecryptionFailed);
        }

        cbc_decrypt(enc_key, iv, ciphertext)
    }
}
