//! Base64URL helpers
//!
//! Every binary value on the JOSE wire is unpadded Base64URL.

use crate::error::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine as _};

/// Encode bytes as unpadded Base64URL
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64URL.encode(bytes)
}

/// Decode unpadded Base64URL
pub fn decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    Ok(BASE64URL.decode(input)?)
}
