//! Direct use of a shared symmetric key as the CEK (`dir`)

use super::{Algorithm, DirectEncryption};
use crate::error::Result;
use crate::jwk::Jwk;
use zeroize::Zeroizing;

/// `dir`: the recipient's `oct` key is the CEK itself
#[derive(Debug, Clone, Copy, Default)]
pub struct Dir;

impl Algorithm for Dir {
    fn name(&self) -> &str {
        "dir"
    }

    fn allowed_key_types(&self) -> &[&'static str] {
        &["oct"]
    }
}

impl DirectEncryption for Dir {
    fn cek(&self, key: &Jwk) -> Result<Zeroizing<Vec<u8>>> {
        key.bytes("k")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JweError;
    use serde_json::json;

    #[test]
    fn test_cek_is_key() -> Result<()> {
        let key = Jwk::oct(&[42u8; 32]);
        assert_eq!(Dir.cek(&key)?.as_slice(), &[42u8; 32]);
        Ok(())
    }

    #[test]
    fn test_missing_k() -> Result<()> {
        let key = Jwk::from_value(json!({"kty": "oct"}))?;
        assert!(matches!(
            Dir.cek(&key),
            Err(JweError::MissingKeyParameter(p)) if p == "k"
        ));
        Ok(())
    }
}
