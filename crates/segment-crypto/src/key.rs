use std::fmt;

use crate::aes_cbc::{self, BLOCK_SIZE, SUPPORTED_KEY_SIZES};
use crate::error::{CryptoError, Result};
use crate::padding;

/// Raw key bytes doubling as the CBC initialization vector.
///
/// The IV is the leading block of the key, so for AES-128 key and IV are the
/// same bytes. This mirrors how the source streams are packaged and is not a
/// general HLS rule.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if !SUPPORTED_KEY_SIZES.contains(&bytes.len()) {
            return Err(CryptoError::InvalidKeySize(bytes.len()));
        }
        Ok(Self { bytes })
    }

    pub fn key(&self) -> &[u8] {
        &self.bytes
    }

    pub fn iv(&self) -> &[u8] {
        &self.bytes[..BLOCK_SIZE]
    }

    /// Key size in bits (128, 192 or 256).
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Decrypt a whole segment and strip its PKCS#7 padding.
    pub fn decrypt_segment(&self, cipher_text: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = cipher_text.to_vec();
        aes_cbc::decrypt_in_place(self.key(), self.iv(), &mut buffer)?;
        let plain_len = padding::unpad(&buffer, BLOCK_SIZE)?.len();
        buffer.truncate(plain_len);
        Ok(buffer)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::Aes128;
    use cipher::block_padding::Pkcs7;
    use cipher::{BlockEncryptMut, KeyIvInit};

    #[test]
    fn rejects_invalid_lengths() {
        assert_eq!(
            KeyMaterial::from_bytes(vec![0u8; 20]),
            Err(CryptoError::InvalidKeySize(20))
        );
        assert_eq!(
            KeyMaterial::from_bytes(Vec::new()),
            Err(CryptoError::InvalidKeySize(0))
        );
    }

    #[test]
    fn iv_is_leading_block() {
        let bytes: Vec<u8> = (0u8..32).collect();
        let key = KeyMaterial::from_bytes(bytes.clone()).unwrap();
        assert_eq!(key.bits(), 256);
        assert_eq!(key.key(), bytes.as_slice());
        assert_eq!(key.iv(), &bytes[..16]);
    }

    #[test]
    fn decrypts_segment_encrypted_with_key_as_iv() {
        let raw = [0x5Au8; 16];
        let plain = b"#EXTM3U segment bytes 0123456789";
        let mut buffer = vec![0u8; plain.len() + 16];
        buffer[..plain.len()].copy_from_slice(plain);
        let cipher_text = cbc::Encryptor::<Aes128>::new_from_slices(&raw, &raw)
            .unwrap()
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, plain.len())
            .unwrap()
            .to_vec();

        let key = KeyMaterial::from_bytes(raw.to_vec()).unwrap();
        assert_eq!(key.decrypt_segment(&cipher_text).unwrap(), plain);
    }

    #[test]
    fn debug_output_hides_key_bytes() {
        let key = KeyMaterial::from_bytes(vec![0xEEu8; 16]).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("128"));
        assert!(!debug.contains("238"));
    }
}
