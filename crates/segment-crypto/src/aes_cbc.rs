// AES-CBC decryption without implicit unpadding.

use aes::{Aes128, Aes192, Aes256};
use cipher::block_padding::NoPadding;
use cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit};

use crate::error::{CryptoError, Result};

/// AES block size in bytes. Also the required IV length.
pub const BLOCK_SIZE: usize = 16;

/// Key lengths accepted by [`decrypt`].
pub const SUPPORTED_KEY_SIZES: [usize; 3] = [16, 24, 32];

/// Decrypt `cipher_text` with AES in CBC mode.
///
/// The AES variant is picked from the key length. The output has the same
/// length as the input; padding is left in place so callers decide whether
/// to run [`crate::unpad`].
pub fn decrypt(key: &[u8], iv: &[u8], cipher_text: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = cipher_text.to_vec();
    decrypt_in_place(key, iv, &mut buffer)?;
    Ok(buffer)
}

/// In-place variant of [`decrypt`].
pub fn decrypt_in_place(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<()> {
    // The cipher is keyed before anything else is looked at.
    if !SUPPORTED_KEY_SIZES.contains(&key.len()) {
        return Err(CryptoError::InvalidKeySize(key.len()));
    }
    if iv.len() != BLOCK_SIZE {
        return Err(CryptoError::InvalidIvSize(iv.len()));
    }
    if buffer.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidBufferLength(buffer.len()));
    }
    if buffer.is_empty() {
        return Ok(());
    }

    match key.len() {
        16 => decrypt_with::<Aes128>(key, iv, buffer),
        24 => decrypt_with::<Aes192>(key, iv, buffer),
        32 => decrypt_with::<Aes256>(key, iv, buffer),
        other => Err(CryptoError::InvalidKeySize(other)),
    }
}

fn decrypt_with<C>(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<()>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let len = buffer.len();
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeySize(key.len()))?;
    decryptor
        .decrypt_padded_mut::<NoPadding>(buffer)
        .map_err(|_| CryptoError::InvalidBufferLength(len))?;
    Ok(())
}
