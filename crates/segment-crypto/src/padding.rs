//! PKCS#7 block padding.
//!
//! Every padded buffer ends with `n` bytes of value `n`, where `n` is in
//! `1..=block_size`. Data that is already block aligned receives a full
//! block of padding so the operation is always reversible.

use crate::error::{CryptoError, Result};

/// Pad `data` to a multiple of `block_size`.
///
/// `block_size` must be in `1..=255` since every padding byte stores the
/// padding length.
pub fn pad(data: &[u8], block_size: usize) -> Result<Vec<u8>> {
    if block_size == 0 || block_size > u8::MAX as usize {
        return Err(CryptoError::InvalidBlockSize(block_size));
    }

    let n = block_size - data.len() % block_size;
    let mut padded = Vec::with_capacity(data.len() + n);
    padded.extend_from_slice(data);
    padded.resize(data.len() + n, n as u8);
    Ok(padded)
}

/// Validate and strip PKCS#7 padding.
///
/// All `n` trailing bytes are checked, not only the last one.
pub fn unpad(data: &[u8], block_size: usize) -> Result<&[u8]> {
    if block_size == 0 {
        return Err(CryptoError::InvalidBlockSize(block_size));
    }
    if data.is_empty() || data.len() % block_size != 0 {
        return Err(CryptoError::InvalidPaddingData { len: data.len() });
    }

    let last = data[data.len() - 1];
    let n = last as usize;
    if n == 0 || n > data.len() {
        return Err(CryptoError::InvalidPadding);
    }

    let (plain, padding) = data.split_at(data.len() - n);
    if padding.iter().any(|&b| b != last) {
        return Err(CryptoError::InvalidPadding);
    }

    Ok(plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pad_appends_partial_block() {
        let padded = pad(b"abcde", 8).unwrap();
        assert_eq!(padded, b"abcde\x03\x03\x03");
    }

    #[test]
    fn pad_appends_full_block_when_aligned() {
        let padded = pad(&[7u8; 16], 16).unwrap();
        assert_eq!(padded.len(), 32);
        assert!(padded[16..].iter().all(|&b| b == 16));
    }

    #[test]
    fn pad_rejects_unrepresentable_block_sizes() {
        assert_eq!(pad(b"x", 0), Err(CryptoError::InvalidBlockSize(0)));
        assert_eq!(pad(b"x", 256), Err(CryptoError::InvalidBlockSize(256)));
    }

    #[test]
    fn unpad_rejects_zero_block_size() {
        assert_eq!(unpad(b"", 0), Err(CryptoError::InvalidBlockSize(0)));
        assert_eq!(
            unpad(&[4, 4, 4, 4], 0),
            Err(CryptoError::InvalidBlockSize(0))
        );
    }

    #[test]
    fn unpad_rejects_empty_and_misaligned_input() {
        assert_eq!(
            unpad(&[], 4),
            Err(CryptoError::InvalidPaddingData { len: 0 })
        );
        assert_eq!(
            unpad(&[1, 2, 3, 1, 1], 4),
            Err(CryptoError::InvalidPaddingData { len: 5 })
        );
    }

    #[test]
    fn unpad_rejects_zero_padding_byte() {
        assert_eq!(unpad(&[1, 2, 3, 0], 4), Err(CryptoError::InvalidPadding));
    }

    #[test]
    fn unpad_rejects_padding_longer_than_input() {
        assert_eq!(unpad(&[9, 9, 9, 9], 4), Err(CryptoError::InvalidPadding));
    }

    #[test]
    fn unpad_rejects_inconsistent_padding_bytes() {
        assert_eq!(unpad(&[1, 1, 2, 3], 4), Err(CryptoError::InvalidPadding));
        assert_eq!(
            unpad(&[0xAA, 0x02, 0x03, 0x03, 0x03, 0x04, 0x04, 0x04], 4),
            Err(CryptoError::InvalidPadding)
        );
    }

    #[test]
    fn unpad_strips_whole_padding_block() {
        assert_eq!(unpad(&[4, 4, 4, 4], 4), Ok(&[][..]));
        assert_eq!(unpad(&[1, 7, 7, 7, 7, 7, 7, 7], 8), Ok(&[1][..]));
        assert_eq!(unpad(&[1, 2, 2, 2, 2, 2, 2, 7], 8), Err(CryptoError::InvalidPadding));
    }

    proptest! {
        #[test]
        fn pad_then_unpad_is_identity(
            data in proptest::collection::vec(any::<u8>(), 0..300),
            block_size in 1usize..=255,
        ) {
            let padded = pad(&data, block_size).unwrap();
            prop_assert_eq!(padded.len() % block_size, 0);
            prop_assert!(padded.len() > data.len());
            prop_assert_eq!(unpad(&padded, block_size).unwrap(), data.as_slice());
        }
    }
}
