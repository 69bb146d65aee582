use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid block size {0}")]
    InvalidBlockSize(usize),

    #[error("invalid padding data (empty or not block aligned, length {len})")]
    InvalidPaddingData { len: usize },

    #[error("invalid padding on input")]
    InvalidPadding,

    #[error("invalid key size {0} (expected 16, 24 or 32 bytes)")]
    InvalidKeySize(usize),

    #[error("invalid IV size {0} (expected 16 bytes)")]
    InvalidIvSize(usize),

    #[error("cipher text length {0} is not a multiple of the block size")]
    InvalidBufferLength(usize),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
