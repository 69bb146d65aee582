//! Block padding and AES-CBC decryption for encrypted HLS segments.
//!
//! Decryption and unpadding are separate steps: [`decrypt`] always returns a
//! buffer as long as its input, and [`unpad`] validates and strips PKCS#7
//! padding. [`KeyMaterial::decrypt_segment`] composes both for the common
//! case.

pub mod aes_cbc;
pub mod error;
pub mod key;
pub mod padding;

pub use aes_cbc::{BLOCK_SIZE, SUPPORTED_KEY_SIZES, decrypt, decrypt_in_place};
pub use error::{CryptoError, Result};
pub use key::KeyMaterial;
pub use padding::{pad, unpad};
