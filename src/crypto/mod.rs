//! Implements the required cryptography.
//!
//! Primarily based on TR-03111 and ISO/IEC 9797-1.

pub mod cipher;
pub mod ecdsa;
mod error;
pub mod groups;
pub mod kdf;
pub mod mac;
pub mod mod_ring;
pub mod rsa;

pub use error::CryptoError;
use rand::{CryptoRng, RngCore};

/// Blanket bound used everywhere a caller-supplied RNG is threaded through —
/// key generation, nonce generation, ephemeral key agreement.
pub trait CryptoCoreRng: CryptoRng + RngCore {}

impl<T> CryptoCoreRng for T where T: CryptoRng + RngCore {}
