use thiserror::Error;

/// Errors from the symmetric crypto primitives adapter (spec §7 `CryptoError`).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Ciphertext padding is invalid")]
    BadPadding,

    #[error("MAC verification failed")]
    MacMismatch,

    #[error("No such algorithm: {0}")]
    NoSuchAlgorithm(&'static str),

    #[error("Key agreement failed")]
    KeyAgreementFailed,

    #[error("Input is not a multiple of the block size")]
    NotBlockAligned,
}
