//! AES-CBC + AES-CMAC secure messaging sessions (PACE/EAC AES cipher
//! suites).

use {super::Wrapper, crate::crypto::cipher::CipherKind};

/// Build a fresh (SSC = 0) AES wrapper from a derived session key pair. The
/// key length selects AES-128/192/256.
pub fn wrapper(k_enc: Vec<u8>, k_mac: Vec<u8>) -> Option<Wrapper> {
    let cipher_kind = match k_enc.len() {
        16 => CipherKind::Aes128,
        24 => CipherKind::Aes192,
        32 => CipherKind::Aes256,
        _ => return None,
    };
    Some(Wrapper::new(cipher_kind, k_enc, k_mac))
}
