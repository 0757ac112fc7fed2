//! 3DES-CBC + retail MAC secure messaging sessions (BAC and 3DES PACE/EAC
//! cipher suites).

use {super::Wrapper, crate::crypto::cipher::CipherKind};

/// Build a fresh (SSC = 0) 3DES wrapper from a derived session key pair.
pub fn wrapper(k_enc: Vec<u8>, k_mac: Vec<u8>) -> Wrapper {
    Wrapper::new(CipherKind::Tdes, k_enc, k_mac)
}

/// Build a 3DES wrapper with an explicit starting SSC, as BAC derives from
/// the two challenge nonces (spec §4.5 step 5).
pub fn wrapper_with_ssc(k_enc: Vec<u8>, k_mac: Vec<u8>, ssc: Vec<u8>) -> Wrapper {
    Wrapper::with_ssc(CipherKind::Tdes, k_enc, k_mac, ssc)
}
