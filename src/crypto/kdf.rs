//! ICAO 9303-11 §9.7.1 key derivation function (spec §4.3, component C3).
//!
//! `derive(seed, counter, cipher_kind, hash_kind) = H(seed ‖ BE32(counter))`,
//! truncated or expanded to the cipher's key length. `counter` is 1 for the
//! encryption key, 2 for the MAC key, 3 for a password-derived key (PACE).

use {
    super::{cipher::CipherKind, error::CryptoError},
    sha1::Sha1,
    sha2::{Digest, Sha256, Sha384, Sha512},
};

pub const COUNTER_ENC: u32 = 1;
pub const COUNTER_MAC: u32 = 2;
pub const COUNTER_PACE: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashKind {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    /// The hash ICAO 9303 pairs with each cipher kind for key derivation.
    pub const fn for_cipher(cipher_kind: CipherKind) -> Self {
        match cipher_kind {
            CipherKind::Tdes | CipherKind::Aes128 => Self::Sha1,
            CipherKind::Aes192 | CipherKind::Aes256 => Self::Sha256,
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Set odd parity on each byte of a DES/3DES key component, as ICAO 9303
/// requires for keys derived via this KDF.
fn set_des_parity(key: &mut [u8]) {
    for byte in key.iter_mut() {
        let ones = byte.count_ones();
        if ones % 2 == 0 {
            *byte ^= 1;
        }
    }
}

/// Derive a session or password key per ICAO 9303-11 §9.7.1.
pub fn derive(seed: &[u8], counter: u32, cipher_kind: CipherKind) -> Result<Vec<u8>, CryptoError> {
    let hash_kind = HashKind::for_cipher(cipher_kind);
    let mut input = Vec::with_capacity(seed.len() + 4);
    input.extend_from_slice(seed);
    input.extend_from_slice(&counter.to_be_bytes());
    let digest = hash_kind.digest(&input);

    Ok(match cipher_kind {
        CipherKind::Tdes => {
            let mut k1 = digest[0..8].to_vec();
            let mut k2 = digest[8..16].to_vec();
            set_des_parity(&mut k1);
            set_des_parity(&mut k2);
            let mut key = Vec::with_capacity(24);
            key.extend_from_slice(&k1);
            key.extend_from_slice(&k2);
            key.extend_from_slice(&k1);
            key
        }
        CipherKind::Aes128 => digest[0..16].to_vec(),
        CipherKind::Aes192 => digest[0..24].to_vec(),
        CipherKind::Aes256 => digest[0..32].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    // ICAO 9303-11 Appendix G worked example: PACE password key K_pi for an
    // AES-128 (BrainpoolP256r1) cipher suite (spec test vector S1).
    #[test]
    fn test_pace_password_key() {
        let k_seed = hex!("7E2D2A41 C74EA0B3 8CD36F86 3939BFA8 E9032AAD");
        let k_pi = derive(&k_seed, COUNTER_PACE, CipherKind::Aes128).unwrap();
        assert_eq!(k_pi, hex!("89DED1B2 6624EC1E 634C1989 302849DD"));
    }
}
