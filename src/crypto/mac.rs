//! ISO/IEC 9797-1 MAC Algorithm 3 ("retail MAC") for 3DES sessions and
//! AES-CMAC for AES sessions (spec §4.2, component C2), both truncated to 8
//! bytes as the secure messaging wrapper and PACE token step require.

use {
    super::{cipher::CipherKind, error::CryptoError},
    aes::{Aes128, Aes192, Aes256},
    cbc_mac::CbcMac,
    cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
    cmac::{Cmac, Mac},
    des::Des,
};

/// Compute an 8-byte MAC over `data` with the given key and cipher kind.
/// `data` must already be padded to a block multiple (ISO 7816-4 padding,
/// `0x80` then zeros) by the caller — the secure messaging wrapper and the
/// PACE token step pad differently, so this function does not pad itself.
pub fn mac(kind: CipherKind, key: &[u8], data: &[u8]) -> Result<[u8; 8], CryptoError> {
    if key.len() != kind.key_len() {
        return Err(CryptoError::InvalidKeyLength {
            expected: kind.key_len(),
            actual:   key.len(),
        });
    }
    if data.len() % kind.block_len() != 0 {
        return Err(CryptoError::NotBlockAligned);
    }
    match kind {
        CipherKind::Tdes => Ok(retail_mac(key, data)),
        CipherKind::Aes128 => Ok(truncate8(cmac_full::<Aes128>(key, data)?)),
        CipherKind::Aes192 => Ok(truncate8(cmac_full::<Aes192>(key, data)?)),
        CipherKind::Aes256 => Ok(truncate8(cmac_full::<Aes256>(key, data)?)),
    }
}

fn truncate8(full: Vec<u8>) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&full[..8]);
    out
}

fn cmac_full<C>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockEncrypt + KeyInit + Clone,
{
    // Key length was already validated by `mac()` against `kind.key_len()`.
    let mut mac = Cmac::<C>::new_from_slice(key).expect("key length already validated");
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// ISO/IEC 9797-1 MAC Algorithm 3: single-DES CBC-MAC with key K1 over the
/// padded message (IV 0), then a final decrypt-with-K2/encrypt-with-K1 step.
fn retail_mac(key: &[u8], data: &[u8]) -> [u8; 8] {
    let k1 = &key[0..8];
    let k2 = &key[8..16];

    let mut cbc_mac = CbcMac::<Des>::new_from_slice(k1).expect("DES key is always 8 bytes");
    cbc_mac.update(data);
    let h = cbc_mac.finalize().into_bytes();

    let des_k1 = Des::new_from_slice(k1).expect("DES key is always 8 bytes");
    let des_k2 = Des::new_from_slice(k2).expect("DES key is always 8 bytes");

    let mut block = GenericArray::clone_from_slice(&h);
    des_k2.decrypt_block(&mut block);
    des_k1.encrypt_block(&mut block);

    let mut out = [0u8; 8];
    out.copy_from_slice(&block);
    out
}

/// Constant-time MAC comparison, used instead of `==` wherever a MAC is
/// checked against a value the caller does not control.
pub fn verify(kind: CipherKind, key: &[u8], data: &[u8], expected: &[u8]) -> Result<(), CryptoError> {
    use subtle::ConstantTimeEq;
    let computed = mac(kind, key, data)?;
    if bool::from(computed.ct_eq(expected)) {
        Ok(())
    } else {
        Err(CryptoError::MacMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Spec test S4's key material, used to sanity-check the retail MAC
    // produces an 8-byte result deterministically (the full DO-8E value is
    // exercised in `secure_messaging`'s wrap/unwrap tests against S4).
    #[test]
    fn test_retail_mac_is_deterministic() {
        let key = [0x11u8; 16];
        let data = [0u8; 16];
        let a = mac(CipherKind::Tdes, &key, &data).unwrap();
        let b = mac(CipherKind::Tdes, &key, &data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_aes_cmac_matches_known_vector() {
        // RFC 4493 test vector: AES-128-CMAC, all-zero key, empty message.
        let key = hex_literal::hex!("2b7e151628aed2a6abf7158809cf4f3c");
        let result = mac(CipherKind::Aes128, &key, &[]).unwrap();
        let expected = hex_literal::hex!("bb1d6929e95937287fa37d129b756746");
        assert_eq!(result, expected[..8]);
    }
}
