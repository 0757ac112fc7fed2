//! Active Authentication (ICAO 9303-11 §6, spec component C8): the chip
//! proves possession of the private key matching DG15's public key by
//! signing an 8-byte nonce chosen by the terminal.
//!
//! Two signature schemes are supported, both keyed from the same
//! `SubjectPublicKeyInfo` DG15 carries raw (spec §4.8: "reader tries RSA
//! then EC algorithm identifiers and returns the first that parses"): RSA
//! with ISO/IEC 9796-2 message recovery, and plain (non-DER) ECDSA over the
//! curves [`crate::eac::chip_authentication`] already carries named
//! parameters for, whose public-key resolution this module reuses since
//! DG14 and DG15 keys are encoded identically.

use {
    crate::{
        asn1::public_key_info::SubjectPublicKeyInfo,
        crypto::{
            ecdsa::{ECPublicKey, ECSignature},
            groups::{named, EllipticCurve},
            mod_ring::{RingRefExt, UintExp, UintMont},
            rsa::RSAPublicKey,
        },
        eac::chip_authentication::{decode_point, resolve_named_curve, NamedCurve},
        iso7816::{ApduTransport, Command, StatusWord},
    },
    rand::{CryptoRng, RngCore},
    ruint::{aliases::U1024, aliases::U2048, Uint},
    sha2::{Digest, Sha256},
    subtle::ConditionallySelectable,
    thiserror::Error,
};

const CHALLENGE_LEN: usize = 8;

type U3072 = Uint<3072, 48>;
type U4096 = Uint<4096, 64>;

#[derive(Debug, Error)]
pub enum AaError {
    #[error("DG15 public key is neither RSA nor a named EC curve this crate supports")]
    UnsupportedKey,
    #[error("transport error during INTERNAL AUTHENTICATE")]
    Transport,
    #[error("chip rejected INTERNAL AUTHENTICATE ({0:?})")]
    ChipRejected(StatusWord),
    #[error("signature does not verify against the DG15 public key")]
    InvalidSignature,
}

/// Challenge the chip with a fresh random nonce and verify its response
/// against DG15's public key.
///
/// For RSA keys the recovered message M1 is returned (and checked to equal
/// the challenge, since the whole 8-byte nonce always fits in the
/// recoverable part for any realistic modulus size); for EC keys nothing is
/// recovered and `None` is returned.
pub fn run(
    transport: &mut impl ApduTransport,
    dg15_public_key: &SubjectPublicKeyInfo,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<Option<Vec<u8>>, AaError> {
    let mut challenge = [0u8; CHALLENGE_LEN];
    rng.fill_bytes(&mut challenge);

    let response = transport
        .transceive(&Command::internal_authenticate(challenge.to_vec(), 256))
        .map_err(|_| AaError::Transport)?;
    if !response.sw.is_success() {
        return Err(AaError::ChipRejected(response.sw));
    }

    match dg15_public_key {
        SubjectPublicKeyInfo::Rsa(_) => verify_rsa(dg15_public_key, &response.data, &challenge).map(Some),
        SubjectPublicKeyInfo::Unknown(_) => {
            verify_ec(dg15_public_key, &response.data, &challenge)?;
            Ok(None)
        }
    }
}

fn verify_rsa(key: &SubjectPublicKeyInfo, signature: &[u8], challenge: &[u8]) -> Result<Vec<u8>, AaError> {
    if let Ok(pk) = RSAPublicKey::<U1024>::try_from(key.clone()) {
        return recover_and_check(&pk, signature, challenge);
    }
    if let Ok(pk) = RSAPublicKey::<U2048>::try_from(key.clone()) {
        return recover_and_check(&pk, signature, challenge);
    }
    if let Ok(pk) = RSAPublicKey::<U3072>::try_from(key.clone()) {
        return recover_and_check(&pk, signature, challenge);
    }
    if let Ok(pk) = RSAPublicKey::<U4096>::try_from(key.clone()) {
        return recover_and_check(&pk, signature, challenge);
    }
    Err(AaError::UnsupportedKey)
}

fn recover_and_check<U: UintMont>(
    pk: &RSAPublicKey<U>,
    signature: &[u8],
    challenge: &[u8],
) -> Result<Vec<u8>, AaError> {
    let recovered = pk
        .verify_iso9796_2(signature, &[])
        .map_err(|_| AaError::InvalidSignature)?;
    if recovered != challenge {
        return Err(AaError::InvalidSignature);
    }
    Ok(recovered)
}

fn verify_ec(key: &SubjectPublicKeyInfo, signature: &[u8], challenge: &[u8]) -> Result<(), AaError> {
    let curve = resolve_named_curve(key).map_err(|_| AaError::UnsupportedKey)?;
    match curve {
        NamedCurve::Secp192r1 => verify_ec_on_curve(named::secp192r1(), key, signature, challenge),
        NamedCurve::Secp224r1 => verify_ec_on_curve(named::secp224r1(), key, signature, challenge),
        NamedCurve::Secp256r1 => verify_ec_on_curve(named::secp256r1(), key, signature, challenge),
        NamedCurve::Secp384r1 => verify_ec_on_curve(named::secp384r1(), key, signature, challenge),
        NamedCurve::Secp521r1 => verify_ec_on_curve(named::secp521r1(), key, signature, challenge),
        NamedCurve::BrainpoolP256r1 => verify_ec_on_curve(named::brainpool_p256r1(), key, signature, challenge),
    }
}

fn verify_ec_on_curve<U>(
    curve: EllipticCurve<U, U>,
    key: &SubjectPublicKeyInfo,
    signature: &[u8],
    challenge: &[u8],
) -> Result<(), AaError>
where
    U: UintMont + UintExp + ConditionallySelectable,
{
    let base_field = curve.base_field();
    let coord_len = (base_field.modulus().bit_len() + 7) / 8;

    let public_key_bytes = ec_public_key_bytes(key)?;
    let point = decode_point(&curve, public_key_bytes, coord_len).map_err(|_| AaError::InvalidSignature)?;
    let public_key = ECPublicKey::new(&curve, point);

    if signature.len() != 2 * coord_len {
        return Err(AaError::InvalidSignature);
    }
    let scalar_field = curve.scalar_field();
    let modulus = *scalar_field.modulus();
    let r = U::from_be_bytes(&signature[..coord_len]);
    let s = U::from_be_bytes(&signature[coord_len..]);
    if r >= modulus || s >= modulus {
        return Err(AaError::InvalidSignature);
    }
    let ecdsa_signature = ECSignature {
        r: scalar_field.from(r),
        s: scalar_field.from(s),
    };

    let digest = Sha256::digest(challenge);
    let order_bits = modulus.bit_len();
    let truncated = truncate_hash(&digest, order_bits);
    let hash_value = U::from_be_bytes(&truncated).sub_mod(modulus, modulus);
    let hash = scalar_field.from(hash_value);

    public_key
        .verify(&hash, &ecdsa_signature)
        .map_err(|_| AaError::InvalidSignature)
}

fn ec_public_key_bytes(info: &SubjectPublicKeyInfo) -> Result<&[u8], AaError> {
    match info {
        SubjectPublicKeyInfo::Unknown(any) => any.subject_public_key.as_bytes().ok_or(AaError::UnsupportedKey),
        SubjectPublicKeyInfo::Rsa(_) => Err(AaError::UnsupportedKey),
    }
}

/// FIPS 186-4 §6.4: when the hash is longer than the curve order, use only
/// the leftmost `order_bits` bits of it (a plain right shift of the whole
/// digest, not a byte truncation — only relevant for the narrower curves in
/// this crate's menu, since SHA-256 output already fits secp256r1/secp384r1/
/// secp521r1/brainpool orders untouched).
fn truncate_hash(digest: &[u8], order_bits: usize) -> Vec<u8> {
    let hash_bits = digest.len() * 8;
    if hash_bits <= order_bits {
        return digest.to_vec();
    }
    let keep_bytes = (order_bits + 7) / 8;
    let mut truncated = digest[..keep_bytes].to_vec();
    let excess_bits = keep_bytes * 8 - order_bits;
    if excess_bits > 0 {
        let mut carry = 0u8;
        for byte in truncated.iter_mut() {
            let next_carry = *byte << (8 - excess_bits);
            *byte = (*byte >> excess_bits) | carry;
            carry = next_carry;
        }
    }
    truncated
}
