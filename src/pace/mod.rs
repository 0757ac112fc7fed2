//! Password Authenticated Connection Establishment (ICAO 9303-11 §4.6,
//! spec component C6).
//!
//! PACE runs five phases over GENERAL AUTHENTICATE (ISO/IEC 7816-4 INS
//! 0x86): decrypt a chip-chosen nonce under a password-derived key, map it
//! into a fresh generator for an ephemeral group, agree an ephemeral key in
//! that mapped group, exchange authentication tokens over each side's
//! ephemeral public key, then derive and install a fresh secure messaging
//! [`Wrapper`]. The group arithmetic itself (Generic Mapping over both
//! `ModPGroup` and `EllipticCurve`) lives in [`dh`] and [`ec`]; this module
//! owns the wire framing, domain parameter selection, and the nonce step
//! that precedes either.

mod dh;
mod ec;

use {
    crate::{
        asn1::emrtd::security_info::{KeyAgreement, PaceInfo, PaceMapping, PaceProtocol},
        credentials::Credential,
        crypto::{
            cipher::{self, CipherKind},
            error::CryptoError,
            groups::named,
            kdf,
        },
        iso7816::{ApduTransport, Command},
        secure_messaging::Wrapper,
        tlv::{Tag, TlvError, TlvReader, TlvWriter},
    },
    rand::{CryptoRng, RngCore},
    thiserror::Error,
};

const TAG_DYNAMIC_AUTH_DATA: Tag = Tag(0x7C);
const TAG_ENCRYPTED_NONCE: Tag = Tag(0x80);
const TAG_MAPPING_DATA_PCD: Tag = Tag(0x81);
const TAG_MAPPING_DATA_PICC: Tag = Tag(0x82);
const TAG_EPHEMERAL_PK_PCD: Tag = Tag(0x83);
const TAG_EPHEMERAL_PK_PICC: Tag = Tag(0x84);
const TAG_AUTH_TOKEN_PCD: Tag = Tag(0x85);
const TAG_AUTH_TOKEN_PICC: Tag = Tag(0x86);
/// Chip Authentication Mapping only: carries the chip's encrypted static
/// public key alongside the mutual authentication tokens in the final
/// GENERAL AUTHENTICATE exchange (ICAO 9303-11 §4.6, CAM variant).
const TAG_CHIP_AUTH_DATA_PICC: Tag = Tag(0x88);
const TAG_AUTHENTICATION_TOKEN_INPUT: Tag = Tag(0x7F49);

#[derive(Debug, Error)]
pub enum PaceError {
    #[error("SecurityInfo does not advertise a PACE protocol this crate implements")]
    UnknownProtocol,
    #[error("PACE domain parameter id {0:?} is not one of the standardized sets this crate carries")]
    UnsupportedParameterId(Option<u64>),
    #[error("{0} mapping is not implemented")]
    UnsupportedMapping(&'static str),
    #[error("transport error during {0}")]
    Transport(&'static str),
    #[error("GENERAL AUTHENTICATE response is malformed")]
    MalformedResponse,
    #[error("decoded public key is not a valid point of the agreed domain parameters")]
    InvalidPublicKey,
    #[error("mutual authentication token mismatch — password or domain parameters disagree")]
    TokenMismatch,
    #[error("derived session key length does not match an AES key size")]
    BadSessionKeyLength,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Tlv(#[from] TlvError),
}

/// Result of a successful PACE run. `chip_static_public_key` is populated
/// only for Chip Authentication Mapping (CAM), where the chip's long-term
/// public key rides along in phase 3 so the caller can feed it to chip
/// authentication (ICAO 9303-11 §4.6.1 note 2) without a second round trip.
pub struct PaceOutcome {
    pub wrapper: Wrapper,
    pub chip_static_public_key: Option<Vec<u8>>,
}

/// Run PACE (ICAO 9303-11 §4.6) and return the resulting secure messaging
/// wrapper, replacing any wrapper already installed on `transport`'s side of
/// the link.
pub fn run(
    transport: &mut impl ApduTransport,
    credential: &Credential,
    info: &PaceInfo,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<PaceOutcome, PaceError> {
    let protocol =
        PaceProtocol::from_oid_str(&info.protocol.to_string()).ok_or(PaceError::UnknownProtocol)?;
    let cipher_kind = cipher_kind_of(protocol.cipher());
    let mapping = protocol.mapping();

    let seed = credential.pace_password_seed();
    let k_pi = kdf::derive(&seed, kdf::COUNTER_PACE, cipher_kind)?;

    // Phase 1: MSE:Set AT selects the suite, GENERAL AUTHENTICATE step 1
    // returns the chip's nonce encrypted under K_pi.
    let mse_data = build_mse_set_at(&info.protocol.to_string(), info.parameter_id);
    transport
        .transceive(&Command::mse_set_at(0xC1, 0xA4, mse_data))
        .map_err(|_| PaceError::Transport("MSE:Set AT"))?;
    let encrypted_nonce = general_authenticate(transport, &[], TAG_ENCRYPTED_NONCE)?;
    let nonce = cipher::decrypt_block(cipher_kind, &k_pi, &encrypted_nonce)?;

    let domain_parameters =
        DomainParameters::resolve(info.parameter_id).ok_or(PaceError::UnsupportedParameterId(info.parameter_id))?;

    match (protocol.key_agreement(), domain_parameters) {
        (KeyAgreement::Dh, DomainParameters::Group1) => {
            dh::run(named::GROUP_1.into(), cipher_kind, mapping, &nonce, transport, rng)
                .map(wrap_dh_outcome)
        }
        (KeyAgreement::Dh, DomainParameters::Group2) => {
            dh::run(named::GROUP_2.into(), cipher_kind, mapping, &nonce, transport, rng)
                .map(wrap_dh_outcome)
        }
        (KeyAgreement::Dh, DomainParameters::Group3) => {
            dh::run(named::GROUP_3.into(), cipher_kind, mapping, &nonce, transport, rng)
                .map(wrap_dh_outcome)
        }
        (KeyAgreement::Ecdh, DomainParameters::Secp192r1) => {
            ec::run(named::secp192r1(), cipher_kind, mapping, &nonce, transport, rng)
        }
        (KeyAgreement::Ecdh, DomainParameters::Secp224r1) => {
            ec::run(named::secp224r1(), cipher_kind, mapping, &nonce, transport, rng)
        }
        (KeyAgreement::Ecdh, DomainParameters::Secp256r1) => {
            ec::run(named::secp256r1(), cipher_kind, mapping, &nonce, transport, rng)
        }
        (KeyAgreement::Ecdh, DomainParameters::Secp384r1) => {
            ec::run(named::secp384r1(), cipher_kind, mapping, &nonce, transport, rng)
        }
        (KeyAgreement::Ecdh, DomainParameters::Secp521r1) => {
            ec::run(named::secp521r1(), cipher_kind, mapping, &nonce, transport, rng)
        }
        (KeyAgreement::Ecdh, DomainParameters::BrainpoolP256r1) => {
            ec::run(named::brainpool_p256r1(), cipher_kind, mapping, &nonce, transport, rng)
        }
        (KeyAgreement::Dh, _) => Err(PaceError::UnsupportedParameterId(info.parameter_id)),
    }
}

fn wrap_dh_outcome(wrapper: Wrapper) -> PaceOutcome {
    PaceOutcome {
        wrapper,
        chip_static_public_key: None,
    }
}

fn cipher_kind_of(cipher: crate::asn1::emrtd::security_info::SymmetricCipher) -> CipherKind {
    use crate::asn1::emrtd::security_info::SymmetricCipher;
    match cipher {
        SymmetricCipher::Tdes => CipherKind::Tdes,
        SymmetricCipher::Aes128 => CipherKind::Aes128,
        SymmetricCipher::Aes192 => CipherKind::Aes192,
        SymmetricCipher::Aes256 => CipherKind::Aes256,
    }
}

/// The standardized PACE domain parameter sets this crate carries named
/// groups/curves for (ICAO 9303-11 Table 6). Ids 3-7 and the Brainpool
/// curves other than P256 are reserved/not wired up — [`DomainParameters::resolve`]
/// returns `None` for them and the caller surfaces
/// [`PaceError::UnsupportedParameterId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DomainParameters {
    Group1,
    Group2,
    Group3,
    Secp192r1,
    Secp224r1,
    Secp256r1,
    Secp384r1,
    Secp521r1,
    BrainpoolP256r1,
}

impl DomainParameters {
    fn resolve(parameter_id: Option<u64>) -> Option<Self> {
        Some(match parameter_id? {
            0 => Self::Group1,
            1 => Self::Group2,
            2 => Self::Group3,
            8 => Self::Secp192r1,
            9 => Self::Secp224r1,
            10 => Self::Secp256r1,
            11 => Self::Secp384r1,
            12 => Self::Secp521r1,
            15 => Self::BrainpoolP256r1,
            _ => return None,
        })
    }
}

/// Build MSE:Set AT command data: tag 0x80 carries the DER-encoded protocol
/// OID, tag 0x84 the standardized parameter id (ICAO 9303-11 Table 20).
fn build_mse_set_at(protocol_oid: &str, parameter_id: Option<u64>) -> Vec<u8> {
    use der::{asn1::ObjectIdentifier as Oid, Encode};
    let mut data = Vec::new();
    let oid_der = Oid::new_unwrap(protocol_oid)
        .to_der()
        .expect("a parsed OID always re-encodes");
    // The OID's own DER tag/length prefix already matches what tag 0x80
    // wants to carry as its value: strip the universal OBJECT IDENTIFIER
    // tag+length, keep the arc bytes.
    let oid_value = strip_der_header(&oid_der);
    crate::tlv::encode_tlv(&mut data, Tag(0x80), oid_value);
    if let Some(id) = parameter_id {
        data.push(0x84);
        let bytes = id.to_be_bytes();
        let trimmed = bytes.iter().copied().skip_while(|&b| b == 0).collect::<Vec<_>>();
        let trimmed = if trimmed.is_empty() { vec![0] } else { trimmed };
        data.push(trimmed.len() as u8);
        data.extend_from_slice(&trimmed);
    }
    data
}

fn strip_der_header(der: &[u8]) -> &[u8] {
    let len_byte = der[1];
    if len_byte & 0x80 == 0 {
        &der[2..]
    } else {
        let num_len_bytes = (len_byte & 0x7F) as usize;
        &der[2 + num_len_bytes..]
    }
}

/// Run one GENERAL AUTHENTICATE exchange: `entries` are written as nested
/// TLVs inside the outer `0x7C` dynamic authentication data object; the
/// response's matching `expect_tag` entry is returned.
fn general_authenticate(
    transport: &mut impl ApduTransport,
    entries: &[(Tag, &[u8])],
    expect_tag: Tag,
) -> Result<Vec<u8>, PaceError> {
    let mut writer = TlvWriter::new();
    let scope = writer.begin(TAG_DYNAMIC_AUTH_DATA);
    for (tag, value) in entries {
        writer.write_tlv(*tag, value);
    }
    writer.end(scope);

    let response = transport
        .transceive(&Command::general_authenticate(writer.into_bytes(), 256))
        .map_err(|_| PaceError::Transport("GENERAL AUTHENTICATE"))?;

    let mut reader = TlvReader::new(&response.data);
    let outer = reader.expect_tlv(TAG_DYNAMIC_AUTH_DATA)?;
    let mut inner = TlvReader::sub_reader(&outer);
    let tlv = inner.expect_tlv(expect_tag)?;
    Ok(tlv.value.to_vec())
}

/// Left-pad `bytes` with zeros to exactly `width` bytes, as ICAO 9303-11's
/// fixed-width field element/point encodings require (`UintMont::to_be_bytes`
/// strips leading zero bytes, same as `rsa.rs`'s ISO 9796-2 recovery does).
pub(self) fn pad_left(bytes: &[u8], width: usize) -> Vec<u8> {
    assert!(bytes.len() <= width, "value does not fit in the field width");
    let mut out = vec![0u8; width];
    out[width - bytes.len()..].copy_from_slice(bytes);
    out
}

/// Build the mutual authentication token input: `TLV(0x7F49, OID ‖
/// raw-public-key)` over the *peer's* ephemeral public key, as ICAO
/// 9303-11 §4.6 phase 4 defines, then ISO 7816-4-pad it to the cipher's
/// block length for [`crate::crypto::mac::mac`].
pub(self) fn token_input(oid: &str, peer_public_key: &[u8], cipher_kind: CipherKind) -> Vec<u8> {
    use der::{asn1::ObjectIdentifier as Oid, Encode};
    let oid_der = Oid::new_unwrap(oid).to_der().expect("a parsed OID always re-encodes");
    let mut value = oid_der;
    value.extend_from_slice(peer_public_key);
    let mut framed = Vec::new();
    crate::tlv::encode_tlv(&mut framed, TAG_AUTHENTICATION_TOKEN_INPUT, &value);
    framed.push(0x80);
    while framed.len() % cipher_kind.block_len() != 0 {
        framed.push(0x00);
    }
    framed
}
