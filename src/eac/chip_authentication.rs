//! Chip Authentication (ICAO 9303-11 §4.7, CA half): an ephemeral ECDH key
//! agreement against the chip's static public key, re-keying secure
//! messaging with a fresh wrapper (SSC reset to zero). Unlike PACE there is
//! no mutual authentication token exchange — success is confirmed
//! implicitly by the chip accepting commands under the new keys.

use {
    super::EacError,
    crate::{
        asn1::{
            emrtd::security_info::{
                ChipAuthenticationInfo, ChipAuthenticationPublicKeyInfo, KeyAgreement, SecurityInfos,
                SecurityInfo, SymmetricCipher,
            },
            public_key_info::{ECAlgoParameters, SubjectPublicKeyInfo},
        },
        crypto::{
            cipher::CipherKind,
            groups::{named, EllipticCurve, EllipticCurvePoint},
            kdf,
            mod_ring::{RingRefExt, UintExp, UintMont},
        },
        iso7816::{ApduTransport, Command},
        secure_messaging::Wrapper,
        tlv::{Tag, TlvReader, TlvWriter},
    },
    rand::{CryptoRng, RngCore},
    subtle::ConditionallySelectable,
};

const TAG_DYNAMIC_AUTH_DATA: Tag = Tag(0x7C);
const TAG_EPHEMERAL_PK_PCD: Tag = Tag(0x80);
const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// Result of a successful Chip Authentication run. `ephemeral_public_key`
/// is the PCD's own ephemeral public key from phase 2, re-encoded the same
/// way so a caller can feed it straight into
/// [`super::terminal_authentication::run`]'s challenge signature (ICAO
/// 9303-11 §4.7 note: TA's challenge covers the CA ephemeral key).
pub struct ChipAuthenticationOutcome {
    pub wrapper: Wrapper,
    pub ephemeral_public_key: Vec<u8>,
}

/// Run Chip Authentication and return the replacement secure messaging
/// wrapper. `security_infos` is EF.DG14's parsed `SET OF SecurityInfo`.
pub fn run(
    transport: &mut impl ApduTransport,
    security_infos: &SecurityInfos,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<ChipAuthenticationOutcome, EacError> {
    let (ca, pk) = find_chip_authentication_data(security_infos)?;

    match pk.key_agreement {
        KeyAgreement::Dh => Err(EacError::UnsupportedKeyAgreement),
        KeyAgreement::Ecdh => run_ecdh(transport, &ca, &pk, rng),
    }
}

fn find_chip_authentication_data(
    security_infos: &SecurityInfos,
) -> Result<(ChipAuthenticationInfo, ChipAuthenticationPublicKeyInfo), EacError> {
    let mut ca = None;
    let mut pk = None;
    for info in security_infos.iter() {
        match info {
            SecurityInfo::ChipAuthentication(found) => ca = Some(found.clone()),
            SecurityInfo::ChipAuthenticationPublicKey(found) => pk = Some(found.clone()),
            _ => {}
        }
    }
    match (ca, pk) {
        (Some(ca), Some(pk)) => Ok((ca, pk)),
        _ => Err(EacError::NoChipAuthenticationData),
    }
}

fn run_ecdh(
    transport: &mut impl ApduTransport,
    ca: &ChipAuthenticationInfo,
    pk: &ChipAuthenticationPublicKeyInfo,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<ChipAuthenticationOutcome, EacError> {
    match resolve_named_curve(&pk.public_key)? {
        NamedCurve::Secp192r1 => run_on_curve(transport, ca, pk, named::secp192r1(), rng),
        NamedCurve::Secp224r1 => run_on_curve(transport, ca, pk, named::secp224r1(), rng),
        NamedCurve::Secp256r1 => run_on_curve(transport, ca, pk, named::secp256r1(), rng),
        NamedCurve::Secp384r1 => run_on_curve(transport, ca, pk, named::secp384r1(), rng),
        NamedCurve::Secp521r1 => run_on_curve(transport, ca, pk, named::secp521r1(), rng),
        NamedCurve::BrainpoolP256r1 => run_on_curve(transport, ca, pk, named::brainpool_p256r1(), rng),
    }
}

fn run_on_curve<U, V>(
    transport: &mut impl ApduTransport,
    ca: &ChipAuthenticationInfo,
    pk: &ChipAuthenticationPublicKeyInfo,
    curve: EllipticCurve<U, V>,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<ChipAuthenticationOutcome, EacError>
where
    U: UintMont + ConditionallySelectable,
    V: UintMont + UintExp,
{
    let base_field = curve.base_field();
    let scalar_field = curve.scalar_field();
    let coord_len = (base_field.modulus().bit_len() + 7) / 8;

    let chip_static_public_key = decode_point(&curve, static_public_key_bytes(&pk.public_key)?, coord_len)?;

    let mse_data = build_mse_set_at(ca, pk.key_id);
    transport
        .transceive(&Command::mse_set_at(0x41, 0xA4, mse_data))
        .map_err(|_| EacError::Transport("MSE:Set AT"))?;

    let ephemeral_sk = scalar_field.random(rng);
    let ephemeral_pk = curve.generator() * ephemeral_sk;
    let ephemeral_pk_bytes = encode_point(ephemeral_pk, coord_len)?;

    let response = general_authenticate(transport, &ephemeral_pk_bytes)?;
    if !response.sw.is_success() {
        return Err(EacError::ChipRejected(response.sw));
    }

    let shared_point = chip_static_public_key * ephemeral_sk;
    let x = shared_point.x().ok_or(EacError::InvalidPublicKey)?;
    let shared_secret = pad_left(&x.to_uint().to_be_bytes(), coord_len);

    let cipher_kind = cipher_kind_of(ca.protocol.cipher);
    let k_enc = kdf::derive(&shared_secret, kdf::COUNTER_ENC, cipher_kind)?;
    let k_mac = kdf::derive(&shared_secret, kdf::COUNTER_MAC, cipher_kind)?;
    Ok(ChipAuthenticationOutcome {
        wrapper: Wrapper::new(cipher_kind, k_enc, k_mac),
        ephemeral_public_key: ephemeral_pk_bytes,
    })
}

/// Recover the raw uncompressed point bytes from a `ChipAuthenticationPublicKeyInfo`'s
/// `SubjectPublicKeyInfo`. EC/DH public keys never specialize to an
/// `Rsa(..)` variant, so this is always the `Unknown` branch in practice.
fn static_public_key_bytes(info: &SubjectPublicKeyInfo) -> Result<&[u8], EacError> {
    match info {
        SubjectPublicKeyInfo::Unknown(any) => {
            any.subject_public_key.as_bytes().ok_or(EacError::InvalidPublicKey)
        }
        SubjectPublicKeyInfo::Rsa(_) => Err(EacError::InvalidPublicKey),
    }
}

/// Shared with [`crate::aa`], which resolves DG15's EC public key the same
/// way this module resolves DG14's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NamedCurve {
    Secp192r1,
    Secp224r1,
    Secp256r1,
    Secp384r1,
    Secp521r1,
    BrainpoolP256r1,
}

const ID_NIST_P192: &str = "1.2.840.10045.3.1.1";
const ID_NIST_P224: &str = "1.3.132.0.33";
const ID_NIST_P256: &str = "1.2.840.10045.3.1.7";
const ID_NIST_P384: &str = "1.3.132.0.34";
const ID_NIST_P521: &str = "1.3.132.0.35";
const ID_BRAINPOOL_P256R1: &str = "1.3.36.3.3.2.8.1.1.7";

/// Identify which of this crate's named curves the chip's public key uses.
/// Only `NamedCurve` algorithm parameters are supported — explicit curve
/// parameters (`EcParameters`), seen on some Dutch eMRTDs, are rejected the
/// same way PACE rejects domain parameter ids it doesn't carry a curve for.
pub(crate) fn resolve_named_curve(info: &SubjectPublicKeyInfo) -> Result<NamedCurve, EacError> {
    let SubjectPublicKeyInfo::Unknown(any) = info else {
        return Err(EacError::UnsupportedDomainParameters);
    };
    let parameters = any
        .algorithm
        .parameters
        .as_ref()
        .ok_or(EacError::UnsupportedDomainParameters)?;
    let ECAlgoParameters::NamedCurve(oid) = parameters
        .decode_as::<ECAlgoParameters>()
        .map_err(|_| EacError::UnsupportedDomainParameters)?
    else {
        return Err(EacError::UnsupportedDomainParameters);
    };
    Ok(match oid.to_string().as_str() {
        ID_NIST_P192 => NamedCurve::Secp192r1,
        ID_NIST_P224 => NamedCurve::Secp224r1,
        ID_NIST_P256 => NamedCurve::Secp256r1,
        ID_NIST_P384 => NamedCurve::Secp384r1,
        ID_NIST_P521 => NamedCurve::Secp521r1,
        ID_BRAINPOOL_P256R1 => NamedCurve::BrainpoolP256r1,
        _ => return Err(EacError::UnsupportedDomainParameters),
    })
}

fn cipher_kind_of(cipher: Option<SymmetricCipher>) -> CipherKind {
    match cipher {
        Some(SymmetricCipher::Tdes) | None => CipherKind::Tdes,
        Some(SymmetricCipher::Aes128) => CipherKind::Aes128,
        Some(SymmetricCipher::Aes192) => CipherKind::Aes192,
        Some(SymmetricCipher::Aes256) => CipherKind::Aes256,
    }
}

/// Build MSE:Set AT command data for Chip Authentication: tag 0x80 carries
/// the DER-encoded protocol OID, tag 0x84 the optional key id (ICAO
/// 9303-11 §4.7, mirroring PACE's own MSE:Set AT framing).
fn build_mse_set_at(ca: &ChipAuthenticationInfo, key_id: Option<u64>) -> Vec<u8> {
    use der::Encode;
    let mut data = Vec::new();
    let oid_der = ca.protocol.to_oid().to_der().expect("a parsed OID always re-encodes");
    let oid_value = strip_der_header(&oid_der);
    crate::tlv::encode_tlv(&mut data, Tag(0x80), oid_value);
    if let Some(id) = key_id {
        let bytes = id.to_be_bytes();
        let trimmed: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
        let trimmed = if trimmed.is_empty() { vec![0] } else { trimmed };
        crate::tlv::encode_tlv(&mut data, Tag(0x84), &trimmed);
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

/// Run one GENERAL AUTHENTICATE exchange carrying the PCD's ephemeral
/// public key (tag 0x80 inside the 0x7C dynamic authentication data
/// object). The chip's reply carries no data of interest for CA — a
/// successful status word is the only confirmation of a matching key
/// agreement.
fn general_authenticate(
    transport: &mut impl ApduTransport,
    ephemeral_pk: &[u8],
) -> Result<crate::iso7816::Response, EacError> {
    let mut writer = TlvWriter::new();
    let scope = writer.begin(TAG_DYNAMIC_AUTH_DATA);
    writer.write_tlv(TAG_EPHEMERAL_PK_PCD, ephemeral_pk);
    writer.end(scope);

    transport
        .transceive(&Command::general_authenticate(writer.into_bytes(), 256))
        .map_err(|_| EacError::Transport("GENERAL AUTHENTICATE"))
}

fn encode_point<U, V>(point: EllipticCurvePoint<'_, U, V>, coord_len: usize) -> Result<Vec<u8>, EacError>
where
    U: UintMont + ConditionallySelectable,
    V: UintMont + UintExp,
{
    let x = point.x().ok_or(EacError::InvalidPublicKey)?;
    let y = point.y().ok_or(EacError::InvalidPublicKey)?;
    let mut out = Vec::with_capacity(1 + 2 * coord_len);
    out.push(UNCOMPRESSED_POINT_TAG);
    out.extend(pad_left(&x.to_uint().to_be_bytes(), coord_len));
    out.extend(pad_left(&y.to_uint().to_be_bytes(), coord_len));
    Ok(out)
}

pub(crate) fn decode_point<'a, U, V>(
    curve: &'a EllipticCurve<U, V>,
    bytes: &[u8],
    coord_len: usize,
) -> Result<EllipticCurvePoint<'a, U, V>, EacError>
where
    U: UintMont + ConditionallySelectable,
    V: UintMont + UintExp,
{
    if bytes.len() != 1 + 2 * coord_len || bytes[0] != UNCOMPRESSED_POINT_TAG {
        return Err(EacError::InvalidPublicKey);
    }
    let base_field = curve.base_field();
    let x = decode_scalar(base_field.modulus(), &bytes[1..1 + coord_len])?;
    let y = decode_scalar(base_field.modulus(), &bytes[1 + coord_len..])?;
    curve
        .from_affine(base_field.from(x), base_field.from(y))
        .map_err(|_| EacError::InvalidPublicKey)
}

fn decode_scalar<T: UintMont>(modulus: T, bytes: &[u8]) -> Result<T, EacError> {
    let value = T::from_be_bytes(bytes);
    if value >= modulus {
        return Err(EacError::InvalidPublicKey);
    }
    Ok(value)
}

fn pad_left(bytes: &[u8], width: usize) -> Vec<u8> {
    assert!(bytes.len() <= width, "value does not fit in the field width");
    let mut out = vec![0u8; width];
    out[width - bytes.len()..].copy_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            asn1::{
                emrtd::security_info::ChipAuthenticationProtocol,
                AnyAlgorithmIdentifier,
            },
            iso7816::Response,
        },
        der::{asn1::ObjectIdentifier as DerOid, Any, Decode, Encode},
        rand::rngs::OsRng,
        std::collections::VecDeque,
    };

    struct ScriptedChip {
        replies: VecDeque<Response>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("scripted chip ran out of replies")]
    struct MockError;

    impl ApduTransport for ScriptedChip {
        type Error = MockError;

        fn transceive(&mut self, _command: &Command) -> Result<Response, Self::Error> {
            self.replies.pop_front().ok_or(MockError)
        }
    }

    fn named_curve_public_key_info(curve_oid: &str, point: &[u8]) -> SubjectPublicKeyInfo {
        let ec_params = ECAlgoParameters::NamedCurve(DerOid::new_unwrap(curve_oid));
        let parameters = Any::from_der(&ec_params.to_der().unwrap()).unwrap();
        SubjectPublicKeyInfo::Unknown(crate::asn1::public_key_info::AnySubjectPublicKeyInfo {
            algorithm: AnyAlgorithmIdentifier {
                algorithm: DerOid::new_unwrap("1.2.840.10045.2.1"),
                parameters: Some(parameters),
            },
            subject_public_key: der::asn1::BitString::new(0, point.to_vec()).unwrap(),
        })
    }

    #[test]
    fn test_resolve_named_curve_recognizes_brainpool_p256r1() {
        let point = vec![0u8; 65];
        let info = named_curve_public_key_info(ID_BRAINPOOL_P256R1, &point);
        assert_eq!(resolve_named_curve(&info).unwrap(), NamedCurve::BrainpoolP256r1);
    }

    #[test]
    fn test_resolve_named_curve_rejects_unknown_oid() {
        let point = vec![0u8; 65];
        let info = named_curve_public_key_info("1.2.3.4.5", &point);
        assert!(matches!(
            resolve_named_curve(&info),
            Err(EacError::UnsupportedDomainParameters)
        ));
    }

    #[test]
    fn test_dh_key_agreement_is_rejected() {
        let curve = named::secp256r1();
        let generator_bytes = encode_point(curve.generator(), 32).unwrap();
        let info = named_curve_public_key_info(ID_NIST_P256, &generator_bytes);
        let ca = ChipAuthenticationInfo {
            protocol: ChipAuthenticationProtocol::from_oid_str("0.4.0.127.0.7.2.2.3.1").unwrap(),
            version:  1,
            key_id:   None,
        };
        let pk = ChipAuthenticationPublicKeyInfo {
            key_agreement: KeyAgreement::Dh,
            public_key:    info,
            key_id:        None,
        };
        let mut chip = ScriptedChip {
            replies: VecDeque::new(),
        };
        let security_infos = SecurityInfos(vec![
            SecurityInfo::ChipAuthentication(ca),
            SecurityInfo::ChipAuthenticationPublicKey(pk),
        ]);
        let err = run(&mut chip, &security_infos, &mut OsRng).unwrap_err();
        assert!(matches!(err, EacError::UnsupportedKeyAgreement));
    }

    /// A chip stand-in holding a real secp256r1 static key pair: accepts
    /// MSE:Set AT unconditionally, then on GENERAL AUTHENTICATE decodes the
    /// PCD's ephemeral public key and completes its own side of the ECDH
    /// agreement. `run` has no way to inspect the resulting keys directly
    /// (`Wrapper` carries no getters, by design — spec §3), so this checks
    /// that the exchange completes and installs an AES-128 wrapper with a
    /// fresh SSC, the same shape `ec::tests::test_ecdh_gm_*_live_end_to_end`
    /// checks for PACE.
    struct LiveChip {
        curve:   EllipticCurve<ruint::aliases::U256, ruint::aliases::U256>,
        chip_sk: ruint::aliases::U256,
    }

    impl ApduTransport for LiveChip {
        type Error = MockError;

        fn transceive(&mut self, command: &Command) -> Result<Response, Self::Error> {
            if command.ins == 0x22 {
                return Ok(Response::new(vec![], 0x90, 0x00));
            }
            let mut reader = TlvReader::new(&command.data);
            let outer = reader.expect_tlv(TAG_DYNAMIC_AUTH_DATA).map_err(|_| MockError)?;
            let mut inner = TlvReader::sub_reader(&outer);
            let tlv = inner.expect_tlv(TAG_EPHEMERAL_PK_PCD).map_err(|_| MockError)?;
            let ephemeral_pk = decode_point(&self.curve, tlv.value, 32).map_err(|_| MockError)?;
            let scalar_field = self.curve.scalar_field();
            let shared = ephemeral_pk * scalar_field.from(self.chip_sk);
            shared.x().ok_or(MockError)?;
            Ok(Response::new(vec![], 0x90, 0x00))
        }
    }

    #[test]
    fn test_ecdh_ca_live_end_to_end() {
        let curve = named::secp256r1();
        let scalar_field = curve.scalar_field();
        let mut rng = OsRng;

        let chip_sk = scalar_field.random(&mut rng);
        let chip_pk = curve.generator() * chip_sk;
        let chip_pk_bytes = encode_point(chip_pk, 32).unwrap();

        let info = named_curve_public_key_info(ID_NIST_P256, &chip_pk_bytes);
        let ca = ChipAuthenticationInfo {
            protocol: ChipAuthenticationProtocol::from_oid_str("0.4.0.127.0.7.2.2.3.7").unwrap(),
            version:  1,
            key_id:   None,
        };
        let pk = ChipAuthenticationPublicKeyInfo {
            key_agreement: KeyAgreement::Ecdh,
            public_key:    info,
            key_id:        None,
        };
        let security_infos = SecurityInfos(vec![
            SecurityInfo::ChipAuthentication(ca),
            SecurityInfo::ChipAuthenticationPublicKey(pk),
        ]);

        let mut chip = LiveChip {
            curve: named::secp256r1(),
            chip_sk: chip_sk.to_uint(),
        };
        let outcome = run(&mut chip, &security_infos, &mut rng).unwrap();
        assert_eq!(outcome.wrapper.cipher_kind(), CipherKind::Aes128);
        assert_eq!(outcome.wrapper.ssc(), &[0u8; 16]);
        assert_eq!(outcome.ephemeral_public_key.len(), 65);
    }
}
