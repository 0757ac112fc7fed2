//! PACE Generic Mapping over elliptic curves (ICAO 9303-11 §4.6 phases 2-5,
//! EC branch), plus Chip Authentication Mapping's extra chip-static-key
//! capture. Dispatched from [`super::run`] once the chip's nonce has been
//! decrypted and the domain parameters resolved to a concrete
//! [`EllipticCurve`].

use {
    super::{
        general_authenticate, pad_left, token_input, PaceError, PaceOutcome, TAG_AUTH_TOKEN_PCD,
        TAG_AUTH_TOKEN_PICC, TAG_CHIP_AUTH_DATA_PICC, TAG_DYNAMIC_AUTH_DATA, TAG_EPHEMERAL_PK_PCD,
        TAG_EPHEMERAL_PK_PICC, TAG_MAPPING_DATA_PCD, TAG_MAPPING_DATA_PICC,
    },
    crate::{
        asn1::emrtd::security_info::{PaceMapping, ID_PK_ECDH},
        crypto::{
            cipher::{self, CipherKind},
            groups::{EllipticCurve, EllipticCurvePoint},
            kdf, mac,
            mod_ring::{RingRefExt, UintExp, UintMont},
        },
        iso7816::{ApduTransport, Command},
        secure_messaging::Wrapper,
        tlv::{TlvReader, TlvWriter},
    },
    rand::{CryptoRng, RngCore},
    subtle::ConditionallySelectable,
};

const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

pub(super) fn run<U, V>(
    curve: EllipticCurve<U, V>,
    cipher_kind: CipherKind,
    mapping: PaceMapping,
    nonce: &[u8],
    transport: &mut impl ApduTransport,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<PaceOutcome, PaceError>
where
    U: UintMont + ConditionallySelectable,
    V: UintMont + UintExp,
{
    if !matches!(mapping, PaceMapping::Generic | PaceMapping::Chip) {
        return Err(PaceError::UnsupportedMapping("EC Integrated Mapping"));
    }

    let base_field = curve.base_field();
    let scalar_field = curve.scalar_field();
    let coord_len = (base_field.modulus().bit_len() + 7) / 8;
    let scalar_len = (scalar_field.modulus().bit_len() + 7) / 8;

    // Phase 2: map the nonce into a fresh ephemeral generator.
    let map_sk_pcd = scalar_field.random(rng);
    let map_pk_pcd = curve.generator() * map_sk_pcd;
    let map_pk_pcd_bytes = encode_point(map_pk_pcd, coord_len)?;

    let map_pk_picc_bytes = general_authenticate(
        transport,
        &[(TAG_MAPPING_DATA_PCD, &map_pk_pcd_bytes)],
        TAG_MAPPING_DATA_PICC,
    )?;
    let map_pk_picc = decode_point(&curve, &map_pk_picc_bytes, coord_len)?;

    let h = map_pk_picc * map_sk_pcd;
    let nonce_scalar = decode_scalar(scalar_field.modulus(), &pad_left(nonce, scalar_len))?;
    let nonce_scalar = scalar_field.from(nonce_scalar);
    let mapped_generator = curve.generator() * nonce_scalar + h;

    // Phase 3: ephemeral key agreement over the mapped generator.
    let sk_pcd = scalar_field.random(rng);
    let pk_pcd = mapped_generator * sk_pcd;
    let pk_pcd_bytes = encode_point(pk_pcd, coord_len)?;

    let pk_picc_bytes = general_authenticate(
        transport,
        &[(TAG_EPHEMERAL_PK_PCD, &pk_pcd_bytes)],
        TAG_EPHEMERAL_PK_PICC,
    )?;
    let pk_picc = decode_point(&curve, &pk_picc_bytes, coord_len)?;

    let shared_point = pk_picc * sk_pcd;
    let shared_x = shared_point.x().ok_or(PaceError::InvalidPublicKey)?;
    let seed = pad_left(&shared_x.to_uint().to_be_bytes(), coord_len);

    let k_enc = kdf::derive(&seed, kdf::COUNTER_ENC, cipher_kind)?;
    let k_mac = kdf::derive(&seed, kdf::COUNTER_MAC, cipher_kind)?;

    // Phase 4: mutual authentication tokens, each over the peer's ephemeral
    // public key.
    let pcd_token_input = token_input(ID_PK_ECDH, &pk_picc_bytes, cipher_kind);
    let pcd_token = mac::mac(cipher_kind, &k_mac, &pcd_token_input)?;

    let (picc_token, chip_static_public_key) = if mapping == PaceMapping::Chip {
        mutual_auth_cam(transport, &pcd_token, cipher_kind, &k_enc)?
    } else {
        let picc_token = general_authenticate(
            transport,
            &[(TAG_AUTH_TOKEN_PCD, &pcd_token)],
            TAG_AUTH_TOKEN_PICC,
        )?;
        (picc_token, None)
    };

    let picc_token_input = token_input(ID_PK_ECDH, &pk_pcd_bytes, cipher_kind);
    mac::verify(cipher_kind, &k_mac, &picc_token_input, &picc_token)
        .map_err(|_| PaceError::TokenMismatch)?;

    // Phase 5: install the fresh secure messaging wrapper, SSC reset to zero.
    let wrapper = Wrapper::new(cipher_kind, k_enc, k_mac);
    Ok(PaceOutcome {
        wrapper,
        chip_static_public_key,
    })
}

/// CAM's final GENERAL AUTHENTICATE exchange: identical to GM's except the
/// PICC's response may carry the chip's encrypted static public key
/// alongside its authentication token.
fn mutual_auth_cam(
    transport: &mut impl ApduTransport,
    pcd_token: &[u8],
    cipher_kind: CipherKind,
    k_enc: &[u8],
) -> Result<(Vec<u8>, Option<Vec<u8>>), PaceError> {
    let mut writer = TlvWriter::new();
    let scope = writer.begin(TAG_DYNAMIC_AUTH_DATA);
    writer.write_tlv(TAG_AUTH_TOKEN_PCD, pcd_token);
    writer.end(scope);

    let response = transport
        .transceive(&Command::general_authenticate(writer.into_bytes(), 256))
        .map_err(|_| PaceError::Transport("GENERAL AUTHENTICATE"))?;

    let mut reader = TlvReader::new(&response.data);
    let outer = reader.expect_tlv(TAG_DYNAMIC_AUTH_DATA)?;
    let mut inner = TlvReader::sub_reader(&outer);

    let mut picc_token = None;
    let mut chip_auth_data = None;
    while let Some(tlv) = inner.read_tlv()? {
        if tlv.tag == TAG_AUTH_TOKEN_PICC {
            picc_token = Some(tlv.value.to_vec());
        } else if tlv.tag == TAG_CHIP_AUTH_DATA_PICC {
            chip_auth_data = Some(tlv.value.to_vec());
        }
    }
    let picc_token = picc_token.ok_or(PaceError::MalformedResponse)?;

    let chip_static_public_key = chip_auth_data
        .map(|encrypted| {
            let iv = vec![0u8; cipher_kind.block_len()];
            cipher::decrypt_cbc(cipher_kind, k_enc, &iv, &encrypted)
        })
        .transpose()?;
    Ok((picc_token, chip_static_public_key))
}

/// Encode a finite (non-infinity) point in ICAO 9303-11's uncompressed form
/// `04 ‖ X ‖ Y`, each coordinate left-padded to the field width.
fn encode_point<U, V>(
    point: EllipticCurvePoint<'_, U, V>,
    coord_len: usize,
) -> Result<Vec<u8>, PaceError>
where
    U: UintMont + ConditionallySelectable,
    V: UintMont + UintExp,
{
    let x = point.x().ok_or(PaceError::InvalidPublicKey)?;
    let y = point.y().ok_or(PaceError::InvalidPublicKey)?;
    let mut out = Vec::with_capacity(1 + 2 * coord_len);
    out.push(UNCOMPRESSED_POINT_TAG);
    out.extend(pad_left(&x.to_uint().to_be_bytes(), coord_len));
    out.extend(pad_left(&y.to_uint().to_be_bytes(), coord_len));
    Ok(out)
}

/// Decode an uncompressed point, rejecting anything not on the curve or
/// outside the prime-order subgroup (`EllipticCurve::from_affine` checks
/// both).
fn decode_point<'a, U, V>(
    curve: &'a EllipticCurve<U, V>,
    bytes: &[u8],
    coord_len: usize,
) -> Result<EllipticCurvePoint<'a, U, V>, PaceError>
where
    U: UintMont + ConditionallySelectable,
    V: UintMont + UintExp,
{
    if bytes.len() != 1 + 2 * coord_len || bytes[0] != UNCOMPRESSED_POINT_TAG {
        return Err(PaceError::InvalidPublicKey);
    }
    let base_field = curve.base_field();
    let x = decode_scalar(base_field.modulus(), &bytes[1..1 + coord_len])?;
    let y = decode_scalar(base_field.modulus(), &bytes[1 + coord_len..])?;
    curve
        .from_affine(base_field.from(x), base_field.from(y))
        .map_err(|_| PaceError::InvalidPublicKey)
}

/// Decode a fixed-width big-endian value, rejecting anything not strictly
/// less than the modulus (`ModRing::from` would otherwise panic on
/// out-of-range input from an untrusted chip).
fn decode_scalar<T: UintMont>(modulus: T, bytes: &[u8]) -> Result<T, PaceError> {
    let value = T::from_be_bytes(bytes);
    if value >= modulus {
        return Err(PaceError::InvalidPublicKey);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            credentials::Credential,
            crypto::{groups::named, kdf::COUNTER_PACE},
            iso7816::Response,
            pace::tests::{wrap_7c, MockError, ScriptedChip},
        },
        hex_literal::hex,
        rand::rngs::OsRng,
        std::collections::VecDeque,
    };

    /// A chip stand-in that performs real EC-GM arithmetic, mirroring
    /// `dh::tests::LiveChip`: there is no substitute for a live counterpart
    /// since both sides must independently agree on a mapped generator.
    struct LiveChip<U: UintMont + ConditionallySelectable, V: UintMont + UintExp> {
        curve:       EllipticCurve<U, V>,
        cipher_kind: CipherKind,
        nonce:       [u8; 16],
        coord_len:   usize,
        scalar_len:  usize,
        map_sk:      V,
        sk:          V,
        h:           Option<(U, U)>,
        pk_pcd_bytes: Vec<u8>,
        k_mac:        Vec<u8>,
    }

    impl<U: UintMont + ConditionallySelectable, V: UintMont + UintExp> LiveChip<U, V> {
        fn new(curve: EllipticCurve<U, V>, cipher_kind: CipherKind, nonce: [u8; 16]) -> Self {
            let mut rng = OsRng;
            let coord_len = (curve.base_field().modulus().bit_len() + 7) / 8;
            let scalar_len = (curve.scalar_field().modulus().bit_len() + 7) / 8;
            let map_sk = curve.scalar_field().random(&mut rng).to_uint();
            let sk = curve.scalar_field().random(&mut rng).to_uint();
            Self {
                curve,
                cipher_kind,
                nonce,
                coord_len,
                scalar_len,
                map_sk,
                sk,
                h: None,
                pk_pcd_bytes: Vec::new(),
                k_mac: Vec::new(),
            }
        }
    }

    impl<U: UintMont + ConditionallySelectable, V: UintMont + UintExp> ApduTransport
        for LiveChip<U, V>
    {
        type Error = MockError;

        fn transceive(&mut self, command: &Command) -> Result<Response, Self::Error> {
            let mut reader = TlvReader::new(&command.data);
            let outer = reader.expect_tlv(TAG_DYNAMIC_AUTH_DATA).map_err(|_| MockError)?;
            let mut inner = TlvReader::sub_reader(&outer);
            let tlv = inner.read_tlv().map_err(|_| MockError)?.ok_or(MockError)?;

            let base_field = self.curve.base_field();
            let scalar_field = self.curve.scalar_field();

            if tlv.tag == TAG_MAPPING_DATA_PCD {
                let map_pk_pcd =
                    decode_point(&self.curve, tlv.value, self.coord_len).map_err(|_| MockError)?;
                let map_sk_picc = scalar_field.from(self.map_sk);
                let h = map_pk_pcd * map_sk_picc;
                self.h = Some((
                    h.x().ok_or(MockError)?.to_uint(),
                    h.y().ok_or(MockError)?.to_uint(),
                ));

                let map_pk_picc = self.curve.generator() * map_sk_picc;
                let map_pk_picc_bytes =
                    encode_point(map_pk_picc, self.coord_len).map_err(|_| MockError)?;
                return Ok(Response::new(
                    wrap_7c(TAG_MAPPING_DATA_PICC, &map_pk_picc_bytes),
                    0x90,
                    0x00,
                ));
            }

            if tlv.tag == TAG_EPHEMERAL_PK_PCD {
                self.pk_pcd_bytes = tlv.value.to_vec();
                let pk_pcd =
                    decode_point(&self.curve, tlv.value, self.coord_len).map_err(|_| MockError)?;

                let (hx, hy) = self.h.ok_or(MockError)?;
                let h = self
                    .curve
                    .from_affine(base_field.from(hx), base_field.from(hy))
                    .map_err(|_| MockError)?;
                let mut nonce_padded = vec![0u8; self.scalar_len];
                nonce_padded[self.scalar_len - self.nonce.len()..].copy_from_slice(&self.nonce);
                let nonce_scalar = decode_scalar(scalar_field.modulus(), &nonce_padded)
                    .map_err(|_| MockError)?;
                let nonce_scalar = scalar_field.from(nonce_scalar);
                let mapped_generator = self.curve.generator() * nonce_scalar + h;

                let pk_picc = mapped_generator * scalar_field.from(self.sk);
                let pk_picc_bytes = encode_point(pk_picc, self.coord_len).map_err(|_| MockError)?;

                let shared_point = pk_pcd * scalar_field.from(self.sk);
                let shared_x = shared_point.x().ok_or(MockError)?;
                let seed = pad_left(&shared_x.to_uint().to_be_bytes(), self.coord_len);
                self.k_mac = kdf::derive(&seed, kdf::COUNTER_MAC, self.cipher_kind)
                    .map_err(|_| MockError)?;

                return Ok(Response::new(
                    wrap_7c(TAG_EPHEMERAL_PK_PICC, &pk_picc_bytes),
                    0x90,
                    0x00,
                ));
            }

            if tlv.tag == TAG_AUTH_TOKEN_PCD {
                let token_input = token_input(ID_PK_ECDH, &self.pk_pcd_bytes, self.cipher_kind);
                let picc_token = mac::mac(self.cipher_kind, &self.k_mac, &token_input)
                    .map_err(|_| MockError)?;
                return Ok(Response::new(wrap_7c(TAG_AUTH_TOKEN_PICC, &picc_token), 0x90, 0x00));
            }

            Err(MockError)
        }
    }

    #[test]
    fn test_ecdh_gm_brainpool_p256r1_live_end_to_end() {
        let curve = named::brainpool_p256r1();
        let nonce = [0xA5u8; 16];
        let mut chip = LiveChip::new(named::brainpool_p256r1(), CipherKind::Aes128, nonce);

        let outcome = run(
            curve,
            CipherKind::Aes128,
            PaceMapping::Generic,
            &nonce,
            &mut chip,
            &mut OsRng,
        )
        .unwrap();
        assert_eq!(outcome.wrapper.cipher_kind(), CipherKind::Aes128);
        assert!(outcome.chip_static_public_key.is_none());
    }

    // Spec test S1's own key seed, verified independently against PACE's KDF
    // step (the full worked handshake is exercised via the live chip above,
    // since S1's wire trace only covers the nonce step once decrypted).
    #[test]
    fn test_s1_pace_password_key_matches_kdf() {
        let credential = Credential::mrz("T22000129", "640812", "101031");
        let k_pi = kdf::derive(&credential.pace_password_seed(), COUNTER_PACE, CipherKind::Aes128)
            .unwrap();
        assert_eq!(k_pi, hex!("89DED1B26624EC1E634C1989302849DD"));
    }

    #[test]
    fn test_rejects_integrated_mapping() {
        let curve = named::brainpool_p256r1();
        let mut chip = ScriptedChip {
            replies: VecDeque::new(),
        };
        let err = run(
            curve,
            CipherKind::Aes128,
            PaceMapping::Integrated,
            &[0u8; 16],
            &mut chip,
            &mut OsRng,
        )
        .unwrap_err();
        assert!(matches!(err, PaceError::UnsupportedMapping(_)));
    }

    #[test]
    fn test_decode_point_rejects_wrong_tag() {
        let curve = named::brainpool_p256r1();
        let coord_len = (curve.base_field().modulus().bit_len() + 7) / 8;
        let mut bytes = vec![0x02u8; 1 + 2 * coord_len];
        bytes[0] = 0x02; // compressed point tag, unsupported here
        let err = decode_point(&curve, &bytes, coord_len).unwrap_err();
        assert!(matches!(err, PaceError::InvalidPublicKey));
    }

    #[test]
    fn test_decode_point_rejects_off_curve() {
        let curve = named::brainpool_p256r1();
        let coord_len = (curve.base_field().modulus().bit_len() + 7) / 8;
        let mut bytes = vec![0u8; 1 + 2 * coord_len];
        bytes[0] = UNCOMPRESSED_POINT_TAG;
        bytes[coord_len] = 0x01; // x = 1, essentially never on the curve
        bytes[1 + coord_len] = 0x01; // y = 1
        let err = decode_point(&curve, &bytes, coord_len).unwrap_err();
        assert!(matches!(err, PaceError::InvalidPublicKey));
    }
}
