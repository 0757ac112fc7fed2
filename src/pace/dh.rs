//! PACE Generic Mapping over Diffie-Hellman mod-p groups (ICAO 9303-11 §4.6
//! phases 2-5, DH branch). Dispatched from [`super::run`] once the chip's
//! nonce has been decrypted and the domain parameters resolved to a concrete
//! [`ModPGroup`].

use {
    super::{
        general_authenticate, pad_left, token_input, PaceError, TAG_AUTH_TOKEN_PCD,
        TAG_AUTH_TOKEN_PICC, TAG_DYNAMIC_AUTH_DATA, TAG_EPHEMERAL_PK_PCD, TAG_EPHEMERAL_PK_PICC,
        TAG_MAPPING_DATA_PCD, TAG_MAPPING_DATA_PICC,
    },
    crate::{
        asn1::emrtd::security_info::{PaceMapping, ID_PK_DH},
        crypto::{
            cipher::CipherKind,
            groups::ModPGroup,
            kdf, mac,
            mod_ring::{RingRefExt, UintExp, UintMont},
        },
        iso7816::ApduTransport,
        secure_messaging::Wrapper,
    },
    rand::{CryptoRng, RngCore},
    ruint::aliases::U128,
    subtle::ConditionallySelectable,
};

pub(super) fn run<U, V>(
    group: ModPGroup<U, V>,
    cipher_kind: CipherKind,
    mapping: PaceMapping,
    nonce: &[u8],
    transport: &mut impl ApduTransport,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<Wrapper, PaceError>
where
    U: UintMont + ConditionallySelectable,
    V: UintMont + UintExp,
{
    if mapping != PaceMapping::Generic {
        return Err(PaceError::UnsupportedMapping("DH Integrated Mapping"));
    }

    let base_field = group.base_field();
    let scalar_field = group.scalar_field();
    let element_len = (base_field.modulus().bit_len() + 7) / 8;

    // Phase 2: map the nonce into a fresh ephemeral generator.
    let map_sk_pcd = scalar_field.random(rng);
    let map_pk_pcd = group.generator() * map_sk_pcd;
    let map_pk_pcd_bytes = pad_left(&map_pk_pcd.to_uint().to_be_bytes(), element_len);

    let map_pk_picc_bytes = general_authenticate(
        transport,
        &[(TAG_MAPPING_DATA_PCD, &map_pk_pcd_bytes)],
        TAG_MAPPING_DATA_PICC,
    )?;
    let map_pk_picc = decode_element(base_field.modulus(), &map_pk_picc_bytes, element_len)?;
    let map_pk_picc = base_field.from(map_pk_picc);

    let shared_map_secret = map_pk_picc.pow_ct(map_sk_pcd.to_uint());
    let mut nonce_padded = [0u8; 16];
    nonce_padded[16 - nonce.len()..].copy_from_slice(nonce);
    let nonce_uint = U128::from_be_bytes(&nonce_padded);
    let mapped_generator = group.generator().pow_ct(nonce_uint) * shared_map_secret;

    // Phase 3: ephemeral key agreement over the mapped generator.
    let sk_pcd = scalar_field.random(rng);
    let pk_pcd = mapped_generator.pow_ct(sk_pcd.to_uint());
    let pk_pcd_bytes = pad_left(&pk_pcd.to_uint().to_be_bytes(), element_len);

    let pk_picc_bytes = general_authenticate(
        transport,
        &[(TAG_EPHEMERAL_PK_PCD, &pk_pcd_bytes)],
        TAG_EPHEMERAL_PK_PICC,
    )?;
    let pk_picc = decode_element(base_field.modulus(), &pk_picc_bytes, element_len)?;
    let pk_picc = base_field.from(pk_picc);

    let shared_secret = pk_picc.pow_ct(sk_pcd.to_uint());
    let seed = pad_left(&shared_secret.to_uint().to_be_bytes(), element_len);

    let k_enc = kdf::derive(&seed, kdf::COUNTER_ENC, cipher_kind)?;
    let k_mac = kdf::derive(&seed, kdf::COUNTER_MAC, cipher_kind)?;

    // Phase 4: mutual authentication tokens, each over the peer's ephemeral
    // public key.
    let pcd_token_input = token_input(ID_PK_DH, &pk_picc_bytes, cipher_kind);
    let pcd_token = mac::mac(cipher_kind, &k_mac, &pcd_token_input)?;

    let picc_token = general_authenticate(
        transport,
        &[(TAG_AUTH_TOKEN_PCD, &pcd_token)],
        TAG_AUTH_TOKEN_PICC,
    )?;
    let picc_token_input = token_input(ID_PK_DH, &pk_pcd_bytes, cipher_kind);
    mac::verify(cipher_kind, &k_mac, &picc_token_input, &picc_token)
        .map_err(|_| PaceError::TokenMismatch)?;

    // Phase 5: install the fresh secure messaging wrapper, SSC reset to zero.
    Ok(Wrapper::new(cipher_kind, k_enc, k_mac))
}

/// Decode a fixed-width big-endian field element, rejecting anything not
/// strictly less than the modulus (`ModRing::from` would otherwise panic on
/// out-of-range input from an untrusted chip).
fn decode_element<U: UintMont>(modulus: U, bytes: &[u8], width: usize) -> Result<U, PaceError> {
    if bytes.len() != width {
        return Err(PaceError::InvalidPublicKey);
    }
    let value = U::from_be_bytes(bytes);
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
            crypto::groups::named,
            iso7816::{Command, Response},
            pace::tests::{wrap_7c, MockError, ScriptedChip},
            tlv::TlvReader,
        },
        rand::rngs::OsRng,
        std::collections::VecDeque,
    };

    /// A chip stand-in that performs real DH-GM arithmetic against whatever
    /// the PCD side sends it, rather than replaying a fixed wire trace —
    /// there is no published worked example for the 1024-bit MODP group in
    /// the project's test vector set, so this is the only way to exercise
    /// [`run`]'s group-1 branch end to end. Success hinges on `run`'s final
    /// `mac::verify` accepting the chip's token, which only happens if both
    /// sides' derived `k_mac` agree — a strong enough check that the
    /// resulting [`Wrapper`] need not expose its keys for comparison.
    struct LiveChip<U: UintMont + ConditionallySelectable, V: UintMont + UintExp> {
        group:       ModPGroup<U, V>,
        cipher_kind: CipherKind,
        nonce:       [u8; 16],
        element_len: usize,
        map_sk:      V,
        sk:          V,
        shared_map_secret: Option<U>,
        pk_pcd_bytes: Vec<u8>,
        k_mac:        Vec<u8>,
    }

    impl<U: UintMont + ConditionallySelectable, V: UintMont + UintExp> LiveChip<U, V> {
        fn new(group: ModPGroup<U, V>, cipher_kind: CipherKind, nonce: [u8; 16]) -> Self {
            let mut rng = OsRng;
            let element_len = (group.base_field().modulus().bit_len() + 7) / 8;
            let map_sk = group.scalar_field().random(&mut rng).to_uint();
            let sk = group.scalar_field().random(&mut rng).to_uint();
            Self {
                group,
                cipher_kind,
                nonce,
                element_len,
                map_sk,
                sk,
                shared_map_secret: None,
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

            let base_field = self.group.base_field();
            let scalar_field = self.group.scalar_field();

            if tlv.tag == TAG_MAPPING_DATA_PCD {
                let map_pk_pcd =
                    decode_element(base_field.modulus(), tlv.value, self.element_len)
                        .map_err(|_| MockError)?;
                let map_pk_pcd = base_field.from(map_pk_pcd);
                let map_sk_picc = scalar_field.from(self.map_sk);
                self.shared_map_secret = Some(map_pk_pcd.pow_ct(self.map_sk).to_uint());

                let map_pk_picc = self.group.generator() * map_sk_picc;
                let map_pk_picc_bytes =
                    pad_left(&map_pk_picc.to_uint().to_be_bytes(), self.element_len);
                return Ok(Response::new(wrap_7c(TAG_MAPPING_DATA_PICC, &map_pk_picc_bytes), 0x90, 0x00));
            }

            if tlv.tag == TAG_EPHEMERAL_PK_PCD {
                self.pk_pcd_bytes = tlv.value.to_vec();
                let pk_pcd = decode_element(base_field.modulus(), tlv.value, self.element_len)
                    .map_err(|_| MockError)?;
                let pk_pcd = base_field.from(pk_pcd);

                let shared_map_secret =
                    base_field.from(self.shared_map_secret.ok_or(MockError)?);
                let mut nonce_padded = [0u8; 16];
                nonce_padded.copy_from_slice(&self.nonce);
                let nonce_uint = U128::from_be_bytes(&nonce_padded);
                let mapped_generator =
                    self.group.generator().pow_ct(nonce_uint) * shared_map_secret;

                let pk_picc = mapped_generator.pow_ct(self.sk);
                let pk_picc_bytes = pad_left(&pk_picc.to_uint().to_be_bytes(), self.element_len);

                let shared_secret = pk_pcd.pow_ct(self.sk);
                let seed = pad_left(&shared_secret.to_uint().to_be_bytes(), self.element_len);
                self.k_mac = kdf::derive(&seed, kdf::COUNTER_MAC, self.cipher_kind)
                    .map_err(|_| MockError)?;

                return Ok(Response::new(wrap_7c(TAG_EPHEMERAL_PK_PICC, &pk_picc_bytes), 0x90, 0x00));
            }

            if tlv.tag == TAG_AUTH_TOKEN_PCD {
                let token_input = token_input(ID_PK_DH, &self.pk_pcd_bytes, self.cipher_kind);
                let picc_token = mac::mac(self.cipher_kind, &self.k_mac, &token_input)
                    .map_err(|_| MockError)?;
                return Ok(Response::new(wrap_7c(TAG_AUTH_TOKEN_PICC, &picc_token), 0x90, 0x00));
            }

            Err(MockError)
        }
    }

    // Spec test S2 uses the RFC 5114 1024-bit MODP group with AES-128-CMAC;
    // no fixed wire trace for it exists in the project's test vector set, so
    // this drives a live two-party exchange instead of replaying bytes.
    #[test]
    fn test_dh_gm_group1_aes128_live_end_to_end() {
        let group = ModPGroup::from(named::GROUP_1);
        let nonce = [0x5Au8; 16];
        let mut chip = LiveChip::new(ModPGroup::from(named::GROUP_1), CipherKind::Aes128, nonce);

        let wrapper = run(
            group,
            CipherKind::Aes128,
            PaceMapping::Generic,
            &nonce,
            &mut chip,
            &mut OsRng,
        )
        .unwrap();
        assert_eq!(wrapper.cipher_kind(), CipherKind::Aes128);
        assert_eq!(wrapper.ssc(), &[0u8; 16][..CipherKind::Aes128.ssc_len()]);
    }

    #[test]
    fn test_rejects_integrated_mapping() {
        let group = ModPGroup::from(named::GROUP_1);
        let mut chip = ScriptedChip {
            replies: VecDeque::new(),
        };
        let err = run(
            group,
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
    fn test_decode_element_rejects_out_of_range() {
        let group = ModPGroup::from(named::GROUP_1);
        let modulus = group.base_field().modulus();
        let width = (modulus.bit_len() + 7) / 8;
        let too_big = modulus.to_be_bytes();
        let too_big = pad_left(&too_big, width);
        let err = decode_element(modulus, &too_big, width).unwrap_err();
        assert!(matches!(err, PaceError::InvalidPublicKey));
    }

    #[test]
    fn test_decode_element_rejects_wrong_length() {
        let group = ModPGroup::from(named::GROUP_1);
        let modulus = group.base_field().modulus();
        let width = (modulus.bit_len() + 7) / 8;
        let err = decode_element(modulus, &[0u8; 3], width).unwrap_err();
        assert!(matches!(err, PaceError::InvalidPublicKey));
    }
}
