//! `SecurityInfo` (ICAO 9303-11 §9.2): the building block of `EF.CardAccess`
//! and `EF.DG14`. Each entry is `SEQUENCE { protocol OID, requiredData ANY,
//! optionalData ANY OPTIONAL }`; which concrete shape `requiredData`/
//! `optionalData` take is determined entirely by `protocol`, so we parse
//! straight into an enum of the protocols this crate knows about, with a
//! catch-all for the rest.

use {
    super::super::{ordered_set::OrderedSet, public_key_info::SubjectPublicKeyInfo, AnyAlgorithmIdentifier},
    der::{
        asn1::{Any, ObjectIdentifier as Oid},
        Decode, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Result,
        Sequence, Tag, ValueOrd, Writer,
    },
};

pub type SecurityInfos = OrderedSet<SecurityInfo>;

const ID_PACE: &str = "0.4.0.127.0.7.2.2.4";
const ID_CA: &str = "0.4.0.127.0.7.2.2.3";
const ID_TA: &str = "0.4.0.127.0.7.2.2.2";
pub(crate) const ID_PK_DH: &str = "0.4.0.127.0.7.2.2.1.1";
pub(crate) const ID_PK_ECDH: &str = "0.4.0.127.0.7.2.2.1.2";
const ID_ACTIVE_AUTHENTICATION: &str = "2.23.136.1.1.5";

/// The last arc of a dotted OID string, e.g. `"...2.2.4.21"` -> `Some(21)`.
fn last_arc(oid: &str) -> Option<u32> {
    oid.rsplit('.').next()?.parse().ok()
}

/// PACE key agreement/mapping/cipher suite, named by the last arc of an
/// `id-PACE-*` OID (ICAO 9303-11 Table 5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PaceProtocol {
    DhGm3DesCbcCbc,
    DhGmAesCbcCmac128,
    DhGmAesCbcCmac192,
    DhGmAesCbcCmac256,
    EcdhGm3DesCbcCbc,
    EcdhGmAesCbcCmac128,
    EcdhGmAesCbcCmac192,
    EcdhGmAesCbcCmac256,
    DhIm3DesCbcCbc,
    DhImAesCbcCmac128,
    DhImAesCbcCmac192,
    DhImAesCbcCmac256,
    EcdhIm3DesCbcCbc,
    EcdhImAesCbcCmac128,
    EcdhImAesCbcCmac192,
    EcdhImAesCbcCmac256,
    EcdhCamAesCbcCmac128,
    EcdhCamAesCbcCmac192,
    EcdhCamAesCbcCmac256,
}

impl PaceProtocol {
    /// Resolve the PACE cipher suite named by a `PACEInfo`'s protocol OID
    /// (ICAO 9303-11 Table 5). `pub(crate)` so `pace::run` can dispatch on a
    /// `PaceInfo` pulled out of `EF.CardAccess` without re-deriving the OID
    /// arc parsing this module already does.
    pub(crate) fn from_oid_str(oid: &str) -> Option<Self> {
        if !oid.starts_with(ID_PACE) {
            return None;
        }
        Some(match last_arc(oid)? {
            1 => Self::DhGm3DesCbcCbc,
            2 => Self::DhGmAesCbcCmac128,
            3 => Self::DhGmAesCbcCmac192,
            4 => Self::DhGmAesCbcCmac256,
            5 => Self::EcdhGm3DesCbcCbc,
            6 => Self::EcdhGmAesCbcCmac128,
            7 => Self::EcdhGmAesCbcCmac192,
            8 => Self::EcdhGmAesCbcCmac256,
            9 => Self::DhIm3DesCbcCbc,
            10 => Self::DhImAesCbcCmac128,
            11 => Self::DhImAesCbcCmac192,
            12 => Self::DhImAesCbcCmac256,
            13 => Self::EcdhIm3DesCbcCbc,
            14 => Self::EcdhImAesCbcCmac128,
            15 => Self::EcdhImAesCbcCmac192,
            16 => Self::EcdhImAesCbcCmac256,
            19 => Self::EcdhCamAesCbcCmac128,
            20 => Self::EcdhCamAesCbcCmac192,
            21 => Self::EcdhCamAesCbcCmac256,
            _ => return None,
        })
    }

    pub const fn key_agreement(self) -> KeyAgreement {
        match self {
            Self::DhGm3DesCbcCbc
            | Self::DhGmAesCbcCmac128
            | Self::DhGmAesCbcCmac192
            | Self::DhGmAesCbcCmac256
            | Self::DhIm3DesCbcCbc
            | Self::DhImAesCbcCmac128
            | Self::DhImAesCbcCmac192
            | Self::DhImAesCbcCmac256 => KeyAgreement::Dh,
            _ => KeyAgreement::Ecdh,
        }
    }

    pub const fn mapping(self) -> PaceMapping {
        match self {
            Self::DhGm3DesCbcCbc
            | Self::DhGmAesCbcCmac128
            | Self::DhGmAesCbcCmac192
            | Self::DhGmAesCbcCmac256
            | Self::EcdhGm3DesCbcCbc
            | Self::EcdhGmAesCbcCmac128
            | Self::EcdhGmAesCbcCmac192
            | Self::EcdhGmAesCbcCmac256 => PaceMapping::Generic,
            Self::DhIm3DesCbcCbc
            | Self::DhImAesCbcCmac128
            | Self::DhImAesCbcCmac192
            | Self::DhImAesCbcCmac256
            | Self::EcdhIm3DesCbcCbc
            | Self::EcdhImAesCbcCmac128
            | Self::EcdhImAesCbcCmac192
            | Self::EcdhImAesCbcCmac256 => PaceMapping::Integrated,
            Self::EcdhCamAesCbcCmac128 | Self::EcdhCamAesCbcCmac192 | Self::EcdhCamAesCbcCmac256 => {
                PaceMapping::Chip
            }
        }
    }

    pub const fn cipher(self) -> SymmetricCipher {
        match self {
            Self::DhGm3DesCbcCbc | Self::EcdhGm3DesCbcCbc | Self::DhIm3DesCbcCbc | Self::EcdhIm3DesCbcCbc => {
                SymmetricCipher::Tdes
            }
            Self::DhGmAesCbcCmac128
            | Self::EcdhGmAesCbcCmac128
            | Self::DhImAesCbcCmac128
            | Self::EcdhImAesCbcCmac128
            | Self::EcdhCamAesCbcCmac128 => SymmetricCipher::Aes128,
            Self::DhGmAesCbcCmac192
            | Self::EcdhGmAesCbcCmac192
            | Self::DhImAesCbcCmac192
            | Self::EcdhImAesCbcCmac192
            | Self::EcdhCamAesCbcCmac192 => SymmetricCipher::Aes192,
            Self::DhGmAesCbcCmac256
            | Self::EcdhGmAesCbcCmac256
            | Self::DhImAesCbcCmac256
            | Self::EcdhImAesCbcCmac256
            | Self::EcdhCamAesCbcCmac256 => SymmetricCipher::Aes256,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PaceMapping {
    Generic,
    Integrated,
    Chip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyAgreement {
    Dh,
    Ecdh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SymmetricCipher {
    Tdes,
    Aes128,
    Aes192,
    Aes256,
}

/// `PACEInfo` (ICAO 9303-11 §9.2.2): advertises one PACE cipher suite and,
/// for standardized domain parameters, which one.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct PaceInfo {
    pub protocol:     Oid,
    pub version:      u64,
    pub parameter_id: Option<u64>,
}

/// `PACEDomainParameterInfo` (ICAO 9303-11 §9.2.3): explicit domain
/// parameters for a PACE key agreement, when a standardized parameter id
/// doesn't apply.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct PaceDomainParameterInfo {
    pub protocol:         Oid,
    pub domain_parameter: AnyAlgorithmIdentifier,
    pub parameter_id:     Option<u64>,
}

/// `ChipAuthenticationInfo` (ICAO 9303-11 §9.2.5).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChipAuthenticationInfo {
    pub protocol: ChipAuthenticationProtocol,
    pub version:  u64,
    pub key_id:   Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChipAuthenticationProtocol {
    pub key_agreement: KeyAgreement,
    pub cipher:        Option<SymmetricCipher>,
}

impl ChipAuthenticationProtocol {
    pub(crate) fn from_oid_str(oid: &str) -> Option<Self> {
        if !oid.starts_with(ID_CA) {
            return None;
        }
        let (key_agreement, cipher) = match last_arc(oid)? {
            1 => (KeyAgreement::Dh, SymmetricCipher::Tdes),
            2 => (KeyAgreement::Dh, SymmetricCipher::Aes128),
            3 => (KeyAgreement::Dh, SymmetricCipher::Aes192),
            4 => (KeyAgreement::Dh, SymmetricCipher::Aes256),
            6 => (KeyAgreement::Ecdh, SymmetricCipher::Tdes),
            7 => (KeyAgreement::Ecdh, SymmetricCipher::Aes128),
            8 => (KeyAgreement::Ecdh, SymmetricCipher::Aes192),
            9 => (KeyAgreement::Ecdh, SymmetricCipher::Aes256),
            _ => return None,
        };
        Some(Self {
            key_agreement,
            cipher: Some(cipher),
        })
    }

    pub(crate) fn to_oid(self) -> Oid {
        let arc = match (self.key_agreement, self.cipher) {
            (KeyAgreement::Dh, Some(SymmetricCipher::Tdes)) => 1,
            (KeyAgreement::Dh, Some(SymmetricCipher::Aes128)) => 2,
            (KeyAgreement::Dh, Some(SymmetricCipher::Aes192)) => 3,
            (KeyAgreement::Dh, Some(SymmetricCipher::Aes256)) => 4,
            (KeyAgreement::Ecdh, Some(SymmetricCipher::Tdes)) => 6,
            (KeyAgreement::Ecdh, Some(SymmetricCipher::Aes128)) => 7,
            (KeyAgreement::Ecdh, Some(SymmetricCipher::Aes192)) => 8,
            (KeyAgreement::Ecdh, Some(SymmetricCipher::Aes256)) => 9,
            (_, None) => 1,
        };
        Oid::new_unwrap(&format!("{ID_CA}.{arc}"))
    }
}

/// `ChipAuthenticationPublicKeyInfo` (ICAO 9303-11 §9.2.6).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChipAuthenticationPublicKeyInfo {
    pub key_agreement: KeyAgreement,
    pub public_key:    SubjectPublicKeyInfo,
    pub key_id:        Option<u64>,
}

/// `TerminalAuthenticationInfo` (ICAO 9303-11 §9.2.4).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct TerminalAuthenticationInfo {
    pub protocol: Oid,
    pub version:  u64,
}

/// `ActiveAuthenticationInfo` (ICAO 9303-11 §9.2.7).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct ActiveAuthenticationInfo {
    pub protocol:            Oid,
    pub signature_algorithm: Oid,
}

/// A `SecurityInfo` whose protocol OID this crate doesn't interpret
/// further. Round-trips exactly.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GenericSecurityInfo {
    pub protocol:      Oid,
    pub required_data: Any,
    pub optional_data: Option<Any>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityInfo {
    Pace(PaceInfo),
    PaceDomainParameter(PaceDomainParameterInfo),
    ChipAuthentication(ChipAuthenticationInfo),
    ChipAuthenticationPublicKey(ChipAuthenticationPublicKeyInfo),
    TerminalAuthentication(TerminalAuthenticationInfo),
    ActiveAuthentication(ActiveAuthenticationInfo),
    Unknown(GenericSecurityInfo),
}

impl FixedTag for SecurityInfo {
    const TAG: Tag = Tag::Sequence;
}

impl<'a> Sequence<'a> for SecurityInfo {}

impl ValueOrd for SecurityInfo {
    fn value_cmp(&self, other: &Self) -> Result<std::cmp::Ordering> {
        let lhs = self.to_der()?;
        let rhs = other.to_der()?;
        Ok(lhs.as_slice().cmp(rhs.as_slice()))
    }
}

impl EncodeValue for SecurityInfo {
    fn value_len(&self) -> Result<Length> {
        match self {
            Self::Pace(info) => info.value_len(),
            Self::PaceDomainParameter(info) => info.value_len(),
            Self::ChipAuthentication(info) => {
                let key_id_len = match info.key_id {
                    Some(id) => id.encoded_len()?,
                    None => Length::ZERO,
                };
                info.protocol.to_oid().encoded_len()? + info.version.encoded_len()? + key_id_len
            }
            Self::ChipAuthenticationPublicKey(info) => {
                let protocol = if matches!(info.key_agreement, KeyAgreement::Dh) {
                    ID_PK_DH
                } else {
                    ID_PK_ECDH
                };
                let key_id_len = match info.key_id {
                    Some(id) => id.encoded_len()?,
                    None => Length::ZERO,
                };
                Oid::new_unwrap(protocol).encoded_len()? + info.public_key.encoded_len()? + key_id_len
            }
            Self::TerminalAuthentication(info) => info.value_len(),
            Self::ActiveAuthentication(info) => info.value_len(),
            Self::Unknown(info) => {
                let optional_len = match &info.optional_data {
                    Some(any) => any.encoded_len()?,
                    None => Length::ZERO,
                };
                info.protocol.encoded_len()? + info.required_data.encoded_len()? + optional_len
            }
        }
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        match self {
            Self::Pace(info) => info.encode_value(writer),
            Self::PaceDomainParameter(info) => info.encode_value(writer),
            Self::ChipAuthentication(info) => {
                info.protocol.to_oid().encode(writer)?;
                info.version.encode(writer)?;
                if let Some(id) = info.key_id {
                    id.encode(writer)?;
                }
                Ok(())
            }
            Self::ChipAuthenticationPublicKey(info) => {
                let protocol = if matches!(info.key_agreement, KeyAgreement::Dh) {
                    ID_PK_DH
                } else {
                    ID_PK_ECDH
                };
                Oid::new_unwrap(protocol).encode(writer)?;
                info.public_key.encode(writer)?;
                if let Some(id) = info.key_id {
                    id.encode(writer)?;
                }
                Ok(())
            }
            Self::TerminalAuthentication(info) => info.encode_value(writer),
            Self::ActiveAuthentication(info) => info.encode_value(writer),
            Self::Unknown(info) => {
                info.protocol.encode(writer)?;
                info.required_data.encode(writer)?;
                if let Some(any) = &info.optional_data {
                    any.encode(writer)?;
                }
                Ok(())
            }
        }
    }
}

impl<'a> DecodeValue<'a> for SecurityInfo {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> Result<Self> {
        let oid = Oid::decode(reader)?;
        let oid_str = oid.to_string();

        if oid_str == ID_PK_DH || oid_str == ID_PK_ECDH {
            let public_key = SubjectPublicKeyInfo::decode(reader)?;
            let key_id = Option::<u64>::decode(reader)?;
            return Ok(Self::ChipAuthenticationPublicKey(ChipAuthenticationPublicKeyInfo {
                key_agreement: if oid_str == ID_PK_DH {
                    KeyAgreement::Dh
                } else {
                    KeyAgreement::Ecdh
                },
                public_key,
                key_id,
            }));
        }
        if oid_str == ID_ACTIVE_AUTHENTICATION {
            let signature_algorithm = Oid::decode(reader)?;
            return Ok(Self::ActiveAuthentication(ActiveAuthenticationInfo {
                protocol: oid,
                signature_algorithm,
            }));
        }
        if oid_str.starts_with(ID_TA) {
            let version = u64::decode(reader)?;
            return Ok(Self::TerminalAuthentication(TerminalAuthenticationInfo {
                protocol: oid,
                version,
            }));
        }
        if let Some(protocol) = ChipAuthenticationProtocol::from_oid_str(&oid_str) {
            let version = u64::decode(reader)?;
            let key_id = Option::<u64>::decode(reader)?;
            return Ok(Self::ChipAuthentication(ChipAuthenticationInfo {
                protocol,
                version,
                key_id,
            }));
        }
        if PaceProtocol::from_oid_str(&oid_str).is_some() {
            // `PACEDomainParameterInfo`'s second field is an
            // `AlgorithmIdentifier` (a SEQUENCE); `PACEInfo`'s is an
            // INTEGER version. Peeking the next tag distinguishes them.
            if reader.peek_header()?.tag == Tag::Integer {
                let version = u64::decode(reader)?;
                let parameter_id = Option::<u64>::decode(reader)?;
                return Ok(Self::Pace(PaceInfo {
                    protocol: oid,
                    version,
                    parameter_id,
                }));
            }
            let domain_parameter = AnyAlgorithmIdentifier::decode(reader)?;
            let parameter_id = Option::<u64>::decode(reader)?;
            return Ok(Self::PaceDomainParameter(PaceDomainParameterInfo {
                protocol: oid,
                domain_parameter,
                parameter_id,
            }));
        }

        let required_data = Any::decode(reader)?;
        let optional_data = if reader.remaining_len() > Length::ZERO {
            Some(Any::decode(reader)?)
        } else {
            None
        };
        Ok(Self::Unknown(GenericSecurityInfo {
            protocol: oid,
            required_data,
            optional_data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pace_protocol_from_oid_ecdh_cam_aes256() {
        let protocol = PaceProtocol::from_oid_str("0.4.0.127.0.7.2.2.4.21").unwrap();
        assert_eq!(protocol, PaceProtocol::EcdhCamAesCbcCmac256);
        assert_eq!(protocol.key_agreement(), KeyAgreement::Ecdh);
        assert_eq!(protocol.mapping(), PaceMapping::Chip);
        assert_eq!(protocol.cipher(), SymmetricCipher::Aes256);
    }

    #[test]
    fn test_pace_protocol_from_oid_dh_gm_3des() {
        let protocol = PaceProtocol::from_oid_str("0.4.0.127.0.7.2.2.4.1").unwrap();
        assert_eq!(protocol, PaceProtocol::DhGm3DesCbcCbc);
        assert_eq!(protocol.key_agreement(), KeyAgreement::Dh);
        assert_eq!(protocol.mapping(), PaceMapping::Generic);
        assert_eq!(protocol.cipher(), SymmetricCipher::Tdes);
    }

    #[test]
    fn test_non_pace_oid_is_not_a_pace_protocol() {
        assert!(PaceProtocol::from_oid_str(ID_CA).is_none());
    }

    #[test]
    fn test_roundtrip_pace_info() {
        let info = SecurityInfo::Pace(PaceInfo {
            protocol:     Oid::new_unwrap("0.4.0.127.0.7.2.2.4.2"),
            version:      2,
            parameter_id: Some(13),
        });
        let bytes = info.to_der().unwrap();
        let decoded = SecurityInfo::from_der(&bytes).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_roundtrip_chip_authentication_info() {
        let info = SecurityInfo::ChipAuthentication(ChipAuthenticationInfo {
            protocol: ChipAuthenticationProtocol {
                key_agreement: KeyAgreement::Ecdh,
                cipher:        Some(SymmetricCipher::Aes128),
            },
            version:  1,
            key_id:   Some(1),
        });
        let bytes = info.to_der().unwrap();
        let decoded = SecurityInfo::from_der(&bytes).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_roundtrip_active_authentication_info() {
        let info = SecurityInfo::ActiveAuthentication(ActiveAuthenticationInfo {
            protocol:            Oid::new_unwrap(ID_ACTIVE_AUTHENTICATION),
            signature_algorithm: Oid::new_unwrap("1.2.840.10045.4.3.2"),
        });
        let bytes = info.to_der().unwrap();
        let decoded = SecurityInfo::from_der(&bytes).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_unknown_protocol_roundtrips_losslessly() {
        let info = SecurityInfo::Unknown(GenericSecurityInfo {
            protocol:      Oid::new_unwrap("1.2.3.4.5"),
            required_data: Any::new(der::Tag::Null, &[]).unwrap(),
            optional_data: None,
        });
        let bytes = info.to_der().unwrap();
        let decoded = SecurityInfo::from_der(&bytes).unwrap();
        assert_eq!(decoded, info);
    }
}
