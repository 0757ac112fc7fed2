mod field_id;
mod pubkey_algorithm_identifier;

pub use self::{field_id::FieldId, pubkey_algorithm_identifier::PubkeyAlgorithmIdentifier};
use {
    self::pubkey_algorithm_identifier::{ID_DH, ID_EC, ID_RSA},
    crate::asn1::AnyAlgorithmIdentifier,
    der::{
        asn1::{Any, BitString, Int, Null, ObjectIdentifier as Oid, OctetString},
        Choice, Decode, DecodeValue, Encode, EncodeValue, Error, ErrorKind, FixedTag, Header,
        Length, Reader, Result, Sequence, Tag, ValueOrd, Writer,
    },
    std::cmp::Ordering,
};

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum SubjectPublicKeyInfo {
    Rsa(RsaPublicKeyInfo),
    Unknown(AnySubjectPublicKeyInfo),
}

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct AnySubjectPublicKeyInfo {
    pub algorithm:          AnyAlgorithmIdentifier,
    pub subject_public_key: BitString,
}

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct RsaPublicKeyInfo {
    pub modulus:         Int,
    pub public_exponent: Int,
}

/// Diffie-Hellman Mod-P Group Parameters.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct DhAlgoParameters {
    pub prime:                Int,
    pub base:                 Int,
    pub private_value_length: Option<u64>,
}

/// Elliptic Curve Algorithm Parameters.
///
/// **Note**: This deviates from RFC 5480 by allowing for explicit
/// parameters using `EcParameters` in addition to named curves. This
/// is used by at least some Dutch eMRTDs.
///
/// [TR-03111] `Parameters`
/// Details on parameters in [TR-03111]
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Choice, ValueOrd)]
pub enum ECAlgoParameters {
    EcParameters(EcParameters),
    NamedCurve(Oid),
    ImplicitlyCA(Null),
}

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct EcParameters {
    pub version:  u64,
    pub field_id: FieldId,
    pub curve:    Curve,
    pub base:     ECPoint,
    pub order:    Int,
    pub cofactor: Option<Int>,
}

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct Curve {
    pub a:    FieldElement,
    pub b:    FieldElement,
    pub seed: Option<BitString>,
}

pub type FieldElement = OctetString;

pub type ECPoint = OctetString;

impl Sequence<'_> for SubjectPublicKeyInfo {}

impl FixedTag for SubjectPublicKeyInfo {
    const TAG: Tag = Tag::Sequence;
}

impl ValueOrd for SubjectPublicKeyInfo {
    fn value_cmp(&self, other: &Self) -> Result<Ordering> {
        // TODO: Better method.
        let lhs = self.to_der()?;
        let rhs = other.to_der()?;
        Ok(lhs.as_slice().cmp(rhs.as_slice()))
    }
}

impl EncodeValue for SubjectPublicKeyInfo {
    fn value_len(&self) -> Result<Length> {
        match self {
            Self::Rsa(key) => {
                let bits = BitString::new(0, key.to_der()?)?;
                PubkeyAlgorithmIdentifier::Rsa.encoded_len()? + bits.encoded_len()?
            }
            Self::Unknown(info) => info.value_len(),
        }
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        match self {
            Self::Rsa(key) => {
                let bits = BitString::new(0, key.to_der()?)?;
                PubkeyAlgorithmIdentifier::Rsa.encode(writer)?;
                bits.encode(writer)
            }
            Self::Unknown(info) => info.encode_value(writer),
        }
    }
}

impl<'a> DecodeValue<'a> for SubjectPublicKeyInfo {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> Result<Self> {
        let algorithm = PubkeyAlgorithmIdentifier::decode(reader)?;
        let subject_public_key = BitString::decode(reader)?;
        if matches!(algorithm, PubkeyAlgorithmIdentifier::Rsa) {
            let key_bytes = subject_public_key
                .as_bytes()
                .ok_or_else(|| Error::new(ErrorKind::Value { tag: Tag::BitString }, header.length))?;
            return Ok(Self::Rsa(RsaPublicKeyInfo::from_der(key_bytes)?));
        }
        let algorithm_bytes = algorithm.to_der()?;
        Ok(Self::Unknown(AnySubjectPublicKeyInfo {
            algorithm: AnyAlgorithmIdentifier::from_der(&algorithm_bytes)?,
            subject_public_key,
        }))
    }
}

impl EncodeValue for PubkeyAlgorithmIdentifier {
    fn value_len(&self) -> Result<Length> {
        match self {
            Self::Rsa => ID_RSA.encoded_len() + Null.encoded_len()?,
            Self::Ec(params) => ID_EC.encoded_len()? + params.encoded_len()?,
            Self::Dh(params) => ID_DH.encoded_len()? + params.encoded_len()?,
            Self::Unknown(any) => any.value_len(),
        }
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        match self {
            Self::Rsa => {
                ID_RSA.encode(writer)?;
                Null.encode(writer)
            }
            Self::Ec(params) => {
                ID_EC.encode(writer)?;
                params.encode(writer)
            }
            Self::Dh(params) => {
                ID_DH.encode(writer)?;
                params.encode(writer)
            }
            Self::Unknown(any) => any.encode(writer),
        }
    }
}

impl<'a> DecodeValue<'a> for PubkeyAlgorithmIdentifier {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: der::Header) -> Result<Self> {
        let oid = Oid::decode(reader)?;
        Ok(match oid {
            ID_RSA => {
                Null::decode(reader)?;
                Self::Rsa
            }
            ID_EC => Self::Ec(ECAlgoParameters::decode(reader)?),
            ID_DH => Self::Dh(DhAlgoParameters::decode(reader)?),
            _ => Self::Unknown(AnyAlgorithmIdentifier {
                algorithm:  oid,
                parameters: Option::<Any>::decode(reader)?,
            }),
        })
    }
}
