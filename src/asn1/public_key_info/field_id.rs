//! `FieldID` (SEC1/X9.62, referenced by ICAO 9303-11's `ECParameters`):
//! names the finite field an explicit elliptic curve is defined over. Every
//! eMRTD curve in practice is a prime field; the characteristic-two case is
//! kept as an opaque fallback for completeness.

use der::{
    asn1::{Any, Int, ObjectIdentifier as Oid},
    Decode, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Result, Tag,
    ValueOrd, Writer,
};

const ID_PRIME_FIELD: Oid = Oid::new_unwrap("1.2.840.10045.1.1");

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum FieldId {
    /// `Prime-p`: `parameters` is the field's prime modulus.
    Prime(Int),
    /// Opaque fallback for the characteristic-two case.
    Unknown(Oid, Any),
}

impl FixedTag for FieldId {
    const TAG: Tag = Tag::Sequence;
}

impl ValueOrd for FieldId {
    fn value_cmp(&self, other: &Self) -> Result<std::cmp::Ordering> {
        let lhs = self.to_der()?;
        let rhs = other.to_der()?;
        Ok(lhs.as_slice().cmp(rhs.as_slice()))
    }
}

impl EncodeValue for FieldId {
    fn value_len(&self) -> Result<Length> {
        match self {
            Self::Prime(p) => ID_PRIME_FIELD.encoded_len()? + p.encoded_len()?,
            Self::Unknown(oid, any) => oid.encoded_len()? + any.encoded_len()?,
        }
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        match self {
            Self::Prime(p) => {
                ID_PRIME_FIELD.encode(writer)?;
                p.encode(writer)
            }
            Self::Unknown(oid, any) => {
                oid.encode(writer)?;
                any.encode(writer)
            }
        }
    }
}

impl<'a> DecodeValue<'a> for FieldId {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> Result<Self> {
        let oid = Oid::decode(reader)?;
        Ok(match oid {
            ID_PRIME_FIELD => Self::Prime(Int::decode(reader)?),
            _ => Self::Unknown(oid, Any::decode(reader)?),
        })
    }
}

impl<'a> der::Sequence<'a> for FieldId {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_prime_field() {
        let field = FieldId::Prime(Int::new(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap());
        let bytes = field.to_der().unwrap();
        let decoded = FieldId::from_der(&bytes).unwrap();
        assert_eq!(decoded, field);
    }
}
