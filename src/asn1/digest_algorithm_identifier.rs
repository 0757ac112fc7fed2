//! `DigestAlgorithmIdentifier` (RFC 5912): an `AlgorithmIdentifier` whose
//! `parameters` field is a `NULL` for every hash algorithm used in this
//! crate, but in practice gets encoded two different (both legal) ways by
//! real-world producers: as an explicit `NULL`, or omitted entirely. We keep
//! track of which one a card actually used so re-encoding reproduces it.

use der::{
    asn1::{Null, ObjectIdentifier as Oid},
    Decode, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Result, Sequence,
    Tag, ValueOrd, Writer,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Parameters {
    /// `parameters` absent.
    Absent,
    /// `parameters` present as an explicit `NULL`.
    Null,
}

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct DigestAlgorithmIdentifier {
    pub algorithm:  Oid,
    pub parameters: Parameters,
}

impl FixedTag for DigestAlgorithmIdentifier {
    const TAG: Tag = Tag::Sequence;
}

impl ValueOrd for DigestAlgorithmIdentifier {
    fn value_cmp(&self, other: &Self) -> Result<std::cmp::Ordering> {
        let lhs = self.to_der()?;
        let rhs = other.to_der()?;
        Ok(lhs.as_slice().cmp(rhs.as_slice()))
    }
}

impl EncodeValue for DigestAlgorithmIdentifier {
    fn value_len(&self) -> Result<Length> {
        let params_len = match self.parameters {
            Parameters::Absent => Length::ZERO,
            Parameters::Null => Null.encoded_len()?,
        };
        self.algorithm.encoded_len()? + params_len
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        self.algorithm.encode(writer)?;
        if matches!(self.parameters, Parameters::Null) {
            Null.encode(writer)?;
        }
        Ok(())
    }
}

impl<'a> DecodeValue<'a> for DigestAlgorithmIdentifier {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> Result<Self> {
        let algorithm = Oid::decode(reader)?;
        let parameters = if reader.remaining_len() > Length::ZERO {
            Null::decode(reader)?;
            Parameters::Null
        } else {
            Parameters::Absent
        };
        Ok(Self { algorithm, parameters })
    }
}

impl<'a> Sequence<'a> for DigestAlgorithmIdentifier {}
