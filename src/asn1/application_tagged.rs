//! `[APPLICATION n]` explicit tagging, used to wrap EF.DG14 and EF.SOD's top
//! level content (ICAO-9303-10 4.6/4.7: the EF tag itself, e.g. `0x6E` for
//! DG14 or `0x77` for SOD, is an APPLICATION-class constructed tag whose
//! content is the ordinary DER encoding of the wrapped type).

use der::{Decode, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Result, Tag, TagNumber, Writer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationTagged<const TAG: u8, T>(pub T);

impl<const TAG: u8, T> ApplicationTagged<TAG, T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<const TAG: u8, T> FixedTag for ApplicationTagged<TAG, T> {
    const TAG: Tag = Tag::Application {
        constructed: true,
        number:      TagNumber::new(TAG),
    };
}

impl<'a, const TAG: u8, T: Decode<'a>> DecodeValue<'a> for ApplicationTagged<TAG, T> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> Result<Self> {
        Ok(Self(T::decode(reader)?))
    }
}

impl<const TAG: u8, T: Encode> EncodeValue for ApplicationTagged<TAG, T> {
    fn value_len(&self) -> Result<Length> {
        self.0.encoded_len()
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        self.0.encode(writer)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, der::asn1::OctetString};

    #[test]
    fn test_roundtrip_application_tag() {
        let inner = OctetString::new(vec![1, 2, 3]).unwrap();
        let tagged: ApplicationTagged<14, OctetString> = ApplicationTagged(inner.clone());
        let bytes = tagged.to_der().unwrap();
        // 0x40 (application) | 0x20 (constructed) | 14 = 0x6E
        assert_eq!(bytes[0], 0x6E);
        let decoded = ApplicationTagged::<14, OctetString>::from_der(&bytes).unwrap();
        assert_eq!(decoded.0, inner);
    }
}
