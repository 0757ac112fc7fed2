//! `ContentInfo` (RFC 5652 §3): an object identifier naming the content type
//! plus the content itself, `[0] EXPLICIT`. EF.SOD's `SignedData` and CSCA
//! Master Lists are both carried this way.

use der::{
    asn1::ObjectIdentifier as Oid, Decode, DecodeValue, Encode, EncodeValue, Error, ErrorKind,
    FixedTag, Header, Length, Reader, Result, Sequence, Tag, TagNumber, Writer,
};

/// A type that can appear as `ContentInfo`'s `content` field, identified by
/// a fixed content-type OID.
pub trait ContentType {
    const CONTENT_TYPE: Oid;
}

impl ContentType for cms::signed_data::SignedData {
    /// RFC 5652 §5.1 `id-signedData`.
    const CONTENT_TYPE: Oid = Oid::new_unwrap("1.2.840.113549.1.7.2");
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentInfo<T>(pub T);

impl<T> FixedTag for ContentInfo<T> {
    const TAG: Tag = Tag::Sequence;
}

impl<'a, T: ContentType + Decode<'a>> DecodeValue<'a> for ContentInfo<T> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> Result<Self> {
        let oid = Oid::decode(reader)?;
        if oid != T::CONTENT_TYPE {
            return Err(Error::new(ErrorKind::OidUnknown { oid }, header.length));
        }
        let tagged = der::asn1::ContextSpecific::<T>::decode_explicit(reader, TagNumber::N0)?
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Incomplete {
                        expected_len: header.length,
                        actual_len:   reader.remaining_len(),
                    },
                    header.length,
                )
            })?;
        Ok(Self(tagged.value))
    }
}

impl<T: ContentType + Encode> EncodeValue for ContentInfo<T> {
    fn value_len(&self) -> Result<Length> {
        let inner_len = self.0.encoded_len()?;
        let content_header = Header {
            tag:    Tag::ContextSpecific {
                constructed: true,
                number:      TagNumber::N0,
            },
            length: inner_len,
        };
        T::CONTENT_TYPE.encoded_len()? + content_header.encoded_len()? + inner_len
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        T::CONTENT_TYPE.encode(writer)?;
        let inner_len = self.0.encoded_len()?;
        let content_header = Header {
            tag:    Tag::ContextSpecific {
                constructed: true,
                number:      TagNumber::N0,
            },
            length: inner_len,
        };
        content_header.encode(writer)?;
        self.0.encode(writer)
    }
}

impl<'a, T: ContentType + Decode<'a> + Encode> Sequence<'a> for ContentInfo<T> {}
