//! `SET OF` that preserves the order elements were read in, rather than
//! re-sorting to DER canonical order on encode. Real cards do not always
//! emit a canonically-sorted `SET OF SecurityInfo`; preserving input order
//! is what makes re-encoding exactly reproduce the original bytes.

use der::{Decode, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Result, Tag, Writer};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderedSet<T>(pub Vec<T>);

impl<T> OrderedSet<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T> IntoIterator for OrderedSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T> FixedTag for OrderedSet<T> {
    const TAG: Tag = Tag::Set;
}

impl<'a, T: Decode<'a>> DecodeValue<'a> for OrderedSet<T> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> Result<Self> {
        let mut items = Vec::new();
        while reader.remaining_len() > Length::ZERO {
            items.push(T::decode(reader)?);
        }
        Ok(Self(items))
    }
}

impl<T: Encode> EncodeValue for OrderedSet<T> {
    fn value_len(&self) -> Result<Length> {
        self.0
            .iter()
            .try_fold(Length::ZERO, |acc, item| acc + item.encoded_len()?)
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        for item in &self.0 {
            item.encode(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, der::asn1::Int};

    #[test]
    fn test_roundtrip_preserves_order() {
        let set = OrderedSet(vec![
            Int::new(&[3]).unwrap(),
            Int::new(&[1]).unwrap(),
            Int::new(&[2]).unwrap(),
        ]);
        let bytes = set.to_der().unwrap();
        let decoded = OrderedSet::<Int>::from_der(&bytes).unwrap();
        assert_eq!(decoded.0, set.0);
    }
}
