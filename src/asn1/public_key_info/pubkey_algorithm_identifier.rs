//! `PubkeyAlgorithmIdentifier`: the `AlgorithmIdentifier` carried by a
//! `SubjectPublicKeyInfo`, specialized for the three algorithms eMRTDs use
//! (RSA, EC, DH) with a catch-all for anything else (spec §9 notes PACE can
//! in principle name other groups).

use {
    super::{DhAlgoParameters, ECAlgoParameters},
    crate::asn1::AnyAlgorithmIdentifier,
    der::{
        asn1::{Any, Null, ObjectIdentifier as Oid},
        Decode, FixedTag, Sequence, Tag, ValueOrd,
    },
};

pub const ID_RSA: Oid = Oid::new_unwrap("1.2.840.113549.1.1.1");
pub const ID_EC: Oid = Oid::new_unwrap("1.2.840.10045.2.1");
pub const ID_DH: Oid = Oid::new_unwrap("1.2.840.10046.2.1");

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum PubkeyAlgorithmIdentifier {
    Rsa,
    Ec(ECAlgoParameters),
    Dh(DhAlgoParameters),
    Unknown(AnyAlgorithmIdentifier),
}

impl FixedTag for PubkeyAlgorithmIdentifier {
    const TAG: Tag = Tag::Sequence;
}

impl<'a> Sequence<'a> for PubkeyAlgorithmIdentifier {}

impl ValueOrd for PubkeyAlgorithmIdentifier {
    fn value_cmp(&self, other: &Self) -> der::Result<std::cmp::Ordering> {
        use der::Encode;
        let lhs = self.to_der()?;
        let rhs = other.to_der()?;
        Ok(lhs.as_slice().cmp(rhs.as_slice()))
    }
}
