//! DG15: a raw X.509 `SubjectPublicKeyInfo`, unlike every other DG file,
//! with no outer ICAO application tag (spec §4.1: "DG15 is raw X.509").
//! Used by [`crate::aa`] to verify Active Authentication's signature.

use {
    super::{der_err, LdsError},
    crate::asn1::public_key_info::SubjectPublicKeyInfo,
    der::{Decode, Encode},
};

const FILE: &str = "DG15";

pub fn decode(file: &[u8]) -> Result<SubjectPublicKeyInfo, LdsError> {
    SubjectPublicKeyInfo::from_der(file).map_err(der_err(FILE))
}

pub fn encode(key: &SubjectPublicKeyInfo) -> Result<Vec<u8>, LdsError> {
    key.to_der().map_err(der_err(FILE))
}
