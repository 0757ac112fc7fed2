//! DG14: a DER `SET OF SecurityInfo` (ICAO 9303-11 §9.2.1), application-
//! tagged 14 on the wire. Unknown protocol OIDs decode into
//! [`SecurityInfo::Unknown`](crate::asn1::emrtd::security_info::SecurityInfo::Unknown)
//! rather than failing the file, matching spec §7's "unknown SecurityInfo
//! OIDs are tolerated" rule — [`crate::asn1::emrtd::security_info`] already
//! implements that tolerance at the codec level, so this module is a thin
//! wrapper that only frames the outer application tag.

use {
    super::{der_err, LdsError},
    crate::asn1::emrtd::EfDg14,
    der::{Decode, Encode},
};

const FILE: &str = "DG14";

pub fn decode(file: &[u8]) -> Result<EfDg14, LdsError> {
    EfDg14::from_der(file).map_err(der_err(FILE))
}

pub fn encode(dg14: &EfDg14) -> Result<Vec<u8>, LdsError> {
    dg14.to_der().map_err(der_err(FILE))
}
