//! EF.SOD (ICAO 9303-10 §4.6.2): the signed Document Security Object, a CMS
//! `SignedData` envelope around a hash-per-data-group manifest. Decoding
//! and the `hash_for_dg` lookup are delegated to
//! [`crate::asn1::emrtd::EfSod`]; verifying the CMS signature against a
//! trust anchor is out of scope (spec §1 — the PKI/CMS verification
//! pipeline is an external collaborator).

use {
    super::{der_err, LdsError},
    crate::asn1::emrtd::EfSod,
    der::Decode,
};

const FILE: &str = "EF.SOD";

pub fn decode(file: &[u8]) -> Result<EfSod, LdsError> {
    EfSod::from_der(file).map_err(der_err(FILE))
}
