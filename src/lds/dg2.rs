//! DG2: the face biometric data group (ICAO 9303-10 §4.8), file tag `0x75`,
//! framed with the shared CBEFF machinery in [`super::biometric`]. The BDB
//! tag is `0x5F2E` for an uncompressed record and `0x7F2E` for a compressed
//! one (JPEG/JP2) — both are accepted on decode since nothing here inspects
//! the image bytes themselves.

use {
    super::{
        biometric::{self, BiometricDataGroup, OpaqueBdb},
        LdsError,
    },
    crate::tlv::Tag,
};

const FILE: &str = "DG2";
const TAG_DG2: Tag = Tag(0x75);
const TAG_BDB_UNCOMPRESSED: Tag = Tag(0x5F2E);
const TAG_BDB_COMPRESSED: Tag = Tag(0x7F2E);

pub fn decode(file: &[u8]) -> Result<BiometricDataGroup<OpaqueBdb>, LdsError> {
    biometric::decode(FILE, TAG_DG2, &[TAG_BDB_UNCOMPRESSED, TAG_BDB_COMPRESSED], file)
}

pub fn encode(dg: &BiometricDataGroup<OpaqueBdb>) -> Vec<u8> {
    biometric::encode(TAG_DG2, TAG_BDB_COMPRESSED, dg, None)
}
