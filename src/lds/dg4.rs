//! DG4: the iris biometric data group (ICAO 9303-10 §4.9), file tag `0x76`.
//!
//! Some issuers pad an empty DG4 (no iris enrolled) with random filler
//! bytes after the CBEFF block so the file's length alone doesn't betray
//! that it carries no records; [`encode`] exposes that padding as an
//! optional parameter the way [`super::biometric::encode`] does.

use {
    super::{
        biometric::{self, BiometricDataGroup, OpaqueBdb},
        LdsError,
    },
    crate::tlv::Tag,
};

const FILE: &str = "DG4";
const TAG_DG4: Tag = Tag(0x76);
const TAG_BDB_UNCOMPRESSED: Tag = Tag(0x5F2E);
const TAG_BDB_COMPRESSED: Tag = Tag(0x7F2E);

pub fn decode(file: &[u8]) -> Result<BiometricDataGroup<OpaqueBdb>, LdsError> {
    biometric::decode(FILE, TAG_DG4, &[TAG_BDB_UNCOMPRESSED, TAG_BDB_COMPRESSED], file)
}

pub fn encode(dg: &BiometricDataGroup<OpaqueBdb>, trailing_padding: Option<&[u8]>) -> Vec<u8> {
    biometric::encode(TAG_DG4, TAG_BDB_UNCOMPRESSED, dg, trailing_padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_iris_template_with_padding_decodes_to_no_records() {
        let dg: BiometricDataGroup<OpaqueBdb> = BiometricDataGroup { records: vec![] };
        let encoded = encode(&dg, Some(&[0xAA, 0xBB]));
        assert!(decode(&encoded).unwrap().records.is_empty());
    }
}
