//! DG3: the fingerprint biometric data group (ICAO 9303-10 §4.9), file tag
//! `0x63`. Access to this data group is normally gated behind Extended
//! Access Control (spec §4.7/§4.10 `doEAC`) on real documents, but that
//! gate is a chip-side access-condition concern — this module only frames
//! whatever bytes the chip hands back once a reader has read them.

use {
    super::{
        biometric::{self, BiometricDataGroup, OpaqueBdb},
        LdsError,
    },
    crate::tlv::Tag,
};

const FILE: &str = "DG3";
const TAG_DG3: Tag = Tag(0x63);
const TAG_BDB_UNCOMPRESSED: Tag = Tag(0x5F2E);
const TAG_BDB_COMPRESSED: Tag = Tag(0x7F2E);

pub fn decode(file: &[u8]) -> Result<BiometricDataGroup<OpaqueBdb>, LdsError> {
    biometric::decode(FILE, TAG_DG3, &[TAG_BDB_UNCOMPRESSED, TAG_BDB_COMPRESSED], file)
}

pub fn encode(dg: &BiometricDataGroup<OpaqueBdb>) -> Vec<u8> {
    biometric::encode(TAG_DG3, TAG_BDB_UNCOMPRESSED, dg, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_a_fingerprint_record() {
        let dg = BiometricDataGroup {
            records: vec![biometric::BiometricRecord {
                header: vec![0x02],
                data: OpaqueBdb(vec![0x01, 0x02, 0x03, 0x04]),
            }],
        };
        let encoded = encode(&dg);
        assert_eq!(decode(&encoded).unwrap(), dg);
    }
}
