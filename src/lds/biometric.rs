//! CBEFF machinery shared by DG2 (face), DG3 (fingerprint) and DG4 (iris)
//! (ISO/IEC 19785; ICAO 9303-10 §4.8/4.9/4.10): a complex biometric
//! information template (tag `0x7F61`) wrapping a record count and that
//! many simple templates (tag `0x7F60`), each holding a biometric header
//! template (tag `0xA1`) and a biometric data block.
//!
//! The BDB itself is generic over a [`BiometricDataBlock`] codec rather
//! than one hardcoded per data group, so DG2/DG3/DG4 reuse this module
//! with only their outer file tag and BDB tag differing. Decoding the BDB
//! contents (ISO 19794-4/-5/-6, JPEG/JP2) is out of scope — the format-
//! specific codec this module is generic over can be as simple as
//! [`OpaqueBdb`], which hands the bytes back unparsed.

use {
    super::LdsError,
    crate::tlv::{encode_tlv, Tag, TlvReader},
};

const TAG_COMPLEX_TEMPLATE: Tag = Tag(0x7F61);
const TAG_RECORD_COUNT: Tag = Tag(0x02);
const TAG_SIMPLE_TEMPLATE: Tag = Tag(0x7F60);
const TAG_BIOMETRIC_HEADER: Tag = Tag(0xA1);

/// A biometric data block codec. Implementors only need to round-trip
/// their own bytes; this module never inspects BDB contents itself.
pub trait BiometricDataBlock: Sized {
    fn decode(bytes: &[u8]) -> Result<Self, LdsError>;
    fn encode(&self) -> Vec<u8>;
}

/// The default BDB codec: biometric image/record bytes are handed back
/// exactly as read, with no ISO 19794 or JPEG/JP2 interpretation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpaqueBdb(pub Vec<u8>);

impl BiometricDataBlock for OpaqueBdb {
    fn decode(bytes: &[u8]) -> Result<Self, LdsError> {
        Ok(Self(bytes.to_vec()))
    }

    fn encode(&self) -> Vec<u8> {
        self.0.clone()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BiometricRecord<B> {
    /// The biometric header template's raw TLV bytes, unparsed (CBEFF
    /// header fields — format owner, type, quality — are out of scope;
    /// this crate only frames the record boundary).
    pub header: Vec<u8>,
    pub data: B,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BiometricDataGroup<B> {
    pub records: Vec<BiometricRecord<B>>,
}

pub fn decode<B: BiometricDataBlock>(
    file: &'static str,
    file_tag: Tag,
    bdb_tags: &[Tag],
    bytes: &[u8],
) -> Result<BiometricDataGroup<B>, LdsError> {
    let mut reader = TlvReader::new(bytes);
    let outer = reader
        .expect_tlv(file_tag)
        .map_err(|source| LdsError::Tlv { file, source })?;
    let mut inner = TlvReader::sub_reader(&outer);

    let complex = inner
        .expect_tlv(TAG_COMPLEX_TEMPLATE)
        .map_err(|source| LdsError::Tlv { file, source })?;
    let mut complex_reader = TlvReader::sub_reader(&complex);

    let count_tlv = complex_reader
        .expect_tlv(TAG_RECORD_COUNT)
        .map_err(|source| LdsError::Tlv { file, source })?;
    let count = *count_tlv.value.first().unwrap_or(&0) as usize;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let simple = complex_reader
            .expect_tlv(TAG_SIMPLE_TEMPLATE)
            .map_err(|source| LdsError::Tlv { file, source })?;
        let mut simple_reader = TlvReader::sub_reader(&simple);

        let header_tlv = simple_reader
            .expect_tlv(TAG_BIOMETRIC_HEADER)
            .map_err(|source| LdsError::Tlv { file, source })?;

        let bdb_tlv = simple_reader
            .read_tlv()
            .map_err(|source| LdsError::Tlv { file, source })?
            .filter(|tlv| bdb_tags.contains(&tlv.tag))
            .ok_or(LdsError::ParsedTagNotDeclared {
                file,
                tag: TAG_SIMPLE_TEMPLATE.0,
            })?;

        records.push(BiometricRecord {
            header: header_tlv.value.to_vec(),
            data: B::decode(bdb_tlv.value)?,
        });
    }

    Ok(BiometricDataGroup { records })
}

/// Encodes a biometric data group back into its CBEFF framing. `bdb_tag`
/// picks which of the two standard BDB tags (`0x5F2E` or `0x7F2E`) to
/// write. Per spec's DG4 quirk, `trailing_padding` appends random filler
/// after the CBEFF block when the record list is empty — some issuers do
/// this so an empty iris template doesn't betray its own absence by file
/// length alone.
pub fn encode<B: BiometricDataBlock>(
    file_tag: Tag,
    bdb_tag: Tag,
    dg: &BiometricDataGroup<B>,
    trailing_padding: Option<&[u8]>,
) -> Vec<u8> {
    let mut simple_templates = Vec::new();
    for record in &dg.records {
        let mut simple = Vec::new();
        encode_tlv(&mut simple, TAG_BIOMETRIC_HEADER, &record.header);
        encode_tlv(&mut simple, bdb_tag, &record.data.encode());
        simple_templates.push(simple);
    }

    let mut complex_body = Vec::new();
    encode_tlv(&mut complex_body, TAG_RECORD_COUNT, &[dg.records.len() as u8]);
    for simple in &simple_templates {
        encode_tlv(&mut complex_body, TAG_SIMPLE_TEMPLATE, simple);
    }

    let mut file_body = Vec::new();
    encode_tlv(&mut file_body, TAG_COMPLEX_TEMPLATE, &complex_body);
    if dg.records.is_empty() {
        if let Some(padding) = trailing_padding {
            file_body.extend_from_slice(padding);
        }
    }

    let mut out = Vec::new();
    encode_tlv(&mut out, file_tag, &file_body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG_DG2: Tag = Tag(0x75);
    const TAG_BDB_FACE: Tag = Tag(0x5F2E);

    #[test]
    fn test_round_trip_single_record() {
        let dg = BiometricDataGroup {
            records: vec![BiometricRecord {
                header: vec![0x01, 0x02],
                data: OpaqueBdb(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            }],
        };
        let encoded = encode(TAG_DG2, TAG_BDB_FACE, &dg, None);
        let decoded: BiometricDataGroup<OpaqueBdb> =
            decode("DG2", TAG_DG2, &[TAG_BDB_FACE], &encoded).unwrap();
        assert_eq!(decoded, dg);
    }

    #[test]
    fn test_empty_template_list_with_padding_round_trips_records() {
        let dg: BiometricDataGroup<OpaqueBdb> = BiometricDataGroup { records: vec![] };
        let encoded = encode(TAG_DG2, TAG_BDB_FACE, &dg, Some(&[0xAA, 0xBB, 0xCC]));
        let decoded: BiometricDataGroup<OpaqueBdb> =
            decode("DG2", TAG_DG2, &[TAG_BDB_FACE], &encoded).unwrap();
        assert!(decoded.records.is_empty());
    }

    #[test]
    fn test_decode_accepts_either_bdb_tag() {
        let dg = BiometricDataGroup {
            records: vec![BiometricRecord {
                header: vec![0x01],
                data: OpaqueBdb(vec![0x01, 0x02, 0x03]),
            }],
        };
        let encoded = encode(TAG_DG2, Tag(0x7F2E), &dg, None);
        let decoded: BiometricDataGroup<OpaqueBdb> =
            decode("DG2", TAG_DG2, &[Tag(0x5F2E), Tag(0x7F2E)], &encoded).unwrap();
        assert_eq!(decoded, dg);
    }
}
