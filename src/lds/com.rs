//! EF.COM (ICAO 9303-10 §4.6.1): advertises which LDS version the document
//! was personalised under and which data groups are present, so a reader
//! knows what to expect before selecting any of them.

use {
    super::{tlv_err, LdsError},
    crate::tlv::{encode_tlv, Tag, TlvReader},
};

const FILE: &str = "EF.COM";
const TAG_COM: Tag = Tag(0x60);
const TAG_LDS_VERSION: Tag = Tag(0x5F01);
const TAG_UNICODE_VERSION: Tag = Tag(0x5F36);
const TAG_DG_PRESENCE_LIST: Tag = Tag(0x5C);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EfCom {
    pub lds_version: String,
    pub unicode_version: String,
    /// One-byte outer tag for each data group the document carries (e.g.
    /// `0x61` for DG1), in the order EF.COM lists them.
    pub data_group_tags: Vec<u8>,
}

fn utf8(field: &'static str, bytes: &[u8]) -> Result<String, LdsError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| LdsError::InvalidUtf8 { file: FILE, field })
}

pub fn decode(file: &[u8]) -> Result<EfCom, LdsError> {
    let mut reader = TlvReader::new(file);
    let outer = reader.expect_tlv(TAG_COM).map_err(tlv_err(FILE))?;
    let mut inner = TlvReader::sub_reader(&outer);

    let lds_version_tlv = inner.expect_tlv(TAG_LDS_VERSION).map_err(tlv_err(FILE))?;
    let lds_version = utf8("LDS_VERSION", lds_version_tlv.value)?;

    let unicode_version_tlv = inner.expect_tlv(TAG_UNICODE_VERSION).map_err(tlv_err(FILE))?;
    let unicode_version = utf8("UNICODE_VERSION", unicode_version_tlv.value)?;

    let list_tlv = inner.expect_tlv(TAG_DG_PRESENCE_LIST).map_err(tlv_err(FILE))?;

    Ok(EfCom {
        lds_version,
        unicode_version,
        data_group_tags: list_tlv.value.to_vec(),
    })
}

pub fn encode(com: &EfCom) -> Vec<u8> {
    let mut body = Vec::new();
    encode_tlv(&mut body, TAG_LDS_VERSION, com.lds_version.as_bytes());
    encode_tlv(&mut body, TAG_UNICODE_VERSION, com.unicode_version.as_bytes());
    encode_tlv(&mut body, TAG_DG_PRESENCE_LIST, &com.data_group_tags);

    let mut out = Vec::new();
    encode_tlv(&mut out, TAG_COM, &body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let com = EfCom {
            lds_version: "0107".to_owned(),
            unicode_version: "040000".to_owned(),
            data_group_tags: vec![0x61, 0x75, 0x6B, 0x6E, 0x6F],
        };
        let encoded = encode(&com);
        assert_eq!(decode(&encoded).unwrap(), com);
    }

    #[test]
    fn test_decode_rejects_truncated_file() {
        let mut body = Vec::new();
        encode_tlv(&mut body, TAG_LDS_VERSION, b"0107");
        let mut file = Vec::new();
        encode_tlv(&mut file, TAG_COM, &body);
        assert!(matches!(decode(&file), Err(LdsError::Tlv { .. })));
    }
}
