//! DG11: additional personal details (ICAO 9303-10 §4.9). Body is a tag
//! presence list (`0x5C`, concatenated two-byte tags of the fields that
//! follow) then each field's own TLV, in the same order the list declares
//! them. `OTHER_NAME` entries are wrapped in a constructed `0xA0` block
//! holding a count (`0x02`) followed by that many separate `0x5F0F` TLVs.

use {
    super::{tlv_err, LdsError},
    crate::tlv::{encode_tlv, Tag, TlvReader},
};

const FILE: &str = "DG11";
const TAG_DG11: Tag = Tag(0x6B);
const TAG_LIST: Tag = Tag(0x5C);
const TAG_NAME_OF_HOLDER: Tag = Tag(0x5F0E);
const TAG_OTHER_NAMES: Tag = Tag(0xA0);
const TAG_OTHER_NAME: Tag = Tag(0x5F0F);
const TAG_OTHER_NAMES_COUNT: Tag = Tag(0x02);
const TAG_PERSONAL_NUMBER: Tag = Tag(0x5F10);
const TAG_FULL_DATE_OF_BIRTH: Tag = Tag(0x5F2B);
const TAG_PLACE_OF_BIRTH: Tag = Tag(0x5F11);
const TAG_PERMANENT_ADDRESS: Tag = Tag(0x5F42);
const TAG_TELEPHONE: Tag = Tag(0x5F12);
const TAG_PROFESSION: Tag = Tag(0x5F13);
const TAG_TITLE: Tag = Tag(0x5F14);
const TAG_PERSONAL_SUMMARY: Tag = Tag(0x5F15);
const TAG_PROOF_OF_CITIZENSHIP: Tag = Tag(0x5F16);
const TAG_OTHER_VALID_TD_NUMBERS: Tag = Tag(0x5F17);
const TAG_CUSTODY_INFORMATION: Tag = Tag(0x5F18);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dg11 {
    pub name_of_holder: Option<String>,
    pub other_names: Vec<String>,
    pub personal_number: Option<String>,
    /// Normally an 8-digit `YYYYMMDD` string; some issuers emit 4 raw
    /// bytes instead, which is kept as its hex-string representation
    /// rather than rejected.
    pub full_date_of_birth: Option<String>,
    pub place_of_birth: Vec<String>,
    pub permanent_address: Vec<String>,
    pub telephone: Option<String>,
    pub profession: Option<String>,
    pub title: Option<String>,
    pub personal_summary: Option<String>,
    pub proof_of_citizenship: Option<Vec<u8>>,
    pub other_valid_td_numbers: Vec<String>,
    pub custody_information: Option<String>,
}

fn utf8(file: &'static str, field: &'static str, bytes: &[u8]) -> Result<String, LdsError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| LdsError::InvalidUtf8 { file, field })
}

fn split_list(s: &str) -> Vec<String> {
    s.split('<').filter(|p| !p.is_empty()).map(str::to_owned).collect()
}

pub fn decode(file: &[u8]) -> Result<Dg11, LdsError> {
    let mut reader = TlvReader::new(file);
    let outer = reader.expect_tlv(TAG_DG11).map_err(tlv_err(FILE))?;
    let mut inner = TlvReader::sub_reader(&outer);

    let list_tlv = inner.expect_tlv(TAG_LIST).map_err(tlv_err(FILE))?;
    let declared: Vec<Tag> = list_tlv
        .value
        .chunks(2)
        .map(|pair| Tag(u16::from_be_bytes([pair[0], pair[1]]) as u32))
        .collect();

    let mut dg11 = Dg11::default();
    let mut parsed = Vec::new();

    while let Some(tlv) = inner.read_tlv().map_err(tlv_err(FILE))? {
        parsed.push(tlv.tag);
        match tlv.tag {
            TAG_NAME_OF_HOLDER => dg11.name_of_holder = Some(utf8(FILE, "NAME_OF_HOLDER", tlv.value)?),
            TAG_OTHER_NAMES => {
                let mut sub = TlvReader::sub_reader(&tlv);
                let count_tlv = sub.expect_tlv(TAG_OTHER_NAMES_COUNT).map_err(tlv_err(FILE))?;
                let count = *count_tlv.value.first().unwrap_or(&0) as usize;
                for _ in 0..count {
                    let name_tlv = sub.expect_tlv(TAG_OTHER_NAME).map_err(tlv_err(FILE))?;
                    dg11.other_names.push(utf8(FILE, "OTHER_NAME", name_tlv.value)?);
                }
            }
            TAG_PERSONAL_NUMBER => dg11.personal_number = Some(utf8(FILE, "PERSONAL_NUMBER", tlv.value)?),
            TAG_FULL_DATE_OF_BIRTH => {
                dg11.full_date_of_birth = Some(if tlv.value.len() == 4 {
                    hex::encode(tlv.value)
                } else {
                    utf8(FILE, "FULL_DATE_OF_BIRTH", tlv.value)?
                });
            }
            TAG_PLACE_OF_BIRTH => dg11.place_of_birth = split_list(&utf8(FILE, "PLACE_OF_BIRTH", tlv.value)?),
            TAG_PERMANENT_ADDRESS => {
                dg11.permanent_address = split_list(&utf8(FILE, "PERMANENT_ADDRESS", tlv.value)?);
            }
            TAG_TELEPHONE => dg11.telephone = Some(utf8(FILE, "TELEPHONE", tlv.value)?),
            TAG_PROFESSION => dg11.profession = Some(utf8(FILE, "PROFESSION", tlv.value)?),
            TAG_TITLE => dg11.title = Some(utf8(FILE, "TITLE", tlv.value)?),
            TAG_PERSONAL_SUMMARY => dg11.personal_summary = Some(utf8(FILE, "PERSONAL_SUMMARY", tlv.value)?),
            TAG_PROOF_OF_CITIZENSHIP => dg11.proof_of_citizenship = Some(tlv.value.to_vec()),
            TAG_OTHER_VALID_TD_NUMBERS => {
                dg11.other_valid_td_numbers = split_list(&utf8(FILE, "OTHER_VALID_TD_NUMBERS", tlv.value)?);
            }
            TAG_CUSTODY_INFORMATION => dg11.custody_information = Some(utf8(FILE, "CUSTODY_INFORMATION", tlv.value)?),
            other => {
                tracing::warn!(tag = ?other, "DG11: ignoring field not recognised by this crate");
            }
        }
    }

    for tag in &declared {
        if !parsed.contains(tag) {
            return Err(LdsError::DeclaredTagNotParsed { file: FILE, tag: tag.0 });
        }
    }
    for tag in &parsed {
        if !declared.contains(tag) {
            return Err(LdsError::ParsedTagNotDeclared { file: FILE, tag: tag.0 });
        }
    }

    Ok(dg11)
}

/// The tag presence list this crate would write for `dg11`, in the field
/// order [`encode`] emits them — exposed so round-trip tests can assert
/// the order independently of `encode`'s own output.
pub fn tag_presence_list(dg11: &Dg11) -> Vec<Tag> {
    let mut tags = Vec::new();
    if dg11.name_of_holder.is_some() {
        tags.push(TAG_NAME_OF_HOLDER);
    }
    if !dg11.other_names.is_empty() {
        tags.push(TAG_OTHER_NAMES);
    }
    if dg11.personal_number.is_some() {
        tags.push(TAG_PERSONAL_NUMBER);
    }
    if dg11.full_date_of_birth.is_some() {
        tags.push(TAG_FULL_DATE_OF_BIRTH);
    }
    if !dg11.place_of_birth.is_empty() {
        tags.push(TAG_PLACE_OF_BIRTH);
    }
    if !dg11.permanent_address.is_empty() {
        tags.push(TAG_PERMANENT_ADDRESS);
    }
    if dg11.telephone.is_some() {
        tags.push(TAG_TELEPHONE);
    }
    if dg11.profession.is_some() {
        tags.push(TAG_PROFESSION);
    }
    if dg11.title.is_some() {
        tags.push(TAG_TITLE);
    }
    if dg11.personal_summary.is_some() {
        tags.push(TAG_PERSONAL_SUMMARY);
    }
    if dg11.proof_of_citizenship.is_some() {
        tags.push(TAG_PROOF_OF_CITIZENSHIP);
    }
    if !dg11.other_valid_td_numbers.is_empty() {
        tags.push(TAG_OTHER_VALID_TD_NUMBERS);
    }
    if dg11.custody_information.is_some() {
        tags.push(TAG_CUSTODY_INFORMATION);
    }
    tags
}

pub fn encode(dg11: &Dg11) -> Vec<u8> {
    let mut body = Vec::new();
    let list: Vec<u8> = tag_presence_list(dg11)
        .into_iter()
        .flat_map(|tag| (tag.0 as u16).to_be_bytes())
        .collect();
    encode_tlv(&mut body, TAG_LIST, &list);

    if let Some(name) = &dg11.name_of_holder {
        encode_tlv(&mut body, TAG_NAME_OF_HOLDER, name.as_bytes());
    }
    if !dg11.other_names.is_empty() {
        let mut sub = Vec::new();
        encode_tlv(&mut sub, TAG_OTHER_NAMES_COUNT, &[dg11.other_names.len() as u8]);
        for name in &dg11.other_names {
            encode_tlv(&mut sub, TAG_OTHER_NAME, name.as_bytes());
        }
        encode_tlv(&mut body, TAG_OTHER_NAMES, &sub);
    }
    if let Some(number) = &dg11.personal_number {
        encode_tlv(&mut body, TAG_PERSONAL_NUMBER, number.as_bytes());
    }
    if let Some(dob) = &dg11.full_date_of_birth {
        encode_tlv(&mut body, TAG_FULL_DATE_OF_BIRTH, dob.as_bytes());
    }
    if !dg11.place_of_birth.is_empty() {
        encode_tlv(&mut body, TAG_PLACE_OF_BIRTH, dg11.place_of_birth.join("<").as_bytes());
    }
    if !dg11.permanent_address.is_empty() {
        encode_tlv(
            &mut body,
            TAG_PERMANENT_ADDRESS,
            dg11.permanent_address.join("<").as_bytes(),
        );
    }
    if let Some(v) = &dg11.telephone {
        encode_tlv(&mut body, TAG_TELEPHONE, v.as_bytes());
    }
    if let Some(v) = &dg11.profession {
        encode_tlv(&mut body, TAG_PROFESSION, v.as_bytes());
    }
    if let Some(v) = &dg11.title {
        encode_tlv(&mut body, TAG_TITLE, v.as_bytes());
    }
    if let Some(v) = &dg11.personal_summary {
        encode_tlv(&mut body, TAG_PERSONAL_SUMMARY, v.as_bytes());
    }
    if let Some(v) = &dg11.proof_of_citizenship {
        encode_tlv(&mut body, TAG_PROOF_OF_CITIZENSHIP, v);
    }
    if !dg11.other_valid_td_numbers.is_empty() {
        encode_tlv(
            &mut body,
            TAG_OTHER_VALID_TD_NUMBERS,
            dg11.other_valid_td_numbers.join("<").as_bytes(),
        );
    }
    if let Some(v) = &dg11.custody_information {
        encode_tlv(&mut body, TAG_CUSTODY_INFORMATION, v.as_bytes());
    }

    let mut out = Vec::new();
    encode_tlv(&mut out, TAG_DG11, &body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_matches_tag_presence_list() {
        let dg11 = Dg11 {
            name_of_holder: Some("SMITH<<JOHN".to_owned()),
            full_date_of_birth: Some("19700101".to_owned()),
            place_of_birth: vec!["ANYTOWN".to_owned(), "ANYSTATE".to_owned()],
            ..Dg11::default()
        };

        let encoded = encode(&dg11);
        let decoded = decode(&encoded).unwrap();

        assert_eq!(decoded, dg11);
        let tags: Vec<u32> = tag_presence_list(&dg11).into_iter().map(|t| t.0).collect();
        assert_eq!(tags, vec![0x5F0E, 0x5F2B, 0x5F11]);
    }

    #[test]
    fn test_decode_rejects_field_absent_from_tag_list() {
        let mut body = Vec::new();
        // Declares only NAME_OF_HOLDER but also includes PROFESSION.
        encode_tlv(&mut body, TAG_LIST, &(TAG_NAME_OF_HOLDER.0 as u16).to_be_bytes());
        encode_tlv(&mut body, TAG_NAME_OF_HOLDER, b"DOE<<JANE");
        encode_tlv(&mut body, TAG_PROFESSION, b"ENGINEER");
        let mut file = Vec::new();
        encode_tlv(&mut file, TAG_DG11, &body);

        assert!(matches!(decode(&file), Err(LdsError::ParsedTagNotDeclared { .. })));
    }

    #[test]
    fn test_decode_rejects_declared_tag_never_parsed() {
        let mut body = Vec::new();
        let mut list = (TAG_NAME_OF_HOLDER.0 as u16).to_be_bytes().to_vec();
        list.extend_from_slice(&(TAG_PROFESSION.0 as u16).to_be_bytes());
        encode_tlv(&mut body, TAG_LIST, &list);
        encode_tlv(&mut body, TAG_NAME_OF_HOLDER, b"DOE<<JANE");
        let mut file = Vec::new();
        encode_tlv(&mut file, TAG_DG11, &body);

        assert!(matches!(decode(&file), Err(LdsError::DeclaredTagNotParsed { .. })));
    }

    #[test]
    fn test_four_byte_date_of_birth_falls_back_to_hex() {
        let mut body = Vec::new();
        encode_tlv(&mut body, TAG_LIST, &(TAG_FULL_DATE_OF_BIRTH.0 as u16).to_be_bytes());
        encode_tlv(&mut body, TAG_FULL_DATE_OF_BIRTH, &[0x19, 0x70, 0x01, 0x01]);
        let mut file = Vec::new();
        encode_tlv(&mut file, TAG_DG11, &body);

        let decoded = decode(&file).unwrap();
        assert_eq!(decoded.full_date_of_birth.as_deref(), Some("19700101"));
    }
}
