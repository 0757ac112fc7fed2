//! DG12: additional document details (ICAO 9303-10 §4.10). Same
//! tag-presence-list/field-TLV structure as [`super::dg11`], different
//! field tags.

use {
    super::{tlv_err, LdsError},
    crate::tlv::{encode_tlv, Tag, TlvReader},
};

const FILE: &str = "DG12";
const TAG_DG12: Tag = Tag(0x6C);
const TAG_LIST: Tag = Tag(0x5C);
const TAG_ISSUING_AUTHORITY: Tag = Tag(0x5F19);
const TAG_DATE_OF_ISSUE: Tag = Tag(0x5F26);
const TAG_OTHER_PERSONS: Tag = Tag(0x5F1A);
const TAG_ENDORSEMENTS: Tag = Tag(0x5F1B);
const TAG_TAX_EXIT_REQUIREMENTS: Tag = Tag(0x5F1C);
const TAG_IMAGE_OF_FRONT: Tag = Tag(0x5F1D);
const TAG_IMAGE_OF_REAR: Tag = Tag(0x5F1E);
const TAG_PERSONALIZATION_TIME: Tag = Tag(0x5F55);
const TAG_PERSONALIZATION_SERIAL: Tag = Tag(0x5F56);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dg12 {
    pub issuing_authority: Option<String>,
    pub date_of_issue: Option<String>,
    pub other_persons: Vec<String>,
    pub endorsements_or_observations: Option<String>,
    pub tax_exit_requirements: Option<String>,
    pub image_of_front: Option<Vec<u8>>,
    pub image_of_rear: Option<Vec<u8>>,
    pub personalization_time: Option<String>,
    pub personalization_serial_number: Option<String>,
}

fn utf8(file: &'static str, field: &'static str, bytes: &[u8]) -> Result<String, LdsError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| LdsError::InvalidUtf8 { file, field })
}

pub fn decode(file: &[u8]) -> Result<Dg12, LdsError> {
    let mut reader = TlvReader::new(file);
    let outer = reader.expect_tlv(TAG_DG12).map_err(tlv_err(FILE))?;
    let mut inner = TlvReader::sub_reader(&outer);

    let list_tlv = inner.expect_tlv(TAG_LIST).map_err(tlv_err(FILE))?;
    let declared: Vec<Tag> = list_tlv
        .value
        .chunks(2)
        .map(|pair| Tag(u16::from_be_bytes([pair[0], pair[1]]) as u32))
        .collect();

    let mut dg12 = Dg12::default();
    let mut parsed = Vec::new();

    while let Some(tlv) = inner.read_tlv().map_err(tlv_err(FILE))? {
        parsed.push(tlv.tag);
        match tlv.tag {
            TAG_ISSUING_AUTHORITY => dg12.issuing_authority = Some(utf8(FILE, "ISSUING_AUTHORITY", tlv.value)?),
            TAG_DATE_OF_ISSUE => dg12.date_of_issue = Some(utf8(FILE, "DATE_OF_ISSUE", tlv.value)?),
            TAG_OTHER_PERSONS => {
                dg12.other_persons = utf8(FILE, "OTHER_PERSONS", tlv.value)?
                    .split('<')
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect();
            }
            TAG_ENDORSEMENTS => dg12.endorsements_or_observations = Some(utf8(FILE, "ENDORSEMENTS", tlv.value)?),
            TAG_TAX_EXIT_REQUIREMENTS => {
                dg12.tax_exit_requirements = Some(utf8(FILE, "TAX_EXIT_REQUIREMENTS", tlv.value)?);
            }
            TAG_IMAGE_OF_FRONT => dg12.image_of_front = Some(tlv.value.to_vec()),
            TAG_IMAGE_OF_REAR => dg12.image_of_rear = Some(tlv.value.to_vec()),
            TAG_PERSONALIZATION_TIME => dg12.personalization_time = Some(utf8(FILE, "PERSONALIZATION_TIME", tlv.value)?),
            TAG_PERSONALIZATION_SERIAL => {
                dg12.personalization_serial_number = Some(utf8(FILE, "PERSONALIZATION_SERIAL", tlv.value)?);
            }
            other => {
                tracing::warn!(tag = ?other, "DG12: ignoring field not recognised by this crate");
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

    Ok(dg12)
}

pub fn tag_presence_list(dg12: &Dg12) -> Vec<Tag> {
    let mut tags = Vec::new();
    if dg12.issuing_authority.is_some() {
        tags.push(TAG_ISSUING_AUTHORITY);
    }
    if dg12.date_of_issue.is_some() {
        tags.push(TAG_DATE_OF_ISSUE);
    }
    if !dg12.other_persons.is_empty() {
        tags.push(TAG_OTHER_PERSONS);
    }
    if dg12.endorsements_or_observations.is_some() {
        tags.push(TAG_ENDORSEMENTS);
    }
    if dg12.tax_exit_requirements.is_some() {
        tags.push(TAG_TAX_EXIT_REQUIREMENTS);
    }
    if dg12.image_of_front.is_some() {
        tags.push(TAG_IMAGE_OF_FRONT);
    }
    if dg12.image_of_rear.is_some() {
        tags.push(TAG_IMAGE_OF_REAR);
    }
    if dg12.personalization_time.is_some() {
        tags.push(TAG_PERSONALIZATION_TIME);
    }
    if dg12.personalization_serial_number.is_some() {
        tags.push(TAG_PERSONALIZATION_SERIAL);
    }
    tags
}

pub fn encode(dg12: &Dg12) -> Vec<u8> {
    let mut body = Vec::new();
    let list: Vec<u8> = tag_presence_list(dg12)
        .into_iter()
        .flat_map(|tag| (tag.0 as u16).to_be_bytes())
        .collect();
    encode_tlv(&mut body, TAG_LIST, &list);

    if let Some(v) = &dg12.issuing_authority {
        encode_tlv(&mut body, TAG_ISSUING_AUTHORITY, v.as_bytes());
    }
    if let Some(v) = &dg12.date_of_issue {
        encode_tlv(&mut body, TAG_DATE_OF_ISSUE, v.as_bytes());
    }
    if !dg12.other_persons.is_empty() {
        encode_tlv(&mut body, TAG_OTHER_PERSONS, dg12.other_persons.join("<").as_bytes());
    }
    if let Some(v) = &dg12.endorsements_or_observations {
        encode_tlv(&mut body, TAG_ENDORSEMENTS, v.as_bytes());
    }
    if let Some(v) = &dg12.tax_exit_requirements {
        encode_tlv(&mut body, TAG_TAX_EXIT_REQUIREMENTS, v.as_bytes());
    }
    if let Some(v) = &dg12.image_of_front {
        encode_tlv(&mut body, TAG_IMAGE_OF_FRONT, v);
    }
    if let Some(v) = &dg12.image_of_rear {
        encode_tlv(&mut body, TAG_IMAGE_OF_REAR, v);
    }
    if let Some(v) = &dg12.personalization_time {
        encode_tlv(&mut body, TAG_PERSONALIZATION_TIME, v.as_bytes());
    }
    if let Some(v) = &dg12.personalization_serial_number {
        encode_tlv(&mut body, TAG_PERSONALIZATION_SERIAL, v.as_bytes());
    }

    let mut out = Vec::new();
    encode_tlv(&mut out, TAG_DG12, &body);
    out
}
