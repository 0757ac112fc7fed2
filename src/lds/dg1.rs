//! DG1: the Machine Readable Zone, envelope tag `0x5F1F` inside the DG1
//! file tag `0x61` (ICAO 9303-10 §4.7; ICAO 9303-3 for the MRZ layouts
//! themselves).
//!
//! Document type is inferred from the decoded MRZ's length: 90 bytes is
//! TD1 (3 lines of 30), 72 is TD2 (2 lines of 36), 88 is TD3 (2 lines of
//! 44, the familiar passport format).

use {
    super::{tlv_err, LdsError},
    crate::tlv::{Tag, TlvReader},
};

const FILE: &str = "DG1";
const TAG_DG1: Tag = Tag(0x61);
const TAG_MRZ: Tag = Tag(0x5F1F);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mrz {
    Td1(MrzTd1),
    Td2(MrzTd2),
    Td3(MrzTd3),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MrzTd1 {
    pub document_code: String,
    pub issuing_state: String,
    pub document_number: String,
    pub optional_data_1: String,
    pub date_of_birth: String,
    pub sex: String,
    pub date_of_expiry: String,
    pub nationality: String,
    pub optional_data_2: String,
    pub name: Name,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MrzTd2 {
    pub document_code: String,
    pub issuing_state: String,
    pub name: Name,
    pub document_number: String,
    pub nationality: String,
    pub date_of_birth: String,
    pub sex: String,
    pub date_of_expiry: String,
    pub optional_data: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MrzTd3 {
    pub document_code: String,
    pub issuing_state: String,
    pub name: Name,
    pub document_number: String,
    pub nationality: String,
    pub date_of_birth: String,
    pub sex: String,
    pub date_of_expiry: String,
    pub optional_data: String,
}

/// Primary/secondary identifier split on the MRZ name field's `<<`
/// separator, each further split on single `<` into components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name {
    pub primary_identifier: String,
    pub secondary_identifiers: Vec<String>,
}

fn parse_name(field: &str) -> Name {
    let mut parts = field.splitn(2, "<<");
    let primary = parts.next().unwrap_or("");
    let secondary = parts.next().unwrap_or("");
    Name {
        primary_identifier: primary.trim_end_matches('<').replace('<', " "),
        secondary_identifiers: secondary
            .split('<')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
    }
}

fn trim(field: &str) -> String {
    field.trim_end_matches('<').to_owned()
}

pub fn decode(file: &[u8]) -> Result<Mrz, LdsError> {
    let mut reader = TlvReader::new(file);
    let outer = reader.expect_tlv(TAG_DG1).map_err(tlv_err(FILE))?;
    let mut inner = TlvReader::sub_reader(&outer);
    let mrz_tlv = inner.expect_tlv(TAG_MRZ).map_err(tlv_err(FILE))?;
    let mrz = std::str::from_utf8(mrz_tlv.value).map_err(|_| LdsError::InvalidUtf8 {
        file: FILE,
        field: "MRZ",
    })?;

    match mrz.len() {
        90 => Ok(Mrz::Td1(parse_td1(mrz))),
        72 => Ok(Mrz::Td2(parse_td2(mrz))),
        88 => Ok(Mrz::Td3(parse_td3(mrz))),
        len => Err(LdsError::UnknownMrzLength { file: FILE, len }),
    }
}

fn parse_td1(mrz: &str) -> MrzTd1 {
    let line1 = &mrz[0..30];
    let line2 = &mrz[30..60];
    let line3 = &mrz[60..90];
    MrzTd1 {
        document_code: trim(&line1[0..2]),
        issuing_state: trim(&line1[2..5]),
        document_number: trim(&line1[5..14]),
        optional_data_1: trim(&line1[15..30]),
        date_of_birth: trim(&line2[0..6]),
        sex: trim(&line2[7..8]),
        date_of_expiry: trim(&line2[8..14]),
        nationality: trim(&line2[15..18]),
        optional_data_2: trim(&line2[18..29]),
        name: parse_name(line3),
    }
}

fn parse_td2(mrz: &str) -> MrzTd2 {
    let line1 = &mrz[0..36];
    let line2 = &mrz[36..72];
    MrzTd2 {
        document_code: trim(&line1[0..2]),
        issuing_state: trim(&line1[2..5]),
        name: parse_name(&line1[5..36]),
        document_number: trim(&line2[0..9]),
        nationality: trim(&line2[10..13]),
        date_of_birth: trim(&line2[13..19]),
        sex: trim(&line2[20..21]),
        date_of_expiry: trim(&line2[21..27]),
        optional_data: trim(&line2[28..35]),
    }
}

fn parse_td3(mrz: &str) -> MrzTd3 {
    let line1 = &mrz[0..44];
    let line2 = &mrz[44..88];
    MrzTd3 {
        document_code: trim(&line1[0..2]),
        issuing_state: trim(&line1[2..5]),
        name: parse_name(&line1[5..44]),
        document_number: trim(&line2[0..9]),
        nationality: trim(&line2[10..13]),
        date_of_birth: trim(&line2[13..19]),
        sex: trim(&line2[20..21]),
        date_of_expiry: trim(&line2[21..27]),
        optional_data: trim(&line2[28..42]),
    }
}
