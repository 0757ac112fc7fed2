//! ISO/IEC 7816-4 APDU framing: command/response structures, status words,
//! and the [`ApduTransport`] trait a host application implements to talk to
//! a physical (or emulated) chip.
//!
//! Parsing of the wire-level short/extended Lc/Le encoding
//! ([`parse_apdu`]/[`ApduRef`]) is used internally by the secure messaging
//! wrapper to re-frame wrapped APDUs; most callers only need [`Command`] and
//! [`Response`].

mod status_word;

pub use self::status_word::StatusWord;
use thiserror::Error;

/// Errors in the wire-level framing of an APDU byte string.
#[derive(Debug, Error)]
pub enum ApduFramingError {
    #[error("Invalid APDU: Lc is zero.")]
    LcZero,

    #[error("Invalid APDU: Less than 4 bytes.")]
    ApduTooShort,

    #[error("Invalid APDU: Trailing bytes.")]
    ApduTooLong,

    #[error("Invalid Extended APDU: Lc is zero.")]
    ExtendedLcZero,

    #[error("Invalid Extended APDU: Trailing bytes.")]
    ExtendedApduTooLong,
}

#[derive(Debug)]
pub struct ApduRef<'a> {
    pub header: &'a [u8],
    pub lc:     &'a [u8],
    pub data:   &'a [u8],
    pub le:     &'a [u8],
}

impl ApduRef<'_> {
    pub fn cla(&self) -> u8 {
        self.header[0]
    }

    pub fn ins(&self) -> u8 {
        self.header[1]
    }

    pub fn p1(&self) -> u8 {
        self.header[2]
    }

    pub fn p2(&self) -> u8 {
        self.header[3]
    }

    pub fn is_extended_length(&self) -> bool {
        self.lc.len() > 1 || self.le.len() > 1
    }
}

/// Parse APDU into header, Lc, data, and Le.
/// See ISO 7816-4 section 5.2
pub fn parse_apdu(apdu: &[u8]) -> Result<ApduRef, ApduFramingError> {
    let empty = &apdu[0..0];
    Ok(match (apdu.len(), apdu.get(4)) {
        (0..4, _) => return Err(ApduFramingError::ApduTooShort),
        // Short without data and no Le
        (4, None) => ApduRef {
            header: &apdu[..4],
            lc:     empty,
            data:   empty,
            le:     empty,
        },
        // Short without data and with Le
        (5, _) => ApduRef {
            header: &apdu[..4],
            lc:     empty,
            data:   empty,
            le:     &apdu[4..5],
        },
        (6, Some(&0x00)) => return Err(ApduFramingError::LcZero),
        // Extended length, no data
        (7, Some(&0x00)) => ApduRef {
            header: &apdu[..4],
            lc:     empty,
            data:   empty,
            le:     &apdu[4..],
        },
        // Extended length with data and maybe Le
        (_, Some(&0x00)) => {
            let lc = u16::from_be_bytes([apdu[4], apdu[5]]) as usize;
            if lc == 0 {
                return Err(ApduFramingError::ExtendedLcZero);
            }
            if apdu.len() - 7 == lc {
                // Extended length with data and no Le
                ApduRef {
                    header: &apdu[..4],
                    lc:     &apdu[4..7],
                    data:   &apdu[7..],
                    le:     empty,
                }
            } else if apdu.len() - 9 == lc {
                // Extended length with data and Le
                ApduRef {
                    header: &apdu[..4],
                    lc:     &apdu[4..7],
                    data:   &apdu[7..7 + lc],
                    le:     &apdu[7 + lc..],
                }
            } else {
                return Err(ApduFramingError::ExtendedApduTooLong);
            }
        }
        // Short with data and no Le
        (_, Some(&lc)) if apdu.len() - 5 == lc as usize => ApduRef {
            header: &apdu[..4],
            lc:     &apdu[4..5],
            data:   &apdu[5..],
            le:     empty,
        },
        // Short with data and Le
        (_, Some(&lc)) if apdu.len() - 6 == lc as usize => ApduRef {
            header: &apdu[..4],
            lc:     &apdu[4..5],
            data:   &apdu[5..apdu.len() - 1],
            le:     &apdu[apdu.len() - 1..],
        },
        _ => return Err(ApduFramingError::ApduTooLong),
    })
}

/// A command APDU in structured (not yet wire-encoded) form.
///
/// See spec §3 "APDU" and §6 "Commands used".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub cla:  u8,
    pub ins:  u8,
    pub p1:   u8,
    pub p2:   u8,
    pub data: Vec<u8>,
    /// Expected response length. `None` means no data is expected back.
    pub ne:   Option<usize>,
}

impl Command {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            ne: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_ne(mut self, ne: usize) -> Self {
        self.ne = Some(ne);
        self
    }

    pub fn select_aid(aid: &[u8]) -> Self {
        Self::new(0x00, 0xA4, 0x04, 0x0C).with_data(aid)
    }

    pub fn select_ef(file_id: u16) -> Self {
        Self::new(0x00, 0xA4, 0x02, 0x0C).with_data(file_id.to_be_bytes())
    }

    pub fn read_binary(offset: u16, ne: usize) -> Self {
        let [p1, p2] = offset.to_be_bytes();
        Self::new(0x00, 0xB0, p1, p2).with_ne(ne)
    }

    pub fn get_challenge(ne: usize) -> Self {
        Self::new(0x00, 0x84, 0x00, 0x00).with_ne(ne)
    }

    pub fn external_authenticate(data: impl Into<Vec<u8>>, ne: usize) -> Self {
        Self::new(0x00, 0x82, 0x00, 0x00)
            .with_data(data)
            .with_ne(ne)
    }

    pub fn internal_authenticate(data: impl Into<Vec<u8>>, ne: usize) -> Self {
        Self::new(0x00, 0x88, 0x00, 0x00)
            .with_data(data)
            .with_ne(ne)
    }

    pub fn mse_set_at(p1: u8, p2: u8, data: impl Into<Vec<u8>>) -> Self {
        Self::new(0x00, 0x22, p1, p2).with_data(data)
    }

    pub fn general_authenticate(data: impl Into<Vec<u8>>, ne: usize) -> Self {
        Self::new(0x00, 0x86, 0x00, 0x00)
            .with_data(data)
            .with_ne(ne)
    }

    /// Wire-encode this command per ISO/IEC 7816-4 §5.1, picking extended
    /// length encoding only when short form cannot express `data`/`ne`.
    ///
    /// Used by the secure messaging wrapper's tests to check wrapped APDUs
    /// byte-for-byte against worked examples; a real transport typically
    /// does its own framing and need not call this.
    pub fn to_bytes(&self) -> Vec<u8> {
        let extended = self.data.len() > 255 || self.ne.is_some_and(|ne| ne > 256);
        let mut out = vec![self.cla, self.ins, self.p1, self.p2];
        if extended {
            if !self.data.is_empty() {
                out.push(0x00);
                out.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
                out.extend_from_slice(&self.data);
            }
            if let Some(ne) = self.ne {
                if self.data.is_empty() {
                    out.push(0x00);
                }
                let le = if ne >= 65536 { 0 } else { ne as u16 };
                out.extend_from_slice(&le.to_be_bytes());
            }
        } else {
            if !self.data.is_empty() {
                out.push(self.data.len() as u8);
                out.extend_from_slice(&self.data);
            }
            if let Some(ne) = self.ne {
                out.push(if ne >= 256 { 0 } else { ne as u8 });
            }
        }
        out
    }
}

/// A response APDU: trailing data plus the two status bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub data: Vec<u8>,
    pub sw:   StatusWord,
}

impl Response {
    pub fn new(data: Vec<u8>, sw1: u8, sw2: u8) -> Self {
        Self {
            data,
            sw: StatusWord::from(u16::from_be_bytes([sw1, sw2])),
        }
    }
}

/// External collaborator (spec §6): the low-level link to the chip.
///
/// The core never constructs a transport itself; a host application wires
/// one up (USB reader, PC/SC, emulator, recorded trace for tests) and hands
/// it to [`crate::session::Session::open`]. Timeouts are the transport's
/// responsibility — the core adds none of its own (spec §5).
pub trait ApduTransport {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send a command APDU and receive the response. The transport performs
    /// no interpretation of status words beyond relaying them.
    fn transceive(&mut self, command: &Command) -> Result<Response, Self::Error>;
}
