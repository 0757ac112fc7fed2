//! Secure Messaging wrapper (spec §4.4, component C4).
//!
//! A [`Wrapper`] holds one session's (K_ENC, K_MAC, cipher-kind, SSC) and
//! turns plaintext [`Command`]s into wrapped ones and wrapped [`Response`]s
//! back into plaintext, per ICAO 9303-11 §9.8. Two thin constructors,
//! [`tdes::wrapper`] and [`aes::wrapper`], cover the two cipher families the
//! way the teacher's `icao9303::secure_messaging` module splits them, but
//! share this module's encode/decode logic instead of duplicating it.

pub mod aes;
pub mod tdes;

use {
    crate::{
        crypto::{cipher, cipher::CipherKind, error::CryptoError, mac},
        iso7816::{Command, Response, StatusWord},
        tlv::{Tag, TlvError, TlvReader, TlvWriter},
    },
    thiserror::Error,
};

const TAG_DO87: Tag = Tag(0x87);
const TAG_DO97: Tag = Tag(0x97);
const TAG_DO99: Tag = Tag(0x99);
const TAG_DO8E: Tag = Tag(0x8E);

#[derive(Debug, Error)]
pub enum SecureMessagingError {
    #[error("wrapper is invalid after a prior failure or a cancelled exchange")]
    Invalid,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("response message authentication code does not match")]
    MacMismatch,
    #[error("response is missing expected secure messaging data objects")]
    MalformedResponse,
    #[error(transparent)]
    Tlv(#[from] TlvError),
}

/// Lifecycle of a [`Wrapper`] (spec §3 "SM Wrapper"): a MAC mismatch,
/// decryption failure, or malformed response is terminal — every later
/// wrap/unwrap on that wrapper fails immediately without touching the SSC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WrapperState {
    Fresh,
    Active,
    Invalid,
}

/// A secure messaging session: a symmetric cipher/MAC key pair, a send
/// sequence counter, and the state machine in spec §3/§4.4.
///
/// Not `Sync`/thread-safe by design (spec §5): a `Session` owns exactly one
/// wrapper and uses it from a single thread of control.
pub struct Wrapper {
    cipher_kind: CipherKind,
    k_enc:       Vec<u8>,
    k_mac:       Vec<u8>,
    ssc:         Vec<u8>,
    state:       WrapperState,
}

impl Wrapper {
    /// Construct a wrapper with SSC = 0, as produced fresh by BAC, PACE, or
    /// an EAC-CA upgrade (spec §4.4 phase 5, §4.5 step 5).
    pub fn new(cipher_kind: CipherKind, k_enc: Vec<u8>, k_mac: Vec<u8>) -> Self {
        Self {
            ssc: vec![0u8; cipher_kind.ssc_len()],
            cipher_kind,
            k_enc,
            k_mac,
            state: WrapperState::Fresh,
        }
    }

    /// Construct a wrapper with an explicit starting SSC, as BAC derives
    /// from the two challenge nonces (spec §4.5 step 5).
    pub fn with_ssc(cipher_kind: CipherKind, k_enc: Vec<u8>, k_mac: Vec<u8>, ssc: Vec<u8>) -> Self {
        assert_eq!(ssc.len(), cipher_kind.ssc_len());
        Self {
            cipher_kind,
            k_enc,
            k_mac,
            ssc,
            state: WrapperState::Fresh,
        }
    }

    pub fn cipher_kind(&self) -> CipherKind {
        self.cipher_kind
    }

    pub fn ssc(&self) -> &[u8] {
        &self.ssc
    }

    fn increment_ssc(&mut self) {
        for byte in self.ssc.iter_mut().rev() {
            let (next, overflow) = byte.overflowing_add(1);
            *byte = next;
            if !overflow {
                break;
            }
        }
    }

    fn check_active(&self) -> Result<(), SecureMessagingError> {
        if self.state == WrapperState::Invalid {
            return Err(SecureMessagingError::Invalid);
        }
        Ok(())
    }

    fn iv(&self) -> Result<Vec<u8>, SecureMessagingError> {
        Ok(match self.cipher_kind {
            CipherKind::Tdes => vec![0u8; 8],
            CipherKind::Aes128 | CipherKind::Aes192 | CipherKind::Aes256 => {
                cipher::encrypt_block(self.cipher_kind, &self.k_enc, &self.ssc)?
            }
        })
    }

    /// ISO 7816-4 padding: `0x80` then zeros up to the next block boundary.
    fn pad(&self, data: &[u8]) -> Vec<u8> {
        let block_len = self.cipher_kind.block_len();
        let mut padded = data.to_vec();
        padded.push(0x80);
        while padded.len() % block_len != 0 {
            padded.push(0x00);
        }
        padded
    }

    /// Wrap a plaintext command APDU (spec §4.4 steps 1-5).
    pub fn wrap(&mut self, command: &Command) -> Result<Command, SecureMessagingError> {
        self.check_active()?;
        match self.try_wrap(command) {
            Ok(wrapped) => Ok(wrapped),
            Err(err) => {
                self.state = WrapperState::Invalid;
                Err(err)
            }
        }
    }

    fn try_wrap(&mut self, command: &Command) -> Result<Command, SecureMessagingError> {
        self.increment_ssc();

        let cla = command.cla | 0x0C;
        let header = [cla, command.ins, command.p1, command.p2];
        let padded_header = self.pad(&header);

        let mut mac_input = self.ssc.clone();
        mac_input.extend_from_slice(&padded_header);

        let mut body = TlvWriter::new();
        if !command.data.is_empty() {
            let iv = self.iv()?;
            let mut value = vec![0x01];
            value.extend_from_slice(&cipher::encrypt_cbc(
                self.cipher_kind,
                &self.k_enc,
                &iv,
                &command.data,
            )?);
            body.write_tlv(TAG_DO87, &value);
        }
        if let Some(ne) = command.ne {
            let value = if ne > 255 {
                (ne as u16).to_be_bytes().to_vec()
            } else {
                vec![ne as u8]
            };
            body.write_tlv(TAG_DO97, &value);
        }
        let body = body.into_bytes();
        mac_input.extend_from_slice(&body);
        let padded_mac_input = self.pad(&mac_input);
        let tag = mac::mac(self.cipher_kind, &self.k_mac, &padded_mac_input)?;

        let mut data = body;
        let mut do8e = Vec::new();
        crate::tlv::encode_tlv(&mut do8e, TAG_DO8E, &tag);
        data.extend_from_slice(&do8e);

        self.state = WrapperState::Active;
        Ok(Command {
            cla,
            ins: command.ins,
            p1: command.p1,
            p2: command.p2,
            data,
            ne: Some(if self.cipher_kind.block_len() == 8 { 256 } else { 65536 }),
        })
    }

    /// Unwrap a response APDU (spec §4.4 "Unwrap").
    pub fn unwrap(&mut self, response: &Response) -> Result<Response, SecureMessagingError> {
        self.check_active()?;
        match self.try_unwrap(response) {
            Ok(unwrapped) => Ok(unwrapped),
            Err(err) => {
                self.state = WrapperState::Invalid;
                Err(err)
            }
        }
    }

    fn try_unwrap(&mut self, response: &Response) -> Result<Response, SecureMessagingError> {
        self.increment_ssc();

        if response.sw == StatusWord::SECURE_MESSAGING_INCOMPLETE
            || response.sw == StatusWord::SECURE_MESSAGING_INCORRECT
        {
            return Err(SecureMessagingError::MalformedResponse);
        }

        let mut reader = TlvReader::new(&response.data);
        let mut do87 = None;
        let mut do99 = None;
        let mut do8e = None;
        let mut mac_body = Vec::new();

        while let Some(tlv) = reader.read_tlv()? {
            match tlv.tag {
                TAG_DO87 => {
                    do87 = Some(tlv.value.to_vec());
                    crate::tlv::encode_tlv(&mut mac_body, tlv.tag, tlv.value);
                }
                TAG_DO99 => {
                    do99 = Some(tlv.value.to_vec());
                    crate::tlv::encode_tlv(&mut mac_body, tlv.tag, tlv.value);
                }
                TAG_DO8E => do8e = Some(tlv.value.to_vec()),
                _ => {}
            }
        }

        let do8e = do8e.ok_or(SecureMessagingError::MalformedResponse)?;
        let mut mac_input = self.ssc.clone();
        mac_input.extend_from_slice(&mac_body);
        let padded_mac_input = self.pad(&mac_input);
        mac::verify(self.cipher_kind, &self.k_mac, &padded_mac_input, &do8e)
            .map_err(|_| SecureMessagingError::MacMismatch)?;

        let data = match do87 {
            Some(value) => {
                let (marker, ciphertext) = value
                    .split_first()
                    .ok_or(SecureMessagingError::MalformedResponse)?;
                if *marker != 0x01 {
                    return Err(SecureMessagingError::MalformedResponse);
                }
                let iv = self.iv()?;
                cipher::decrypt_cbc(self.cipher_kind, &self.k_enc, &iv, ciphertext)?
            }
            None => Vec::new(),
        };

        let sw = match do99 {
            Some(bytes) if bytes.len() == 2 => StatusWord::from(u16::from_be_bytes([
                bytes[0], bytes[1],
            ])),
            _ => response.sw,
        };

        self.state = WrapperState::Active;
        Ok(Response { data, sw })
    }
}

/// A trait object-friendly capability set (spec §9 "two wrapper
/// implementations share a common capability set") for code that doesn't
/// care whether the session is currently plaintext or wrapped.
pub trait SecureMessaging {
    fn wrap(&mut self, command: &Command) -> Result<Command, SecureMessagingError>;
    fn unwrap(&mut self, response: &Response) -> Result<Response, SecureMessagingError>;
}

impl SecureMessaging for Wrapper {
    fn wrap(&mut self, command: &Command) -> Result<Command, SecureMessagingError> {
        Wrapper::wrap(self, command)
    }

    fn unwrap(&mut self, response: &Response) -> Result<Response, SecureMessagingError> {
        Wrapper::unwrap(self, response)
    }
}

/// No secure messaging established yet: used before BAC/PACE complete.
pub struct PlainText;

impl SecureMessaging for PlainText {
    fn wrap(&mut self, command: &Command) -> Result<Command, SecureMessagingError> {
        Ok(command.clone())
    }

    fn unwrap(&mut self, response: &Response) -> Result<Response, SecureMessagingError> {
        Ok(response.clone())
    }
}
