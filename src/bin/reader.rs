//! Demo CLI exercising [`icao9303_emrtd::session::Session`] end to end
//! against an in-memory mock chip, rather than real hardware — see the
//! `demo` feature in `Cargo.toml`. The mock chip plays the card side of BAC
//! and secure messaging faithfully (same primitives as the unit tests
//! throughout this crate), then serves a handful of canned data group
//! files.

use {
    anyhow::{Context, Result},
    icao9303_emrtd::{
        credentials::Credential,
        crypto::{
            cipher::{self, CipherKind},
            kdf, mac,
        },
        iso7816::{ApduTransport, Command, Response},
        session::{FileId, Session},
        tlv::{encode_tlv, Tag, TlvReader, TlvWriter},
    },
    rand::rngs::OsRng,
    std::{collections::HashMap, error::Error, fmt},
};

/// ICAO 9303-11 Appendix D.1's BAC worked example, also used by this
/// crate's own BAC unit tests.
const DOCUMENT_NUMBER: &str = "T22000129";
const DATE_OF_BIRTH: &str = "640812";
const DATE_OF_EXPIRY: &str = "101031";

/// The TD3 MRZ worked example `lds::dg1`'s own tests decode, used here only
/// as plausible DG1 content — nothing cross-checks it against the
/// credential above.
const DG1_MRZ: &str =
    "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<L898902C36UTO7408122F1204159ZE184226B<<<<<10";

#[derive(argh::FromArgs)]
/// read an eMRTD over a mock in-memory transport and print its data groups
struct Args {
    /// print each wrapped APDU exchanged after secure messaging starts
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("icao9303_emrtd=debug")
            .init();
    }

    let mut rng = OsRng;
    let credential = Credential::mrz(DOCUMENT_NUMBER, DATE_OF_BIRTH, DATE_OF_EXPIRY);
    let chip = MockChip::new(&credential);

    let mut session = Session::open(chip, &credential, &mut rng).context("opening session")?;

    for file in FileId::iter() {
        match session.read_cached(file) {
            Ok(Some(data)) => println!("{file}: {} bytes: {}", data.len(), hex::encode(data)),
            Ok(None) => println!("{file}: not present"),
            Err(e) => eprintln!("{file}: {e}"),
        }
    }

    if let Some(sod) = session.sod()? {
        println!("document hash = 0x{}", hex::encode(sod.document_hash()));
    }

    Ok(())
}

#[derive(Debug)]
struct MockError;
impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "mock transport error")
    }
}
impl Error for MockError {}

/// Plays the card side of BAC, then of secure messaging, against whatever
/// [`Session`] sends it. Files not in `files` are reported `FILE_NOT_FOUND`,
/// including `EF.CardAccess` — this mock only speaks BAC, so `Session::open`
/// always falls through to it.
struct MockChip {
    k_enc: Vec<u8>,
    k_mac: Vec<u8>,
    rnd_icc: [u8; 8],
    k_icc: [u8; 16],
    sm: Option<SmState>,
    selected_file: Option<u16>,
    files: HashMap<u16, Vec<u8>>,
}

struct SmState {
    k_enc: Vec<u8>,
    k_mac: Vec<u8>,
    ssc: Vec<u8>,
}

const TAG_DO87: Tag = Tag(0x87);
const TAG_DO97: Tag = Tag(0x97);
const TAG_DO99: Tag = Tag(0x99);
const TAG_DO8E: Tag = Tag(0x8E);
const APPLET_AID: [u8; 7] = [0xA0, 0x00, 0x00, 0x02, 0x47, 0x10, 0x01];

impl MockChip {
    fn new(credential: &Credential) -> Self {
        let seed = credential.bac_key_seed().expect("demo credential carries an MRZ");
        let k_enc = kdf::derive(&seed, kdf::COUNTER_ENC, CipherKind::Tdes).unwrap();
        let k_mac = kdf::derive(&seed, kdf::COUNTER_MAC, CipherKind::Tdes).unwrap();

        let mut dg1 = Vec::new();
        encode_tlv(&mut dg1, Tag(0x5F1F), DG1_MRZ.as_bytes());
        let mut dg1_file = Vec::new();
        encode_tlv(&mut dg1_file, Tag(0x61), &dg1);

        let mut com = Vec::new();
        encode_tlv(&mut com, Tag(0x5F01), b"0107");
        encode_tlv(&mut com, Tag(0x5F36), b"040000");
        encode_tlv(&mut com, Tag(0x5C), &[0x61]);
        let mut com_file = Vec::new();
        encode_tlv(&mut com_file, Tag(0x60), &com);

        let mut files = HashMap::new();
        files.insert(FileId::Com.identifier(), com_file);
        files.insert(FileId::Dg1.identifier(), dg1_file);

        Self {
            k_enc,
            k_mac,
            rnd_icc: [0x11; 8],
            k_icc: [0x22; 16],
            sm: None,
            selected_file: None,
            files,
        }
    }

    fn handle_plain(&mut self, command: &Command) -> Response {
        match command.ins {
            0x84 => Response::new(self.rnd_icc.to_vec(), 0x90, 0x00),
            0x82 => {
                let e_ifd = &command.data[..32];
                let m_ifd = &command.data[32..];
                mac::verify(CipherKind::Tdes, &self.k_mac, e_ifd, m_ifd)
                    .expect("demo credential's key is correct by construction");
                let plaintext =
                    cipher::decrypt_cbc_raw(CipherKind::Tdes, &self.k_enc, &[0u8; 8], e_ifd).unwrap();
                let rnd_ifd = &plaintext[0..8];
                let k_ifd = &plaintext[16..32];

                let mut seed = [0u8; 16];
                for i in 0..16 {
                    seed[i] = k_ifd[i] ^ self.k_icc[i];
                }
                let session_k_enc = kdf::derive(&seed, kdf::COUNTER_ENC, CipherKind::Tdes).unwrap();
                let session_k_mac = kdf::derive(&seed, kdf::COUNTER_MAC, CipherKind::Tdes).unwrap();
                let mut ssc = Vec::with_capacity(8);
                ssc.extend_from_slice(&self.rnd_icc[4..8]);
                ssc.extend_from_slice(&rnd_ifd[4..8]);
                self.sm = Some(SmState {
                    k_enc: session_k_enc,
                    k_mac: session_k_mac,
                    ssc,
                });

                let mut s = Vec::with_capacity(32);
                s.extend_from_slice(rnd_ifd);
                s.extend_from_slice(&self.rnd_icc);
                s.extend_from_slice(&self.k_icc);
                let e_icc = cipher::encrypt_cbc_raw(CipherKind::Tdes, &self.k_enc, &[0u8; 8], &s).unwrap();
                let m_icc = mac::mac(CipherKind::Tdes, &self.k_mac, &e_icc).unwrap();
                let mut data = e_icc;
                data.extend_from_slice(&m_icc);
                Response::new(data, 0x90, 0x00)
            }
            0xA4 => Response::new(Vec::new(), 0x6A, 0x82),
            _ => Response::new(Vec::new(), 0x6D, 0x00),
        }
    }

    /// Run the card's half of one wrapped exchange: unwrap, dispatch on the
    /// plaintext command, wrap the plaintext reply. Mirrors
    /// `secure_messaging::Wrapper`'s framing in the opposite direction.
    fn handle_wrapped(&mut self, command: &Command) -> Response {
        let sm = self.sm.as_mut().expect("wrapped exchange before secure messaging is active");
        increment_ssc(&mut sm.ssc);

        let mut reader = TlvReader::new(&command.data);
        let mut do87 = None;
        let mut do97 = None;
        let mut do8e = None;
        let mut mac_body = Vec::new();
        while let Some(tlv) = reader.read_tlv().expect("demo APDUs are well-formed") {
            match tlv.tag {
                TAG_DO87 => {
                    do87 = Some(tlv.value.to_vec());
                    encode_tlv(&mut mac_body, tlv.tag, tlv.value);
                }
                TAG_DO97 => {
                    do97 = Some(tlv.value.to_vec());
                    encode_tlv(&mut mac_body, tlv.tag, tlv.value);
                }
                TAG_DO8E => do8e = Some(tlv.value.to_vec()),
                _ => {}
            }
        }

        let mut mac_input = sm.ssc.clone();
        mac_input.extend_from_slice(&pad8(&[command.cla, command.ins, command.p1, command.p2]));
        mac_input.extend_from_slice(&mac_body);
        mac::verify(CipherKind::Tdes, &sm.k_mac, &pad8(&mac_input), &do8e.expect("DO8E present"))
            .expect("demo session keys agree by construction");

        let plaintext = do87.map(|value| {
            let (marker, ciphertext) = value.split_first().expect("DO87 carries a marker byte");
            assert_eq!(*marker, 0x01, "only plain (uncompressed) DO87 values are used in this crate");
            cipher::decrypt_cbc(CipherKind::Tdes, &sm.k_enc, &[0u8; 8], ciphertext).unwrap()
        });
        let ne = do97.map(|bytes| match bytes.len() {
            1 => bytes[0] as usize,
            _ => u16::from_be_bytes([bytes[0], bytes[1]]) as usize,
        });

        let (response_data, sw1, sw2) =
            self.dispatch(command.ins, command.p1, command.p2, plaintext.as_deref(), ne);

        let sm = self.sm.as_mut().expect("secure messaging stays active for the reply");
        increment_ssc(&mut sm.ssc);

        let mut body = TlvWriter::new();
        if !response_data.is_empty() {
            let ciphertext =
                cipher::encrypt_cbc(CipherKind::Tdes, &sm.k_enc, &[0u8; 8], &response_data).unwrap();
            let mut value = vec![0x01];
            value.extend_from_slice(&ciphertext);
            body.write_tlv(TAG_DO87, &value);
        }
        body.write_tlv(TAG_DO99, &[sw1, sw2]);
        let body = body.into_bytes();

        let mut mac_input = sm.ssc.clone();
        mac_input.extend_from_slice(&body);
        let tag = mac::mac(CipherKind::Tdes, &sm.k_mac, &pad8(&mac_input)).unwrap();

        let mut data = body;
        encode_tlv(&mut data, TAG_DO8E, &tag);
        Response::new(data, 0x90, 0x00)
    }

    fn dispatch(
        &mut self,
        ins: u8,
        p1: u8,
        _p2: u8,
        plaintext: Option<&[u8]>,
        _ne: Option<usize>,
    ) -> (Vec<u8>, u8, u8) {
        match ins {
            0xA4 if p1 == 0x04 => {
                if plaintext == Some(APPLET_AID.as_slice()) {
                    (Vec::new(), 0x90, 0x00)
                } else {
                    (Vec::new(), 0x6A, 0x82)
                }
            }
            0xA4 => {
                let data = plaintext.unwrap_or_default();
                let file_id = u16::from_be_bytes([data[0], data[1]]);
                if self.files.contains_key(&file_id) {
                    self.selected_file = Some(file_id);
                    (Vec::new(), 0x90, 0x00)
                } else {
                    self.selected_file = None;
                    (Vec::new(), 0x6A, 0x82)
                }
            }
            0xB0 => match self.selected_file.and_then(|id| self.files.get(&id)) {
                Some(data) => (data.clone(), 0x90, 0x00),
                None => (Vec::new(), 0x6A, 0x82),
            },
            _ => (Vec::new(), 0x6D, 0x00),
        }
    }
}

impl ApduTransport for MockChip {
    type Error = MockError;

    fn transceive(&mut self, command: &Command) -> Result<Response, Self::Error> {
        if command.cla & 0x0C == 0x0C {
            Ok(self.handle_wrapped(command))
        } else {
            Ok(self.handle_plain(command))
        }
    }
}

fn increment_ssc(ssc: &mut [u8]) {
    for byte in ssc.iter_mut().rev() {
        let (next, overflow) = byte.overflowing_add(1);
        *byte = next;
        if !overflow {
            break;
        }
    }
}

/// ISO 7816-4 padding: `0x80` then zeros up to the next 8-byte boundary
/// (this mock only ever runs the 3DES/BAC suite) — used only for MAC input
/// framing; DO87 payloads are handed to `cipher::encrypt_cbc`/`decrypt_cbc`
/// unpadded, which pad/unpad internally.
fn pad8(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.push(0x80);
    while out.len() % 8 != 0 {
        out.push(0x00);
    }
    out
}
