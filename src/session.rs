//! Session orchestrator (spec §4.10, component C10): the one entry point a
//! host application drives end to end. [`Session::open`] runs the access
//! control ladder (PACE preferred, BAC fallback) and selects the eMRTD LDS1
//! applet; [`Session::read_file`]/[`Session::read_cached`] frame file reads
//! once a secure channel exists; [`Session::do_aa`] and [`Session::do_eac`]
//! drive the two optional protocols that build on top of it.
//!
//! The core never constructs an [`ApduTransport`] itself (spec §6) — a host
//! wires one up (PC/SC reader, recorded trace, in-process mock) and hands
//! it to `open`.

use {
    crate::{
        aa::{self, AaError},
        asn1::emrtd::{EfCardAccess, EfSod},
        bac::{self, BacError},
        credentials::Credential,
        eac::{
            chip_authentication::{self, ChipAuthenticationOutcome},
            terminal_authentication::{self, CvCertificateValidator, TerminalSigner},
            EacError,
        },
        iso7816::{ApduTransport, Command, Response, StatusWord},
        lds::{
            self,
            biometric::{BiometricDataGroup, OpaqueBdb},
            LdsError,
        },
        pace::{self, PaceError},
        secure_messaging::{SecureMessaging, SecureMessagingError},
    },
    der::Decode,
    rand::{CryptoRng, RngCore},
    std::collections::HashMap,
    thiserror::Error,
};

/// The LDS1 eMRTD application, selected by AID after access control
/// succeeds (spec §6).
const APPLET_AID: [u8; 7] = [0xA0, 0x00, 0x00, 0x02, 0x47, 0x10, 0x01];

/// A read large enough for every data group this crate knows about, using
/// extended-length READ BINARY — the core does not chunk reads (spec §5:
/// the only blocking point is the transport call, chunking is the
/// transport's concern if its link can't carry this much in one APDU).
const READ_NE: usize = 65536;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bac(#[from] BacError),
    #[error(transparent)]
    Pace(#[from] PaceError),
    #[error(transparent)]
    Eac(#[from] EacError),
    #[error(transparent)]
    Aa(#[from] AaError),
    #[error(transparent)]
    Lds(#[from] LdsError),
    #[error(transparent)]
    SecureMessaging(#[from] SecureMessagingError),
    #[error("malformed EF.CardAccess, EF.DG14, or EF.SOD")]
    Der(#[from] der::Error),
    #[error("transport error during {0}")]
    Transport(&'static str),
    #[error("chip returned an error status during {operation} ({status:?})")]
    CardError {
        operation: &'static str,
        status: StatusWord,
    },
    #[error("no Active Authentication key: EF.DG15 is not present on this document")]
    NoActiveAuthenticationKey,
    #[error("no Chip Authentication data: EF.DG14 is not present on this document")]
    NoChipAuthenticationKey,
}

/// Every file this crate knows how to address, with the literal file
/// identifiers spec §6 lists (note EF.SOD and EF.CardSecurity share
/// `0x011D` in that table; this type follows it verbatim rather than
/// guessing a correction).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileId {
    CardAccess,
    CardSecurity,
    Com,
    Sod,
    Dg1,
    Dg2,
    Dg3,
    Dg4,
    Dg5,
    Dg6,
    Dg7,
    Dg8,
    Dg9,
    Dg10,
    Dg11,
    Dg12,
    Dg13,
    Dg14,
    Dg15,
    Dg16,
}

impl FileId {
    /// All data-group identifiers plus EF.COM/EF.SOD, in ascending file
    /// identifier order, the way a reader walks EF.COM's presence list.
    pub fn iter() -> impl Iterator<Item = FileId> {
        [
            FileId::CardAccess,
            FileId::Com,
            FileId::Dg1,
            FileId::Dg2,
            FileId::Dg3,
            FileId::Dg4,
            FileId::Dg5,
            FileId::Dg6,
            FileId::Dg7,
            FileId::Dg8,
            FileId::Dg9,
            FileId::Dg10,
            FileId::Dg11,
            FileId::Dg12,
            FileId::Dg13,
            FileId::Dg14,
            FileId::Dg15,
            FileId::Dg16,
            FileId::Sod,
            FileId::CardSecurity,
        ]
        .into_iter()
    }

    pub fn identifier(self) -> u16 {
        match self {
            FileId::CardAccess => 0x011C,
            FileId::CardSecurity => 0x011D,
            FileId::Com => 0x011E,
            FileId::Sod => 0x011D,
            FileId::Dg1 => 0x0101,
            FileId::Dg2 => 0x0102,
            FileId::Dg3 => 0x0103,
            FileId::Dg4 => 0x0104,
            FileId::Dg5 => 0x0105,
            FileId::Dg6 => 0x0106,
            FileId::Dg7 => 0x0107,
            FileId::Dg8 => 0x0108,
            FileId::Dg9 => 0x0109,
            FileId::Dg10 => 0x010A,
            FileId::Dg11 => 0x010B,
            FileId::Dg12 => 0x010C,
            FileId::Dg13 => 0x010D,
            FileId::Dg14 => 0x010E,
            FileId::Dg15 => 0x010F,
            FileId::Dg16 => 0x0110,
        }
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A live connection to one eMRTD: an APDU transport, the current secure
/// messaging state, and a per-file read cache (spec §4.10 `readFile`/the
/// implied re-read-without-another-round-trip usage `readCached` covers).
pub struct Session<T: ApduTransport> {
    transport: T,
    sm: Box<dyn SecureMessaging>,
    cache: HashMap<FileId, Vec<u8>>,
}

impl<T: ApduTransport> Session<T> {
    /// Run the access control ladder and select the eMRTD application
    /// (spec §4.10): if EF.CardAccess advertises PACE, attempt it; if PACE
    /// fails with a protocol error (not a transport error), fall back to
    /// BAC. A document with no EF.CardAccess, or one whose SecurityInfos
    /// carry no PaceInfo, goes straight to BAC.
    pub fn open(
        mut transport: T,
        credential: &Credential,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<Self, Error> {
        let pace_info = read_file_raw(&mut transport, FileId::CardAccess)
            .ok()
            .and_then(|bytes| EfCardAccess::from_der(&bytes).ok())
            .and_then(|infos| {
                infos.iter().find_map(|info| match info {
                    crate::asn1::emrtd::security_info::SecurityInfo::Pace(pace) => {
                        Some(pace.clone())
                    }
                    _ => None,
                })
            });

        let sm: Box<dyn SecureMessaging> = if let Some(pace_info) = pace_info {
            match pace::run(&mut transport, credential, &pace_info, rng) {
                Ok(outcome) => Box::new(outcome.wrapper),
                Err(PaceError::Transport(op)) => return Err(Error::Transport(op)),
                Err(_) => Box::new(bac::run(&mut transport, credential, rng)?),
            }
        } else {
            Box::new(bac::run(&mut transport, credential, rng)?)
        };

        let mut session = Self {
            transport,
            sm,
            cache: HashMap::new(),
        };
        session.select_applet()?;
        Ok(session)
    }

    fn select_applet(&mut self) -> Result<(), Error> {
        let response = self.transceive(&Command::select_aid(&APPLET_AID), "SELECT applet")?;
        check_status("SELECT applet", response.sw)
    }

    fn transceive(&mut self, command: &Command, operation: &'static str) -> Result<Response, Error> {
        let wrapped = self.sm.wrap(command)?;
        let raw = self
            .transport
            .transceive(&wrapped)
            .map_err(|_| Error::Transport(operation))?;
        Ok(self.sm.unwrap(&raw)?)
    }

    /// Read a file fresh, bypassing the cache. Returns `Ok(None)` if the
    /// chip reports the file absent (spec §6 `CardError` carve-out every
    /// reader needs for "data group not personalised").
    pub fn read_file(&mut self, file: FileId) -> Result<Option<Vec<u8>>, Error> {
        let select = self.transceive(&Command::select_ef(file.identifier()), "SELECT EF")?;
        if select.sw == StatusWord::FILE_NOT_FOUND {
            return Ok(None);
        }
        check_status("SELECT EF", select.sw)?;

        let read = self.transceive(&Command::read_binary(0, READ_NE), "READ BINARY")?;
        check_status("READ BINARY", read.sw)?;
        Ok(Some(read.data))
    }

    /// Read a file, caching the result so repeated calls (e.g. AA reading
    /// DG15, then a caller reading it again to display it) cost one round
    /// trip.
    pub fn read_cached(&mut self, file: FileId) -> Result<Option<&[u8]>, Error> {
        if !self.cache.contains_key(&file) {
            if let Some(data) = self.read_file(file)? {
                self.cache.insert(file, data);
            }
        }
        Ok(self.cache.get(&file).map(Vec::as_slice))
    }

    /// Run Active Authentication (spec §4.8) against DG15's public key.
    pub fn do_aa(
        &mut self,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<Option<Vec<u8>>, Error> {
        let dg15 = self
            .read_cached(FileId::Dg15)?
            .ok_or(Error::NoActiveAuthenticationKey)?
            .to_vec();
        let key = lds::dg15::decode(&dg15)?;
        Ok(aa::run(&mut AaTransport(self), &key, rng)?)
    }

    /// Run Extended Access Control (spec §4.10 `doEAC`): Chip
    /// Authentication upgrades the wrapper from DG14's public key, then
    /// Terminal Authentication presents `certificate_chain` and answers the
    /// chip's challenge through `signer`.
    pub fn do_eac(
        &mut self,
        certificate_chain: &[Vec<u8>],
        auxiliary_data: Option<&[u8]>,
        validator: &dyn CvCertificateValidator,
        signer: &dyn TerminalSigner,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<(), Error> {
        let dg14 = self
            .read_cached(FileId::Dg14)?
            .ok_or(Error::NoChipAuthenticationKey)?
            .to_vec();
        let security_infos = lds::dg14::decode(&dg14)?.into_inner();

        let ChipAuthenticationOutcome {
            wrapper,
            ephemeral_public_key,
        } = chip_authentication::run(&mut AaTransport(self), &security_infos, rng)?;
        self.sm = Box::new(wrapper);
        self.cache.clear();

        terminal_authentication::run(
            &mut AaTransport(self),
            certificate_chain,
            &ephemeral_public_key,
            auxiliary_data,
            validator,
            signer,
        )?;
        Ok(())
    }

    /// Decode EF.SOD (cached) for a caller that wants the document hash or
    /// per-data-group hash manifest without re-deriving the CMS structure
    /// itself.
    pub fn sod(&mut self) -> Result<Option<EfSod>, Error> {
        match self.read_cached(FileId::Sod)? {
            Some(bytes) => Ok(Some(lds::sod::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode EF.DG2 (cached): the face biometric data group.
    pub fn dg2(&mut self) -> Result<Option<BiometricDataGroup<OpaqueBdb>>, Error> {
        match self.read_cached(FileId::Dg2)? {
            Some(bytes) => Ok(Some(lds::dg2::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode EF.DG3 (cached): the fingerprint biometric data group,
    /// present only once Extended Access Control has upgraded the secure
    /// channel on documents that require it.
    pub fn dg3(&mut self) -> Result<Option<BiometricDataGroup<OpaqueBdb>>, Error> {
        match self.read_cached(FileId::Dg3)? {
            Some(bytes) => Ok(Some(lds::dg3::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode EF.DG4 (cached): the iris biometric data group.
    pub fn dg4(&mut self) -> Result<Option<BiometricDataGroup<OpaqueBdb>>, Error> {
        match self.read_cached(FileId::Dg4)? {
            Some(bytes) => Ok(Some(lds::dg4::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Consume the session, returning the underlying transport (spec §4.10
    /// `close`) — there is no card-side logout command this crate issues;
    /// closing is purely a host-side resource release.
    pub fn close(self) -> T {
        self.transport
    }
}

fn check_status(operation: &'static str, status: StatusWord) -> Result<(), Error> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::CardError { operation, status })
    }
}

/// Reads one file before any [`Session`] exists yet, over a plaintext
/// transport — used only for EF.CardAccess during [`Session::open`].
fn read_file_raw<T: ApduTransport>(transport: &mut T, file: FileId) -> Result<Vec<u8>, Error> {
    let select = transport
        .transceive(&Command::select_ef(file.identifier()))
        .map_err(|_| Error::Transport("SELECT EF"))?;
    check_status("SELECT EF", select.sw)?;

    let read = transport
        .transceive(&Command::read_binary(0, READ_NE))
        .map_err(|_| Error::Transport("READ BINARY"))?;
    check_status("READ BINARY", read.sw)?;
    Ok(read.data)
}

/// Adapts a [`Session`]'s wrap/unwrap-aware `transceive` to the plain
/// [`ApduTransport`] interface [`aa::run`], [`chip_authentication::run`] and
/// [`terminal_authentication::run`] expect, so those protocol modules stay
/// agnostic of whether secure messaging is active.
struct AaTransport<'a, T: ApduTransport>(&'a mut Session<T>);

impl<T: ApduTransport> ApduTransport for AaTransport<'_, T> {
    type Error = Error;

    fn transceive(&mut self, command: &Command) -> Result<Response, Self::Error> {
        self.0.transceive(command, "wrapped exchange")
    }
}
