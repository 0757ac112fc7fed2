//! Extended Access Control: Chip Authentication and Terminal Authentication
//! (ICAO 9303-11 §4.7, spec component C7).
//!
//! Chip Authentication ([`chip_authentication`]) upgrades the secure
//! messaging wrapper established by BAC or PACE to one keyed from an
//! ephemeral ECDH/DH exchange against the chip's long-term public key (read
//! from EF.DG14). Terminal Authentication ([`terminal_authentication`])
//! authorises access to sensitive data groups by presenting a CV-certificate
//! chain and signing a chip-issued challenge; certificate validation and
//! signing are delegated to host-supplied collaborators.

pub mod chip_authentication;
pub mod terminal_authentication;

use {crate::crypto::error::CryptoError, thiserror::Error};

#[derive(Debug, Error)]
pub enum EacError {
    #[error("DG14 does not contain both a ChipAuthenticationInfo and a matching public key")]
    NoChipAuthenticationData,
    #[error("certificate chain presented for terminal authentication is empty")]
    NoCvCertificateChain,
    #[error("chip's public key uses domain parameters this crate does not carry a named curve/group for")]
    UnsupportedDomainParameters,
    #[error("Diffie-Hellman Chip Authentication is not implemented (eMRTDs deployed with EAC use ECDH CA)")]
    UnsupportedKeyAgreement,
    #[error("transport error during {0}")]
    Transport(&'static str),
    #[error("GENERAL AUTHENTICATE response is malformed")]
    MalformedResponse,
    #[error("decoded public key is not a valid point of the chip's domain parameters")]
    InvalidPublicKey,
    #[error("chip rejected chip authentication ({0:?})")]
    ChipRejected(crate::iso7816::StatusWord),
    #[error("terminal authentication was rejected by the chip ({0:?})")]
    TerminalRejected(crate::iso7816::StatusWord),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Tlv(#[from] crate::tlv::TlvError),
}
