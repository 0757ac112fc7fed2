//! Logical Data Structure file codec (ICAO 9303-10, spec component C9):
//! parsing (and, for the round-trip tests, serialising) the data-group
//! files a passport chip exposes once access control has succeeded.
//!
//! Each file gets its own thin module; [`biometric`] carries the CBEFF
//! machinery `dg2`/`dg3`/`dg4` share, each only naming their own outer file
//! tag and accepted BDB tags. `dg14`/`sod` are deliberately thin —
//! [`crate::asn1::emrtd`] already carries the ASN.1 structures for
//! `SecurityInfos` and the signed data object, so these modules only frame
//! the outer file tag and hand the inner bytes to `der`.

pub mod biometric;
pub mod com;
pub mod dg1;
pub mod dg11;
pub mod dg12;
pub mod dg14;
pub mod dg15;
pub mod dg2;
pub mod dg3;
pub mod dg4;
pub mod sod;

use {crate::tlv::TlvError, thiserror::Error};

/// Errors decoding or encoding an LDS file. `file` names the data group
/// (e.g. `"DG11"`) so callers can report which file failed without the
/// core needing a full `FileId` dependency here.
#[derive(Debug, Error)]
pub enum LdsError {
    #[error("{file}: {source}")]
    Tlv {
        file: &'static str,
        #[source]
        source: TlvError,
    },
    #[error("{file}: {source}")]
    Der {
        file: &'static str,
        #[source]
        source: der::Error,
    },
    #[error("{file}: expected outer tag {expected:#06x}, found {found:#06x}")]
    UnexpectedOuterTag {
        file: &'static str,
        expected: u32,
        found: u32,
    },
    #[error("{file}: MRZ is {len} bytes, which matches no known document type (expected 90, 72, or 88)")]
    UnknownMrzLength { file: &'static str, len: usize },
    #[error("{file}: tag presence list declares {tag:#06x}, but no such field was present in the body")]
    DeclaredTagNotParsed { file: &'static str, tag: u32 },
    #[error("{file}: field {tag:#06x} was present but not declared in the tag presence list")]
    ParsedTagNotDeclared { file: &'static str, tag: u32 },
    #[error("{file}: field {field} is not valid UTF-8")]
    InvalidUtf8 { file: &'static str, field: &'static str },
    #[error("{file}: DG15 public key is neither RSA nor a recognised EC algorithm identifier")]
    UnsupportedDg15Key { file: &'static str },
}

fn tlv_err(file: &'static str) -> impl Fn(TlvError) -> LdsError {
    move |source| LdsError::Tlv { file, source }
}

fn der_err(file: &'static str) -> impl Fn(der::Error) -> LdsError {
    move |source| LdsError::Der { file, source }
}
