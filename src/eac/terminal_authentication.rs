//! Terminal Authentication (ICAO 9303-11 §4.7, TA half): the terminal
//! presents a chain of card-verifiable certificates and signs a
//! chip-issued challenge to authorise access to sensitive data groups
//! (typically DG3/DG4).
//!
//! The core never parses CV certificates itself (spec §6) — a host-supplied
//! [`CvCertificateValidator`] extracts the certificate authority/holder
//! references each certificate needs to be framed into an APDU, and a
//! [`TerminalSigner`] produces the final authentication signature. This
//! mirrors how [`super::chip_authentication`] treats the transport: the
//! core drives the exchange, the host supplies domain knowledge it can't
//! reasonably carry.

use {
    super::EacError,
    crate::{
        iso7816::{ApduTransport, Command},
        tlv::{encode_tlv, Tag},
    },
};

const TAG_CAR: Tag = Tag(0x83);
const TAG_CHR: Tag = Tag(0x83);
const TAG_EPHEMERAL_PK: Tag = Tag(0x91);
const TAG_AUX_TEMPLATE: Tag = Tag(0x67);
const TAG_AUX_DATA: Tag = Tag(0x73);

/// The fields of a single card-verifiable certificate this crate needs in
/// order to frame MSE:Set DST / PSO:Verify Certificate APDUs. Produced by a
/// host-supplied [`CvCertificateValidator`] from the certificate's raw
/// bytes; this crate never decodes the CV certificate ASN.1 structure.
pub struct CvCertificateFields {
    /// Certificate Authority Reference: identifies the key that signed this
    /// certificate (already trusted, e.g. the CVCA or a previously-verified
    /// certificate in the chain).
    pub car: Vec<u8>,
    /// Certificate Holder Reference: identifies the key this certificate
    /// introduces.
    pub chr: Vec<u8>,
    /// The certificate body to send in PSO:Verify Certificate, exactly as
    /// it should appear on the wire.
    pub body: Vec<u8>,
}

/// Parses (and, per TR-03110, cryptographically validates) a single
/// card-verifiable certificate's contents. The chip performs its own
/// verification of the chain against its trusted CVCA as each certificate
/// is loaded; this collaborator's job is purely to extract the references
/// this crate needs to address the right key at each step.
pub trait CvCertificateValidator {
    fn parse(&self, certificate: &[u8]) -> Result<CvCertificateFields, EacError>;
}

/// Signs data with the terminal's private key, corresponding to the last
/// certificate in the chain presented to [`run`].
pub trait TerminalSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, EacError>;
}

/// Run Terminal Authentication: verify `certificate_chain` into the chip one
/// certificate at a time (root/CVCA-signed link certificate first, the
/// terminal's own certificate last), then answer the chip's challenge with
/// a signature over it and the PCD's Chip Authentication ephemeral public
/// key (plus any auxiliary authenticated data, e.g. a validity date, the
/// chip itself may require for restricted data group access).
pub fn run(
    transport: &mut impl ApduTransport,
    certificate_chain: &[Vec<u8>],
    ca_ephemeral_public_key: &[u8],
    auxiliary_data: Option<&[u8]>,
    validator: &dyn CvCertificateValidator,
    signer: &dyn TerminalSigner,
) -> Result<(), EacError> {
    let mut terminal_chr = None;
    for certificate in certificate_chain {
        let fields = validator.parse(certificate)?;
        verify_certificate(transport, &fields)?;
        terminal_chr = Some(fields.chr);
    }
    let terminal_chr = terminal_chr.ok_or(EacError::NoCvCertificateChain)?;

    set_at_terminal_authentication(transport, &terminal_chr, ca_ephemeral_public_key, auxiliary_data)?;

    let challenge = get_challenge(transport)?;

    let mut to_sign = Vec::with_capacity(challenge.len() + ca_ephemeral_public_key.len());
    to_sign.extend_from_slice(&challenge);
    to_sign.extend_from_slice(ca_ephemeral_public_key);
    if let Some(aux) = auxiliary_data {
        to_sign.extend_from_slice(aux);
    }
    let signature = signer.sign(&to_sign)?;

    let response = transport
        .transceive(&Command::new(0x00, 0x82, 0x00, 0x00).with_data(signature))
        .map_err(|_| EacError::Transport("EXTERNAL AUTHENTICATE"))?;
    if !response.sw.is_success() {
        return Err(EacError::TerminalRejected(response.sw));
    }
    Ok(())
}

/// MSE:Set DST (select the key a following PSO:Verify Certificate is
/// checked against) followed by PSO:Verify Certificate for one link in the
/// chain.
fn verify_certificate(transport: &mut impl ApduTransport, fields: &CvCertificateFields) -> Result<(), EacError> {
    let mut dst_data = Vec::new();
    encode_tlv(&mut dst_data, TAG_CAR, &fields.car);
    let response = transport
        .transceive(&Command::mse_set_at(0x81, 0xB6, dst_data))
        .map_err(|_| EacError::Transport("MSE:Set DST"))?;
    if !response.sw.is_success() {
        return Err(EacError::TerminalRejected(response.sw));
    }

    let response = transport
        .transceive(&Command::new(0x00, 0x2A, 0x00, 0xBE).with_data(fields.body.clone()))
        .map_err(|_| EacError::Transport("PSO:Verify Certificate"))?;
    if !response.sw.is_success() {
        return Err(EacError::TerminalRejected(response.sw));
    }
    Ok(())
}

/// MSE:Set AT selecting the terminal's own (now chip-verified) key as the
/// one EXTERNAL AUTHENTICATE will be checked against, carrying the CA-phase
/// ephemeral public key and any auxiliary authenticated data the chip
/// requires to authorise the requested access level.
fn set_at_terminal_authentication(
    transport: &mut impl ApduTransport,
    terminal_chr: &[u8],
    ca_ephemeral_public_key: &[u8],
    auxiliary_data: Option<&[u8]>,
) -> Result<(), EacError> {
    let mut data = Vec::new();
    encode_tlv(&mut data, TAG_CHR, terminal_chr);
    encode_tlv(&mut data, TAG_EPHEMERAL_PK, ca_ephemeral_public_key);
    if let Some(aux) = auxiliary_data {
        let mut template = Vec::new();
        encode_tlv(&mut template, TAG_AUX_DATA, aux);
        encode_tlv(&mut data, TAG_AUX_TEMPLATE, &template);
    }

    let response = transport
        .transceive(&Command::mse_set_at(0x81, 0xA4, data))
        .map_err(|_| EacError::Transport("MSE:Set AT"))?;
    if !response.sw.is_success() {
        return Err(EacError::TerminalRejected(response.sw));
    }
    Ok(())
}

fn get_challenge(transport: &mut impl ApduTransport) -> Result<Vec<u8>, EacError> {
    let response = transport
        .transceive(&Command::get_challenge(8))
        .map_err(|_| EacError::Transport("GET CHALLENGE"))?;
    if !response.sw.is_success() {
        return Err(EacError::TerminalRejected(response.sw));
    }
    Ok(response.data)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::iso7816::Response,
        std::collections::VecDeque,
    };

    #[derive(Debug, thiserror::Error)]
    #[error("scripted chip ran out of replies")]
    struct MockError;

    struct ScriptedChip {
        replies: VecDeque<Response>,
        sent:    Vec<Command>,
    }

    impl ApduTransport for ScriptedChip {
        type Error = MockError;

        fn transceive(&mut self, command: &Command) -> Result<Response, Self::Error> {
            self.sent.push(command.clone());
            self.replies.pop_front().ok_or(MockError)
        }
    }

    struct FixedValidator;

    impl CvCertificateValidator for FixedValidator {
        fn parse(&self, certificate: &[u8]) -> Result<CvCertificateFields, EacError> {
            Ok(CvCertificateFields {
                car:  b"CVCAATP00001".to_vec(),
                chr:  b"TERMINAL0001".to_vec(),
                body: certificate.to_vec(),
            })
        }
    }

    struct FixedSigner {
        signature: Vec<u8>,
    }

    impl TerminalSigner for FixedSigner {
        fn sign(&self, _data: &[u8]) -> Result<Vec<u8>, EacError> {
            Ok(self.signature.clone())
        }
    }

    fn ok() -> Response {
        Response::new(vec![], 0x90, 0x00)
    }

    #[test]
    fn test_run_succeeds_and_frames_expected_apdus() {
        let challenge = vec![1u8; 8];
        let mut chip = ScriptedChip {
            replies: VecDeque::from([
                ok(),                                 // MSE:Set DST
                ok(),                                 // PSO:Verify Certificate
                ok(),                                 // MSE:Set AT
                Response::new(challenge.clone(), 0x90, 0x00), // GET CHALLENGE
                ok(),                                 // EXTERNAL AUTHENTICATE
            ]),
            sent: Vec::new(),
        };
        let validator = FixedValidator;
        let signer = FixedSigner {
            signature: vec![0xAB; 64],
        };

        run(
            &mut chip,
            &[b"dummy certificate bytes".to_vec()],
            b"ephemeral-pk-bytes",
            None,
            &validator,
            &signer,
        )
        .unwrap();

        assert_eq!(chip.sent.len(), 5);
        assert_eq!(chip.sent[0].ins, 0x22);
        assert_eq!(chip.sent[0].p1, 0x81);
        assert_eq!(chip.sent[0].p2, 0xB6);
        assert_eq!(chip.sent[1].ins, 0x2A);
        assert_eq!(chip.sent[2].ins, 0x22);
        assert_eq!(chip.sent[2].p1, 0x81);
        assert_eq!(chip.sent[2].p2, 0xA4);
        assert_eq!(chip.sent[3].ins, 0x84);
        assert_eq!(chip.sent[4].ins, 0x82);
        assert_eq!(chip.sent[4].data, vec![0xAB; 64]);
    }

    #[test]
    fn test_run_reports_chip_rejection_of_certificate() {
        let mut chip = ScriptedChip {
            replies: VecDeque::from([ok(), Response::new(vec![], 0x69, 0x85)]),
            sent: Vec::new(),
        };
        let validator = FixedValidator;
        let signer = FixedSigner {
            signature: vec![0xAB; 64],
        };

        let err = run(
            &mut chip,
            &[b"dummy certificate bytes".to_vec()],
            b"ephemeral-pk-bytes",
            None,
            &validator,
            &signer,
        )
        .unwrap_err();
        assert!(matches!(err, EacError::TerminalRejected(_)));
    }

    #[test]
    fn test_run_rejects_empty_chain() {
        let mut chip = ScriptedChip {
            replies: VecDeque::new(),
            sent: Vec::new(),
        };
        let validator = FixedValidator;
        let signer = FixedSigner { signature: vec![] };

        let err = run(&mut chip, &[], b"ephemeral-pk-bytes", None, &validator, &signer).unwrap_err();
        assert!(matches!(err, EacError::NoCvCertificateChain));
    }
}
