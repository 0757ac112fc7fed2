//! Basic Access Control (spec §4.5, component C5).

use {
    crate::{
        credentials::Credential,
        crypto::{
            cipher::{self, CipherKind},
            kdf,
            mac,
        },
        iso7816::{ApduTransport, Command},
        secure_messaging::{tdes, Wrapper},
    },
    rand::{CryptoRng, RngCore},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum BacError {
    #[error("credential does not carry an MRZ (BAC requires one)")]
    NoMrz,
    #[error("transport error during {0}")]
    Transport(&'static str),
    #[error("GET CHALLENGE did not return 8 bytes")]
    BadChallengeLength,
    #[error(transparent)]
    Crypto(#[from] crate::crypto::error::CryptoError),
    #[error("EXTERNAL AUTHENTICATE response is malformed")]
    MalformedResponse,
    #[error("EXTERNAL AUTHENTICATE MAC verification failed")]
    MacMismatch,
    #[error("chip did not echo our challenge nonce")]
    NonceMismatch,
}

/// Run BAC (spec §4.5 steps 1-5) and return the resulting 3DES secure
/// messaging wrapper.
pub fn run(
    transport: &mut impl ApduTransport,
    credential: &Credential,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<Wrapper, BacError> {
    let seed = credential.bac_key_seed().ok_or(BacError::NoMrz)?;
    let k_enc = kdf::derive(&seed, kdf::COUNTER_ENC, CipherKind::Tdes)?;
    let k_mac = kdf::derive(&seed, kdf::COUNTER_MAC, CipherKind::Tdes)?;

    // Step 1: GET CHALLENGE.
    let challenge = transport
        .transceive(&Command::get_challenge(8))
        .map_err(|_| BacError::Transport("GET CHALLENGE"))?;
    if challenge.data.len() != 8 {
        return Err(BacError::BadChallengeLength);
    }
    let rnd_icc = challenge.data;

    // Step 2: build and encrypt the challenge-response block.
    let mut rnd_ifd = [0u8; 8];
    rng.fill_bytes(&mut rnd_ifd);
    let mut k_ifd = [0u8; 16];
    rng.fill_bytes(&mut k_ifd);

    let mut s = Vec::with_capacity(32);
    s.extend_from_slice(&rnd_ifd);
    s.extend_from_slice(&rnd_icc);
    s.extend_from_slice(&k_ifd);

    let iv = [0u8; 8];
    let e_ifd = cipher::encrypt_cbc_raw(CipherKind::Tdes, &k_enc, &iv, &s)?;
    let m_ifd = mac::mac(CipherKind::Tdes, &k_mac, &e_ifd)?;

    let mut auth_data = e_ifd.clone();
    auth_data.extend_from_slice(&m_ifd);

    // Step 3: EXTERNAL AUTHENTICATE.
    let response = transport
        .transceive(&Command::external_authenticate(auth_data, 40))
        .map_err(|_| BacError::Transport("EXTERNAL AUTHENTICATE"))?;
    if response.data.len() != 40 {
        return Err(BacError::MalformedResponse);
    }
    let e_icc = &response.data[..32];
    let m_icc = &response.data[32..];

    // Step 4: verify and decrypt.
    mac::verify(CipherKind::Tdes, &k_mac, e_icc, m_icc).map_err(|_| BacError::MacMismatch)?;
    let plaintext = cipher::decrypt_cbc_raw(CipherKind::Tdes, &k_enc, &iv, e_icc)?;
    if plaintext.len() != 32 || &plaintext[..8] != rnd_icc.as_slice() || &plaintext[8..16] != rnd_ifd {
        return Err(BacError::NonceMismatch);
    }
    let k_icc = &plaintext[16..32];

    // Step 5: session keys and SSC.
    let mut k_seed_session = [0u8; 16];
    for i in 0..16 {
        k_seed_session[i] = k_ifd[i] ^ k_icc[i];
    }
    let session_k_enc = kdf::derive(&k_seed_session, kdf::COUNTER_ENC, CipherKind::Tdes)?;
    let session_k_mac = kdf::derive(&k_seed_session, kdf::COUNTER_MAC, CipherKind::Tdes)?;

    let mut ssc = Vec::with_capacity(8);
    ssc.extend_from_slice(&rnd_icc[4..8]);
    ssc.extend_from_slice(&rnd_ifd[4..8]);

    Ok(tdes::wrapper_with_ssc(session_k_enc, session_k_mac, ssc))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::iso7816::Response, rand::rngs::OsRng, std::error::Error, std::fmt};

    #[derive(Debug)]
    struct MockError;
    impl fmt::Display for MockError {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "mock transport error")
        }
    }
    impl Error for MockError {}

    /// A mock chip that plays its side of the BAC protocol faithfully,
    /// used to check `run` end-to-end without real hardware.
    struct MockChip {
        k_enc:    Vec<u8>,
        k_mac:    Vec<u8>,
        rnd_icc:  [u8; 8],
        k_icc:    [u8; 16],
    }

    impl ApduTransport for MockChip {
        type Error = MockError;

        fn transceive(&mut self, command: &Command) -> Result<Response, Self::Error> {
            match command.ins {
                0x84 => Ok(Response::new(self.rnd_icc.to_vec(), 0x90, 0x00)),
                0x82 => {
                    let e_ifd = &command.data[..32];
                    let m_ifd = &command.data[32..];
                    mac::verify(CipherKind::Tdes, &self.k_mac, e_ifd, m_ifd).unwrap();
                    let plaintext = cipher::decrypt_cbc_raw(CipherKind::Tdes, &self.k_enc, &[0u8; 8], e_ifd).unwrap();
                    let rnd_ifd = &plaintext[0..8];
                    let mut s = Vec::with_capacity(32);
                    s.extend_from_slice(rnd_ifd);
                    s.extend_from_slice(&self.rnd_icc);
                    s.extend_from_slice(&self.k_icc);
                    let e_icc = cipher::encrypt_cbc_raw(CipherKind::Tdes, &self.k_enc, &[0u8; 8], &s).unwrap();
                    let m_icc = mac::mac(CipherKind::Tdes, &self.k_mac, &e_icc).unwrap();
                    let mut data = e_icc;
                    data.extend_from_slice(&m_icc);
                    Ok(Response::new(data, 0x90, 0x00))
                }
                _ => panic!("unexpected instruction in BAC mock"),
            }
        }
    }

    #[test]
    fn test_bac_end_to_end_with_mock_chip() {
        let credential = Credential::mrz("T22000129", "640812", "101031");
        let seed = credential.bac_key_seed().unwrap();
        let k_enc = kdf::derive(&seed, kdf::COUNTER_ENC, CipherKind::Tdes).unwrap();
        let k_mac = kdf::derive(&seed, kdf::COUNTER_MAC, CipherKind::Tdes).unwrap();
        let mut chip = MockChip {
            k_enc,
            k_mac,
            rnd_icc: [0x11; 8],
            k_icc: [0x22; 16],
        };
        let mut rng = OsRng;
        let wrapper = run(&mut chip, &credential, &mut rng).unwrap();
        assert_eq!(wrapper.cipher_kind(), CipherKind::Tdes);
        assert_eq!(wrapper.ssc().len(), 8);
    }

    #[test]
    fn test_bac_requires_mrz() {
        let credential = Credential::Can("123456".to_string());
        let mut chip = MockChip {
            k_enc: vec![0; 24],
            k_mac: vec![0; 24],
            rnd_icc: [0; 8],
            k_icc: [0; 16],
        };
        let mut rng = OsRng;
        assert!(matches!(run(&mut chip, &credential, &mut rng), Err(BacError::NoMrz)));
    }
}
