//! Access credentials and the key seeds derived from them (spec §3 "Access
//! credentials", "Key seed").
//!
//! A host application supplies one of these to [`crate::session::Session`];
//! the session picks BAC or PACE and calls the matching seed function.

use sha1::{Digest, Sha1};

/// The sum type spec §3 calls "Access credentials".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    /// MRZ triple, check-digit-augmented before hashing. `date_of_birth`
    /// and `date_of_expiry` are six-digit `YYMMDD` strings.
    Mrz {
        document_number: String,
        date_of_birth:   String,
        date_of_expiry:  String,
    },
    /// Card Access Number, printed on the document, used for PACE.
    Can(String),
    Pin(String),
    Puk(String),
}

impl Credential {
    pub fn mrz(
        document_number: impl Into<String>,
        date_of_birth: impl Into<String>,
        date_of_expiry: impl Into<String>,
    ) -> Self {
        Self::Mrz {
            document_number: document_number.into(),
            date_of_birth:   date_of_birth.into(),
            date_of_expiry:  date_of_expiry.into(),
        }
    }

    /// The MRZ information string BAC/PACE hash: document number (padded to
    /// 9 characters with `<`) plus its check digit, followed by date of
    /// birth and its check digit, followed by date of expiry and its check
    /// digit.
    fn mrz_information(document_number: &str, date_of_birth: &str, date_of_expiry: &str) -> String {
        let mut padded_number = document_number.to_ascii_uppercase();
        while padded_number.len() < 9 {
            padded_number.push('<');
        }
        let mut info = String::new();
        info.push_str(&padded_number);
        info.push_str(&check_digit(&padded_number).to_string());
        info.push_str(date_of_birth);
        info.push_str(&check_digit(date_of_birth).to_string());
        info.push_str(date_of_expiry);
        info.push_str(&check_digit(date_of_expiry).to_string());
        info
    }

    /// BAC key seed (spec §4.5 step 1): `SHA-1(MRZ information)` truncated
    /// to 16 bytes. `None` for non-MRZ credentials — BAC requires an MRZ.
    pub fn bac_key_seed(&self) -> Option<[u8; 16]> {
        let Self::Mrz {
            document_number,
            date_of_birth,
            date_of_expiry,
        } = self
        else {
            return None;
        };
        let info = Self::mrz_information(document_number, date_of_birth, date_of_expiry);
        let digest = Sha1::digest(info.as_bytes());
        let mut seed = [0u8; 16];
        seed.copy_from_slice(&digest[..16]);
        Some(seed)
    }

    /// PACE password seed π (ICAO 9303-11 §9.7.2): the full 20-byte
    /// `SHA-1(MRZ information)` for an MRZ credential, or the credential's
    /// raw digits/characters otherwise.
    pub fn pace_password_seed(&self) -> Vec<u8> {
        match self {
            Self::Mrz {
                document_number,
                date_of_birth,
                date_of_expiry,
            } => {
                let info = Self::mrz_information(document_number, date_of_birth, date_of_expiry);
                Sha1::digest(info.as_bytes()).to_vec()
            }
            Self::Can(s) | Self::Pin(s) | Self::Puk(s) => s.as_bytes().to_vec(),
        }
    }
}

/// ICAO 9303-3 §4.9 check digit: weights cycle 7, 3, 1; `0`-`9` value
/// themselves, `A`-`Z` are `10`-`35`, `<` is `0`; result is the weighted sum
/// mod 10.
pub fn check_digit(data: &str) -> u8 {
    const WEIGHTS: [u32; 3] = [7, 3, 1];
    let sum: u32 = data
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let value = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'A'..='Z' => c as u32 - 'A' as u32 + 10,
                _ => 0,
            };
            value * WEIGHTS[i % 3]
        })
        .sum();
    (sum % 10) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_digit_known_example() {
        // ICAO 9303-3 Appendix A worked example: document number "L898902C3".
        assert_eq!(check_digit("L898902C3"), 6);
    }

    // Spec test S1's MRZ key seed.
    #[test]
    fn test_pace_password_seed_matches_bac_seed_prefix() {
        let cred = Credential::mrz("T22000129", "640812", "101031");
        let seed = cred.pace_password_seed();
        assert_eq!(seed.len(), 20);
        assert_eq!(
            &seed[..],
            hex_literal::hex!("7E2D2A41 C74EA0B3 8CD36F86 3939BFA8 E9032AAD")
        );
        let bac_seed = cred.bac_key_seed().unwrap();
        assert_eq!(&bac_seed[..], &seed[..16]);
    }

    #[test]
    fn test_non_mrz_credential_has_no_bac_seed() {
        assert!(Credential::Can("123456".to_string()).bac_key_seed().is_none());
    }
}
