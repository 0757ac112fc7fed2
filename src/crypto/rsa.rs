//! RSA signature verification.
//!
//! To *not* do: Signing. This will remain verifying only. RSA is a minefield
//! of pitfalls and security issues and no-one should create new signatures
//! using it. See e.g. https://blog.trailofbits.com/2019/07/08/fuck-rsa

use {
    super::mod_ring::{ModRing, ModRingElementRef, RingRefExt, UintMont},
    crate::asn1::public_key_info::SubjectPublicKeyInfo,
    anyhow::{bail, ensure, Error, Result},
    ruint::Uint,
    sha1::{Digest, Sha1},
    subtle::ConstantTimeEq,
};

#[derive(Clone, Debug)]
pub struct RSAPublicKey<U: UintMont> {
    ring:            ModRing<U>,
    public_exponent: U,
}

impl<U: UintMont> RSAPublicKey<U> {
    pub fn modulus_len_bytes(&self) -> usize {
        (self.ring.modulus().bit_len() + 7) / 8
    }

    pub fn verify<'s>(
        &'s self,
        message: ModRingElementRef<'s, U>,
        signature: ModRingElementRef<'s, U>,
    ) -> Result<()> {
        assert_eq!(message.ring(), &self.ring);
        assert_eq!(signature.ring(), &self.ring);
        let expected = signature.pow_ct(self.public_exponent);
        ensure!(
            bool::from(message.ct_eq(&expected)),
            "Invalid RSA signature"
        );
        Ok(())
    }

    /// Verify an ISO/IEC 9796-2 scheme 1 signature with message recovery and
    /// return the recovered message M1, as used by Active Authentication's
    /// RSA variant (ICAO 9303-11 §6.2).
    ///
    /// `non_recoverable` is the trailing part of the signed message that was
    /// not embedded in the signature (M2, empty when the whole challenge
    /// fits in the recoverable part).
    pub fn verify_iso9796_2(&self, signature: &[u8], non_recoverable: &[u8]) -> Result<Vec<u8>> {
        let k = self.modulus_len_bytes();
        ensure!(signature.len() == k, "Signature length does not match modulus");

        let sig_uint = U::from_be_bytes(signature);
        let sig_elem = self.ring.from(sig_uint);
        let recovered_uint = sig_elem.pow_ct(self.public_exponent).to_uint();
        let recovered = recovered_uint.to_be_bytes();
        let mut ir = vec![0u8; k];
        ir[k - recovered.len()..].copy_from_slice(&recovered);

        ensure!(ir[k - 1] == 0xbc, "Invalid ISO 9796-2 trailer byte");
        let header = ir[0];
        ensure!(
            header & 0xc0 == 0x40,
            "Invalid ISO 9796-2 header bits (not partial/full recovery)"
        );

        let hash_len = Sha1::output_size();
        ensure!(k >= 2 + hash_len, "Modulus too small for ISO 9796-2 with SHA-1");
        let m1_len = k - 2 - hash_len;
        let m1 = &ir[1..1 + m1_len];
        let digest = &ir[1 + m1_len..k - 1];

        let mut hasher = Sha1::new();
        hasher.update(m1);
        hasher.update(non_recoverable);
        let expected_digest = hasher.finalize();

        ensure!(
            bool::from(digest.ct_eq(expected_digest.as_slice())),
            "ISO 9796-2 digest mismatch"
        );

        Ok(m1.to_vec())
    }
}

impl<const B: usize, const L: usize> TryFrom<SubjectPublicKeyInfo> for RSAPublicKey<Uint<B, L>> {
    type Error = Error;

    fn try_from(info: SubjectPublicKeyInfo) -> Result<Self> {
        match info {
            SubjectPublicKeyInfo::Rsa(key) => {
                let modulus = Uint::<B, L>::try_from(key.modulus)?;
                Ok(Self {
                    ring:            ModRing::from_modulus(modulus),
                    public_exponent: Uint::<B, L>::try_from(key.public_exponent)?,
                })
            }
            _ => bail!("SubjectPublicKeyInfo is not RSA-variant"),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::crypto::mod_ring::ModRing, ruint::uint};

    // Textbook RSA example (n = 61*53, e = 17, d = 2753): 65^17 mod 3233 ==
    // 2790, so verifying signature 2790 against message 65 must succeed.
    #[test]
    fn test_rsa_verify() {
        let ring = ModRing::from_modulus(uint!(3233_U32));
        let key = RSAPublicKey {
            ring,
            public_exponent: uint!(17_U32),
        };
        let message = ring.from(uint!(65_U32));
        let signature = ring.from(uint!(2790_U32));
        key.verify(message, signature).unwrap();

        let wrong = ring.from(uint!(66_U32));
        assert!(key.verify(wrong, signature).is_err());
    }
}
