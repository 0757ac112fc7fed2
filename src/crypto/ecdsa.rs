//! ECDSA signature verification, used by Active Authentication (EC variant)
//! and by terminal authentication's challenge-response step.
//!
//! Restricted to curves whose base field and scalar field share the same
//! `Uint` width (true of every curve in [`super::groups::named`]) so the
//! x-coordinate of a point can be reduced directly into the scalar field.

use {
    super::{
        groups::{EllipticCurve, EllipticCurvePoint},
        mod_ring::{ModRingElementRef, RingRefExt, UintExp, UintMont},
    },
    anyhow::{anyhow, ensure, Result},
    num_traits::Inv,
    subtle::ConditionallySelectable,
};

#[derive(Clone, Debug)]
pub struct ECPublicKey<'g, U>
where
    U: UintMont + UintExp + ConditionallySelectable,
{
    curve: &'g EllipticCurve<U, U>,
    point: EllipticCurvePoint<'g, U, U>,
}

#[derive(Debug, Clone, Copy)]
pub struct ECSignature<'g, U>
where
    U: UintMont + UintExp + ConditionallySelectable,
{
    pub r: ModRingElementRef<'g, U>,
    pub s: ModRingElementRef<'g, U>,
}

impl<'g, U> ECPublicKey<'g, U>
where
    U: UintMont + UintExp + ConditionallySelectable,
{
    pub fn new(curve: &'g EllipticCurve<U, U>, point: EllipticCurvePoint<'g, U, U>) -> Self {
        Self { curve, point }
    }

    pub fn verify(&self, message_hash: &ModRingElementRef<'g, U>, signature: &ECSignature<'g, U>) -> Result<()> {
        let ECSignature { r, s } = *signature;
        ensure!(r.ring() == self.curve.scalar_field());
        ensure!(s.ring() == self.curve.scalar_field());

        // w = s^(-1) mod n
        let w = s.inv().ok_or_else(|| anyhow!("Invalid s value"))?;

        // u1 = e * w mod n, u2 = r * w mod n
        let u1 = *message_hash * w;
        let u2 = r * w;

        // Q' = u1*G + u2*Q
        let q = self.curve.generator() * u1 + self.point * u2;

        let x = q.x().ok_or_else(|| anyhow!("Point at infinity"))?;
        let x_scalar = self.curve.scalar_field().from(x.to_uint());

        ensure!(x_scalar == r, "Invalid ECDSA signature");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::crypto::groups::named::secp256r1, hex_literal::hex, ruint::Uint};

    #[test]
    fn test_ecdsa_p256() {
        // NIST P-256 test vector (FIPS 186-4 example key/signature)
        let curve = secp256r1();
        let qx = Uint::<256, 4>::from_be_bytes(hex!(
            "e424dc61d4bb3cb7ef4344a7f8957a0c5134e16f7a67c074f82e6e12f49abf3"
        ));
        let qy = Uint::<256, 4>::from_be_bytes(hex!(
            "970eed7aa2bc48651545949de1dddaf0127e5965ac85d1243d6f60e7dfaee92"
        ));
        let r = Uint::<256, 4>::from_be_bytes(hex!(
            "bf96b99aa49c705c910be33142017c642ff540c76349b9dab72f981fd9347f4"
        ));
        let s = Uint::<256, 4>::from_be_bytes(hex!(
            "17c55095819089c2e03b9cd415abdf12444e323075d98f31920b9e0f57ec871"
        ));
        let e = Uint::<256, 4>::from_be_bytes(hex!(
            "a41a41a12a799548211c410c65d8133afde34d28bdd542e4b680cf2899c8a8c"
        ));

        let x = curve.base_field().from(qx);
        let y = curve.base_field().from(qy);
        let point = curve.from_affine(x, y).unwrap();
        let pubkey = ECPublicKey::new(&curve, point);

        let signature = ECSignature {
            r: curve.scalar_field().from(r),
            s: curve.scalar_field().from(s),
        };
        let hash = curve.scalar_field().from(e);

        pubkey.verify(&hash, &signature).unwrap();
    }
}
