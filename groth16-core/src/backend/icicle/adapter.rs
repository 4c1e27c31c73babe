//! Point and scalar conversions between arkworks and ICICLE. Arkworks keeps Montgomery
//! form and Jacobian coordinates; ICICLE imports canonical little-endian integers and
//! uses homogeneous projective coordinates.

use ark_bn254::{Fq, Fq2, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, Field, PrimeField};
use icicle_bn254::curve::{CurveCfg, G2CurveCfg, ScalarField};
use icicle_core::curve::{Affine, Curve, Projective};
use icicle_core::traits::FieldImpl;
use rayon::prelude::*;

use crate::backend::montgomery;

pub fn scalar_from_ark(s: &Fr) -> ScalarField {
    ScalarField::from_bytes_le(&s.into_bigint().to_bytes_le())
}

pub fn scalars_from_ark(scalars: &[Fr]) -> Vec<ScalarField> {
    montgomery::from_montgomery(scalars)
        .par_iter()
        .map(|b| ScalarField::from_bytes_le(&b.to_bytes_le()))
        .collect()
}

pub fn scalars_to_ark(scalars: &[ScalarField]) -> Vec<Fr> {
    scalars
        .par_iter()
        .map(|s| Fr::from_le_bytes_mod_order(&s.to_bytes_le()))
        .collect()
}

fn base_field_bytes<F: Field>(x: &F) -> Vec<u8> {
    x.to_base_prime_field_elements()
        .flat_map(|e| e.into_bigint().to_bytes_le())
        .collect()
}

fn fq_from_bytes(bytes: &[u8]) -> Fq {
    Fq::from_le_bytes_mod_order(bytes)
}

fn fq2_from_bytes(bytes: &[u8]) -> Fq2 {
    let (c0, c1) = bytes.split_at(bytes.len() / 2);
    Fq2::new(fq_from_bytes(c0), fq_from_bytes(c1))
}

pub fn g1_from_ark(points: &[G1Affine]) -> Vec<Affine<CurveCfg>> {
    points
        .par_iter()
        .map(|p| match p.xy() {
            Some((x, y)) => Affine::<CurveCfg> {
                x: <CurveCfg as Curve>::BaseField::from_bytes_le(&base_field_bytes(&x)),
                y: <CurveCfg as Curve>::BaseField::from_bytes_le(&base_field_bytes(&y)),
            },
            None => Affine::<CurveCfg>::zero(),
        })
        .collect()
}

pub fn g2_from_ark(points: &[G2Affine]) -> Vec<Affine<G2CurveCfg>> {
    points
        .par_iter()
        .map(|p| match p.xy() {
            Some((x, y)) => Affine::<G2CurveCfg> {
                x: <G2CurveCfg as Curve>::BaseField::from_bytes_le(&base_field_bytes(&x)),
                y: <G2CurveCfg as Curve>::BaseField::from_bytes_le(&base_field_bytes(&y)),
            },
            None => Affine::<G2CurveCfg>::zero(),
        })
        .collect()
}

/// Homogeneous `(X : Y : Z)` to Jacobian `(XZ, YZ², Z)`.
pub fn g1_to_ark(point: &Projective<CurveCfg>) -> G1Projective {
    let x = fq_from_bytes(&point.x.to_bytes_le());
    let y = fq_from_bytes(&point.y.to_bytes_le());
    let z = fq_from_bytes(&point.z.to_bytes_le());
    G1Projective::new_unchecked(x * z, y * z * z, z)
}

pub fn g2_to_ark(point: &Projective<G2CurveCfg>) -> G2Projective {
    let x = fq2_from_bytes(&point.x.to_bytes_le());
    let y = fq2_from_bytes(&point.y.to_bytes_le());
    let z = fq2_from_bytes(&point.z.to_bytes_le());
    G2Projective::new_unchecked(x * z, y * z * z, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::CurveGroup;
    use ark_ff::UniformRand;

    #[test]
    fn scalars_survive_conversion() {
        let mut rng = ark_std::test_rng();
        let scalars: Vec<Fr> = (0..8).map(|_| Fr::rand(&mut rng)).collect();
        assert_eq!(scalars_to_ark(&scalars_from_ark(&scalars)), scalars);
    }

    #[test]
    fn g1_affine_to_projective() {
        let mut rng = ark_std::test_rng();
        let p = G1Projective::rand(&mut rng).into_affine();
        let converted = g1_from_ark(&[p])[0];
        let projective = Projective::<CurveCfg> {
            x: converted.x,
            y: converted.y,
            z: <CurveCfg as Curve>::BaseField::one(),
        };
        assert_eq!(g1_to_ark(&projective).into_affine(), p);
    }
}
