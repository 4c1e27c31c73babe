//! Arkworks keeps field elements in Montgomery form. MSM bucket selection and every
//! accelerator import expect canonical integers, so scalars cross the device boundary
//! stripped.

use ark_ff::PrimeField;
use rayon::prelude::*;

use super::BackendError;

#[tracing::instrument(skip_all, fields(len = scalars.len()))]
pub fn from_montgomery<F: PrimeField>(scalars: &[F]) -> Vec<F::BigInt> {
    scalars.par_iter().map(|s| s.into_bigint()).collect()
}

/// Fails on any integer outside `[0, p)`.
#[tracing::instrument(skip_all, fields(len = bigints.len()))]
pub fn to_montgomery<F: PrimeField>(bigints: &[F::BigInt]) -> Result<Vec<F>, BackendError> {
    bigints
        .par_iter()
        .map(|b| F::from_bigint(*b).ok_or(BackendError::NonCanonicalScalar))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_ff::{BigInteger, UniformRand};

    #[test]
    fn strip_and_restore() {
        let mut rng = ark_std::test_rng();
        let scalars: Vec<Fr> = (0..32).map(|_| Fr::rand(&mut rng)).collect();
        let stripped = from_montgomery(&scalars);
        assert_eq!(to_montgomery::<Fr>(&stripped).unwrap(), scalars);
    }

    #[test]
    fn stripped_small_values_are_plain_integers() {
        let stripped = from_montgomery(&[Fr::from(5u64)]);
        assert_eq!(stripped[0].as_ref()[0], 5);
        assert_eq!(stripped[0].num_bits(), 3);
    }

    #[test]
    fn rejects_non_canonical() {
        let modulus = Fr::MODULUS;
        assert_eq!(
            to_montgomery::<Fr>(&[modulus]),
            Err(BackendError::NonCanonicalScalar)
        );
    }
}
