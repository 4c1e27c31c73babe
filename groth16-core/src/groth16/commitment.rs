//! BSB22 commitment hashing and proof-of-knowledge folding.

use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use ark_ff::{PrimeField, Zero};
use ark_serialize::{CanonicalSerialize, SerializationError};

use crate::transcripts::{hash_to_field, FieldHasher, COMMITMENT_DST, COMMITMENT_POK_DST};

/// The value a commitment wire takes: `H(C ‖ public committed values)`.
pub fn commitment_hash<E: Pairing>(
    hasher: &dyn FieldHasher,
    commitment: &E::G1Affine,
    public_committed: &[E::ScalarField],
) -> Result<E::ScalarField, SerializationError> {
    let mut msg = Vec::new();
    commitment.serialize_uncompressed(&mut msg)?;
    for value in public_committed {
        value.serialize_uncompressed(&mut msg)?;
    }
    Ok(hash_to_field(hasher, COMMITMENT_DST, &msg))
}

/// Challenge binding all proofs of knowledge together, derived from the commitment wire
/// values in group order.
pub fn pok_challenge<F: PrimeField>(
    hasher: &dyn FieldHasher,
    commitment_values: &[F],
) -> Result<F, SerializationError> {
    let mut msg = Vec::with_capacity(commitment_values.len() * 32);
    for value in commitment_values {
        value.serialize_uncompressed(&mut msg)?;
    }
    Ok(hash_to_field(hasher, COMMITMENT_POK_DST, &msg))
}

/// `Σ challenge^i · points[i]`.
pub fn fold<G: CurveGroup>(points: &[G], challenge: G::ScalarField) -> G {
    points
        .iter()
        .rev()
        .fold(G::zero(), |acc, point| acc * challenge + point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcripts::Sha3FieldHasher;
    use ark_bn254::{Bn254, Fr, G1Projective};
    use ark_ec::PrimeGroup;

    #[test]
    fn fold_is_power_sum() {
        let g = G1Projective::generator();
        let points = [g, g * Fr::from(2u64), g * Fr::from(3u64)];
        let c = Fr::from(5u64);
        // 1 + 2·5 + 3·25
        assert_eq!(fold(&points, c), g * Fr::from(86u64));
        assert_eq!(fold::<G1Projective>(&[], c), G1Projective::zero());
    }

    #[test]
    fn hash_depends_on_public_values() {
        let c = G1Projective::generator().into_affine();
        let h0 = commitment_hash::<Bn254>(&Sha3FieldHasher, &c, &[Fr::from(1u64)]).unwrap();
        let h1 = commitment_hash::<Bn254>(&Sha3FieldHasher, &c, &[Fr::from(2u64)]).unwrap();
        assert_ne!(h0, h1);
        let challenge = pok_challenge(&Sha3FieldHasher, &[h0]).unwrap();
        assert_ne!(challenge, h0);
    }
}
