use ark_ec::CurveGroup;
use rayon::prelude::*;

pub mod errors;
pub mod math;
pub mod thread;

/// Computes `[s * base for s in scalars]` in affine form.
#[tracing::instrument(skip_all, fields(len = scalars.len()))]
pub fn batch_scalar_mul<G: CurveGroup>(base: G, scalars: &[G::ScalarField]) -> Vec<G::Affine> {
    let projective: Vec<G> = scalars.par_iter().map(|s| base * s).collect();
    G::normalize_batch(&projective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fr, G1Projective};
    use ark_ec::PrimeGroup;

    #[test]
    fn batch_scalar_mul_matches_scalar_mul() {
        let g = G1Projective::generator();
        let scalars = [Fr::from(0u64), Fr::from(1u64), Fr::from(7u64)];
        let points = batch_scalar_mul(g, &scalars);
        for (p, s) in points.iter().zip(scalars.iter()) {
            assert_eq!(*p, (g * s).into_affine());
        }
    }
}
