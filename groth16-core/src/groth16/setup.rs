use ark_ec::pairing::Pairing;
use ark_ec::PrimeGroup;
use ark_ff::{Field, PrimeField, UniformRand, Zero};
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore, SeedableRng};

use super::keys::{
    CommitmentKey, CommitmentVerifyingKey, ProvingKey, ProvingKeyG1, ProvingKeyG2, VerifyingKey,
    VerifyingKeyG1, VerifyingKeyG2,
};
use super::residency::ResidencyCache;
use crate::poly::FftDomain;
use crate::r1cs::ConstraintSystem;
use crate::utils::batch_scalar_mul;
use crate::utils::errors::SetupError;

const MAX_SAMPLE_ATTEMPTS: usize = 16;

/// The secret scalars of one setup. Dropped as soon as the keys are derived.
struct ToxicWaste<F> {
    alpha: F,
    beta: F,
    gamma: F,
    delta: F,
    tau: F,
    sigma: F,
    rho: F,
}

/// Draws until `accept` holds, giving up after a bounded number of attempts.
fn sample_until<F: UniformRand, R: RngCore>(
    rng: &mut R,
    accept: impl Fn(&F) -> bool,
) -> Result<F, SetupError> {
    (0..MAX_SAMPLE_ATTEMPTS)
        .map(|_| F::rand(rng))
        .find(|x| accept(x))
        .ok_or(SetupError::DegenerateToxicWaste)
}

impl<F: Field> ToxicWaste<F> {
    fn sample<R: RngCore + CryptoRng>(
        rng: &mut R,
        vanishing: impl Fn(F) -> F,
    ) -> Result<Self, SetupError> {
        let nonzero = |x: &F| !x.is_zero();
        Ok(Self {
            alpha: sample_until(rng, nonzero)?,
            beta: sample_until(rng, nonzero)?,
            gamma: sample_until(rng, nonzero)?,
            delta: sample_until(rng, nonzero)?,
            // τ must avoid the evaluation domain, otherwise Z(τ) = 0.
            tau: sample_until(rng, |t: &F| !t.is_zero() && !vanishing(*t).is_zero())?,
            sigma: sample_until(rng, nonzero)?,
            rho: sample_until(rng, nonzero)?,
        })
    }
}

/// Runs a trusted setup for `cs` with fresh OS entropy.
pub fn setup<E: Pairing>(
    cs: &ConstraintSystem<E::ScalarField>,
) -> Result<(ProvingKey<E>, VerifyingKey<E>), SetupError> {
    let mut rng = ChaCha20Rng::from_entropy();
    setup_with_rng(cs, &mut rng)
}

#[tracing::instrument(skip_all, name = "Groth16::setup", fields(
    constraints = cs.nb_constraints(),
    wires = cs.nb_wires(),
))]
pub fn setup_with_rng<E: Pairing, R: RngCore + CryptoRng>(
    cs: &ConstraintSystem<E::ScalarField>,
    rng: &mut R,
) -> Result<(ProvingKey<E>, VerifyingKey<E>), SetupError> {
    let rows = cs.nb_rows();
    let domain =
        FftDomain::<E::ScalarField>::new(rows).ok_or(SetupError::DomainTooLarge(rows))?;
    let toxic = ToxicWaste::sample(rng, |t| domain.evaluate_vanishing_polynomial(t))?;
    let ToxicWaste {
        alpha,
        beta,
        gamma,
        delta,
        tau,
        sigma,
        rho,
    } = toxic;

    let (a_tau, b_tau, c_tau) = evaluate_qap(cs, &domain, tau);
    let nb_wires = cs.nb_wires();

    let gamma_inv = gamma.inverse().ok_or(SetupError::DegenerateToxicWaste)?;
    let delta_inv = delta.inverse().ok_or(SetupError::DegenerateToxicWaste)?;
    let k_value = |w: usize| beta * a_tau[w] + alpha * b_tau[w] + c_tau[w];

    let g1 = E::G1::generator();
    let g2 = E::G2::generator();

    let infinity_a: Vec<bool> = a_tau.iter().map(Zero::is_zero).collect();
    let infinity_b: Vec<bool> = b_tau.iter().map(Zero::is_zero).collect();
    let nonzero_a: Vec<_> = a_tau.iter().copied().filter(|v| !v.is_zero()).collect();
    let nonzero_b: Vec<_> = b_tau.iter().copied().filter(|v| !v.is_zero()).collect();

    let pk_k: Vec<_> = cs
        .prover_k_wires()
        .into_iter()
        .map(|w| k_value(w) * delta_inv)
        .collect();
    let vk_k: Vec<_> = cs
        .verifier_k_wires()
        .into_iter()
        .map(|w| k_value(w) * gamma_inv)
        .collect();

    let z_tau_over_delta = domain.evaluate_vanishing_polynomial(tau) * delta_inv;
    let z_scalars: Vec<_> = std::iter::successors(Some(z_tau_over_delta), |z| Some(*z * tau))
        .take(domain.size() - 1)
        .collect();

    let commitment_keys = cs
        .commitments()
        .iter()
        .map(|group| {
            let basis: Vec<_> = group
                .private_committed
                .iter()
                .map(|&w| k_value(w) * gamma_inv)
                .collect();
            let basis_exp_sigma: Vec<_> = basis.iter().map(|b| *b * sigma).collect();
            CommitmentKey {
                basis: batch_scalar_mul(g1, &basis),
                basis_exp_sigma: batch_scalar_mul(g1, &basis_exp_sigma),
            }
        })
        .collect();

    let pk = ProvingKey {
        domain,
        g1: ProvingKeyG1 {
            alpha: (g1 * alpha).into(),
            beta: (g1 * beta).into(),
            delta: (g1 * delta).into(),
            a: batch_scalar_mul(g1, &nonzero_a),
            b: batch_scalar_mul(g1, &nonzero_b),
            k: batch_scalar_mul(g1, &pk_k),
            z: batch_scalar_mul(g1, &z_scalars),
        },
        g2: ProvingKeyG2 {
            beta: (g2 * beta).into(),
            delta: (g2 * delta).into(),
            b: batch_scalar_mul(g2, &nonzero_b),
        },
        nb_infinity_a: nb_wires - nonzero_a.len(),
        nb_infinity_b: nb_wires - nonzero_b.len(),
        infinity_a,
        infinity_b,
        commitment_keys,
        residency: ResidencyCache::default(),
    };

    let vk = VerifyingKey::new(
        VerifyingKeyG1 {
            alpha: pk.g1.alpha,
            k: batch_scalar_mul(g1, &vk_k),
        },
        VerifyingKeyG2 {
            beta: pk.g2.beta,
            gamma: (g2 * gamma).into(),
            delta: pk.g2.delta,
        },
        CommitmentVerifyingKey {
            g: (g2 * rho).into(),
            g_sigma_neg: (-(g2 * (rho * sigma))).into(),
        },
        cs.commitments()
            .iter()
            .map(|group| group.public_committed.clone())
            .collect(),
    );

    tracing::info!(
        domain = domain.size(),
        infinity_a = pk.nb_infinity_a,
        infinity_b = pk.nb_infinity_b,
        commitments = pk.commitment_keys.len(),
        "setup complete"
    );
    Ok((pk, vk))
}

/// `A_j(τ)`, `B_j(τ)` and `C_j(τ)` for every wire `j`. Row `nb_constraints + j` of `A`
/// holds public wire `j`.
fn evaluate_qap<F: PrimeField>(
    cs: &ConstraintSystem<F>,
    domain: &FftDomain<F>,
    tau: F,
) -> (Vec<F>, Vec<F>, Vec<F>) {
    let lagrange = domain.lagrange_coefficients(tau);
    let nb_wires = cs.nb_wires();
    let mut a = vec![F::zero(); nb_wires];
    let mut b = vec![F::zero(); nb_wires];
    let mut c = vec![F::zero(); nb_wires];

    for (constraint, l) in cs.constraints().iter().zip(lagrange.iter()) {
        for (w, coeff) in &constraint.a {
            a[*w] += *l * coeff;
        }
        for (w, coeff) in &constraint.b {
            b[*w] += *l * coeff;
        }
        for (w, coeff) in &constraint.c {
            c[*w] += *l * coeff;
        }
    }
    for (j, l) in lagrange[cs.nb_constraints()..cs.nb_rows()].iter().enumerate() {
        a[j] += *l;
    }
    (a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r1cs::ConstraintSystemBuilder;
    use ark_ec::AffineRepr;
    use ark_bn254::{Bn254, Fr};

    fn product_circuit() -> ConstraintSystem<Fr> {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let out = builder.public_input();
        let x = builder.secret_input();
        let y = builder.secret_input();
        builder.assert_mul(x, y, out);
        builder.build().unwrap()
    }

    #[test]
    fn key_shapes_match_circuit() {
        let cs = product_circuit();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let (pk, vk) = setup_with_rng::<Bn254, _>(&cs, &mut rng).unwrap();

        // 1 constraint + 2 public rows
        assert_eq!(pk.domain.size(), 4);
        assert_eq!(pk.g1.z.len(), 3);
        pk.check_circuit(&cs).unwrap();
        assert_eq!(pk.g1.k.len(), 2);
        assert_eq!(vk.g1.k.len(), 2);
        // `y` only appears in B, `out` only in C and the public row of A.
        assert!(!pk.infinity_a[2] && pk.infinity_a[3]);
        assert!(!pk.infinity_b[3] && pk.infinity_b[2]);
        assert_eq!(vk.nb_public_wires(), 2);
    }

    #[test]
    fn seeded_setup_is_reproducible() {
        let cs = product_circuit();
        let (pk0, vk0) =
            setup_with_rng::<Bn254, _>(&cs, &mut ChaCha20Rng::seed_from_u64(1)).unwrap();
        let (pk1, vk1) =
            setup_with_rng::<Bn254, _>(&cs, &mut ChaCha20Rng::seed_from_u64(1)).unwrap();
        let (pk2, _) =
            setup_with_rng::<Bn254, _>(&cs, &mut ChaCha20Rng::seed_from_u64(2)).unwrap();
        assert_eq!(pk0, pk1);
        assert_eq!(vk0, vk1);
        assert_ne!(pk0, pk2);
    }

    fn commitment_circuit() -> ConstraintSystem<Fr> {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let p = builder.public_input();
        let a = builder.secret_input();
        let b = builder.secret_input();
        let c = builder.commit(&[p, a, b]).unwrap();
        let m = builder.mul(a + c, b);
        builder.assert_mul(m, c, p);
        builder.build().unwrap()
    }

    /// Pairs of points at the same index never coincide, ignoring identity pairs.
    #[track_caller]
    fn assert_pointwise_distinct<G: AffineRepr>(what: &str, x: &[G], y: &[G]) {
        assert_eq!(x.len(), y.len(), "{what}");
        for (i, (p, q)) in x.iter().zip(y).enumerate() {
            if p.is_zero() && q.is_zero() {
                continue;
            }
            assert_ne!(p, q, "{what}[{i}]");
        }
    }

    #[test]
    fn entropy_setups_share_no_key_material() {
        let cs = commitment_circuit();
        let (pk0, vk0) = setup::<Bn254>(&cs).unwrap();
        let (pk1, vk1) = setup::<Bn254>(&cs).unwrap();

        assert_ne!(pk0.g1.alpha, pk1.g1.alpha);
        assert_ne!(pk0.g1.beta, pk1.g1.beta);
        assert_ne!(pk0.g1.delta, pk1.g1.delta);
        assert_ne!(pk0.g2.beta, pk1.g2.beta);
        assert_ne!(pk0.g2.delta, pk1.g2.delta);
        assert_ne!(vk0.g1.alpha, vk1.g1.alpha);
        assert_ne!(vk0.g2.gamma, vk1.g2.gamma);
        assert_ne!(vk0.commitment_key.g_sigma_neg, vk1.commitment_key.g_sigma_neg);

        assert_pointwise_distinct("g1.a", &pk0.g1.a, &pk1.g1.a);
        assert_pointwise_distinct("g1.b", &pk0.g1.b, &pk1.g1.b);
        assert_pointwise_distinct("g1.k", &pk0.g1.k, &pk1.g1.k);
        assert_pointwise_distinct("g1.z", &pk0.g1.z, &pk1.g1.z);
        assert_pointwise_distinct("g2.b", &pk0.g2.b, &pk1.g2.b);
        assert_pointwise_distinct("vk.g1.k", &vk0.g1.k, &vk1.g1.k);
        assert_eq!(pk0.commitment_keys.len(), 1);
        assert_eq!(pk0.commitment_keys.len(), pk1.commitment_keys.len());
        for (ck0, ck1) in pk0.commitment_keys.iter().zip(&pk1.commitment_keys) {
            assert_pointwise_distinct("basis", &ck0.basis, &ck1.basis);
            assert_pointwise_distinct(
                "basis_exp_sigma",
                &ck0.basis_exp_sigma,
                &ck1.basis_exp_sigma,
            );
        }
    }
}
