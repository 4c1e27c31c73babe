use ark_ff::PrimeField;

use super::builder::{BuilderError, ConstraintSystemBuilder};
use super::constraint_system::ConstraintSystem;
use super::solver::Witness;

/// A generated circuit together with a satisfying witness.
pub struct SyntheticCircuit<F: PrimeField> {
    pub cs: ConstraintSystem<F>,
    pub witness: Witness<F>,
    /// Public inputs, without the constant-one wire.
    pub public: Vec<F>,
}

/// `out = x^(nb_mul + 1)` computed by a chain of `nb_mul` multiplications, with `out`
/// public. With `with_commitment`, `x` and the first product are committed and the
/// commitment wire is multiplied into the chain's last value.
pub fn power_chain<F: PrimeField>(
    nb_mul: usize,
    with_commitment: bool,
    x: F,
) -> Result<SyntheticCircuit<F>, BuilderError> {
    let mut builder = ConstraintSystemBuilder::<F>::new();
    let out = builder.public_input();
    let base = builder.secret_input();

    let mut chain = vec![base];
    for _ in 0..nb_mul {
        let next = builder.mul(chain[chain.len() - 1], base);
        chain.push(next);
    }
    let last = chain[chain.len() - 1];
    builder.assert_equal(last, out);

    if with_commitment {
        let commitment = builder.commit(&chain[..chain.len().min(2)])?;
        let _ = builder.mul(last, commitment);
    }

    let public = vec![x.pow([nb_mul as u64 + 1])];
    Ok(SyntheticCircuit {
        cs: builder.build()?,
        witness: Witness::new(public.clone(), vec![x]),
        public,
    })
}
