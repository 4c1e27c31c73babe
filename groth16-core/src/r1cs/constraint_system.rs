use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ark_ff::PrimeField;

use super::solver::HintError;

/// `(wire index, coefficient)` pairs.
pub type SparseLC<F> = Vec<(usize, F)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R1CSConstraint<F: PrimeField> {
    pub a: SparseLC<F>,
    pub b: SparseLC<F>,
    pub c: SparseLC<F>,
}

/// Stable identifier the solver uses to look up a hint, and callers use to override it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HintId {
    /// `[x] -> [1/x]`.
    Inverse,
    /// Hash of commitment group `i`: `[public committed.., private committed..] -> [h]`.
    Commitment(usize),
    Named(&'static str),
}

impl fmt::Display for HintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintId::Inverse => write!(f, "inverse"),
            HintId::Commitment(i) => write!(f, "commitment[{i}]"),
            HintId::Named(name) => write!(f, "{name}"),
        }
    }
}

pub type HintFn<F> = Arc<dyn Fn(&[F]) -> Result<Vec<F>, HintError> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Index into [`ConstraintSystem::constraints`].
    Constraint(usize),
    Hint {
        id: HintId,
        inputs: Vec<usize>,
        outputs: Vec<usize>,
    },
}

/// One BSB22 commitment group. Committed private wires are removed from the prover's
/// `K` basis and committed separately; the commitment's hash becomes a new public-like
/// wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentInfo {
    /// Indices into the extended public vector `[public wires.., earlier commitment wires..]`.
    pub public_committed: Vec<usize>,
    /// Private wire indices, each belonging to at most one group.
    pub private_committed: Vec<usize>,
    /// Wire receiving the hash of this group's commitment.
    pub commitment_wire: usize,
}

/// Compiled rank-1 constraint system with wire layout `[one | public | secret | internal]`.
/// Index 0 is the constant-one wire and counts as public.
#[derive(Clone)]
pub struct ConstraintSystem<F: PrimeField> {
    pub(crate) nb_public: usize,
    pub(crate) nb_secret: usize,
    pub(crate) nb_internal: usize,
    pub(crate) constraints: Vec<R1CSConstraint<F>>,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) commitments: Vec<CommitmentInfo>,
    pub(crate) hints: HashMap<&'static str, HintFn<F>>,
}

impl<F: PrimeField> fmt::Debug for ConstraintSystem<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSystem")
            .field("nb_public", &self.nb_public)
            .field("nb_secret", &self.nb_secret)
            .field("nb_internal", &self.nb_internal)
            .field("nb_constraints", &self.constraints.len())
            .field("commitments", &self.commitments)
            .finish()
    }
}

impl<F: PrimeField> ConstraintSystem<F> {
    /// Public wires including the constant-one wire.
    pub fn nb_public_wires(&self) -> usize {
        self.nb_public
    }

    /// Public inputs supplied by a caller, i.e. without the constant-one wire.
    pub fn nb_public_inputs(&self) -> usize {
        self.nb_public - 1
    }

    pub fn nb_secret_inputs(&self) -> usize {
        self.nb_secret
    }

    pub fn nb_wires(&self) -> usize {
        self.nb_public + self.nb_secret + self.nb_internal
    }

    pub fn nb_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// QAP rows: one per constraint plus one per public wire.
    pub fn nb_rows(&self) -> usize {
        self.constraints.len() + self.nb_public
    }

    pub fn constraints(&self) -> &[R1CSConstraint<F>] {
        &self.constraints
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn commitments(&self) -> &[CommitmentInfo] {
        &self.commitments
    }

    pub fn commitment_wires(&self) -> Vec<usize> {
        self.commitments.iter().map(|c| c.commitment_wire).collect()
    }

    /// Wires whose `K` terms the verifier folds in: public wires, then commitment wires.
    pub fn verifier_k_wires(&self) -> Vec<usize> {
        (0..self.nb_public).chain(self.commitment_wires()).collect()
    }

    /// Wires whose `K` terms the prover's `Krs` MSM covers: every private wire that
    /// neither belongs to nor is produced by a commitment group.
    pub fn prover_k_wires(&self) -> Vec<usize> {
        let mut excluded = vec![false; self.nb_wires()];
        for group in &self.commitments {
            excluded[group.commitment_wire] = true;
            for &w in &group.private_committed {
                excluded[w] = true;
            }
        }
        (self.nb_public..self.nb_wires())
            .filter(|&w| !excluded[w])
            .collect()
    }

    pub(crate) fn hint(&self, name: &str) -> Option<&HintFn<F>> {
        self.hints.get(name)
    }
}

#[cfg(test)]
mod tests {
    use crate::r1cs::ConstraintSystemBuilder;
    use ark_bn254::Fr;

    #[test]
    fn k_wire_partition_around_a_commitment() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let out = builder.public_input();
        let a = builder.secret_input();
        let b = builder.secret_input();
        let c = builder.commit(&[a, b]).unwrap();
        let m = builder.mul(c, a);
        builder.assert_equal(m, out);
        let cs = builder.build().unwrap();

        assert_eq!(cs.nb_public_wires(), 2);
        assert_eq!(cs.nb_secret_inputs(), 2);
        let commitment_wire = cs.commitments()[0].commitment_wire;
        assert_eq!(cs.commitment_wires(), vec![commitment_wire]);
        assert_eq!(cs.verifier_k_wires(), vec![0, 1, commitment_wire]);

        let prover = cs.prover_k_wires();
        let committed = &cs.commitments()[0].private_committed;
        assert_eq!(committed.len(), 2);
        for w in committed.iter().chain([&commitment_wire]) {
            assert!(!prover.contains(w));
        }
        assert_eq!(prover.len(), cs.nb_wires() - cs.nb_public_wires() - 3);
    }
}
