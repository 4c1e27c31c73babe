use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ark_ff::PrimeField;
use thiserror::Error;

use super::constraint_system::{
    CommitmentInfo, ConstraintSystem, HintFn, HintId, Instruction, R1CSConstraint, SparseLC,
};
use super::ops::{Variable, LC};
use super::solver::HintError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    #[error("Commitment over an empty set of variables")]
    EmptyCommitment,
    #[error("Variable {0:?} is already committed by another group")]
    AlreadyCommitted(Variable),
    #[error("Variable {0:?} was not allocated by this builder")]
    UnknownVariable(Variable),
    #[error("Hint `{0}` registered twice with different arities")]
    HintConflict(&'static str),
}

enum PendingInstruction {
    Constraint(usize),
    Hint {
        id: HintId,
        inputs: Vec<Variable>,
        outputs: Vec<Variable>,
    },
}

struct PendingCommitment {
    public_committed: Vec<Variable>,
    private_committed: Vec<Variable>,
    output: Variable,
}

/// Incrementally builds a [`ConstraintSystem`]. Constraint and hint order is the
/// solving order: every constraint must have at most one wire unknown when the solver
/// reaches it.
pub struct ConstraintSystemBuilder<F: PrimeField> {
    nb_public: usize,
    nb_secret: usize,
    nb_internal: usize,
    constraints: Vec<(LC<F>, LC<F>, LC<F>)>,
    instructions: Vec<PendingInstruction>,
    commitments: Vec<PendingCommitment>,
    commitment_outputs: HashMap<Variable, usize>,
    committed_private: HashSet<Variable>,
    hints: HashMap<&'static str, (usize, HintFn<F>)>,
}

impl<F: PrimeField> Default for ConstraintSystemBuilder<F> {
    fn default() -> Self {
        Self {
            nb_public: 0,
            nb_secret: 0,
            nb_internal: 0,
            constraints: Vec::new(),
            instructions: Vec::new(),
            commitments: Vec::new(),
            commitment_outputs: HashMap::new(),
            committed_private: HashSet::new(),
            hints: HashMap::new(),
        }
    }
}

impl<F: PrimeField> ConstraintSystemBuilder<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one(&self) -> Variable {
        Variable::One
    }

    pub fn public_input(&mut self) -> Variable {
        self.nb_public += 1;
        Variable::Public(self.nb_public - 1)
    }

    pub fn secret_input(&mut self) -> Variable {
        self.nb_secret += 1;
        Variable::Secret(self.nb_secret - 1)
    }

    fn internal(&mut self) -> Variable {
        self.nb_internal += 1;
        Variable::Internal(self.nb_internal - 1)
    }

    /// Adds `a * b == c`.
    pub fn enforce(&mut self, a: impl Into<LC<F>>, b: impl Into<LC<F>>, c: impl Into<LC<F>>) {
        self.constraints.push((a.into(), b.into(), c.into()));
        self.instructions
            .push(PendingInstruction::Constraint(self.constraints.len() - 1));
    }

    pub fn assert_mul(
        &mut self,
        a: impl Into<LC<F>>,
        b: impl Into<LC<F>>,
        c: impl Into<LC<F>>,
    ) {
        self.enforce(a, b, c)
    }

    pub fn assert_equal(&mut self, a: impl Into<LC<F>>, b: impl Into<LC<F>>) {
        self.enforce(a.into() - b.into(), Variable::One, LC::zero())
    }

    /// Returns a fresh variable bound to `a * b`.
    pub fn mul(&mut self, a: impl Into<LC<F>>, b: impl Into<LC<F>>) -> Variable {
        let out = self.internal();
        self.enforce(a, b, out);
        out
    }

    /// Returns a fresh variable bound to the linear combination `lc`.
    pub fn linear(&mut self, lc: impl Into<LC<F>>) -> Variable {
        let out = self.internal();
        self.enforce(lc, Variable::One, out);
        out
    }

    /// Returns `x / y`, solved directly from `out * y == x`. `0 / 0` yields 0.
    pub fn div(&mut self, x: impl Into<LC<F>>, y: impl Into<LC<F>>) -> Variable {
        let out = self.internal();
        self.enforce(out, y, x);
        out
    }

    /// Returns `1 / x`. Unsatisfiable when `x` is zero.
    pub fn inverse(&mut self, x: Variable) -> Variable {
        let out = self.internal();
        self.instructions.push(PendingInstruction::Hint {
            id: HintId::Inverse,
            inputs: vec![x],
            outputs: vec![out],
        });
        self.enforce(x, out, LC::constant(F::ONE));
        out
    }

    /// Calls the registered hint `name` on `inputs`, producing `nb_outputs` unconstrained
    /// variables. The caller is responsible for constraining them.
    pub fn hint<H>(
        &mut self,
        name: &'static str,
        hint: H,
        inputs: &[Variable],
        nb_outputs: usize,
    ) -> Result<Vec<Variable>, BuilderError>
    where
        H: Fn(&[F]) -> Result<Vec<F>, HintError> + Send + Sync + 'static,
    {
        match self.hints.get(name) {
            Some((arity, _)) if *arity != nb_outputs => {
                return Err(BuilderError::HintConflict(name));
            }
            Some(_) => {}
            None => {
                self.hints.insert(name, (nb_outputs, Arc::new(hint)));
            }
        }
        let outputs: Vec<Variable> = (0..nb_outputs).map(|_| self.internal()).collect();
        self.instructions.push(PendingInstruction::Hint {
            id: HintId::Named(name),
            inputs: inputs.to_vec(),
            outputs: outputs.clone(),
        });
        Ok(outputs)
    }

    /// Opens a commitment group over `vars` and returns the variable holding its hash.
    /// Public variables and earlier commitment outputs are committed publicly; every
    /// other variable is committed privately and may belong to one group only.
    pub fn commit(&mut self, vars: &[Variable]) -> Result<Variable, BuilderError> {
        if vars.is_empty() {
            return Err(BuilderError::EmptyCommitment);
        }
        let mut seen = HashSet::new();
        let mut public_committed = Vec::new();
        let mut private_committed = Vec::new();
        for &v in vars {
            if !seen.insert(v) {
                continue;
            }
            match v {
                Variable::One | Variable::Public(_) => public_committed.push(v),
                _ if self.commitment_outputs.contains_key(&v) => public_committed.push(v),
                _ if self.committed_private.contains(&v) => {
                    return Err(BuilderError::AlreadyCommitted(v));
                }
                _ => private_committed.push(v),
            }
        }
        self.committed_private.extend(private_committed.iter().copied());

        let group = self.commitments.len();
        let output = self.internal();
        let inputs = public_committed
            .iter()
            .chain(private_committed.iter())
            .copied()
            .collect();
        self.instructions.push(PendingInstruction::Hint {
            id: HintId::Commitment(group),
            inputs,
            outputs: vec![output],
        });
        self.commitment_outputs.insert(output, group);
        self.commitments.push(PendingCommitment {
            public_committed,
            private_committed,
            output,
        });
        Ok(output)
    }

    fn wire(&self, v: Variable) -> Result<usize, BuilderError> {
        let public = 1 + self.nb_public;
        match v {
            Variable::One => Ok(0),
            Variable::Public(i) if i < self.nb_public => Ok(1 + i),
            Variable::Secret(i) if i < self.nb_secret => Ok(public + i),
            Variable::Internal(i) if i < self.nb_internal => Ok(public + self.nb_secret + i),
            _ => Err(BuilderError::UnknownVariable(v)),
        }
    }

    fn sparse(&self, lc: &LC<F>) -> Result<SparseLC<F>, BuilderError> {
        lc.terms()
            .iter()
            .map(|term| Ok((self.wire(term.0)?, term.1)))
            .collect()
    }

    fn wires(&self, vars: &[Variable]) -> Result<Vec<usize>, BuilderError> {
        vars.iter().map(|&v| self.wire(v)).collect()
    }

    /// Index of `v` in the extended public vector `[public wires.., commitment wires..]`.
    fn extended_public_index(&self, v: Variable) -> Result<usize, BuilderError> {
        match self.commitment_outputs.get(&v) {
            Some(&group) => Ok(1 + self.nb_public + group),
            None => self.wire(v),
        }
    }

    #[tracing::instrument(skip_all, name = "ConstraintSystemBuilder::build")]
    pub fn build(self) -> Result<ConstraintSystem<F>, BuilderError> {
        let constraints = self
            .constraints
            .iter()
            .map(|(a, b, c)| {
                Ok(R1CSConstraint {
                    a: self.sparse(a)?,
                    b: self.sparse(b)?,
                    c: self.sparse(c)?,
                })
            })
            .collect::<Result<Vec<_>, BuilderError>>()?;

        let instructions = self
            .instructions
            .iter()
            .map(|instruction| match instruction {
                PendingInstruction::Constraint(k) => Ok(Instruction::Constraint(*k)),
                PendingInstruction::Hint {
                    id,
                    inputs,
                    outputs,
                } => Ok(Instruction::Hint {
                    id: *id,
                    inputs: self.wires(inputs)?,
                    outputs: self.wires(outputs)?,
                }),
            })
            .collect::<Result<Vec<_>, BuilderError>>()?;

        let commitments = self
            .commitments
            .iter()
            .map(|group| {
                Ok(CommitmentInfo {
                    public_committed: group
                        .public_committed
                        .iter()
                        .map(|&v| self.extended_public_index(v))
                        .collect::<Result<_, BuilderError>>()?,
                    private_committed: self.wires(&group.private_committed)?,
                    commitment_wire: self.wire(group.output)?,
                })
            })
            .collect::<Result<Vec<_>, BuilderError>>()?;

        let cs = ConstraintSystem {
            nb_public: 1 + self.nb_public,
            nb_secret: self.nb_secret,
            nb_internal: self.nb_internal,
            constraints,
            instructions,
            commitments,
            hints: self
                .hints
                .into_iter()
                .map(|(name, (_, hint))| (name, hint))
                .collect(),
        };
        tracing::debug!(
            constraints = cs.nb_constraints(),
            wires = cs.nb_wires(),
            commitments = cs.commitments().len(),
            "built constraint system"
        );
        Ok(cs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn wire_layout() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let s = builder.secret_input();
        let p = builder.public_input();
        let m = builder.mul(p, s);
        let cs = builder.build().unwrap();
        assert_eq!(cs.nb_public_wires(), 2);
        assert_eq!(cs.nb_wires(), 4);
        let c = &cs.constraints()[0];
        assert_eq!(c.a, vec![(1, Fr::from(1u64))]);
        assert_eq!(c.b, vec![(2, Fr::from(1u64))]);
        assert_eq!(c.c, vec![(3, Fr::from(1u64))]);
        assert_eq!(m, Variable::Internal(0));
    }

    #[test]
    fn commitment_groups_partition_wires() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let p = builder.public_input();
        let s0 = builder.secret_input();
        let s1 = builder.secret_input();
        let h0 = builder.commit(&[p, s0]).unwrap();
        let h1 = builder.commit(&[h0, s1]).unwrap();
        let m = builder.mul(s0, s1);
        builder.assert_mul(h0, h1, m);
        assert_eq!(
            builder.commit(&[s0]),
            Err(BuilderError::AlreadyCommitted(s0))
        );
        assert_eq!(builder.commit(&[]), Err(BuilderError::EmptyCommitment));
        let cs = builder.build().unwrap();

        // [one, p, s0, s1, h0, h1, s0*s1]
        assert_eq!(cs.commitments().len(), 2);
        assert_eq!(cs.commitments()[0].public_committed, vec![1]);
        assert_eq!(cs.commitments()[0].private_committed, vec![2]);
        assert_eq!(cs.commitments()[0].commitment_wire, 4);
        // h0 sits at extended public index nbPublic + 0.
        assert_eq!(cs.commitments()[1].public_committed, vec![2]);
        assert_eq!(cs.commitments()[1].private_committed, vec![3]);
        assert_eq!(cs.verifier_k_wires(), vec![0, 1, 4, 5]);
        assert_eq!(cs.prover_k_wires(), vec![6]);
    }

    #[test]
    fn foreign_variable_is_rejected() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let x = builder.secret_input();
        builder.assert_equal(x, Variable::Secret(7));
        assert_eq!(
            builder.build().unwrap_err(),
            BuilderError::UnknownVariable(Variable::Secret(7))
        );
    }
}
