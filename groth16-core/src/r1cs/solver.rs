use std::collections::HashMap;

use ark_ff::PrimeField;
use rayon::prelude::*;
use thiserror::Error;

use super::constraint_system::{ConstraintSystem, HintId, Instruction, SparseLC};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HintError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Expected {expected} inputs, got {got}")]
    Arity { expected: usize, got: usize },
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("Constraint #{constraint} is not satisfied")]
    Unsatisfied { constraint: usize },
    #[error("Constraint #{constraint} has more than one unsolved wire")]
    Unsolvable { constraint: usize },
    #[error("Hint {id} reads wire {wire} before it is solved")]
    UnsolvedHintInput { id: HintId, wire: usize },
    #[error("Wire {0} is never assigned")]
    UnassignedWire(usize),
    #[error("No hint registered for {0}")]
    MissingHint(HintId),
    #[error(
        "Invalid witness length, expected {expected_public} public and {expected_secret} secret values but got {got_public} and {got_secret}"
    )]
    WitnessLength {
        expected_public: usize,
        expected_secret: usize,
        got_public: usize,
        got_secret: usize,
    },
    #[error("Hint {id} failed: {source}")]
    Hint {
        id: HintId,
        #[source]
        source: HintError,
    },
    #[error("Hint {id} returned {got} outputs, expected {expected}")]
    HintOutputs {
        id: HintId,
        expected: usize,
        got: usize,
    },
}

/// Assignment to the input wires. `public` excludes the constant-one wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness<F: PrimeField> {
    pub public: Vec<F>,
    pub secret: Vec<F>,
}

impl<F: PrimeField> Witness<F> {
    pub fn new(public: Vec<F>, secret: Vec<F>) -> Self {
        Self { public, secret }
    }

    pub fn public(&self) -> &[F] {
        &self.public
    }
}

/// Solved circuit: every wire value, and per-row evaluations of the `A`, `B`, `C`
/// linear combinations. Rows past the last constraint carry the public wires in `A`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution<F: PrimeField> {
    pub wires: Vec<F>,
    pub a: Vec<F>,
    pub b: Vec<F>,
    pub c: Vec<F>,
}

pub type HintOverride<'a, F> = Box<dyn Fn(&[F]) -> Result<Vec<F>, HintError> + Send + Sync + 'a>;

/// Hint implementations that take precedence over the constraint system's own.
pub struct HintOverrides<'a, F> {
    map: HashMap<HintId, HintOverride<'a, F>>,
}

impl<'a, F> Default for HintOverrides<'a, F> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<'a, F> HintOverrides<'a, F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<H>(&mut self, id: HintId, hint: H)
    where
        H: Fn(&[F]) -> Result<Vec<F>, HintError> + Send + Sync + 'a,
    {
        self.map.insert(id, Box::new(hint));
    }

    pub fn get(&self, id: &HintId) -> Option<&HintOverride<'a, F>> {
        self.map.get(id)
    }
}

fn inverse_hint<F: PrimeField>(inputs: &[F]) -> Result<Vec<F>, HintError> {
    match inputs {
        [x] => x
            .inverse()
            .map(|inv| vec![inv])
            .ok_or(HintError::DivisionByZero),
        _ => Err(HintError::Arity {
            expected: 1,
            got: inputs.len(),
        }),
    }
}

struct Assignment<F> {
    values: Vec<F>,
    solved: Vec<bool>,
}

impl<F: PrimeField> Assignment<F> {
    fn set(&mut self, wire: usize, value: F) {
        self.values[wire] = value;
        self.solved[wire] = true;
    }
}

/// Known part of a linear combination and its unsolved terms.
struct Partial<F> {
    known: F,
    unknown: Vec<(usize, F)>,
}

fn partial<F: PrimeField>(lc: &SparseLC<F>, assignment: &Assignment<F>) -> Partial<F> {
    let mut known = F::zero();
    let mut unknown = Vec::new();
    for &(wire, coeff) in lc {
        if assignment.solved[wire] {
            known += assignment.values[wire] * coeff;
        } else {
            unknown.push((wire, coeff));
        }
    }
    Partial { known, unknown }
}

fn evaluate<F: PrimeField>(lc: &SparseLC<F>, wires: &[F]) -> F {
    lc.iter().map(|&(wire, coeff)| wires[wire] * coeff).sum()
}

fn solve_constraint<F: PrimeField>(
    k: usize,
    cs: &ConstraintSystem<F>,
    assignment: &mut Assignment<F>,
) -> Result<(), SolveError> {
    let constraint = &cs.constraints[k];
    let a = partial(&constraint.a, assignment);
    let b = partial(&constraint.b, assignment);
    let c = partial(&constraint.c, assignment);

    match (a.unknown.len(), b.unknown.len(), c.unknown.len()) {
        (0, 0, 0) => {
            if a.known * b.known == c.known {
                Ok(())
            } else {
                Err(SolveError::Unsatisfied { constraint: k })
            }
        }
        // c_known + coeff·w = a·b
        (0, 0, 1) => {
            let (wire, coeff) = c.unknown[0];
            let inv = coeff.inverse().ok_or(SolveError::Unsolvable { constraint: k })?;
            assignment.set(wire, (a.known * b.known - c.known) * inv);
            Ok(())
        }
        // (known + coeff·w)·other = c
        (1, 0, 0) | (0, 1, 0) => {
            let (unknown, other) = if a.unknown.len() == 1 {
                (&a, b.known)
            } else {
                (&b, a.known)
            };
            let (wire, coeff) = unknown.unknown[0];
            match other.inverse() {
                Some(other_inv) => {
                    let inv = coeff.inverse().ok_or(SolveError::Unsolvable { constraint: k })?;
                    assignment.set(wire, (c.known * other_inv - unknown.known) * inv);
                    Ok(())
                }
                // 0 · w = c only holds for c = 0, and then any w does.
                None if c.known.is_zero() => {
                    assignment.set(wire, F::zero());
                    Ok(())
                }
                None => Err(SolveError::Unsatisfied { constraint: k }),
            }
        }
        _ => Err(SolveError::Unsolvable { constraint: k }),
    }
}

fn run_hint<F: PrimeField>(
    cs: &ConstraintSystem<F>,
    overrides: &HintOverrides<'_, F>,
    id: HintId,
    inputs: &[F],
) -> Result<Vec<F>, SolveError> {
    let result = if let Some(hint) = overrides.get(&id) {
        hint(inputs)
    } else {
        match id {
            HintId::Inverse => inverse_hint(inputs),
            HintId::Named(name) => match cs.hint(name) {
                Some(hint) => hint(inputs),
                None => return Err(SolveError::MissingHint(id)),
            },
            HintId::Commitment(_) => return Err(SolveError::MissingHint(id)),
        }
    };
    result.map_err(|source| SolveError::Hint { id, source })
}

/// Executes the instruction list in order. Each constraint either determines its single
/// unsolved wire or is checked; each hint computes its outputs from solved inputs.
#[tracing::instrument(skip_all, name = "r1cs::solve")]
pub fn solve<F: PrimeField>(
    cs: &ConstraintSystem<F>,
    witness: &Witness<F>,
    overrides: &HintOverrides<'_, F>,
) -> Result<Solution<F>, SolveError> {
    if witness.public.len() != cs.nb_public_inputs()
        || witness.secret.len() != cs.nb_secret_inputs()
    {
        return Err(SolveError::WitnessLength {
            expected_public: cs.nb_public_inputs(),
            expected_secret: cs.nb_secret_inputs(),
            got_public: witness.public.len(),
            got_secret: witness.secret.len(),
        });
    }

    let nb_wires = cs.nb_wires();
    let mut assignment = Assignment {
        values: vec![F::zero(); nb_wires],
        solved: vec![false; nb_wires],
    };
    assignment.set(0, F::one());
    for (i, v) in witness.public.iter().chain(witness.secret.iter()).enumerate() {
        assignment.set(1 + i, *v);
    }

    for instruction in &cs.instructions {
        match instruction {
            Instruction::Constraint(k) => solve_constraint(*k, cs, &mut assignment)?,
            Instruction::Hint {
                id,
                inputs,
                outputs,
            } => {
                let input_values = inputs
                    .iter()
                    .map(|&wire| {
                        if assignment.solved[wire] {
                            Ok(assignment.values[wire])
                        } else {
                            Err(SolveError::UnsolvedHintInput { id: *id, wire })
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let output_values = run_hint(cs, overrides, *id, &input_values)?;
                if output_values.len() != outputs.len() {
                    return Err(SolveError::HintOutputs {
                        id: *id,
                        expected: outputs.len(),
                        got: output_values.len(),
                    });
                }
                for (&wire, value) in outputs.iter().zip(output_values) {
                    assignment.set(wire, value);
                }
            }
        }
    }

    if let Some(wire) = assignment.solved.iter().position(|solved| !solved) {
        return Err(SolveError::UnassignedWire(wire));
    }
    let wires = assignment.values;

    let rows = cs.nb_rows();
    let nb_constraints = cs.nb_constraints();
    let mut a = vec![F::zero(); rows];
    let mut b = vec![F::zero(); rows];
    let mut c = vec![F::zero(); rows];
    a[..nb_constraints]
        .par_iter_mut()
        .zip(b[..nb_constraints].par_iter_mut())
        .zip(c[..nb_constraints].par_iter_mut())
        .zip(cs.constraints.par_iter())
        .for_each(|(((a, b), c), constraint)| {
            *a = evaluate(&constraint.a, &wires);
            *b = evaluate(&constraint.b, &wires);
            *c = evaluate(&constraint.c, &wires);
        });
    a[nb_constraints..].copy_from_slice(&wires[..cs.nb_public]);

    Ok(Solution { wires, a, b, c })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r1cs::builder::ConstraintSystemBuilder;
    use crate::r1cs::ops::LC;
    use ark_bn254::Fr;
    use ark_ff::Field;

    fn product_circuit() -> ConstraintSystem<Fr> {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let a = builder.public_input();
        let b = builder.public_input();
        let res = builder.secret_input();
        builder.assert_mul(a, b, res);
        builder.build().unwrap()
    }

    fn fr(values: &[u64]) -> Vec<Fr> {
        values.iter().map(|v| Fr::from(*v)).collect()
    }

    #[test]
    fn solves_product() {
        let cs = product_circuit();
        let solution = solve(&cs, &Witness::new(fr(&[3, 5]), fr(&[15])), &HintOverrides::new())
            .unwrap();
        assert_eq!(solution.wires, fr(&[1, 3, 5, 15]));
        // one constraint row plus three public rows
        assert_eq!(solution.a, fr(&[3, 1, 3, 5]));
        assert_eq!(solution.b, fr(&[5, 0, 0, 0]));
        assert_eq!(solution.c, fr(&[15, 0, 0, 0]));
    }

    #[test]
    fn rejects_wrong_product() {
        let cs = product_circuit();
        assert_eq!(
            solve(&cs, &Witness::new(fr(&[3, 5]), fr(&[16])), &HintOverrides::new()),
            Err(SolveError::Unsatisfied { constraint: 0 })
        );
    }

    #[test]
    fn rejects_wrong_witness_length() {
        let cs = product_circuit();
        assert!(matches!(
            solve(&cs, &Witness::new(fr(&[3]), fr(&[15])), &HintOverrides::new()),
            Err(SolveError::WitnessLength { .. })
        ));
    }

    #[test]
    fn inverse_hint_and_division_by_zero() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let x = builder.secret_input();
        let inv = builder.inverse(x);
        let doubled = builder.linear(LC::from(inv * Fr::from(2u64)));
        builder.assert_mul(x, doubled, LC::constant(Fr::from(2u64)));
        let cs = builder.build().unwrap();

        let solution = solve(&cs, &Witness::new(vec![], fr(&[4])), &HintOverrides::new()).unwrap();
        assert_eq!(solution.wires[2], Fr::from(4u64).inverse().unwrap());

        assert_eq!(
            solve(&cs, &Witness::new(vec![], fr(&[0])), &HintOverrides::new()),
            Err(SolveError::Hint {
                id: HintId::Inverse,
                source: HintError::DivisionByZero
            })
        );
    }

    #[test]
    fn division_solves_unknown_in_a() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let x = builder.public_input();
        let y = builder.public_input();
        builder.div(x, y);
        let cs = builder.build().unwrap();

        let solution = solve(&cs, &Witness::new(fr(&[21, 3]), vec![]), &HintOverrides::new()).unwrap();
        assert_eq!(solution.wires, fr(&[1, 21, 3, 7]));
        let solution = solve(&cs, &Witness::new(fr(&[0, 0]), vec![]), &HintOverrides::new()).unwrap();
        assert_eq!(solution.wires[3], Fr::from(0u64));
        assert_eq!(
            solve(&cs, &Witness::new(fr(&[1, 0]), vec![]), &HintOverrides::new()),
            Err(SolveError::Unsatisfied { constraint: 0 })
        );
    }

    #[test]
    fn commitment_hint_needs_override() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let x = builder.secret_input();
        let h = builder.commit(&[x]).unwrap();
        builder.mul(h, x);
        let cs = builder.build().unwrap();
        let witness = Witness::new(vec![], fr(&[7]));

        assert_eq!(
            solve(&cs, &witness, &HintOverrides::new()),
            Err(SolveError::MissingHint(HintId::Commitment(0)))
        );

        let mut overrides = HintOverrides::new();
        overrides.insert(HintId::Commitment(0), |inputs: &[Fr]| {
            Ok(vec![inputs[0] + Fr::from(1u64)])
        });
        let solution = solve(&cs, &witness, &overrides).unwrap();
        assert_eq!(solution.wires, fr(&[1, 7, 8, 56]));
    }

    #[test]
    fn named_hint_from_registry() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let x = builder.public_input();
        let out = builder
            .hint("square_plus_one", |v: &[Fr]| Ok(vec![v[0] * v[0] + Fr::from(1u64)]), &[x], 1)
            .unwrap();
        let sq = builder.mul(x, x);
        builder.assert_equal(LC::from(sq) + LC::constant(Fr::from(1u64)), out[0]);
        let cs = builder.build().unwrap();
        assert!(solve(&cs, &Witness::new(fr(&[6]), vec![]), &HintOverrides::new()).is_ok());
    }
}
