//! Rank-1 constraint systems: a small builder, the compiled form the prover consumes,
//! and the witness solver.

pub mod builder;
pub mod constraint_system;
pub mod ops;
pub mod solver;
pub mod synthetic;

pub use builder::{BuilderError, ConstraintSystemBuilder};
pub use constraint_system::{CommitmentInfo, ConstraintSystem, HintId, R1CSConstraint};
pub use ops::{Term, Variable, LC};
pub use solver::{solve, HintError, HintOverrides, Solution, SolveError, Witness};
