//! Groth16 over a pairing engine, extended with BSB22 commitments.
//!
//! ## Flow
//!
//! 1. [`setup`] samples the toxic waste and derives a [`ProvingKey`] / [`VerifyingKey`]
//!    pair for one [`ConstraintSystem`](crate::r1cs::ConstraintSystem).
//! 2. [`prove`] solves the witness and runs the proving pipeline on a
//!    [`Backend`](crate::backend::Backend). The first call per backend and device
//!    uploads the key; the device copy is shared by later calls.
//! 3. [`verify`] recomputes the commitment hashes and checks the pairing equations.
//!
//! ## Commitments
//!
//! A commitment group hides a set of private wires behind a Pedersen commitment `C`
//! whose hash becomes a public-like wire. Each proof carries one `C` per group plus a
//! single folded proof of knowledge checked against the shared `σ`.

mod commitment;
mod config;
mod keys;
mod proof;
mod prover;
mod residency;
mod serialization;
mod setup;
mod verifier;


pub use commitment::{commitment_hash, fold, pok_challenge};
pub use config::{ProverConfig, VerifierConfig};
pub use keys::{
    CommitmentKey, CommitmentVerifyingKey, ProvingKey, ProvingKeyG1, ProvingKeyG2, VerifyingKey,
    VerifyingKeyG1, VerifyingKeyG2,
};
pub use proof::Proof;
pub use prover::prove;
pub use residency::{CommitmentBases, DeviceProvingKey};
pub use serialization::BinaryFormat;
pub use setup::{setup, setup_with_rng};
pub use verifier::verify;
