use thiserror::Error;

use crate::backend::{BackendError, BackendKind};
use crate::curves::CurveId;
use crate::dag::TaskGraphError;
use crate::r1cs::SolveError;

#[derive(Error, Debug)]
pub enum ProveError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Curve {curve} is not supported by the {backend} backend")]
    UnsupportedCurve { curve: CurveId, backend: BackendKind },
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    TaskGraph(#[from] TaskGraphError),
}

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Curve {curve} is not supported by the {backend} backend")]
    UnsupportedCurve { curve: CurveId, backend: BackendKind },
    #[error("No FFT domain of size >= {0} exists over the scalar field")]
    DomainTooLarge(usize),
    #[error("Secret parameter sampled as zero, retry setup")]
    DegenerateToxicWaste,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Malformed proof: {0}")]
    Malformed(String),
    #[error("Malformed verifying key: {0}")]
    MalformedKey(String),
    #[error("Invalid public witness length, expected {expected} but got {got}")]
    PublicWitnessLength { expected: usize, got: usize },
    #[error("Invalid number of commitments, expected {expected} but got {got}")]
    CommitmentCount { expected: usize, got: usize },
    #[error("Commitment proof of knowledge failed to verify")]
    InvalidCommitmentPok,
    #[error("Pairing check failed -- the proof is invalid")]
    InvalidProof,
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl VerifyError {
    /// True for an honest "no" answer, false when the inputs could not be checked at all.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            VerifyError::InvalidCommitmentPok | VerifyError::InvalidProof
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Failed to load the {backend} backend: {reason}")]
    BackendLoad {
        backend: BackendKind,
        reason: String,
    },
    #[error("No {0} device is available")]
    NoDevice(BackendKind),
    #[error("The {0} backend was not compiled in, rebuild with the matching cargo feature")]
    FeatureDisabled(BackendKind),
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}
