//! Device primitives the prove pipeline is written against.
//!
//! A [`Backend`] owns the memory model of one physical device: bases and scalars are
//! copied to the device once, and every MSM, NTT and vector operation consumes and
//! produces device handles. [`CpuBackend`] is always available; `IcicleBackend` is
//! compiled in with the `icicle` feature.

use std::fmt;

use ark_ec::pairing::Pairing;
use thiserror::Error;

use crate::dag::Schedule;
use crate::poly::FftDomain;

pub mod context;
pub mod cpu;
pub mod montgomery;

#[cfg(feature = "icicle")]
pub mod icicle;

pub use context::{AcceleratorConfig, AcceleratorContext};
pub use cpu::CpuBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Cpu,
    Icicle,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cpu => write!(f, "cpu"),
            BackendKind::Icicle => write!(f, "icicle"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Device allocation of {len} elements failed: {reason}")]
    Allocation { len: usize, reason: String },
    #[error("Selecting device {device} failed: {reason}")]
    Device { device: usize, reason: String },
    #[error("Host/device transfer failed: {0}")]
    Transfer(String),
    #[error("MSM failed: {0}")]
    Msm(String),
    #[error("NTT failed: {0}")]
    Ntt(String),
    #[error("Vector operation failed: {0}")]
    VecOp(String),
    #[error("Length mismatch: {0} vs {1}")]
    LengthMismatch(usize, usize),
    #[error("NTT domain of size {0} is not supported")]
    UnsupportedDomain(usize),
    #[error("Scalar is not in canonical form")]
    NonCanonicalScalar,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NttDirection {
    /// Coefficients to evaluations.
    Forward,
    /// Evaluations to coefficients.
    Inverse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VecOp {
    Mul,
    Sub,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NttConfig<F> {
    /// Evaluate over `coset_gen · H` instead of `H`.
    pub coset_gen: Option<F>,
}

impl<F> Default for NttConfig<F> {
    fn default() -> Self {
        Self { coset_gen: None }
    }
}

impl<F> NttConfig<F> {
    pub fn coset(coset_gen: F) -> Self {
        Self {
            coset_gen: Some(coset_gen),
        }
    }
}

/// One physical backend for pairing engine `E`.
///
/// MSMs consume the common prefix of `scalars` and `bases`, so a base vector may be
/// longer or shorter than the scalars it is paired with.
pub trait Backend<E: Pairing>: Send + Sync {
    type G1Bases: Send + Sync + 'static;
    type G2Bases: Send + Sync + 'static;
    type Scalars: Send + Sync + 'static;

    fn kind(&self) -> BackendKind;

    fn device_id(&self) -> usize;

    /// Schedule the prove pipeline uses unless the caller overrides it.
    fn default_schedule(&self) -> Schedule;

    /// Runs `task` bound to this backend's device on the current worker thread.
    fn run_on_device<R>(&self, task: impl FnOnce() -> R) -> R;

    fn copy_g1_to_device(&self, host: &[E::G1Affine]) -> Result<Self::G1Bases, BackendError>;

    fn copy_g2_to_device(&self, host: &[E::G2Affine]) -> Result<Self::G2Bases, BackendError>;

    fn copy_scalars_to_device(
        &self,
        host: &[E::ScalarField],
    ) -> Result<Self::Scalars, BackendError>;

    fn copy_scalars_to_host(
        &self,
        device: &Self::Scalars,
    ) -> Result<Vec<E::ScalarField>, BackendError>;

    /// Makes `domain` usable by [`Backend::ntt`]. Called once per residency build.
    fn prepare_ntt_domain(&self, domain: &FftDomain<E::ScalarField>) -> Result<(), BackendError>;

    fn msm_g1(
        &self,
        scalars: &Self::Scalars,
        bases: &Self::G1Bases,
    ) -> Result<E::G1, BackendError>;

    fn msm_g2(
        &self,
        scalars: &Self::Scalars,
        bases: &Self::G2Bases,
    ) -> Result<E::G2, BackendError>;

    /// In-place transform of `data`, which must hold exactly `domain.size()` elements.
    fn ntt(
        &self,
        direction: NttDirection,
        domain: &FftDomain<E::ScalarField>,
        cfg: &NttConfig<E::ScalarField>,
        data: &mut Self::Scalars,
    ) -> Result<(), BackendError>;

    /// Elementwise `a op b`.
    fn vec_op(
        &self,
        a: &Self::Scalars,
        b: &Self::Scalars,
        op: VecOp,
    ) -> Result<Self::Scalars, BackendError>;
}
