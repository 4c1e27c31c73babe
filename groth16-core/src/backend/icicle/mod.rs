//! ICICLE v3 backend, BN254 only.

use std::path::Path;

use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use icicle_bn254::curve::{CurveCfg, G2CurveCfg, ScalarCfg, ScalarField};
use icicle_core::curve::{Affine, Projective};
use icicle_core::msm::{msm, MSMConfig};
use icicle_core::ntt::{self, NTTConfig, NTTDir, NTTInitDomainConfig};
use icicle_core::vec_ops::{VecOps, VecOpsConfig};
use icicle_runtime::memory::{DeviceVec, HostOrDeviceSlice, HostSlice};
use icicle_runtime::Device;
use once_cell::sync::OnceCell;

use super::{
    AcceleratorContext, Backend, BackendError, BackendKind, NttConfig, NttDirection, VecOp,
};
use crate::dag::Schedule;
use crate::poly::FftDomain;
use crate::utils::errors::{ContextError, ProveError};

pub mod adapter;

use adapter::{
    g1_from_ark, g1_to_ark, g2_from_ark, g2_to_ark, scalar_from_ark, scalars_from_ark,
    scalars_to_ark,
};

const DEVICE_TYPE: &str = "CUDA";

static BACKEND: OnceCell<Result<usize, ContextError>> = OnceCell::new();

/// Loads the device plugins and counts devices. Later calls return the first result,
/// whatever `install_dir` they pass.
pub(crate) fn load_backend_once(install_dir: Option<&Path>) -> Result<usize, ContextError> {
    BACKEND
        .get_or_init(|| {
            let load_err = |reason: String| ContextError::BackendLoad {
                backend: BackendKind::Icicle,
                reason,
            };
            match install_dir {
                Some(dir) => icicle_runtime::load_backend(&dir.to_string_lossy()),
                None => icicle_runtime::load_backend_from_env_or_default(),
            }
            .map_err(|e| load_err(format!("{e:?}")))?;

            let device = Device::new(DEVICE_TYPE, 0);
            if !icicle_runtime::is_device_available(&device) {
                return Err(ContextError::NoDevice(BackendKind::Icicle));
            }
            icicle_runtime::set_device(&device).map_err(|e| load_err(format!("{e:?}")))?;
            let count =
                icicle_runtime::get_device_count().map_err(|e| load_err(format!("{e:?}")))?;
            tracing::info!(devices = count, "loaded icicle backend");
            Ok(count.max(0) as usize)
        })
        .clone()
}

/// Device-resident vector. Empty vectors never touch the allocator.
pub struct DeviceBuffer<T> {
    len: usize,
    inner: Option<DeviceVec<T>>,
}

// SAFETY: the buffer is an owned device allocation. ICICLE device memory is addressable
// from any host thread once that thread has selected the owning device, which every
// backend entry point does through `run_on_device`.
unsafe impl<T> Send for DeviceBuffer<T> {}
unsafe impl<T> Sync for DeviceBuffer<T> {}

impl<T> DeviceBuffer<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn from_host(host: &[T]) -> Result<Self, BackendError> {
        if host.is_empty() {
            return Ok(Self {
                len: 0,
                inner: None,
            });
        }
        let mut device = DeviceVec::<T>::device_malloc(host.len()).map_err(|e| {
            BackendError::Allocation {
                len: host.len(),
                reason: format!("{e:?}"),
            }
        })?;
        device
            .copy_from_host(HostSlice::from_slice(host))
            .map_err(|e| BackendError::Transfer(format!("{e:?}")))?;
        Ok(Self {
            len: host.len(),
            inner: Some(device),
        })
    }

    fn alloc(len: usize) -> Result<Self, BackendError> {
        if len == 0 {
            return Ok(Self {
                len: 0,
                inner: None,
            });
        }
        let device = DeviceVec::<T>::device_malloc(len).map_err(|e| BackendError::Allocation {
            len,
            reason: format!("{e:?}"),
        })?;
        Ok(Self {
            len,
            inner: Some(device),
        })
    }
}

impl<T: Default + Clone> DeviceBuffer<T> {
    fn to_host(&self) -> Result<Vec<T>, BackendError> {
        let mut host = vec![T::default(); self.len];
        if let Some(device) = &self.inner {
            device
                .copy_to_host(HostSlice::from_mut_slice(&mut host))
                .map_err(|e| BackendError::Transfer(format!("{e:?}")))?;
        }
        Ok(host)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct IcicleBackend {
    device_id: usize,
    schedule: Schedule,
}

impl IcicleBackend {
    pub fn new(context: &AcceleratorContext, device_id: usize) -> Result<Self, ProveError> {
        context.check_selection(BackendKind::Icicle, device_id)?;
        Ok(Self {
            device_id,
            schedule: Schedule::Concurrent,
        })
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    fn device(&self) -> Device {
        Device::new(DEVICE_TYPE, self.device_id as i32)
    }

    /// Selects this backend's device on the calling thread. Every primitive goes
    /// through here, so a failed selection surfaces as the call's error instead of
    /// running on whatever device the thread last used.
    fn select_device(&self) -> Result<(), BackendError> {
        icicle_runtime::set_device(&self.device()).map_err(|e| BackendError::Device {
            device: self.device_id,
            reason: format!("{e:?}"),
        })
    }
}

impl Backend<Bn254> for IcicleBackend {
    type G1Bases = DeviceBuffer<Affine<CurveCfg>>;
    type G2Bases = DeviceBuffer<Affine<G2CurveCfg>>;
    type Scalars = DeviceBuffer<ScalarField>;

    fn kind(&self) -> BackendKind {
        BackendKind::Icicle
    }

    fn device_id(&self) -> usize {
        self.device_id
    }

    fn default_schedule(&self) -> Schedule {
        self.schedule
    }

    fn run_on_device<R>(&self, task: impl FnOnce() -> R) -> R {
        // Primitives re-select the device and fail if that is impossible.
        if let Err(e) = self.select_device() {
            tracing::debug!(error = %e, "device selection before task failed");
        }
        task()
    }

    #[tracing::instrument(skip_all, name = "IcicleBackend::copy_g1_to_device")]
    fn copy_g1_to_device(&self, host: &[G1Affine]) -> Result<Self::G1Bases, BackendError> {
        self.select_device()?;
        DeviceBuffer::from_host(&g1_from_ark(host))
    }

    #[tracing::instrument(skip_all, name = "IcicleBackend::copy_g2_to_device")]
    fn copy_g2_to_device(&self, host: &[G2Affine]) -> Result<Self::G2Bases, BackendError> {
        self.select_device()?;
        DeviceBuffer::from_host(&g2_from_ark(host))
    }

    fn copy_scalars_to_device(&self, host: &[Fr]) -> Result<Self::Scalars, BackendError> {
        self.select_device()?;
        DeviceBuffer::from_host(&scalars_from_ark(host))
    }

    fn copy_scalars_to_host(&self, device: &Self::Scalars) -> Result<Vec<Fr>, BackendError> {
        self.select_device()?;
        Ok(scalars_to_ark(&device.to_host()?))
    }

    fn prepare_ntt_domain(&self, domain: &FftDomain<Fr>) -> Result<(), BackendError> {
        self.select_device()?;
        // Seeding with arkworks' root keeps row `i` at `ω^i` on both backends.
        let root = scalar_from_ark(&domain.group_gen());
        ntt::initialize_domain(root, &NTTInitDomainConfig::default())
            .map_err(|e| BackendError::Ntt(format!("{e:?}")))
    }

    #[tracing::instrument(skip_all, name = "IcicleBackend::msm_g1")]
    fn msm_g1(
        &self,
        scalars: &Self::Scalars,
        bases: &Self::G1Bases,
    ) -> Result<G1Projective, BackendError> {
        self.select_device()?;
        let len = scalars.len().min(bases.len());
        let (Some(s), Some(b)) = (&scalars.inner, &bases.inner) else {
            return Ok(G1Projective::default());
        };
        let mut result = [Projective::<CurveCfg>::zero(); 1];
        msm(
            &s[..len],
            &b[..len],
            &msm_config(),
            HostSlice::from_mut_slice(&mut result),
        )
        .map_err(|e| BackendError::Msm(format!("{e:?}")))?;
        Ok(g1_to_ark(&result[0]))
    }

    #[tracing::instrument(skip_all, name = "IcicleBackend::msm_g2")]
    fn msm_g2(
        &self,
        scalars: &Self::Scalars,
        bases: &Self::G2Bases,
    ) -> Result<G2Projective, BackendError> {
        self.select_device()?;
        let len = scalars.len().min(bases.len());
        let (Some(s), Some(b)) = (&scalars.inner, &bases.inner) else {
            return Ok(G2Projective::default());
        };
        let mut result = [Projective::<G2CurveCfg>::zero(); 1];
        msm(
            &s[..len],
            &b[..len],
            &msm_config(),
            HostSlice::from_mut_slice(&mut result),
        )
        .map_err(|e| BackendError::Msm(format!("{e:?}")))?;
        Ok(g2_to_ark(&result[0]))
    }

    #[tracing::instrument(skip_all, name = "IcicleBackend::ntt")]
    fn ntt(
        &self,
        direction: NttDirection,
        domain: &FftDomain<Fr>,
        cfg: &NttConfig<Fr>,
        data: &mut Self::Scalars,
    ) -> Result<(), BackendError> {
        if data.len() != domain.size() {
            return Err(BackendError::LengthMismatch(domain.size(), data.len()));
        }
        self.select_device()?;
        let Some(inner) = data.inner.as_mut() else {
            return Ok(());
        };
        let mut ntt_cfg = NTTConfig::<ScalarField>::default();
        if let Some(g) = cfg.coset_gen {
            ntt_cfg.coset_gen = scalar_from_ark(&g);
        }
        let dir = match direction {
            NttDirection::Forward => NTTDir::kForward,
            NttDirection::Inverse => NTTDir::kInverse,
        };
        ntt::ntt_inplace(&mut inner[..], dir, &ntt_cfg)
            .map_err(|e| BackendError::Ntt(format!("{e:?}")))
    }

    fn vec_op(
        &self,
        a: &Self::Scalars,
        b: &Self::Scalars,
        op: VecOp,
    ) -> Result<Self::Scalars, BackendError> {
        if a.len() != b.len() {
            return Err(BackendError::LengthMismatch(a.len(), b.len()));
        }
        self.select_device()?;
        let mut out = DeviceBuffer::<ScalarField>::alloc(a.len())?;
        let (Some(x), Some(y), Some(z)) = (&a.inner, &b.inner, out.inner.as_mut()) else {
            return Ok(out);
        };
        let cfg = VecOpsConfig::default();
        match op {
            VecOp::Mul => ScalarCfg::mul(&x[..], &y[..], &mut z[..], &cfg),
            VecOp::Sub => ScalarCfg::sub(&x[..], &y[..], &mut z[..], &cfg),
        }
        .map_err(|e| BackendError::VecOp(format!("{e:?}")))?;
        Ok(out)
    }
}

fn msm_config() -> MSMConfig {
    let mut msm_cfg = MSMConfig::default();
    msm_cfg.are_scalars_montgomery_form = false;
    msm_cfg.is_async = false;
    msm_cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AcceleratorConfig, CpuBackend};
    use ark_ec::CurveGroup;
    use ark_ff::UniformRand;
    use serial_test::serial;

    fn icicle() -> Option<IcicleBackend> {
        let context = AcceleratorContext::init(&AcceleratorConfig::icicle()).ok()?;
        IcicleBackend::new(&context, 0).ok()
    }

    #[test]
    #[serial]
    fn msm_matches_cpu() {
        let Some(gpu) = icicle() else {
            return;
        };
        let mut rng = ark_std::test_rng();
        let bases: Vec<G1Affine> = (0..64)
            .map(|_| G1Projective::rand(&mut rng).into_affine())
            .collect();
        let scalars: Vec<Fr> = (0..64).map(|_| Fr::rand(&mut rng)).collect();

        let cpu = CpuBackend::new();
        let expected =
            Backend::<Bn254>::msm_g1(&cpu, &scalars, &bases).unwrap();
        let got = gpu.run_on_device(|| {
            let b = gpu.copy_g1_to_device(&bases).unwrap();
            let s = gpu.copy_scalars_to_device(&scalars).unwrap();
            gpu.msm_g1(&s, &b).unwrap()
        });
        assert_eq!(got, expected);
    }

    #[test]
    #[serial]
    fn scalars_round_trip_through_device() {
        let Some(gpu) = icicle() else {
            return;
        };
        let mut rng = ark_std::test_rng();
        let scalars: Vec<Fr> = (0..16).map(|_| Fr::rand(&mut rng)).collect();
        let back = gpu.run_on_device(|| {
            let d = gpu.copy_scalars_to_device(&scalars).unwrap();
            gpu.copy_scalars_to_host(&d).unwrap()
        });
        assert_eq!(back, scalars);
    }

    #[test]
    #[serial]
    fn unselectable_device_fails_the_call() {
        let Some(gpu) = icicle() else {
            return;
        };
        let missing = IcicleBackend {
            device_id: 4096,
            ..gpu
        };
        let err = missing
            .run_on_device(|| missing.copy_scalars_to_device(&[Fr::from(1u64)]))
            .err();
        assert!(matches!(err, Some(BackendError::Device { device: 4096, .. })));
        // The healthy backend is unaffected.
        gpu.run_on_device(|| gpu.copy_scalars_to_device(&[Fr::from(1u64)]))
            .unwrap();
    }
}
