use ark_ec::pairing::Pairing;
use ark_ec::VariableBaseMSM;
use ark_poly::EvaluationDomain;
use rayon::prelude::*;

use super::{montgomery, Backend, BackendError, BackendKind, NttConfig, NttDirection, VecOp};
use crate::dag::Schedule;
use crate::poly::FftDomain;

/// Host backend. "Device memory" is ordinary host memory, every primitive goes through
/// arkworks.
#[derive(Clone, Copy, Debug)]
pub struct CpuBackend {
    schedule: Schedule,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self {
            schedule: Schedule::Sequential,
        }
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }
}

fn check_ntt_len(domain_size: usize, data_len: usize) -> Result<(), BackendError> {
    if domain_size != data_len {
        return Err(BackendError::LengthMismatch(domain_size, data_len));
    }
    Ok(())
}

impl<E: Pairing> Backend<E> for CpuBackend {
    type G1Bases = Vec<E::G1Affine>;
    type G2Bases = Vec<E::G2Affine>;
    type Scalars = Vec<E::ScalarField>;

    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn device_id(&self) -> usize {
        0
    }

    fn default_schedule(&self) -> Schedule {
        self.schedule
    }

    fn run_on_device<R>(&self, task: impl FnOnce() -> R) -> R {
        task()
    }

    fn copy_g1_to_device(&self, host: &[E::G1Affine]) -> Result<Self::G1Bases, BackendError> {
        Ok(host.to_vec())
    }

    fn copy_g2_to_device(&self, host: &[E::G2Affine]) -> Result<Self::G2Bases, BackendError> {
        Ok(host.to_vec())
    }

    fn copy_scalars_to_device(
        &self,
        host: &[E::ScalarField],
    ) -> Result<Self::Scalars, BackendError> {
        Ok(host.to_vec())
    }

    fn copy_scalars_to_host(
        &self,
        device: &Self::Scalars,
    ) -> Result<Vec<E::ScalarField>, BackendError> {
        Ok(device.clone())
    }

    fn prepare_ntt_domain(&self, _domain: &FftDomain<E::ScalarField>) -> Result<(), BackendError> {
        Ok(())
    }

    #[tracing::instrument(skip_all, name = "CpuBackend::msm_g1")]
    fn msm_g1(
        &self,
        scalars: &Self::Scalars,
        bases: &Self::G1Bases,
    ) -> Result<E::G1, BackendError> {
        let len = scalars.len().min(bases.len());
        let bigints = montgomery::from_montgomery(&scalars[..len]);
        Ok(E::G1::msm_bigint(&bases[..len], &bigints))
    }

    #[tracing::instrument(skip_all, name = "CpuBackend::msm_g2")]
    fn msm_g2(
        &self,
        scalars: &Self::Scalars,
        bases: &Self::G2Bases,
    ) -> Result<E::G2, BackendError> {
        let len = scalars.len().min(bases.len());
        let bigints = montgomery::from_montgomery(&scalars[..len]);
        Ok(E::G2::msm_bigint(&bases[..len], &bigints))
    }

    #[tracing::instrument(skip_all, name = "CpuBackend::ntt")]
    fn ntt(
        &self,
        direction: NttDirection,
        domain: &FftDomain<E::ScalarField>,
        cfg: &NttConfig<E::ScalarField>,
        data: &mut Self::Scalars,
    ) -> Result<(), BackendError> {
        check_ntt_len(domain.size(), data.len())?;
        let radix2 = match cfg.coset_gen {
            Some(g) => domain
                .coset(g)
                .ok_or(BackendError::UnsupportedDomain(domain.size()))?,
            None => *domain.radix2(),
        };
        match direction {
            NttDirection::Forward => radix2.fft_in_place(data),
            NttDirection::Inverse => radix2.ifft_in_place(data),
        }
        Ok(())
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
        let out = match op {
            VecOp::Mul => a.par_iter().zip(b.par_iter()).map(|(x, y)| *x * y).collect(),
            VecOp::Sub => a.par_iter().zip(b.par_iter()).map(|(x, y)| *x - y).collect(),
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Bn254, Fr, G1Affine, G1Projective};
    use ark_ec::CurveGroup;
    use ark_ff::{UniformRand, Zero};
    use ark_poly::{univariate::DensePolynomial, DenseUVPolynomial, Polynomial};

    fn backend() -> CpuBackend {
        CpuBackend::new()
    }

    #[test]
    fn msm_matches_naive_sum() {
        let mut rng = ark_std::test_rng();
        let bases: Vec<G1Affine> = (0..20)
            .map(|_| G1Projective::rand(&mut rng).into_affine())
            .collect();
        let scalars: Vec<Fr> = (0..20).map(|_| Fr::rand(&mut rng)).collect();
        let expected: G1Projective = bases.iter().zip(scalars.iter()).map(|(b, s)| *b * s).sum();

        let cpu = backend();
        let d_bases = <CpuBackend as Backend<Bn254>>::copy_g1_to_device(&cpu, &bases).unwrap();
        let d_scalars =
            <CpuBackend as Backend<Bn254>>::copy_scalars_to_device(&cpu, &scalars).unwrap();
        let got = <CpuBackend as Backend<Bn254>>::msm_g1(&cpu, &d_scalars, &d_bases).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn msm_uses_common_prefix() {
        let mut rng = ark_std::test_rng();
        let bases: Vec<G1Affine> = (0..4)
            .map(|_| G1Projective::rand(&mut rng).into_affine())
            .collect();
        let scalars = vec![Fr::from(2u64); 6];
        let cpu = backend();
        let got = <CpuBackend as Backend<Bn254>>::msm_g1(&cpu, &scalars, &bases).unwrap();
        let expected: G1Projective = bases.iter().map(|b| *b * Fr::from(2u64)).sum();
        assert_eq!(got, expected);
    }

    #[test]
    fn coset_ntt_evaluates_on_shifted_domain() {
        let mut rng = ark_std::test_rng();
        let domain = FftDomain::<Fr>::new(8).unwrap();
        let coeffs: Vec<Fr> = (0..8).map(|_| Fr::rand(&mut rng)).collect();
        let poly = DensePolynomial::from_coefficients_slice(&coeffs);
        let g = domain.coset_generator();

        let cpu = backend();
        let mut data = coeffs.clone();
        <CpuBackend as Backend<Bn254>>::ntt(
            &cpu,
            NttDirection::Forward,
            &domain,
            &NttConfig::coset(g),
            &mut data,
        )
        .unwrap();
        let omega = domain.group_gen();
        let mut point = g;
        for eval in data.iter() {
            assert_eq!(*eval, poly.evaluate(&point));
            point *= omega;
        }

        <CpuBackend as Backend<Bn254>>::ntt(
            &cpu,
            NttDirection::Inverse,
            &domain,
            &NttConfig::coset(g),
            &mut data,
        )
        .unwrap();
        assert_eq!(data, coeffs);
    }

    #[test]
    fn ntt_rejects_wrong_length() {
        let domain = FftDomain::<Fr>::new(8).unwrap();
        let mut data = vec![Fr::zero(); 5];
        let err = <CpuBackend as Backend<Bn254>>::ntt(
            &backend(),
            NttDirection::Forward,
            &domain,
            &NttConfig::default(),
            &mut data,
        )
        .unwrap_err();
        assert_eq!(err, BackendError::LengthMismatch(8, 5));
    }

    #[test]
    fn vec_ops() {
        let a = vec![Fr::from(6u64), Fr::from(10u64)];
        let b = vec![Fr::from(2u64), Fr::from(3u64)];
        let cpu = backend();
        let mul = <CpuBackend as Backend<Bn254>>::vec_op(&cpu, &a, &b, VecOp::Mul).unwrap();
        let sub = <CpuBackend as Backend<Bn254>>::vec_op(&cpu, &a, &b, VecOp::Sub).unwrap();
        assert_eq!(mul, vec![Fr::from(12u64), Fr::from(30u64)]);
        assert_eq!(sub, vec![Fr::from(4u64), Fr::from(7u64)]);
        assert!(<CpuBackend as Backend<Bn254>>::vec_op(&cpu, &a, &b[..1].to_vec(), VecOp::Mul).is_err());
    }
}
