//! Device copies of a proving key, built once per backend and device and shared by
//! every proof computed with that key.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ark_ec::pairing::Pairing;

use super::keys::ProvingKey;
use crate::backend::Backend;
use crate::dag::{Slot, TaskGraph, TaskGraphError};
use crate::poly::FftDomain;
use crate::utils::errors::ProveError;
use crate::utils::thread::lock;

pub struct CommitmentBases<G> {
    pub basis: G,
    pub basis_exp_sigma: G,
}

pub struct DeviceProvingKey<E: Pairing, B: Backend<E>> {
    pub domain: FftDomain<E::ScalarField>,
    pub coset_generator: E::ScalarField,
    /// `n` copies of `1 / (g^n - 1)`, the inverse of `Z` on the coset.
    pub den: B::Scalars,
    pub g1_a: B::G1Bases,
    pub g1_b: B::G1Bases,
    pub g1_k: B::G1Bases,
    pub g1_z: B::G1Bases,
    pub g2_b: B::G2Bases,
    pub commitment_bases: Vec<CommitmentBases<B::G1Bases>>,
}

type ResidencyKey = (TypeId, usize);

#[derive(Default)]
pub(crate) struct ResidencyCache {
    entries: Mutex<HashMap<ResidencyKey, Arc<dyn Any + Send + Sync>>>,
}

impl ResidencyCache {
    pub(crate) fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Returns the device copy for `backend`, building it on first use. Concurrent first
    /// callers block on the lock, so the build happens exactly once.
    pub(crate) fn get_or_build<E, B>(
        &self,
        pk: &ProvingKey<E>,
        backend: &B,
    ) -> Result<Arc<DeviceProvingKey<E, B>>, ProveError>
    where
        E: Pairing,
        B: Backend<E> + 'static,
    {
        let key = (
            TypeId::of::<DeviceProvingKey<E, B>>(),
            backend.device_id(),
        );
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get(&key) {
            if let Ok(resident) = Arc::clone(entry).downcast::<DeviceProvingKey<E, B>>() {
                return Ok(resident);
            }
        }

        tracing::debug!(
            backend = %backend.kind(),
            device = backend.device_id(),
            "building device proving key"
        );
        let resident = Arc::new(DeviceProvingKey::build(pk, backend)?);
        entries.insert(key, Arc::clone(&resident) as Arc<dyn Any + Send + Sync>);
        Ok(resident)
    }
}

type G1Quad<G> = (G, G, G, G);

impl<E: Pairing, B: Backend<E>> DeviceProvingKey<E, B> {
    #[tracing::instrument(skip_all, name = "DeviceProvingKey::build")]
    fn build(pk: &ProvingKey<E>, backend: &B) -> Result<Self, ProveError> {
        let domain = pk.domain;
        let den_slot: Slot<(E::ScalarField, B::Scalars)> = Slot::new("den");
        let g1_slot: Slot<G1Quad<B::G1Bases>> = Slot::new("g1_bases");
        let g2_slot: Slot<B::G2Bases> = Slot::new("g2_bases");
        let commitment_slot: Slot<Vec<CommitmentBases<B::G1Bases>>> =
            Slot::new("commitment_bases");

        let mut graph = TaskGraph::<ProveError>::new();
        graph.add_task("residency_den", &[], || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                backend.prepare_ntt_domain(&domain)?;
                let g = domain.coset_generator();
                let den = domain.vanishing_denominator(g).ok_or_else(|| {
                    ProveError::Configuration(
                        "coset generator lies inside the evaluation domain".to_string(),
                    )
                })?;
                let den = backend.copy_scalars_to_device(&vec![den; domain.size()])?;
                Ok(den_slot.set((g, den))?)
            })
        });
        graph.add_task("residency_g1", &[], || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                let bases = (
                    backend.copy_g1_to_device(&pk.g1.a)?,
                    backend.copy_g1_to_device(&pk.g1.b)?,
                    backend.copy_g1_to_device(&pk.g1.k)?,
                    backend.copy_g1_to_device(&pk.g1.z)?,
                );
                Ok(g1_slot.set(bases)?)
            })
        });
        graph.add_task("residency_g2", &[], || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                Ok(g2_slot.set(backend.copy_g2_to_device(&pk.g2.b)?)?)
            })
        });
        graph.add_task("residency_commitment_keys", &[], || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                let bases = pk
                    .commitment_keys
                    .iter()
                    .map(|ck| -> Result<_, ProveError> {
                        Ok(CommitmentBases {
                            basis: backend.copy_g1_to_device(&ck.basis)?,
                            basis_exp_sigma: backend.copy_g1_to_device(&ck.basis_exp_sigma)?,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(commitment_slot.set(bases)?)
            })
        });
        graph.run(backend.default_schedule())?;

        let missing = |output: &'static str| TaskGraphError::MissingInput {
            task: "residency",
            output,
        };
        let (coset_generator, den) = den_slot.into_inner().ok_or_else(|| missing("den"))?;
        let (g1_a, g1_b, g1_k, g1_z) = g1_slot.into_inner().ok_or_else(|| missing("g1_bases"))?;
        let g2_b = g2_slot.into_inner().ok_or_else(|| missing("g2_bases"))?;
        let commitment_bases = commitment_slot
            .into_inner()
            .ok_or_else(|| missing("commitment_bases"))?;
        Ok(Self {
            domain,
            coset_generator,
            den,
            g1_a,
            g1_b,
            g1_k,
            g1_z,
            g2_b,
            commitment_bases,
        })
    }
}
