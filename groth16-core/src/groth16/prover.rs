use std::sync::Mutex;

use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use ark_ff::{UniformRand, Zero};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use rayon::prelude::*;

use super::commitment::{commitment_hash, fold, pok_challenge};
use super::config::ProverConfig;
use super::keys::ProvingKey;
use super::proof::Proof;
use super::residency::DeviceProvingKey;
use crate::backend::{Backend, NttConfig, NttDirection, VecOp};
use crate::dag::{Schedule, Slot, TaskGraph, TaskGraphError};
use crate::r1cs::{solve, ConstraintSystem, HintError, HintId, HintOverrides, Solution, Witness};
use crate::utils::errors::ProveError;
use crate::utils::thread::{drop_in_background_thread, lock};

/// Blinded G1 `δ` multiples shared by `Ar`, `Bs1` and `Krs`.
struct DeltaTerms<E: Pairing> {
    r_delta: E::G1,
    s_delta: E::G1,
    kr_delta: E::G1,
}

/// Per-proof blinding scalars, `kr = -r·s`.
#[derive(Clone, Copy)]
struct Blinding<F> {
    r: F,
    s: F,
    kr: F,
}

/// Produces a Groth16 proof for `witness` on `backend`.
///
/// The first call with a given `(backend, device)` pair uploads the proving key; later
/// calls reuse the resident copy. Randomness `r, s` is drawn fresh on every call.
#[tracing::instrument(skip_all, name = "Groth16::prove", fields(
    backend = %backend.kind(),
    device = backend.device_id(),
    constraints = cs.nb_constraints(),
))]
pub fn prove<E, B>(
    cs: &ConstraintSystem<E::ScalarField>,
    pk: &ProvingKey<E>,
    witness: &Witness<E::ScalarField>,
    backend: &B,
    config: &ProverConfig,
) -> Result<Proof<E>, ProveError>
where
    E: Pairing,
    B: Backend<E> + 'static,
{
    if config.backend != backend.kind() {
        return Err(ProveError::Configuration(format!(
            "config selects the {} backend but a {} backend was supplied",
            config.backend,
            backend.kind()
        )));
    }
    if config.device_id != backend.device_id() {
        return Err(ProveError::Configuration(format!(
            "config selects device {} but the backend is bound to device {}",
            config.device_id,
            backend.device_id()
        )));
    }
    pk.check_circuit(cs).map_err(ProveError::Configuration)?;
    let device_pk = pk.residency.get_or_build(pk, backend)?;

    let (solution, commitments) =
        solve_with_commitments(cs, witness, backend, &device_pk, config)?;

    let mut rng = ChaCha20Rng::from_entropy();
    let r = E::ScalarField::rand(&mut rng);
    let s = E::ScalarField::rand(&mut rng);
    let blinding = Blinding { r, s, kr: -(r * s) };

    let schedule = config.schedule.unwrap_or_else(|| backend.default_schedule());
    let proof = {
        let pipeline = ProvePipeline {
            cs,
            pk,
            device_pk: &device_pk,
            backend,
            solution: &solution,
        };
        pipeline.run(schedule, config, blinding, commitments)?
    };

    tracing::debug!("releasing solver buffers");
    drop_in_background_thread(solution);
    Ok(proof)
}

/// Solves the witness, computing each commitment from its private values as the solver
/// reaches the group's hint.
fn solve_with_commitments<E, B>(
    cs: &ConstraintSystem<E::ScalarField>,
    witness: &Witness<E::ScalarField>,
    backend: &B,
    device_pk: &DeviceProvingKey<E, B>,
    config: &ProverConfig,
) -> Result<(Solution<E::ScalarField>, Vec<E::G1Affine>), ProveError>
where
    E: Pairing,
    B: Backend<E>,
{
    let groups = cs.commitments();
    let commitments: Vec<Mutex<Option<E::G1Affine>>> =
        groups.iter().map(|_| Mutex::new(None)).collect();
    let failure: Mutex<Option<ProveError>> = Mutex::new(None);
    let hasher = config.hasher.as_ref();

    let mut overrides = HintOverrides::new();
    for (i, group) in groups.iter().enumerate() {
        let slot = &commitments[i];
        let failure = &failure;
        let bases = &device_pk.commitment_bases[i];
        overrides.insert(HintId::Commitment(i), move |inputs: &[E::ScalarField]| {
            let (public_values, private_values) = inputs.split_at(group.public_committed.len());
            let commitment = backend.run_on_device(|| -> Result<_, ProveError> {
                let scalars = backend.copy_scalars_to_device(private_values)?;
                Ok(backend
                    .msm_g1(&scalars, &bases.basis)?
                    .into_affine())
            });
            let commitment = match commitment {
                Ok(commitment) => commitment,
                Err(e) => {
                    let reason = e.to_string();
                    let mut failure = lock(failure);
                    if failure.is_none() {
                        *failure = Some(e);
                    }
                    return Err(HintError::Failed(reason));
                }
            };
            *lock(slot) = Some(commitment);
            let hash = commitment_hash::<E>(hasher, &commitment, public_values)
                .map_err(|e| HintError::Failed(e.to_string()))?;
            Ok(vec![hash])
        });
    }

    let solved = solve(cs, witness, &overrides);
    drop(overrides);
    // A backend fault inside a hint is reported as itself, not as a solver error.
    if let Some(e) = lock(&failure).take() {
        return Err(e);
    }
    let solution = solved?;

    let commitments = commitments
        .into_iter()
        .map(|slot| {
            slot.into_inner()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .ok_or(TaskGraphError::MissingInput {
                    task: "solve",
                    output: "commitment",
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((solution, commitments))
}

struct ProvePipeline<'a, E: Pairing, B: Backend<E>> {
    cs: &'a ConstraintSystem<E::ScalarField>,
    pk: &'a ProvingKey<E>,
    device_pk: &'a DeviceProvingKey<E, B>,
    backend: &'a B,
    solution: &'a Solution<E::ScalarField>,
}

/// One-shot outputs of the pipeline tasks.
struct PipelineSlots<E: Pairing, B: Backend<E>> {
    pok: Slot<E::G1>,
    ntt_a: Slot<B::Scalars>,
    ntt_b: Slot<B::Scalars>,
    ntt_c: Slot<B::Scalars>,
    h: Slot<B::Scalars>,
    wires_a: Slot<B::Scalars>,
    wires_b: Slot<B::Scalars>,
    wires_k: Slot<B::Scalars>,
    deltas: Slot<DeltaTerms<E>>,
    ar: Slot<E::G1>,
    bs1: Slot<E::G1>,
    bs2: Slot<E::G2>,
    krs_h: Slot<E::G1>,
    krs_k: Slot<E::G1>,
    krs: Slot<E::G1>,
}

impl<E: Pairing, B: Backend<E>> PipelineSlots<E, B> {
    fn new() -> Self {
        Self {
            pok: Slot::new("commitment_pok"),
            ntt_a: Slot::new("ntt_a"),
            ntt_b: Slot::new("ntt_b"),
            ntt_c: Slot::new("ntt_c"),
            h: Slot::new("quotient_h"),
            wires_a: Slot::new("wires_a"),
            wires_b: Slot::new("wires_b"),
            wires_k: Slot::new("wires_k"),
            deltas: Slot::new("deltas"),
            ar: Slot::new("ar"),
            bs1: Slot::new("bs1"),
            bs2: Slot::new("bs2"),
            krs_h: Slot::new("krs_h"),
            krs_k: Slot::new("krs_k"),
            krs: Slot::new("krs"),
        }
    }

    fn into_proof(self, commitments: Vec<E::G1Affine>) -> Result<Proof<E>, TaskGraphError> {
        let missing = |output: &'static str| TaskGraphError::MissingInput {
            task: "prove",
            output,
        };
        let ar = self.ar.into_inner().ok_or_else(|| missing("ar"))?;
        let bs = self.bs2.into_inner().ok_or_else(|| missing("bs2"))?;
        let krs = self.krs.into_inner().ok_or_else(|| missing("krs"))?;
        let pok = self.pok.into_inner().ok_or_else(|| missing("commitment_pok"))?;
        Ok(Proof {
            ar: ar.into_affine(),
            bs: bs.into_affine(),
            krs: krs.into_affine(),
            commitments,
            commitment_pok: pok.into_affine(),
        })
    }
}

impl<'a, E: Pairing, B: Backend<E>> ProvePipeline<'a, E, B> {
    /// Brings one of the `A`, `B`, `C` row vectors onto the coset `g·H`.
    fn coset_evaluations(&self, rows: &[E::ScalarField]) -> Result<B::Scalars, ProveError> {
        let domain = &self.device_pk.domain;
        let mut padded = rows.to_vec();
        padded.resize(domain.size(), E::ScalarField::zero());
        let mut values = self.backend.copy_scalars_to_device(&padded)?;
        self.backend
            .ntt(NttDirection::Inverse, domain, &NttConfig::default(), &mut values)?;
        self.backend.ntt(
            NttDirection::Forward,
            domain,
            &NttConfig::coset(self.device_pk.coset_generator),
            &mut values,
        )?;
        Ok(values)
    }

    /// Values of the wires whose bitmap entry is clear, in wire order.
    fn filter_wires(&self, infinity: &[bool]) -> Result<B::Scalars, ProveError> {
        let values: Vec<E::ScalarField> = self
            .solution
            .wires
            .par_iter()
            .zip(infinity.par_iter())
            .filter(|(_, infinite)| !**infinite)
            .map(|(value, _)| *value)
            .collect();
        Ok(self.backend.copy_scalars_to_device(&values)?)
    }

    /// Declares every pipeline task with exactly the edges the proof equations need.
    fn graph<'g>(
        &'g self,
        slots: &'g PipelineSlots<E, B>,
        config: &'g ProverConfig,
        blinding: Blinding<E::ScalarField>,
    ) -> TaskGraph<'g, ProveError> {
        let Blinding { r, s, kr } = blinding;
        let backend = self.backend;
        let device_pk = self.device_pk;
        let pk = self.pk;
        let cs = self.cs;
        let solution = self.solution;
        let domain = device_pk.domain;

        let mut graph = TaskGraph::<ProveError>::new();

        graph.add_task("commitment_pok", &[], move || {
            let groups = cs.commitments();
            if groups.is_empty() {
                return Ok(slots.pok.set(E::G1::zero())?);
            }
            let values: Vec<E::ScalarField> = groups
                .iter()
                .map(|group| solution.wires[group.commitment_wire])
                .collect();
            let challenge = pok_challenge(config.hasher.as_ref(), &values)
                .map_err(|e| ProveError::Configuration(e.to_string()))?;
            let poks = backend.run_on_device(|| -> Result<_, ProveError> {
                groups
                    .iter()
                    .zip(&device_pk.commitment_bases)
                    .map(|(group, bases)| -> Result<E::G1, ProveError> {
                        let private: Vec<E::ScalarField> = group
                            .private_committed
                            .iter()
                            .map(|&w| solution.wires[w])
                            .collect();
                        let scalars = backend.copy_scalars_to_device(&private)?;
                        Ok(backend.msm_g1(&scalars, &bases.basis_exp_sigma)?)
                    })
                    .collect::<Result<Vec<_>, _>>()
            })?;
            Ok(slots.pok.set(fold(&poks, challenge))?)
        });

        let t_ntt_a = graph.add_task("ntt_a", &[], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                Ok(slots.ntt_a.set(self.coset_evaluations(&solution.a)?)?)
            })
        });
        let t_ntt_b = graph.add_task("ntt_b", &[], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                Ok(slots.ntt_b.set(self.coset_evaluations(&solution.b)?)?)
            })
        });
        let t_ntt_c = graph.add_task("ntt_c", &[], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                Ok(slots.ntt_c.set(self.coset_evaluations(&solution.c)?)?)
            })
        });
        let t_h = graph.add_task("quotient_h", &[t_ntt_a, t_ntt_b, t_ntt_c], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                const TASK: &str = "quotient_h";
                let (a, b) = (slots.ntt_a.get(TASK)?, slots.ntt_b.get(TASK)?);
                let ab = backend.vec_op(a, b, VecOp::Mul)?;
                let abc = backend.vec_op(&ab, slots.ntt_c.get(TASK)?, VecOp::Sub)?;
                let mut h = backend.vec_op(&abc, &device_pk.den, VecOp::Mul)?;
                backend.ntt(
                    NttDirection::Inverse,
                    &domain,
                    &NttConfig::coset(device_pk.coset_generator),
                    &mut h,
                )?;
                Ok(slots.h.set(h)?)
            })
        });

        let t_wa = graph.add_task("filter_wires_a", &[], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                Ok(slots.wires_a.set(self.filter_wires(&pk.infinity_a)?)?)
            })
        });
        let t_wb = graph.add_task("filter_wires_b", &[], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                Ok(slots.wires_b.set(self.filter_wires(&pk.infinity_b)?)?)
            })
        });
        let t_wk = graph.add_task("filter_wires_k", &[], move || {
            let values: Vec<E::ScalarField> = cs
                .prover_k_wires()
                .into_iter()
                .map(|w| solution.wires[w])
                .collect();
            backend.run_on_device(|| -> Result<_, ProveError> {
                Ok(slots.wires_k.set(backend.copy_scalars_to_device(&values)?)?)
            })
        });

        let t_delta = graph.add_task("scale_delta", &[], move || {
            let delta: E::G1 = pk.g1.delta.into();
            Ok(slots.deltas.set(DeltaTerms {
                r_delta: delta * r,
                s_delta: delta * s,
                kr_delta: delta * kr,
            })?)
        });

        let t_ar = graph.add_task("ar", &[t_wa, t_delta], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                const TASK: &str = "ar";
                let msm = backend.msm_g1(slots.wires_a.get(TASK)?, &device_pk.g1_a)?;
                Ok(slots.ar.set(msm + pk.g1.alpha + slots.deltas.get(TASK)?.r_delta)?)
            })
        });
        let t_bs1 = graph.add_task("bs1", &[t_wb, t_delta], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                const TASK: &str = "bs1";
                let msm = backend.msm_g1(slots.wires_b.get(TASK)?, &device_pk.g1_b)?;
                Ok(slots.bs1.set(msm + pk.g1.beta + slots.deltas.get(TASK)?.s_delta)?)
            })
        });
        graph.add_task("bs2", &[t_wb], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                let msm = backend.msm_g2(slots.wires_b.get("bs2")?, &device_pk.g2_b)?;
                let delta_g2: E::G2 = pk.g2.delta.into();
                Ok(slots.bs2.set(msm + pk.g2.beta + delta_g2 * s)?)
            })
        });
        let t_krs_h = graph.add_task("krs_h", &[t_h], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                let msm = backend.msm_g1(slots.h.get("krs_h")?, &device_pk.g1_z)?;
                Ok(slots.krs_h.set(msm)?)
            })
        });
        let t_krs_k = graph.add_task("krs_k", &[t_wk], move || {
            backend.run_on_device(|| -> Result<_, ProveError> {
                let msm = backend.msm_g1(slots.wires_k.get("krs_k")?, &device_pk.g1_k)?;
                Ok(slots.krs_k.set(msm)?)
            })
        });
        graph.add_task("krs", &[t_krs_h, t_krs_k, t_delta, t_ar, t_bs1], move || {
            const TASK: &str = "krs";
            let krs = *slots.krs_h.get(TASK)?
                + slots.krs_k.get(TASK)?
                + slots.deltas.get(TASK)?.kr_delta
                + *slots.ar.get(TASK)? * s
                + *slots.bs1.get(TASK)? * r;
            Ok(slots.krs.set(krs)?)
        });

        graph
    }

    fn run(
        &self,
        schedule: Schedule,
        config: &ProverConfig,
        blinding: Blinding<E::ScalarField>,
        commitments: Vec<E::G1Affine>,
    ) -> Result<Proof<E>, ProveError> {
        let slots = PipelineSlots::<E, B>::new();
        let graph = self.graph(&slots, config, blinding);
        tracing::debug!(tasks = graph.len(), ?schedule, "running prove pipeline");
        graph.run(schedule)?;
        Ok(slots.into_proof(commitments)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::groth16::setup_with_rng;
    use crate::r1cs::ConstraintSystemBuilder;
    use ark_bn254::{Bn254, Fr};

    #[test]
    fn pipeline_edges_are_minimal() {
        let mut builder = ConstraintSystemBuilder::<Fr>::new();
        let out = builder.public_input();
        let x = builder.secret_input();
        let y = builder.secret_input();
        builder.assert_mul(x, y, out);
        let cs = builder.build().unwrap();
        let (pk, _) = setup_with_rng::<Bn254, _>(&cs, &mut ChaCha20Rng::seed_from_u64(1)).unwrap();
        let witness = Witness::new(vec![Fr::from(15u64)], vec![Fr::from(3u64), Fr::from(5u64)]);

        let backend = CpuBackend::new();
        let device_pk = pk.residency.get_or_build(&pk, &backend).unwrap();
        let solution = solve(&cs, &witness, &HintOverrides::new()).unwrap();
        let pipeline = ProvePipeline {
            cs: &cs,
            pk: &pk,
            device_pk: &device_pk,
            backend: &backend,
            solution: &solution,
        };
        let slots = PipelineSlots::<Bn254, CpuBackend>::new();
        let config = ProverConfig::default();
        let one = Fr::from(1u64);
        let graph = pipeline.graph(&slots, &config, Blinding { r: one, s: one, kr: -one });

        assert_eq!(
            graph.dependencies(),
            vec![
                ("commitment_pok", vec![]),
                ("ntt_a", vec![]),
                ("ntt_b", vec![]),
                ("ntt_c", vec![]),
                ("quotient_h", vec!["ntt_a", "ntt_b", "ntt_c"]),
                ("filter_wires_a", vec![]),
                ("filter_wires_b", vec![]),
                ("filter_wires_k", vec![]),
                ("scale_delta", vec![]),
                ("ar", vec!["filter_wires_a", "scale_delta"]),
                ("bs1", vec!["filter_wires_b", "scale_delta"]),
                ("bs2", vec!["filter_wires_b"]),
                ("krs_h", vec!["quotient_h"]),
                ("krs_k", vec!["filter_wires_k"]),
                ("krs", vec!["krs_h", "krs_k", "scale_delta", "ar", "bs1"]),
            ]
        );
    }
}
