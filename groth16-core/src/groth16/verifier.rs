use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{One, Zero};
use ark_serialize::Valid;

use super::commitment::{commitment_hash, fold, pok_challenge};
use super::config::VerifierConfig;
use super::keys::VerifyingKey;
use super::proof::Proof;
use crate::utils::errors::VerifyError;

/// Checks `proof` against `vk` and the public inputs, without the constant-one wire.
#[tracing::instrument(skip_all, name = "Groth16::verify", fields(
    public_inputs = public_witness.len(),
    commitments = proof.commitments.len(),
))]
pub fn verify<E: Pairing>(
    proof: &Proof<E>,
    vk: &VerifyingKey<E>,
    public_witness: &[E::ScalarField],
    config: &VerifierConfig,
) -> Result<(), VerifyError> {
    vk.check_shape().map_err(VerifyError::MalformedKey)?;
    proof
        .check()
        .map_err(|e| VerifyError::Malformed(e.to_string()))?;

    let nb_commitments = vk.nb_commitments();
    if proof.commitments.len() != nb_commitments {
        return Err(VerifyError::CommitmentCount {
            expected: nb_commitments,
            got: proof.commitments.len(),
        });
    }
    let nb_public = vk.nb_public_wires();
    if public_witness.len() + 1 != nb_public {
        return Err(VerifyError::PublicWitnessLength {
            expected: nb_public - 1,
            got: public_witness.len(),
        });
    }

    let hasher = config.hasher.as_ref();
    let mut extended = Vec::with_capacity(nb_public + nb_commitments);
    extended.push(E::ScalarField::one());
    extended.extend_from_slice(public_witness);
    for (committed, commitment) in vk
        .public_and_commitment_committed
        .iter()
        .zip(&proof.commitments)
    {
        let values: Vec<E::ScalarField> = committed.iter().map(|&i| extended[i]).collect();
        let hash = commitment_hash::<E>(hasher, commitment, &values)
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;
        extended.push(hash);
    }

    let commitments: Vec<E::G1> = proof
        .commitments
        .iter()
        .map(|c| c.into_group())
        .collect();
    if nb_commitments == 0 {
        if !proof.commitment_pok.is_zero() {
            return Err(VerifyError::InvalidCommitmentPok);
        }
    } else {
        let challenge = pok_challenge(hasher, &extended[nb_public..])
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;
        let folded = fold(&commitments, challenge).into_affine();
        let ck = &vk.commitment_key;
        let check = E::multi_pairing([folded, proof.commitment_pok], [ck.g_sigma_neg, ck.g]);
        if !check.is_zero() {
            return Err(VerifyError::InvalidCommitmentPok);
        }
    }

    let public_msm = E::G1::msm(&vk.g1.k, &extended).map_err(|len| {
        VerifyError::MalformedKey(format!("K has {len} points for {} inputs", extended.len()))
    })?;
    let l = commitments.iter().fold(public_msm, |acc, c| acc + c);

    let lhs = E::multi_pairing(
        [proof.ar, proof.krs, l.into_affine()],
        [
            proof.bs,
            (-vk.g2.delta.into_group()).into_affine(),
            (-vk.g2.gamma.into_group()).into_affine(),
        ],
    );
    if lhs != vk.alpha_beta {
        return Err(VerifyError::InvalidProof);
    }
    tracing::debug!("proof verified");
    Ok(())
}
