use std::fmt;

use ark_ec::pairing::{Pairing, PairingOutput};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use super::residency::ResidencyCache;
use crate::poly::FftDomain;
use crate::r1cs::ConstraintSystem;

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct ProvingKeyG1<E: Pairing> {
    pub alpha: E::G1Affine,
    pub beta: E::G1Affine,
    pub delta: E::G1Affine,
    /// `[A_j(τ)]₁` for every wire `j` with `A_j(τ) ≠ 0`.
    pub a: Vec<E::G1Affine>,
    /// `[B_j(τ)]₁` for every wire `j` with `B_j(τ) ≠ 0`.
    pub b: Vec<E::G1Affine>,
    /// `[(βA_j(τ) + αB_j(τ) + C_j(τ)) / δ]₁` over the prover's private wires.
    pub k: Vec<E::G1Affine>,
    /// `[τ^i · Z(τ) / δ]₁` for `i < n - 1`.
    pub z: Vec<E::G1Affine>,
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct ProvingKeyG2<E: Pairing> {
    pub beta: E::G2Affine,
    pub delta: E::G2Affine,
    pub b: Vec<E::G2Affine>,
}

/// Pedersen key of one commitment group.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct CommitmentKey<E: Pairing> {
    pub basis: Vec<E::G1Affine>,
    pub basis_exp_sigma: Vec<E::G1Affine>,
}

pub struct ProvingKey<E: Pairing> {
    pub domain: FftDomain<E::ScalarField>,
    pub g1: ProvingKeyG1<E>,
    pub g2: ProvingKeyG2<E>,
    /// `infinity_a[j]` is set when wire `j` has no `G1.A` base.
    pub infinity_a: Vec<bool>,
    pub infinity_b: Vec<bool>,
    pub nb_infinity_a: usize,
    pub nb_infinity_b: usize,
    pub commitment_keys: Vec<CommitmentKey<E>>,
    pub(crate) residency: ResidencyCache,
}

impl<E: Pairing> ProvingKey<E> {
    pub fn nb_wires(&self) -> usize {
        self.infinity_a.len()
    }

    /// Structural invariants every key must hold, wherever it came from.
    pub fn check_shape(&self) -> Result<(), String> {
        let nb_wires = self.nb_wires();
        if self.infinity_b.len() != nb_wires {
            return Err(format!(
                "infinity bitmaps disagree: {} vs {}",
                nb_wires,
                self.infinity_b.len()
            ));
        }
        let count_a = self.infinity_a.iter().filter(|inf| **inf).count();
        let count_b = self.infinity_b.iter().filter(|inf| **inf).count();
        if count_a != self.nb_infinity_a || count_b != self.nb_infinity_b {
            return Err("infinity counts disagree with bitmaps".to_string());
        }
        if self.g1.a.len() + self.nb_infinity_a != nb_wires
            || self.g1.b.len() + self.nb_infinity_b != nb_wires
            || self.g2.b.len() != self.g1.b.len()
        {
            return Err(format!(
                "basis lengths (A={}, B={}, G2.B={}) do not cover {} wires",
                self.g1.a.len(),
                self.g1.b.len(),
                self.g2.b.len(),
                nb_wires
            ));
        }
        if self.g1.z.len() + 1 != self.domain.size() {
            return Err(format!(
                "Z has {} points for a domain of size {}",
                self.g1.z.len(),
                self.domain.size()
            ));
        }
        if self
            .commitment_keys
            .iter()
            .any(|ck| ck.basis.len() != ck.basis_exp_sigma.len())
        {
            return Err("commitment basis and basis·σ lengths differ".to_string());
        }
        Ok(())
    }

    /// Checks the key was produced for `cs`.
    pub fn check_circuit(&self, cs: &ConstraintSystem<E::ScalarField>) -> Result<(), String> {
        self.check_shape()?;
        if self.nb_wires() != cs.nb_wires() {
            return Err(format!(
                "key covers {} wires, circuit has {}",
                self.nb_wires(),
                cs.nb_wires()
            ));
        }
        if self.domain.size() < cs.nb_rows() {
            return Err(format!(
                "domain size {} smaller than {} rows",
                self.domain.size(),
                cs.nb_rows()
            ));
        }
        if self.g1.k.len() != cs.prover_k_wires().len() {
            return Err(format!(
                "key has {} K points, circuit needs {}",
                self.g1.k.len(),
                cs.prover_k_wires().len()
            ));
        }
        if self.commitment_keys.len() != cs.commitments().len() {
            return Err(format!(
                "key has {} commitment keys, circuit has {} groups",
                self.commitment_keys.len(),
                cs.commitments().len()
            ));
        }
        for (i, (ck, group)) in self.commitment_keys.iter().zip(cs.commitments()).enumerate() {
            if ck.basis.len() != group.private_committed.len() {
                return Err(format!("commitment group {i} basis length mismatch"));
            }
        }
        Ok(())
    }

    /// True once a backend has built its device copy of this key.
    pub fn is_resident(&self) -> bool {
        !self.residency.is_empty()
    }
}

/// Copies the key material. The clone starts with an empty residency cache.
impl<E: Pairing> Clone for ProvingKey<E> {
    fn clone(&self) -> Self {
        Self {
            domain: self.domain,
            g1: self.g1.clone(),
            g2: self.g2.clone(),
            infinity_a: self.infinity_a.clone(),
            infinity_b: self.infinity_b.clone(),
            nb_infinity_a: self.nb_infinity_a,
            nb_infinity_b: self.nb_infinity_b,
            commitment_keys: self.commitment_keys.clone(),
            residency: ResidencyCache::default(),
        }
    }
}

impl<E: Pairing> PartialEq for ProvingKey<E> {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.g1 == other.g1
            && self.g2 == other.g2
            && self.infinity_a == other.infinity_a
            && self.infinity_b == other.infinity_b
            && self.nb_infinity_a == other.nb_infinity_a
            && self.nb_infinity_b == other.nb_infinity_b
            && self.commitment_keys == other.commitment_keys
    }
}

impl<E: Pairing> Eq for ProvingKey<E> {}

impl<E: Pairing> fmt::Debug for ProvingKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvingKey")
            .field("domain_size", &self.domain.size())
            .field("nb_wires", &self.nb_wires())
            .field("nb_infinity_a", &self.nb_infinity_a)
            .field("nb_infinity_b", &self.nb_infinity_b)
            .field("k", &self.g1.k.len())
            .field("commitment_keys", &self.commitment_keys.len())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct VerifyingKeyG1<E: Pairing> {
    pub alpha: E::G1Affine,
    /// `[(βA_j(τ) + αB_j(τ) + C_j(τ)) / γ]₁` over public wires, then commitment wires.
    pub k: Vec<E::G1Affine>,
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct VerifyingKeyG2<E: Pairing> {
    pub beta: E::G2Affine,
    pub gamma: E::G2Affine,
    pub delta: E::G2Affine,
}

/// Pairing key checking the commitment proofs of knowledge: `e(C, GSigmaNeg)·e(PoK, G) = 1`.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct CommitmentVerifyingKey<E: Pairing> {
    pub g: E::G2Affine,
    pub g_sigma_neg: E::G2Affine,
}

#[derive(Clone, Debug)]
pub struct VerifyingKey<E: Pairing> {
    pub g1: VerifyingKeyG1<E>,
    pub g2: VerifyingKeyG2<E>,
    pub commitment_key: CommitmentVerifyingKey<E>,
    /// Per commitment group, indices into the extended public vector.
    pub public_and_commitment_committed: Vec<Vec<usize>>,
    pub(crate) alpha_beta: PairingOutput<E>,
}

impl<E: Pairing> VerifyingKey<E> {
    pub fn new(
        g1: VerifyingKeyG1<E>,
        g2: VerifyingKeyG2<E>,
        commitment_key: CommitmentVerifyingKey<E>,
        public_and_commitment_committed: Vec<Vec<usize>>,
    ) -> Self {
        let alpha_beta = E::pairing(g1.alpha, g2.beta);
        Self {
            g1,
            g2,
            commitment_key,
            public_and_commitment_committed,
            alpha_beta,
        }
    }

    pub fn nb_commitments(&self) -> usize {
        self.public_and_commitment_committed.len()
    }

    /// Public wires including the constant-one wire.
    pub fn nb_public_wires(&self) -> usize {
        self.g1.k.len().saturating_sub(self.nb_commitments())
    }

    /// `e(α, β)`, fixed at construction.
    pub fn alpha_beta(&self) -> &PairingOutput<E> {
        &self.alpha_beta
    }

    pub fn check_shape(&self) -> Result<(), String> {
        let nb_commitments = self.nb_commitments();
        if self.g1.k.len() < 1 + nb_commitments {
            return Err(format!(
                "K has {} points for {} commitment groups",
                self.g1.k.len(),
                nb_commitments
            ));
        }
        let nb_public = self.nb_public_wires();
        for (i, committed) in self.public_and_commitment_committed.iter().enumerate() {
            if let Some(&index) = committed.iter().find(|&&index| index >= nb_public + i) {
                return Err(format!(
                    "commitment group {i} commits extended public index {index}, which is not yet defined"
                ));
            }
        }
        Ok(())
    }
}

impl<E: Pairing> PartialEq for VerifyingKey<E> {
    fn eq(&self, other: &Self) -> bool {
        self.g1 == other.g1
            && self.g2 == other.g2
            && self.commitment_key == other.commitment_key
            && self.public_and_commitment_committed == other.public_and_commitment_committed
    }
}

impl<E: Pairing> Eq for VerifyingKey<E> {}
