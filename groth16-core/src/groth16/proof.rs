use ark_ec::pairing::Pairing;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Proof<E: Pairing> {
    pub ar: E::G1Affine,
    pub bs: E::G2Affine,
    pub krs: E::G1Affine,
    /// One Pedersen commitment per commitment group.
    pub commitments: Vec<E::G1Affine>,
    /// Folded proof of knowledge for all commitments, the identity when there are none.
    pub commitment_pok: E::G1Affine,
}
