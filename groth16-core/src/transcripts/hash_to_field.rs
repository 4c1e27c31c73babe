use std::fmt::Debug;

use ark_ff::PrimeField;
use sha3::{Digest, Sha3_256};

/// Bytes a [`FieldHasher`] outputs per call. Twice the width of every supported scalar
/// field, so reducing them modulo the field order has negligible bias.
pub const WIDE_DIGEST_LEN: usize = 64;

/// Domain-separated hash producing a wide digest that is reduced into a scalar field.
/// Prover and verifier must agree on the implementation.
pub trait FieldHasher: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn hash(&self, dst: &[u8], msg: &[u8]) -> [u8; WIDE_DIGEST_LEN];
}

/// SHA3-256 in counter mode: `H(len(dst) ‖ dst ‖ i ‖ msg)` for `i = 0, 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sha3FieldHasher;

impl FieldHasher for Sha3FieldHasher {
    fn name(&self) -> &'static str {
        "sha3-256"
    }

    fn hash(&self, dst: &[u8], msg: &[u8]) -> [u8; WIDE_DIGEST_LEN] {
        let mut out = [0u8; WIDE_DIGEST_LEN];
        for (i, chunk) in out.chunks_mut(32).enumerate() {
            let mut hasher = Sha3_256::new();
            hasher.update((dst.len() as u64).to_le_bytes());
            hasher.update(dst);
            hasher.update([i as u8]);
            hasher.update(msg);
            chunk.copy_from_slice(&hasher.finalize());
        }
        out
    }
}

pub fn hash_to_field<F: PrimeField>(hasher: &dyn FieldHasher, dst: &[u8], msg: &[u8]) -> F {
    F::from_le_bytes_mod_order(&hasher.hash(dst, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn domain_separation() {
        let hasher = Sha3FieldHasher;
        let x: Fr = hash_to_field(&hasher, b"bsb22-commitment", b"msg");
        let y: Fr = hash_to_field(&hasher, b"G16-BSB22", b"msg");
        let z: Fr = hash_to_field(&hasher, b"bsb22-commitment", b"msg");
        assert_ne!(x, y);
        assert_eq!(x, z);
    }

    #[test]
    fn halves_differ() {
        let digest = Sha3FieldHasher.hash(b"dst", b"");
        assert_ne!(digest[..32], digest[32..]);
    }
}
