mod hash_to_field;

pub use hash_to_field::{hash_to_field, FieldHasher, Sha3FieldHasher, WIDE_DIGEST_LEN};

/// Tag for the hash of a single commitment group.
pub const COMMITMENT_DST: &[u8] = b"bsb22-commitment";
/// Tag for the challenge folding all commitment proofs of knowledge.
pub const COMMITMENT_POK_DST: &[u8] = b"G16-BSB22";
