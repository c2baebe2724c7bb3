//! 256-bit Blake2b digests.
//!
//! Simulated backends derive ciphertext handles, input proofs and
//! decryption proofs from these; the CLI derives script addresses.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;

pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_256_multi(&[data])
}

/// Digest of `parts` fed in order. Callers lead with a domain tag such as
/// `b"decryption-proof"` so digests of different kinds never collide.
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let digest = parts
        .iter()
        .fold(Blake2b256::new(), |hasher, part| hasher.chain_update(part))
        .finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&digest);
    output
}
