//! Confidential-integer port for the ciphervote engine.
//!
//! The homomorphic scheme itself lives outside this workspace. The engine
//! only ever sees opaque [`Ciphertext`] handles and talks to two services:
//!
//! - a [`ConfidentialBackend`] that validates client inputs against their
//!   zero-knowledge proofs and evaluates additions/selections on handles;
//! - a [`RevealOracle`] that accepts a one-shot decryption request and later
//!   produces plaintexts together with a proof the engine can check.

pub mod ciphertext;
pub mod codec;
pub mod error;
pub mod hash;

pub use ciphertext::{Ciphertext, DecryptionProof, EncryptedInput, InputConstraint, InputProof};
pub use codec::{decode_totals, encode_totals};
pub use error::FheError;

use ciphervote_types::{Address, RequestId};

/// Homomorphic evaluation over opaque handles.
///
/// Implementations never expose plaintexts through this trait. Each call
/// returns a fresh handle; callers must not compare handles to learn values.
pub trait ConfidentialBackend: Send + Sync {
    /// Validate a batch of client-encrypted inputs against a single proof.
    ///
    /// The proof binds the inputs to `owner` and attests `constraint`
    /// (bit width, range, or a fixed sum across the batch).
    fn verify_inputs(
        &self,
        owner: &Address,
        inputs: &[EncryptedInput],
        proof: &InputProof,
        constraint: InputConstraint,
    ) -> Result<Vec<Ciphertext>, FheError>;

    /// Encrypt a public constant.
    fn trivial(&self, value: u128) -> Result<Ciphertext, FheError>;

    /// `a + b`.
    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError>;

    /// `a * k` for a public scalar `k`.
    fn mul_plain(&self, a: &Ciphertext, k: u128) -> Result<Ciphertext, FheError>;

    /// Encrypted `1` when `a == k`, encrypted `0` otherwise.
    fn eq_plain(&self, a: &Ciphertext, k: u128) -> Result<Ciphertext, FheError>;

    /// `cond ? a : b` where `cond` is an encrypted 0/1.
    fn select(
        &self,
        cond: &Ciphertext,
        a: &Ciphertext,
        b: &Ciphertext,
    ) -> Result<Ciphertext, FheError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}

/// Asynchronous decryption service.
///
/// `submit` returns immediately with a correlation id; the plaintexts arrive
/// later through the engine's callback entrypoint, accompanied by a proof
/// that `verify` accepts only for the exact request, handles, and values.
pub trait RevealOracle: Send + Sync {
    fn submit(&self, handles: &[Ciphertext]) -> Result<RequestId, FheError>;

    fn verify(
        &self,
        request: RequestId,
        handles: &[Ciphertext],
        plaintexts: &[u128],
        proof: &DecryptionProof,
    ) -> bool;

    fn name(&self) -> &str;
}
