//! Nullable confidential backend: plaintext-backed handles.

use ciphervote_fhe::hash::blake2b_256_multi;
use ciphervote_fhe::{
    Ciphertext, ConfidentialBackend, EncryptedInput, FheError, InputConstraint, InputProof,
};
use ciphervote_types::Address;
use std::collections::HashMap;
use std::sync::Mutex;

/// A simulated homomorphic backend for testing.
///
/// Each handle is a Blake2b digest of the operation that produced it, and the
/// plaintext is kept in a side table. Input proofs are digests binding the
/// owner to the exact input handles; constraint soundness is simulated by
/// checking the plaintexts directly.
pub struct NullFhe {
    values: Mutex<HashMap<[u8; 32], u128>>,
    nonce: Mutex<u64>,
}

impl NullFhe {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            nonce: Mutex::new(0),
        }
    }

    /// Client-side encryption of a batch of values for `owner`.
    pub fn encrypt(&self, owner: &Address, values: &[u128]) -> (Vec<EncryptedInput>, InputProof) {
        let mut inputs = Vec::with_capacity(values.len());
        let mut handles = Vec::with_capacity(values.len());
        for value in values {
            let handle = *self.store(&[b"input", owner.as_bytes()], *value).as_bytes();
            inputs.push(EncryptedInput(handle.to_vec()));
            handles.push(handle);
        }
        (inputs, input_proof(owner, &handles))
    }

    /// Client-side encryption of a single value for `owner`.
    pub fn encrypt_one(&self, owner: &Address, value: u128) -> (EncryptedInput, InputProof) {
        let (mut inputs, proof) = self.encrypt(owner, &[value]);
        (inputs.remove(0), proof)
    }

    /// Peek at the plaintext behind a handle.
    pub fn decrypt(&self, handle: &Ciphertext) -> Option<u128> {
        self.values.lock().unwrap().get(handle.as_bytes()).copied()
    }

    fn value(&self, handle: &Ciphertext) -> Result<u128, FheError> {
        self.decrypt(handle)
            .ok_or_else(|| FheError::UnknownHandle(handle.to_string()))
    }

    /// Record `value` under a fresh handle. Equal operations on equal
    /// operands still yield distinct handles, as with real ciphertexts.
    fn store(&self, parts: &[&[u8]], value: u128) -> Ciphertext {
        let nonce = {
            let mut nonce = self.nonce.lock().unwrap();
            *nonce += 1;
            nonce.to_be_bytes()
        };
        let mut parts = parts.to_vec();
        parts.push(&nonce);
        let handle = blake2b_256_multi(&parts);
        self.values.lock().unwrap().insert(handle, value);
        Ciphertext::from_bytes(handle)
    }
}

impl Default for NullFhe {
    fn default() -> Self {
        Self::new()
    }
}

fn input_proof(owner: &Address, handles: &[[u8; 32]]) -> InputProof {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(handles.len() + 2);
    parts.push(b"input-proof");
    parts.push(owner.as_bytes());
    parts.extend(handles.iter().map(|h| h.as_slice()));
    InputProof(blake2b_256_multi(&parts).to_vec())
}

impl ConfidentialBackend for NullFhe {
    fn verify_inputs(
        &self,
        owner: &Address,
        inputs: &[EncryptedInput],
        proof: &InputProof,
        constraint: InputConstraint,
    ) -> Result<Vec<Ciphertext>, FheError> {
        let mut handles = Vec::with_capacity(inputs.len());
        for input in inputs {
            let handle: [u8; 32] = input
                .0
                .as_slice()
                .try_into()
                .map_err(|_| FheError::InvalidProof("malformed input".into()))?;
            handles.push(handle);
        }
        if input_proof(owner, &handles) != *proof {
            return Err(FheError::InvalidProof(
                "proof does not bind these inputs to this owner".into(),
            ));
        }
        let cts: Vec<Ciphertext> = handles.into_iter().map(Ciphertext::from_bytes).collect();
        let values = cts
            .iter()
            .map(|c| self.value(c))
            .collect::<Result<Vec<_>, _>>()?;
        if !constraint.is_satisfied_by(&values) {
            return Err(FheError::InvalidProof(format!(
                "inputs violate {constraint:?}"
            )));
        }
        Ok(cts)
    }

    fn trivial(&self, value: u128) -> Result<Ciphertext, FheError> {
        Ok(self.store(&[b"trivial", &value.to_be_bytes()], value))
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError> {
        let sum = self
            .value(a)?
            .checked_add(self.value(b)?)
            .ok_or(FheError::Overflow)?;
        Ok(self.store(&[b"add", a.as_bytes(), b.as_bytes()], sum))
    }

    fn mul_plain(&self, a: &Ciphertext, k: u128) -> Result<Ciphertext, FheError> {
        let product = self.value(a)?.checked_mul(k).ok_or(FheError::Overflow)?;
        Ok(self.store(&[b"mul", a.as_bytes(), &k.to_be_bytes()], product))
    }

    fn eq_plain(&self, a: &Ciphertext, k: u128) -> Result<Ciphertext, FheError> {
        let bit = u128::from(self.value(a)? == k);
        Ok(self.store(&[b"eq", a.as_bytes(), &k.to_be_bytes()], bit))
    }

    fn select(
        &self,
        cond: &Ciphertext,
        a: &Ciphertext,
        b: &Ciphertext,
    ) -> Result<Ciphertext, FheError> {
        let picked = if self.value(cond)? != 0 {
            self.value(a)?
        } else {
            self.value(b)?
        };
        Ok(self.store(
            &[b"select", cond.as_bytes(), a.as_bytes(), b.as_bytes()],
            picked,
        ))
    }

    fn name(&self) -> &str {
        "null-fhe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(seed: u8) -> Address {
        Address::from_bytes([seed; 20])
    }

    #[test]
    fn test_arithmetic_tracks_plaintexts() {
        let fhe = NullFhe::new();
        let a = fhe.trivial(40).unwrap();
        let b = fhe.trivial(2).unwrap();
        let sum = fhe.add(&a, &b).unwrap();
        assert_eq!(fhe.decrypt(&sum), Some(42));
        let scaled = fhe.mul_plain(&sum, 10).unwrap();
        assert_eq!(fhe.decrypt(&scaled), Some(420));
    }

    #[test]
    fn test_select_by_equality() {
        let fhe = NullFhe::new();
        let choice = fhe.trivial(1).unwrap();
        let one = fhe.trivial(1).unwrap();
        let zero = fhe.trivial(0).unwrap();
        let hit = fhe.eq_plain(&choice, 1).unwrap();
        let miss = fhe.eq_plain(&choice, 0).unwrap();
        assert_eq!(fhe.decrypt(&fhe.select(&hit, &one, &zero).unwrap()), Some(1));
        assert_eq!(fhe.decrypt(&fhe.select(&miss, &one, &zero).unwrap()), Some(0));
    }

    #[test]
    fn test_verify_inputs_accepts_owner_proof() {
        let fhe = NullFhe::new();
        let (inputs, proof) = fhe.encrypt(&owner(1), &[60, 30, 10]);
        let cts = fhe
            .verify_inputs(
                &owner(1),
                &inputs,
                &proof,
                InputConstraint::SumEquals { bits: 8, total: 100 },
            )
            .unwrap();
        assert_eq!(cts.len(), 3);
        assert_eq!(fhe.decrypt(&cts[0]), Some(60));
    }

    #[test]
    fn test_verify_inputs_rejects_other_owner() {
        let fhe = NullFhe::new();
        let (input, proof) = fhe.encrypt_one(&owner(1), 0);
        let result = fhe.verify_inputs(&owner(2), &[input], &proof, InputConstraint::Bits(8));
        assert!(matches!(result, Err(FheError::InvalidProof(_))));
    }

    #[test]
    fn test_verify_inputs_rejects_constraint_violation() {
        let fhe = NullFhe::new();
        let (input, proof) = fhe.encrypt_one(&owner(1), 5);
        let result = fhe.verify_inputs(
            &owner(1),
            &[input],
            &proof,
            InputConstraint::LessThan { bits: 8, bound: 3 },
        );
        assert!(matches!(result, Err(FheError::InvalidProof(_))));
    }

    #[test]
    fn test_equal_operations_yield_distinct_handles() {
        let fhe = NullFhe::new();
        let a = fhe.trivial(0).unwrap();
        let b = fhe.trivial(0).unwrap();
        assert_ne!(a, b);
        assert_eq!(fhe.decrypt(&a), fhe.decrypt(&b));
    }

    #[test]
    fn test_unknown_handle() {
        let fhe = NullFhe::new();
        let bogus = Ciphertext::from_bytes([7u8; 32]);
        assert!(matches!(fhe.add(&bogus, &bogus), Err(FheError::UnknownHandle(_))));
    }
}
