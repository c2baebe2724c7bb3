//! Nullable reveal oracle: decrypts from the `NullFhe` side table.

use crate::fhe::NullFhe;
use ciphervote_fhe::hash::blake2b_256_multi;
use ciphervote_fhe::{Ciphertext, DecryptionProof, FheError, RevealOracle};
use ciphervote_types::RequestId;
use std::sync::{Arc, Mutex};

/// A deterministic decryption oracle for testing.
///
/// `submit` only records the request. Tests (or the replay tool) call
/// [`NullOracle::fulfil`] to obtain the plaintexts and a proof, then feed them
/// to the engine's callback entrypoint, mimicking the off-chain relayer.
pub struct NullOracle {
    fhe: Arc<NullFhe>,
    key: [u8; 32],
    requests: Mutex<Vec<(RequestId, Vec<Ciphertext>)>>,
}

impl NullOracle {
    pub fn new(fhe: Arc<NullFhe>) -> Self {
        Self::with_key(fhe, [0x5a; 32])
    }

    /// Create an oracle whose proofs are keyed by `key`.
    pub fn with_key(fhe: Arc<NullFhe>, key: [u8; 32]) -> Self {
        Self {
            fhe,
            key,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The most recently submitted request.
    pub fn last_request(&self) -> Option<(RequestId, Vec<Ciphertext>)> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Decrypt a submitted request and sign the result.
    pub fn fulfil(&self, request: RequestId) -> Option<(Vec<u128>, DecryptionProof)> {
        let handles = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == request)
            .map(|(_, handles)| handles.clone())?;
        let plaintexts = handles
            .iter()
            .map(|h| self.fhe.decrypt(h))
            .collect::<Option<Vec<_>>>()?;
        let proof = self.sign(request, &handles, &plaintexts);
        Some((plaintexts, proof))
    }

    fn sign(&self, request: RequestId, handles: &[Ciphertext], plaintexts: &[u128]) -> DecryptionProof {
        let request_bytes = request.raw().to_be_bytes();
        let value_bytes: Vec<[u8; 16]> = plaintexts.iter().map(|v| v.to_be_bytes()).collect();
        let mut parts: Vec<&[u8]> = Vec::new();
        parts.push(b"decryption-proof");
        parts.push(&self.key);
        parts.push(&request_bytes);
        parts.extend(handles.iter().map(|h| h.as_bytes().as_slice()));
        parts.extend(value_bytes.iter().map(|v| v.as_slice()));
        DecryptionProof(blake2b_256_multi(&parts).to_vec())
    }
}

impl RevealOracle for NullOracle {
    fn submit(&self, handles: &[Ciphertext]) -> Result<RequestId, FheError> {
        let mut requests = self.requests.lock().unwrap();
        if requests.iter().any(|(_, existing)| existing.as_slice() == handles) {
            return Err(FheError::RevealRejected(
                "a request for this handle set already exists".into(),
            ));
        }
        let id = RequestId::new(requests.len() as u64 + 1);
        requests.push((id, handles.to_vec()));
        Ok(id)
    }

    fn verify(
        &self,
        request: RequestId,
        handles: &[Ciphertext],
        plaintexts: &[u128],
        proof: &DecryptionProof,
    ) -> bool {
        let known = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .any(|(id, hs)| *id == request && hs.as_slice() == handles);
        known && self.sign(request, handles, plaintexts) == *proof
    }

    fn name(&self) -> &str {
        "null-oracle"
    }
}
