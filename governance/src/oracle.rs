//! Reveal oracle adapter: one-shot request, proof-checked callback.
//!
//! The request is a two-phase continuation: `submit` stores the correlation
//! id in ledger state, and the later callback is matched against it. A
//! callback whose proof fails leaves the request pending so the relayer can
//! resubmit with a correct proof; the reveal itself is never re-requested.

use crate::error::GovernanceError;
use ciphervote_fhe::{decode_totals, Ciphertext, DecryptionProof, RevealOracle};
use ciphervote_types::RequestId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An outstanding decryption request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReveal {
    pub request: RequestId,
    pub handles: Vec<Ciphertext>,
}

/// Thin async boundary in front of a [`RevealOracle`].
#[derive(Clone)]
pub struct RevealOracleAdapter {
    oracle: Arc<dyn RevealOracle>,
}

impl RevealOracleAdapter {
    pub fn new(oracle: Arc<dyn RevealOracle>) -> Self {
        Self { oracle }
    }

    /// Submit `handles` for decryption.
    pub fn submit(&self, handles: Vec<Ciphertext>) -> Result<PendingReveal, GovernanceError> {
        let request = self.oracle.submit(&handles)?;
        tracing::debug!(
            oracle = self.oracle.name(),
            %request,
            handles = handles.len(),
            "decryption requested"
        );
        Ok(PendingReveal { request, handles })
    }

    /// Check a callback against `pending` and return the decoded plaintexts.
    ///
    /// Never mutates anything: on error the caller keeps its pending state.
    pub fn verify_callback(
        &self,
        pending: &PendingReveal,
        request: RequestId,
        encoded_plaintexts: &[u8],
        proof: &DecryptionProof,
    ) -> Result<Vec<u128>, GovernanceError> {
        if request != pending.request {
            return Err(GovernanceError::UnknownRevealRequest(request.to_string()));
        }
        let plaintexts = decode_totals(encoded_plaintexts)?;
        if plaintexts.len() != pending.handles.len() {
            return Err(GovernanceError::TotalsLengthMismatch {
                expected: pending.handles.len(),
                got: plaintexts.len(),
            });
        }
        if !self
            .oracle
            .verify(request, &pending.handles, &plaintexts, proof)
        {
            tracing::warn!(%request, "rejected decryption proof");
            return Err(GovernanceError::InvalidDecryptionProof);
        }
        Ok(plaintexts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciphervote_fhe::{encode_totals, ConfidentialBackend};
    use ciphervote_nullables::{NullFhe, NullOracle};

    fn setup() -> (Arc<NullFhe>, Arc<NullOracle>, RevealOracleAdapter) {
        let fhe = Arc::new(NullFhe::new());
        let oracle = Arc::new(NullOracle::new(fhe.clone()));
        let adapter = RevealOracleAdapter::new(oracle.clone());
        (fhe, oracle, adapter)
    }

    #[test]
    fn test_valid_callback_returns_plaintexts() {
        let (fhe, oracle, adapter) = setup();
        let handles = vec![fhe.trivial(2).unwrap(), fhe.trivial(1).unwrap()];
        let pending = adapter.submit(handles).unwrap();
        let (plaintexts, proof) = oracle.fulfil(pending.request).unwrap();
        let encoded = encode_totals(&plaintexts).unwrap();
        let revealed = adapter
            .verify_callback(&pending, pending.request, &encoded, &proof)
            .unwrap();
        assert_eq!(revealed, vec![2, 1]);
    }

    #[test]
    fn test_tampered_totals_rejected() {
        let (fhe, oracle, adapter) = setup();
        let handles = vec![fhe.trivial(2).unwrap(), fhe.trivial(1).unwrap()];
        let pending = adapter.submit(handles).unwrap();
        let (_, proof) = oracle.fulfil(pending.request).unwrap();
        let encoded = encode_totals(&[1, 2]).unwrap();
        let err = adapter
            .verify_callback(&pending, pending.request, &encoded, &proof)
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidDecryptionProof));
    }

    #[test]
    fn test_wrong_request_id() {
        let (fhe, oracle, adapter) = setup();
        let pending = adapter.submit(vec![fhe.trivial(2).unwrap()]).unwrap();
        let (plaintexts, proof) = oracle.fulfil(pending.request).unwrap();
        let encoded = encode_totals(&plaintexts).unwrap();
        let err = adapter
            .verify_callback(&pending, RequestId::new(99), &encoded, &proof)
            .unwrap_err();
        assert!(matches!(err, GovernanceError::UnknownRevealRequest(_)));
    }

    #[test]
    fn test_wrong_length() {
        let (fhe, oracle, adapter) = setup();
        let pending = adapter.submit(vec![fhe.trivial(2).unwrap()]).unwrap();
        let (_, proof) = oracle.fulfil(pending.request).unwrap();
        let encoded = encode_totals(&[2, 0]).unwrap();
        let err = adapter
            .verify_callback(&pending, pending.request, &encoded, &proof)
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::TotalsLengthMismatch { expected: 1, got: 2 }
        ));
    }
}
