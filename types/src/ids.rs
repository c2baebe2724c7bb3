//! Identifiers for proposals, spaces, and reveal requests.

use crate::address::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable proposal identifier, assigned sequentially at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalId(u64);

impl ProposalId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The next id in sequence.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Escrow address holding this proposal's prediction-market stakes.
    ///
    /// The high byte is `0xff` so escrow addresses never collide with the
    /// small seed-derived addresses used for ordinary accounts.
    pub fn escrow_address(&self) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0xff;
        bytes[12..].copy_from_slice(&self.0.to_be_bytes());
        Address::from_bytes(bytes)
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal#{}", self.0)
    }
}

/// Space (organisation) a proposal belongs to. Membership is managed elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceId(String);

impl SpaceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation id of an asynchronous decryption request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_addresses_are_distinct() {
        let a = ProposalId::new(1).escrow_address();
        let b = ProposalId::new(2).escrow_address();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes()[0], 0xff);
    }

    #[test]
    fn test_next_increments() {
        assert_eq!(ProposalId::new(7).next(), ProposalId::new(8));
    }
}
