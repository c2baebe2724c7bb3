//! Governance events for subscribers.

use crate::tally::Outcome;
use ciphervote_fhe::Ciphertext;
use ciphervote_types::{Address, ProposalId, RequestId};
use serde::Serialize;

/// Events observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum GovernanceEvent {
    ProposalCreated {
        proposal: ProposalId,
        creator: Address,
    },
    VoteCast {
        proposal: ProposalId,
        voter: Address,
    },
    /// Tally handles were submitted for public decryption.
    RevealRequested {
        proposal: ProposalId,
        request: RequestId,
        handles: Vec<Ciphertext>,
    },
    ProposalResolved {
        proposal: ProposalId,
        outcome: Outcome,
        totals: Vec<u128>,
    },
    PredictionMade {
        proposal: ProposalId,
        predictor: Address,
        stake: u128,
    },
    PredictionCancelled {
        proposal: ProposalId,
        predictor: Address,
        refund: u128,
        fee: u128,
    },
    /// Prediction handles were made publicly decryptable.
    PredictionsRevealed {
        proposal: ProposalId,
        request: Option<RequestId>,
        handles: Vec<(Address, Ciphertext)>,
    },
    PredictionsTallied {
        proposal: ProposalId,
        winners: usize,
        losers: usize,
    },
    WinningsClaimed {
        proposal: ProposalId,
        winner: Address,
        payout: u128,
    },
    FeesWithdrawn {
        proposal: ProposalId,
        to: Address,
        amount: u128,
    },
}

/// Synchronous fan-out event bus.
///
/// Listeners run inline on the emitting call; keep them fast.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&GovernanceEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&GovernanceEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &GovernanceEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
