//! Confidential proposal voting and resolution.
//!
//! Ballots arrive encrypted and are folded into one homomorphic accumulator
//! per choice. After the voting window closes the accumulators are revealed
//! exactly once through an external decryption oracle; the callback's
//! plaintext totals decide the winner. An optional prediction market lets
//! participants stake on the outcome and claim proportional payouts.
//!
//! Key principle: no individual ballot is ever decrypted.

pub mod ballot;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod market;
pub mod oracle;
pub mod proposal;
pub mod tally;

pub use ballot::{Ballot, BallotContext};
pub use config::GovernanceConfig;
pub use eligibility::EligibilityGate;
pub use engine::{EngineSnapshot, GovernanceEngine, ProposalRecord};
pub use error::GovernanceError;
pub use event::{EventBus, GovernanceEvent};
pub use ledger::ProposalLedger;
pub use market::{
    Cancellation, PredictionMarket, PredictionMarketInfo, PredictionStake, TallySummary,
    UserPredictionInfo,
};
pub use oracle::{PendingReveal, RevealOracleAdapter};
pub use proposal::{
    EligibilityMode, EligibilityRule, Proposal, ProposalParams, ProposalPhase, ResolutionState,
    VotingMode, ABSTAIN_LABEL,
};
pub use tally::{compute_outcome, Outcome, DRAW_SENTINEL};
