use ciphervote_fhe::FheError;
use ciphervote_token::TokenError;
use ciphervote_types::ProposalId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    // ── Validation ─────────────────────────────────────────────────────
    #[error("input proof rejected")]
    InvalidProof,

    #[error("address is not eligible to vote on this proposal")]
    NotEligible,

    #[error("voting is not open")]
    VotingNotOpen,

    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("proposal uses a different voting mode")]
    WrongVotingMode,

    #[error("ballot carries {got} encrypted values, expected {expected}")]
    PayloadLengthMismatch { expected: usize, got: usize },

    #[error("prediction stake must be non-zero")]
    ZeroStake,

    #[error("only the proposal creator may do this")]
    NotAuthorized,

    // ── Sequencing ─────────────────────────────────────────────────────
    #[error("address {0} has already voted on this proposal")]
    AlreadyVoted(String),

    #[error("voting window has not closed yet")]
    VotingNotClosed,

    #[error("tally reveal already requested")]
    RevealAlreadyRequested,

    #[error("no tally reveal is pending")]
    RevealNotRequested,

    #[error("proposal already resolved")]
    AlreadyResolved,

    #[error("results have not been revealed yet")]
    ResultsNotRevealed,

    #[error("prediction market is not enabled for this proposal")]
    PredictionMarketDisabled,

    #[error("predictions already revealed for payout")]
    PredictionsAlreadyRevealed,

    #[error("predictions have not been revealed for payout")]
    PredictionsNotRevealed,

    #[error("no active prediction")]
    NoActivePrediction,

    #[error("winnings already claimed")]
    AlreadyClaimed,

    #[error("prediction is not a winner")]
    NotAWinner,

    #[error("{addresses} addresses but {choices} decrypted choices")]
    TallyLengthMismatch { addresses: usize, choices: usize },

    // ── External dependency ────────────────────────────────────────────
    #[error("decryption proof rejected")]
    InvalidDecryptionProof,

    #[error("callback for unknown reveal request {0}")]
    UnknownRevealRequest(String),

    #[error("revealed {got} totals, expected {expected}")]
    TotalsLengthMismatch { expected: usize, got: usize },

    #[error("proposal {0} not found")]
    ProposalNotFound(ProposalId),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("confidential backend error: {0}")]
    Fhe(#[from] FheError),

    #[error("config error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl GovernanceError {
    /// Map a backend input-verification failure to the engine's taxonomy.
    pub(crate) fn from_input(err: FheError) -> Self {
        match err {
            FheError::InvalidProof(_) => Self::InvalidProof,
            other => Self::Fhe(other),
        }
    }
}
