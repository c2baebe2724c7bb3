//! Proposals and their lifecycle.

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::tally::{Outcome, BPS_DENOMINATOR, DRAW_SENTINEL};
use ciphervote_types::{Address, ProposalId, SpaceId, Timestamp};
use serde::{Deserialize, Serialize};

/// Label of the synthetic choice appended when a proposal allows abstaining.
pub const ABSTAIN_LABEL: &str = "Abstain";

/// How a ballot contributes to the choice tallies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VotingMode {
    /// One address, one vote, for exactly one choice.
    NonWeightedSingleChoice,
    /// The voter's token balance goes entirely to one choice.
    WeightedSingleChoice,
    /// The voter's token balance is split across choices by percentage.
    WeightedFractional,
}

impl VotingMode {
    pub fn is_weighted(&self) -> bool {
        !matches!(self, Self::NonWeightedSingleChoice)
    }

    /// Human-readable name of this mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NonWeightedSingleChoice => "non_weighted_single_choice",
            Self::WeightedSingleChoice => "weighted_single_choice",
            Self::WeightedFractional => "weighted_fractional",
        }
    }
}

/// Who may cast a ballot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EligibilityMode {
    Public,
    TokenHolder,
}

/// Eligibility mode plus its token parameters.
///
/// `token` doubles as the weight token of weighted voting modes, so a
/// `Public` proposal may still carry one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityRule {
    pub mode: EligibilityMode,
    pub token: Option<Address>,
    /// Minimum live balance for `TokenHolder`.
    pub threshold: u128,
}

impl EligibilityRule {
    pub fn public() -> Self {
        Self {
            mode: EligibilityMode::Public,
            token: None,
            threshold: 0,
        }
    }

    pub fn token_holder(token: Address, threshold: u128) -> Self {
        Self {
            mode: EligibilityMode::TokenHolder,
            token: Some(token),
            threshold,
        }
    }

    /// Public eligibility with a weight token attached.
    pub fn public_weighted(token: Address) -> Self {
        Self {
            mode: EligibilityMode::Public,
            token: Some(token),
            threshold: 0,
        }
    }
}

/// Creation inputs of a proposal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposalParams {
    pub space: SpaceId,
    pub title: String,
    pub body_uri: String,
    pub voting_mode: VotingMode,
    /// Choice labels, not including Abstain.
    pub choices: Vec<String>,
    pub start: Timestamp,
    pub end: Timestamp,
    pub eligibility: EligibilityRule,
    pub include_abstain: bool,
    /// Minimum share of non-abstain votes the leader needs; 0 = plurality.
    pub passing_threshold_bps: u16,
    pub prediction_market_enabled: bool,
    pub prediction_token: Option<Address>,
}

impl ProposalParams {
    /// Public, plurality-only, no abstain, no prediction market.
    pub fn new(
        space: SpaceId,
        title: impl Into<String>,
        voting_mode: VotingMode,
        choices: Vec<String>,
        start: Timestamp,
        end: Timestamp,
    ) -> Self {
        Self {
            space,
            title: title.into(),
            body_uri: String::new(),
            voting_mode,
            choices,
            start,
            end,
            eligibility: EligibilityRule::public(),
            include_abstain: false,
            passing_threshold_bps: 0,
            prediction_market_enabled: false,
            prediction_token: None,
        }
    }
}

/// A proposal as recorded by the ledger. Immutable after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub creator: Address,
    pub space: SpaceId,
    pub title: String,
    pub body_uri: String,
    pub voting_mode: VotingMode,
    /// Choice labels, Abstain last when present.
    pub choices: Vec<String>,
    pub abstain_index: Option<u8>,
    pub start: Timestamp,
    pub end: Timestamp,
    pub eligibility: EligibilityRule,
    pub passing_threshold_bps: u16,
    pub prediction_market_enabled: bool,
    pub prediction_token: Option<Address>,
    /// Revealed plaintexts are divided by this before being stored.
    pub tally_scale: u128,
    pub created_at: Timestamp,
}

impl Proposal {
    /// Validate creation inputs and build the immutable record.
    pub fn from_params(
        id: ProposalId,
        creator: Address,
        params: ProposalParams,
        config: &GovernanceConfig,
        now: Timestamp,
    ) -> Result<Self, GovernanceError> {
        let invalid = |reason: &str| Err(GovernanceError::InvalidProposal(reason.to_string()));

        if params.title.trim().is_empty() {
            return invalid("title must not be empty");
        }
        if params.choices.len() < 2 {
            return invalid("at least two choices are required");
        }
        let total = params.choices.len() + usize::from(params.include_abstain);
        if total > usize::from(config.max_choices) {
            return Err(GovernanceError::InvalidProposal(format!(
                "{total} choices exceed the maximum of {}",
                config.max_choices
            )));
        }
        if params.end <= params.start {
            return invalid("end must be after start");
        }
        if u64::from(params.passing_threshold_bps) > BPS_DENOMINATOR {
            return invalid("passing threshold exceeds 10000 bps");
        }
        if params.eligibility.mode == EligibilityMode::TokenHolder
            && params.eligibility.token.is_none()
        {
            return invalid("token-holder eligibility requires a token");
        }
        if params.voting_mode.is_weighted() && params.eligibility.token.is_none() {
            return invalid("weighted voting requires a weight token");
        }
        if params.prediction_market_enabled && params.prediction_token.is_none() {
            return invalid("prediction market requires a stake token");
        }

        let mut choices = params.choices;
        let abstain_index = if params.include_abstain {
            choices.push(ABSTAIN_LABEL.to_string());
            // `total <= max_choices < DRAW_SENTINEL` so this always fits.
            u8::try_from(choices.len() - 1).ok()
        } else {
            None
        };
        let tally_scale = match params.voting_mode {
            VotingMode::WeightedFractional => u128::from(config.fractional_scale),
            _ => 1,
        };

        Ok(Self {
            id,
            creator,
            space: params.space,
            title: params.title,
            body_uri: params.body_uri,
            voting_mode: params.voting_mode,
            choices,
            abstain_index,
            start: params.start,
            end: params.end,
            eligibility: params.eligibility,
            passing_threshold_bps: params.passing_threshold_bps,
            prediction_market_enabled: params.prediction_market_enabled,
            prediction_token: params.prediction_token,
            tally_scale,
            created_at: now,
        })
    }

    /// Number of tallies, Abstain included.
    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    /// Token whose live balance is a weighted ballot's weight.
    pub fn weight_token(&self) -> Option<&Address> {
        self.eligibility.token.as_ref()
    }

    /// Whether `now` falls inside `[start, end)`.
    pub fn is_voting_open(&self, now: Timestamp) -> bool {
        now >= self.start && now < self.end
    }

    pub fn has_voting_ended(&self, now: Timestamp) -> bool {
        now >= self.end
    }
}

/// Lifecycle phase of a proposal.
///
/// `Scheduled → Open → Closed` are implicit in the clock; the reveal request
/// moves a closed proposal to `RevealPending` and the oracle callback moves it
/// to `Resolved`. Revealing and resolving happen in the same callback, so the
/// revealed-but-unresolved state is never observable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalPhase {
    Scheduled,
    Open,
    Closed,
    RevealPending,
    Resolved,
}

/// Resolution flags. Transitions monotonically; never reverts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionState {
    pub results_revealed: bool,
    pub proposal_resolved: bool,
    pub winning_choice: u8,
    pub proposal_passed: bool,
}

impl ResolutionState {
    pub fn unresolved() -> Self {
        Self {
            results_revealed: false,
            proposal_resolved: false,
            winning_choice: DRAW_SENTINEL,
            proposal_passed: false,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.proposal_resolved.then_some(Outcome {
            winning_choice: self.winning_choice,
            passed: self.proposal_passed,
        })
    }
}
