//! Replay script format.
//!
//! A script is a TOML document with an ordered list of `[[steps]]`. Accounts
//! and tokens are referred to by name; each name maps to a stable address.
//! Proposals are referred to by the 1-based id the engine assigns.

use anyhow::Context;
use ciphervote_fhe::hash::blake2b_256;
use ciphervote_governance::{EligibilityRule, ProposalParams, VotingMode};
use ciphervote_types::{Address, SpaceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
pub struct Script {
    /// Clock reading before the first step.
    #[serde(default)]
    pub start_time: u64,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing script {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Public,
    TokenHolder,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Mint {
        token: String,
        holder: String,
        amount: u64,
    },
    Create {
        creator: String,
        #[serde(default = "default_space")]
        space: String,
        title: String,
        mode: VotingMode,
        choices: Vec<String>,
        start: u64,
        end: u64,
        #[serde(default = "default_eligibility")]
        eligibility: Eligibility,
        /// Eligibility and weight token.
        token: Option<String>,
        #[serde(default)]
        threshold: u64,
        #[serde(default)]
        include_abstain: bool,
        #[serde(default)]
        passing_threshold_bps: u16,
        /// Enables the prediction market when set.
        prediction_token: Option<String>,
    },
    Advance {
        secs: u64,
    },
    SetTime {
        at: u64,
    },
    Vote {
        proposal: u64,
        voter: String,
        /// Single-choice modes.
        choice: Option<u8>,
        /// Fractional mode: one percentage per choice.
        split: Option<Vec<u8>>,
    },
    /// Run upkeep on every proposal that needs it.
    Upkeep,
    /// Relay the oracle's answer for a pending reveal.
    Fulfil {
        proposal: u64,
    },
    Predict {
        proposal: u64,
        who: String,
        choice: u8,
        stake: u64,
    },
    Cancel {
        proposal: u64,
        who: String,
    },
    RevealPredictions {
        proposal: u64,
        caller: String,
    },
    /// Decrypt the revealed predictions and submit them to the tally.
    TallyPredictions {
        proposal: u64,
        caller: String,
    },
    Claim {
        proposal: u64,
        who: String,
    },
    WithdrawFees {
        proposal: u64,
        caller: String,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::Create { .. } => "create",
            Self::Advance { .. } => "advance",
            Self::SetTime { .. } => "set_time",
            Self::Vote { .. } => "vote",
            Self::Upkeep => "upkeep",
            Self::Fulfil { .. } => "fulfil",
            Self::Predict { .. } => "predict",
            Self::Cancel { .. } => "cancel",
            Self::RevealPredictions { .. } => "reveal_predictions",
            Self::TallyPredictions { .. } => "tally_predictions",
            Self::Claim { .. } => "claim",
            Self::WithdrawFees { .. } => "withdraw_fees",
        }
    }
}

fn default_space() -> String {
    "default".into()
}

fn default_eligibility() -> Eligibility {
    Eligibility::Public
}

/// Stable address for a script name. `0x`-prefixed names are parsed as-is.
pub fn named_address(name: &str) -> anyhow::Result<Address> {
    if name.starts_with(Address::PREFIX) {
        return Ok(name.parse()?);
    }
    let digest = blake2b_256(name.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Ok(Address::from_bytes(bytes))
}

/// Build engine creation params from a `create` step.
pub fn proposal_params(step: &Step) -> anyhow::Result<ProposalParams> {
    let Step::Create {
        space,
        title,
        mode,
        choices,
        start,
        end,
        eligibility,
        token,
        threshold,
        include_abstain,
        passing_threshold_bps,
        prediction_token,
        ..
    } = step
    else {
        anyhow::bail!("not a create step");
    };
    let mut params = ProposalParams::new(
        SpaceId::new(space.clone()),
        title.clone(),
        *mode,
        choices.clone(),
        Timestamp::new(*start),
        Timestamp::new(*end),
    );
    let token = token.as_deref().map(named_address).transpose()?;
    params.eligibility = match (eligibility, token) {
        (Eligibility::TokenHolder, Some(token)) => {
            EligibilityRule::token_holder(token, u128::from(*threshold))
        }
        (Eligibility::TokenHolder, None) => {
            anyhow::bail!("token_holder eligibility needs a token")
        }
        (Eligibility::Public, Some(token)) => EligibilityRule::public_weighted(token),
        (Eligibility::Public, None) => EligibilityRule::public(),
    };
    params.include_abstain = *include_abstain;
    params.passing_threshold_bps = *passing_threshold_bps;
    if let Some(name) = prediction_token {
        params.prediction_market_enabled = true;
        params.prediction_token = Some(named_address(name)?);
    }
    Ok(params)
}
