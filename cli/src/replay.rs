//! Deterministic replay of a [`Script`] against the nullable backends.

use crate::script::{named_address, proposal_params, Script, Step};
use anyhow::Context;
use ciphervote_fhe::encode_totals;
use ciphervote_governance::{
    GovernanceConfig, GovernanceEngine, GovernanceEvent, PredictionMarketInfo, ProposalPhase,
    VotingMode,
};
use ciphervote_nullables::{NullClock, NullFhe, NullOracle, NullTokens};
use ciphervote_token::TokenLedger;
use ciphervote_types::{Address, ProposalId};
use ciphervote_utils::format_duration;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Outcome of one script step.
#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub action: &'static str,
    pub at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final views of one proposal.
#[derive(Clone, Debug, Serialize)]
pub struct ProposalReport {
    pub id: u64,
    pub title: String,
    pub mode: VotingMode,
    pub choices: Vec<String>,
    pub voting_window: String,
    pub phase: ProposalPhase,
    pub voters: usize,
    pub choice_votes: Vec<u128>,
    pub results_revealed: bool,
    pub proposal_resolved: bool,
    pub winning_choice: Option<u8>,
    pub proposal_passed: bool,
    pub prediction_market: PredictionMarketInfo,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReplayReport {
    pub final_time: u64,
    pub steps: Vec<StepReport>,
    pub proposals: Vec<ProposalReport>,
    /// Balances by token name, then holder name.
    pub balances: BTreeMap<String, BTreeMap<String, u128>>,
    pub events: Vec<GovernanceEvent>,
}

struct Replayer {
    clock: NullClock,
    fhe: Arc<NullFhe>,
    oracle: Arc<NullOracle>,
    tokens: Arc<NullTokens>,
    engine: GovernanceEngine,
    /// Every (token, holder) name pair the script touched.
    touched: BTreeMap<String, Vec<String>>,
}

/// Run every step in order. A failing step is recorded and replay continues.
///
/// Returns the report and the final engine snapshot.
pub fn replay_with_snapshot(
    script: &Script,
    config: GovernanceConfig,
) -> anyhow::Result<(ReplayReport, Vec<u8>)> {
    let fhe = Arc::new(NullFhe::new());
    let oracle = Arc::new(NullOracle::new(fhe.clone()));
    let tokens = Arc::new(NullTokens::new());
    let mut engine = GovernanceEngine::new(config, fhe.clone(), oracle.clone(), tokens.clone());

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    engine.subscribe(Box::new(move |event| {
        if let Ok(mut events) = sink.lock() {
            events.push(event.clone());
        }
    }));

    let mut replayer = Replayer {
        clock: NullClock::new(script.start_time),
        fhe,
        oracle,
        tokens,
        engine,
        touched: BTreeMap::new(),
    };

    let mut steps = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let result = replayer.apply(step);
        let at = replayer.clock.now().as_secs();
        if let Err(e) = &result {
            tracing::warn!(index, action = step.name(), error = %e, "step failed");
        } else {
            tracing::debug!(index, action = step.name(), "step applied");
        }
        steps.push(StepReport {
            index,
            action: step.name(),
            at,
            error: result.err().map(|e| format!("{e:#}")),
        });
    }

    let proposals = replayer.proposal_reports()?;
    let balances = replayer.balances()?;
    let events = events
        .lock()
        .map(|events| events.clone())
        .map_err(|_| anyhow::anyhow!("event sink poisoned"))?;
    let report = ReplayReport {
        final_time: replayer.clock.now().as_secs(),
        steps,
        proposals,
        balances,
        events,
    };
    Ok((report, replayer.engine.save_state()?))
}

impl Replayer {
    fn touch(&mut self, token: &str, holder: &str) {
        let holders = self.touched.entry(token.to_string()).or_default();
        if !holders.iter().any(|h| h == holder) {
            holders.push(holder.to_string());
        }
    }

    fn prediction_token_name(&self, step: &Step) -> Option<String> {
        match step {
            Step::Create {
                prediction_token, ..
            } => prediction_token.clone(),
            _ => None,
        }
    }

    fn apply(&mut self, step: &Step) -> anyhow::Result<()> {
        let now = self.clock.now();
        match step {
            Step::Mint {
                token,
                holder,
                amount,
            } => {
                self.tokens.mint(
                    &named_address(token)?,
                    &named_address(holder)?,
                    u128::from(*amount),
                );
                self.touch(token, holder);
            }
            Step::Create { creator, .. } => {
                let params = proposal_params(step)?;
                let id = self
                    .engine
                    .create_proposal(&named_address(creator)?, params, now)?;
                if let Some(token) = self.prediction_token_name(step) {
                    self.touch(&token, creator);
                }
                tracing::info!(proposal = %id, "script created proposal");
            }
            Step::Advance { secs } => self.clock.advance(*secs),
            Step::SetTime { at } => self.clock.set(*at),
            Step::Vote {
                proposal,
                voter,
                choice,
                split,
            } => {
                let id = ProposalId::new(*proposal);
                let who = named_address(voter)?;
                let mode = self.engine.proposal(id)?.voting_mode;
                match (mode, choice, split) {
                    (VotingMode::NonWeightedSingleChoice, Some(c), _) => {
                        let (input, proof) = self.fhe.encrypt_one(&who, u128::from(*c));
                        self.engine.vote_nonweighted(id, &who, input, &proof, now)?;
                    }
                    (VotingMode::WeightedSingleChoice, Some(c), _) => {
                        let (input, proof) = self.fhe.encrypt_one(&who, u128::from(*c));
                        self.engine
                            .vote_weighted_single(id, &who, input, &proof, now)?;
                    }
                    (VotingMode::WeightedFractional, _, Some(pcts)) => {
                        let values: Vec<u128> = pcts.iter().map(|p| u128::from(*p)).collect();
                        let (inputs, proof) = self.fhe.encrypt(&who, &values);
                        self.engine
                            .vote_weighted_fractional(id, &who, inputs, &proof, now)?;
                    }
                    (mode, _, _) => anyhow::bail!(
                        "vote step does not carry the payload for {}",
                        mode.name()
                    ),
                }
            }
            Step::Upkeep => {
                for id in self.engine.pending_upkeeps(now) {
                    let request = self.engine.perform_upkeep(id, now)?;
                    tracing::info!(proposal = %id, %request, "upkeep requested reveal");
                }
            }
            Step::Fulfil { proposal } => {
                let id = ProposalId::new(*proposal);
                let pending = self
                    .engine
                    .pending_reveal(id)?
                    .context("no reveal pending")?;
                let (plaintexts, proof) = self
                    .oracle
                    .fulfil(pending.request)
                    .context("oracle does not know the request")?;
                let encoded = encode_totals(&plaintexts)?;
                self.engine
                    .resolve_proposal_callback(id, pending.request, &encoded, &proof)?;
            }
            Step::Predict {
                proposal,
                who,
                choice,
                stake,
            } => {
                let id = ProposalId::new(*proposal);
                let addr = named_address(who)?;
                let (input, proof) = self.fhe.encrypt_one(&addr, u128::from(*choice));
                self.engine
                    .make_prediction(id, &addr, &input, &proof, u128::from(*stake))?;
            }
            Step::Cancel { proposal, who } => {
                self.engine
                    .cancel_prediction(ProposalId::new(*proposal), &named_address(who)?)?;
            }
            Step::RevealPredictions { proposal, caller } => {
                self.engine.reveal_predictions_for_payout(
                    ProposalId::new(*proposal),
                    &named_address(caller)?,
                )?;
            }
            Step::TallyPredictions { proposal, caller } => {
                let id = ProposalId::new(*proposal);
                let reveal = self
                    .engine
                    .prediction_reveal(id)?
                    .context("predictions have not been revealed")?;
                let mut addresses: Vec<Address> = Vec::with_capacity(reveal.len());
                let mut choices = Vec::with_capacity(reveal.len());
                for (addr, handle) in reveal {
                    let value = self
                        .fhe
                        .decrypt(&handle)
                        .context("unknown prediction handle")?;
                    addresses.push(addr);
                    choices.push(u8::try_from(value)?);
                }
                self.engine
                    .tally_predictions(id, &named_address(caller)?, &addresses, &choices)?;
            }
            Step::Claim { proposal, who } => {
                self.engine
                    .claim_winnings(ProposalId::new(*proposal), &named_address(who)?)?;
            }
            Step::WithdrawFees { proposal, caller } => {
                self.engine
                    .withdraw_fees(ProposalId::new(*proposal), &named_address(caller)?)?;
            }
        }
        Ok(())
    }

    fn proposal_reports(&self) -> anyhow::Result<Vec<ProposalReport>> {
        let now = self.clock.now();
        let mut reports = Vec::new();
        for id in self.engine.proposal_ids() {
            let proposal = self.engine.proposal(id)?;
            reports.push(ProposalReport {
                id: id.raw(),
                title: proposal.title.clone(),
                mode: proposal.voting_mode,
                choices: proposal.choices.clone(),
                voting_window: format_duration(proposal.start.elapsed_since(proposal.end)),
                phase: self.engine.phase(id, now)?,
                voters: self.engine.voter_count(id)?,
                choice_votes: self.engine.choice_votes(id)?,
                results_revealed: self.engine.results_revealed(id)?,
                proposal_resolved: self.engine.proposal_resolved(id)?,
                winning_choice: self.engine.winning_choice(id)?,
                proposal_passed: self.engine.proposal_passed(id)?,
                prediction_market: self.engine.prediction_market_info(id)?,
            });
        }
        Ok(reports)
    }

    fn balances(&self) -> anyhow::Result<BTreeMap<String, BTreeMap<String, u128>>> {
        let mut out = BTreeMap::new();
        for (token, holders) in &self.touched {
            let token_addr = named_address(token)?;
            let per_holder: &mut BTreeMap<String, u128> = out.entry(token.clone()).or_default();
            for holder in holders {
                let balance = self.tokens.balance_of(&token_addr, &named_address(holder)?);
                per_holder.insert(holder.clone(), balance);
            }
        }
        Ok(out)
    }
}
