//! Governance engine: proposal registry, upkeep, oracle callbacks, and views.
//!
//! Every mutating call takes an explicit proposal id and the caller's clock
//! reading. Calls are serialized by `&mut self`, so each one is atomic with
//! respect to every other.

use crate::ballot::{Ballot, BallotContext};
use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::event::{EventBus, GovernanceEvent};
use crate::ledger::ProposalLedger;
use crate::market::{
    Cancellation, MarketContext, PredictionMarket, PredictionMarketInfo, TallySummary,
    UserPredictionInfo,
};
use crate::oracle::{PendingReveal, RevealOracleAdapter};
use crate::proposal::{Proposal, ProposalParams, ProposalPhase};
use crate::tally::Outcome;
use ciphervote_fhe::{
    Ciphertext, ConfidentialBackend, DecryptionProof, EncryptedInput, InputProof, RevealOracle,
};
use ciphervote_token::TokenLedger;
use ciphervote_types::{Address, ProposalId, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ledger and market of one proposal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub ledger: ProposalLedger,
    pub market: PredictionMarket,
}

/// Serializable snapshot of every proposal the engine has ever created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub config: GovernanceConfig,
    pub next_id: ProposalId,
    pub proposals: BTreeMap<ProposalId, ProposalRecord>,
}

pub struct GovernanceEngine {
    config: GovernanceConfig,
    proposals: BTreeMap<ProposalId, ProposalRecord>,
    next_id: ProposalId,
    backend: Arc<dyn ConfidentialBackend>,
    adapter: RevealOracleAdapter,
    tokens: Arc<dyn TokenLedger>,
    events: EventBus,
}

impl GovernanceEngine {
    pub fn new(
        config: GovernanceConfig,
        backend: Arc<dyn ConfidentialBackend>,
        oracle: Arc<dyn RevealOracle>,
        tokens: Arc<dyn TokenLedger>,
    ) -> Self {
        tracing::info!(
            backend = backend.name(),
            oracle = oracle.name(),
            "governance engine started"
        );
        Self {
            config,
            proposals: BTreeMap::new(),
            next_id: ProposalId::new(1),
            backend,
            adapter: RevealOracleAdapter::new(oracle),
            tokens,
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&GovernanceEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    fn record(&self, id: ProposalId) -> Result<&ProposalRecord, GovernanceError> {
        self.proposals
            .get(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    fn record_mut(&mut self, id: ProposalId) -> Result<&mut ProposalRecord, GovernanceError> {
        self.proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    fn ensure_creator(record: &ProposalRecord, caller: &Address) -> Result<(), GovernanceError> {
        if record.ledger.proposal().creator != *caller {
            return Err(GovernanceError::NotAuthorized);
        }
        Ok(())
    }

    // ── Creation ───────────────────────────────────────────────────────

    /// Validate `params` and register a new proposal with zeroed tallies.
    pub fn create_proposal(
        &mut self,
        creator: &Address,
        params: ProposalParams,
        now: Timestamp,
    ) -> Result<ProposalId, GovernanceError> {
        let id = self.next_id;
        let proposal = Proposal::from_params(id, *creator, params, &self.config, now)?;
        let market = PredictionMarket::new(&proposal, self.config.cancellation_fee_bps);
        let ledger = ProposalLedger::new(proposal, self.backend.as_ref())?;

        tracing::info!(
            proposal = %id,
            %creator,
            space = %ledger.proposal().space,
            mode = ledger.proposal().voting_mode.name(),
            choices = ledger.proposal().choice_count(),
            "proposal created"
        );
        self.proposals.insert(id, ProposalRecord { ledger, market });
        self.next_id = id.next();
        self.events.emit(&GovernanceEvent::ProposalCreated {
            proposal: id,
            creator: *creator,
        });
        Ok(id)
    }

    // ── Voting ─────────────────────────────────────────────────────────

    /// Cast an encrypted ballot of any mode.
    pub fn cast_vote(
        &mut self,
        id: ProposalId,
        voter: &Address,
        ballot: &Ballot,
        proof: &InputProof,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let record = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        let ctx = BallotContext {
            backend: self.backend.as_ref(),
            tokens: self.tokens.as_ref(),
            config: &self.config,
        };
        record.ledger.cast_vote(&ctx, voter, ballot, proof, now)?;
        self.events.emit(&GovernanceEvent::VoteCast {
            proposal: id,
            voter: *voter,
        });
        Ok(())
    }

    pub fn vote_nonweighted(
        &mut self,
        id: ProposalId,
        voter: &Address,
        choice: EncryptedInput,
        proof: &InputProof,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.cast_vote(id, voter, &Ballot::NonWeighted { choice }, proof, now)
    }

    pub fn vote_weighted_single(
        &mut self,
        id: ProposalId,
        voter: &Address,
        choice: EncryptedInput,
        proof: &InputProof,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.cast_vote(id, voter, &Ballot::WeightedSingle { choice }, proof, now)
    }

    pub fn vote_weighted_fractional(
        &mut self,
        id: ProposalId,
        voter: &Address,
        percentages: Vec<EncryptedInput>,
        proof: &InputProof,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.cast_vote(
            id,
            voter,
            &Ballot::WeightedFractional { percentages },
            proof,
            now,
        )
    }

    // ── Reveal and resolution ──────────────────────────────────────────

    /// Whether any proposal has closed without a reveal being requested.
    pub fn needs_upkeep(&self, now: Timestamp) -> bool {
        self.proposals.values().any(|r| r.ledger.needs_upkeep(now))
    }

    pub fn pending_upkeeps(&self, now: Timestamp) -> Vec<ProposalId> {
        self.proposals
            .iter()
            .filter(|(_, r)| r.ledger.needs_upkeep(now))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Scheduler entry point: re-check and request the tally reveal.
    pub fn perform_upkeep(
        &mut self,
        id: ProposalId,
        now: Timestamp,
    ) -> Result<RequestId, GovernanceError> {
        tracing::debug!(proposal = %id, "performing upkeep");
        self.request_tally_reveal(id, now)
    }

    /// Submit every tally handle of a closed proposal for decryption.
    pub fn request_tally_reveal(
        &mut self,
        id: ProposalId,
        now: Timestamp,
    ) -> Result<RequestId, GovernanceError> {
        let adapter = self.adapter.clone();
        let record = self.record_mut(id)?;
        let pending = record.ledger.request_tally_reveal(&adapter, now)?.clone();
        self.events.emit(&GovernanceEvent::RevealRequested {
            proposal: id,
            request: pending.request,
            handles: pending.handles,
        });
        Ok(pending.request)
    }

    /// Decryption-oracle entry point.
    pub fn resolve_proposal_callback(
        &mut self,
        id: ProposalId,
        request: RequestId,
        encoded_totals: &[u8],
        proof: &DecryptionProof,
    ) -> Result<Outcome, GovernanceError> {
        let adapter = self.adapter.clone();
        let record = self.record_mut(id)?;
        let outcome = record
            .ledger
            .on_tally_revealed(&adapter, request, encoded_totals, proof)?;
        let totals = record.ledger.choice_votes().to_vec();
        self.events.emit(&GovernanceEvent::ProposalResolved {
            proposal: id,
            outcome,
            totals,
        });
        Ok(outcome)
    }

    // ── Prediction market ──────────────────────────────────────────────

    pub fn make_prediction(
        &mut self,
        id: ProposalId,
        caller: &Address,
        encrypted_choice: &EncryptedInput,
        proof: &InputProof,
        stake: u128,
    ) -> Result<Option<Cancellation>, GovernanceError> {
        let record = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        let ctx = MarketContext {
            backend: self.backend.as_ref(),
            tokens: self.tokens.as_ref(),
            config: &self.config,
        };
        let replaced = record.market.make_prediction(
            &ctx,
            record.ledger.proposal(),
            caller,
            encrypted_choice,
            proof,
            stake,
        )?;
        if let Some(c) = replaced {
            self.events.emit(&GovernanceEvent::PredictionCancelled {
                proposal: id,
                predictor: *caller,
                refund: c.refund,
                fee: c.fee,
            });
        }
        self.events.emit(&GovernanceEvent::PredictionMade {
            proposal: id,
            predictor: *caller,
            stake,
        });
        Ok(replaced)
    }

    pub fn cancel_prediction(
        &mut self,
        id: ProposalId,
        caller: &Address,
    ) -> Result<Cancellation, GovernanceError> {
        let tokens = Arc::clone(&self.tokens);
        let record = self.record_mut(id)?;
        let split = record.market.cancel_prediction(tokens.as_ref(), caller)?;
        self.events.emit(&GovernanceEvent::PredictionCancelled {
            proposal: id,
            predictor: *caller,
            refund: split.refund,
            fee: split.fee,
        });
        Ok(split)
    }

    /// Creator-only. Freezes the market and publishes every prediction handle.
    pub fn reveal_predictions_for_payout(
        &mut self,
        id: ProposalId,
        caller: &Address,
    ) -> Result<Vec<(Address, Ciphertext)>, GovernanceError> {
        let adapter = self.adapter.clone();
        let record = self.record_mut(id)?;
        Self::ensure_creator(record, caller)?;
        let outcome = record.ledger.resolution().outcome();
        let (request, handles) = record
            .market
            .reveal_predictions_for_payout(&adapter, outcome)?;
        self.events.emit(&GovernanceEvent::PredictionsRevealed {
            proposal: id,
            request,
            handles: handles.clone(),
        });
        Ok(handles)
    }

    /// Creator-only. Marks winners and losers from decrypted predictions.
    pub fn tally_predictions(
        &mut self,
        id: ProposalId,
        caller: &Address,
        addresses: &[Address],
        decrypted_choices: &[u8],
    ) -> Result<TallySummary, GovernanceError> {
        let record = self.record_mut(id)?;
        Self::ensure_creator(record, caller)?;
        let outcome = record.ledger.resolution().outcome();
        let summary = record
            .market
            .tally_predictions(outcome, addresses, decrypted_choices)?;
        self.events.emit(&GovernanceEvent::PredictionsTallied {
            proposal: id,
            winners: summary.winners,
            losers: summary.losers,
        });
        Ok(summary)
    }

    pub fn claim_winnings(
        &mut self,
        id: ProposalId,
        caller: &Address,
    ) -> Result<u128, GovernanceError> {
        let tokens = Arc::clone(&self.tokens);
        let record = self.record_mut(id)?;
        let payout = record.market.claim_winnings(tokens.as_ref(), caller)?;
        self.events.emit(&GovernanceEvent::WinningsClaimed {
            proposal: id,
            winner: *caller,
            payout,
        });
        Ok(payout)
    }

    /// Creator-only. Sends accumulated cancellation fees to the creator.
    pub fn withdraw_fees(
        &mut self,
        id: ProposalId,
        caller: &Address,
    ) -> Result<u128, GovernanceError> {
        let tokens = Arc::clone(&self.tokens);
        let record = self.record_mut(id)?;
        Self::ensure_creator(record, caller)?;
        let amount = record.market.withdraw_fees(tokens.as_ref(), caller)?;
        tracing::info!(proposal = %id, to = %caller, amount, "fees withdrawn");
        self.events.emit(&GovernanceEvent::FeesWithdrawn {
            proposal: id,
            to: *caller,
            amount,
        });
        Ok(amount)
    }

    // ── Views ──────────────────────────────────────────────────────────

    pub fn proposal(&self, id: ProposalId) -> Result<&Proposal, GovernanceError> {
        Ok(self.record(id)?.ledger.proposal())
    }

    pub fn proposal_ids(&self) -> Vec<ProposalId> {
        self.proposals.keys().copied().collect()
    }

    pub fn phase(&self, id: ProposalId, now: Timestamp) -> Result<ProposalPhase, GovernanceError> {
        Ok(self.record(id)?.ledger.phase(now))
    }

    pub fn has_voted(&self, id: ProposalId, voter: &Address) -> Result<bool, GovernanceError> {
        Ok(self.record(id)?.ledger.has_voted(voter))
    }

    pub fn voter_count(&self, id: ProposalId) -> Result<usize, GovernanceError> {
        Ok(self.record(id)?.ledger.voter_count())
    }

    /// Plaintext totals per choice; all zero until revealed.
    pub fn choice_votes(&self, id: ProposalId) -> Result<Vec<u128>, GovernanceError> {
        Ok(self.record(id)?.ledger.choice_votes().to_vec())
    }

    pub fn choice_vote(&self, id: ProposalId, index: usize) -> Result<u128, GovernanceError> {
        self.record(id)?
            .ledger
            .choice_votes()
            .get(index)
            .copied()
            .ok_or_else(|| GovernanceError::InvalidProposal(format!("no choice at index {index}")))
    }

    pub fn tally_handles(&self, id: ProposalId) -> Result<Vec<Ciphertext>, GovernanceError> {
        Ok(self.record(id)?.ledger.tally_handles().to_vec())
    }

    pub fn pending_reveal(&self, id: ProposalId) -> Result<Option<PendingReveal>, GovernanceError> {
        Ok(self.record(id)?.ledger.pending_reveal().cloned())
    }

    /// `Some(255)` on a draw, `None` until resolved.
    pub fn winning_choice(&self, id: ProposalId) -> Result<Option<u8>, GovernanceError> {
        let resolution = self.record(id)?.ledger.resolution();
        Ok(resolution
            .proposal_resolved
            .then_some(resolution.winning_choice))
    }

    pub fn proposal_passed(&self, id: ProposalId) -> Result<bool, GovernanceError> {
        Ok(self.record(id)?.ledger.resolution().proposal_passed)
    }

    pub fn results_revealed(&self, id: ProposalId) -> Result<bool, GovernanceError> {
        Ok(self.record(id)?.ledger.resolution().results_revealed)
    }

    pub fn proposal_resolved(&self, id: ProposalId) -> Result<bool, GovernanceError> {
        Ok(self.record(id)?.ledger.resolution().proposal_resolved)
    }

    pub fn prediction_market_info(
        &self,
        id: ProposalId,
    ) -> Result<PredictionMarketInfo, GovernanceError> {
        Ok(self.record(id)?.market.info())
    }

    pub fn user_prediction_info(
        &self,
        id: ProposalId,
        addr: &Address,
    ) -> Result<UserPredictionInfo, GovernanceError> {
        Ok(self.record(id)?.market.user_info(addr))
    }

    /// Prediction handles published by
    /// [`GovernanceEngine::reveal_predictions_for_payout`], in address order.
    pub fn prediction_reveal(
        &self,
        id: ProposalId,
    ) -> Result<Option<Vec<(Address, Ciphertext)>>, GovernanceError> {
        Ok(self.record(id)?.market.revealed_predictions())
    }

    pub fn escrow_address(&self, id: ProposalId) -> Result<Address, GovernanceError> {
        Ok(*self.record(id)?.market.escrow())
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Serialize every proposal record with bincode.
    pub fn save_state(&self) -> Result<Vec<u8>, GovernanceError> {
        let snapshot = EngineSnapshot {
            config: self.config.clone(),
            next_id: self.next_id,
            proposals: self.proposals.clone(),
        };
        bincode::serialize(&snapshot).map_err(|e| GovernanceError::Snapshot(e.to_string()))
    }

    /// Restore an engine from [`GovernanceEngine::save_state`] output.
    ///
    /// Event listeners are not part of the snapshot.
    pub fn load_state(
        data: &[u8],
        backend: Arc<dyn ConfidentialBackend>,
        oracle: Arc<dyn RevealOracle>,
        tokens: Arc<dyn TokenLedger>,
    ) -> Result<Self, GovernanceError> {
        let snapshot: EngineSnapshot =
            bincode::deserialize(data).map_err(|e| GovernanceError::Snapshot(e.to_string()))?;
        snapshot.config.validate()?;
        tracing::info!(
            proposals = snapshot.proposals.len(),
            next_id = %snapshot.next_id,
            "governance state loaded"
        );
        Ok(Self {
            config: snapshot.config,
            proposals: snapshot.proposals,
            next_id: snapshot.next_id,
            backend,
            adapter: RevealOracleAdapter::new(oracle),
            tokens,
            events: EventBus::new(),
        })
    }
}
