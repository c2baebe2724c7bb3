//! Prediction market attached to a proposal's outcome.
//!
//! Stakes are pooled in a per-proposal escrow. After the proposal resolves,
//! the creator reveals the encrypted predictions for payout, tallies the
//! decrypted choices against the winning choice, and each winner claims
//! `pool * stake / winning_stake_total` once. Losers are marked claimed at
//! tally time, so any later claim from them fails with `AlreadyClaimed`.

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::oracle::RevealOracleAdapter;
use crate::proposal::Proposal;
use crate::tally::{Outcome, BPS_DENOMINATOR};
use ciphervote_fhe::{Ciphertext, ConfidentialBackend, EncryptedInput, InputConstraint, InputProof};
use ciphervote_token::TokenLedger;
use ciphervote_types::{Address, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-address stake record. Zeroed on cancellation or payout; the claimed
/// flag is never cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionStake {
    pub staked_amount: u128,
    pub predicted_choice: Option<Ciphertext>,
    pub has_predicted: bool,
    pub has_claimed: bool,
    pub tallied: bool,
    pub is_winner: bool,
}

impl PredictionStake {
    fn is_active(&self) -> bool {
        self.has_predicted && self.staked_amount > 0
    }
}

/// Refund and fee of a cancelled stake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub refund: u128,
    pub fee: u128,
}

/// Result of tallying a batch of decrypted predictions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySummary {
    pub winners: usize,
    pub losers: usize,
    pub skipped: usize,
    pub winning_stake_total: u128,
}

/// Market-wide view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionMarketInfo {
    pub enabled: bool,
    pub stake_token: Option<Address>,
    pub total_pool: u128,
    pub accumulated_fees: u128,
    pub winning_stake_total: u128,
    pub predictions_revealed: bool,
    pub participants: usize,
}

/// Per-address view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPredictionInfo {
    pub staked_amount: u128,
    pub has_predicted: bool,
    pub has_claimed: bool,
    pub is_winner: bool,
}

/// Collaborators the market reads or moves funds through.
pub struct MarketContext<'a> {
    pub backend: &'a dyn ConfidentialBackend,
    pub tokens: &'a dyn TokenLedger,
    pub config: &'a GovernanceConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionMarket {
    enabled: bool,
    stake_token: Option<Address>,
    escrow: Address,
    fee_bps: u16,
    stakes: BTreeMap<Address, PredictionStake>,
    total_pool: u128,
    accumulated_fees: u128,
    winning_stake_total: u128,
    predictions_revealed: bool,
    choice_count: usize,
}

impl PredictionMarket {
    pub fn new(proposal: &Proposal, fee_bps: u16) -> Self {
        Self {
            enabled: proposal.prediction_market_enabled,
            stake_token: proposal.prediction_token,
            escrow: proposal.id.escrow_address(),
            fee_bps,
            stakes: BTreeMap::new(),
            total_pool: 0,
            accumulated_fees: 0,
            winning_stake_total: 0,
            predictions_revealed: false,
            choice_count: proposal.choice_count(),
        }
    }

    pub fn escrow(&self) -> &Address {
        &self.escrow
    }

    fn token(&self) -> Result<Address, GovernanceError> {
        match (self.enabled, self.stake_token) {
            (true, Some(token)) => Ok(token),
            _ => Err(GovernanceError::PredictionMarketDisabled),
        }
    }

    fn ensure_open(&self) -> Result<Address, GovernanceError> {
        let token = self.token()?;
        if self.predictions_revealed {
            return Err(GovernanceError::PredictionsAlreadyRevealed);
        }
        Ok(token)
    }

    /// Split a stake into the refunded part and the withheld fee.
    fn cancellation_split(&self, staked: u128) -> Result<Cancellation, GovernanceError> {
        let fee = staked
            .checked_mul(u128::from(self.fee_bps))
            .ok_or(GovernanceError::ArithmeticOverflow)?
            / u128::from(BPS_DENOMINATOR);
        Ok(Cancellation {
            refund: staked - fee,
            fee,
        })
    }

    /// Stake on an encrypted choice. An existing stake is cancelled first
    /// (fee applies), so updating a prediction and predicting for the first
    /// time are the same operation.
    ///
    /// Returns the cancellation applied to the replaced stake, if any.
    #[allow(clippy::too_many_arguments)]
    pub fn make_prediction(
        &mut self,
        ctx: &MarketContext<'_>,
        proposal: &Proposal,
        caller: &Address,
        encrypted_choice: &EncryptedInput,
        proof: &InputProof,
        stake: u128,
    ) -> Result<Option<Cancellation>, GovernanceError> {
        let token = self.ensure_open()?;
        if stake == 0 {
            return Err(GovernanceError::ZeroStake);
        }
        let constraint = InputConstraint::LessThan {
            bits: ctx.config.choice_bit_width,
            bound: proposal.choice_count() as u128,
        };
        let choice = ctx
            .backend
            .verify_inputs(caller, std::slice::from_ref(encrypted_choice), proof, constraint)
            .map_err(GovernanceError::from_input)?
            .into_iter()
            .next()
            .ok_or(GovernanceError::InvalidProof)?;

        let previous = self.stakes.get(caller).filter(|s| s.is_active());
        let replaced = previous
            .map(|s| self.cancellation_split(s.staked_amount))
            .transpose()?;
        let old_stake = previous.map_or(0, |s| s.staked_amount);
        let refund = replaced.map_or(0, |c| c.refund);
        let fee = replaced.map_or(0, |c| c.fee);

        let total_pool = (self.total_pool - old_stake)
            .checked_add(stake)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        let accumulated_fees = self
            .accumulated_fees
            .checked_add(fee)
            .ok_or(GovernanceError::ArithmeticOverflow)?;

        // Settle the refund and the new stake as one net transfer.
        if stake > refund {
            ctx.tokens
                .transfer(&token, caller, &self.escrow, stake - refund)?;
        } else if refund > stake {
            ctx.tokens
                .transfer(&token, &self.escrow, caller, refund - stake)?;
        }

        self.total_pool = total_pool;
        self.accumulated_fees = accumulated_fees;
        let record = self.stakes.entry(*caller).or_default();
        record.staked_amount = stake;
        record.predicted_choice = Some(choice);
        record.has_predicted = true;

        if let Some(c) = replaced {
            tracing::info!(%caller, refund = c.refund, fee = c.fee, "prediction replaced");
        }
        tracing::info!(proposal = %proposal.id, %caller, stake, "prediction made");
        Ok(replaced)
    }

    /// Withdraw an active stake, less the cancellation fee.
    pub fn cancel_prediction(
        &mut self,
        tokens: &dyn TokenLedger,
        caller: &Address,
    ) -> Result<Cancellation, GovernanceError> {
        let token = self.ensure_open()?;
        let stake = self
            .stakes
            .get(caller)
            .ok_or(GovernanceError::NoActivePrediction)?;
        if stake.has_claimed {
            return Err(GovernanceError::AlreadyClaimed);
        }
        if !stake.is_active() {
            return Err(GovernanceError::NoActivePrediction);
        }
        let staked = stake.staked_amount;
        let split = self.cancellation_split(staked)?;
        let accumulated_fees = self
            .accumulated_fees
            .checked_add(split.fee)
            .ok_or(GovernanceError::ArithmeticOverflow)?;

        tokens.transfer(&token, &self.escrow, caller, split.refund)?;

        self.total_pool -= staked;
        self.accumulated_fees = accumulated_fees;
        if let Some(record) = self.stakes.get_mut(caller) {
            record.staked_amount = 0;
            record.predicted_choice = None;
            record.has_predicted = false;
        }
        tracing::info!(%caller, refund = split.refund, fee = split.fee, "prediction cancelled");
        Ok(split)
    }

    /// Freeze the market and submit every active prediction for decryption.
    ///
    /// Returns the oracle request (none when nothing was staked) and the
    /// submitted handles in address order.
    pub fn reveal_predictions_for_payout(
        &mut self,
        adapter: &RevealOracleAdapter,
        outcome: Option<Outcome>,
    ) -> Result<(Option<RequestId>, Vec<(Address, Ciphertext)>), GovernanceError> {
        self.ensure_open()?;
        if outcome.is_none() {
            return Err(GovernanceError::ResultsNotRevealed);
        }
        let revealed = self.active_predictions();
        let request = if revealed.is_empty() {
            None
        } else {
            let handles = revealed.iter().map(|(_, c)| *c).collect();
            Some(adapter.submit(handles)?.request)
        };
        self.predictions_revealed = true;
        tracing::info!(predictions = revealed.len(), "predictions revealed for payout");
        Ok((request, revealed))
    }

    /// Mark each listed stake as winner or loser given its decrypted choice.
    ///
    /// Unknown, inactive, or already tallied addresses are skipped. On a draw
    /// every stake loses, as does a choice outside the proposal's range.
    pub fn tally_predictions(
        &mut self,
        outcome: Option<Outcome>,
        addresses: &[Address],
        decrypted_choices: &[u8],
    ) -> Result<TallySummary, GovernanceError> {
        self.token()?;
        if !self.predictions_revealed {
            return Err(GovernanceError::PredictionsNotRevealed);
        }
        let outcome = outcome.ok_or(GovernanceError::ResultsNotRevealed)?;
        if addresses.len() != decrypted_choices.len() {
            return Err(GovernanceError::TallyLengthMismatch {
                addresses: addresses.len(),
                choices: decrypted_choices.len(),
            });
        }

        let mut summary = TallySummary::default();
        for (addr, choice) in addresses.iter().zip(decrypted_choices) {
            let Some(stake) = self.stakes.get_mut(addr) else {
                summary.skipped += 1;
                continue;
            };
            if !stake.is_active() || stake.tallied {
                summary.skipped += 1;
                continue;
            }
            stake.tallied = true;
            let in_range = usize::from(*choice) < self.choice_count;
            if !outcome.is_draw() && in_range && *choice == outcome.winning_choice {
                stake.is_winner = true;
                // Bounded by total_pool, which is overflow-checked.
                self.winning_stake_total += stake.staked_amount;
                summary.winners += 1;
            } else {
                stake.has_claimed = true;
                summary.losers += 1;
            }
        }
        summary.winning_stake_total = self.winning_stake_total;
        tracing::info!(
            winners = summary.winners,
            losers = summary.losers,
            skipped = summary.skipped,
            winning_stake_total = self.winning_stake_total,
            "predictions tallied"
        );
        Ok(summary)
    }

    /// Pay out a winner's proportional share of the pool. Once per address.
    pub fn claim_winnings(
        &mut self,
        tokens: &dyn TokenLedger,
        caller: &Address,
    ) -> Result<u128, GovernanceError> {
        let token = self.token()?;
        let stake = self
            .stakes
            .get(caller)
            .ok_or(GovernanceError::NotAWinner)?;
        if stake.has_claimed {
            return Err(GovernanceError::AlreadyClaimed);
        }
        if !stake.is_winner || self.winning_stake_total == 0 {
            return Err(GovernanceError::NotAWinner);
        }
        let payout = self
            .total_pool
            .checked_mul(stake.staked_amount)
            .ok_or(GovernanceError::ArithmeticOverflow)?
            / self.winning_stake_total;

        tokens.transfer(&token, &self.escrow, caller, payout)?;

        if let Some(record) = self.stakes.get_mut(caller) {
            record.has_claimed = true;
            record.staked_amount = 0;
        }
        tracing::info!(%caller, payout, "winnings claimed");
        Ok(payout)
    }

    /// Move accumulated cancellation fees out of escrow to `to`.
    pub fn withdraw_fees(
        &mut self,
        tokens: &dyn TokenLedger,
        to: &Address,
    ) -> Result<u128, GovernanceError> {
        let token = self.token()?;
        let amount = self.accumulated_fees;
        if amount > 0 {
            tokens.transfer(&token, &self.escrow, to, amount)?;
            self.accumulated_fees = 0;
        }
        Ok(amount)
    }

    // ── Views ──────────────────────────────────────────────────────────

    pub fn info(&self) -> PredictionMarketInfo {
        PredictionMarketInfo {
            enabled: self.enabled,
            stake_token: self.stake_token,
            total_pool: self.total_pool,
            accumulated_fees: self.accumulated_fees,
            winning_stake_total: self.winning_stake_total,
            predictions_revealed: self.predictions_revealed,
            participants: self.stakes.values().filter(|s| s.is_active()).count(),
        }
    }

    pub fn user_info(&self, addr: &Address) -> UserPredictionInfo {
        self.stakes
            .get(addr)
            .map(|s| UserPredictionInfo {
                staked_amount: s.staked_amount,
                has_predicted: s.has_predicted,
                has_claimed: s.has_claimed,
                is_winner: s.is_winner,
            })
            .unwrap_or_default()
    }

    /// Active prediction handles, once they have been revealed for payout.
    pub fn revealed_predictions(&self) -> Option<Vec<(Address, Ciphertext)>> {
        self.predictions_revealed.then(|| self.active_predictions())
    }

    fn active_predictions(&self) -> Vec<(Address, Ciphertext)> {
        self.stakes
            .iter()
            .filter(|(_, s)| s.is_active())
            .filter_map(|(addr, s)| s.predicted_choice.map(|c| (*addr, c)))
            .collect()
    }
}
