//! Proposal ledger: the voting and resolution state machine of one proposal.

use crate::ballot::{contributions, Ballot, BallotContext};
use crate::eligibility::EligibilityGate;
use crate::error::GovernanceError;
use crate::oracle::{PendingReveal, RevealOracleAdapter};
use crate::proposal::{Proposal, ProposalPhase, ResolutionState};
use crate::tally::{compute_outcome, Outcome};
use ciphervote_fhe::{Ciphertext, ConfidentialBackend, DecryptionProof, InputProof};
use ciphervote_types::{Address, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Encrypted tallies, voter record, and resolution of a single proposal.
///
/// Tallies are only mutated by [`ProposalLedger::cast_vote`] inside the
/// voting window and are frozen once results are revealed. Nothing here is
/// ever pruned.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposalLedger {
    proposal: Proposal,
    /// One accumulator per choice, Abstain included.
    tallies: Vec<Ciphertext>,
    voters: BTreeSet<Address>,
    /// Plaintext totals, filled in by the reveal callback.
    choice_votes: Vec<u128>,
    resolution: ResolutionState,
    pending_reveal: Option<PendingReveal>,
}

impl ProposalLedger {
    /// Create the ledger with every tally at encrypted zero.
    pub fn new(
        proposal: Proposal,
        backend: &dyn ConfidentialBackend,
    ) -> Result<Self, GovernanceError> {
        let zero = backend.trivial(0)?;
        let n = proposal.choice_count();
        Ok(Self {
            proposal,
            tallies: vec![zero; n],
            voters: BTreeSet::new(),
            choice_votes: vec![0; n],
            resolution: ResolutionState::unresolved(),
            pending_reveal: None,
        })
    }

    pub fn proposal(&self) -> &Proposal {
        &self.proposal
    }

    pub fn phase(&self, now: Timestamp) -> ProposalPhase {
        if self.resolution.proposal_resolved {
            ProposalPhase::Resolved
        } else if self.pending_reveal.is_some() {
            ProposalPhase::RevealPending
        } else if now < self.proposal.start {
            ProposalPhase::Scheduled
        } else if now < self.proposal.end {
            ProposalPhase::Open
        } else {
            ProposalPhase::Closed
        }
    }

    /// Fold an encrypted ballot into the tallies.
    ///
    /// All checks and every homomorphic evaluation happen before the first
    /// write, so a failed call leaves the ledger untouched.
    pub fn cast_vote(
        &mut self,
        ctx: &BallotContext<'_>,
        voter: &Address,
        ballot: &Ballot,
        proof: &InputProof,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        if ballot.mode() != self.proposal.voting_mode {
            return Err(GovernanceError::WrongVotingMode);
        }
        if self.voters.contains(voter) {
            return Err(GovernanceError::AlreadyVoted(voter.to_string()));
        }
        if self.phase(now) != ProposalPhase::Open {
            return Err(GovernanceError::VotingNotOpen);
        }
        if !EligibilityGate::is_eligible(&self.proposal.eligibility, ctx.tokens, voter) {
            return Err(GovernanceError::NotEligible);
        }

        let deltas = contributions(ctx, &self.proposal, voter, ballot, proof)?;
        let updated = self
            .tallies
            .iter()
            .zip(&deltas)
            .map(|(tally, delta)| ctx.backend.add(tally, delta))
            .collect::<Result<Vec<_>, _>>()?;

        self.tallies = updated;
        self.voters.insert(*voter);
        tracing::info!(
            proposal = %self.proposal.id,
            %voter,
            mode = self.proposal.voting_mode.name(),
            "vote cast"
        );
        Ok(())
    }

    /// Closed, never sent for reveal, not resolved.
    pub fn needs_upkeep(&self, now: Timestamp) -> bool {
        self.phase(now) == ProposalPhase::Closed
    }

    /// Submit every tally handle for decryption. Exactly once per proposal.
    pub fn request_tally_reveal(
        &mut self,
        adapter: &RevealOracleAdapter,
        now: Timestamp,
    ) -> Result<&PendingReveal, GovernanceError> {
        if self.pending_reveal.is_some() {
            return Err(GovernanceError::RevealAlreadyRequested);
        }
        if self.resolution.proposal_resolved {
            return Err(GovernanceError::AlreadyResolved);
        }
        if !self.proposal.has_voting_ended(now) {
            return Err(GovernanceError::VotingNotClosed);
        }
        let pending = adapter.submit(self.tallies.clone())?;
        tracing::info!(
            proposal = %self.proposal.id,
            request = %pending.request,
            "tally reveal requested"
        );
        Ok(self.pending_reveal.insert(pending))
    }

    /// Oracle callback: store plaintext totals and resolve.
    pub fn on_tally_revealed(
        &mut self,
        adapter: &RevealOracleAdapter,
        request: RequestId,
        encoded_totals: &[u8],
        proof: &DecryptionProof,
    ) -> Result<Outcome, GovernanceError> {
        if self.resolution.proposal_resolved {
            return Err(GovernanceError::AlreadyResolved);
        }
        let pending = self
            .pending_reveal
            .as_ref()
            .ok_or(GovernanceError::RevealNotRequested)?;
        let plaintexts = adapter.verify_callback(pending, request, encoded_totals, proof)?;

        let scale = self.proposal.tally_scale.max(1);
        let totals: Vec<u128> = plaintexts.iter().map(|v| v / scale).collect();
        let outcome = compute_outcome(
            &totals,
            self.proposal.abstain_index.map(usize::from),
            self.proposal.passing_threshold_bps,
        );

        self.choice_votes = totals;
        self.resolution = ResolutionState {
            results_revealed: true,
            proposal_resolved: true,
            winning_choice: outcome.winning_choice,
            proposal_passed: outcome.passed,
        };
        tracing::info!(
            proposal = %self.proposal.id,
            winning_choice = outcome.winning_choice,
            passed = outcome.passed,
            "proposal resolved"
        );
        Ok(outcome)
    }

    // ── Views ──────────────────────────────────────────────────────────

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voters.contains(voter)
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    /// Revealed totals; all zero until resolution.
    pub fn choice_votes(&self) -> &[u128] {
        &self.choice_votes
    }

    pub fn resolution(&self) -> &ResolutionState {
        &self.resolution
    }

    pub fn tally_handles(&self) -> &[Ciphertext] {
        &self.tallies
    }

    pub fn pending_reveal(&self) -> Option<&PendingReveal> {
        self.pending_reveal.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernanceConfig;
    use crate::proposal::{ProposalParams, VotingMode};
    use ciphervote_fhe::encode_totals;
    use ciphervote_nullables::{NullFhe, NullOracle, NullTokens};
    use ciphervote_types::{ProposalId, SpaceId};
    use std::sync::Arc;

    struct Harness {
        fhe: Arc<NullFhe>,
        oracle: Arc<NullOracle>,
        adapter: RevealOracleAdapter,
        tokens: NullTokens,
        config: GovernanceConfig,
        ledger: ProposalLedger,
    }

    fn voter(seed: u8) -> Address {
        Address::from_bytes([seed; 20])
    }

    fn harness() -> Harness {
        let fhe = Arc::new(NullFhe::new());
        let oracle = Arc::new(NullOracle::new(fhe.clone()));
        let adapter = RevealOracleAdapter::new(oracle.clone());
        let config = GovernanceConfig::default();
        let params = ProposalParams::new(
            SpaceId::new("dao.eth"),
            "Adopt RFC-7",
            VotingMode::NonWeightedSingleChoice,
            vec!["Yes".into(), "No".into()],
            Timestamp::new(100),
            Timestamp::new(200),
        );
        let proposal = Proposal::from_params(
            ProposalId::new(1),
            voter(0),
            params,
            &config,
            Timestamp::new(0),
        )
        .unwrap();
        let ledger = ProposalLedger::new(proposal, fhe.as_ref()).unwrap();
        Harness {
            fhe,
            oracle,
            adapter,
            tokens: NullTokens::new(),
            config,
            ledger,
        }
    }

    fn vote(h: &mut Harness, seed: u8, choice: u128, now: u64) -> Result<(), GovernanceError> {
        let (input, proof) = h.fhe.encrypt_one(&voter(seed), choice);
        let ctx = BallotContext {
            backend: h.fhe.as_ref(),
            tokens: &h.tokens,
            config: &h.config,
        };
        h.ledger.cast_vote(
            &ctx,
            &voter(seed),
            &Ballot::NonWeighted { choice: input },
            &proof,
            Timestamp::new(now),
        )
    }

    #[test]
    fn test_phases_follow_clock() {
        let h = harness();
        assert_eq!(h.ledger.phase(Timestamp::new(50)), ProposalPhase::Scheduled);
        assert_eq!(h.ledger.phase(Timestamp::new(100)), ProposalPhase::Open);
        assert_eq!(h.ledger.phase(Timestamp::new(200)), ProposalPhase::Closed);
    }

    #[test]
    fn test_vote_outside_window_rejected() {
        let mut h = harness();
        assert!(matches!(vote(&mut h, 1, 0, 99), Err(GovernanceError::VotingNotOpen)));
        assert!(matches!(vote(&mut h, 1, 0, 200), Err(GovernanceError::VotingNotOpen)));
        assert!(!h.ledger.has_voted(&voter(1)));
    }

    #[test]
    fn test_double_vote_rejected_even_after_close() {
        let mut h = harness();
        vote(&mut h, 1, 0, 150).unwrap();
        assert!(matches!(vote(&mut h, 1, 1, 151), Err(GovernanceError::AlreadyVoted(_))));
        assert!(matches!(vote(&mut h, 1, 1, 250), Err(GovernanceError::AlreadyVoted(_))));
    }

    #[test]
    fn test_failed_proof_leaves_tallies_untouched() {
        let mut h = harness();
        let before = h.ledger.tally_handles().to_vec();
        let (input, _) = h.fhe.encrypt_one(&voter(1), 0);
        let ctx = BallotContext {
            backend: h.fhe.as_ref(),
            tokens: &h.tokens,
            config: &h.config,
        };
        let err = h
            .ledger
            .cast_vote(
                &ctx,
                &voter(1),
                &Ballot::NonWeighted { choice: input },
                &InputProof(vec![0; 32]),
                Timestamp::new(150),
            )
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidProof));
        assert_eq!(h.ledger.tally_handles(), before.as_slice());
        assert_eq!(h.ledger.voter_count(), 0);
    }

    #[test]
    fn test_reveal_lifecycle() {
        let mut h = harness();
        vote(&mut h, 1, 0, 150).unwrap();
        vote(&mut h, 2, 1, 150).unwrap();
        vote(&mut h, 3, 0, 150).unwrap();

        assert!(matches!(
            h.ledger.request_tally_reveal(&h.adapter, Timestamp::new(199)),
            Err(GovernanceError::VotingNotClosed)
        ));
        assert!(h.ledger.needs_upkeep(Timestamp::new(200)));
        let request = h
            .ledger
            .request_tally_reveal(&h.adapter, Timestamp::new(200))
            .unwrap()
            .request;
        assert!(!h.ledger.needs_upkeep(Timestamp::new(200)));
        assert_eq!(h.ledger.phase(Timestamp::new(200)), ProposalPhase::RevealPending);
        assert!(matches!(
            h.ledger.request_tally_reveal(&h.adapter, Timestamp::new(201)),
            Err(GovernanceError::RevealAlreadyRequested)
        ));

        let (plaintexts, proof) = h.oracle.fulfil(request).unwrap();
        let encoded = encode_totals(&plaintexts).unwrap();
        let outcome = h
            .ledger
            .on_tally_revealed(&h.adapter, request, &encoded, &proof)
            .unwrap();
        assert_eq!(outcome.winning_choice, 0);
        assert!(outcome.passed);
        assert_eq!(h.ledger.choice_votes(), &[2, 1]);
        assert_eq!(h.ledger.phase(Timestamp::new(300)), ProposalPhase::Resolved);

        assert!(matches!(
            h.ledger.on_tally_revealed(&h.adapter, request, &encoded, &proof),
            Err(GovernanceError::AlreadyResolved)
        ));
    }

    #[test]
    fn test_bad_decryption_proof_stays_pending() {
        let mut h = harness();
        vote(&mut h, 1, 1, 150).unwrap();
        let request = h
            .ledger
            .request_tally_reveal(&h.adapter, Timestamp::new(200))
            .unwrap()
            .request;
        let (plaintexts, proof) = h.oracle.fulfil(request).unwrap();
        let encoded = encode_totals(&plaintexts).unwrap();

        let err = h
            .ledger
            .on_tally_revealed(&h.adapter, request, &encoded, &DecryptionProof(vec![1; 32]))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidDecryptionProof));
        assert_eq!(h.ledger.phase(Timestamp::new(300)), ProposalPhase::RevealPending);
        assert!(!h.ledger.resolution().results_revealed);

        let outcome = h
            .ledger
            .on_tally_revealed(&h.adapter, request, &encoded, &proof)
            .unwrap();
        assert_eq!(outcome.winning_choice, 1);
    }

    #[test]
    fn test_callback_before_request() {
        let mut h = harness();
        let encoded = encode_totals(&[0, 0]).unwrap();
        let err = h
            .ledger
            .on_tally_revealed(&h.adapter, RequestId::new(1), &encoded, &DecryptionProof(vec![]))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::RevealNotRequested));
    }
}
