//! Encrypted ballots and their per-choice tally contributions.
//!
//! One contribution function per voting mode. Every mode yields exactly one
//! encrypted delta per choice: single-choice modes add zero to every
//! tally but the chosen one, so the set of refreshed handles reveals nothing
//! about the choice.

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::proposal::{Proposal, VotingMode};
use ciphervote_fhe::{Ciphertext, ConfidentialBackend, EncryptedInput, InputConstraint, InputProof};
use ciphervote_token::TokenLedger;
use ciphervote_types::Address;
use serde::{Deserialize, Serialize};

/// A mode-specific encrypted ballot payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ballot {
    /// Encrypted index of the chosen option; counts as 1.
    NonWeighted { choice: EncryptedInput },
    /// Encrypted index of the chosen option; counts as the voter's balance.
    WeightedSingle { choice: EncryptedInput },
    /// One encrypted percentage per choice, summing to the fractional scale.
    WeightedFractional { percentages: Vec<EncryptedInput> },
}

impl Ballot {
    pub fn mode(&self) -> VotingMode {
        match self {
            Self::NonWeighted { .. } => VotingMode::NonWeightedSingleChoice,
            Self::WeightedSingle { .. } => VotingMode::WeightedSingleChoice,
            Self::WeightedFractional { .. } => VotingMode::WeightedFractional,
        }
    }
}

/// Collaborators needed to turn a ballot into tally deltas.
pub struct BallotContext<'a> {
    pub backend: &'a dyn ConfidentialBackend,
    pub tokens: &'a dyn TokenLedger,
    pub config: &'a GovernanceConfig,
}

/// Verify `ballot` and compute one encrypted delta per choice of `proposal`.
///
/// Performs no mutation; the caller folds the deltas into the tallies only
/// once every delta has been computed.
pub fn contributions(
    ctx: &BallotContext<'_>,
    proposal: &Proposal,
    voter: &Address,
    ballot: &Ballot,
    proof: &InputProof,
) -> Result<Vec<Ciphertext>, GovernanceError> {
    if ballot.mode() != proposal.voting_mode {
        return Err(GovernanceError::WrongVotingMode);
    }
    let n = proposal.choice_count();
    let choice_constraint = InputConstraint::LessThan {
        bits: ctx.config.choice_bit_width,
        bound: n as u128,
    };

    match ballot {
        Ballot::NonWeighted { choice } => {
            let choice = verify_single(ctx, voter, choice, proof, choice_constraint)?;
            single_choice(ctx.backend, &choice, 1, n)
        }
        Ballot::WeightedSingle { choice } => {
            let choice = verify_single(ctx, voter, choice, proof, choice_constraint)?;
            let weight = voter_weight(ctx, proposal, voter)?;
            single_choice(ctx.backend, &choice, weight, n)
        }
        Ballot::WeightedFractional { percentages } => {
            if percentages.len() != n {
                return Err(GovernanceError::PayloadLengthMismatch {
                    expected: n,
                    got: percentages.len(),
                });
            }
            let constraint = InputConstraint::SumEquals {
                bits: ctx.config.percentage_bit_width,
                total: u128::from(ctx.config.fractional_scale),
            };
            let shares = ctx
                .backend
                .verify_inputs(voter, percentages, proof, constraint)
                .map_err(GovernanceError::from_input)?;
            let weight = voter_weight(ctx, proposal, voter)?;
            fractional(ctx.backend, &shares, weight)
        }
    }
}

fn verify_single(
    ctx: &BallotContext<'_>,
    voter: &Address,
    input: &EncryptedInput,
    proof: &InputProof,
    constraint: InputConstraint,
) -> Result<Ciphertext, GovernanceError> {
    ctx.backend
        .verify_inputs(voter, std::slice::from_ref(input), proof, constraint)
        .map_err(GovernanceError::from_input)?
        .into_iter()
        .next()
        .ok_or(GovernanceError::InvalidProof)
}

fn voter_weight(
    ctx: &BallotContext<'_>,
    proposal: &Proposal,
    voter: &Address,
) -> Result<u128, GovernanceError> {
    let token = proposal
        .weight_token()
        .ok_or_else(|| GovernanceError::InvalidProposal("no weight token".into()))?;
    Ok(ctx.tokens.balance_of(token, voter))
}

/// `amount` to the chosen index, zero everywhere else.
fn single_choice(
    backend: &dyn ConfidentialBackend,
    choice: &Ciphertext,
    amount: u128,
    choice_count: usize,
) -> Result<Vec<Ciphertext>, GovernanceError> {
    let amount = backend.trivial(amount)?;
    let zero = backend.trivial(0)?;
    (0..choice_count)
        .map(|i| -> Result<Ciphertext, GovernanceError> {
            let hit = backend.eq_plain(choice, i as u128)?;
            Ok(backend.select(&hit, &amount, &zero)?)
        })
        .collect()
}

/// `weight * share` per choice, still scaled by the fractional scale.
fn fractional(
    backend: &dyn ConfidentialBackend,
    shares: &[Ciphertext],
    weight: u128,
) -> Result<Vec<Ciphertext>, GovernanceError> {
    shares
        .iter()
        .map(|share| backend.mul_plain(share, weight).map_err(GovernanceError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{EligibilityRule, ProposalParams};
    use ciphervote_nullables::{NullFhe, NullTokens};
    use ciphervote_types::{ProposalId, SpaceId, Timestamp};

    const TOKEN: [u8; 20] = [9; 20];

    fn voter(seed: u8) -> Address {
        Address::from_bytes([seed; 20])
    }

    fn proposal(mode: VotingMode, choices: usize) -> Proposal {
        let mut params = ProposalParams::new(
            SpaceId::new("dao.eth"),
            "Treasury split",
            mode,
            (0..choices).map(|i| format!("option {i}")).collect(),
            Timestamp::new(0),
            Timestamp::new(10),
        );
        params.eligibility = EligibilityRule::public_weighted(Address::from_bytes(TOKEN));
        Proposal::from_params(
            ProposalId::new(1),
            voter(0),
            params,
            &GovernanceConfig::default(),
            Timestamp::new(0),
        )
        .unwrap()
    }

    fn decrypt_all(fhe: &NullFhe, cts: &[Ciphertext]) -> Vec<u128> {
        cts.iter().map(|c| fhe.decrypt(c).unwrap()).collect()
    }

    #[test]
    fn test_nonweighted_adds_one_to_choice() {
        let fhe = NullFhe::new();
        let tokens = NullTokens::new();
        let config = GovernanceConfig::default();
        let ctx = BallotContext { backend: &fhe, tokens: &tokens, config: &config };
        let p = proposal(VotingMode::NonWeightedSingleChoice, 3);
        let (choice, proof) = fhe.encrypt_one(&voter(1), 2);
        let deltas =
            contributions(&ctx, &p, &voter(1), &Ballot::NonWeighted { choice }, &proof).unwrap();
        assert_eq!(decrypt_all(&fhe, &deltas), vec![0, 0, 1]);
    }

    #[test]
    fn test_weighted_single_uses_live_balance() {
        let fhe = NullFhe::new();
        let tokens = NullTokens::new();
        tokens.mint(&Address::from_bytes(TOKEN), &voter(1), 1000);
        let config = GovernanceConfig::default();
        let ctx = BallotContext { backend: &fhe, tokens: &tokens, config: &config };
        let p = proposal(VotingMode::WeightedSingleChoice, 2);
        let (choice, proof) = fhe.encrypt_one(&voter(1), 0);
        let deltas =
            contributions(&ctx, &p, &voter(1), &Ballot::WeightedSingle { choice }, &proof)
                .unwrap();
        assert_eq!(decrypt_all(&fhe, &deltas), vec![1000, 0]);
    }

    #[test]
    fn test_fractional_scaled_by_percentage() {
        let fhe = NullFhe::new();
        let tokens = NullTokens::new();
        tokens.mint(&Address::from_bytes(TOKEN), &voter(1), 1000);
        let config = GovernanceConfig::default();
        let ctx = BallotContext { backend: &fhe, tokens: &tokens, config: &config };
        let p = proposal(VotingMode::WeightedFractional, 3);
        let (percentages, proof) = fhe.encrypt(&voter(1), &[60, 30, 10]);
        let deltas = contributions(
            &ctx,
            &p,
            &voter(1),
            &Ballot::WeightedFractional { percentages },
            &proof,
        )
        .unwrap();
        assert_eq!(decrypt_all(&fhe, &deltas), vec![60_000, 30_000, 10_000]);
    }

    #[test]
    fn test_fractional_bad_sum_is_invalid_proof() {
        let fhe = NullFhe::new();
        let tokens = NullTokens::new();
        let config = GovernanceConfig::default();
        let ctx = BallotContext { backend: &fhe, tokens: &tokens, config: &config };
        let p = proposal(VotingMode::WeightedFractional, 3);
        let (percentages, proof) = fhe.encrypt(&voter(1), &[60, 30, 20]);
        let err = contributions(
            &ctx,
            &p,
            &voter(1),
            &Ballot::WeightedFractional { percentages },
            &proof,
        )
        .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidProof));
    }

    #[test]
    fn test_fractional_wrong_length() {
        let fhe = NullFhe::new();
        let tokens = NullTokens::new();
        let config = GovernanceConfig::default();
        let ctx = BallotContext { backend: &fhe, tokens: &tokens, config: &config };
        let p = proposal(VotingMode::WeightedFractional, 3);
        let (percentages, proof) = fhe.encrypt(&voter(1), &[50, 50]);
        let err = contributions(
            &ctx,
            &p,
            &voter(1),
            &Ballot::WeightedFractional { percentages },
            &proof,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::PayloadLengthMismatch { expected: 3, got: 2 }
        ));
    }

    #[test]
    fn test_out_of_range_choice_rejected() {
        let fhe = NullFhe::new();
        let tokens = NullTokens::new();
        let config = GovernanceConfig::default();
        let ctx = BallotContext { backend: &fhe, tokens: &tokens, config: &config };
        let p = proposal(VotingMode::NonWeightedSingleChoice, 2);
        let (choice, proof) = fhe.encrypt_one(&voter(1), 2);
        let err = contributions(&ctx, &p, &voter(1), &Ballot::NonWeighted { choice }, &proof)
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidProof));
    }

    #[test]
    fn test_mode_mismatch() {
        let fhe = NullFhe::new();
        let tokens = NullTokens::new();
        let config = GovernanceConfig::default();
        let ctx = BallotContext { backend: &fhe, tokens: &tokens, config: &config };
        let p = proposal(VotingMode::WeightedSingleChoice, 2);
        let (choice, proof) = fhe.encrypt_one(&voter(1), 0);
        let err = contributions(&ctx, &p, &voter(1), &Ballot::NonWeighted { choice }, &proof)
            .unwrap_err();
        assert!(matches!(err, GovernanceError::WrongVotingMode));
    }
}
