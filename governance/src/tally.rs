//! Winner computation over revealed plaintext totals.
//!
//! Deterministic and total: ties among the leading non-abstain totals are
//! always a draw, never broken by index order. The Abstain slot is neither a
//! candidate nor part of the participation denominator.

use serde::{Deserialize, Serialize};

/// `winning_choice` value of a proposal that resolved without a winner.
pub const DRAW_SENTINEL: u8 = 255;

/// Basis-point denominator for passing thresholds.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Result of resolving a proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Index of the winning choice, or [`DRAW_SENTINEL`].
    pub winning_choice: u8,
    pub passed: bool,
}

impl Outcome {
    pub const DRAW: Self = Self {
        winning_choice: DRAW_SENTINEL,
        passed: false,
    };

    pub fn is_draw(&self) -> bool {
        self.winning_choice == DRAW_SENTINEL
    }
}

/// Compute the outcome from per-choice totals.
///
/// `passing_threshold_bps == 0` means plurality only. Otherwise the leader
/// must hold at least `threshold / 10000` of all non-abstain votes.
pub fn compute_outcome(
    totals: &[u128],
    abstain_index: Option<usize>,
    passing_threshold_bps: u16,
) -> Outcome {
    let candidates: Vec<(usize, u128)> = totals
        .iter()
        .copied()
        .enumerate()
        .filter(|(i, _)| Some(*i) != abstain_index)
        .collect();

    let Some(best_value) = candidates.iter().map(|(_, v)| *v).max() else {
        return Outcome::DRAW;
    };
    let mut leaders = candidates.iter().filter(|(_, v)| *v == best_value);
    let Some((best_index, _)) = leaders.next() else {
        return Outcome::DRAW;
    };
    if leaders.next().is_some() {
        return Outcome::DRAW;
    }

    if passing_threshold_bps > 0 {
        let (carries, participating) = candidates.iter().fold((0u128, 0u128), |(hi, lo), (_, v)| {
            let (sum, carry) = lo.overflowing_add(*v);
            (hi + u128::from(carry), sum)
        });
        let held = widening_mul(best_value, BPS_DENOMINATOR);
        let (high, low) = widening_mul(participating, u64::from(passing_threshold_bps));
        // carries < candidates.len(), so this stays far below u128::MAX.
        let needed = (high + carries * u128::from(passing_threshold_bps), low);
        if held < needed {
            return Outcome::DRAW;
        }
    }

    match u8::try_from(*best_index) {
        Ok(index) if index != DRAW_SENTINEL => Outcome {
            winning_choice: index,
            passed: true,
        },
        _ => Outcome::DRAW,
    }
}

/// Full 256-bit product of `a * b` as `(high, low)`, ordered lexicographically.
fn widening_mul(a: u128, b: u64) -> (u128, u128) {
    let b = u128::from(b);
    let lo = (a & u128::from(u64::MAX)) * b;
    let hi = (a >> 64) * b;
    let (low, carry) = lo.overflowing_add(hi << 64);
    let high = (hi >> 64) + u128::from(carry);
    (high, low)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plurality_winner() {
        let outcome = compute_outcome(&[2, 1], None, 0);
        assert_eq!(
            outcome,
            Outcome {
                winning_choice: 0,
                passed: true
            }
        );
    }

    #[test]
    fn test_exact_tie_is_draw_without_threshold() {
        assert_eq!(compute_outcome(&[3, 3, 1], None, 0), Outcome::DRAW);
    }

    #[test]
    fn test_tie_with_threshold_is_draw() {
        assert_eq!(compute_outcome(&[2, 2], None, 5000), Outcome::DRAW);
    }

    #[test]
    fn test_abstain_excluded_from_candidates() {
        // Abstain holds the largest total but can never win.
        let outcome = compute_outcome(&[1, 0, 5], Some(2), 0);
        assert_eq!(outcome.winning_choice, 0);
        assert!(outcome.passed);
    }

    #[test]
    fn test_abstain_excluded_from_denominator() {
        // 3 of 5 non-abstain votes = 60%, passes 60% threshold even with
        // many abstentions.
        let outcome = compute_outcome(&[3, 2, 100], Some(2), 6000);
        assert_eq!(outcome.winning_choice, 0);
        assert!(outcome.passed);
    }

    #[test]
    fn test_threshold_not_met_is_draw() {
        // 4 of 10 = 40% < 50%.
        assert_eq!(compute_outcome(&[4, 3, 3], None, 5000), Outcome::DRAW);
    }

    #[test]
    fn test_threshold_exactly_met_passes() {
        let outcome = compute_outcome(&[5, 3, 2], None, 5000);
        assert_eq!(outcome.winning_choice, 0);
        assert!(outcome.passed);
    }

    #[test]
    fn test_no_votes_is_draw() {
        assert_eq!(compute_outcome(&[0, 0, 0], Some(2), 0), Outcome::DRAW);
    }

    #[test]
    fn test_weighted_fractional_totals() {
        let outcome = compute_outcome(&[1000, 1300, 700], None, 0);
        assert_eq!(outcome.winning_choice, 1);
    }

    #[test]
    fn test_huge_totals_do_not_overflow_threshold() {
        let big = u128::MAX / 2;
        let outcome = compute_outcome(&[big, 1], None, 9999);
        assert_eq!(outcome.winning_choice, 0);
        assert!(outcome.passed);
    }

    #[test]
    fn test_participation_sum_beyond_u128_keeps_threshold_exact() {
        // The leader holds just over half of a sum wider than 128 bits.
        let outcome = compute_outcome(&[u128::MAX, u128::MAX - 1], None, 6000);
        assert_eq!(outcome, Outcome::DRAW);
        let outcome = compute_outcome(&[u128::MAX, u128::MAX - 1], None, 5000);
        assert_eq!(outcome.winning_choice, 0);
        assert!(outcome.passed);
    }

    #[test]
    fn test_widening_mul_matches_small_products() {
        assert_eq!(widening_mul(12345, 10_000), (0, 123_450_000));
        assert_eq!(widening_mul(u128::MAX, 2), (1, u128::MAX - 1));
    }
}
