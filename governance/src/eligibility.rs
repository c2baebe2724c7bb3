//! Eligibility gate: who may cast a ballot.
//!
//! Token-holder checks read the live balance at call time. There is no
//! snapshot, so a balance borrowed for the duration of a vote counts.

use crate::proposal::{EligibilityMode, EligibilityRule};
use ciphervote_token::TokenLedger;
use ciphervote_types::Address;

/// Pure predicate over an eligibility rule and a live token ledger.
pub struct EligibilityGate;

impl EligibilityGate {
    pub fn is_eligible(rule: &EligibilityRule, tokens: &dyn TokenLedger, voter: &Address) -> bool {
        match rule.mode {
            EligibilityMode::Public => true,
            EligibilityMode::TokenHolder => match &rule.token {
                Some(token) => tokens.balance_of(token, voter) >= rule.threshold,
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciphervote_nullables::NullTokens;

    fn addr(seed: u8) -> Address {
        Address::from_bytes([seed; 20])
    }

    #[test]
    fn test_public_always_eligible() {
        let tokens = NullTokens::new();
        assert!(EligibilityGate::is_eligible(
            &EligibilityRule::public(),
            &tokens,
            &addr(1)
        ));
    }

    #[test]
    fn test_token_holder_threshold_inclusive() {
        let tokens = NullTokens::new();
        let token = addr(9);
        let rule = EligibilityRule::token_holder(token, 100);
        tokens.mint(&token, &addr(1), 100);
        tokens.mint(&token, &addr(2), 99);
        assert!(EligibilityGate::is_eligible(&rule, &tokens, &addr(1)));
        assert!(!EligibilityGate::is_eligible(&rule, &tokens, &addr(2)));
        assert!(!EligibilityGate::is_eligible(&rule, &tokens, &addr(3)));
    }

    #[test]
    fn test_live_balance_not_snapshot() {
        let tokens = NullTokens::new();
        let token = addr(9);
        let rule = EligibilityRule::token_holder(token, 10);
        assert!(!EligibilityGate::is_eligible(&rule, &tokens, &addr(1)));
        tokens.mint(&token, &addr(1), 10);
        assert!(EligibilityGate::is_eligible(&rule, &tokens, &addr(1)));
    }

    #[test]
    fn test_token_holder_without_token_rejects() {
        let tokens = NullTokens::new();
        let rule = EligibilityRule {
            mode: EligibilityMode::TokenHolder,
            token: None,
            threshold: 0,
        };
        assert!(!EligibilityGate::is_eligible(&rule, &tokens, &addr(1)));
    }
}
