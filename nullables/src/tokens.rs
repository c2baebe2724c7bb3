//! Nullable token ledger: in-memory balances.

use ciphervote_token::{TokenError, TokenLedger};
use ciphervote_types::Address;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory balances keyed by `(token, holder)`.
pub struct NullTokens {
    balances: Mutex<HashMap<(Address, Address), u128>>,
}

impl NullTokens {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
        }
    }

    /// Credit `amount` to `holder` out of thin air.
    pub fn mint(&self, token: &Address, holder: &Address, amount: u128) {
        *self
            .balances
            .lock()
            .unwrap()
            .entry((*token, *holder))
            .or_insert(0) += amount;
    }

    /// Overwrite a balance (e.g. to simulate tokens moving elsewhere).
    pub fn set_balance(&self, token: &Address, holder: &Address, amount: u128) {
        self.balances
            .lock()
            .unwrap()
            .insert((*token, *holder), amount);
    }
}

impl Default for NullTokens {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenLedger for NullTokens {
    fn balance_of(&self, token: &Address, holder: &Address) -> u128 {
        self.balances
            .lock()
            .unwrap()
            .get(&(*token, *holder))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        let mut balances = self.balances.lock().unwrap();
        let available = balances.get(&(*token, *from)).copied().unwrap_or(0);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = balances
            .get(&(*token, *to))
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| TokenError::Overflow(to.to_string()))?;
        balances.insert((*token, *from), available - amount);
        balances.insert((*token, *to), credited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_moves_balance() {
        let tokens = NullTokens::new();
        let token = Address::from_bytes([9; 20]);
        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);
        tokens.mint(&token, &a, 100);
        tokens.transfer(&token, &a, &b, 40).unwrap();
        assert_eq!(tokens.balance_of(&token, &a), 60);
        assert_eq!(tokens.balance_of(&token, &b), 40);
    }

    #[test]
    fn test_insufficient_balance_leaves_state() {
        let tokens = NullTokens::new();
        let token = Address::from_bytes([9; 20]);
        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);
        tokens.mint(&token, &a, 10);
        let err = tokens.transfer(&token, &a, &b, 11).unwrap_err();
        assert!(matches!(
            err,
            TokenError::InsufficientBalance { needed: 11, available: 10 }
        ));
        assert_eq!(tokens.balance_of(&token, &a), 10);
        assert_eq!(tokens.balance_of(&token, &b), 0);
    }

    #[test]
    fn test_self_transfer_is_noop() {
        let tokens = NullTokens::new();
        let token = Address::from_bytes([9; 20]);
        let a = Address::from_bytes([1; 20]);
        tokens.mint(&token, &a, 10);
        tokens.transfer(&token, &a, &a, 10).unwrap();
        assert_eq!(tokens.balance_of(&token, &a), 10);
    }
}
