//! Abstract token-ledger trait.
//!
//! Eligibility checks, vote weights, and prediction-market escrow all read or
//! move balances of an external fungible token. The engine depends only on
//! [`TokenLedger`]; hosts plug in whatever ledger actually holds the tokens.

pub mod error;

pub use error::TokenError;

use ciphervote_types::Address;

/// Balances and transfers of fungible tokens, keyed by token address.
pub trait TokenLedger: Send + Sync {
    /// Live balance of `holder` in `token`. Unknown holders have zero.
    fn balance_of(&self, token: &Address, holder: &Address) -> u128;

    /// Move `amount` of `token` from `from` to `to`.
    ///
    /// Either the whole amount moves or nothing does.
    fn transfer(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError>;
}
