use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("balance overflow crediting {0}")]
    Overflow(String),

    #[error("token ledger error: {0}")]
    Backend(String),
}
