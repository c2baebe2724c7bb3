use thiserror::Error;

#[derive(Debug, Error)]
pub enum FheError {
    #[error("input proof rejected: {0}")]
    InvalidProof(String),

    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(String),

    #[error("reveal request rejected: {0}")]
    RevealRejected(String),

    #[error("arithmetic overflow in confidential evaluation")]
    Overflow,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}
