//! Nullable infrastructure for deterministic testing and replay.
//!
//! Every external collaborator of the engine (clock, confidential backend,
//! decryption oracle, token ledger) is abstracted behind a trait. This crate
//! provides in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! `NullFhe` keeps plaintexts next to their handles. It offers no
//! confidentiality whatsoever and exists only so tests and the replay tool
//! can drive the engine end to end.

pub mod clock;
pub mod fhe;
pub mod oracle;
pub mod tokens;

pub use clock::NullClock;
pub use fhe::NullFhe;
pub use oracle::NullOracle;
pub use tokens::NullTokens;
