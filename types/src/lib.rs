//! Fundamental types for the ciphervote engine.
//!
//! This crate defines the identifiers shared across every other crate in the
//! workspace: addresses, proposal/space/request ids, and timestamps.

pub mod address;
pub mod error;
pub mod ids;
pub mod time;

pub use address::Address;
pub use error::TypesError;
pub use ids::{ProposalId, RequestId, SpaceId};
pub use time::Timestamp;
