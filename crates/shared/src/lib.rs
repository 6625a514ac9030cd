//! Shared types for the mfgdesk notification client and backend tooling.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
