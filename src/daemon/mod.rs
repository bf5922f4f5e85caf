//! Remote daemon access.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::{DaemonClient, LedgerClient};
pub use types::*;
