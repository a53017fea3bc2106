//! LedgerMirror Ingestion
//!
//! Turns a stream of entry changes into batched writes against the history
//! store:
//! - `compactor`: merges raw changes into one net change per entry
//! - `signers`: computes the signer rows to remove and add for an account
//! - `processors`: one processor per entity kind, plus statistics and groups
//! - `transactions`: transaction counters and the transaction to change adapter
//! - `stream`: drives readers into processors

pub mod compactor;
pub mod signers;
pub mod processors;
pub mod stats;
pub mod transactions;
pub mod readers;
pub mod stream;

pub use compactor::*;
pub use signers::*;
pub use processors::*;
pub use stats::*;
pub use transactions::*;
pub use readers::*;
pub use stream::*;

#[cfg(test)]
mod test_support;
