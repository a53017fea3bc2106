//! LedgerMirror Core Library
//!
//! Core types, traits, and abstractions for the LedgerMirror ingestion engine.
//! This crate provides the ledger entry model, the before/after `Change`
//! representation and the interfaces every processor and reader implements.

pub mod types;
pub mod change;
pub mod traits;
pub mod error;
pub mod config;
pub mod context;

pub use types::*;
pub use change::*;
pub use traits::*;
pub use error::*;
pub use config::*;
pub use context::*;
