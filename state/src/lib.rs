//! LedgerMirror State Management
//!
//! Row projections of ledger entries, the store ports processors write
//! through, and an in-memory store with relational semantics.

pub mod rows;
pub mod store;
pub mod memory;

pub use rows::*;
pub use store::*;
pub use memory::*;
