//! Core traits defining LedgerMirror interfaces
//!
//! Readers produce changes or transactions, processors consume them, and
//! filterers decide which transactions reach the filtered processors.

use crate::change::{Change, LedgerTransaction};
use crate::context::IngestContext;
use async_trait::async_trait;

/// Result type for LedgerMirror operations
pub type IngestResult<T> = Result<T, crate::error::IngestError>;

/// Source of entry changes
#[async_trait]
pub trait ChangeReader: Send {
    /// Next change, or `None` once the stream is exhausted
    async fn read(&mut self) -> IngestResult<Option<Change>>;
}

/// Source of ledger transactions
#[async_trait]
pub trait LedgerTransactionReader: Send {
    /// Next transaction, or `None` once the ledger is exhausted
    async fn read(&mut self) -> IngestResult<Option<LedgerTransaction>>;
}

/// Consumer of entry changes.
///
/// Processors may buffer; nothing is guaranteed to reach the store until
/// `commit` returns successfully.
#[async_trait]
pub trait ChangeProcessor: Send {
    fn name(&self) -> &'static str;

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()>;

    /// Flush everything buffered so far
    async fn commit(&mut self, ctx: &IngestContext) -> IngestResult<()>;
}

/// Consumer of ledger transactions
#[async_trait]
pub trait LedgerTransactionProcessor: Send {
    fn name(&self) -> &'static str;

    async fn process_transaction(
        &mut self,
        ctx: &IngestContext,
        tx: &LedgerTransaction,
    ) -> IngestResult<()>;
}

/// Predicate deciding whether a transaction is ingested
#[async_trait]
pub trait LedgerTransactionFilterer: Send {
    fn name(&self) -> &'static str;

    /// `true` to include the transaction
    async fn filter_transaction(
        &mut self,
        ctx: &IngestContext,
        tx: &LedgerTransaction,
    ) -> IngestResult<bool>;
}
