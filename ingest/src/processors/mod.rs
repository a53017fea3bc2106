//! Entity processors
//!
//! Each processor ignores changes for other entry kinds, buffers the rest in
//! its own [`ChangeCompactor`](crate::compactor::ChangeCompactor), and writes
//! the net changes to its store port when the buffer outgrows
//! `max_batch_size` or on commit.

pub mod accounts;
pub mod account_data;
pub mod claimable_balances;
pub mod liquidity_pools;
pub mod offers;
pub mod trust_lines;
pub mod signers;
pub mod group;

pub use accounts::AccountsProcessor;
pub use account_data::AccountDataProcessor;
pub use claimable_balances::ClaimableBalancesProcessor;
pub use liquidity_pools::LiquidityPoolsProcessor;
pub use offers::OffersProcessor;
pub use trust_lines::TrustLinesProcessor;
pub use signers::{SignersMode, SignersProcessor};
pub use group::{GroupChangeProcessors, GroupTransactionFilterers, GroupTransactionProcessors};

use ledgermirror_core::{IngestError, IngestResult};

/// Fail unless a single-row mutation touched exactly one row.
pub(crate) fn expect_one_row(
    rows_affected: i64,
    action: &str,
    entity: &str,
    key: impl std::fmt::Display,
) -> IngestResult<()> {
    if rows_affected != 1 {
        return Err(IngestError::row_mismatch(action, entity, key, rows_affected));
    }
    Ok(())
}

/// Fail unless a batched mutation touched one row per key.
pub(crate) fn expect_rows(
    rows_affected: i64,
    expected: usize,
    action: &str,
    entities: &str,
) -> IngestResult<()> {
    if rows_affected != expected as i64 {
        return Err(IngestError::batch_mismatch(action, entities, expected, rows_affected));
    }
    Ok(())
}

/// Tombstone compaction cutoff for `sequence`, if one is due
pub(crate) fn compaction_cutoff(sequence: u32, window: u32) -> Option<u32> {
    if sequence > window {
        Some(sequence - window)
    } else {
        None
    }
}
