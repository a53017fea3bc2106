//! Stream orchestration
//!
//! Pulls items from a reader one at a time and hands each to its processor.
//! The first read, filter or processing error ends the stream; nothing is
//! retried or skipped.

use ledgermirror_core::{
    ChangeProcessor, ChangeReader, ErrorContext, IngestContext, IngestError, IngestResult,
    LedgerTransactionFilterer, LedgerTransactionProcessor, LedgerTransactionReader,
};
use tracing::{debug, error};

fn log_failure(err: &IngestError) {
    if !err.is_cancelled() {
        error!("Stream stopped: {}", err);
    }
}

/// Feed every change from `reader` to `processor` until end-of-stream.
///
/// Does not commit; the caller decides when the batch is complete.
pub async fn stream_changes<P, R>(
    ctx: &IngestContext,
    processor: &mut P,
    reader: &mut R,
) -> IngestResult<()>
where
    P: ChangeProcessor + ?Sized,
    R: ChangeReader + ?Sized,
{
    let result = run_changes(ctx, processor, reader).await;
    if let Err(err) = &result {
        log_failure(err);
    }
    result
}

async fn run_changes<P, R>(
    ctx: &IngestContext,
    processor: &mut P,
    reader: &mut R,
) -> IngestResult<()>
where
    P: ChangeProcessor + ?Sized,
    R: ChangeReader + ?Sized,
{
    loop {
        ctx.check()?;
        let change = match reader.read().await.context("could not read change")? {
            Some(change) => change,
            None => return Ok(()),
        };
        processor
            .process_change(ctx, &change)
            .await
            .context("could not process change")?;
    }
}

/// Feed every transaction from `reader` through the filter.
///
/// `unconditional` sees every transaction; `filtered` only those the
/// filterer includes.
pub async fn stream_ledger_transactions<F, U, P, R>(
    ctx: &IngestContext,
    filterer: &mut F,
    unconditional: &mut U,
    filtered: &mut P,
    reader: &mut R,
) -> IngestResult<()>
where
    F: LedgerTransactionFilterer + ?Sized,
    U: LedgerTransactionProcessor + ?Sized,
    P: LedgerTransactionProcessor + ?Sized,
    R: LedgerTransactionReader + ?Sized,
{
    let result = run_transactions(ctx, filterer, unconditional, filtered, reader).await;
    if let Err(err) = &result {
        log_failure(err);
    }
    result
}

async fn run_transactions<F, U, P, R>(
    ctx: &IngestContext,
    filterer: &mut F,
    unconditional: &mut U,
    filtered: &mut P,
    reader: &mut R,
) -> IngestResult<()>
where
    F: LedgerTransactionFilterer + ?Sized,
    U: LedgerTransactionProcessor + ?Sized,
    P: LedgerTransactionProcessor + ?Sized,
    R: LedgerTransactionReader + ?Sized,
{
    loop {
        ctx.check()?;
        let tx = match reader.read().await.context("could not read transaction")? {
            Some(tx) => tx,
            None => return Ok(()),
        };

        let include = filterer
            .filter_transaction(ctx, &tx)
            .await
            .context("error filtering transaction")?;

        unconditional
            .process_transaction(ctx, &tx)
            .await
            .with_context(|| {
                format!(
                    "could not process transaction {} in ledger {}",
                    tx.index, tx.ledger_sequence
                )
            })?;

        if !include {
            debug!(
                "Filtered out transaction {} in ledger {} ({})",
                tx.index,
                tx.ledger_sequence,
                tx.hash.to_hex()
            );
            continue;
        }

        filtered
            .process_transaction(ctx, &tx)
            .await
            .with_context(|| {
                format!(
                    "could not process transaction {} in ledger {}",
                    tx.index, tx.ledger_sequence
                )
            })?;
    }
}
