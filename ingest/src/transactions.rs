//! Transaction processors
//!
//! Counters over whole transactions, and an adapter that replays each
//! transaction's entry changes through a change processor.

use async_trait::async_trait;
use ledgermirror_core::{
    ChangeProcessor, ErrorContext, IngestContext, IngestResult, LedgerTransaction,
    LedgerTransactionFilterer, LedgerTransactionProcessor,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counters collected by [`StatsLedgerTransactionProcessor`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsLedgerTransactionProcessorResults {
    pub transactions: i64,
    pub transactions_successful: i64,
    pub transactions_failed: i64,

    pub operations: i64,
    pub operations_in_successful: i64,
    pub operations_in_failed: i64,
}

impl StatsLedgerTransactionProcessorResults {
    /// Every counter keyed by its metric name
    pub fn to_map(&self) -> BTreeMap<String, i64> {
        let mut map = BTreeMap::new();
        let mut put = |name: &str, value: i64| {
            map.insert(format!("stats_{}", name), value);
        };

        put("transactions", self.transactions);
        put("transactions_successful", self.transactions_successful);
        put("transactions_failed", self.transactions_failed);

        put("operations", self.operations);
        put("operations_in_successful", self.operations_in_successful);
        put("operations_in_failed", self.operations_in_failed);
        map
    }
}

/// Transaction processor that only counts. Sees failed transactions too
/// when run unfiltered.
#[derive(Debug, Default)]
pub struct StatsLedgerTransactionProcessor {
    results: StatsLedgerTransactionProcessorResults,
}

impl StatsLedgerTransactionProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &StatsLedgerTransactionProcessorResults {
        &self.results
    }

    /// Zero every counter, e.g. between ledgers
    pub fn reset(&mut self) {
        self.results = StatsLedgerTransactionProcessorResults::default();
    }
}

#[async_trait]
impl LedgerTransactionProcessor for StatsLedgerTransactionProcessor {
    fn name(&self) -> &'static str {
        "stats_ledger_transactions"
    }

    async fn process_transaction(
        &mut self,
        _ctx: &IngestContext,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        let ops = tx.operation_count as i64;
        self.results.transactions += 1;
        self.results.operations += ops;

        if tx.successful {
            self.results.transactions_successful += 1;
            self.results.operations_in_successful += ops;
        } else {
            self.results.transactions_failed += 1;
            self.results.operations_in_failed += ops;
        }
        Ok(())
    }
}

/// Includes only transactions that succeeded
#[derive(Debug, Default, Clone, Copy)]
pub struct SuccessfulTransactionsFilterer;

#[async_trait]
impl LedgerTransactionFilterer for SuccessfulTransactionsFilterer {
    fn name(&self) -> &'static str {
        "successful_transactions"
    }

    async fn filter_transaction(
        &mut self,
        _ctx: &IngestContext,
        tx: &LedgerTransaction,
    ) -> IngestResult<bool> {
        Ok(tx.successful)
    }
}

/// Feeds the entry changes of each transaction, in order, to a change
/// processor. Committing stays with the caller.
pub struct TransactionChangesProcessor<P> {
    inner: P,
}

impl<P: ChangeProcessor> TransactionChangesProcessor<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    /// Commit the wrapped change processor.
    pub async fn commit(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        self.inner.commit(ctx).await
    }
}

#[async_trait]
impl<P: ChangeProcessor> LedgerTransactionProcessor for TransactionChangesProcessor<P> {
    fn name(&self) -> &'static str {
        "transaction_changes"
    }

    async fn process_transaction(
        &mut self,
        ctx: &IngestContext,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        let name = self.inner.name();
        for (position, change) in tx.get_changes().iter().enumerate() {
            ctx.check()?;
            self.inner
                .process_change(ctx, change)
                .await
                .with_context(|| {
                    format!(
                        "error in {} processing change {} of transaction {}",
                        name,
                        position,
                        tx.hash.to_hex()
                    )
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::OffersProcessor;
    use crate::readers::MemoryTransactionReader;
    use crate::stats::StatsChangeProcessor;
    use crate::stream::stream_ledger_transactions;
    use crate::test_support::*;
    use ledgermirror_core::{Change, Hash32, IngestConfig, IngestError};
    use ledgermirror_state::MemoryHistoryStore;
    use std::sync::Arc;

    fn tx(
        index: u32,
        successful: bool,
        operation_count: u32,
        changes: Vec<Change>,
    ) -> LedgerTransaction {
        LedgerTransaction {
            index,
            ledger_sequence: 20,
            hash: Hash32::from_prefix(&[index as u8]),
            successful,
            operation_count,
            changes,
        }
    }

    #[tokio::test]
    async fn test_counts_successful_and_failed() {
        let ctx = IngestContext::new();
        let mut processor = StatsLedgerTransactionProcessor::new();

        for transaction in [
            tx(1, true, 2, vec![]),
            tx(2, false, 3, vec![]),
            tx(3, true, 1, vec![]),
        ] {
            processor
                .process_transaction(&ctx, &transaction)
                .await
                .unwrap();
        }

        assert_eq!(
            processor.results(),
            &StatsLedgerTransactionProcessorResults {
                transactions: 3,
                transactions_successful: 2,
                transactions_failed: 1,
                operations: 6,
                operations_in_successful: 3,
                operations_in_failed: 3,
            }
        );
        let map = processor.results().to_map();
        assert_eq!(map["stats_transactions_failed"], 1);
        assert_eq!(map["stats_operations_in_successful"], 3);

        processor.reset();
        assert_eq!(
            processor.results(),
            &StatsLedgerTransactionProcessorResults::default()
        );
    }

    #[tokio::test]
    async fn test_forwards_changes_in_order() {
        let ctx = IngestContext::new();
        let mut processor = TransactionChangesProcessor::new(StatsChangeProcessor::new());
        let first = tx(
            1,
            true,
            1,
            vec![
                Change::created(offer_entry(1, 10, 20)),
                Change::created(account_entry(ACCOUNT_A, [1, 0, 0, 0], 20)),
            ],
        );
        let second = tx(
            2,
            true,
            1,
            vec![Change::updated(offer_entry(1, 10, 20), offer_entry(1, 5, 20))],
        );

        processor.process_transaction(&ctx, &first).await.unwrap();
        processor.process_transaction(&ctx, &second).await.unwrap();
        processor.commit(&ctx).await.unwrap();

        let results = processor.into_inner().results().clone();
        assert_eq!(results.offers_created, 1);
        assert_eq!(results.offers_updated, 1);
        assert_eq!(results.accounts_created, 1);
    }

    #[tokio::test]
    async fn test_change_error_names_transaction() {
        let ctx = IngestContext::new();
        let mut processor = TransactionChangesProcessor::new(StatsChangeProcessor::new());
        let broken = tx(
            7,
            true,
            1,
            vec![
                Change::created(offer_entry(1, 10, 20)),
                Change::restored(offer_entry(2, 10, 20)),
            ],
        );

        let err = processor
            .process_transaction(&ctx, &broken)
            .await
            .unwrap_err();
        assert!(err.is_unsupported_change());
        assert!(
            err.to_string().starts_with(&format!(
                "error in stats processing change 1 of transaction {}",
                Hash32::from_prefix(&[7]).to_hex()
            )),
            "{}",
            err
        );
        assert_eq!(processor.inner().results().offers_created, 1);
    }

    #[tokio::test]
    async fn test_filtered_stream_writes_only_successful_changes() {
        let ctx = IngestContext::new();
        let store = MemoryHistoryStore::new();
        let mut stats = StatsLedgerTransactionProcessor::new();
        let mut offers = TransactionChangesProcessor::new(OffersProcessor::new(
            Arc::new(store.clone()),
            20,
            &IngestConfig::default(),
        ));
        let mut reader = MemoryTransactionReader::new(vec![
            tx(1, true, 1, vec![Change::created(offer_entry(1, 10, 20))]),
            tx(2, false, 4, vec![Change::created(offer_entry(2, 10, 20))]),
        ]);

        stream_ledger_transactions(
            &ctx,
            &mut SuccessfulTransactionsFilterer,
            &mut stats,
            &mut offers,
            &mut reader,
        )
        .await
        .unwrap();
        offers.commit(&ctx).await.unwrap();

        assert_eq!(stats.results().transactions, 2);
        assert_eq!(stats.results().operations_in_failed, 4);
        assert!(store.offer(1).is_some());
        assert!(store.offer(2).is_none());
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_forwarding() {
        let ctx = IngestContext::new();
        ctx.cancel();
        let mut processor = TransactionChangesProcessor::new(StatsChangeProcessor::new());
        let single = tx(1, true, 1, vec![Change::created(offer_entry(1, 1, 1))]);
        let err = processor
            .process_transaction(&ctx, &single)
            .await
            .unwrap_err();
        assert!(matches!(err.root(), IngestError::Cancelled));
        assert_eq!(processor.inner().results().offers_created, 0);
    }
}
