//! CLI commands

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ChangeReader, ErrorContext, IngestConfig, IngestContext,
    IngestResult, LedgerTransactionFilterer, LedgerTransactionReader,
};
use ledgermirror_ingest::{
    stream_changes, stream_ledger_transactions, AccountDataProcessor, AccountsProcessor,
    ClaimableBalancesProcessor, GroupChangeProcessors, GroupTransactionFilterers,
    LiquidityPoolsProcessor, OffersProcessor, SignersMode, SignersProcessor,
    StatsChangeProcessor, StatsLedgerTransactionProcessor, SuccessfulTransactionsFilterer,
    TransactionChangesProcessor, TrustLinesProcessor,
};
use ledgermirror_state::MemoryHistoryStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Result of a replay, printed as JSON
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub sequence: u32,
    pub stats: BTreeMap<String, i64>,
    pub tables: BTreeMap<&'static str, usize>,
    /// Milliseconds spent in each processor
    pub durations_ms: BTreeMap<&'static str, u128>,
}

/// Result of a transaction replay, printed as JSON
#[derive(Debug, Serialize)]
pub struct TransactionReplayReport {
    pub sequence: u32,
    /// Counters over every transaction read, filtered or not
    pub transactions: BTreeMap<String, i64>,
    /// Counters over the changes of included transactions
    pub changes: BTreeMap<String, i64>,
    pub filtered_out: u64,
    pub tables: BTreeMap<&'static str, usize>,
}

/// Every entity processor wired to one store, in steady-state mode
pub fn entity_processors(
    store: &MemoryHistoryStore,
    sequence: u32,
    config: &IngestConfig,
) -> GroupChangeProcessors {
    let store = Arc::new(store.clone());
    GroupChangeProcessors::new(vec![
        Box::new(AccountsProcessor::new(store.clone(), config)),
        Box::new(AccountDataProcessor::new(store.clone(), config)),
        Box::new(ClaimableBalancesProcessor::new(store.clone(), config)),
        Box::new(LiquidityPoolsProcessor::new(store.clone(), sequence, config)),
        Box::new(OffersProcessor::new(store.clone(), sequence, config)),
        Box::new(TrustLinesProcessor::new(store.clone(), config)),
        Box::new(SignersProcessor::new(store, SignersMode::Diff, config)),
    ])
}

/// Counts every change before handing it to the entity processors
struct ReplayProcessor {
    stats: StatsChangeProcessor,
    entities: GroupChangeProcessors,
}

#[async_trait]
impl ChangeProcessor for ReplayProcessor {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        self.stats.process_change(ctx, change).await?;
        self.entities.process_change(ctx, change).await
    }

    async fn commit(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        self.stats.commit(ctx).await?;
        self.entities.commit(ctx).await
    }
}

/// Stream `reader` through every processor into `store` and commit.
pub async fn replay<R: ChangeReader + ?Sized>(
    ctx: &IngestContext,
    reader: &mut R,
    store: &MemoryHistoryStore,
    sequence: u32,
    config: &IngestConfig,
) -> IngestResult<ReplayReport> {
    let mut processor = ReplayProcessor {
        stats: StatsChangeProcessor::new(),
        entities: entity_processors(store, sequence, config),
    };

    stream_changes(ctx, &mut processor, reader).await?;
    processor
        .commit(ctx)
        .await
        .with_context(|| format!("could not commit ledger {}", sequence))?;

    let tables = store.table_sizes();
    info!("Replayed ledger {}: {:?}", sequence, tables);

    Ok(ReplayReport {
        sequence,
        stats: processor.stats.results().to_map(),
        tables,
        durations_ms: processor
            .entities
            .durations()
            .iter()
            .map(|(name, elapsed)| (*name, elapsed.as_millis()))
            .collect(),
    })
}

/// Stream the transactions in `reader` through the filterers, then replay
/// the changes of each included transaction into `store` and commit.
///
/// Failed transactions are counted but their changes are skipped unless
/// `config.ingest_failed_transactions` is set.
pub async fn replay_transactions<R: LedgerTransactionReader + ?Sized>(
    ctx: &IngestContext,
    reader: &mut R,
    store: &MemoryHistoryStore,
    sequence: u32,
    config: &IngestConfig,
) -> IngestResult<TransactionReplayReport> {
    let mut filterers: Vec<Box<dyn LedgerTransactionFilterer>> = Vec::new();
    if !config.ingest_failed_transactions {
        filterers.push(Box::new(SuccessfulTransactionsFilterer));
    }
    let mut filterer = GroupTransactionFilterers::new(filterers);
    let mut counter = StatsLedgerTransactionProcessor::new();
    let mut changes = TransactionChangesProcessor::new(ReplayProcessor {
        stats: StatsChangeProcessor::new(),
        entities: entity_processors(store, sequence, config),
    });

    stream_ledger_transactions(ctx, &mut filterer, &mut counter, &mut changes, reader).await?;
    changes
        .commit(ctx)
        .await
        .with_context(|| format!("could not commit ledger {}", sequence))?;

    let tables = store.table_sizes();
    info!(
        "Replayed {} transactions into ledger {}, {} filtered out",
        counter.results().transactions,
        sequence,
        filterer.dropped()
    );

    Ok(TransactionReplayReport {
        sequence,
        transactions: counter.results().to_map(),
        changes: changes.inner().stats.results().to_map(),
        filtered_out: filterer.dropped(),
        tables,
    })
}

/// Count the changes in `reader` by kind and type.
pub async fn stats<R: ChangeReader + ?Sized>(
    ctx: &IngestContext,
    reader: &mut R,
) -> IngestResult<BTreeMap<String, i64>> {
    let mut processor = StatsChangeProcessor::new();
    stream_changes(ctx, &mut processor, reader).await?;
    processor.commit(ctx).await?;
    Ok(processor.results().to_map())
}
