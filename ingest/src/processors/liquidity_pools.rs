//! Liquidity pools processor
//!
//! A removed pool is kept as a tombstone row (`deleted`, stamped with the
//! current ledger) and purged once it falls outside the compaction window.

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ErrorContext, IngestConfig, IngestContext, IngestResult,
    LedgerEntryType,
};
use ledgermirror_state::{LiquidityPoolRow, LiquidityPoolsQ};
use std::sync::Arc;
use tracing::{debug, info};

use super::{compaction_cutoff, expect_one_row};
use crate::compactor::ChangeCompactor;

pub struct LiquidityPoolsProcessor {
    pools_q: Arc<dyn LiquidityPoolsQ>,
    sequence: u32,
    compaction_window: u32,
    max_batch_size: usize,
    cache: ChangeCompactor,
}

impl LiquidityPoolsProcessor {
    pub fn new(pools_q: Arc<dyn LiquidityPoolsQ>, sequence: u32, config: &IngestConfig) -> Self {
        Self {
            pools_q,
            sequence,
            compaction_window: config.liquidity_pool_compaction_window,
            max_batch_size: config.max_batch_size,
            cache: ChangeCompactor::new(),
        }
    }

    async fn flush_cache(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        let changes = std::mem::take(&mut self.cache).into_changes();
        if changes.is_empty() {
            return Ok(());
        }

        let mut insert_batch = self.pools_q.new_liquidity_pool_batch_insert_builder();
        // updates and tombstones, each checked on its own
        let mut updates: Vec<(LiquidityPoolRow, &'static str)> = Vec::new();
        for change in &changes {
            match (&change.pre, &change.post) {
                (None, Some(post)) => insert_batch.add(LiquidityPoolRow::from_entry(post)?)?,
                (Some(_), Some(post)) => {
                    updates.push((LiquidityPoolRow::from_entry(post)?, "updating"))
                }
                (Some(pre), None) => {
                    let mut tombstone = LiquidityPoolRow::from_entry(pre)?;
                    tombstone.deleted = true;
                    tombstone.last_modified_ledger = self.sequence;
                    updates.push((tombstone, "removing"));
                }
                (None, None) => {}
            }
        }
        let inserted = insert_batch.len();

        insert_batch
            .exec(ctx)
            .await
            .context("error executing liquidity pools batch insert")?;

        let written = updates.len();
        for (row, action) in updates {
            let pool_id = row.pool_id.clone();
            let rows_affected = self
                .pools_q
                .update_liquidity_pool(ctx, row)
                .await
                .context("error updating liquidity pool")?;
            expect_one_row(rows_affected, action, "liquidity pool", pool_id)?;
        }

        debug!(
            "Flushed liquidity pools: {} inserted, {} updated or removed",
            inserted, written
        );
        Ok(())
    }
}

#[async_trait]
impl ChangeProcessor for LiquidityPoolsProcessor {
    fn name(&self) -> &'static str {
        "liquidity_pools"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        if change.entry_type != LedgerEntryType::LiquidityPool {
            return Ok(());
        }

        self.cache
            .add_change(change)
            .context("error adding to change compactor")?;

        if self.cache.size() > self.max_batch_size {
            self.flush_cache(ctx).await.context("error flushing cache")?;
        }
        Ok(())
    }

    async fn commit(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        self.flush_cache(ctx).await.context("error flushing cache")?;

        if let Some(cutoff) = compaction_cutoff(self.sequence, self.compaction_window) {
            let removed = self
                .pools_q
                .compact_liquidity_pools(ctx, cutoff)
                .await
                .context("could not compact liquidity pools")?;
            info!(
                "Trimmed liquidity pools table: {} rows removed below ledger {}",
                removed, cutoff
            );
        }
        Ok(())
    }
}
