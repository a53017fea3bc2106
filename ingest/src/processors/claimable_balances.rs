//! Claimable balances processor

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ErrorContext, IngestConfig, IngestContext, IngestResult,
    LedgerEntryType,
};
use ledgermirror_state::{ClaimableBalanceRow, ClaimableBalancesQ};
use std::sync::Arc;
use tracing::debug;

use super::expect_one_row;
use crate::compactor::ChangeCompactor;

pub struct ClaimableBalancesProcessor {
    balances_q: Arc<dyn ClaimableBalancesQ>,
    max_batch_size: usize,
    cache: ChangeCompactor,
}

impl ClaimableBalancesProcessor {
    pub fn new(balances_q: Arc<dyn ClaimableBalancesQ>, config: &IngestConfig) -> Self {
        Self {
            balances_q,
            max_batch_size: config.max_batch_size,
            cache: ChangeCompactor::new(),
        }
    }

    async fn flush_cache(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        let changes = std::mem::take(&mut self.cache).into_changes();
        if changes.is_empty() {
            return Ok(());
        }

        let mut insert_batch = self.balances_q.new_claimable_balance_batch_insert_builder();
        let mut updated = Vec::new();
        let mut removed = Vec::new();
        for change in &changes {
            match (&change.pre, &change.post) {
                (None, Some(post)) => insert_batch.add(ClaimableBalanceRow::from_entry(post)?)?,
                (Some(_), Some(post)) => updated.push(ClaimableBalanceRow::from_entry(post)?),
                (Some(pre), None) => removed.push(ClaimableBalanceRow::from_entry(pre)?.balance_id),
                (None, None) => {}
            }
        }
        let inserted = insert_batch.len();

        insert_batch
            .exec(ctx)
            .await
            .context("error executing claimable balances batch insert")?;

        let updated_count = updated.len();
        for row in updated {
            let balance_id = row.balance_id.clone();
            let rows_affected = self
                .balances_q
                .update_claimable_balance(ctx, row)
                .await
                .context("error updating claimable balance")?;
            expect_one_row(rows_affected, "updating", "claimable balance", balance_id)?;
        }

        for balance_id in &removed {
            let rows_affected = self
                .balances_q
                .remove_claimable_balance(ctx, balance_id)
                .await
                .context("error removing claimable balance")?;
            expect_one_row(rows_affected, "removing", "claimable balance", balance_id)?;
        }

        debug!(
            "Flushed claimable balances: {} inserted, {} updated, {} removed",
            inserted,
            updated_count,
            removed.len()
        );
        Ok(())
    }
}

#[async_trait]
impl ChangeProcessor for ClaimableBalancesProcessor {
    fn name(&self) -> &'static str {
        "claimable_balances"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        if change.entry_type != LedgerEntryType::ClaimableBalance {
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
        self.flush_cache(ctx).await.context("error flushing cache")
    }
}
