//! Trust lines processor

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ErrorContext, IngestConfig, IngestContext, IngestResult,
    LedgerEntryType,
};
use ledgermirror_state::{TrustLineRow, TrustLinesQ};
use std::sync::Arc;
use tracing::debug;

use super::expect_rows;
use crate::compactor::ChangeCompactor;

pub struct TrustLinesProcessor {
    trust_lines_q: Arc<dyn TrustLinesQ>,
    max_batch_size: usize,
    cache: ChangeCompactor,
}

impl TrustLinesProcessor {
    pub fn new(trust_lines_q: Arc<dyn TrustLinesQ>, config: &IngestConfig) -> Self {
        Self {
            trust_lines_q,
            max_batch_size: config.max_batch_size,
            cache: ChangeCompactor::new(),
        }
    }

    async fn flush_cache(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        let changes = std::mem::take(&mut self.cache).into_changes();

        let mut upserts = Vec::new();
        let mut removals = Vec::new();
        for change in &changes {
            match (&change.pre, &change.post) {
                (_, Some(post)) => upserts.push(TrustLineRow::from_entry(post)?),
                (Some(pre), None) => removals.push(TrustLineRow::from_entry(pre)?.ledger_key),
                (None, None) => {}
            }
        }

        if !upserts.is_empty() {
            let count = upserts.len();
            self.trust_lines_q
                .upsert_trust_lines(ctx, upserts)
                .await
                .context("error upserting trust lines")?;
            debug!("Upserted {} trust lines", count);
        }

        if !removals.is_empty() {
            let rows_affected = self
                .trust_lines_q
                .remove_trust_lines(ctx, &removals)
                .await
                .context("error executing removal")?;
            expect_rows(rows_affected, removals.len(), "removing", "trust lines")?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeProcessor for TrustLinesProcessor {
    fn name(&self) -> &'static str {
        "trust_lines"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        if change.entry_type != LedgerEntryType::TrustLine {
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
