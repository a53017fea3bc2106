//! Offers processor
//!
//! Removed offers become tombstones stamped with the current ledger and are
//! purged once they fall outside the compaction window.

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ErrorContext, IngestConfig, IngestContext, IngestResult,
    LedgerEntryType,
};
use ledgermirror_state::{OfferRow, OffersQ};
use std::sync::Arc;
use tracing::{debug, info};

use super::{compaction_cutoff, expect_one_row, expect_rows};
use crate::compactor::ChangeCompactor;

pub struct OffersProcessor {
    offers_q: Arc<dyn OffersQ>,
    sequence: u32,
    compaction_window: u32,
    max_batch_size: usize,
    cache: ChangeCompactor,
}

impl OffersProcessor {
    pub fn new(offers_q: Arc<dyn OffersQ>, sequence: u32, config: &IngestConfig) -> Self {
        Self {
            offers_q,
            sequence,
            compaction_window: config.offer_compaction_window,
            max_batch_size: config.max_batch_size,
            cache: ChangeCompactor::new(),
        }
    }

    async fn flush_cache(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        let changes = std::mem::take(&mut self.cache).into_changes();
        if changes.is_empty() {
            return Ok(());
        }

        let mut insert_batch = self.offers_q.new_offers_batch_insert_builder();
        let mut updated = Vec::new();
        let mut removed = Vec::new();
        for change in &changes {
            match (&change.pre, &change.post) {
                (None, Some(post)) => insert_batch.add(OfferRow::from_entry(post)?)?,
                (Some(_), Some(post)) => updated.push(OfferRow::from_entry(post)?),
                (Some(pre), None) => removed.push(OfferRow::from_entry(pre)?.offer_id),
                (None, None) => {}
            }
        }
        let inserted = insert_batch.len();

        insert_batch
            .exec(ctx)
            .await
            .context("error executing offers batch insert")?;

        for row in updated.iter() {
            let offer_id = row.offer_id;
            let rows_affected = self
                .offers_q
                .update_offer(ctx, row.clone())
                .await
                .context("error updating offer")?;
            expect_one_row(rows_affected, "updating", "offer", offer_id)?;
        }

        if !removed.is_empty() {
            let rows_affected = self
                .offers_q
                .remove_offers(ctx, &removed, self.sequence)
                .await
                .context("error removing offers")?;
            expect_rows(rows_affected, removed.len(), "removing", "offers")?;
        }

        debug!(
            "Flushed offers: {} inserted, {} updated, {} removed",
            inserted,
            updated.len(),
            removed.len()
        );
        Ok(())
    }
}

#[async_trait]
impl ChangeProcessor for OffersProcessor {
    fn name(&self) -> &'static str {
        "offers"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        if change.entry_type != LedgerEntryType::Offer {
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
                .offers_q
                .compact_offers(ctx, cutoff)
                .await
                .context("could not compact offers")?;
            info!("Trimmed offers table: {} rows removed below ledger {}", removed, cutoff);
        }
        Ok(())
    }
}
