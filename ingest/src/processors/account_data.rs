//! Account data processor

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ErrorContext, IngestConfig, IngestContext, IngestResult,
    LedgerEntryType,
};
use ledgermirror_state::{AccountDataQ, AccountDataRow};
use std::sync::Arc;
use tracing::debug;

use super::expect_rows;
use crate::compactor::ChangeCompactor;

pub struct AccountDataProcessor {
    data_q: Arc<dyn AccountDataQ>,
    max_batch_size: usize,
    cache: ChangeCompactor,
}

impl AccountDataProcessor {
    pub fn new(data_q: Arc<dyn AccountDataQ>, config: &IngestConfig) -> Self {
        Self {
            data_q,
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
                (_, Some(post)) => upserts.push(AccountDataRow::from_entry(post)?),
                (Some(pre), None) => removals.push(AccountDataRow::from_entry(pre)?.key()),
                (None, None) => {}
            }
        }

        if !upserts.is_empty() {
            let count = upserts.len();
            self.data_q
                .upsert_account_data(ctx, upserts)
                .await
                .context("error upserting account data")?;
            debug!("Upserted {} account data entries", count);
        }

        if !removals.is_empty() {
            let rows_affected = self
                .data_q
                .remove_account_data(ctx, &removals)
                .await
                .context("error removing account data")?;
            expect_rows(rows_affected, removals.len(), "removing", "account data entries")?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeProcessor for AccountDataProcessor {
    fn name(&self) -> &'static str {
        "account_data"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        if change.entry_type != LedgerEntryType::Data {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use ledgermirror_state::{MemoryHistoryStore, StoreCall, ACCOUNT_DATA_TABLE};

    fn processor(store: &MemoryHistoryStore) -> AccountDataProcessor {
        AccountDataProcessor::new(Arc::new(store.clone()), &IngestConfig::default())
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();

        let mut first = processor(&store);
        first
            .process_change(&ctx, &Change::created(data_entry(ACCOUNT_A, "name", b"v1", 10)))
            .await
            .unwrap();
        first
            .process_change(&ctx, &Change::created(data_entry(ACCOUNT_A, "other", b"v2", 10)))
            .await
            .unwrap();
        first.commit(&ctx).await.unwrap();
        assert_eq!(store.account_data(ACCOUNT_A, "name").unwrap().value, "djE=");

        let mut second = processor(&store);
        second
            .process_change(
                &ctx,
                &Change::updated(
                    data_entry(ACCOUNT_A, "name", b"v1", 10),
                    data_entry(ACCOUNT_A, "name", b"v3", 11),
                ),
            )
            .await
            .unwrap();
        second
            .process_change(&ctx, &Change::removed(data_entry(ACCOUNT_A, "other", b"v2", 10)))
            .await
            .unwrap();
        second.commit(&ctx).await.unwrap();

        let row = store.account_data(ACCOUNT_A, "name").unwrap();
        assert_eq!(row.value, "djM=");
        assert_eq!(row.last_modified_ledger, 11);
        assert!(store.account_data(ACCOUNT_A, "other").is_none());
        assert_eq!(
            store.call_log().calls()[1..],
            [
                StoreCall::Upsert {
                    table: ACCOUNT_DATA_TABLE,
                    rows: 1
                },
                StoreCall::Remove {
                    table: ACCOUNT_DATA_TABLE,
                    keys: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_missing_entry_is_state_error() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();
        let mut processor = processor(&store);

        processor
            .process_change(&ctx, &Change::removed(data_entry(ACCOUNT_B, "gone", b"x", 3)))
            .await
            .unwrap();
        let err = processor.commit(&ctx).await.unwrap_err();
        assert!(err.is_state_error());
        assert_eq!(
            err.to_string(),
            "error flushing cache: 0 rows affected when removing 1 account data entries"
        );
    }
}
