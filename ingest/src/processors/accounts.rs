//! Accounts processor
//!
//! Signer-only changes are skipped here; the signers processor owns them.

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ErrorContext, IngestConfig, IngestContext, IngestResult,
    LedgerEntryType,
};
use ledgermirror_state::{AccountRow, AccountsQ};
use std::sync::Arc;
use tracing::debug;

use super::expect_rows;
use crate::compactor::ChangeCompactor;

pub struct AccountsProcessor {
    accounts_q: Arc<dyn AccountsQ>,
    max_batch_size: usize,
    cache: ChangeCompactor,
}

impl AccountsProcessor {
    pub fn new(accounts_q: Arc<dyn AccountsQ>, config: &IngestConfig) -> Self {
        Self {
            accounts_q,
            max_batch_size: config.max_batch_size,
            cache: ChangeCompactor::new(),
        }
    }

    async fn flush_cache(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        let changes = std::mem::take(&mut self.cache).into_changes();

        let mut upserts = Vec::new();
        let mut removals = Vec::new();
        let mut skipped = 0usize;
        for change in &changes {
            if !change.account_changed_except_signers()? {
                skipped += 1;
                continue;
            }
            match (&change.pre, &change.post) {
                (_, Some(post)) => upserts.push(AccountRow::from_entry(post)?),
                (Some(pre), None) => removals.push(AccountRow::from_entry(pre)?.account_id),
                (None, None) => {}
            }
        }

        if !upserts.is_empty() {
            let count = upserts.len();
            self.accounts_q
                .upsert_accounts(ctx, upserts)
                .await
                .context("error upserting accounts")?;
            debug!("Upserted {} accounts", count);
        }

        if !removals.is_empty() {
            let rows_affected = self
                .accounts_q
                .remove_accounts(ctx, &removals)
                .await
                .context("error removing accounts")?;
            expect_rows(rows_affected, removals.len(), "deleting", "accounts")?;
        }

        if skipped > 0 {
            debug!("Skipped {} accounts with only signer changes", skipped);
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeProcessor for AccountsProcessor {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        if change.entry_type != LedgerEntryType::Account {
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
    use ledgermirror_core::LedgerEntryData;
    use ledgermirror_state::{MemoryHistoryStore, StoreCall, ACCOUNTS_TABLE};

    fn processor(store: &MemoryHistoryStore) -> AccountsProcessor {
        AccountsProcessor::new(Arc::new(store.clone()), &IngestConfig::default())
    }

    #[tokio::test]
    async fn test_create_then_update_in_one_batch_emits_one_row() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();
        let mut processor = processor(&store);

        let created = account_entry(ACCOUNT_A, [1, 1, 1, 1], 123);
        let mut updated = account_entry(ACCOUNT_A, [0, 1, 2, 3], 124);
        if let LedgerEntryData::Account(account) = &mut updated.data {
            account.home_domain = "x".to_string();
        }

        processor
            .process_change(&ctx, &Change::created(created.clone()))
            .await
            .unwrap();
        processor
            .process_change(&ctx, &Change::updated(created, updated))
            .await
            .unwrap();
        processor.commit(&ctx).await.unwrap();

        assert_eq!(
            store.call_log().calls(),
            vec![StoreCall::Upsert {
                table: ACCOUNTS_TABLE,
                rows: 1
            }]
        );
        let row = store.account(ACCOUNT_A).unwrap();
        assert_eq!(row.master_weight, 0);
        assert_eq!(row.threshold_low, 1);
        assert_eq!(row.threshold_medium, 2);
        assert_eq!(row.threshold_high, 3);
        assert_eq!(row.home_domain, "x");
        assert_eq!(row.last_modified_ledger, 124);
    }

    #[tokio::test]
    async fn test_signer_only_change_skipped() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();
        let mut processor = processor(&store);

        let pre = account_entry(ACCOUNT_A, [1, 1, 1, 1], 10);
        let post =
            account_with_signers(ACCOUNT_A, [1, 1, 1, 1], vec![signer(SIGNER_1, 1, None)], 10);
        processor
            .process_change(&ctx, &Change::updated(pre, post))
            .await
            .unwrap();
        processor.commit(&ctx).await.unwrap();

        assert!(store.call_log().calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_account() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();
        let entry = account_entry(ACCOUNT_A, [1, 1, 1, 1], 10);

        let mut first = processor(&store);
        first
            .process_change(&ctx, &Change::created(entry.clone()))
            .await
            .unwrap();
        first.commit(&ctx).await.unwrap();

        let mut second = processor(&store);
        second
            .process_change(&ctx, &Change::removed(entry.clone()))
            .await
            .unwrap();
        second.commit(&ctx).await.unwrap();
        assert!(store.account(ACCOUNT_A).is_none());

        // already gone
        let mut third = processor(&store);
        third
            .process_change(&ctx, &Change::removed(entry))
            .await
            .unwrap();
        let err = third.commit(&ctx).await.unwrap_err();
        assert!(err.is_state_error());
        assert_eq!(
            err.to_string(),
            "error flushing cache: 0 rows affected when deleting 1 accounts"
        );
    }

    #[tokio::test]
    async fn test_discontinuous_update_rejected() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();
        let mut processor = processor(&store);

        let v1 = account_entry(ACCOUNT_A, [1, 1, 1, 1], 10);
        let v2 = account_entry(ACCOUNT_A, [2, 1, 1, 1], 11);
        let v3 = account_entry(ACCOUNT_A, [3, 1, 1, 1], 12);
        processor
            .process_change(&ctx, &Change::updated(v1.clone(), v2))
            .await
            .unwrap();
        let err = processor
            .process_change(&ctx, &Change::updated(v1, v3))
            .await
            .unwrap_err();
        assert!(err.is_continuity_error());
    }

    #[tokio::test]
    async fn test_cancelled_commit() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();
        let mut processor = processor(&store);

        processor
            .process_change(&ctx, &Change::created(account_entry(ACCOUNT_A, [1, 1, 1, 1], 10)))
            .await
            .unwrap();
        ctx.cancel();
        let err = processor.commit(&ctx).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(store.account(ACCOUNT_A).is_none());
    }
}
