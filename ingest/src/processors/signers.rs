//! Signers processor
//!
//! Runs in one of two modes. State ingestion sees every account exactly once
//! as a creation, so [`SignersMode::InsertOnly`] writes the post signer
//! summary straight to a batch insert. Ledger ingestion uses
//! [`SignersMode::Diff`], which compacts account changes and realizes each
//! signer update as a removal followed by an insertion.

use async_trait::async_trait;
use ledgermirror_core::{
    AccountEntry, Change, ChangeProcessor, ChangeType, ErrorContext, IngestConfig, IngestContext,
    IngestError, IngestResult, LedgerEntryType,
};
use ledgermirror_state::{AccountSignerRow, BatchInsertBuilder, SignersQ};
use std::sync::Arc;
use tracing::debug;

use super::expect_one_row;
use crate::compactor::ChangeCompactor;
use crate::signers::account_signers_diff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignersMode {
    /// Bulk state ingestion: only creations are accepted
    InsertOnly,
    /// Steady-state ingestion through the signer-set differ
    Diff,
}

pub struct SignersProcessor {
    signers_q: Arc<dyn SignersQ>,
    mode: SignersMode,
    max_batch_size: usize,
    cache: ChangeCompactor,
    batch: Box<dyn BatchInsertBuilder<AccountSignerRow>>,
}

impl SignersProcessor {
    pub fn new(signers_q: Arc<dyn SignersQ>, mode: SignersMode, config: &IngestConfig) -> Self {
        let batch = signers_q.new_account_signers_batch_insert_builder();
        Self {
            signers_q,
            mode,
            max_batch_size: config.max_batch_size,
            cache: ChangeCompactor::new(),
            batch,
        }
    }

    pub fn mode(&self) -> SignersMode {
        self.mode
    }

    async fn insert_created(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        let account = match (&change.pre, &change.post, change.change_type) {
            (None, Some(post), ChangeType::Created) => account_of(post)?,
            _ => {
                return Err(IngestError::Usage(format!(
                    "signers processor in insert-only mode only accepts created changes, got {:?}",
                    change.change_type
                )))
            }
        };

        for (signer, entry) in account.signer_summary() {
            self.batch.add(AccountSignerRow {
                account_id: account.account_id.to_string(),
                signer,
                weight: entry.weight as i32,
                sponsor: entry.sponsor.map(|s| s.to_string()),
            })?;
        }

        if self.batch.len() > self.max_batch_size {
            self.batch
                .exec(ctx)
                .await
                .context("error executing batch")?;
        }
        Ok(())
    }

    async fn flush_cache(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        let changes = std::mem::take(&mut self.cache).into_changes();

        let mut removed_total = 0usize;
        let mut added_total = 0usize;
        for change in &changes {
            if !change.account_signers_changed()? {
                continue;
            }

            let account_id = match change.post.as_ref().or(change.pre.as_ref()) {
                Some(entry) => account_of(entry)?.account_id.to_string(),
                None => continue,
            };
            let diff = account_signers_diff(change)?;

            for signer in &diff.removed {
                let rows_affected = self
                    .signers_q
                    .remove_account_signer(ctx, &account_id, signer)
                    .await
                    .context("error removing signer")?;
                expect_one_row(
                    rows_affected,
                    "removing",
                    "signer",
                    format!("{} of account {}", signer, account_id),
                )?;
            }
            removed_total += diff.removed.len();

            let Some(added) = diff.added else {
                continue;
            };
            let sponsors = diff.sponsors.unwrap_or_default();
            for (signer, weight) in &added {
                let sponsor = sponsors.get(signer).map(|s| s.as_str());
                let rows_affected = self
                    .signers_q
                    .create_account_signer(ctx, &account_id, signer, *weight, sponsor)
                    .await
                    .context("error inserting signer")?;
                expect_one_row(
                    rows_affected,
                    "inserting",
                    "signer",
                    format!("{} of account {}", signer, account_id),
                )?;
            }
            added_total += added.len();
        }

        if removed_total + added_total > 0 {
            debug!(
                "Flushed signers: {} removed, {} inserted",
                removed_total, added_total
            );
        }
        Ok(())
    }
}

fn account_of(entry: &ledgermirror_core::LedgerEntry) -> IngestResult<&AccountEntry> {
    entry.as_account().ok_or_else(|| {
        IngestError::Usage(format!("expected account entry, got {}", entry.entry_type()))
    })
}

#[async_trait]
impl ChangeProcessor for SignersProcessor {
    fn name(&self) -> &'static str {
        "signers"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        if change.entry_type != LedgerEntryType::Account {
            return Ok(());
        }

        match self.mode {
            SignersMode::InsertOnly => self.insert_created(ctx, change).await,
            SignersMode::Diff => {
                self.cache
                    .add_change(change)
                    .context("error adding to change compactor")?;

                if self.cache.size() > self.max_batch_size {
                    self.flush_cache(ctx).await.context("error flushing cache")?;
                }
                Ok(())
            }
        }
    }

    async fn commit(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        match self.mode {
            SignersMode::InsertOnly => self.batch.exec(ctx).await.context("error executing batch"),
            SignersMode::Diff => self.flush_cache(ctx).await.context("error flushing cache"),
        }
    }
}
