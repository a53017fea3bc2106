//! In-memory history store for tests and replays
//!
//! Mirrors the relational store closely enough that processors behave the
//! same against it: primary keys are enforced on insert, updates and
//! removals report affected rows, and soft-deleted rows stay in their table
//! until compacted.

use async_trait::async_trait;
use dashmap::DashMap;
use ledgermirror_core::{IngestContext, IngestError, IngestResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

use crate::rows::*;
use crate::store::*;

pub const ACCOUNTS_TABLE: &str = "accounts";
pub const ACCOUNT_DATA_TABLE: &str = "accounts_data";
pub const CLAIMABLE_BALANCES_TABLE: &str = "claimable_balances";
pub const LIQUIDITY_POOLS_TABLE: &str = "liquidity_pools";
pub const OFFERS_TABLE: &str = "offers";
pub const TRUST_LINES_TABLE: &str = "trust_lines";
pub const SIGNERS_TABLE: &str = "accounts_signers";

/// One call made against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upsert { table: &'static str, rows: usize },
    BatchInsert { table: &'static str, rows: usize },
    Update { table: &'static str },
    Remove { table: &'static str, keys: usize },
    Compact { table: &'static str, cutoff: u32 },
}

/// Record of every mutating call, in order
#[derive(Debug, Default)]
pub struct StoreCallLog {
    calls: Mutex<Vec<StoreCall>>,
}

impl StoreCallLog {
    fn record(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn upserts(&self, table: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, StoreCall::Upsert { table: t, .. } if *t == table))
            .count()
    }

    pub fn batch_inserts(&self, table: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, StoreCall::BatchInsert { table: t, .. } if *t == table))
            .count()
    }

    pub fn updates(&self, table: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, StoreCall::Update { table: t } if *t == table))
            .count()
    }

    /// Cutoffs of every compaction issued against `table`
    pub fn compactions(&self, table: &str) -> Vec<u32> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                StoreCall::Compact { table: t, cutoff } if *t == table => Some(*cutoff),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct Tables {
    accounts: DashMap<String, AccountRow>,
    account_data: DashMap<AccountDataKey, AccountDataRow>,
    claimable_balances: DashMap<String, ClaimableBalanceRow>,
    liquidity_pools: DashMap<String, LiquidityPoolRow>,
    offers: DashMap<i64, OfferRow>,
    trust_lines: DashMap<String, TrustLineRow>,
    signers: DashMap<(String, String), AccountSignerRow>,
}

/// In-memory history store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    tables: Arc<Tables>,
    log: Arc<StoreCallLog>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_log(&self) -> &StoreCallLog {
        &self.log
    }

    pub fn account(&self, account_id: &str) -> Option<AccountRow> {
        self.tables.accounts.get(account_id).map(|r| r.value().clone())
    }

    pub fn account_data(&self, account_id: &str, name: &str) -> Option<AccountDataRow> {
        let key = AccountDataKey {
            account_id: account_id.to_string(),
            data_name: name.to_string(),
        };
        self.tables.account_data.get(&key).map(|r| r.value().clone())
    }

    pub fn claimable_balance(&self, balance_id: &str) -> Option<ClaimableBalanceRow> {
        self.tables
            .claimable_balances
            .get(balance_id)
            .map(|r| r.value().clone())
    }

    /// Pool row by hex id, tombstones included
    pub fn liquidity_pool(&self, pool_id: &str) -> Option<LiquidityPoolRow> {
        self.tables
            .liquidity_pools
            .get(pool_id)
            .map(|r| r.value().clone())
    }

    /// Offer row by id, tombstones included
    pub fn offer(&self, offer_id: i64) -> Option<OfferRow> {
        self.tables.offers.get(&offer_id).map(|r| r.value().clone())
    }

    pub fn trust_line(&self, ledger_key: &str) -> Option<TrustLineRow> {
        self.tables
            .trust_lines
            .get(ledger_key)
            .map(|r| r.value().clone())
    }

    /// Signers of `account_id`, ordered by signer key
    pub fn signers(&self, account_id: &str) -> Vec<AccountSignerRow> {
        let mut rows: Vec<AccountSignerRow> = self
            .tables
            .signers
            .iter()
            .filter(|r| r.value().account_id == account_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| a.signer.cmp(&b.signer));
        rows
    }

    /// Row count per table, tombstones included
    pub fn table_sizes(&self) -> BTreeMap<&'static str, usize> {
        let t = &self.tables;
        BTreeMap::from([
            (ACCOUNTS_TABLE, t.accounts.len()),
            (ACCOUNT_DATA_TABLE, t.account_data.len()),
            (CLAIMABLE_BALANCES_TABLE, t.claimable_balances.len()),
            (LIQUIDITY_POOLS_TABLE, t.liquidity_pools.len()),
            (OFFERS_TABLE, t.offers.len()),
            (TRUST_LINES_TABLE, t.trust_lines.len()),
            (SIGNERS_TABLE, t.signers.len()),
        ])
    }
}

/// Insert `rows` keyed by `key`, failing without writing anything if a key
/// repeats or collides with a live row. Tombstoned rows may be overwritten.
fn insert_rows<K, R>(
    table: &DashMap<K, R>,
    name: &str,
    rows: Vec<R>,
    key: impl Fn(&R) -> K,
    is_live: impl Fn(&R) -> bool,
) -> IngestResult<()>
where
    K: Eq + Hash + Clone + Debug,
{
    let mut seen = HashSet::with_capacity(rows.len());
    for row in &rows {
        let k = key(row);
        let live = table.get(&k).map(|r| is_live(r.value())).unwrap_or(false);
        if live || !seen.insert(k.clone()) {
            return Err(IngestError::Storage(format!(
                "duplicate key {:?} violates {} primary key",
                k, name
            )));
        }
    }
    for row in rows {
        table.insert(key(&row), row);
    }
    Ok(())
}

/// Rows the in-memory store can batch insert
pub trait MemoryRow: Send + Sync + 'static {
    const TABLE: &'static str;

    fn insert_all(store: &MemoryHistoryStore, rows: Vec<Self>) -> IngestResult<()>
    where
        Self: Sized;
}

impl MemoryRow for ClaimableBalanceRow {
    const TABLE: &'static str = CLAIMABLE_BALANCES_TABLE;

    fn insert_all(store: &MemoryHistoryStore, rows: Vec<Self>) -> IngestResult<()> {
        insert_rows(
            &store.tables.claimable_balances,
            Self::TABLE,
            rows,
            |r| r.balance_id.clone(),
            |_| true,
        )
    }
}

impl MemoryRow for LiquidityPoolRow {
    const TABLE: &'static str = LIQUIDITY_POOLS_TABLE;

    fn insert_all(store: &MemoryHistoryStore, rows: Vec<Self>) -> IngestResult<()> {
        insert_rows(
            &store.tables.liquidity_pools,
            Self::TABLE,
            rows,
            |r| r.pool_id.clone(),
            |r| !r.deleted,
        )
    }
}

impl MemoryRow for OfferRow {
    const TABLE: &'static str = OFFERS_TABLE;

    fn insert_all(store: &MemoryHistoryStore, rows: Vec<Self>) -> IngestResult<()> {
        insert_rows(
            &store.tables.offers,
            Self::TABLE,
            rows,
            |r| r.offer_id,
            |r| !r.deleted,
        )
    }
}

impl MemoryRow for AccountSignerRow {
    const TABLE: &'static str = SIGNERS_TABLE;

    fn insert_all(store: &MemoryHistoryStore, rows: Vec<Self>) -> IngestResult<()> {
        insert_rows(
            &store.tables.signers,
            Self::TABLE,
            rows,
            |r| (r.account_id.clone(), r.signer.clone()),
            |_| true,
        )
    }
}

/// Batch insert builder over a [`MemoryHistoryStore`] table
pub struct MemoryBatchInsertBuilder<R> {
    store: MemoryHistoryStore,
    rows: Vec<R>,
}

impl<R> MemoryBatchInsertBuilder<R> {
    pub fn new(store: MemoryHistoryStore) -> Self {
        Self {
            store,
            rows: Vec::new(),
        }
    }
}

#[async_trait]
impl<R: MemoryRow> BatchInsertBuilder<R> for MemoryBatchInsertBuilder<R> {
    fn add(&mut self, row: R) -> IngestResult<()> {
        self.rows.push(row);
        Ok(())
    }

    async fn exec(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        ctx.check()?;
        if self.rows.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.rows);
        let count = rows.len();
        R::insert_all(&self.store, rows)?;
        self.store.log.record(StoreCall::BatchInsert {
            table: R::TABLE,
            rows: count,
        });
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl AccountsQ for MemoryHistoryStore {
    async fn upsert_accounts(
        &self,
        ctx: &IngestContext,
        rows: Vec<AccountRow>,
    ) -> IngestResult<()> {
        ctx.check()?;
        self.log.record(StoreCall::Upsert {
            table: ACCOUNTS_TABLE,
            rows: rows.len(),
        });
        for row in rows {
            self.tables.accounts.insert(row.account_id.clone(), row);
        }
        Ok(())
    }

    async fn remove_accounts(
        &self,
        ctx: &IngestContext,
        account_ids: &[String],
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Remove {
            table: ACCOUNTS_TABLE,
            keys: account_ids.len(),
        });
        let removed = account_ids
            .iter()
            .filter(|id| self.tables.accounts.remove(id.as_str()).is_some())
            .count();
        Ok(removed as i64)
    }
}

#[async_trait]
impl AccountDataQ for MemoryHistoryStore {
    async fn upsert_account_data(
        &self,
        ctx: &IngestContext,
        rows: Vec<AccountDataRow>,
    ) -> IngestResult<()> {
        ctx.check()?;
        self.log.record(StoreCall::Upsert {
            table: ACCOUNT_DATA_TABLE,
            rows: rows.len(),
        });
        for row in rows {
            self.tables.account_data.insert(row.key(), row);
        }
        Ok(())
    }

    async fn remove_account_data(
        &self,
        ctx: &IngestContext,
        keys: &[AccountDataKey],
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Remove {
            table: ACCOUNT_DATA_TABLE,
            keys: keys.len(),
        });
        let removed = keys
            .iter()
            .filter(|key| self.tables.account_data.remove(*key).is_some())
            .count();
        Ok(removed as i64)
    }
}

#[async_trait]
impl ClaimableBalancesQ for MemoryHistoryStore {
    fn new_claimable_balance_batch_insert_builder(
        &self,
    ) -> Box<dyn BatchInsertBuilder<ClaimableBalanceRow>> {
        Box::new(MemoryBatchInsertBuilder::new(self.clone()))
    }

    async fn update_claimable_balance(
        &self,
        ctx: &IngestContext,
        row: ClaimableBalanceRow,
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Update {
            table: CLAIMABLE_BALANCES_TABLE,
        });
        match self.tables.claimable_balances.get_mut(&row.balance_id) {
            Some(mut existing) => {
                *existing = row;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove_claimable_balance(
        &self,
        ctx: &IngestContext,
        balance_id: &str,
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Remove {
            table: CLAIMABLE_BALANCES_TABLE,
            keys: 1,
        });
        Ok(self.tables.claimable_balances.remove(balance_id).map_or(0, |_| 1))
    }
}

#[async_trait]
impl LiquidityPoolsQ for MemoryHistoryStore {
    fn new_liquidity_pool_batch_insert_builder(
        &self,
    ) -> Box<dyn BatchInsertBuilder<LiquidityPoolRow>> {
        Box::new(MemoryBatchInsertBuilder::new(self.clone()))
    }

    async fn update_liquidity_pool(
        &self,
        ctx: &IngestContext,
        row: LiquidityPoolRow,
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Update {
            table: LIQUIDITY_POOLS_TABLE,
        });
        match self.tables.liquidity_pools.get_mut(&row.pool_id) {
            Some(mut existing) if !existing.deleted => {
                *existing = row;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn compact_liquidity_pools(&self, ctx: &IngestContext, cutoff: u32) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Compact {
            table: LIQUIDITY_POOLS_TABLE,
            cutoff,
        });
        let before = self.tables.liquidity_pools.len();
        self.tables
            .liquidity_pools
            .retain(|_, row| !(row.deleted && row.last_modified_ledger <= cutoff));
        let removed = before - self.tables.liquidity_pools.len();
        debug!(cutoff, removed, "Compacted liquidity pool tombstones");
        Ok(removed as i64)
    }
}

#[async_trait]
impl OffersQ for MemoryHistoryStore {
    fn new_offers_batch_insert_builder(&self) -> Box<dyn BatchInsertBuilder<OfferRow>> {
        Box::new(MemoryBatchInsertBuilder::new(self.clone()))
    }

    async fn update_offer(&self, ctx: &IngestContext, row: OfferRow) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Update { table: OFFERS_TABLE });
        match self.tables.offers.get_mut(&row.offer_id) {
            Some(mut existing) if !existing.deleted => {
                *existing = row;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn remove_offers(
        &self,
        ctx: &IngestContext,
        offer_ids: &[i64],
        sequence: u32,
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Remove {
            table: OFFERS_TABLE,
            keys: offer_ids.len(),
        });
        let mut removed = 0;
        for offer_id in offer_ids {
            if let Some(mut row) = self.tables.offers.get_mut(offer_id) {
                if !row.deleted {
                    row.deleted = true;
                    row.last_modified_ledger = sequence;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn compact_offers(&self, ctx: &IngestContext, cutoff: u32) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Compact {
            table: OFFERS_TABLE,
            cutoff,
        });
        let before = self.tables.offers.len();
        self.tables
            .offers
            .retain(|_, row| !(row.deleted && row.last_modified_ledger <= cutoff));
        let removed = before - self.tables.offers.len();
        debug!(cutoff, removed, "Compacted offer tombstones");
        Ok(removed as i64)
    }
}

#[async_trait]
impl TrustLinesQ for MemoryHistoryStore {
    async fn upsert_trust_lines(
        &self,
        ctx: &IngestContext,
        rows: Vec<TrustLineRow>,
    ) -> IngestResult<()> {
        ctx.check()?;
        self.log.record(StoreCall::Upsert {
            table: TRUST_LINES_TABLE,
            rows: rows.len(),
        });
        for row in rows {
            self.tables.trust_lines.insert(row.ledger_key.clone(), row);
        }
        Ok(())
    }

    async fn remove_trust_lines(
        &self,
        ctx: &IngestContext,
        ledger_keys: &[String],
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Remove {
            table: TRUST_LINES_TABLE,
            keys: ledger_keys.len(),
        });
        let removed = ledger_keys
            .iter()
            .filter(|key| self.tables.trust_lines.remove(key.as_str()).is_some())
            .count();
        Ok(removed as i64)
    }
}

#[async_trait]
impl SignersQ for MemoryHistoryStore {
    fn new_account_signers_batch_insert_builder(
        &self,
    ) -> Box<dyn BatchInsertBuilder<AccountSignerRow>> {
        Box::new(MemoryBatchInsertBuilder::new(self.clone()))
    }

    async fn create_account_signer(
        &self,
        ctx: &IngestContext,
        account: &str,
        signer: &str,
        weight: i32,
        sponsor: Option<&str>,
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Upsert {
            table: SIGNERS_TABLE,
            rows: 1,
        });
        let key = (account.to_string(), signer.to_string());
        if self.tables.signers.contains_key(&key) {
            return Ok(0);
        }
        self.tables.signers.insert(
            key,
            AccountSignerRow {
                account_id: account.to_string(),
                signer: signer.to_string(),
                weight,
                sponsor: sponsor.map(str::to_string),
            },
        );
        Ok(1)
    }

    async fn remove_account_signer(
        &self,
        ctx: &IngestContext,
        account: &str,
        signer: &str,
    ) -> IngestResult<i64> {
        ctx.check()?;
        self.log.record(StoreCall::Remove {
            table: SIGNERS_TABLE,
            keys: 1,
        });
        let key = (account.to_string(), signer.to_string());
        Ok(self.tables.signers.remove(&key).map_or(0, |_| 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(offer_id: i64, ledger: u32) -> OfferRow {
        OfferRow {
            seller_id: "GSELLER".to_string(),
            offer_id,
            selling_asset: "native".to_string(),
            buying_asset: "USD:GISSUER".to_string(),
            amount: 100,
            price_n: 1,
            price_d: 2,
            price: 0.5,
            flags: 0,
            sponsor: None,
            deleted: false,
            last_modified_ledger: ledger,
        }
    }

    #[tokio::test]
    async fn test_offer_tombstone_lifecycle() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();

        let mut builder = store.new_offers_batch_insert_builder();
        builder.add(offer(1, 10)).unwrap();
        builder.add(offer(2, 10)).unwrap();
        assert_eq!(builder.len(), 2);
        builder.exec(&ctx).await.unwrap();
        assert!(builder.is_empty());

        assert_eq!(store.remove_offers(&ctx, &[1, 3], 20).await.unwrap(), 1);
        let tombstone = store.offer(1).unwrap();
        assert!(tombstone.deleted);
        assert_eq!(tombstone.last_modified_ledger, 20);

        // tombstones are invisible to updates and removals
        assert_eq!(store.update_offer(&ctx, offer(1, 21)).await.unwrap(), 0);
        assert_eq!(store.remove_offers(&ctx, &[1], 21).await.unwrap(), 0);

        assert_eq!(store.compact_offers(&ctx, 19).await.unwrap(), 0);
        assert_eq!(store.compact_offers(&ctx, 20).await.unwrap(), 1);
        assert!(store.offer(1).is_none());
        assert!(store.offer(2).is_some());
        assert_eq!(store.call_log().compactions(OFFERS_TABLE), vec![19, 20]);
    }

    #[tokio::test]
    async fn test_insert_rejects_live_duplicate_but_replaces_tombstone() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();

        let mut builder = store.new_offers_batch_insert_builder();
        builder.add(offer(1, 10)).unwrap();
        builder.exec(&ctx).await.unwrap();

        builder.add(offer(1, 11)).unwrap();
        assert!(builder.exec(&ctx).await.is_err());

        store.remove_offers(&ctx, &[1], 12).await.unwrap();
        builder.add(offer(1, 13)).unwrap();
        builder.exec(&ctx).await.unwrap();
        assert!(!store.offer(1).unwrap().deleted);
        assert_eq!(store.call_log().batch_inserts(OFFERS_TABLE), 2);
    }

    #[tokio::test]
    async fn test_signer_conflict_reports_zero_rows() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();

        assert_eq!(store.create_account_signer(&ctx, "GA", "GB", 1, None).await.unwrap(), 1);
        assert_eq!(store.create_account_signer(&ctx, "GA", "GB", 2, None).await.unwrap(), 0);
        assert_eq!(store.signers("GA")[0].weight, 1);
        assert_eq!(store.remove_account_signer(&ctx, "GA", "GB").await.unwrap(), 1);
        assert_eq!(store.remove_account_signer(&ctx, "GA", "GB").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_rejects_calls() {
        let store = MemoryHistoryStore::new();
        let ctx = IngestContext::new();
        ctx.cancel();

        let err = store.remove_accounts(&ctx, &["GA".to_string()]).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(store.call_log().calls().is_empty());
    }
}
