//! Store ports, one family per entity kind
//!
//! Every call takes the ingestion context and must fail promptly with
//! `IngestError::Cancelled` once it is cancelled. Calls that return an
//! `i64` report the number of rows they affected; callers enforce the
//! expected count.

use crate::rows::*;
use async_trait::async_trait;
use ledgermirror_core::{IngestContext, IngestResult};

/// Buffers rows and writes them with one insert on `exec`
#[async_trait]
pub trait BatchInsertBuilder<R: Send + 'static>: Send {
    fn add(&mut self, row: R) -> IngestResult<()>;

    /// Insert every buffered row and reset the buffer
    async fn exec(&mut self, ctx: &IngestContext) -> IngestResult<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait AccountsQ: Send + Sync {
    async fn upsert_accounts(&self, ctx: &IngestContext, rows: Vec<AccountRow>) -> IngestResult<()>;

    async fn remove_accounts(
        &self,
        ctx: &IngestContext,
        account_ids: &[String],
    ) -> IngestResult<i64>;
}

#[async_trait]
pub trait AccountDataQ: Send + Sync {
    async fn upsert_account_data(
        &self,
        ctx: &IngestContext,
        rows: Vec<AccountDataRow>,
    ) -> IngestResult<()>;

    async fn remove_account_data(
        &self,
        ctx: &IngestContext,
        keys: &[AccountDataKey],
    ) -> IngestResult<i64>;
}

#[async_trait]
pub trait ClaimableBalancesQ: Send + Sync {
    fn new_claimable_balance_batch_insert_builder(
        &self,
    ) -> Box<dyn BatchInsertBuilder<ClaimableBalanceRow>>;

    async fn update_claimable_balance(
        &self,
        ctx: &IngestContext,
        row: ClaimableBalanceRow,
    ) -> IngestResult<i64>;

    async fn remove_claimable_balance(
        &self,
        ctx: &IngestContext,
        balance_id: &str,
    ) -> IngestResult<i64>;
}

#[async_trait]
pub trait LiquidityPoolsQ: Send + Sync {
    fn new_liquidity_pool_batch_insert_builder(
        &self,
    ) -> Box<dyn BatchInsertBuilder<LiquidityPoolRow>>;

    /// Replace a live pool row. Tombstones are written through here too.
    async fn update_liquidity_pool(
        &self,
        ctx: &IngestContext,
        row: LiquidityPoolRow,
    ) -> IngestResult<i64>;

    /// Purge tombstones last modified at or before `cutoff`
    async fn compact_liquidity_pools(&self, ctx: &IngestContext, cutoff: u32) -> IngestResult<i64>;
}

#[async_trait]
pub trait OffersQ: Send + Sync {
    fn new_offers_batch_insert_builder(&self) -> Box<dyn BatchInsertBuilder<OfferRow>>;

    async fn update_offer(&self, ctx: &IngestContext, row: OfferRow) -> IngestResult<i64>;

    /// Tombstone the given offers as of ledger `sequence`
    async fn remove_offers(
        &self,
        ctx: &IngestContext,
        offer_ids: &[i64],
        sequence: u32,
    ) -> IngestResult<i64>;

    /// Purge tombstones last modified at or before `cutoff`
    async fn compact_offers(&self, ctx: &IngestContext, cutoff: u32) -> IngestResult<i64>;
}

#[async_trait]
pub trait TrustLinesQ: Send + Sync {
    async fn upsert_trust_lines(
        &self,
        ctx: &IngestContext,
        rows: Vec<TrustLineRow>,
    ) -> IngestResult<()>;

    async fn remove_trust_lines(
        &self,
        ctx: &IngestContext,
        ledger_keys: &[String],
    ) -> IngestResult<i64>;
}

#[async_trait]
pub trait SignersQ: Send + Sync {
    fn new_account_signers_batch_insert_builder(
        &self,
    ) -> Box<dyn BatchInsertBuilder<AccountSignerRow>>;

    /// Insert a signer; an existing (account, signer) pair is left alone and
    /// reported as 0 rows
    async fn create_account_signer(
        &self,
        ctx: &IngestContext,
        account: &str,
        signer: &str,
        weight: i32,
        sponsor: Option<&str>,
    ) -> IngestResult<i64>;

    async fn remove_account_signer(
        &self,
        ctx: &IngestContext,
        account: &str,
        signer: &str,
    ) -> IngestResult<i64>;
}
