//! Row projections of ledger entries
//!
//! Each row type is the flat shape one entry kind takes in the history
//! store. Rows are built fresh from a change's post entry on every flush.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ledgermirror_core::{
    AccountId, ClaimPredicate, IngestError, IngestResult, LedgerEntry, LedgerEntryType,
    LedgerKey, TrustLineAsset,
};
use serde::{Deserialize, Serialize};

fn wrong_kind(expected: LedgerEntryType, entry: &LedgerEntry) -> IngestError {
    IngestError::Usage(format!(
        "expected {} entry, got {}",
        expected,
        entry.entry_type()
    ))
}

fn sponsor_of(entry: &LedgerEntry) -> Option<String> {
    entry.sponsor.as_ref().map(|s| s.to_string())
}

/// Account row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account_id: String,
    pub balance: i64,
    pub buying_liabilities: i64,
    pub selling_liabilities: i64,
    pub sequence_number: i64,
    pub sequence_ledger: Option<u32>,
    pub sequence_time: Option<u64>,
    pub num_sub_entries: u32,
    pub inflation_destination: String,
    pub flags: u32,
    pub home_domain: String,
    pub master_weight: u8,
    pub threshold_low: u8,
    pub threshold_medium: u8,
    pub threshold_high: u8,
    pub sponsor: Option<String>,
    pub num_sponsored: u32,
    pub num_sponsoring: u32,
    pub last_modified_ledger: u32,
}

impl AccountRow {
    pub fn from_entry(entry: &LedgerEntry) -> IngestResult<Self> {
        let account = entry
            .as_account()
            .ok_or_else(|| wrong_kind(LedgerEntryType::Account, entry))?;
        Ok(Self {
            account_id: account.account_id.to_string(),
            balance: account.balance,
            buying_liabilities: account.buying_liabilities,
            selling_liabilities: account.selling_liabilities,
            sequence_number: account.seq_num,
            sequence_ledger: account.seq_ledger,
            sequence_time: account.seq_time,
            num_sub_entries: account.num_sub_entries,
            inflation_destination: account
                .inflation_dest
                .as_ref()
                .map(AccountId::to_string)
                .unwrap_or_default(),
            flags: account.flags,
            home_domain: account.home_domain.clone(),
            master_weight: account.master_weight(),
            threshold_low: account.threshold_low(),
            threshold_medium: account.threshold_medium(),
            threshold_high: account.threshold_high(),
            sponsor: sponsor_of(entry),
            num_sponsored: account.num_sponsored,
            num_sponsoring: account.num_sponsoring,
            last_modified_ledger: entry.last_modified_ledger_seq,
        })
    }
}

/// Primary key of an account data row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountDataKey {
    pub account_id: String,
    pub data_name: String,
}

/// Per-account named data row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDataRow {
    pub account_id: String,
    pub name: String,
    /// base64 of the raw value
    pub value: String,
    pub sponsor: Option<String>,
    pub last_modified_ledger: u32,
}

impl AccountDataRow {
    pub fn from_entry(entry: &LedgerEntry) -> IngestResult<Self> {
        let data = entry
            .as_data()
            .ok_or_else(|| wrong_kind(LedgerEntryType::Data, entry))?;
        Ok(Self {
            account_id: data.account_id.to_string(),
            name: data.data_name.clone(),
            value: STANDARD.encode(&data.data_value),
            sponsor: sponsor_of(entry),
            last_modified_ledger: entry.last_modified_ledger_seq,
        })
    }

    pub fn key(&self) -> AccountDataKey {
        AccountDataKey {
            account_id: self.account_id.clone(),
            data_name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimantRow {
    pub destination: String,
    pub predicate: ClaimPredicate,
}

/// Claimable balance row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceRow {
    /// hex balance id
    pub balance_id: String,
    pub claimants: Vec<ClaimantRow>,
    pub asset: String,
    pub amount: i64,
    pub flags: u32,
    pub sponsor: Option<String>,
    pub last_modified_ledger: u32,
}

impl ClaimableBalanceRow {
    pub fn from_entry(entry: &LedgerEntry) -> IngestResult<Self> {
        let balance = entry
            .as_claimable_balance()
            .ok_or_else(|| wrong_kind(LedgerEntryType::ClaimableBalance, entry))?;
        Ok(Self {
            balance_id: balance.balance_id.to_hex(),
            claimants: balance
                .claimants
                .iter()
                .map(|c| ClaimantRow {
                    destination: c.destination.to_string(),
                    predicate: c.predicate.clone(),
                })
                .collect(),
            asset: balance.asset.canonical(),
            amount: balance.amount,
            flags: balance.flags,
            sponsor: sponsor_of(entry),
            last_modified_ledger: entry.last_modified_ledger_seq,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReserve {
    pub asset: String,
    pub reserve: i64,
}

/// Constant product pools are the only pool type
pub const LIQUIDITY_POOL_TYPE_CONSTANT_PRODUCT: u32 = 0;

/// Liquidity pool row, soft-deleted through `deleted`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPoolRow {
    /// hex pool id
    pub pool_id: String,
    pub pool_type: u32,
    pub fee: u32,
    pub trustline_count: u64,
    pub share_count: u64,
    pub asset_reserves: Vec<AssetReserve>,
    pub deleted: bool,
    pub last_modified_ledger: u32,
}

impl LiquidityPoolRow {
    pub fn from_entry(entry: &LedgerEntry) -> IngestResult<Self> {
        let pool = entry
            .as_liquidity_pool()
            .ok_or_else(|| wrong_kind(LedgerEntryType::LiquidityPool, entry))?;
        Ok(Self {
            pool_id: pool.pool_id.to_hex(),
            pool_type: LIQUIDITY_POOL_TYPE_CONSTANT_PRODUCT,
            fee: pool.fee as u32,
            trustline_count: pool.pool_shares_trust_line_count as u64,
            share_count: pool.total_pool_shares as u64,
            asset_reserves: vec![
                AssetReserve {
                    asset: pool.asset_a.canonical(),
                    reserve: pool.reserve_a,
                },
                AssetReserve {
                    asset: pool.asset_b.canonical(),
                    reserve: pool.reserve_b,
                },
            ],
            deleted: false,
            last_modified_ledger: entry.last_modified_ledger_seq,
        })
    }
}

/// Offer row, soft-deleted through `deleted`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRow {
    pub seller_id: String,
    pub offer_id: i64,
    pub selling_asset: String,
    pub buying_asset: String,
    pub amount: i64,
    pub price_n: i32,
    pub price_d: i32,
    pub price: f64,
    pub flags: u32,
    pub sponsor: Option<String>,
    pub deleted: bool,
    pub last_modified_ledger: u32,
}

impl OfferRow {
    pub fn from_entry(entry: &LedgerEntry) -> IngestResult<Self> {
        let offer = entry
            .as_offer()
            .ok_or_else(|| wrong_kind(LedgerEntryType::Offer, entry))?;
        Ok(Self {
            seller_id: offer.seller_id.to_string(),
            offer_id: offer.offer_id,
            selling_asset: offer.selling.canonical(),
            buying_asset: offer.buying.canonical(),
            amount: offer.amount,
            price_n: offer.price_n,
            price_d: offer.price_d,
            price: offer.price(),
            flags: offer.flags,
            sponsor: sponsor_of(entry),
            deleted: false,
            last_modified_ledger: entry.last_modified_ledger_seq,
        })
    }
}

/// Trust line row keyed by the encoded ledger key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineRow {
    pub ledger_key: String,
    pub account_id: String,
    pub asset_type: i32,
    pub asset_code: String,
    pub asset_issuer: String,
    pub liquidity_pool_id: Option<String>,
    pub balance: i64,
    pub trust_line_limit: i64,
    pub buying_liabilities: i64,
    pub selling_liabilities: i64,
    pub flags: u32,
    pub sponsor: Option<String>,
    pub last_modified_ledger: u32,
}

impl TrustLineRow {
    pub fn from_entry(entry: &LedgerEntry) -> IngestResult<Self> {
        let trust_line = entry
            .as_trust_line()
            .ok_or_else(|| wrong_kind(LedgerEntryType::TrustLine, entry))?;
        let ledger_key = LedgerKey::from_entry(entry).encode()?;
        let (asset_code, asset_issuer, liquidity_pool_id) = match &trust_line.asset {
            TrustLineAsset::Asset(asset) => (
                asset.code().to_string(),
                asset.issuer().map(AccountId::to_string).unwrap_or_default(),
                None,
            ),
            TrustLineAsset::PoolShare(pool_id) => {
                (String::new(), String::new(), Some(pool_id.to_hex()))
            }
        };
        Ok(Self {
            ledger_key,
            account_id: trust_line.account_id.to_string(),
            asset_type: trust_line.asset.asset_type() as i32,
            asset_code,
            asset_issuer,
            liquidity_pool_id,
            balance: trust_line.balance,
            trust_line_limit: trust_line.limit,
            buying_liabilities: trust_line.buying_liabilities,
            selling_liabilities: trust_line.selling_liabilities,
            flags: trust_line.flags,
            sponsor: sponsor_of(entry),
            last_modified_ledger: entry.last_modified_ledger_seq,
        })
    }
}

/// One signer able to sign for an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSignerRow {
    pub account_id: String,
    pub signer: String,
    pub weight: i32,
    pub sponsor: Option<String>,
}
