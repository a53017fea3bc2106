//! Core types for LedgerMirror
//!
//! Ledger entry snapshots as the ingestion engine sees them. Wire decoding
//! happens upstream; these are the already-decoded values.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Ledger sequence number
pub type LedgerSeq = u32;

/// Strkey-encoded account address (`G...`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(address: impl Into<String>) -> Self {
        AccountId(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

/// 32-byte identifier, hex encoded in JSON and in rows
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash32(bytes)
    }

    /// Build an id from a short prefix, zero padding the rest.
    pub fn from_prefix(prefix: &[u8]) -> Self {
        let mut arr = [0u8; 32];
        let len = prefix.len().min(32);
        arr[..len].copy_from_slice(&prefix[..len]);
        Hash32(arr)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Hash32(arr))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash32::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Liquidity pool identifier
pub type PoolId = Hash32;

/// Claimable balance identifier
pub type ClaimableBalanceId = Hash32;

/// Numeric asset type, matching the persisted column values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Native = 0,
    CreditAlphanum4 = 1,
    CreditAlphanum12 = 2,
    PoolShare = 3,
}

/// Asset held or traded on the ledger
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Native,
    CreditAlphanum4 { code: String, issuer: AccountId },
    CreditAlphanum12 { code: String, issuer: AccountId },
}

impl Asset {
    /// Credit asset with the variant picked from the code length.
    pub fn credit(code: &str, issuer: impl Into<AccountId>) -> Self {
        let issuer = issuer.into();
        if code.len() <= 4 {
            Asset::CreditAlphanum4 { code: code.to_string(), issuer }
        } else {
            Asset::CreditAlphanum12 { code: code.to_string(), issuer }
        }
    }

    pub fn asset_type(&self) -> AssetType {
        match self {
            Asset::Native => AssetType::Native,
            Asset::CreditAlphanum4 { .. } => AssetType::CreditAlphanum4,
            Asset::CreditAlphanum12 { .. } => AssetType::CreditAlphanum12,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Asset::Native => "",
            Asset::CreditAlphanum4 { code, .. } | Asset::CreditAlphanum12 { code, .. } => code,
        }
    }

    pub fn issuer(&self) -> Option<&AccountId> {
        match self {
            Asset::Native => None,
            Asset::CreditAlphanum4 { issuer, .. } | Asset::CreditAlphanum12 { issuer, .. } => {
                Some(issuer)
            }
        }
    }

    /// Canonical string form: `native` or `CODE:ISSUER`
    pub fn canonical(&self) -> String {
        match self {
            Asset::Native => "native".to_string(),
            Asset::CreditAlphanum4 { code, issuer } | Asset::CreditAlphanum12 { code, issuer } => {
                format!("{}:{}", code, issuer)
            }
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Asset side of a trust line: a regular asset or pool shares
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLineAsset {
    Asset(Asset),
    PoolShare(PoolId),
}

impl TrustLineAsset {
    pub fn asset_type(&self) -> AssetType {
        match self {
            TrustLineAsset::Asset(asset) => asset.asset_type(),
            TrustLineAsset::PoolShare(_) => AssetType::PoolShare,
        }
    }
}

/// Explicit signer attached to an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub key: String,
    pub weight: u32,
    #[serde(default)]
    pub sponsor: Option<AccountId>,
}

/// Weight and sponsor of one signer in an account's signer summary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerSummaryEntry {
    pub weight: u32,
    pub sponsor: Option<AccountId>,
}

/// Account entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AccountEntry {
    pub account_id: AccountId,
    pub balance: i64,
    pub seq_num: i64,
    pub seq_ledger: Option<u32>,
    pub seq_time: Option<u64>,
    pub num_sub_entries: u32,
    pub inflation_dest: Option<AccountId>,
    pub flags: u32,
    pub home_domain: String,
    /// master weight, low, medium, high
    pub thresholds: [u8; 4],
    pub signers: Vec<Signer>,
    pub buying_liabilities: i64,
    pub selling_liabilities: i64,
    pub num_sponsored: u32,
    pub num_sponsoring: u32,
}

impl AccountEntry {
    pub fn new(account_id: impl Into<AccountId>, thresholds: [u8; 4]) -> Self {
        Self {
            account_id: account_id.into(),
            thresholds,
            ..Default::default()
        }
    }

    pub fn master_weight(&self) -> u8 {
        self.thresholds[0]
    }

    pub fn threshold_low(&self) -> u8 {
        self.thresholds[1]
    }

    pub fn threshold_medium(&self) -> u8 {
        self.thresholds[2]
    }

    pub fn threshold_high(&self) -> u8 {
        self.thresholds[3]
    }

    /// All signers able to sign for this account, keyed by signer key.
    ///
    /// Only signers with a nonzero weight are included. The master key
    /// appears under the account's own address with the master weight and
    /// never carries a sponsor.
    pub fn signer_summary(&self) -> BTreeMap<String, SignerSummaryEntry> {
        let mut summary = BTreeMap::new();
        if self.master_weight() > 0 {
            summary.insert(
                self.account_id.0.clone(),
                SignerSummaryEntry {
                    weight: self.master_weight() as u32,
                    sponsor: None,
                },
            );
        }
        for signer in self.signers.iter().filter(|s| s.weight > 0) {
            summary.insert(
                signer.key.clone(),
                SignerSummaryEntry {
                    weight: signer.weight,
                    sponsor: signer.sponsor.clone(),
                },
            );
        }
        summary
    }
}

/// Trust line entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub account_id: AccountId,
    pub asset: TrustLineAsset,
    pub balance: i64,
    pub limit: i64,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub buying_liabilities: i64,
    #[serde(default)]
    pub selling_liabilities: i64,
}

/// Offer entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    pub seller_id: AccountId,
    pub offer_id: i64,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price_n: i32,
    pub price_d: i32,
    #[serde(default)]
    pub flags: u32,
}

impl OfferEntry {
    pub fn price(&self) -> f64 {
        if self.price_d == 0 {
            return 0.0;
        }
        self.price_n as f64 / self.price_d as f64
    }
}

/// Per-account named data entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub account_id: AccountId,
    pub data_name: String,
    pub data_value: Vec<u8>,
}

/// Condition under which a claimant may claim a balance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPredicate {
    Unconditional,
    And(Vec<ClaimPredicate>),
    Or(Vec<ClaimPredicate>),
    Not(Box<ClaimPredicate>),
    BeforeAbsoluteTime(i64),
    BeforeRelativeTime(i64),
}

/// Account allowed to claim a balance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimant {
    pub destination: AccountId,
    pub predicate: ClaimPredicate,
}

/// Claimable balance entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceEntry {
    pub balance_id: ClaimableBalanceId,
    pub claimants: Vec<Claimant>,
    pub asset: Asset,
    pub amount: i64,
    #[serde(default)]
    pub flags: u32,
}

/// Constant product liquidity pool entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPoolEntry {
    pub pool_id: PoolId,
    pub asset_a: Asset,
    pub asset_b: Asset,
    pub fee: i32,
    pub reserve_a: i64,
    pub reserve_b: i64,
    pub total_pool_shares: i64,
    pub pool_shares_trust_line_count: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractDataDurability {
    Temporary,
    Persistent,
}

/// Contract storage entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDataEntry {
    pub contract: String,
    pub key: String,
    pub durability: ContractDataDurability,
    #[serde(default)]
    pub value: String,
}

/// Uploaded contract code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCodeEntry {
    pub hash: Hash32,
    #[serde(default)]
    pub code_size: u32,
}

/// Network configuration setting
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSettingEntry {
    pub setting_id: i32,
    #[serde(default)]
    pub value: String,
}

/// Time-to-live record of a contract entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlEntry {
    pub key_hash: Hash32,
    pub live_until_ledger_seq: u32,
}

/// Kind of a ledger entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Account,
    TrustLine,
    Offer,
    Data,
    ClaimableBalance,
    LiquidityPool,
    ContractData,
    ContractCode,
    ConfigSetting,
    Ttl,
}

impl LedgerEntryType {
    pub const ALL: [LedgerEntryType; 10] = [
        LedgerEntryType::Account,
        LedgerEntryType::TrustLine,
        LedgerEntryType::Offer,
        LedgerEntryType::Data,
        LedgerEntryType::ClaimableBalance,
        LedgerEntryType::LiquidityPool,
        LedgerEntryType::ContractData,
        LedgerEntryType::ContractCode,
        LedgerEntryType::ConfigSetting,
        LedgerEntryType::Ttl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Account => "account",
            LedgerEntryType::TrustLine => "trust line",
            LedgerEntryType::Offer => "offer",
            LedgerEntryType::Data => "data",
            LedgerEntryType::ClaimableBalance => "claimable balance",
            LedgerEntryType::LiquidityPool => "liquidity pool",
            LedgerEntryType::ContractData => "contract data",
            LedgerEntryType::ContractCode => "contract code",
            LedgerEntryType::ConfigSetting => "config setting",
            LedgerEntryType::Ttl => "ttl",
        }
    }

    /// Kinds whose entries can be evicted to the archive and restored later.
    pub fn supports_restore(&self) -> bool {
        matches!(
            self,
            LedgerEntryType::ContractData | LedgerEntryType::ContractCode | LedgerEntryType::Ttl
        )
    }
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of a ledger entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryData {
    Account(AccountEntry),
    TrustLine(TrustLineEntry),
    Offer(OfferEntry),
    Data(DataEntry),
    ClaimableBalance(ClaimableBalanceEntry),
    LiquidityPool(LiquidityPoolEntry),
    ContractData(ContractDataEntry),
    ContractCode(ContractCodeEntry),
    ConfigSetting(ConfigSettingEntry),
    Ttl(TtlEntry),
}

impl LedgerEntryData {
    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            LedgerEntryData::Account(_) => LedgerEntryType::Account,
            LedgerEntryData::TrustLine(_) => LedgerEntryType::TrustLine,
            LedgerEntryData::Offer(_) => LedgerEntryType::Offer,
            LedgerEntryData::Data(_) => LedgerEntryType::Data,
            LedgerEntryData::ClaimableBalance(_) => LedgerEntryType::ClaimableBalance,
            LedgerEntryData::LiquidityPool(_) => LedgerEntryType::LiquidityPool,
            LedgerEntryData::ContractData(_) => LedgerEntryType::ContractData,
            LedgerEntryData::ContractCode(_) => LedgerEntryType::ContractCode,
            LedgerEntryData::ConfigSetting(_) => LedgerEntryType::ConfigSetting,
            LedgerEntryData::Ttl(_) => LedgerEntryType::Ttl,
        }
    }
}

/// A ledger entry snapshot as of some ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub last_modified_ledger_seq: LedgerSeq,
    /// Account paying the reserve for this entry, if sponsored
    #[serde(default)]
    pub sponsor: Option<AccountId>,
    pub data: LedgerEntryData,
}

impl LedgerEntry {
    pub fn new(last_modified_ledger_seq: LedgerSeq, data: LedgerEntryData) -> Self {
        Self {
            last_modified_ledger_seq,
            sponsor: None,
            data,
        }
    }

    pub fn with_sponsor(mut self, sponsor: impl Into<AccountId>) -> Self {
        self.sponsor = Some(sponsor.into());
        self
    }

    pub fn entry_type(&self) -> LedgerEntryType {
        self.data.entry_type()
    }

    pub fn as_account(&self) -> Option<&AccountEntry> {
        match &self.data {
            LedgerEntryData::Account(account) => Some(account),
            _ => None,
        }
    }

    pub fn as_trust_line(&self) -> Option<&TrustLineEntry> {
        match &self.data {
            LedgerEntryData::TrustLine(trust_line) => Some(trust_line),
            _ => None,
        }
    }

    pub fn as_offer(&self) -> Option<&OfferEntry> {
        match &self.data {
            LedgerEntryData::Offer(offer) => Some(offer),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataEntry> {
        match &self.data {
            LedgerEntryData::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_claimable_balance(&self) -> Option<&ClaimableBalanceEntry> {
        match &self.data {
            LedgerEntryData::ClaimableBalance(balance) => Some(balance),
            _ => None,
        }
    }

    pub fn as_liquidity_pool(&self) -> Option<&LiquidityPoolEntry> {
        match &self.data {
            LedgerEntryData::LiquidityPool(pool) => Some(pool),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "GC3C4AKRBQLHOJ45U4XG35ESVWRDECWO5XLDGYADO6DPR3L7KIDVUMML";
    const SIGNER: &str = "GCCCU34WDY2RATQTOOQKY6SZWU6J5DONY42SWGW2CIXGW4LICAGNRZKX";

    #[test]
    fn test_hash32_hex() {
        let id = Hash32::from_prefix(&[0xca, 0xfe, 0xba, 0xbe]);
        assert!(id.to_hex().starts_with("cafebabe000000"));
        assert_eq!(Hash32::from_hex(&id.to_hex()).unwrap(), id);
        assert!(Hash32::from_hex("cafe").is_err());

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
    }

    #[test]
    fn test_asset_canonical() {
        assert_eq!(Asset::Native.canonical(), "native");
        let usd = Asset::credit("USD", ACCOUNT);
        assert_eq!(usd.canonical(), format!("USD:{}", ACCOUNT));
        assert_eq!(usd.asset_type(), AssetType::CreditAlphanum4);
        assert_eq!(Asset::credit("LONGCODE", ACCOUNT).asset_type(), AssetType::CreditAlphanum12);
    }

    #[test]
    fn test_signer_summary_includes_master_key_only_when_weighted() {
        let mut account = AccountEntry::new(ACCOUNT, [0, 1, 1, 1]);
        account.signers.push(Signer {
            key: SIGNER.to_string(),
            weight: 2,
            sponsor: Some(AccountId::from(ACCOUNT)),
        });
        let summary = account.signer_summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[SIGNER].weight, 2);

        account.thresholds[0] = 3;
        let summary = account.signer_summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[ACCOUNT], SignerSummaryEntry { weight: 3, sponsor: None });
    }

    #[test]
    fn test_restorable_kinds() {
        assert!(LedgerEntryType::ContractData.supports_restore());
        assert!(LedgerEntryType::Ttl.supports_restore());
        assert!(!LedgerEntryType::ConfigSetting.supports_restore());
        assert!(!LedgerEntryType::Account.supports_restore());
    }
}
