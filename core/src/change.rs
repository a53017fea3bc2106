//! Before/after change model and the entity identity used to merge changes

use crate::error::IngestError;
use crate::traits::IngestResult;
use crate::types::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural key of a tracked ledger entry
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKey {
    Account {
        account_id: AccountId,
    },
    TrustLine {
        account_id: AccountId,
        asset: TrustLineAsset,
    },
    Offer {
        offer_id: i64,
    },
    Data {
        account_id: AccountId,
        data_name: String,
    },
    ClaimableBalance {
        balance_id: ClaimableBalanceId,
    },
    LiquidityPool {
        pool_id: PoolId,
    },
    ContractData {
        contract: String,
        key: String,
        durability: ContractDataDurability,
    },
    ContractCode {
        hash: Hash32,
    },
    ConfigSetting {
        setting_id: i32,
    },
    Ttl {
        key_hash: Hash32,
    },
}

impl LedgerKey {
    /// Derive the key identifying `entry`.
    pub fn from_entry(entry: &LedgerEntry) -> Self {
        match &entry.data {
            LedgerEntryData::Account(a) => LedgerKey::Account {
                account_id: a.account_id.clone(),
            },
            LedgerEntryData::TrustLine(t) => LedgerKey::TrustLine {
                account_id: t.account_id.clone(),
                asset: t.asset.clone(),
            },
            LedgerEntryData::Offer(o) => LedgerKey::Offer { offer_id: o.offer_id },
            LedgerEntryData::Data(d) => LedgerKey::Data {
                account_id: d.account_id.clone(),
                data_name: d.data_name.clone(),
            },
            LedgerEntryData::ClaimableBalance(cb) => LedgerKey::ClaimableBalance {
                balance_id: cb.balance_id,
            },
            LedgerEntryData::LiquidityPool(lp) => LedgerKey::LiquidityPool { pool_id: lp.pool_id },
            LedgerEntryData::ContractData(cd) => LedgerKey::ContractData {
                contract: cd.contract.clone(),
                key: cd.key.clone(),
                durability: cd.durability,
            },
            LedgerEntryData::ContractCode(cc) => LedgerKey::ContractCode { hash: cc.hash },
            LedgerEntryData::ConfigSetting(cs) => LedgerKey::ConfigSetting {
                setting_id: cs.setting_id,
            },
            LedgerEntryData::Ttl(ttl) => LedgerKey::Ttl { key_hash: ttl.key_hash },
        }
    }

    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            LedgerKey::Account { .. } => LedgerEntryType::Account,
            LedgerKey::TrustLine { .. } => LedgerEntryType::TrustLine,
            LedgerKey::Offer { .. } => LedgerEntryType::Offer,
            LedgerKey::Data { .. } => LedgerEntryType::Data,
            LedgerKey::ClaimableBalance { .. } => LedgerEntryType::ClaimableBalance,
            LedgerKey::LiquidityPool { .. } => LedgerEntryType::LiquidityPool,
            LedgerKey::ContractData { .. } => LedgerEntryType::ContractData,
            LedgerKey::ContractCode { .. } => LedgerEntryType::ContractCode,
            LedgerKey::ConfigSetting { .. } => LedgerEntryType::ConfigSetting,
            LedgerKey::Ttl { .. } => LedgerEntryType::Ttl,
        }
    }

    /// Canonical binary form
    pub fn to_bytes(&self) -> IngestResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Printable form of [`LedgerKey::to_bytes`], stable across runs
    pub fn encode(&self) -> IngestResult<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerKey::Account { account_id } => write!(f, "account {}", account_id),
            LedgerKey::TrustLine { account_id, asset } => match asset {
                TrustLineAsset::Asset(a) => write!(f, "trust line {} {}", account_id, a),
                TrustLineAsset::PoolShare(p) => write!(f, "trust line {} pool {}", account_id, p),
            },
            LedgerKey::Offer { offer_id } => write!(f, "offer {}", offer_id),
            LedgerKey::Data { account_id, data_name } => {
                write!(f, "data {} {}", account_id, data_name)
            }
            LedgerKey::ClaimableBalance { balance_id } => {
                write!(f, "claimable balance {}", balance_id)
            }
            LedgerKey::LiquidityPool { pool_id } => write!(f, "liquidity pool {}", pool_id),
            LedgerKey::ContractData { contract, key, .. } => {
                write!(f, "contract data {} {}", contract, key)
            }
            LedgerKey::ContractCode { hash } => write!(f, "contract code {}", hash),
            LedgerKey::ConfigSetting { setting_id } => write!(f, "config setting {}", setting_id),
            LedgerKey::Ttl { key_hash } => write!(f, "ttl {}", key_hash),
        }
    }
}

/// What happened to an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Removed,
    /// Entry brought back from the archive
    Restored,
}

/// A single entry change: the state before and after.
///
/// `pre` is absent for creations and restorations, `post` is absent for
/// removals. Both sides always refer to the same entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChangeRecord")]
pub struct Change {
    pub entry_type: LedgerEntryType,
    pub change_type: ChangeType,
    pub pre: Option<LedgerEntry>,
    pub post: Option<LedgerEntry>,
}

/// Unchecked wire form of a [`Change`]
#[derive(Deserialize)]
struct ChangeRecord {
    entry_type: LedgerEntryType,
    change_type: ChangeType,
    #[serde(default)]
    pre: Option<LedgerEntry>,
    #[serde(default)]
    post: Option<LedgerEntry>,
}

impl TryFrom<ChangeRecord> for Change {
    type Error = IngestError;

    fn try_from(record: ChangeRecord) -> IngestResult<Self> {
        let change = Change {
            entry_type: record.entry_type,
            change_type: record.change_type,
            pre: record.pre,
            post: record.post,
        };
        change.validate()?;
        Ok(change)
    }
}

fn side(entry: &Option<LedgerEntry>) -> &'static str {
    if entry.is_some() {
        "present"
    } else {
        "absent"
    }
}

impl Change {
    /// Build a change from its two sides, inferring the change type.
    pub fn new(pre: Option<LedgerEntry>, post: Option<LedgerEntry>) -> IngestResult<Self> {
        let (entry_type, change_type) = match (&pre, &post) {
            (None, None) => {
                return Err(IngestError::Usage(
                    "change must have a pre or post entry".into(),
                ))
            }
            (None, Some(post)) => (post.entry_type(), ChangeType::Created),
            (Some(pre), None) => (pre.entry_type(), ChangeType::Removed),
            (Some(pre), Some(post)) => {
                if pre.entry_type() != post.entry_type() {
                    return Err(IngestError::Usage(format!(
                        "pre is {} but post is {}",
                        pre.entry_type(),
                        post.entry_type()
                    )));
                }
                (pre.entry_type(), ChangeType::Updated)
            }
        };
        Ok(Self {
            entry_type,
            change_type,
            pre,
            post,
        })
    }

    pub fn created(post: LedgerEntry) -> Self {
        Self {
            entry_type: post.entry_type(),
            change_type: ChangeType::Created,
            pre: None,
            post: Some(post),
        }
    }

    pub fn updated(pre: LedgerEntry, post: LedgerEntry) -> Self {
        Self {
            entry_type: post.entry_type(),
            change_type: ChangeType::Updated,
            pre: Some(pre),
            post: Some(post),
        }
    }

    pub fn removed(pre: LedgerEntry) -> Self {
        Self {
            entry_type: pre.entry_type(),
            change_type: ChangeType::Removed,
            pre: Some(pre),
            post: None,
        }
    }

    pub fn restored(post: LedgerEntry) -> Self {
        Self {
            entry_type: post.entry_type(),
            change_type: ChangeType::Restored,
            pre: None,
            post: Some(post),
        }
    }

    /// Check that the change type matches which sides are present and that
    /// both sides are entries of `entry_type`.
    ///
    /// Created and Restored have only a post entry, Removed only a pre entry
    /// and Updated both.
    pub fn validate(&self) -> IngestResult<()> {
        let has_pre = self.pre.is_some();
        let has_post = self.post.is_some();
        let shape_ok = match self.change_type {
            ChangeType::Created | ChangeType::Restored => !has_pre && has_post,
            ChangeType::Updated => has_pre && has_post,
            ChangeType::Removed => has_pre && !has_post,
        };
        if !shape_ok {
            return Err(IngestError::Usage(format!(
                "{:?} {} change with pre {} and post {}",
                self.change_type,
                self.entry_type,
                side(&self.pre),
                side(&self.post)
            )));
        }

        for entry in self.pre.iter().chain(self.post.iter()) {
            if entry.entry_type() != self.entry_type {
                return Err(IngestError::Usage(format!(
                    "{} change carries a {} entry",
                    self.entry_type,
                    entry.entry_type()
                )));
            }
        }
        Ok(())
    }

    /// Key of the changed entry, taken from `pre` when present.
    pub fn ledger_key(&self) -> IngestResult<LedgerKey> {
        match self.pre.as_ref().or(self.post.as_ref()) {
            Some(entry) => Ok(LedgerKey::from_entry(entry)),
            None => Err(IngestError::Usage(format!(
                "{} change has neither pre nor post",
                self.entry_type
            ))),
        }
    }

    fn account_sides(&self) -> IngestResult<(Option<&AccountEntry>, Option<&AccountEntry>)> {
        if self.entry_type != LedgerEntryType::Account {
            return Err(IngestError::Usage(format!(
                "expected account change, got {}",
                self.entry_type
            )));
        }
        Ok((account_side(&self.pre)?, account_side(&self.post)?))
    }

    /// Whether anything other than the explicit signer list changed.
    ///
    /// Creations and removals always count. The master weight lives in the
    /// thresholds, so a master weight change counts too.
    pub fn account_changed_except_signers(&self) -> IngestResult<bool> {
        let (pre_account, post_account) = match self.account_sides()? {
            (Some(pre), Some(post)) => (pre, post),
            _ => return Ok(true),
        };
        let (pre, post) = match (&self.pre, &self.post) {
            (Some(pre), Some(post)) => (pre, post),
            _ => return Ok(true),
        };
        if pre.last_modified_ledger_seq != post.last_modified_ledger_seq
            || pre.sponsor != post.sponsor
        {
            return Ok(true);
        }

        let mut pre_account = pre_account.clone();
        let mut post_account = post_account.clone();
        pre_account.signers.clear();
        post_account.signers.clear();
        Ok(pre_account != post_account)
    }

    /// Whether the set of signers, master key included, differs between
    /// the two sides.
    pub fn account_signers_changed(&self) -> IngestResult<bool> {
        let (pre, post) = self.account_sides()?;
        let pre_summary = pre.map(|a| a.signer_summary()).unwrap_or_default();
        let post_summary = post.map(|a| a.signer_summary()).unwrap_or_default();
        Ok(pre_summary != post_summary)
    }
}

fn account_side(entry: &Option<LedgerEntry>) -> IngestResult<Option<&AccountEntry>> {
    match entry {
        None => Ok(None),
        Some(e) => e.as_account().map(Some).ok_or_else(|| {
            IngestError::Usage(format!("expected account entry, got {}", e.entry_type()))
        }),
    }
}

/// A transaction applied in a ledger together with the entry changes it made
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// 1-based position in the ledger
    pub index: u32,
    pub ledger_sequence: LedgerSeq,
    pub hash: Hash32,
    pub successful: bool,
    pub operation_count: u32,
    #[serde(default)]
    pub changes: Vec<Change>,
}

impl LedgerTransaction {
    pub fn get_changes(&self) -> &[Change] {
        &self.changes
    }
}
