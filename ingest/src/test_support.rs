//! Entry fixtures shared by the unit tests

use ledgermirror_core::*;

pub const ACCOUNT_A: &str = "GC3C4AKRBQLHOJ45U4XG35ESVWRDECWO5XLDGYADO6DPR3L7KIDVUMML";
pub const ACCOUNT_B: &str = "GCCCU34WDY2RATQTOOQKY6SZWU6J5DONY42SWGW2CIXGW4LICAGNRZKX";
pub const SIGNER_1: &str = "GCAHY6JSXQFKWKP6R7U5JPXDVNV4DJWOWRFLY3Y6YPBF64QRL4BPFDNS";
pub const SIGNER_2: &str = "GBADGWKHSUFOC4C7E3KXKINZSRX5KPHUWHH67UGJU77LEORGVLQ3BN3B";
pub const SPONSOR: &str = "GDMQUXK7ZUCWM5472ZU3YLDP4BMJLQQ76DEMNYDEY2ODEEGGRKLEWGW2";

pub fn signer(key: &str, weight: u32, sponsor: Option<&str>) -> Signer {
    Signer {
        key: key.to_string(),
        weight,
        sponsor: sponsor.map(AccountId::from),
    }
}

pub fn account_entry(id: &str, thresholds: [u8; 4], seq: u32) -> LedgerEntry {
    account_with_signers(id, thresholds, vec![], seq)
}

pub fn account_with_signers(
    id: &str,
    thresholds: [u8; 4],
    signers: Vec<Signer>,
    seq: u32,
) -> LedgerEntry {
    let mut account = AccountEntry::new(id, thresholds);
    account.balance = 10_000_000;
    account.signers = signers;
    LedgerEntry::new(seq, LedgerEntryData::Account(account))
}

pub fn offer_entry(offer_id: i64, amount: i64, seq: u32) -> LedgerEntry {
    LedgerEntry::new(
        seq,
        LedgerEntryData::Offer(OfferEntry {
            seller_id: AccountId::from(ACCOUNT_A),
            offer_id,
            selling: Asset::Native,
            buying: Asset::credit("USD", ACCOUNT_B),
            amount,
            price_n: 1,
            price_d: 2,
            flags: 0,
        }),
    )
}

pub fn pool_entry(id: u8, seq: u32) -> LedgerEntry {
    pool_entry_with_reserves(id, 450, 500, seq)
}

pub fn pool_entry_with_reserves(id: u8, reserve_a: i64, reserve_b: i64, seq: u32) -> LedgerEntry {
    LedgerEntry::new(
        seq,
        LedgerEntryData::LiquidityPool(LiquidityPoolEntry {
            pool_id: Hash32::from_prefix(&[id]),
            asset_a: Asset::Native,
            asset_b: Asset::credit("USD", ACCOUNT_B),
            fee: 34,
            reserve_a,
            reserve_b,
            total_pool_shares: 412241,
            pool_shares_trust_line_count: 52115,
        }),
    )
}

pub fn data_entry(account: &str, name: &str, value: &[u8], seq: u32) -> LedgerEntry {
    LedgerEntry::new(
        seq,
        LedgerEntryData::Data(DataEntry {
            account_id: AccountId::from(account),
            data_name: name.to_string(),
            data_value: value.to_vec(),
        }),
    )
}

pub fn claimable_balance_entry(id: u8, seq: u32) -> LedgerEntry {
    claimable_balance_with_amount(id, 10, seq)
}

pub fn claimable_balance_with_amount(id: u8, amount: i64, seq: u32) -> LedgerEntry {
    LedgerEntry::new(
        seq,
        LedgerEntryData::ClaimableBalance(ClaimableBalanceEntry {
            balance_id: Hash32::from_prefix(&[id]),
            claimants: vec![Claimant {
                destination: AccountId::from(ACCOUNT_B),
                predicate: ClaimPredicate::Unconditional,
            }],
            asset: Asset::credit("USD", ACCOUNT_A),
            amount,
            flags: 0,
        }),
    )
}

pub fn trust_line_entry(account: &str, code: &str, balance: i64, seq: u32) -> LedgerEntry {
    LedgerEntry::new(
        seq,
        LedgerEntryData::TrustLine(TrustLineEntry {
            account_id: AccountId::from(account),
            asset: TrustLineAsset::Asset(Asset::credit(code, ACCOUNT_B)),
            balance,
            limit: 1_000_000,
            flags: 1,
            buying_liabilities: 0,
            selling_liabilities: 0,
        }),
    )
}

pub fn contract_data_entry(key: &str, seq: u32) -> LedgerEntry {
    LedgerEntry::new(
        seq,
        LedgerEntryData::ContractData(ContractDataEntry {
            contract: "CCONTRACT".to_string(),
            key: key.to_string(),
            durability: ContractDataDurability::Persistent,
            value: String::new(),
        }),
    )
}

pub fn config_setting_entry(setting_id: i32, seq: u32) -> LedgerEntry {
    LedgerEntry::new(
        seq,
        LedgerEntryData::ConfigSetting(ConfigSettingEntry {
            setting_id,
            value: String::new(),
        }),
    )
}
