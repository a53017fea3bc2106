//! Statistics accumulator
//!
//! Counts changes per entry kind and change type. Writes nothing.

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ChangeType, IngestContext, IngestError, IngestResult, LedgerEntryType,
    LedgerKey,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counters collected by [`StatsChangeProcessor`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsChangeProcessorResults {
    pub accounts_created: i64,
    pub accounts_updated: i64,
    pub accounts_removed: i64,

    pub claimable_balances_created: i64,
    pub claimable_balances_updated: i64,
    pub claimable_balances_removed: i64,

    pub data_created: i64,
    pub data_updated: i64,
    pub data_removed: i64,

    pub offers_created: i64,
    pub offers_updated: i64,
    pub offers_removed: i64,

    pub trust_lines_created: i64,
    pub trust_lines_updated: i64,
    pub trust_lines_removed: i64,

    pub liquidity_pools_created: i64,
    pub liquidity_pools_updated: i64,
    pub liquidity_pools_removed: i64,

    pub contract_data_created: i64,
    pub contract_data_updated: i64,
    pub contract_data_removed: i64,
    pub contract_data_restored: i64,

    pub contract_code_created: i64,
    pub contract_code_updated: i64,
    pub contract_code_removed: i64,
    pub contract_code_restored: i64,

    pub config_settings_created: i64,
    pub config_settings_updated: i64,
    pub config_settings_removed: i64,

    pub ttl_created: i64,
    pub ttl_updated: i64,
    pub ttl_removed: i64,
    pub ttl_restored: i64,

    pub ledger_entries_evicted: i64,
}

impl StatsChangeProcessorResults {
    fn counter(
        &mut self,
        entry_type: LedgerEntryType,
        change_type: ChangeType,
    ) -> Option<&mut i64> {
        use ChangeType::*;
        use LedgerEntryType::*;

        let counter = match (entry_type, change_type) {
            (Account, Created) => &mut self.accounts_created,
            (Account, Updated) => &mut self.accounts_updated,
            (Account, Removed) => &mut self.accounts_removed,
            (ClaimableBalance, Created) => &mut self.claimable_balances_created,
            (ClaimableBalance, Updated) => &mut self.claimable_balances_updated,
            (ClaimableBalance, Removed) => &mut self.claimable_balances_removed,
            (Data, Created) => &mut self.data_created,
            (Data, Updated) => &mut self.data_updated,
            (Data, Removed) => &mut self.data_removed,
            (Offer, Created) => &mut self.offers_created,
            (Offer, Updated) => &mut self.offers_updated,
            (Offer, Removed) => &mut self.offers_removed,
            (TrustLine, Created) => &mut self.trust_lines_created,
            (TrustLine, Updated) => &mut self.trust_lines_updated,
            (TrustLine, Removed) => &mut self.trust_lines_removed,
            (LiquidityPool, Created) => &mut self.liquidity_pools_created,
            (LiquidityPool, Updated) => &mut self.liquidity_pools_updated,
            (LiquidityPool, Removed) => &mut self.liquidity_pools_removed,
            (ContractData, Created) => &mut self.contract_data_created,
            (ContractData, Updated) => &mut self.contract_data_updated,
            (ContractData, Removed) => &mut self.contract_data_removed,
            (ContractData, Restored) => &mut self.contract_data_restored,
            (ContractCode, Created) => &mut self.contract_code_created,
            (ContractCode, Updated) => &mut self.contract_code_updated,
            (ContractCode, Removed) => &mut self.contract_code_removed,
            (ContractCode, Restored) => &mut self.contract_code_restored,
            (ConfigSetting, Created) => &mut self.config_settings_created,
            (ConfigSetting, Updated) => &mut self.config_settings_updated,
            (ConfigSetting, Removed) => &mut self.config_settings_removed,
            (Ttl, Created) => &mut self.ttl_created,
            (Ttl, Updated) => &mut self.ttl_updated,
            (Ttl, Removed) => &mut self.ttl_removed,
            (Ttl, Restored) => &mut self.ttl_restored,
            _ => return None,
        };
        Some(counter)
    }

    /// Every counter keyed by its metric name, zeros included
    pub fn to_map(&self) -> BTreeMap<String, i64> {
        let mut map = BTreeMap::new();
        let mut put = |name: &str, value: i64| {
            map.insert(format!("stats_{}", name), value);
        };

        put("accounts_created", self.accounts_created);
        put("accounts_updated", self.accounts_updated);
        put("accounts_removed", self.accounts_removed);

        put("claimable_balances_created", self.claimable_balances_created);
        put("claimable_balances_updated", self.claimable_balances_updated);
        put("claimable_balances_removed", self.claimable_balances_removed);

        put("data_created", self.data_created);
        put("data_updated", self.data_updated);
        put("data_removed", self.data_removed);

        put("offers_created", self.offers_created);
        put("offers_updated", self.offers_updated);
        put("offers_removed", self.offers_removed);

        put("trust_lines_created", self.trust_lines_created);
        put("trust_lines_updated", self.trust_lines_updated);
        put("trust_lines_removed", self.trust_lines_removed);

        put("liquidity_pools_created", self.liquidity_pools_created);
        put("liquidity_pools_updated", self.liquidity_pools_updated);
        put("liquidity_pools_removed", self.liquidity_pools_removed);

        put("contract_data_created", self.contract_data_created);
        put("contract_data_updated", self.contract_data_updated);
        put("contract_data_removed", self.contract_data_removed);
        put("contract_data_restored", self.contract_data_restored);

        put("contract_code_created", self.contract_code_created);
        put("contract_code_updated", self.contract_code_updated);
        put("contract_code_removed", self.contract_code_removed);
        put("contract_code_restored", self.contract_code_restored);

        put("config_settings_created", self.config_settings_created);
        put("config_settings_updated", self.config_settings_updated);
        put("config_settings_removed", self.config_settings_removed);

        put("ttl_created", self.ttl_created);
        put("ttl_updated", self.ttl_updated);
        put("ttl_removed", self.ttl_removed);
        put("ttl_restored", self.ttl_restored);

        put("ledger_entries_evicted", self.ledger_entries_evicted);
        map
    }
}

/// Change processor that only counts
#[derive(Debug, Default)]
pub struct StatsChangeProcessor {
    results: StatsChangeProcessorResults,
}

impl StatsChangeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count entries evicted to the archive, reported outside the change stream.
    pub fn process_evictions(&mut self, evictions: &[LedgerKey]) {
        self.results.ledger_entries_evicted += evictions.len() as i64;
    }

    pub fn results(&self) -> &StatsChangeProcessorResults {
        &self.results
    }
}

#[async_trait]
impl ChangeProcessor for StatsChangeProcessor {
    fn name(&self) -> &'static str {
        "stats"
    }

    async fn process_change(&mut self, _ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        match self.results.counter(change.entry_type, change.change_type) {
            Some(counter) => {
                *counter += 1;
                Ok(())
            }
            None => Err(IngestError::UnsupportedChange {
                entry_type: change.entry_type,
                change_type: change.change_type,
            }),
        }
    }

    async fn commit(&mut self, _ctx: &IngestContext) -> IngestResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use ledgermirror_core::Hash32;

    #[tokio::test]
    async fn test_counts_by_kind_and_type() {
        let ctx = IngestContext::new();
        let mut processor = StatsChangeProcessor::new();

        let changes = vec![
            Change::created(account_entry(ACCOUNT_A, [1, 0, 0, 0], 1)),
            Change::updated(
                account_entry(ACCOUNT_A, [1, 0, 0, 0], 1),
                account_entry(ACCOUNT_A, [2, 0, 0, 0], 2),
            ),
            Change::removed(offer_entry(1, 1, 1)),
            Change::created(pool_entry(1, 1)),
            Change::restored(contract_data_entry("balance", 3)),
            Change::created(config_setting_entry(4, 3)),
        ];
        for change in &changes {
            processor.process_change(&ctx, change).await.unwrap();
        }
        processor.process_evictions(&[
            LedgerKey::Ttl { key_hash: Hash32::from_prefix(&[1]) },
            LedgerKey::Ttl { key_hash: Hash32::from_prefix(&[2]) },
        ]);

        let results = processor.results();
        assert_eq!(results.accounts_created, 1);
        assert_eq!(results.accounts_updated, 1);
        assert_eq!(results.offers_removed, 1);
        assert_eq!(results.liquidity_pools_created, 1);
        assert_eq!(results.contract_data_restored, 1);
        assert_eq!(results.config_settings_created, 1);
        assert_eq!(results.ledger_entries_evicted, 2);
    }

    #[tokio::test]
    async fn test_restored_rejected_for_classic_kinds() {
        let ctx = IngestContext::new();
        let mut processor = StatsChangeProcessor::new();

        let err = processor
            .process_change(&ctx, &Change::restored(account_entry(ACCOUNT_A, [1, 0, 0, 0], 1)))
            .await
            .unwrap_err();
        assert!(err.is_unsupported_change());

        let err = processor
            .process_change(&ctx, &Change::restored(config_setting_entry(1, 1)))
            .await
            .unwrap_err();
        assert!(err.is_unsupported_change());
        assert_eq!(processor.results(), &StatsChangeProcessorResults::default());
    }

    #[test]
    fn test_map_includes_zero_counters() {
        let mut results = StatsChangeProcessorResults::default();
        results.trust_lines_updated = 3;
        let map = results.to_map();

        assert_eq!(map.len(), 34);
        assert_eq!(map["stats_trust_lines_updated"], 3);
        assert_eq!(map["stats_accounts_created"], 0);
        assert_eq!(map["stats_ttl_restored"], 0);
        assert_eq!(map["stats_ledger_entries_evicted"], 0);
    }
}
