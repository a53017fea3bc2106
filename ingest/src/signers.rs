//! Signer-set differ
//!
//! Signer rows are immutable in the store: a signer whose weight or sponsor
//! changes is removed and inserted again.

use ledgermirror_core::{
    AccountId, Change, IngestError, IngestResult, LedgerEntry, LedgerEntryType, SignerSummaryEntry,
};
use std::collections::BTreeMap;

/// Signer rows to remove and insert for one account change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignersDiff {
    /// Signer keys whose rows must go, in key order
    pub removed: Vec<String>,
    /// Signer key to weight for rows to insert. `None` when the account was removed.
    pub added: Option<BTreeMap<String, i32>>,
    /// Sponsor of each added signer that has one. `None` when the account was removed.
    pub sponsors: Option<BTreeMap<String, AccountId>>,
}

fn summary_of(entry: Option<&LedgerEntry>) -> IngestResult<BTreeMap<String, SignerSummaryEntry>> {
    match entry {
        None => Ok(BTreeMap::new()),
        Some(entry) => entry
            .as_account()
            .map(|account| account.signer_summary())
            .ok_or_else(|| {
                IngestError::Usage(format!("expected account entry, got {}", entry.entry_type()))
            }),
    }
}

/// Diff the signer summaries of the two sides of an account change.
pub fn account_signers_diff(change: &Change) -> IngestResult<SignersDiff> {
    if change.entry_type != LedgerEntryType::Account {
        return Err(IngestError::Usage(format!(
            "signers diff needs an account change, got {}",
            change.entry_type
        )));
    }

    let pre = summary_of(change.pre.as_ref())?;
    let post = summary_of(change.post.as_ref())?;

    let removed = pre
        .iter()
        .filter(|(key, before)| post.get(*key) != Some(*before))
        .map(|(key, _)| key.clone())
        .collect();

    if change.post.is_none() {
        return Ok(SignersDiff {
            removed,
            added: None,
            sponsors: None,
        });
    }

    let mut added = BTreeMap::new();
    let mut sponsors = BTreeMap::new();
    for (key, after) in &post {
        if pre.get(key) == Some(after) {
            continue;
        }
        added.insert(key.clone(), after.weight as i32);
        if let Some(sponsor) = &after.sponsor {
            sponsors.insert(key.clone(), sponsor.clone());
        }
    }

    Ok(SignersDiff {
        removed,
        added: Some(added),
        sponsors: Some(sponsors),
    })
}
