//! Change compactor
//!
//! Merges many raw changes into at most one net change per ledger key, so a
//! batch costs memory proportional to the distinct entries it touches rather
//! than to the number of changes observed.

use ledgermirror_core::{Change, ChangeType, IngestError, IngestResult, LedgerKey};
use std::collections::HashMap;

/// Keyed merge cache over raw changes.
///
/// Net changes are kept in first-seen order so flushes are deterministic.
#[derive(Debug, Default)]
pub struct ChangeCompactor {
    index: HashMap<LedgerKey, usize>,
    slots: Vec<Option<Change>>,
    /// Slots emptied by elision and not yet reclaimed
    dead: usize,
}

impl ChangeCompactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `change` into the net change for its key.
    ///
    /// The stored post entry must equal `change.pre`. An entry created and
    /// removed within the batch leaves nothing behind.
    pub fn add_change(&mut self, change: &Change) -> IngestResult<()> {
        let key = change.ledger_key()?;

        let slot = match self.index.get(&key).copied() {
            Some(slot) => slot,
            None => {
                self.index.insert(key, self.slots.len());
                self.slots.push(Some(change.clone()));
                return Ok(());
            }
        };

        let stored = match self.slots[slot].as_mut() {
            Some(stored) => stored,
            None => {
                return Err(IngestError::Continuity {
                    key: key.to_string(),
                    detail: "index points at an empty slot".into(),
                })
            }
        };

        if stored.post != change.pre {
            return Err(IngestError::Continuity {
                key: key.to_string(),
                detail: format!(
                    concat!(
                        "{:?} change pre entry does not match ",
                        "the post entry of the previous {:?} change"
                    ),
                    change.change_type, stored.change_type
                ),
            });
        }

        stored.post = change.post.clone();
        let net = match (&stored.pre, &stored.post) {
            (None, None) => None,
            (None, Some(_)) if stored.change_type == ChangeType::Restored => {
                Some(ChangeType::Restored)
            }
            (None, Some(_)) => Some(ChangeType::Created),
            (Some(_), None) => Some(ChangeType::Removed),
            (Some(_), Some(_)) => Some(ChangeType::Updated),
        };
        match net {
            Some(change_type) => stored.change_type = change_type,
            None => {
                self.slots[slot] = None;
                self.index.remove(&key);
                self.dead += 1;
                if self.dead > self.index.len() {
                    self.reclaim();
                }
            }
        }
        Ok(())
    }

    /// Drop emptied slots and repoint the index, keeping first-seen order.
    fn reclaim(&mut self) {
        let mut moved = Vec::with_capacity(self.slots.len());
        let mut next = 0;
        for slot in &self.slots {
            moved.push(next);
            if slot.is_some() {
                next += 1;
            }
        }
        self.slots.retain(Option::is_some);
        for slot in self.index.values_mut() {
            *slot = moved[*slot];
        }
        self.dead = 0;
    }

    /// Number of keys with a live net change
    pub fn size(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Net changes in first-seen key order
    pub fn get_changes(&self) -> Vec<Change> {
        self.slots.iter().flatten().cloned().collect()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_created_then_updated_keeps_original_pre() {
        let mut compactor = ChangeCompactor::new();
        let v1 = account_entry(ACCOUNT_A, [1, 1, 1, 1], 123);
        let v2 = account_entry(ACCOUNT_A, [0, 1, 2, 3], 124);

        compactor.add_change(&Change::created(v1.clone())).unwrap();
        compactor.add_change(&Change::updated(v1, v2.clone())).unwrap();

        assert_eq!(compactor.size(), 1);
        assert_eq!(compactor.get_changes(), vec![Change::created(v2)]);
    }

    #[test]
    fn test_updates_collapse_to_first_pre_and_last_post() {
        let mut compactor = ChangeCompactor::new();
        let v1 = offer_entry(1, 100, 10);
        let v2 = offer_entry(1, 200, 11);
        let v3 = offer_entry(1, 300, 12);

        compactor.add_change(&Change::updated(v1.clone(), v2.clone())).unwrap();
        compactor.add_change(&Change::updated(v2, v3.clone())).unwrap();

        assert_eq!(compactor.into_changes(), vec![Change::updated(v1, v3)]);
    }

    #[test]
    fn test_created_then_removed_is_elided() {
        let mut compactor = ChangeCompactor::new();
        let pool = pool_entry(1, 10);
        let other = pool_entry(2, 10);

        compactor.add_change(&Change::created(pool.clone())).unwrap();
        compactor.add_change(&Change::created(other.clone())).unwrap();
        compactor.add_change(&Change::removed(pool)).unwrap();

        assert_eq!(compactor.size(), 1);
        assert_eq!(compactor.get_changes(), vec![Change::created(other)]);
    }

    #[test]
    fn test_removed_then_created_becomes_update() {
        let mut compactor = ChangeCompactor::new();
        let old = trust_line_entry(ACCOUNT_A, "USD", 10, 10);
        let new = trust_line_entry(ACCOUNT_A, "USD", 20, 11);

        compactor.add_change(&Change::removed(old.clone())).unwrap();
        compactor.add_change(&Change::created(new.clone())).unwrap();

        assert_eq!(compactor.get_changes(), vec![Change::updated(old, new)]);
    }

    #[test]
    fn test_discontinuous_change_fails_for_every_kind() {
        let pairs = vec![
            (
                account_entry(ACCOUNT_A, [1, 0, 0, 0], 1),
                account_entry(ACCOUNT_A, [2, 0, 0, 0], 2),
            ),
            (offer_entry(7, 1, 1), offer_entry(7, 2, 2)),
            (pool_entry(3, 1), pool_entry(3, 2)),
            (
                data_entry(ACCOUNT_A, "name", b"a", 1),
                data_entry(ACCOUNT_A, "name", b"b", 2),
            ),
            (claimable_balance_entry(4, 1), claimable_balance_entry(4, 2)),
            (
                trust_line_entry(ACCOUNT_A, "EUR", 1, 1),
                trust_line_entry(ACCOUNT_A, "EUR", 2, 2),
            ),
        ];

        for (first, second) in pairs {
            let mut compactor = ChangeCompactor::new();
            compactor.add_change(&Change::created(first)).unwrap();
            // pre is not the stored post
            let err = compactor
                .add_change(&Change::updated(second.clone(), second))
                .unwrap_err();
            assert!(err.is_continuity_error(), "{}", err);
        }
    }

    #[test]
    fn test_created_twice_fails() {
        let mut compactor = ChangeCompactor::new();
        let entry = account_entry(ACCOUNT_A, [1, 0, 0, 0], 1);
        compactor.add_change(&Change::created(entry.clone())).unwrap();
        assert!(compactor
            .add_change(&Change::created(entry))
            .unwrap_err()
            .is_continuity_error());
    }

    #[test]
    fn test_order_follows_first_sighting() {
        let mut compactor = ChangeCompactor::new();
        for id in [5, 3, 9] {
            compactor.add_change(&Change::created(offer_entry(id, 1, 1))).unwrap();
        }
        let ids: Vec<i64> = compactor
            .get_changes()
            .iter()
            .map(|c| c.post.as_ref().and_then(|e| e.as_offer()).map(|o| o.offer_id).unwrap())
            .collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    fn offer_ids(changes: &[Change]) -> Vec<i64> {
        changes
            .iter()
            .filter_map(|c| c.post.as_ref().or(c.pre.as_ref()))
            .filter_map(|e| e.as_offer())
            .map(|o| o.offer_id)
            .collect()
    }

    #[test]
    fn test_repeated_create_remove_keeps_storage_bounded() {
        let mut compactor = ChangeCompactor::new();
        let entry = offer_entry(1, 10, 5);
        for _ in 0..1000 {
            compactor.add_change(&Change::created(entry.clone())).unwrap();
            compactor.add_change(&Change::removed(entry.clone())).unwrap();
            assert!(compactor.slots.len() <= 2 * compactor.size() + 1);
        }
        assert!(compactor.is_empty());
        assert!(compactor.get_changes().is_empty());
    }

    #[test]
    fn test_reclaiming_slots_keeps_first_seen_order() {
        let mut compactor = ChangeCompactor::new();
        compactor.add_change(&Change::created(offer_entry(4, 1, 1))).unwrap();
        let churn = offer_entry(1, 10, 5);
        for _ in 0..10 {
            compactor.add_change(&Change::created(churn.clone())).unwrap();
            compactor.add_change(&Change::removed(churn.clone())).unwrap();
        }
        compactor.add_change(&Change::created(offer_entry(8, 1, 1))).unwrap();
        compactor
            .add_change(&Change::updated(offer_entry(4, 1, 1), offer_entry(4, 2, 2)))
            .unwrap();

        assert!(compactor.slots.len() <= 2 * compactor.size() + 1);
        assert_eq!(offer_ids(&compactor.get_changes()), vec![4, 8]);
        assert_eq!(
            compactor.get_changes()[0],
            Change::created(offer_entry(4, 2, 2))
        );
    }

    #[test]
    fn test_restored_then_updated_stays_restored() {
        let mut compactor = ChangeCompactor::new();
        let v1 = data_entry(ACCOUNT_A, "name", b"a", 1);
        let v2 = data_entry(ACCOUNT_A, "name", b"b", 2);

        compactor.add_change(&Change::restored(v1.clone())).unwrap();
        compactor.add_change(&Change::updated(v1, v2.clone())).unwrap();

        let changes = compactor.into_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Restored);
        assert!(changes[0].pre.is_none());
        assert_eq!(changes[0].post, Some(v2));
    }
}
