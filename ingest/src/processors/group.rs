//! Processor and filterer groups
//!
//! Groups let a stream drive several processors as one. Each member keeps
//! a running total of the time spent in it.

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeProcessor, ErrorContext, IngestContext, IngestResult, LedgerTransaction,
    LedgerTransactionFilterer, LedgerTransactionProcessor,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn add_duration(
    durations: &mut BTreeMap<&'static str, Duration>,
    name: &'static str,
    started: Instant,
) {
    *durations.entry(name).or_default() += started.elapsed();
}

/// Fans every change out to each member, and commits them in order
#[derive(Default)]
pub struct GroupChangeProcessors {
    processors: Vec<Box<dyn ChangeProcessor>>,
    durations: BTreeMap<&'static str, Duration>,
}

impl GroupChangeProcessors {
    pub fn new(processors: Vec<Box<dyn ChangeProcessor>>) -> Self {
        Self {
            processors,
            durations: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, processor: Box<dyn ChangeProcessor>) {
        self.processors.push(processor);
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Time spent in each member, processing and committing
    pub fn durations(&self) -> &BTreeMap<&'static str, Duration> {
        &self.durations
    }
}

#[async_trait]
impl ChangeProcessor for GroupChangeProcessors {
    fn name(&self) -> &'static str {
        "group_change_processors"
    }

    async fn process_change(&mut self, ctx: &IngestContext, change: &Change) -> IngestResult<()> {
        for processor in self.processors.iter_mut() {
            let started = Instant::now();
            let name = processor.name();
            processor
                .process_change(ctx, change)
                .await
                .with_context(|| format!("error in {} processing change", name))?;
            add_duration(&mut self.durations, name, started);
        }
        Ok(())
    }

    async fn commit(&mut self, ctx: &IngestContext) -> IngestResult<()> {
        for processor in self.processors.iter_mut() {
            let started = Instant::now();
            let name = processor.name();
            processor
                .commit(ctx)
                .await
                .with_context(|| format!("error in {} commit", name))?;
            add_duration(&mut self.durations, name, started);
        }
        Ok(())
    }
}

/// Runs every member against each transaction
#[derive(Default)]
pub struct GroupTransactionProcessors {
    processors: Vec<Box<dyn LedgerTransactionProcessor>>,
    durations: BTreeMap<&'static str, Duration>,
}

impl GroupTransactionProcessors {
    pub fn new(processors: Vec<Box<dyn LedgerTransactionProcessor>>) -> Self {
        Self {
            processors,
            durations: BTreeMap::new(),
        }
    }

    pub fn durations(&self) -> &BTreeMap<&'static str, Duration> {
        &self.durations
    }
}

#[async_trait]
impl LedgerTransactionProcessor for GroupTransactionProcessors {
    fn name(&self) -> &'static str {
        "group_transaction_processors"
    }

    async fn process_transaction(
        &mut self,
        ctx: &IngestContext,
        tx: &LedgerTransaction,
    ) -> IngestResult<()> {
        for processor in self.processors.iter_mut() {
            let started = Instant::now();
            let name = processor.name();
            processor
                .process_transaction(ctx, tx)
                .await
                .with_context(|| format!("error in {} processing transaction", name))?;
            add_duration(&mut self.durations, name, started);
        }
        Ok(())
    }
}

/// Includes a transaction only when every member includes it
#[derive(Default)]
pub struct GroupTransactionFilterers {
    filterers: Vec<Box<dyn LedgerTransactionFilterer>>,
    durations: BTreeMap<&'static str, Duration>,
    dropped: u64,
}

impl GroupTransactionFilterers {
    pub fn new(filterers: Vec<Box<dyn LedgerTransactionFilterer>>) -> Self {
        Self {
            filterers,
            durations: BTreeMap::new(),
            dropped: 0,
        }
    }

    /// Transactions excluded so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn durations(&self) -> &BTreeMap<&'static str, Duration> {
        &self.durations
    }
}

#[async_trait]
impl LedgerTransactionFilterer for GroupTransactionFilterers {
    fn name(&self) -> &'static str {
        "group_transaction_filterers"
    }

    async fn filter_transaction(
        &mut self,
        ctx: &IngestContext,
        tx: &LedgerTransaction,
    ) -> IngestResult<bool> {
        for filterer in self.filterers.iter_mut() {
            let started = Instant::now();
            let name = filterer.name();
            let include = filterer
                .filter_transaction(ctx, tx)
                .await
                .with_context(|| format!("error in {} filter", name))?;
            add_duration(&mut self.durations, name, started);
            if !include {
                self.dropped += 1;
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use ledgermirror_core::{Hash32, IngestError, LedgerEntryType};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records what it sees into a shared log
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_commit: bool,
    }

    #[async_trait]
    impl ChangeProcessor for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn process_change(
            &mut self,
            _ctx: &IngestContext,
            change: &Change,
        ) -> IngestResult<()> {
            self.log
                .lock()
                .push(format!("{} {}", self.name, change.entry_type));
            Ok(())
        }

        async fn commit(&mut self, _ctx: &IngestContext) -> IngestResult<()> {
            if self.fail_commit {
                return Err(IngestError::Storage("connection reset".to_string()));
            }
            self.log.lock().push(format!("{} commit", self.name));
            Ok(())
        }
    }

    struct Threshold(i64);

    #[async_trait]
    impl LedgerTransactionFilterer for Threshold {
        fn name(&self) -> &'static str {
            "threshold"
        }

        async fn filter_transaction(
            &mut self,
            _ctx: &IngestContext,
            tx: &LedgerTransaction,
        ) -> IngestResult<bool> {
            Ok(tx.operation_count as i64 >= self.0)
        }
    }

    fn tx(operation_count: u32) -> LedgerTransaction {
        LedgerTransaction {
            index: 1,
            ledger_sequence: 10,
            hash: Hash32::from_prefix(&[0xaa]),
            successful: true,
            operation_count,
            changes: vec![],
        }
    }

    #[tokio::test]
    async fn test_change_group_fans_out_and_commits_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut group = GroupChangeProcessors::new(vec![
            Box::new(Recorder { name: "first", log: log.clone(), fail_commit: false }),
            Box::new(Recorder { name: "second", log: log.clone(), fail_commit: false }),
        ]);
        let ctx = IngestContext::new();

        group
            .process_change(&ctx, &Change::created(offer_entry(1, 10, 5)))
            .await
            .unwrap();
        group.commit(&ctx).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                format!("first {}", LedgerEntryType::Offer),
                format!("second {}", LedgerEntryType::Offer),
                "first commit".to_string(),
                "second commit".to_string(),
            ]
        );
        assert_eq!(group.durations().len(), 2);
    }

    #[tokio::test]
    async fn test_change_group_commit_error_names_member() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut group = GroupChangeProcessors::new(vec![
            Box::new(Recorder { name: "broken", log: log.clone(), fail_commit: true }),
            Box::new(Recorder { name: "after", log: log.clone(), fail_commit: false }),
        ]);

        let err = group.commit(&IngestContext::new()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "error in broken commit: storage error: connection reset"
        );
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_filterer_group_requires_every_member() {
        let mut group = GroupTransactionFilterers::new(vec![
            Box::new(Threshold(1)),
            Box::new(Threshold(3)),
        ]);
        let ctx = IngestContext::new();

        assert!(group.filter_transaction(&ctx, &tx(5)).await.unwrap());
        assert!(!group.filter_transaction(&ctx, &tx(2)).await.unwrap());
        assert!(!group.filter_transaction(&ctx, &tx(0)).await.unwrap());
        assert_eq!(group.dropped(), 2);
    }

    #[tokio::test]
    async fn test_empty_filterer_group_includes_everything() {
        let mut group = GroupTransactionFilterers::default();
        assert!(group
            .filter_transaction(&IngestContext::new(), &tx(0))
            .await
            .unwrap());
        assert_eq!(group.dropped(), 0);
    }
}
