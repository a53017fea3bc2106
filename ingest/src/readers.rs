//! Change and transaction readers

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeReader, ErrorContext, IngestResult, LedgerTransaction, LedgerTransactionReader,
};
use std::collections::VecDeque;
use tracing::info;

use crate::compactor::ChangeCompactor;

/// Yields a fixed list of changes, then end-of-stream
#[derive(Debug, Default)]
pub struct MemoryChangeReader {
    changes: VecDeque<Change>,
}

impl MemoryChangeReader {
    pub fn new(changes: Vec<Change>) -> Self {
        Self {
            changes: changes.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.changes.len()
    }
}

#[async_trait]
impl ChangeReader for MemoryChangeReader {
    async fn read(&mut self) -> IngestResult<Option<Change>> {
        Ok(self.changes.pop_front())
    }
}

/// Yields a fixed list of transactions, then end-of-stream
#[derive(Debug, Default)]
pub struct MemoryTransactionReader {
    transactions: VecDeque<LedgerTransaction>,
}

impl MemoryTransactionReader {
    pub fn new(transactions: Vec<LedgerTransaction>) -> Self {
        Self {
            transactions: transactions.into(),
        }
    }
}

#[async_trait]
impl LedgerTransactionReader for MemoryTransactionReader {
    async fn read(&mut self) -> IngestResult<Option<LedgerTransaction>> {
        Ok(self.transactions.pop_front())
    }
}

/// Drains the inner reader into a [`ChangeCompactor`] on first read and
/// yields the net changes.
pub struct CompactingChangeReader<R> {
    inner: R,
    compacted: Option<std::vec::IntoIter<Change>>,
}

impl<R: ChangeReader> CompactingChangeReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            compacted: None,
        }
    }

    async fn compact(&mut self) -> IngestResult<Vec<Change>> {
        let mut compactor = ChangeCompactor::new();
        while let Some(change) = self.inner.read().await.context("could not read change")? {
            compactor
                .add_change(&change)
                .context("error adding to change compactor")?;
        }
        Ok(compactor.into_changes())
    }
}

#[async_trait]
impl<R: ChangeReader> ChangeReader for CompactingChangeReader<R> {
    async fn read(&mut self) -> IngestResult<Option<Change>> {
        if self.compacted.is_none() {
            let changes = self.compact().await?;
            self.compacted = Some(changes.into_iter());
        }
        Ok(self.compacted.as_mut().and_then(|changes| changes.next()))
    }
}

/// Logs progress every `frequency` changes read
pub struct LoggingChangeReader<R> {
    inner: R,
    frequency: usize,
    entries: usize,
}

impl<R: ChangeReader> LoggingChangeReader<R> {
    pub fn new(inner: R, frequency: usize) -> Self {
        Self {
            inner,
            frequency: frequency.max(1),
            entries: 0,
        }
    }

    /// Changes read so far
    pub fn entries(&self) -> usize {
        self.entries
    }
}

#[async_trait]
impl<R: ChangeReader> ChangeReader for LoggingChangeReader<R> {
    async fn read(&mut self) -> IngestResult<Option<Change>> {
        let change = self.inner.read().await?;
        match &change {
            Some(_) => {
                self.entries += 1;
                if self.entries % self.frequency == 0 {
                    info!("Processing ledger entry changes: {} entries read", self.entries);
                }
            }
            None => info!("Finished reading ledger entry changes: {} entries", self.entries),
        }
        Ok(change)
    }
}
