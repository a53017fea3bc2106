//! JSON-lines change and transaction readers

use async_trait::async_trait;
use ledgermirror_core::{
    Change, ChangeReader, IngestError, IngestResult, LedgerTransaction, LedgerTransactionReader,
};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Reads one JSON-encoded `T` per line. Blank lines are skipped.
pub struct JsonLinesReader<B, T> {
    lines: Lines<B>,
    line_number: usize,
    _item: PhantomData<fn() -> T>,
}

/// One [`Change`] per line. A change whose type contradicts its sides fails
/// to decode.
pub type JsonLinesChangeReader<B> = JsonLinesReader<B, Change>;

/// One [`LedgerTransaction`] per line, its changes inline
pub type JsonLinesTransactionReader<B> = JsonLinesReader<B, LedgerTransaction>;

impl<T: DeserializeOwned> JsonLinesReader<BufReader<File>, T> {
    pub async fn open(path: impl AsRef<Path>) -> IngestResult<Self> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<B: AsyncBufRead + Unpin, T: DeserializeOwned> JsonLinesReader<B, T> {
    pub fn new(input: B) -> Self {
        Self {
            lines: input.lines(),
            line_number: 0,
            _item: PhantomData,
        }
    }

    async fn next_item(&mut self) -> IngestResult<Option<T>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_number += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let item = serde_json::from_str(line).map_err(|e| {
                IngestError::Decode(format!("line {}: {}", self.line_number, e))
            })?;
            return Ok(Some(item));
        }
        Ok(None)
    }
}

#[async_trait]
impl<B: AsyncBufRead + Unpin + Send> ChangeReader for JsonLinesReader<B, Change> {
    async fn read(&mut self) -> IngestResult<Option<Change>> {
        self.next_item().await
    }
}

#[async_trait]
impl<B: AsyncBufRead + Unpin + Send> LedgerTransactionReader
    for JsonLinesReader<B, LedgerTransaction>
{
    async fn read(&mut self) -> IngestResult<Option<LedgerTransaction>> {
        self.next_item().await
    }
}
