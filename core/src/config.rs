//! Configuration types for LedgerMirror

use crate::error::IngestError;
use crate::traits::IngestResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Instance name for logging
    pub name: String,

    /// Logging level
    pub log_level: String,

    /// Ingestion configuration
    pub ingest: IngestConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            name: "ledgermirror".to_string(),
            log_level: "info".to_string(),
            ingest: IngestConfig::default(),
        }
    }
}

impl MirrorConfig {
    pub fn from_json(json: &str) -> IngestResult<Self> {
        let config: MirrorConfig =
            serde_json::from_str(json).map_err(|e| IngestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> IngestResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| IngestError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> IngestResult<()> {
        self.ingest.validate()
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Distinct keys a processor buffers before flushing
    pub max_batch_size: usize,

    /// Ledgers an offer tombstone is kept before compaction
    pub offer_compaction_window: u32,

    /// Ledgers a liquidity pool tombstone is kept before compaction
    pub liquidity_pool_compaction_window: u32,

    /// Changes between progress log lines
    pub log_frequency: usize,

    /// Feed failed transactions to the filtered transaction processors too
    pub ingest_failed_transactions: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100_000,
            offer_compaction_window: 100,
            liquidity_pool_compaction_window: 100,
            log_frequency: 50_000,
            ingest_failed_transactions: false,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> IngestResult<()> {
        if self.max_batch_size == 0 {
            return Err(IngestError::Config("max_batch_size must be positive".into()));
        }
        if self.offer_compaction_window == 0 {
            return Err(IngestError::Config(
                "offer_compaction_window must be positive".into(),
            ));
        }
        if self.liquidity_pool_compaction_window == 0 {
            return Err(IngestError::Config(
                "liquidity_pool_compaction_window must be positive".into(),
            ));
        }
        if self.log_frequency == 0 {
            return Err(IngestError::Config("log_frequency must be positive".into()));
        }
        Ok(())
    }
}
