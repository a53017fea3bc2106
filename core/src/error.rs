//! Error types for LedgerMirror

use crate::change::ChangeType;
use crate::types::LedgerEntryType;
use thiserror::Error;

/// Main error type for LedgerMirror
#[derive(Error, Debug)]
pub enum IngestError {
    // ============ Data Integrity Errors ============
    /// A key's stored post entry does not match the next change's pre entry.
    /// The change stream is corrupt; never retried.
    #[error("continuity violated for {key}: {detail}")]
    Continuity { key: String, detail: String },

    /// A store mutation affected an unexpected number of rows. The store has
    /// drifted from the observed change stream.
    #[error("{actual} rows affected when {action} {target}")]
    State {
        action: String,
        target: String,
        expected: i64,
        actual: i64,
    },

    // ============ Store Errors ============
    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,

    // ============ Caller Errors ============
    #[error("usage error: {0}")]
    Usage(String),

    #[error("unsupported change type {change_type:?} for {entry_type} entry")]
    UnsupportedChange {
        entry_type: LedgerEntryType,
        change_type: ChangeType,
    },

    // ============ Input Errors ============
    #[error("decode error: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    // ============ General Errors ============
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<IngestError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    /// Row-count mismatch for a single-row mutation of `entity` `key`.
    pub fn row_mismatch(
        action: &str,
        entity: &str,
        key: impl std::fmt::Display,
        actual: i64,
    ) -> Self {
        IngestError::State {
            action: action.to_string(),
            target: format!("{} {}", entity, key),
            expected: 1,
            actual,
        }
    }

    /// Row-count mismatch for a batched mutation of `expected` entities.
    pub fn batch_mismatch(action: &str, entities: &str, expected: usize, actual: i64) -> Self {
        IngestError::State {
            action: action.to_string(),
            target: format!("{} {}", expected, entities),
            expected: expected as i64,
            actual,
        }
    }

    /// Wrap this error with a description of the failed operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        IngestError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any context wrappers
    pub fn root(&self) -> &IngestError {
        match self {
            IngestError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_state_error(&self) -> bool {
        matches!(self.root(), IngestError::State { .. })
    }

    pub fn is_continuity_error(&self) -> bool {
        matches!(self.root(), IngestError::Continuity { .. })
    }

    pub fn is_usage_error(&self) -> bool {
        matches!(self.root(), IngestError::Usage(_))
    }

    pub fn is_unsupported_change(&self) -> bool {
        matches!(self.root(), IngestError::UnsupportedChange { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), IngestError::Cancelled)
    }
}

/// Attach operation context to a failed result
pub trait ErrorContext<T> {
    fn context(self, context: &str) -> Result<T, IngestError>;

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T, IngestError>;
}

impl<T> ErrorContext<T> for Result<T, IngestError> {
    fn context(self, context: &str) -> Result<T, IngestError> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T, IngestError> {
        self.map_err(|e| e.context(f()))
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for IngestError {
    fn from(err: bincode::Error) -> Self {
        IngestError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_mismatch_message() {
        let err = IngestError::row_mismatch("updating", "offer", 2, 0)
            .context("error flushing cache");
        assert_eq!(
            err.to_string(),
            "error flushing cache: 0 rows affected when updating offer 2"
        );
        assert!(err.is_state_error());
        assert!(!err.is_continuity_error());
    }

    #[test]
    fn test_batch_mismatch_message() {
        let err = IngestError::batch_mismatch("removing", "trust lines", 1, 0);
        assert_eq!(err.to_string(), "0 rows affected when removing 1 trust lines");
    }

    #[test]
    fn test_root_through_nested_context() {
        let err: Result<(), IngestError> = Err(IngestError::Cancelled);
        let err = err
            .context("could not process change")
            .with_context(|| format!("ledger {}", 7))
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "ledger 7: could not process change: operation cancelled");
    }
}
