//! Cancellable execution context handed to every store call

use crate::error::IngestError;
use crate::traits::IngestResult;
use tokio_util::sync::CancellationToken;

/// Execution context for one ingestion unit.
///
/// Cloning shares the underlying token, so cancelling any clone cancels all.
#[derive(Debug, Clone, Default)]
pub struct IngestContext {
    token: CancellationToken,
}

impl IngestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Context cancelled together with this one but cancellable on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail with [`IngestError::Cancelled`] once cancelled
    pub fn check(&self) -> IngestResult<()> {
        if self.token.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        Ok(())
    }
}
