use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised by wall operations.
#[derive(Error, Debug)]
pub enum WallError {
    /// The submitted message was missing, not a string, or blank.
    #[error("invalid message")]
    InvalidInput,
    #[error("failed to read wall: {0}")]
    StorageRead(#[source] StorageError),
    /// Stored data exists but is not a message list.
    #[error("stored wall is corrupt: {0}")]
    CorruptData(#[from] serde_json::Error),
    #[error("failed to write wall: {0}")]
    StorageWrite(#[source] StorageError),
}

impl WallError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, WallError::InvalidInput)
    }
}
