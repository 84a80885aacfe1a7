//! The wall: a newest-first list of messages kept under one key.

use std::sync::Arc;

use chrono::Utc;
use log::*;

use crate::error::WallError;
use crate::message::{Message, Messages};
use crate::storage::{KvStore, StorageError};

/// Key the whole wall is stored under.
pub const WALL_KEY: &str = "messages";

/// Read and append operations over an injected backend.
///
/// Appends are a plain read-modify-write of the whole list. Two appends
/// racing on the same backend can lose one of the messages.
#[derive(Clone)]
pub struct WallStore {
    backend: Arc<dyn KvStore>,
}

impl WallStore {
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        WallStore { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// All messages, newest first. A wall that was never written is empty.
    pub async fn list_messages(&self) -> Result<Messages, WallError> {
        let raw = self
            .backend
            .get(WALL_KEY)
            .await
            .map_err(WallError::StorageRead)?;
        match raw {
            None => Ok(Vec::new()),
            Some(raw) => Ok(serde_json::from_str(&raw)?),
        }
    }

    /// Validates `raw_text`, then prepends it to the wall and writes the
    /// whole list back. Nothing is read or written for invalid input.
    pub async fn append_message(&self, raw_text: &str) -> Result<Message, WallError> {
        let message = Message::new(raw_text, Utc::now())?;

        let mut messages = self.list_messages().await?;
        messages.insert(0, message.clone());

        let serialized = serde_json::to_string(&messages)
            .map_err(|e| WallError::StorageWrite(StorageError::Backend(e.to_string())))?;
        self.backend
            .set(WALL_KEY, serialized)
            .await
            .map_err(WallError::StorageWrite)?;

        debug!(
            "Appended message at {} ({} chars), wall has {} messages",
            message.timestamp(),
            message.text().chars().count(),
            messages.len()
        );
        Ok(message)
    }
}
