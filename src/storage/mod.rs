//! Key-value backends the wall is persisted in.
//!
//! Every backend stores opaque strings under string keys. The wall only ever
//! uses a single key, but nothing here depends on that.

use async_trait::async_trait;
use thiserror::Error;

mod file;
mod memory;
mod rest;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use rest::RestKvStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend: {0}")]
    Backend(String),
}

/// A `get`/`set` pair over whole values.
///
/// `set` always replaces the previous value; there is no partial update.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `None` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}
