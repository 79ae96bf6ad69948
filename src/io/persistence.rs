use std::path::PathBuf;

use async_trait::async_trait;

use crate::model::block::{BlockFields, ScheduledBlock};
use crate::model::item::{Item, ItemKind, SortOrderUpdate};

/// Failure reported by a persistence backend
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed document: {0}")]
    Format(#[from] serde_json::Error),
    #[error("write rejected by backend")]
    Rejected,
}

/// Remote store for items and scheduled blocks.
///
/// Calls are fire-and-forget from the session's point of view; a failure is
/// reported once and never retried.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Top-level items of a kind, active and completed
    async fn fetch_items(&self, kind: ItemKind) -> Result<Vec<Item>, PersistError>;

    async fn fetch_children(&self, parent_id: &str) -> Result<Vec<Item>, PersistError>;

    async fn fetch_blocks(&self) -> Result<Vec<ScheduledBlock>, PersistError>;

    /// Apply a batch of sort orders as one write
    async fn update_sort_orders(&self, updates: &[SortOrderUpdate]) -> Result<(), PersistError>;

    /// Overwrite an item's fields
    async fn update_item(&self, item: &Item) -> Result<(), PersistError>;

    async fn create_item(&self, item: &Item) -> Result<(), PersistError>;

    /// Store a new block and return it as stored
    async fn create_scheduled_block(
        &self,
        block: &ScheduledBlock,
    ) -> Result<ScheduledBlock, PersistError>;

    async fn update_scheduled_block(&self, id: &str, fields: BlockFields)
    -> Result<(), PersistError>;

    async fn delete_scheduled_block(&self, id: &str) -> Result<(), PersistError>;

    /// Delete an item along with its children and every block that
    /// references any of them
    async fn delete_item(&self, id: &str) -> Result<(), PersistError>;
}
