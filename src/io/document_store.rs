use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::io::persistence::{PersistError, Persistence};
use crate::model::block::{BlockFields, ScheduledBlock};
use crate::model::item::{Item, ItemKind, SortOrderUpdate};

/// On-disk shape: `{ "items": [...], "blocks": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub blocks: Vec<ScheduledBlock>,
}

impl Document {
    fn item_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// The item and its direct children
    fn family_ids(&self, id: &str) -> Vec<String> {
        let mut ids = vec![id.to_string()];
        ids.extend(
            self.items
                .iter()
                .filter(|i| i.parent_id.as_deref() == Some(id))
                .map(|i| i.id.clone()),
        );
        ids
    }
}

/// `Persistence` over a single JSON document, kept in memory and optionally
/// mirrored to a file
pub struct DocumentStore {
    doc: Mutex<Document>,
    path: Option<PathBuf>,
    fail_writes: AtomicBool,
}

impl DocumentStore {
    pub fn in_memory(doc: Document) -> Self {
        DocumentStore {
            doc: Mutex::new(doc),
            path: None,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Load the document at `path`, starting empty if the file is missing
    pub fn open(path: &Path) -> Result<Self, PersistError> {
        let doc = match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Document::default(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Document::default(),
            Err(e) => {
                return Err(PersistError::Read {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        debug!(path = %path.display(), items = doc.items.len(), "opened document");
        Ok(DocumentStore {
            doc: Mutex::new(doc),
            path: Some(path.to_path_buf()),
            fail_writes: AtomicBool::new(false),
        })
    }

    /// Make every subsequent write fail with `PersistError::Rejected`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Document {
        self.doc.lock().await.clone()
    }

    pub async fn item(&self, id: &str) -> Option<Item> {
        self.doc.lock().await.items.iter().find(|i| i.id == id).cloned()
    }

    /// Run a mutation, then mirror the document to disk
    async fn write<T>(
        &self,
        op: impl FnOnce(&mut Document) -> Result<T, PersistError>,
    ) -> Result<T, PersistError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            warn!("document write rejected");
            return Err(PersistError::Rejected);
        }
        let mut doc = self.doc.lock().await;
        let out = op(&mut doc)?;
        if let Some(path) = &self.path {
            let content = serde_json::to_vec_pretty(&*doc)?;
            atomic_write(path, &content).map_err(|e| PersistError::Write {
                path: path.clone(),
                source: e,
            })?;
        }
        Ok(out)
    }
}

/// Write `content` to `path` through a temp file in the same directory
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl Persistence for DocumentStore {
    async fn fetch_items(&self, kind: ItemKind) -> Result<Vec<Item>, PersistError> {
        let doc = self.doc.lock().await;
        Ok(doc
            .items
            .iter()
            .filter(|i| i.is_top_level() && i.kind == kind)
            .cloned()
            .collect())
    }

    async fn fetch_children(&self, parent_id: &str) -> Result<Vec<Item>, PersistError> {
        let doc = self.doc.lock().await;
        Ok(doc
            .items
            .iter()
            .filter(|i| i.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn fetch_blocks(&self) -> Result<Vec<ScheduledBlock>, PersistError> {
        Ok(self.doc.lock().await.blocks.clone())
    }

    async fn update_sort_orders(&self, updates: &[SortOrderUpdate]) -> Result<(), PersistError> {
        self.write(|doc| {
            for update in updates {
                if let Some(item) = doc.item_mut(&update.id) {
                    item.sort_order = update.sort_order;
                }
            }
            Ok(())
        })
        .await
    }

    async fn update_item(&self, item: &Item) -> Result<(), PersistError> {
        self.write(|doc| {
            let slot = doc
                .item_mut(&item.id)
                .ok_or_else(|| PersistError::NotFound(item.id.clone()))?;
            *slot = item.clone();
            Ok(())
        })
        .await
    }

    async fn create_item(&self, item: &Item) -> Result<(), PersistError> {
        self.write(|doc| {
            match doc.item_mut(&item.id) {
                Some(slot) => *slot = item.clone(),
                None => doc.items.push(item.clone()),
            }
            Ok(())
        })
        .await
    }

    async fn create_scheduled_block(
        &self,
        block: &ScheduledBlock,
    ) -> Result<ScheduledBlock, PersistError> {
        self.write(|doc| {
            doc.blocks.push(block.clone());
            Ok(block.clone())
        })
        .await
    }

    async fn update_scheduled_block(
        &self,
        id: &str,
        fields: BlockFields,
    ) -> Result<(), PersistError> {
        self.write(|doc| {
            let block = doc
                .blocks
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or_else(|| PersistError::NotFound(id.to_string()))?;
            block.scheduled_start_time = fields.scheduled_start_time;
            block.duration_minutes = fields.duration_minutes;
            Ok(())
        })
        .await
    }

    async fn delete_scheduled_block(&self, id: &str) -> Result<(), PersistError> {
        self.write(|doc| {
            doc.blocks.retain(|b| b.id != id);
            Ok(())
        })
        .await
    }

    async fn delete_item(&self, id: &str) -> Result<(), PersistError> {
        self.write(|doc| {
            let doomed = doc.family_ids(id);
            doc.items.retain(|i| !doomed.contains(&i.id));
            doc.blocks.retain(|b| !doomed.contains(&b.item_id));
            Ok(())
        })
        .await
    }
}
