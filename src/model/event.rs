use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one live view so it can recognise its own broadcasts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(pub String);

impl ViewId {
    pub fn new(name: impl Into<String>) -> Self {
        ViewId(name.into())
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Completion change announced to other views holding a copy of the item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub item_id: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub origin: ViewId,
    /// The item's children changed state as part of the same cascade
    pub children_changed: bool,
}
