use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of list an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    List,
    Project,
}

impl ItemKind {
    /// Whether top-level items of this kind are grouped by priority tier
    pub fn uses_tiers(self) -> bool {
        self == ItemKind::Task
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Task => write!(f, "task"),
            ItemKind::List => write!(f, "list"),
            ItemKind::Project => write!(f, "project"),
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "task" => Ok(ItemKind::Task),
            "list" => Ok(ItemKind::List),
            "project" => Ok(ItemKind::Project),
            _ => Err(format!("unknown item kind: {}", s)),
        }
    }
}

/// Priority bucket for top-level tasks. Declaration order is display order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    High,
    #[default]
    Medium,
    Low,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 3] = [PriorityTier::High, PriorityTier::Medium, PriorityTier::Low];

    /// Position of this tier in the display (0 = first)
    pub fn rank(self) -> usize {
        match self {
            PriorityTier::High => 0,
            PriorityTier::Medium => 1,
            PriorityTier::Low => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriorityTier::High => "High",
            PriorityTier::Medium => "Medium",
            PriorityTier::Low => "Low",
        }
    }
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(PriorityTier::High),
            "medium" => Ok(PriorityTier::Medium),
            "low" => Ok(PriorityTier::Low),
            _ => Err(format!("unknown priority tier: {}", s)),
        }
    }
}

/// The scope over which `sort_order` is dense: active items sharing a parent,
/// or active top-level items sharing a kind (and a tier, for tasks).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum SiblingGroup {
    TopLevel {
        kind: ItemKind,
        tier: Option<PriorityTier>,
    },
    Children {
        parent_id: String,
    },
}

impl SiblingGroup {
    pub fn top_level(kind: ItemKind, tier: PriorityTier) -> Self {
        SiblingGroup::TopLevel {
            kind,
            tier: kind.uses_tiers().then_some(tier),
        }
    }

    pub fn children(parent_id: impl Into<String>) -> Self {
        SiblingGroup::Children {
            parent_id: parent_id.into(),
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match self {
            SiblingGroup::Children { parent_id } => Some(parent_id),
            SiblingGroup::TopLevel { .. } => None,
        }
    }
}

impl std::fmt::Display for SiblingGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiblingGroup::TopLevel { kind, tier: Some(t) } => write!(f, "{} [{}]", kind, t),
            SiblingGroup::TopLevel { kind, tier: None } => write!(f, "{}", kind),
            SiblingGroup::Children { parent_id } => write!(f, "children of {}", parent_id),
        }
    }
}

/// A task, list or project, possibly nested one level under a parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    /// Absent for top-level items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub kind: ItemKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Only meaningful for top-level tasks
    #[serde(default)]
    pub tier: PriorityTier,
    #[serde(default)]
    pub sort_order: u32,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Completion state of each child, in child order, captured right before
    /// the cascade that completed this item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_child_snapshot: Option<Vec<bool>>,
}

impl Item {
    /// Create an active top-level item
    pub fn new(id: impl Into<String>, kind: ItemKind, title: impl Into<String>) -> Self {
        Item {
            id: id.into(),
            parent_id: None,
            kind,
            title: title.into(),
            note: None,
            tier: PriorityTier::default(),
            sort_order: 0,
            is_completed: false,
            completed_at: None,
            previous_child_snapshot: None,
        }
    }

    /// Create an active child of `parent`
    pub fn child_of(parent: &Item, id: impl Into<String>, title: impl Into<String>) -> Self {
        let mut item = Item::new(id, parent.kind, title);
        item.parent_id = Some(parent.id.clone());
        item
    }

    pub fn with_tier(mut self, tier: PriorityTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_sort_order(mut self, sort_order: u32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// The group this item would belong to while active
    pub fn sibling_group(&self) -> SiblingGroup {
        match &self.parent_id {
            Some(pid) => SiblingGroup::children(pid.clone()),
            None => SiblingGroup::top_level(self.kind, self.tier),
        }
    }

    /// Set completion state, stamping or clearing `completed_at`.
    /// Returns true when the state actually changed.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) -> bool {
        if self.is_completed == completed {
            return false;
        }
        self.is_completed = completed;
        self.completed_at = completed.then_some(now);
        true
    }
}

/// A new sort order for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrderUpdate {
    pub id: String,
    pub sort_order: u32,
}
