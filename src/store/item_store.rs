use indexmap::IndexMap;

use crate::model::item::{Item, ItemKind, SiblingGroup, SortOrderUpdate};

/// In-memory items keyed by id. Iteration follows insertion order, which is
/// also the tie-breaker whenever two items share a `sort_order`.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: IndexMap<String, Item>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut store = ItemStore::new();
        for item in items {
            store.insert(item);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Insert or replace an item. A replaced item keeps its insertion slot.
    pub fn insert(&mut self, item: Item) -> Option<Item> {
        self.items.insert(item.id.clone(), item)
    }

    /// Remove an item together with its children. Returns everything removed,
    /// parent first.
    pub fn remove_with_children(&mut self, id: &str) -> Vec<Item> {
        let Some(item) = self.items.shift_remove(id) else {
            return Vec::new();
        };
        let child_ids: Vec<String> = self
            .items
            .values()
            .filter(|i| i.parent_id.as_deref() == Some(id))
            .map(|i| i.id.clone())
            .collect();
        let mut removed = vec![item];
        for cid in child_ids {
            if let Some(child) = self.items.shift_remove(&cid) {
                removed.push(child);
            }
        }
        removed
    }

    /// All children of `parent_id`, active and completed, in child order
    pub fn children(&self, parent_id: &str) -> Vec<&Item> {
        let mut children: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.parent_id.as_deref() == Some(parent_id))
            .collect();
        children.sort_by_key(|i| i.sort_order);
        children
    }

    pub fn active_children(&self, parent_id: &str) -> Vec<&Item> {
        self.group_members(&SiblingGroup::children(parent_id))
    }

    pub fn completed_children(&self, parent_id: &str) -> Vec<&Item> {
        self.children(parent_id)
            .into_iter()
            .filter(|i| i.is_completed)
            .collect()
    }

    pub fn has_children(&self, parent_id: &str) -> bool {
        self.items
            .values()
            .any(|i| i.parent_id.as_deref() == Some(parent_id))
    }

    /// The group an item currently belongs to; None if missing or completed
    pub fn group_of(&self, id: &str) -> Option<SiblingGroup> {
        let item = self.items.get(id)?;
        if item.is_completed {
            return None;
        }
        Some(item.sibling_group())
    }

    /// Active members of a group in display order
    pub fn group_members(&self, group: &SiblingGroup) -> Vec<&Item> {
        let mut members: Vec<&Item> = self
            .items
            .values()
            .filter(|i| !i.is_completed && i.sibling_group() == *group)
            .collect();
        members.sort_by_key(|i| i.sort_order);
        members
    }

    /// Completed top-level items of a kind, by sort order
    pub fn completed_top_level(&self, kind: ItemKind) -> Vec<&Item> {
        let mut done: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.is_top_level() && i.kind == kind && i.is_completed)
            .collect();
        done.sort_by_key(|i| i.sort_order);
        done
    }

    /// Every distinct group that has at least one active member
    pub fn groups(&self) -> Vec<SiblingGroup> {
        let mut groups: Vec<SiblingGroup> = Vec::new();
        for item in self.items.values().filter(|i| !i.is_completed) {
            let group = item.sibling_group();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }

    /// Apply sort order updates, skipping unknown ids. Returns how many applied.
    pub fn apply_sort_orders(&mut self, updates: &[SortOrderUpdate]) -> usize {
        let mut applied = 0;
        for update in updates {
            if let Some(item) = self.items.get_mut(&update.id) {
                item.sort_order = update.sort_order;
                applied += 1;
            }
        }
        applied
    }

    /// Replace the top-level items of `kind` with a canonical copy.
    /// Items missing from `fetched` are removed with their children.
    pub fn reconcile_top_level(&mut self, kind: ItemKind, fetched: Vec<Item>) {
        let existing: Vec<String> = self
            .items
            .values()
            .filter(|i| i.is_top_level() && i.kind == kind)
            .map(|i| i.id.clone())
            .collect();
        self.reconcile(existing, fetched);
    }

    /// Replace the children of `parent_id` with a canonical copy
    pub fn reconcile_children(&mut self, parent_id: &str, fetched: Vec<Item>) {
        let existing: Vec<String> = self
            .items
            .values()
            .filter(|i| i.parent_id.as_deref() == Some(parent_id))
            .map(|i| i.id.clone())
            .collect();
        self.reconcile(existing, fetched);
    }

    fn reconcile(&mut self, existing: Vec<String>, fetched: Vec<Item>) {
        for id in existing {
            if !fetched.iter().any(|f| f.id == id) {
                self.remove_with_children(&id);
            }
        }
        for item in fetched {
            self.insert(item);
        }
    }
}
