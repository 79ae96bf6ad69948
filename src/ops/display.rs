use std::collections::HashSet;

use serde::Serialize;

use crate::model::item::{Item, ItemKind, PriorityTier, SiblingGroup};
use crate::ops::ordering::MoveRejected;
use crate::store::ItemStore;

/// Per-view presentation state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub collapsed_tiers: HashSet<PriorityTier>,
    /// Items whose children are shown
    pub expanded: HashSet<String>,
    pub show_completed: bool,
}

impl ViewState {
    pub fn toggle_expanded(&mut self, id: &str) -> bool {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
            return true;
        }
        false
    }

    pub fn toggle_tier(&mut self, tier: PriorityTier) -> bool {
        if !self.collapsed_tiers.remove(&tier) {
            self.collapsed_tiers.insert(tier);
            return true;
        }
        false
    }
}

/// One visible row of a list view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum DisplayRow {
    Header {
        tier: PriorityTier,
        collapsed: bool,
    },
    Item {
        id: String,
        depth: usize,
        has_children: bool,
        expanded: bool,
        completed: bool,
    },
    /// Placeholder closing an expanded parent's block
    AddChild { parent_id: String },
    CompletedHeader,
}

impl DisplayRow {
    pub fn item_id(&self) -> Option<&str> {
        match self {
            DisplayRow::Item { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Where a dragged item would land
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropTarget {
    pub group: SiblingGroup,
    /// Index inside the group's active members, not counting the source
    pub position: usize,
}

/// Build the visible rows of a `kind` list.
pub fn flatten(store: &ItemStore, kind: ItemKind, view: &ViewState) -> Vec<DisplayRow> {
    let mut rows = Vec::new();

    if kind.uses_tiers() {
        for tier in PriorityTier::ALL {
            let members = store.group_members(&SiblingGroup::top_level(kind, tier));
            if members.is_empty() {
                continue;
            }
            let collapsed = view.collapsed_tiers.contains(&tier);
            rows.push(DisplayRow::Header { tier, collapsed });
            if !collapsed {
                push_items(store, &members, 0, view, &mut rows);
            }
        }
    } else {
        let members = store.group_members(&SiblingGroup::TopLevel { kind, tier: None });
        push_items(store, &members, 0, view, &mut rows);
    }

    if view.show_completed {
        let done = store.completed_top_level(kind);
        if !done.is_empty() {
            rows.push(DisplayRow::CompletedHeader);
            push_items(store, &done, 0, view, &mut rows);
        }
    }
    rows
}

fn push_items(
    store: &ItemStore,
    items: &[&Item],
    depth: usize,
    view: &ViewState,
    rows: &mut Vec<DisplayRow>,
) {
    for item in items {
        let has_children = depth == 0 && store.has_children(&item.id);
        let expanded = depth == 0 && view.expanded.contains(&item.id);
        rows.push(DisplayRow::Item {
            id: item.id.clone(),
            depth,
            has_children,
            expanded,
            completed: item.is_completed,
        });

        if expanded {
            let active = store.active_children(&item.id);
            let done = store.completed_children(&item.id);
            push_items(store, &active, depth + 1, view, rows);
            push_items(store, &done, depth + 1, view, rows);
            rows.push(DisplayRow::AddChild {
                parent_id: item.id.clone(),
            });
        }
    }
}

/// Flat index of an item's row
pub fn row_index(rows: &[DisplayRow], id: &str) -> Option<usize> {
    rows.iter().position(|r| r.item_id() == Some(id))
}

/// Map a drop at `flat_index` back to a sibling group and a position in it.
/// `flat_index` is the row the source would take the place of, and
/// `rows.len()` means the very end.
pub fn resolve_group_and_position(
    rows: &[DisplayRow],
    store: &ItemStore,
    source_id: &str,
    flat_index: usize,
) -> Result<DropTarget, MoveRejected> {
    let source = store
        .get(source_id)
        .ok_or_else(|| MoveRejected::NotFound(source_id.to_string()))?;
    if source.is_completed {
        return Err(MoveRejected::Completed(source_id.to_string()));
    }
    if flat_index > rows.len() {
        return Err(MoveRejected::InvalidTarget(flat_index));
    }

    match &source.parent_id {
        Some(parent_id) => resolve_child(rows, store, source_id, parent_id, flat_index),
        None => resolve_top_level(rows, store, source, flat_index),
    }
}

fn resolve_top_level(
    rows: &[DisplayRow],
    store: &ItemStore,
    source: &Item,
    flat_index: usize,
) -> Result<DropTarget, MoveRejected> {
    let before = &rows[..flat_index];
    if before.iter().any(|r| matches!(r, DisplayRow::CompletedHeader)) {
        return Err(MoveRejected::InvalidTarget(flat_index));
    }

    let (tier, start) = if source.kind.uses_tiers() {
        let header = before.iter().enumerate().rev().find_map(|(i, r)| match r {
            DisplayRow::Header { tier, .. } => Some((*tier, i + 1)),
            _ => None,
        });
        match header {
            Some(found) => found,
            // Above the first header: top of the first tier shown
            None => match rows.first() {
                Some(DisplayRow::Header { tier, .. }) => (*tier, 0),
                _ => (source.tier, 0),
            },
        }
    } else {
        (source.tier, 0)
    };

    let position = count_members(&rows[start..flat_index], store, source.id.as_str(), 0);
    Ok(DropTarget {
        group: SiblingGroup::top_level(source.kind, tier),
        position,
    })
}

fn resolve_child(
    rows: &[DisplayRow],
    store: &ItemStore,
    source_id: &str,
    parent_id: &str,
    flat_index: usize,
) -> Result<DropTarget, MoveRejected> {
    let parent_row =
        row_index(rows, parent_id).ok_or(MoveRejected::OutsideParent(flat_index))?;
    let add_row = rows
        .iter()
        .enumerate()
        .skip(parent_row)
        .find_map(|(i, r)| match r {
            DisplayRow::AddChild { parent_id: p } if p == parent_id => Some(i),
            _ => None,
        })
        .ok_or(MoveRejected::OutsideParent(flat_index))?;

    if flat_index <= parent_row || flat_index > add_row {
        return Err(MoveRejected::OutsideParent(flat_index));
    }
    let position = count_members(&rows[parent_row + 1..flat_index], store, source_id, 1);
    Ok(DropTarget {
        group: SiblingGroup::children(parent_id),
        position,
    })
}

/// Active item rows at `depth` other than the source
fn count_members(rows: &[DisplayRow], store: &ItemStore, source_id: &str, depth: usize) -> usize {
    rows.iter()
        .filter(|r| match r {
            DisplayRow::Item {
                id,
                depth: d,
                completed,
                ..
            } => *d == depth && !*completed && id != source_id && store.contains(id),
            _ => false,
        })
        .count()
}
