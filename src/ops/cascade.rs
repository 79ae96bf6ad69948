use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::store::ItemStore;

/// Everything a toggle touched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeOutcome {
    /// Items whose completion fields changed, the toggled item first
    pub changed: Vec<String>,
    /// Items that went from completed back to active
    pub reactivated: Vec<String>,
    /// A child toggle completed or reopened the parent
    pub parent_changed: bool,
    /// A parent toggle changed at least one child
    pub children_changed: bool,
}

/// Toggle an item, cascading to its children or its parent.
///
/// An explicit toggle on a top-level item completes or restores its
/// children. A toggle on a child may complete or reopen its parent. Items are
/// at most two levels deep, so a cascade never goes further than one level.
/// Unknown ids are a no-op.
pub fn toggle_completion(
    store: &mut ItemStore,
    id: &str,
    now: DateTime<Utc>,
) -> Option<CascadeOutcome> {
    let item = store.get(id)?;
    let (parent_id, completed) = (item.parent_id.clone(), item.is_completed);
    match parent_id {
        Some(parent_id) => toggle_child(store, id, &parent_id, now),
        None if completed => uncomplete_parent(store, id, now),
        None => complete_parent(store, id, now),
    }
}

/// Complete a parent and force all of its children complete, remembering
/// what the children looked like beforehand.
pub fn complete_parent(
    store: &mut ItemStore,
    id: &str,
    now: DateTime<Utc>,
) -> Option<CascadeOutcome> {
    if store.get(id)?.is_completed {
        return Some(CascadeOutcome::default());
    }
    let children: Vec<(String, bool)> = store
        .children(id)
        .iter()
        .map(|c| (c.id.clone(), c.is_completed))
        .collect();
    let snapshot: Vec<bool> = children.iter().map(|(_, done)| *done).collect();

    let parent = store.get_mut(id)?;
    parent.set_completed(true, now);
    parent.previous_child_snapshot = (!snapshot.is_empty()).then_some(snapshot);

    let mut outcome = CascadeOutcome {
        changed: vec![id.to_string()],
        ..Default::default()
    };
    for (child_id, _) in &children {
        if let Some(child) = store.get_mut(child_id) {
            let before = (child.is_completed, child.completed_at);
            child.is_completed = true;
            child.completed_at = Some(now);
            if before != (child.is_completed, child.completed_at) {
                outcome.changed.push(child_id.clone());
            }
        }
    }
    outcome.children_changed = outcome.changed.len() > 1;
    debug!(item = id, children = children.len(), "completed parent");
    Some(outcome)
}

/// Reopen a parent. With a snapshot, each child returns to its recorded
/// state; children past the end of the snapshot keep their current state.
pub fn uncomplete_parent(
    store: &mut ItemStore,
    id: &str,
    now: DateTime<Utc>,
) -> Option<CascadeOutcome> {
    let parent = store.get_mut(id)?;
    if !parent.is_completed {
        return Some(CascadeOutcome::default());
    }
    parent.set_completed(false, now);
    let snapshot = parent.previous_child_snapshot.take();

    let mut outcome = CascadeOutcome {
        changed: vec![id.to_string()],
        reactivated: vec![id.to_string()],
        ..Default::default()
    };
    let Some(snapshot) = snapshot else {
        debug!(item = id, "reopened parent without snapshot");
        return Some(outcome);
    };

    let child_ids: Vec<String> = store.children(id).iter().map(|c| c.id.clone()).collect();
    for (child_id, was_completed) in child_ids.iter().zip(snapshot) {
        if let Some(child) = store.get_mut(child_id)
            && child.set_completed(was_completed, now)
        {
            outcome.changed.push(child_id.clone());
            if !was_completed {
                outcome.reactivated.push(child_id.clone());
            }
        }
    }
    outcome.children_changed = outcome.changed.len() > 1;
    debug!(item = id, restored = outcome.changed.len() - 1, "reopened parent from snapshot");
    Some(outcome)
}

/// Toggle one child, then complete or reopen its parent to match.
///
/// Reopening the parent this way leaves the other children as they are;
/// only an explicit parent toggle restores from the snapshot.
pub fn toggle_child(
    store: &mut ItemStore,
    id: &str,
    parent_id: &str,
    now: DateTime<Utc>,
) -> Option<CascadeOutcome> {
    let before: Vec<bool> = store
        .children(parent_id)
        .iter()
        .map(|c| c.is_completed)
        .collect();

    let child = store.get_mut(id)?;
    let completed = !child.is_completed;
    child.set_completed(completed, now);

    let mut outcome = CascadeOutcome {
        changed: vec![id.to_string()],
        ..Default::default()
    };
    if !completed {
        outcome.reactivated.push(id.to_string());
    }

    let all_done = store.children(parent_id).iter().all(|c| c.is_completed);
    let Some(parent) = store.get_mut(parent_id) else {
        return Some(outcome);
    };
    if all_done && !parent.is_completed {
        parent.set_completed(true, now);
        parent.previous_child_snapshot = Some(before);
        outcome.parent_changed = true;
        debug!(item = id, parent = parent_id, "last child done, parent completed");
    } else if !all_done && parent.is_completed {
        parent.set_completed(false, now);
        outcome.parent_changed = true;
        outcome.reactivated.push(parent_id.to_string());
        debug!(item = id, parent = parent_id, "child reopened, parent reopened");
    }
    if outcome.parent_changed {
        outcome.changed.push(parent_id.to_string());
    }
    Some(outcome)
}
