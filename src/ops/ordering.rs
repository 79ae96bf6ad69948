use serde::Serialize;
use tracing::debug;

use crate::model::item::{ItemKind, PriorityTier, SiblingGroup, SortOrderUpdate};
use crate::store::ItemStore;

/// Why a move gesture was refused. These are validation outcomes: callers
/// drop them silently and leave the model untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejected {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("completed items cannot be moved: {0}")]
    Completed(String),
    #[error("cannot move {item} under a different parent")]
    CrossParent { item: String },
    #[error("{item} does not belong to {group}")]
    GroupMismatch { item: String, group: SiblingGroup },
    #[error("drop position {0} is outside the parent's rows")]
    OutsideParent(usize),
    #[error("drop position {0} is not a valid target")]
    InvalidTarget(usize),
}

/// A top-level task moving to another priority tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierChange {
    pub id: String,
    pub from: PriorityTier,
    pub to: PriorityTier,
}

/// The outcome of a move: what to apply locally and persist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReorderPlan {
    /// Renumbering of the destination group
    pub updates: Vec<SortOrderUpdate>,
    /// Renumbering of the group the item left (cross-tier moves only)
    pub vacated: Vec<SortOrderUpdate>,
    pub tier_change: Option<TierChange>,
}

impl ReorderPlan {
    pub fn is_noop(&self) -> bool {
        self.updates.is_empty() && self.vacated.is_empty() && self.tier_change.is_none()
    }

    /// Both renumbering batches, destination first
    pub fn all_updates(&self) -> impl Iterator<Item = &SortOrderUpdate> {
        self.updates.iter().chain(self.vacated.iter())
    }
}

/// A group whose active sort orders are not exactly `0..n-1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderingViolation {
    pub group: SiblingGroup,
    /// Sort orders in display order
    pub found: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// Move `source_id` next to `target_id`, which it was dragged over.
///
/// Within one group the source lands after the target when travelling down
/// and before it when travelling up. Across tiers the direction follows tier
/// display order. `filter` is the destination group as resolved from the
/// display; the target must be an active member of it.
pub fn reorder(
    store: &ItemStore,
    source_id: &str,
    target_id: &str,
    filter: &SiblingGroup,
) -> Result<ReorderPlan, MoveRejected> {
    let source = store
        .get(source_id)
        .ok_or_else(|| MoveRejected::NotFound(source_id.to_string()))?;
    let target = store
        .get(target_id)
        .ok_or_else(|| MoveRejected::NotFound(target_id.to_string()))?;
    if source.is_completed {
        return Err(MoveRejected::Completed(source_id.to_string()));
    }
    if target.is_completed {
        return Err(MoveRejected::Completed(target_id.to_string()));
    }
    if source_id == target_id {
        return Ok(ReorderPlan::default());
    }
    if source.parent_id.is_some() && target.parent_id != source.parent_id {
        return Err(MoveRejected::CrossParent {
            item: source_id.to_string(),
        });
    }
    if target.sibling_group() != *filter {
        return Err(MoveRejected::GroupMismatch {
            item: target_id.to_string(),
            group: filter.clone(),
        });
    }

    let others: Vec<&str> = store
        .group_members(filter)
        .iter()
        .map(|i| i.id.as_str())
        .filter(|id| *id != source_id)
        .collect();
    let target_idx = others
        .iter()
        .position(|id| *id == target_id)
        .ok_or_else(|| MoveRejected::NotFound(target_id.to_string()))?;

    let source_group = source.sibling_group();
    let moving_down = if source_group == *filter {
        let members = store.group_members(filter);
        let s = members.iter().position(|i| i.id == source_id).unwrap_or(0);
        let t = members.iter().position(|i| i.id == target_id).unwrap_or(0);
        s < t
    } else {
        source.tier.rank() < target.tier.rank()
    };

    let index = if moving_down { target_idx + 1 } else { target_idx };

    move_to_position(store, source_id, filter, index)
}

/// Place `source_id` at `index` within `dest` (index counted without the
/// source). Indices past the end append.
pub fn move_to_position(
    store: &ItemStore,
    source_id: &str,
    dest: &SiblingGroup,
    index: usize,
) -> Result<ReorderPlan, MoveRejected> {
    let source = store
        .get(source_id)
        .ok_or_else(|| MoveRejected::NotFound(source_id.to_string()))?;
    if source.is_completed {
        return Err(MoveRejected::Completed(source_id.to_string()));
    }
    let source_group = source.sibling_group();

    if source_group == *dest {
        let members = store.group_members(dest);
        let mut order: Vec<&str> = members.iter().map(|i| i.id.as_str()).collect();
        let current = order
            .iter()
            .position(|id| *id == source_id)
            .ok_or_else(|| MoveRejected::NotFound(source_id.to_string()))?;
        order.remove(current);
        let index = index.min(order.len());
        if index == current {
            debug!(item = source_id, index, "move leaves item in place");
            return Ok(ReorderPlan::default());
        }
        order.insert(index, source_id);
        let updates = renumber(store, &order);
        debug!(item = source_id, from = current, to = index, updates = updates.len(), "planned reorder");
        return Ok(ReorderPlan {
            updates,
            ..Default::default()
        });
    }

    let to_tier = match (&source_group, dest) {
        (
            SiblingGroup::TopLevel {
                kind: from_kind,
                tier: Some(_),
            },
            SiblingGroup::TopLevel {
                kind: to_kind,
                tier: Some(to),
            },
        ) if from_kind == to_kind => *to,
        (SiblingGroup::Children { .. }, SiblingGroup::Children { .. }) => {
            return Err(MoveRejected::CrossParent {
                item: source_id.to_string(),
            });
        }
        _ => {
            return Err(MoveRejected::GroupMismatch {
                item: source_id.to_string(),
                group: dest.clone(),
            });
        }
    };

    let mut dest_order: Vec<&str> = store
        .group_members(dest)
        .iter()
        .map(|i| i.id.as_str())
        .collect();
    let index = index.min(dest_order.len());
    dest_order.insert(index, source_id);

    let source_order: Vec<&str> = store
        .group_members(&source_group)
        .iter()
        .map(|i| i.id.as_str())
        .filter(|id| *id != source_id)
        .collect();

    let plan = ReorderPlan {
        updates: renumber(store, &dest_order),
        vacated: renumber(store, &source_order),
        tier_change: Some(TierChange {
            id: source_id.to_string(),
            from: source.tier,
            to: to_tier,
        }),
    };
    debug!(
        item = source_id,
        from = %source.tier,
        to = %to_tier,
        index,
        "planned cross-tier move"
    );
    Ok(plan)
}

/// Move a top-level task to the end of another tier
pub fn retier(
    store: &ItemStore,
    id: &str,
    tier: PriorityTier,
) -> Result<ReorderPlan, MoveRejected> {
    let item = store
        .get(id)
        .ok_or_else(|| MoveRejected::NotFound(id.to_string()))?;
    let dest = SiblingGroup::top_level(ItemKind::Task, tier);
    if !item.is_top_level() || item.kind != ItemKind::Task {
        return Err(MoveRejected::GroupMismatch {
            item: id.to_string(),
            group: dest,
        });
    }
    if item.tier == tier {
        return Ok(ReorderPlan::default());
    }
    move_to_position(store, id, &dest, usize::MAX)
}

/// Apply a plan to the store, as the optimistic half of a move
pub fn apply_plan(store: &mut ItemStore, plan: &ReorderPlan) {
    if let Some(change) = &plan.tier_change
        && let Some(item) = store.get_mut(&change.id)
    {
        item.tier = change.to;
    }
    store.apply_sort_orders(&plan.updates);
    store.apply_sort_orders(&plan.vacated);
}

// ---------------------------------------------------------------------------
// Invariant maintenance
// ---------------------------------------------------------------------------

/// Renumber a group `0..n-1`. Members listed in `rejoining` (items that just
/// became active again) go to the end, in the given order.
pub fn normalize_group(
    store: &ItemStore,
    group: &SiblingGroup,
    rejoining: &[String],
) -> Vec<SortOrderUpdate> {
    let members = store.group_members(group);
    let mut order: Vec<&str> = members
        .iter()
        .map(|i| i.id.as_str())
        .filter(|id| !rejoining.iter().any(|r| r == id))
        .collect();
    for id in rejoining {
        if members.iter().any(|m| m.id == *id) {
            order.push(id);
        }
    }
    renumber(store, &order)
}

/// The sort order a newly created item gets at the end of `group`
pub fn next_sort_order(store: &ItemStore, group: &SiblingGroup) -> u32 {
    store.group_members(group).len() as u32
}

pub fn validate_group(store: &ItemStore, group: &SiblingGroup) -> Option<OrderingViolation> {
    let found: Vec<u32> = store
        .group_members(group)
        .iter()
        .map(|i| i.sort_order)
        .collect();
    let dense = found.iter().enumerate().all(|(i, so)| *so as usize == i);
    (!dense).then(|| OrderingViolation {
        group: group.clone(),
        found,
    })
}

pub fn validate_all(store: &ItemStore) -> Vec<OrderingViolation> {
    store
        .groups()
        .iter()
        .filter_map(|g| validate_group(store, g))
        .collect()
}

/// Updates that make every group dense again, keeping current display order
pub fn repair_all(store: &ItemStore) -> Vec<SortOrderUpdate> {
    store
        .groups()
        .iter()
        .flat_map(|g| normalize_group(store, g, &[]))
        .collect()
}

/// Assign `0..n-1` along `order`, returning only the values that change
fn renumber(store: &ItemStore, order: &[&str]) -> Vec<SortOrderUpdate> {
    order
        .iter()
        .enumerate()
        .filter_map(|(i, id)| {
            let current = store.get(id)?.sort_order;
            (current != i as u32).then(|| SortOrderUpdate {
                id: id.to_string(),
                sort_order: i as u32,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::Item;

    fn medium() -> SiblingGroup {
        SiblingGroup::top_level(ItemKind::Task, PriorityTier::Medium)
    }

    fn high() -> SiblingGroup {
        SiblingGroup::top_level(ItemKind::Task, PriorityTier::High)
    }

    fn task(id: &str, tier: PriorityTier, so: u32) -> Item {
        Item::new(id, ItemKind::Task, id).with_tier(tier).with_sort_order(so)
    }

    fn three_medium() -> ItemStore {
        ItemStore::from_items([
            task("item0", PriorityTier::Medium, 0),
            task("item1", PriorityTier::Medium, 1),
            task("item2", PriorityTier::Medium, 2),
        ])
    }

    fn order_of(store: &ItemStore, group: &SiblingGroup) -> Vec<String> {
        store
            .group_members(group)
            .iter()
            .map(|i| i.id.clone())
            .collect()
    }

    fn sort_orders(store: &ItemStore, group: &SiblingGroup) -> Vec<u32> {
        store
            .group_members(group)
            .iter()
            .map(|i| i.sort_order)
            .collect()
    }

    #[test]
    fn test_move_last_before_first() {
        let mut store = three_medium();
        let plan = reorder(&store, "item2", "item0", &medium()).unwrap();
        assert_eq!(plan.updates.len(), 3);
        assert!(plan.tier_change.is_none());
        apply_plan(&mut store, &plan);
        assert_eq!(order_of(&store, &medium()), vec!["item2", "item0", "item1"]);
        assert_eq!(sort_orders(&store, &medium()), vec![0, 1, 2]);
    }

    #[test]
    fn test_move_down_lands_after_target() {
        let mut store = three_medium();
        let plan = reorder(&store, "item0", "item1", &medium()).unwrap();
        apply_plan(&mut store, &plan);
        assert_eq!(order_of(&store, &medium()), vec!["item1", "item0", "item2"]);
        // item2 did not move, so only two updates
        assert_eq!(plan.updates.len(), 2);
    }

    #[test]
    fn test_move_up_lands_before_target() {
        let mut store = three_medium();
        let plan = reorder(&store, "item2", "item1", &medium()).unwrap();
        apply_plan(&mut store, &plan);
        assert_eq!(order_of(&store, &medium()), vec!["item0", "item2", "item1"]);
    }

    #[test]
    fn test_move_onto_self_is_noop() {
        let store = three_medium();
        let plan = reorder(&store, "item1", "item1", &medium()).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_move_to_current_position_is_noop() {
        let store = three_medium();
        let plan = move_to_position(&store, "item1", &medium(), 1).unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.all_updates().count(), 0);
    }

    #[test]
    fn test_cross_tier_move_down() {
        let mut store = ItemStore::from_items([
            task("h0", PriorityTier::High, 0),
            task("h1", PriorityTier::High, 1),
            task("m0", PriorityTier::Medium, 0),
            task("m1", PriorityTier::Medium, 1),
        ]);
        let plan = reorder(&store, "h0", "m0", &medium()).unwrap();
        assert_eq!(
            plan.tier_change,
            Some(TierChange {
                id: "h0".into(),
                from: PriorityTier::High,
                to: PriorityTier::Medium,
            })
        );
        apply_plan(&mut store, &plan);
        assert_eq!(order_of(&store, &medium()), vec!["m0", "h0", "m1"]);
        assert_eq!(sort_orders(&store, &medium()), vec![0, 1, 2]);
        assert_eq!(order_of(&store, &high()), vec!["h1"]);
        assert_eq!(sort_orders(&store, &high()), vec![0]);
        assert_eq!(plan.vacated.len(), 1);
    }

    #[test]
    fn test_cross_tier_move_up() {
        let mut store = ItemStore::from_items([
            task("h0", PriorityTier::High, 0),
            task("h1", PriorityTier::High, 1),
            task("m0", PriorityTier::Medium, 0),
        ]);
        let plan = reorder(&store, "m0", "h1", &high()).unwrap();
        apply_plan(&mut store, &plan);
        assert_eq!(order_of(&store, &high()), vec!["h0", "m0", "h1"]);
        assert!(order_of(&store, &medium()).is_empty());
        assert!(plan.vacated.is_empty());
    }

    #[test]
    fn test_subtask_cross_parent_rejected() {
        let p = task("P", PriorityTier::High, 0);
        let q = task("Q", PriorityTier::High, 1);
        let a = Item::child_of(&p, "P.a", "a");
        let b = Item::child_of(&q, "Q.b", "b");
        let store = ItemStore::from_items([p, q, a, b]);
        let err = reorder(&store, "P.a", "Q.b", &SiblingGroup::children("Q")).unwrap_err();
        assert_eq!(err, MoveRejected::CrossParent { item: "P.a".into() });
    }

    #[test]
    fn test_subtask_reorder_within_parent() {
        let p = task("P", PriorityTier::High, 0);
        let a = Item::child_of(&p, "P.a", "a").with_sort_order(0);
        let b = Item::child_of(&p, "P.b", "b").with_sort_order(1);
        let mut store = ItemStore::from_items([p, a, b]);
        let plan = reorder(&store, "P.b", "P.a", &SiblingGroup::children("P")).unwrap();
        apply_plan(&mut store, &plan);
        let ids: Vec<&str> = store
            .active_children("P")
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["P.b", "P.a"]);
    }

    #[test]
    fn test_completed_items_cannot_move() {
        let mut store = three_medium();
        store.get_mut("item0").unwrap().is_completed = true;
        assert_eq!(
            reorder(&store, "item0", "item1", &medium()),
            Err(MoveRejected::Completed("item0".into()))
        );
        assert_eq!(
            reorder(&store, "item1", "item0", &medium()),
            Err(MoveRejected::Completed("item0".into()))
        );
    }

    #[test]
    fn test_missing_items_rejected() {
        let store = three_medium();
        assert_eq!(
            reorder(&store, "ghost", "item0", &medium()),
            Err(MoveRejected::NotFound("ghost".into()))
        );
    }

    #[test]
    fn test_target_outside_filter_rejected() {
        let store = three_medium();
        let err = reorder(&store, "item0", "item1", &high()).unwrap_err();
        assert!(matches!(err, MoveRejected::GroupMismatch { .. }));
    }

    #[test]
    fn test_list_items_cannot_change_tier() {
        let a = Item::new("L1", ItemKind::List, "a");
        let store = ItemStore::from_items([a]);
        let err = move_to_position(&store, "L1", &high(), 0).unwrap_err();
        assert!(matches!(err, MoveRejected::GroupMismatch { .. }));
    }

    #[test]
    fn test_retier_appends() {
        let mut store = ItemStore::from_items([
            task("h0", PriorityTier::High, 0),
            task("m0", PriorityTier::Medium, 0),
            task("m1", PriorityTier::Medium, 1),
        ]);
        let plan = retier(&store, "m0", PriorityTier::High).unwrap();
        apply_plan(&mut store, &plan);
        assert_eq!(order_of(&store, &high()), vec!["h0", "m0"]);
        assert_eq!(sort_orders(&store, &medium()), vec![0]);
        assert!(retier(&store, "m0", PriorityTier::High).unwrap().is_noop());
    }

    #[test]
    fn test_normalize_closes_gaps_and_appends_rejoining() {
        let mut store = ItemStore::from_items([
            task("a", PriorityTier::Medium, 0),
            task("back", PriorityTier::Medium, 1),
            task("b", PriorityTier::Medium, 3),
            task("c", PriorityTier::Medium, 7),
        ]);
        let updates = normalize_group(&store, &medium(), &["back".to_string()]);
        store.apply_sort_orders(&updates);
        assert_eq!(order_of(&store, &medium()), vec!["a", "b", "c", "back"]);
        assert_eq!(sort_orders(&store, &medium()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_validate_and_repair() {
        let mut store = ItemStore::from_items([
            task("a", PriorityTier::Medium, 0),
            task("b", PriorityTier::Medium, 0),
            task("c", PriorityTier::Medium, 4),
            task("h", PriorityTier::High, 0),
        ]);
        let violations = validate_all(&store);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].group, medium());
        assert_eq!(violations[0].found, vec![0, 0, 4]);

        let updates = repair_all(&store);
        store.apply_sort_orders(&updates);
        assert!(validate_all(&store).is_empty());
        assert_eq!(order_of(&store, &medium()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_next_sort_order() {
        let store = three_medium();
        assert_eq!(next_sort_order(&store, &medium()), 3);
        assert_eq!(next_sort_order(&store, &high()), 0);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn reorder_keeps_group_dense(len in 1usize..12, s in 0usize..12, t in 0usize..12) {
                let s = s % len;
                let t = t % len;
                let mut store = ItemStore::from_items(
                    (0..len).map(|i| task(&format!("t{}", i), PriorityTier::Medium, i as u32)),
                );
                let source = format!("t{}", s);
                let target = format!("t{}", t);
                let plan = reorder(&store, &source, &target, &medium()).unwrap();
                apply_plan(&mut store, &plan);

                let expected: Vec<u32> = (0..len as u32).collect();
                prop_assert_eq!(sort_orders(&store, &medium()), expected);

                // The source ends up where the target was
                let order = order_of(&store, &medium());
                prop_assert_eq!(order[t].clone(), source);
                if s == t {
                    prop_assert!(plan.is_noop());
                }
            }

            #[test]
            fn cross_tier_keeps_both_groups_dense(
                highs in 1usize..8,
                mediums in 1usize..8,
                s in 0usize..8,
                t in 0usize..8,
            ) {
                let s = s % highs;
                let t = t % mediums;
                let mut items: Vec<Item> = (0..highs)
                    .map(|i| task(&format!("h{}", i), PriorityTier::High, i as u32))
                    .collect();
                items.extend((0..mediums).map(|i| task(&format!("m{}", i), PriorityTier::Medium, i as u32)));
                let mut store = ItemStore::from_items(items);
                let plan = reorder(&store, &format!("h{}", s), &format!("m{}", t), &medium()).unwrap();
                apply_plan(&mut store, &plan);

                prop_assert_eq!(sort_orders(&store, &high()), (0..highs as u32 - 1).collect::<Vec<_>>());
                prop_assert_eq!(sort_orders(&store, &medium()), (0..mediums as u32 + 1).collect::<Vec<_>>());
                prop_assert!(validate_all(&store).is_empty());
            }
        }
    }
}
