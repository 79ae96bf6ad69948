use serde::Serialize;

use crate::model::block::ScheduledBlock;
use crate::model::item::Item;
use crate::ops::cascade::CascadeOutcome;
use crate::ops::display::DisplayRow;
use crate::ops::ordering::{OrderingViolation, ReorderPlan};
use crate::store::ItemStore;
use crate::util::unicode::{single_line, truncate_to_width};

const TITLE_WIDTH: usize = 48;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct RowJson {
    pub index: usize,
    #[serde(flatten)]
    pub row: DisplayRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct ToggleJson<'a> {
    pub item: &'a Item,
    #[serde(flatten)]
    pub outcome: &'a CascadeOutcome,
}

#[derive(Serialize)]
pub struct CheckJson {
    pub violations: Vec<OrderingViolation>,
    pub fixed: usize,
}

#[derive(Serialize)]
pub struct BlockJson<'a> {
    #[serde(flatten)]
    pub block: &'a ScheduledBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

pub fn rows_to_json(rows: &[DisplayRow], items: &ItemStore) -> Vec<RowJson> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| RowJson {
            index,
            row: row.clone(),
            title: row
                .item_id()
                .and_then(|id| items.get(id))
                .map(|i| i.title.clone()),
        })
        .collect()
}

pub fn block_to_json(block: &ScheduledBlock) -> BlockJson<'_> {
    BlockJson {
        block,
        end_time: block.end_minutes().map(clock),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One line per display row, prefixed with the row index `pw mv --at` takes
pub fn format_rows(rows: &[DisplayRow], items: &ItemStore) -> Vec<String> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| format!("{:<3} {}", index, format_row(row, items)))
        .collect()
}

fn format_row(row: &DisplayRow, items: &ItemStore) -> String {
    match row {
        DisplayRow::Header { tier, collapsed } => {
            if *collapsed {
                format!("== {} (collapsed) ==", tier)
            } else {
                format!("== {} ==", tier)
            }
        }
        DisplayRow::Item {
            id,
            depth,
            has_children,
            expanded,
            completed,
        } => {
            let title = items
                .get(id)
                .map(|i| truncate_to_width(&single_line(&i.title), TITLE_WIDTH))
                .unwrap_or_default();
            let check = if *completed { 'x' } else { ' ' };
            let more = if *has_children && !*expanded { " \u{25b8}" } else { "" };
            format!("{}[{}] {}  {}{}", "    ".repeat(*depth), check, id, title, more)
        }
        DisplayRow::AddChild { parent_id } => format!("    + add to {}", parent_id),
        DisplayRow::CompletedHeader => "== Completed ==".to_string(),
    }
}

/// Summary of what a move changed
pub fn format_plan(plan: &ReorderPlan) -> Vec<String> {
    if plan.is_noop() {
        return vec!["nothing to move".to_string()];
    }
    let mut lines = Vec::new();
    if let Some(change) = &plan.tier_change {
        lines.push(format!("{}: {} -> {}", change.id, change.from, change.to));
    }
    for update in plan.all_updates() {
        lines.push(format!("{} = {}", update.id, update.sort_order));
    }
    lines
}

pub fn format_toggle(item: &Item, outcome: &CascadeOutcome) -> Vec<String> {
    let state = if item.is_completed { "completed" } else { "reopened" };
    let mut lines = vec![format!("{} {}", item.id, state)];
    let others: Vec<&str> = outcome
        .changed
        .iter()
        .skip(1)
        .map(String::as_str)
        .collect();
    if !others.is_empty() {
        lines.push(format!("also changed: {}", others.join(", ")));
    }
    lines
}

pub fn format_block(block: &ScheduledBlock, title: Option<&str>) -> String {
    let time = match (block.start_minutes(), block.end_minutes()) {
        (Some(start), Some(end)) => format!("{}-{}", clock(start), clock(end)),
        _ => "--:-----:--".to_string(),
    };
    let title = title
        .map(|t| truncate_to_width(&single_line(t), TITLE_WIDTH))
        .unwrap_or_default();
    format!(
        "{}  {}  {}/{}  {}  {}  [{}]",
        time, block.date, block.timeframe, block.section, block.item_id, title, block.id
    )
}

pub fn format_violation(violation: &OrderingViolation) -> String {
    let found: Vec<String> = violation.found.iter().map(|n| n.to_string()).collect();
    format!("{}: sort orders [{}]", violation.group, found.join(", "))
}

/// `HH:MM` for minutes since midnight; 1440 prints as 24:00
fn clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::block::Timeframe;
    use crate::model::item::{ItemKind, PriorityTier, SiblingGroup, SortOrderUpdate};
    use crate::ops::display::{ViewState, flatten};
    use crate::ops::ordering::TierChange;
    use chrono::{NaiveDate, NaiveTime};
    use insta::assert_snapshot;

    fn sample() -> ItemStore {
        let a = Item::new("T-1", ItemKind::Task, "Plan launch").with_tier(PriorityTier::High);
        let b = Item::new("T-2", ItemKind::Task, "Reply to the venue")
            .with_tier(PriorityTier::High)
            .with_sort_order(1);
        let c = Item::new("T-3", ItemKind::Task, "Clean desk").with_tier(PriorityTier::Low);
        let a1 = Item::child_of(&a, "T-1.1", "Draft outline");
        let mut a2 = Item::child_of(&a, "T-1.2", "Book room").with_sort_order(1);
        a2.is_completed = true;
        let d = Item::child_of(&c, "T-3.1", "Sort cables");
        ItemStore::from_items(vec![a, b, c, a1, a2, d])
    }

    #[test]
    fn test_format_rows_expanded() {
        let store = sample();
        let view = ViewState {
            expanded: ["T-1".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let rows = flatten(&store, ItemKind::Task, &view);
        let text = format_rows(&rows, &store).join("\n");
        assert_snapshot!(text, @r"
        0   == High ==
        1   [ ] T-1  Plan launch
        2       [ ] T-1.1  Draft outline
        3       [x] T-1.2  Book room
        4       + add to T-1
        5   [ ] T-2  Reply to the venue
        6   == Low ==
        7   [ ] T-3  Clean desk ▸
        ");
    }

    #[test]
    fn test_format_rows_collapsed_tier() {
        let store = sample();
        let mut view = ViewState::default();
        view.toggle_tier(PriorityTier::High);
        let rows = flatten(&store, ItemKind::Task, &view);
        let text = format_rows(&rows, &store).join("\n");
        assert_snapshot!(text, @r"
        0   == High (collapsed) ==
        1   == Low ==
        2   [ ] T-3  Clean desk ▸
        ");
    }

    #[test]
    fn test_long_title_truncated() {
        let store = ItemStore::from_items(vec![Item::new(
            "L-1",
            ItemKind::List,
            "a very long list title that keeps going well past the column limit",
        )]);
        let rows = flatten(&store, ItemKind::List, &ViewState::default());
        let line = &format_rows(&rows, &store)[0];
        assert!(line.ends_with('\u{2026}'));
    }

    #[test]
    fn test_format_plan() {
        let plan = ReorderPlan {
            updates: vec![SortOrderUpdate {
                id: "T-2".into(),
                sort_order: 0,
            }],
            vacated: Vec::new(),
            tier_change: Some(TierChange {
                id: "T-2".into(),
                from: PriorityTier::High,
                to: PriorityTier::Low,
            }),
        };
        assert_eq!(format_plan(&plan), vec!["T-2: High -> Low", "T-2 = 0"]);
        assert_eq!(format_plan(&ReorderPlan::default()), vec!["nothing to move"]);
    }

    #[test]
    fn test_format_block_times() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let mut block = ScheduledBlock::new("T-1", Timeframe::Daily, "focus", day)
            .placed_at(NaiveTime::from_hms_opt(23, 30, 0).unwrap(), 30);
        block.id = "b1".into();
        assert_eq!(
            format_block(&block, Some("Plan launch")),
            "23:30-24:00  2025-03-10  daily/focus  T-1  Plan launch  [b1]"
        );
        block.clear_time();
        assert!(format_block(&block, None).starts_with("--:-----:--"));
    }

    #[test]
    fn test_format_violation() {
        let violation = OrderingViolation {
            group: SiblingGroup::children("T-1"),
            found: vec![0, 2],
        };
        assert_eq!(
            format_violation(&violation),
            "children of T-1: sort orders [0, 2]"
        );
    }
}
