use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::model::block::ScheduledBlock;

/// In-memory scheduled blocks keyed by id
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    blocks: IndexMap<String, ScheduledBlock>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blocks(blocks: impl IntoIterator<Item = ScheduledBlock>) -> Self {
        BlockStore {
            blocks: blocks.into_iter().map(|b| (b.id.clone(), b)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledBlock> {
        self.blocks.values()
    }

    pub fn get(&self, id: &str) -> Option<&ScheduledBlock> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ScheduledBlock> {
        self.blocks.get_mut(id)
    }

    pub fn insert(&mut self, block: ScheduledBlock) -> Option<ScheduledBlock> {
        self.blocks.insert(block.id.clone(), block)
    }

    pub fn remove(&mut self, id: &str) -> Option<ScheduledBlock> {
        self.blocks.shift_remove(id)
    }

    pub fn for_item(&self, item_id: &str) -> Vec<&ScheduledBlock> {
        self.blocks
            .values()
            .filter(|b| b.item_id == item_id)
            .collect()
    }

    /// Blocks on `date`: placed ones by start time, then unplaced ones
    pub fn on_date(&self, date: NaiveDate) -> Vec<&ScheduledBlock> {
        let mut blocks: Vec<&ScheduledBlock> =
            self.blocks.values().filter(|b| b.date == date).collect();
        blocks.sort_by_key(|b| (b.scheduled_start_time.is_none(), b.scheduled_start_time));
        blocks
    }

    /// Drop every block that references one of `item_ids`
    pub fn remove_for_items(&mut self, item_ids: &[String]) -> Vec<ScheduledBlock> {
        let doomed: Vec<String> = self
            .blocks
            .values()
            .filter(|b| item_ids.contains(&b.item_id))
            .map(|b| b.id.clone())
            .collect();
        doomed
            .iter()
            .filter_map(|id| self.blocks.shift_remove(id))
            .collect()
    }
}
