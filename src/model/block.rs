use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Planning horizon a block is committed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::Daily => write!(f, "daily"),
            Timeframe::Weekly => write!(f, "weekly"),
            Timeframe::Monthly => write!(f, "monthly"),
            Timeframe::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Timeframe::Daily),
            "weekly" => Ok(Timeframe::Weekly),
            "monthly" => Ok(Timeframe::Monthly),
            "yearly" => Ok(Timeframe::Yearly),
            _ => Err(format!("unknown timeframe: {}", s)),
        }
    }
}

/// Which edge of a block a resize handle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
}

impl std::str::FromStr for Edge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Edge::Top),
            "bottom" => Ok(Edge::Bottom),
            _ => Err(format!("unknown edge: {}", s)),
        }
    }
}

/// A commitment of an item to a planning view, optionally placed on the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledBlock {
    pub id: String,
    pub item_id: String,
    pub timeframe: Timeframe,
    /// Planning bucket within the timeframe
    pub section: String,
    pub date: NaiveDate,
    /// Absent when the block is committed but not placed on the timeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// The block itself (not just its time) came from dropping onto the timeline
    #[serde(default)]
    pub created_from_drag: bool,
}

impl ScheduledBlock {
    /// Create an unplaced commitment with a fresh id
    pub fn new(
        item_id: impl Into<String>,
        timeframe: Timeframe,
        section: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        ScheduledBlock {
            id: uuid::Uuid::now_v7().to_string(),
            item_id: item_id.into(),
            timeframe,
            section: section.into(),
            date,
            scheduled_start_time: None,
            duration_minutes: None,
            created_from_drag: false,
        }
    }

    pub fn placed_at(mut self, start: NaiveTime, duration_minutes: u32) -> Self {
        self.scheduled_start_time = Some(start);
        self.duration_minutes = Some(duration_minutes);
        self
    }

    pub fn is_placed(&self) -> bool {
        self.scheduled_start_time.is_some()
    }

    /// Minutes since midnight of the start, if placed
    pub fn start_minutes(&self) -> Option<u32> {
        self.scheduled_start_time
            .map(|t| t.hour() * 60 + t.minute())
    }

    /// Minutes since midnight of the end, if placed
    pub fn end_minutes(&self) -> Option<u32> {
        let start = self.start_minutes()?;
        Some(start + self.duration_minutes.unwrap_or(0))
    }

    /// Forget the timeline placement, keeping the commitment
    pub fn clear_time(&mut self) {
        self.scheduled_start_time = None;
        self.duration_minutes = None;
    }
}

/// Fields of a block that a move or resize may change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockFields {
    pub scheduled_start_time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
}

impl From<&ScheduledBlock> for BlockFields {
    fn from(block: &ScheduledBlock) -> Self {
        BlockFields {
            scheduled_start_time: block.scheduled_start_time,
            duration_minutes: block.duration_minutes,
        }
    }
}
