use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use tracing::debug;

use crate::model::block::{Edge, ScheduledBlock, Timeframe};
use crate::model::config::TimelineConfig;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Maps vertical timeline position to wall-clock time and back.
///
/// Positions are pixels from the top of the timeline content (midnight).
/// Every time produced here is quantized to the snap step.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    /// Pixels per hour
    pub hour_height: f64,
    pub snap_minutes: u32,
    pub min_block_minutes: u32,
    pub default_duration_minutes: u32,
}

impl Default for TimeGrid {
    fn default() -> Self {
        TimeGrid::from_config(&TimelineConfig::default())
    }
}

impl TimeGrid {
    pub fn from_config(config: &TimelineConfig) -> Self {
        TimeGrid {
            hour_height: config.hour_height,
            snap_minutes: config.snap_minutes,
            min_block_minutes: config.min_block_minutes,
            default_duration_minutes: config.default_duration_minutes,
        }
    }

    pub fn with_hour_height(hour_height: f64) -> Self {
        TimeGrid {
            hour_height,
            ..TimeGrid::default()
        }
    }

    fn step(&self) -> f64 {
        self.snap_minutes.max(1) as f64
    }

    /// Snapped time at content position `y` on `date`. Out-of-range
    /// positions clamp to the day rather than failing.
    pub fn position_to_time(&self, y: f64, date: NaiveDate) -> NaiveDateTime {
        let minutes = y / self.hour_height * 60.0;
        let q = self.step();
        let snapped = ((minutes / q).round() * q) as i64;
        let hour = (snapped / 60).clamp(0, 23) as u32;
        let minute = (snapped % 60).clamp(0, 59) as u32;
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
        date.and_time(time)
    }

    pub fn time_to_position(&self, time: NaiveTime) -> f64 {
        time.hour() as f64 * self.hour_height + time.minute() as f64 * (self.hour_height / 60.0)
    }

    /// A drag distance in whole snap steps, truncated toward zero
    pub fn snap_delta(&self, drag_delta: f64) -> i64 {
        let minutes = drag_delta / self.hour_height * 60.0;
        let q = self.step();
        ((minutes / q).trunc() * q) as i64
    }

    /// New `(start, duration)` after dragging one edge of a block by
    /// `drag_delta` pixels. The opposite edge stays where it was.
    pub fn resize(
        &self,
        start: NaiveTime,
        duration_minutes: u32,
        edge: Edge,
        drag_delta: f64,
    ) -> (NaiveTime, u32) {
        let start_min = minutes_of(start);
        let duration = duration_minutes as i64;
        let min_block = self.min_block_minutes as i64;
        let delta = self.snap_delta(drag_delta);

        match edge {
            Edge::Top => {
                // Bounded so the block keeps its minimum length and does not
                // start before midnight
                let delta = delta.clamp(-start_min, (duration - min_block).max(0));
                let new_start = time_of(start_min + delta);
                (new_start, (duration - delta) as u32)
            }
            Edge::Bottom => {
                let room = (MINUTES_PER_DAY - start_min).max(min_block);
                let new_duration = (duration + delta).max(min_block).min(room);
                (start, new_duration as u32)
            }
        }
    }

    /// Build the block for an item dropped onto the timeline at screen
    /// position `screen_y`, where the scrolled content starts at
    /// `content_origin_y`.
    pub fn drop_create(
        &self,
        item_id: &str,
        screen_y: f64,
        content_origin_y: f64,
        date: NaiveDate,
        timeframe: Timeframe,
        section: &str,
    ) -> ScheduledBlock {
        let content_y = screen_y - content_origin_y;
        let start = self.position_to_time(content_y, date).time();
        debug!(item = item_id, content_y, %start, "drop onto timeline");
        let mut block = ScheduledBlock::new(item_id, timeframe, section, date)
            .placed_at(start, self.default_duration_minutes);
        block.created_from_drag = true;
        block
    }
}

/// A block being dragged along the timeline. Only `commit` produces a time;
/// everything before it is preview.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveGesture {
    pub block_id: String,
    pub original_y: f64,
}

impl MoveGesture {
    /// Start moving a placed block; unplaced blocks cannot be moved
    pub fn begin(grid: &TimeGrid, block: &ScheduledBlock) -> Option<Self> {
        let start = block.scheduled_start_time?;
        Some(MoveGesture {
            block_id: block.id.clone(),
            original_y: grid.time_to_position(start),
        })
    }

    pub fn preview_y(&self, translation: f64) -> f64 {
        (self.original_y + translation).max(0.0)
    }

    pub fn commit(&self, grid: &TimeGrid, translation: f64, date: NaiveDate) -> NaiveTime {
        grid.position_to_time(self.preview_y(translation), date).time()
    }
}

/// What removing a block from the timeline means for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Unschedule {
    /// The block only existed because of a drag: delete it
    DeleteBlock(String),
    /// Keep the commitment, drop the time
    ClearTime(String),
}

pub fn unschedule(block: &ScheduledBlock) -> Unschedule {
    if block.created_from_drag {
        Unschedule::DeleteBlock(block.id.clone())
    } else {
        Unschedule::ClearTime(block.id.clone())
    }
}

fn minutes_of(time: NaiveTime) -> i64 {
    (time.hour() * 60 + time.minute()) as i64
}

fn time_of(minutes: i64) -> NaiveTime {
    let minutes = minutes.clamp(0, MINUTES_PER_DAY - 1) as u32;
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(NaiveTime::MIN)
}
