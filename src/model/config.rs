use serde::{Deserialize, Serialize};

/// Configuration from planwell.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub drag: DragConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Pixels per hour on the timeline
    #[serde(default = "default_hour_height")]
    pub hour_height: f64,
    /// Quantization step for placing and resizing blocks
    #[serde(default = "default_fifteen")]
    pub snap_minutes: u32,
    #[serde(default = "default_fifteen")]
    pub min_block_minutes: u32,
    /// Length of a block created by dropping an item onto the timeline
    #[serde(default = "default_duration")]
    pub default_duration_minutes: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        TimelineConfig {
            hour_height: default_hour_height(),
            snap_minutes: default_fifteen(),
            min_block_minutes: default_fifteen(),
            default_duration_minutes: default_duration(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DragConfig {
    /// Minimum time between two live reorders during one drag
    #[serde(default = "default_reorder_interval")]
    pub reorder_interval_ms: u64,
}

impl Default for DragConfig {
    fn default() -> Self {
        DragConfig {
            reorder_interval_ms: default_reorder_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
        }
    }
}

fn default_hour_height() -> f64 {
    60.0
}

fn default_fifteen() -> u32 {
    15
}

fn default_duration() -> u32 {
    30
}

fn default_reorder_interval() -> u64 {
    250
}

fn default_level() -> String {
    "warn".to_string()
}
