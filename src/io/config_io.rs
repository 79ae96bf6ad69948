use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::Config;

/// Error type for loading planwell.toml
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Read the config at `path`. A missing file yields the defaults.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(text)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let timeline = &config.timeline;
    if !(timeline.hour_height > 0.0) {
        return Err(ConfigError::Invalid(format!(
            "timeline.hour_height must be positive, got {}",
            timeline.hour_height
        )));
    }
    if timeline.snap_minutes == 0 {
        return Err(ConfigError::Invalid(
            "timeline.snap_minutes must be at least 1".into(),
        ));
    }
    if timeline.min_block_minutes == 0 || timeline.default_duration_minutes == 0 {
        return Err(ConfigError::Invalid(
            "block durations must be at least 1 minute".into(),
        ));
    }
    Ok(())
}
