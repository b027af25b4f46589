//! YAML configuration: admission bounds and the hot-reloadable zone config.
//!
//! `durations.yaml` is loaded once at startup. `config.yaml` is re-read by
//! the watcher whenever the file changes; its whitelist windows arrive as
//! `"HH:MM-HH:MM"` strings and are compiled to second-of-day spans before
//! the scheduler sees them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use chrono::{NaiveTime, TimeDelta, Timelike};
use serde::Deserialize;
use thiserror::Error;

/// Seconds in one calendar day.
pub const DAY_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid whitelist window {0:?}, expected \"HH:MM-HH:MM\"")]
    InvalidWindow(String),

    #[error("invalid pause for zone {zone}: {reason}")]
    InvalidPause { zone: String, reason: String },
}

/// Admission bounds; read once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Durations {
    #[serde(with = "humantime_serde")]
    pub min_auto_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub min_manual_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub max_noncrit_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub max_crit_duration: Duration,
    /// Furthest a deadline may lie past the admission instant.
    #[serde(with = "humantime_serde")]
    pub deadline_duration: Duration,
    /// Minimum lead time between admission and a manual task's start.
    #[serde(with = "humantime_serde", default)]
    pub preferred_manual_start_mult: Duration,
    /// Minimum lead time between admission and an auto task's start.
    #[serde(with = "humantime_serde", default)]
    pub preferred_auto_start_mult: Duration,
}

impl Durations {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// A daily whitelist window as seconds of day. A window that wraps past
/// midnight has `end` beyond `DAY_SECONDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

/// Zone config as it appears on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawZoneConfig {
    #[serde(default)]
    pub white_list: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub black_list: Vec<String>,
    #[serde(default)]
    pub available_zones: usize,
    #[serde(default)]
    pub pauses: BTreeMap<String, String>,
}

/// Compiled zone config handed to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ZoneConfig {
    pub whitelist: BTreeMap<String, Vec<Window>>,
    pub blacklist: BTreeSet<String>,
    /// Minimum number of zones that must hold no task at every instant.
    pub available_zones: usize,
    pub pauses: BTreeMap<String, TimeDelta>,
}

impl ZoneConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw: RawZoneConfig = serde_yaml::from_str(&std::fs::read_to_string(path)?)?;
        Self::compile(raw)
    }

    pub fn compile(raw: RawZoneConfig) -> Result<Self, ConfigError> {
        let mut whitelist = BTreeMap::new();
        for (zone, spans) in raw.white_list {
            let windows = spans
                .iter()
                .map(|span| parse_window(span))
                .collect::<Result<Vec<_>, _>>()?;
            whitelist.insert(zone, windows);
        }

        let mut pauses = BTreeMap::new();
        for (zone, raw_pause) in raw.pauses {
            let pause = humantime::parse_duration(&raw_pause)
                .map_err(|err| ConfigError::InvalidPause {
                    zone: zone.clone(),
                    reason: err.to_string(),
                })
                .and_then(|pause| {
                    TimeDelta::from_std(pause).map_err(|err| ConfigError::InvalidPause {
                        zone: zone.clone(),
                        reason: err.to_string(),
                    })
                })?;
            pauses.insert(zone, pause);
        }

        Ok(Self {
            whitelist,
            blacklist: raw.black_list.into_iter().collect(),
            available_zones: raw.available_zones,
            pauses,
        })
    }

    /// Mandatory pause after every task in `zone`; zero when unconfigured.
    pub fn pause(&self, zone: &str) -> TimeDelta {
        self.pauses.get(zone).copied().unwrap_or_else(TimeDelta::zero)
    }
}

fn parse_window(span: &str) -> Result<Window, ConfigError> {
    let (raw_start, raw_end) = span
        .split_once('-')
        .ok_or_else(|| ConfigError::InvalidWindow(span.to_string()))?;
    let start = parse_time_of_day(raw_start)
        .ok_or_else(|| ConfigError::InvalidWindow(span.to_string()))?;
    let mut end = parse_time_of_day(raw_end)
        .ok_or_else(|| ConfigError::InvalidWindow(span.to_string()))?;
    if end < start {
        end += DAY_SECONDS;
    }
    Ok(Window { start, end })
}

fn parse_time_of_day(raw: &str) -> Option<i64> {
    let time = NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()?;
    Some(i64::from(time.num_seconds_from_midnight()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window() {
        let window = parse_window("09:00-18:00").unwrap();
        assert_eq!(window.start, 9 * 3600);
        assert_eq!(window.end, 18 * 3600);
    }

    #[test]
    fn test_parse_window_wraps_midnight() {
        let window = parse_window("22:00-02:00").unwrap();
        assert_eq!(window.start, 22 * 3600);
        assert_eq!(window.end, 26 * 3600);
    }

    #[test]
    fn test_parse_window_rejects_garbage() {
        assert!(parse_window("09:00").is_err());
        assert!(parse_window("9am-5pm").is_err());
        assert!(parse_window("09:00-25:61").is_err());
    }

    #[test]
    fn test_compile_zone_config() {
        let raw: RawZoneConfig = serde_yaml::from_str(
            r#"
            whiteList:
              alpha: ["09:00-18:00"]
              bravo: ["22:00-02:00"]
            blackList: [charlie]
            availableZones: 1
            pauses:
              alpha: 10m
            "#,
        )
        .unwrap();
        let config = ZoneConfig::compile(raw).unwrap();

        assert_eq!(config.whitelist.len(), 2);
        assert!(config.blacklist.contains("charlie"));
        assert_eq!(config.available_zones, 1);
        assert_eq!(config.pause("alpha"), TimeDelta::minutes(10));
        assert_eq!(config.pause("bravo"), TimeDelta::zero());
    }

    #[test]
    fn test_compile_rejects_bad_pause() {
        let raw: RawZoneConfig = serde_yaml::from_str(
            r#"
            pauses:
              alpha: soon
            "#,
        )
        .unwrap();
        assert!(matches!(
            ZoneConfig::compile(raw),
            Err(ConfigError::InvalidPause { .. })
        ));
    }

    #[test]
    fn test_durations_from_yaml() {
        let durations: Durations = serde_yaml::from_str(
            r#"
            minAutoDuration: 10m
            minManualDuration: 5m
            maxNoncritDuration: 8h
            maxCritDuration: 24h
            deadlineDuration: 30d
            preferredManualStartMult: 1h
            preferredAutoStartMult: 0s
            "#,
        )
        .unwrap();
        assert_eq!(durations.min_auto_duration, Duration::from_secs(600));
        assert_eq!(
            durations.deadline_duration,
            Duration::from_secs(30 * 24 * 3600)
        );
        assert_eq!(
            durations.preferred_manual_start_mult,
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "whiteList:\n  alpha: [\"08:00-12:00\"]\n").unwrap();

        let config = ZoneConfig::load(&path).unwrap();
        assert_eq!(
            config.whitelist["alpha"],
            vec![Window {
                start: 8 * 3600,
                end: 12 * 3600
            }]
        );

        assert!(ZoneConfig::load(&dir.path().join("missing.yaml")).is_err());
    }
}
