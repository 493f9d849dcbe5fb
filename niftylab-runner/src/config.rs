//! Serializable pipeline configuration (`niftylab.toml`).
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration. Holidays must be quoted date strings:
//!
//! ```toml
//! [calendar]
//! holidays = ["2024-01-26", "2024-03-08"]
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use niftylab_core::calendar::TradingCalendar;
use niftylab_core::domain::Interval;
use niftylab_core::flow::normalizer::{DEFAULT_MIN_PERIODS, DEFAULT_WINDOW};
use niftylab_core::flow::{FlowNormalizer, RiskProfile};
use niftylab_core::snapshot::SnapshotRules;
use niftylab_core::sniper::SniperRules;
use niftylab_core::trap::TrapRules;

/// Content-addressable hash of a configuration.
pub type ConfigHash = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("invalid config: [{section}] {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

fn invalid(section: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        section,
        message: message.into(),
    }
}

/// `[flow]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub window: usize,
    pub min_periods: usize,
    pub risk_profile: RiskProfile,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            min_periods: DEFAULT_MIN_PERIODS,
            risk_profile: RiskProfile::Medium,
        }
    }
}

/// `[calendar]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub holidays: Vec<NaiveDate>,
}

/// `[data]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Dataset directory: prices.csv, flows.csv, news.csv, chains/.
    pub dir: PathBuf,
    pub store_path: PathBuf,
    /// The first index is the primary one: flows, traps, sniper levels and
    /// snapshots are computed against it.
    pub indices: Vec<String>,
    /// Intervals scanned for reversals.
    pub reversal_intervals: Vec<Interval>,
    /// Sub-interval used by the intraday report.
    pub intraday_interval: Interval,
    /// Calendar days covered by a sniper backfill.
    pub backfill_days: u32,
    /// Calendar days of slot history behind time-slot suggestions.
    pub pattern_days: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            store_path: PathBuf::from("data/signals.json"),
            indices: vec!["NIFTY".into(), "BANKNIFTY".into(), "SENSEX".into()],
            reversal_intervals: vec![Interval::Daily, Interval::Hourly, Interval::Min30],
            intraday_interval: Interval::Min5,
            backfill_days: 10,
            pattern_days: 40,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub flow: FlowConfig,
    pub sniper: SniperRules,
    pub trap: TrapRules,
    pub snapshot: SnapshotRules,
    pub calendar: CalendarConfig,
    pub data: DataConfig,
}

impl PipelineConfig {
    /// Parse and validate TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Read `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let flow = &self.flow;
        if flow.window < 2 {
            return Err(invalid("flow", "window must be >= 2"));
        }
        if flow.min_periods < 2 || flow.min_periods > flow.window {
            return Err(invalid("flow", "min_periods must be in 2..=window"));
        }

        let sniper = &self.sniper;
        if sniper.strike_step <= 0 {
            return Err(invalid("sniper", "strike_step must be > 0"));
        }
        if sniper.wing_offset <= 0 || sniper.wing_offset % sniper.strike_step != 0 {
            return Err(invalid("sniper", "wing_offset must be a positive multiple of strike_step"));
        }
        if !(sniper.default_sniper.is_finite() && sniper.default_sniper > 0.0) {
            return Err(invalid("sniper", "default_sniper must be a positive number"));
        }

        let trap = &self.trap;
        for (name, pct) in [("drop_pct", trap.drop_pct), ("rise_pct", trap.rise_pct)] {
            if !(pct > 0.0 && pct < 1.0) {
                return Err(invalid("trap", format!("{name} must be in (0, 1)")));
            }
        }
        if !(-1.0..=1.0).contains(&trap.news_impact_min) {
            return Err(invalid("trap", "news_impact_min must be in [-1, 1]"));
        }

        let snap = &self.snapshot;
        if snap.interval_minutes == 0 {
            return Err(invalid("snapshot", "interval_minutes must be > 0"));
        }
        if snap.focus_range < 0 || snap.strike_step <= 0 {
            return Err(invalid("snapshot", "focus_range must be >= 0 and strike_step > 0"));
        }

        let data = &self.data;
        if data.indices.is_empty() {
            return Err(invalid("data", "at least one index is required"));
        }
        let mut seen = HashSet::new();
        for idx in &data.indices {
            if idx.trim().is_empty() {
                return Err(invalid("data", "index names must not be empty"));
            }
            if !seen.insert(idx.as_str()) {
                return Err(invalid("data", format!("duplicate index '{idx}'")));
            }
        }
        if !data.intraday_interval.is_intraday() {
            return Err(invalid("data", "intraday_interval must be a sub-daily interval"));
        }
        Ok(())
    }

    /// The index that flows, traps, sniper levels and snapshots are computed for.
    pub fn primary_index(&self) -> &str {
        self.data.indices.first().map_or("NIFTY", String::as_str)
    }

    pub fn calendar(&self) -> TradingCalendar {
        TradingCalendar::new(self.calendar.holidays.iter().copied())
    }

    pub fn normalizer(&self) -> FlowNormalizer {
        FlowNormalizer::new(self.flow.window, self.flow.min_periods)
    }

    /// Deterministic hash of the effective configuration.
    pub fn fingerprint(&self) -> Result<ConfigHash, ConfigError> {
        let json = serde_json::to_vec(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}
