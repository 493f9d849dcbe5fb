//! Parquet bar cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/index={INDEX}/interval={iv}/{year}.parquet`
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (column check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per series (hash, date range, bar count)

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::provider::{DataError, PriceSource};
use crate::domain::{Interval, PriceBar};

const COLUMNS: [&str; 7] = ["date", "time_secs", "open", "high", "low", "close", "points"];

/// Metadata sidecar for one cached (index, interval) series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub index: String,
    pub interval: Interval,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// The Parquet cache.
#[derive(Debug, Clone)]
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn series_dir(&self, index: &str, interval: Interval) -> PathBuf {
        self.cache_dir
            .join(format!("index={index}"))
            .join(format!("interval={interval}"))
    }

    fn year_path(&self, index: &str, interval: Interval, year: i32) -> PathBuf {
        self.series_dir(index, interval).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, index: &str, interval: Interval) -> PathBuf {
        self.series_dir(index, interval).join("meta.json")
    }

    /// Write one series to the cache, one Parquet file per year.
    ///
    /// Every bar must belong to `(index, interval)`. A year file is replaced
    /// whole, so callers pass the complete series for the years they touch.
    pub fn write(&self, index: &str, interval: Interval, bars: &[PriceBar]) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };
        if let Some(stray) = bars.iter().find(|b| b.index != index || b.interval != interval) {
            return Err(DataError::ValidationError(format!(
                "bar {} {} does not belong to series {index}/{interval}",
                stray.index, stray.date
            )));
        }

        let dir = self.series_dir(index, interval);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut by_year: BTreeMap<i32, Vec<&PriceBar>> = BTreeMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for (year, year_bars) in &by_year {
            let df = bars_to_dataframe(year_bars)?;
            let path = self.year_path(index, interval, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;

            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        let meta = CacheMeta {
            index: index.to_string(),
            interval,
            start_date: first.date.min(last.date),
            end_date: first.date.max(last.date),
            bar_count: bars.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(bars)
                    .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(index, interval), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(index, interval = %interval, bars = bars.len(), years = by_year.len(), "series cached");
        Ok(())
    }

    /// Load a cached series sorted by (date, time).
    pub fn load(&self, index: &str, interval: Interval) -> Result<Vec<PriceBar>, DataError> {
        let dir = self.series_dir(index, interval);
        if !dir.exists() {
            return Err(DataError::NoCachedData {
                index: index.to_string(),
                interval,
            });
        }

        let mut all_bars = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path, index, interval) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }

        if all_bars.is_empty() {
            return Err(DataError::NoCachedData {
                index: index.to_string(),
                interval,
            });
        }

        all_bars.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
        Ok(all_bars)
    }

    pub fn get_meta(&self, index: &str, interval: Interval) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(index, interval)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Whether the cached series spans `[start, end]`.
    pub fn covers_range(&self, index: &str, interval: Interval, start: NaiveDate, end: NaiveDate) -> bool {
        self.get_meta(index, interval)
            .is_some_and(|m| m.start_date <= start && m.end_date >= end)
    }
}

impl PriceSource for ParquetCache {
    /// A series that was never cached reads as empty.
    fn bars(&self, index: &str, interval: Interval) -> Result<Vec<PriceBar>, DataError> {
        match self.load(index, interval) {
            Err(DataError::NoCachedData { .. }) => Ok(Vec::new()),
            other => other,
        }
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn bars_to_dataframe(bars: &[&PriceBar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let times: Vec<Option<u32>> = bars
        .iter()
        .map(|b| b.time.map(|t| t.num_seconds_from_midnight()))
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let points: Vec<f64> = bars.iter().map(|b| b.points).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("time_secs".into(), times),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("points".into(), points),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path, index: &str, interval: Interval) -> Result<Vec<PriceBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for col_name in &COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_bars(&df, index, interval)
}

fn dataframe_to_bars(df: &DataFrame, index: &str, interval: Interval) -> Result<Vec<PriceBar>, DataError> {
    let col_err = |name: &str, e: PolarsError| DataError::ParquetError(format!("{name} column: {e}"));

    let date_ca = df
        .column("date")
        .and_then(|c| c.date())
        .map_err(|e| col_err("date", e))?;
    let time_ca = df
        .column("time_secs")
        .and_then(|c| c.u32())
        .map_err(|e| col_err("time_secs", e))?;
    let f64_col = |name: &'static str| df.column(name).and_then(|c| c.f64()).map_err(|e| col_err(name, e));
    let (open_ca, high_ca, low_ca, close_ca, points_ca) = (
        f64_col("open")?,
        f64_col("high")?,
        f64_col("low")?,
        f64_col("close")?,
        f64_col("points")?,
    );

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let date = epoch() + chrono::Duration::days(i64::from(date_days));
        let time = time_ca
            .get(i)
            .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0));

        bars.push(PriceBar {
            index: index.to_string(),
            interval,
            date,
            time,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            points: points_ca.get(i).unwrap_or(0.0),
        });
    }

    Ok(bars)
}
