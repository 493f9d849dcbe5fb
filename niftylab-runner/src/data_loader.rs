//! Dataset loading for the runner.
//!
//! A dataset directory holds any of:
//! - `prices.csv`, `flows.csv`, `news.csv`
//! - `chains/{INDEX}_{YYYY-MM-DD}.json` exchange option-chain payloads
//! - `cache/` the Parquet bar cache
//!
//! Price resolution policy:
//! 1. If `prices.csv` exists → ingest it
//! 2. Otherwise → read every cached (index, interval) series
//! 3. Neither → an empty price set (engines degrade to neutral results)
//!
//! Everything lands in one [`MemorySource`] plus a BLAKE3 dataset hash.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use niftylab_core::data::{
    load_chain_file, CacheMeta, DataError, DataIngestor, MemorySource, ParquetCache,
};
use niftylab_core::domain::{FlowRecord, Interval, NewsItem, PriceBar};

pub const PRICES_FILE: &str = "prices.csv";
pub const FLOWS_FILE: &str = "flows.csv";
pub const NEWS_FILE: &str = "news.csv";
pub const CHAINS_DIR: &str = "chains";
pub const CACHE_DIR: &str = "cache";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("dataset directory not found: {0}")]
    MissingDir(PathBuf),

    #[error("no prices to cache in {0}")]
    NothingToCache(PathBuf),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Where the price bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceOrigin {
    Csv,
    Cache,
    None,
}

/// A loaded dataset with provenance.
#[derive(Debug)]
pub struct LoadedDataset {
    pub source: MemorySource,
    pub price_origin: PriceOrigin,
    /// BLAKE3 over bars, flows, news and raw chain bytes.
    pub dataset_hash: String,
    pub flow_count: usize,
    pub news_count: usize,
    /// Chain files that could not be used.
    pub skipped_chains: Vec<PathBuf>,
}

impl LoadedDataset {
    pub fn bar_count(&self) -> usize {
        self.source.bar_count()
    }

    pub fn chain_count(&self) -> usize {
        self.source.chain_count()
    }
}

/// Load everything under `dir`.
pub fn load_dataset(dir: &Path) -> Result<LoadedDataset, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::MissingDir(dir.to_path_buf()));
    }
    let ingestor = DataIngestor::new();

    let prices_path = dir.join(PRICES_FILE);
    let (bars, price_origin) = if prices_path.exists() {
        (ingestor.load_prices(&prices_path)?, PriceOrigin::Csv)
    } else {
        let cached = load_cached_bars(&ParquetCache::new(dir.join(CACHE_DIR)))?;
        if cached.is_empty() {
            warn!(dir = %dir.display(), "no prices.csv and no cached bars");
            (cached, PriceOrigin::None)
        } else {
            (cached, PriceOrigin::Cache)
        }
    };

    let flows_path = dir.join(FLOWS_FILE);
    let flows = if flows_path.exists() {
        ingestor.load_flows(&flows_path)?
    } else {
        Vec::new()
    };

    let news_path = dir.join(NEWS_FILE);
    let news = if news_path.exists() {
        ingestor.load_news(&news_path)?
    } else {
        Vec::new()
    };

    let dataset_hash = compute_dataset_hash(&bars, &flows, &news);
    let flow_count = flows.len();
    let news_count = news.len();
    let mut source = MemorySource::new()
        .with_bars(bars)
        .with_flows(flows)
        .with_news(news);

    let mut skipped_chains = Vec::new();
    let mut chain_hasher = blake3::Hasher::new();
    chain_hasher.update(dataset_hash.as_bytes());
    for (path, index, date) in chain_files(&dir.join(CHAINS_DIR))? {
        match load_chain_file(&path) {
            Ok(payload) => {
                chain_hasher.update(&payload.raw);
                source.insert_chain(&index, date, payload);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "chain file skipped");
                skipped_chains.push(path);
            }
        }
    }

    let loaded = LoadedDataset {
        source,
        price_origin,
        dataset_hash: chain_hasher.finalize().to_hex().to_string(),
        flow_count,
        news_count,
        skipped_chains,
    };
    info!(
        dir = %dir.display(),
        origin = ?loaded.price_origin,
        bars = loaded.bar_count(),
        flows = loaded.flow_count,
        news = loaded.news_count,
        chains = loaded.chain_count(),
        "dataset loaded"
    );
    Ok(loaded)
}

/// Every series in the cache, for every index found on disk.
fn load_cached_bars(cache: &ParquetCache) -> Result<Vec<PriceBar>, DataError> {
    let root = cache.cache_dir();
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(root).map_err(|source| DataError::Io {
        path: root.display().to_string(),
        source,
    })?;

    let mut indices: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|e| {
            e.file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("index="))
                .map(str::to_string)
        })
        .collect();
    indices.sort();

    let mut bars = Vec::new();
    for index in &indices {
        for interval in Interval::ALL {
            match cache.load(index, interval) {
                Ok(series) => bars.extend(series),
                Err(DataError::NoCachedData { .. }) => {}
                Err(e) => return Err(e),
            }
        }
    }
    debug!(indices = indices.len(), bars = bars.len(), "cached bars loaded");
    Ok(bars)
}

/// Chain files named `{INDEX}_{YYYY-MM-DD}.json`, sorted by name. Other
/// files are ignored.
fn chain_files(dir: &Path) -> Result<Vec<(PathBuf, String, NaiveDate)>, DataError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|source| DataError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut out: Vec<(PathBuf, String, NaiveDate)> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter_map(|path| {
            let stem = path
                .extension()
                .filter(|ext| *ext == "json")
                .and(path.file_stem())?
                .to_str()?;
            let (index, date) = stem.rsplit_once('_')?;
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            if index.is_empty() {
                return None;
            }
            let index = index.to_string();
            Some((path, index, date))
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

/// Deterministic BLAKE3 hash over the loaded series.
fn compute_dataset_hash(bars: &[PriceBar], flows: &[FlowRecord], news: &[NewsItem]) -> String {
    let mut hasher = blake3::Hasher::new();

    let mut sorted: Vec<&PriceBar> = bars.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.index, a.interval, a.date, a.time).cmp(&(&b.index, b.interval, b.date, b.time))
    });
    for bar in sorted {
        hasher.update(bar.index.as_bytes());
        hasher.update(bar.interval.as_str().as_bytes());
        hasher.update(bar.date.to_string().as_bytes());
        if let Some(t) = bar.time {
            hasher.update(t.to_string().as_bytes());
        }
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
    }
    for rec in flows {
        hasher.update(rec.date.to_string().as_bytes());
        hasher.update(&rec.fii_net.to_le_bytes());
        hasher.update(&rec.dii_net.to_le_bytes());
    }
    for item in news {
        hasher.update(item.title.as_bytes());
        hasher.update(item.published_at.to_string().as_bytes());
        hasher.update(&item.impact_score.to_le_bytes());
    }

    hasher.finalize().to_hex().to_string()
}

/// Ingest `prices.csv` under `dir` into the Parquet cache, one series per
/// (index, interval).
pub fn ingest_to_cache(dir: &Path) -> Result<Vec<CacheMeta>, LoadError> {
    let prices_path = dir.join(PRICES_FILE);
    if !prices_path.exists() {
        return Err(LoadError::NothingToCache(dir.to_path_buf()));
    }
    let bars = DataIngestor::new().load_prices(&prices_path)?;
    if bars.is_empty() {
        return Err(LoadError::NothingToCache(dir.to_path_buf()));
    }

    let mut series: BTreeMap<(String, Interval), Vec<PriceBar>> = BTreeMap::new();
    for bar in bars {
        series.entry((bar.index.clone(), bar.interval)).or_default().push(bar);
    }

    let cache = ParquetCache::new(dir.join(CACHE_DIR));
    let mut metas = Vec::with_capacity(series.len());
    for ((index, interval), bars) in &series {
        cache.write(index, *interval, bars)?;
        if let Some(meta) = cache.get_meta(index, *interval) {
            metas.push(meta);
        }
    }
    info!(dir = %dir.display(), series = metas.len(), "prices cached");
    Ok(metas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use niftylab_core::data::{ChainSource, FlowSource, PriceSource};

    const PRICES: &str = "index,interval,date,time,open,high,low,close\n\
NIFTY,1d,2024-03-04,,21900,21980,21880,21950\n\
NIFTY,1d,2024-03-05,,21950,22040,21930,22010\n\
NIFTY,5m,2024-03-05,09:15,21950,21970,21940,21960\n\
NIFTY,5m,2024-03-05,09:20,21960,21990,21955,21985\n";

    const FLOWS: &str = "date,fii_buy,fii_sell,fii_net,dii_buy,dii_sell,dii_net\n\
2024-03-04,1000,800,200,900,950,-50\n\
2024-03-05,,,350,,,120\n";

    const CHAIN: &str = r#"{"records": {"underlyingValue": 22010.0, "expiryDates": ["28-Mar-2024"],
        "data": [{"strikePrice": 22000, "CE": {"lastPrice": 80.0}, "PE": {"lastPrice": 60.0}}]}}"#;

    fn write_dataset(dir: &Path) {
        fs::write(dir.join(PRICES_FILE), PRICES).unwrap();
        fs::write(dir.join(FLOWS_FILE), FLOWS).unwrap();
        fs::create_dir_all(dir.join(CHAINS_DIR)).unwrap();
        fs::write(dir.join(CHAINS_DIR).join("NIFTY_2024-03-05.json"), CHAIN).unwrap();
        fs::write(dir.join(CHAINS_DIR).join("NIFTY_2024-03-04.json"), "not json").unwrap();
        fs::write(dir.join(CHAINS_DIR).join("README.txt"), "ignored").unwrap();
    }

    #[test]
    fn loads_csv_and_chains() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());

        let loaded = load_dataset(dir.path()).unwrap();
        assert_eq!(loaded.price_origin, PriceOrigin::Csv);
        assert_eq!(loaded.bar_count(), 4);
        assert_eq!(loaded.flow_count, 2);
        assert_eq!(loaded.chain_count(), 1);
        assert_eq!(loaded.skipped_chains.len(), 1);

        let daily = loaded.source.bars("NIFTY", Interval::Daily).unwrap();
        assert_eq!(daily[1].points, 60.0);
        assert_eq!(loaded.source.flows().unwrap()[1].fii_buy, 0.0);
        let d5 = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(loaded.source.chain("NIFTY", d5).unwrap().is_some());
    }

    #[test]
    fn dataset_hash_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        let a = load_dataset(dir.path()).unwrap().dataset_hash;
        let b = load_dataset(dir.path()).unwrap().dataset_hash;
        assert_eq!(a, b);

        fs::write(dir.path().join(NEWS_FILE), "title,published_at,impact_score\nRBI holds,2024-03-05 09:00:00,0.6\n").unwrap();
        assert_ne!(load_dataset(dir.path()).unwrap().dataset_hash, a);
    }

    #[test]
    fn cache_fallback_after_ingest() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        let metas = ingest_to_cache(dir.path()).unwrap();
        assert_eq!(metas.len(), 2);

        fs::remove_file(dir.path().join(PRICES_FILE)).unwrap();
        let loaded = load_dataset(dir.path()).unwrap();
        assert_eq!(loaded.price_origin, PriceOrigin::Cache);
        assert_eq!(loaded.bar_count(), 4);
    }

    #[test]
    fn empty_dir_loads_nothing_and_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_dataset(dir.path()).unwrap();
        assert_eq!(loaded.price_origin, PriceOrigin::None);
        assert_eq!(loaded.bar_count(), 0);

        assert!(matches!(
            load_dataset(&dir.path().join("nope")),
            Err(LoadError::MissingDir(_))
        ));
        assert!(matches!(
            ingest_to_cache(dir.path()),
            Err(LoadError::NothingToCache(_))
        ));
    }
}
