//! Data source traits and structured error types.
//!
//! Engines never talk to a feed directly. Every market input comes through
//! one of the source traits below so a pipeline can run against CSV dumps,
//! a Parquet cache or an in-memory fixture without changes.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{FlowRecord, Interval, NewsItem, OptionChain, PriceBar};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv ingest error: {0}")]
    Csv(String),

    #[error("chain payload error: {0}")]
    ChainPayload(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for '{index}' at {interval}")]
    NoCachedData { index: String, interval: Interval },

    #[error("chain unavailable for '{index}': {reason}")]
    ChainUnavailable { index: String, reason: String },
}

/// Ordered price bars for one index and interval.
pub trait PriceSource: Send + Sync {
    fn bars(&self, index: &str, interval: Interval) -> Result<Vec<PriceBar>, DataError>;
}

/// Daily FII/DII flow records.
pub trait FlowSource: Send + Sync {
    fn flows(&self) -> Result<Vec<FlowRecord>, DataError>;
}

/// Options-chain snapshots, together with the raw payload they were parsed from.
pub trait ChainSource: Send + Sync {
    /// Chain for `index` as of `date`. `Ok(None)` means no chain was captured.
    fn chain(&self, index: &str, date: NaiveDate) -> Result<Option<ChainPayload>, DataError>;
}

/// Scored news headlines.
pub trait NewsSource: Send + Sync {
    fn news(&self) -> Result<Vec<NewsItem>, DataError>;
}

/// A parsed chain plus the exact bytes it came from (hashed into snapshots).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainPayload {
    pub chain: OptionChain,
    pub raw: Vec<u8>,
}

/// In-memory implementation of every source trait.
///
/// Chains are keyed by (index, date). A lookup for a date with no chain
/// falls back to the latest chain captured on or before that date.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bars: Vec<PriceBar>,
    flows: Vec<FlowRecord>,
    news: Vec<NewsItem>,
    chains: BTreeMap<(String, NaiveDate), ChainPayload>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, bars: impl IntoIterator<Item = PriceBar>) -> Self {
        self.bars.extend(bars);
        self
    }

    pub fn with_flows(mut self, flows: impl IntoIterator<Item = FlowRecord>) -> Self {
        self.flows.extend(flows);
        self
    }

    pub fn with_news(mut self, news: impl IntoIterator<Item = NewsItem>) -> Self {
        self.news.extend(news);
        self
    }

    pub fn insert_chain(&mut self, index: &str, date: NaiveDate, payload: ChainPayload) {
        self.chains.insert((index.to_string(), date), payload);
    }

    pub fn with_chain(mut self, index: &str, date: NaiveDate, payload: ChainPayload) -> Self {
        self.insert_chain(index, date, payload);
        self
    }

    /// Distinct index ids that have at least one bar, sorted.
    pub fn indices(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.bars.iter().map(|b| b.index.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }
}

impl PriceSource for MemorySource {
    fn bars(&self, index: &str, interval: Interval) -> Result<Vec<PriceBar>, DataError> {
        let mut out: Vec<PriceBar> = self
            .bars
            .iter()
            .filter(|b| b.index == index && b.interval == interval)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
        Ok(out)
    }
}

impl FlowSource for MemorySource {
    fn flows(&self) -> Result<Vec<FlowRecord>, DataError> {
        let mut out = self.flows.clone();
        out.sort_by_key(|f| f.date);
        Ok(out)
    }
}

impl ChainSource for MemorySource {
    fn chain(&self, index: &str, date: NaiveDate) -> Result<Option<ChainPayload>, DataError> {
        let found = self
            .chains
            .range((index.to_string(), NaiveDate::MIN)..=(index.to_string(), date))
            .next_back()
            .map(|(_, payload)| payload.clone());
        Ok(found)
    }
}

impl NewsSource for MemorySource {
    fn news(&self) -> Result<Vec<NewsItem>, DataError> {
        Ok(self.news.clone())
    }
}
