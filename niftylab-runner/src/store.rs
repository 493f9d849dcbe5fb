//! Signal store: the persistence adapter behind the pure engines.
//!
//! Engines return value objects; this module owns every write:
//! - flow analyses, quick reconciliations and traps are upserted by date
//! - a sniper level and its trades are replaced together (`replace_sniper`)
//! - snapshots are append-only
//! - reversal events are inserted only when their key is new
//!
//! Each store serializes its writes behind a mutex. [`JsonFileStore`] applies
//! a mutation to a copy, persists the copy atomically (.tmp then rename) and
//! only then swaps it in, so a failed write leaves both disk and memory at the
//! previous state.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use niftylab_core::flow::{FlowAnalysis, QuickReconciliation};
use niftylab_core::reversal::{ReversalEvent, ReversalKey};
use niftylab_core::snapshot::MarketSnapshot;
use niftylab_core::sniper::{SniperLevel, SniperSetup, SniperTrade};
use niftylab_core::trap::TrapResult;

/// Current schema version of the persisted store.
pub const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported store schema version {found} (max supported: {STORE_SCHEMA_VERSION})")]
    SchemaVersion { found: u32 },
    #[error("store lock poisoned")]
    Poisoned,
}

fn default_schema_version() -> u32 {
    STORE_SCHEMA_VERSION
}

/// Everything the store holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub flow_analyses: BTreeMap<NaiveDate, FlowAnalysis>,
    #[serde(default)]
    pub quick_reconciliations: BTreeMap<NaiveDate, QuickReconciliation>,
    #[serde(default)]
    pub traps: BTreeMap<NaiveDate, TrapResult>,
    #[serde(default)]
    pub sniper_levels: BTreeMap<NaiveDate, SniperLevel>,
    #[serde(default)]
    pub sniper_trades: BTreeMap<NaiveDate, Vec<SniperTrade>>,
    #[serde(default)]
    pub snapshots: Vec<MarketSnapshot>,
    #[serde(default)]
    pub reversals: Vec<ReversalEvent>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            schema_version: STORE_SCHEMA_VERSION,
            flow_analyses: BTreeMap::new(),
            quick_reconciliations: BTreeMap::new(),
            traps: BTreeMap::new(),
            sniper_levels: BTreeMap::new(),
            sniper_trades: BTreeMap::new(),
            snapshots: Vec::new(),
            reversals: Vec::new(),
        }
    }
}

impl StoreData {
    /// Latest snapshot strictly before `timestamp`.
    pub fn latest_snapshot_before(&self, timestamp: NaiveDateTime) -> Option<&MarketSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.timestamp < timestamp)
            .max_by_key(|s| s.timestamp)
    }

    /// Latest snapshot captured on `date`.
    pub fn latest_snapshot_on(&self, date: NaiveDate) -> Option<&MarketSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.date == date)
            .max_by_key(|s| s.timestamp)
    }

    pub fn reversals_for(&self, index: &str) -> Vec<&ReversalEvent> {
        let mut out: Vec<&ReversalEvent> = self.reversals.iter().filter(|e| e.index == index).collect();
        out.sort_by(|a, b| a.key().cmp(&b.key()));
        out
    }

    pub fn sniper(&self, date: NaiveDate) -> Option<SniperSetup> {
        self.sniper_levels.get(&date).map(|level| SniperSetup {
            level: level.clone(),
            trades: self.sniper_trades.get(&date).cloned().unwrap_or_default(),
        })
    }
}

/// Persistence adapter for computed signals.
///
/// Implementors provide serialized access to a [`StoreData`]; every write
/// operation is a provided method built on [`SignalStore::mutate`], which must
/// apply the closure atomically.
pub trait SignalStore: Send + Sync {
    /// Apply `f` to the store as one all-or-nothing write.
    fn mutate(&self, f: &mut dyn FnMut(&mut StoreData)) -> Result<(), StoreError>;

    /// Read-only access under the store lock.
    fn view(&self, f: &mut dyn FnMut(&StoreData)) -> Result<(), StoreError>;

    /// Owned copy of the whole store.
    fn load_all(&self) -> Result<StoreData, StoreError> {
        let mut out = StoreData::default();
        self.view(&mut |data| out = data.clone())?;
        Ok(out)
    }

    fn upsert_flow_analyses(&self, rows: &[FlowAnalysis]) -> Result<usize, StoreError> {
        self.mutate(&mut |data| {
            for row in rows {
                data.flow_analyses.insert(row.date(), row.clone());
            }
        })?;
        Ok(rows.len())
    }

    fn upsert_quick_reconciliations(&self, rows: &[QuickReconciliation]) -> Result<usize, StoreError> {
        self.mutate(&mut |data| {
            for row in rows {
                data.quick_reconciliations.insert(row.date, row.clone());
            }
        })?;
        Ok(rows.len())
    }

    /// One trap row per date; a later result for the same date wins.
    fn upsert_traps(&self, rows: &[TrapResult]) -> Result<usize, StoreError> {
        self.mutate(&mut |data| {
            for row in rows {
                data.traps.insert(row.date, row.clone());
            }
        })?;
        Ok(rows.len())
    }

    /// Upsert the level and replace the date's trade set in one write.
    /// Afterwards the date holds exactly `setup.trades`.
    fn replace_sniper(&self, setup: &SniperSetup) -> Result<(), StoreError> {
        let date = setup.level.date;
        self.mutate(&mut |data| {
            data.sniper_levels.insert(date, setup.level.clone());
            data.sniper_trades.insert(date, setup.trades.clone());
        })
    }

    fn append_snapshot(&self, snapshot: &MarketSnapshot) -> Result<(), StoreError> {
        self.mutate(&mut |data| data.snapshots.push(snapshot.clone()))
    }

    /// Insert events whose key is not stored yet. Returns how many were new.
    fn insert_reversals(&self, events: &[ReversalEvent]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        self.mutate(&mut |data| {
            inserted = 0;
            let mut keys: HashSet<ReversalKey> = data.reversals.iter().map(ReversalEvent::key).collect();
            for event in events {
                if keys.insert(event.key()) {
                    data.reversals.push(event.clone());
                    inserted += 1;
                }
            }
        })?;
        Ok(inserted)
    }

    fn latest_snapshot_before(&self, timestamp: NaiveDateTime) -> Result<Option<MarketSnapshot>, StoreError> {
        let mut out = None;
        self.view(&mut |data| out = data.latest_snapshot_before(timestamp).cloned())?;
        Ok(out)
    }

    fn sniper_level(&self, date: NaiveDate) -> Result<Option<SniperLevel>, StoreError> {
        let mut out = None;
        self.view(&mut |data| out = data.sniper_levels.get(&date).cloned())?;
        Ok(out)
    }
}

/// In-memory store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalStore for MemoryStore {
    fn mutate(&self, f: &mut dyn FnMut(&mut StoreData)) -> Result<(), StoreError> {
        let mut guard = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut guard);
        Ok(())
    }

    fn view(&self, f: &mut dyn FnMut(&StoreData)) -> Result<(), StoreError> {
        let guard = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        f(&guard);
        Ok(())
    }
}

/// Store persisted as one pretty-printed JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let data: StoreData = serde_json::from_str(&content)?;
            if data.schema_version > STORE_SCHEMA_VERSION {
                return Err(StoreError::SchemaVersion {
                    found: data.schema_version,
                });
            }
            data
        } else {
            StoreData::default()
        };
        debug!(path = %path.display(), "signal store opened");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            io_err(source)
        })
    }
}

impl SignalStore for JsonFileStore {
    fn mutate(&self, f: &mut dyn FnMut(&mut StoreData)) -> Result<(), StoreError> {
        let mut guard = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = guard.clone();
        f(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn view(&self, f: &mut dyn FnMut(&StoreData)) -> Result<(), StoreError> {
        let guard = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        f(&guard);
        Ok(())
    }
}
