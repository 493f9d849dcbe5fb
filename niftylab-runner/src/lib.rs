//! NiftyLab Runner: configuration, signal store, pipeline orchestration, exports.
//!
//! This crate builds on `niftylab-core` to provide:
//! - `niftylab.toml` configuration with validation and fingerprinting
//! - Dataset loading from CSV, chain JSON files and the Parquet cache
//! - The signal store (in-memory or JSON file) behind every write
//! - The pipeline stages that run each engine and persist its output
//! - CSV, JSON and Markdown exports

pub mod config;
pub mod data_loader;
pub mod export;
pub mod pipeline;
pub mod store;

pub use config::{ConfigError, ConfigHash, PipelineConfig};
pub use data_loader::{ingest_to_cache, load_dataset, LoadError, LoadedDataset, PriceOrigin};
pub use export::{generate_report, write_exports};
pub use pipeline::{
    BackfillReport, FlowRunReport, IntradayReport, Pipeline, PipelineError, ReversalDashboard,
    ReversalRunReport, RunAllReport, Sources, TrapRunReport,
};
pub use store::{JsonFileStore, MemoryStore, SignalStore, StoreData, StoreError, STORE_SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn stores_are_send_sync() {
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
        assert_send::<JsonFileStore>();
        assert_sync::<JsonFileStore>();
    }

    #[test]
    fn loaded_dataset_is_send_sync() {
        assert_send::<LoadedDataset>();
        assert_sync::<LoadedDataset>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<RunAllReport>();
        assert_sync::<RunAllReport>();
        assert_send::<IntradayReport>();
        assert_sync::<IntradayReport>();
        assert_send::<ReversalDashboard>();
        assert_sync::<ReversalDashboard>();
    }

    #[test]
    fn pipeline_is_sync() {
        assert_sync::<Pipeline<'static>>();
    }
}
