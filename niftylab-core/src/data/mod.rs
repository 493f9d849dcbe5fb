//! Data sources, CSV ingest, chain payloads and the Parquet bar cache.

pub mod cache;
pub mod chain_json;
pub mod ingest;
pub mod provider;
pub mod schema;

pub use cache::{CacheMeta, ParquetCache};
pub use chain_json::{load_chain_file, parse_chain};
pub use ingest::{finish_points, parse_date, DataIngestor};
pub use provider::{
    ChainPayload, ChainSource, DataError, FlowSource, MemorySource, NewsSource, PriceSource,
};
pub use schema::{FlowSchema, NewsSchema, PriceSchema, SchemaError};
