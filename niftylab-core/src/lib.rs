//! NiftyLab Core: domain types, data sources and the signal analytics engines.
//!
//! Every engine here is a pure function of its ordered inputs:
//! - Flow normalization, reconciliation and trade ideas (`flow`)
//! - Price-level and chain-level trap detection (`trap`)
//! - Sniper bands, trade plans and breakout actions (`sniper`)
//! - Streak reversals, pivots and confluence (`reversal`)
//! - Options-chain snapshots (`snapshot`) and intraday slot analytics (`intraday`)
//!
//! Persistence and orchestration live in `niftylab-runner`.

pub mod calendar;
pub mod data;
pub mod domain;
pub mod flow;
pub mod intraday;
pub mod math;
pub mod reversal;
pub mod snapshot;
pub mod sniper;
pub mod trap;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: value objects and sources cross thread boundaries,
    /// which the runner relies on when it fans indices out over rayon.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::PriceBar>();
        require_sync::<domain::PriceBar>();
        require_send::<domain::FlowRecord>();
        require_sync::<domain::FlowRecord>();
        require_send::<domain::OptionChain>();
        require_sync::<domain::OptionChain>();
        require_send::<domain::NewsItem>();
        require_sync::<domain::NewsItem>();
        require_send::<domain::ChainHash>();
        require_sync::<domain::ChainHash>();

        // Engine outputs
        require_send::<flow::FlowScore>();
        require_sync::<flow::FlowScore>();
        require_send::<flow::FlowAnalysis>();
        require_sync::<flow::FlowAnalysis>();
        require_send::<trap::TrapResult>();
        require_sync::<trap::TrapResult>();
        require_send::<sniper::SniperSetup>();
        require_sync::<sniper::SniperSetup>();
        require_send::<snapshot::MarketSnapshot>();
        require_sync::<snapshot::MarketSnapshot>();
        require_send::<reversal::ReversalEvent>();
        require_sync::<reversal::ReversalEvent>();

        // Sources
        require_send::<data::MemorySource>();
        require_sync::<data::MemorySource>();
        require_send::<data::ParquetCache>();
        require_sync::<data::ParquetCache>();
        require_send::<calendar::TradingCalendar>();
        require_sync::<calendar::TradingCalendar>();
    }

    /// Sources are usable as trait objects, so a pipeline can mix a cache
    /// for prices with in-memory flows.
    #[test]
    fn sources_are_object_safe() {
        let mem = data::MemorySource::new();
        let prices: &dyn data::PriceSource = &mem;
        let flows: &dyn data::FlowSource = &mem;
        let chains: &dyn data::ChainSource = &mem;
        let news: &dyn data::NewsSource = &mem;
        assert!(prices.bars("NIFTY", domain::Interval::Daily).unwrap().is_empty());
        assert!(flows.flows().unwrap().is_empty());
        assert!(chains
            .chain("NIFTY", chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
            .unwrap()
            .is_none());
        assert!(news.news().unwrap().is_empty());
    }
}
