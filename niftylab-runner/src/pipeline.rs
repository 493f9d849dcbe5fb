//! Pipeline: wires sources, engines and the signal store together.
//!
//! Each stage reads from the sources, runs one pure engine, and hands the
//! resulting value objects to the store:
//! - `run_flows()`: normalization + reconciliation, plus the quick per-record check
//! - `run_traps()`: price-level traps over a date range
//! - `run_sniper()` / `backfill_sniper()`: bands and trade sets per session
//! - `capture_snapshot()`: one options-chain capture against the prior one
//! - `run_reversals()`: every configured (index, interval) series, in parallel
//!
//! Flows, traps, sniper levels and snapshots use the primary index. Source
//! failures are logged and treated as missing data: a failing price series
//! yields no bars, a failing chain fetch yields no chain. Only store errors
//! abort a stage.

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

use niftylab_core::data::{ChainPayload, ChainSource, FlowSource, NewsSource, PriceSource};
use niftylab_core::domain::{Decision, FlowRecord, Interval, NewsItem, PriceBar};
use niftylab_core::flow::{quick_reconcile, reconcile_flows, FlowAnalysis};
use niftylab_core::intraday::{
    analyze_time_patterns, annotate_intraday_traps, build_narrative, build_trade_plan, lot_size,
    probability_score, recap_lines, recent_trend_warning, time_based_suggestions,
    trend_from_flows, FlowTrend, IntradayTrap, SlotSuggestion, TradePlan,
};
use niftylab_core::reversal::{
    confluence, daily_pivot, detect_reversals, hourly_pivot, summarize, weekly_pivot, Confluence,
    PivotLevels, ReversalEvent, ReversalSummary,
};
use niftylab_core::snapshot::{build_snapshot, MarketSnapshot, SnapshotInput};
use niftylab_core::sniper::{compute_sniper, SniperSetup};
use niftylab_core::trap::{detect_price_traps, DateRange};

use crate::config::{ConfigError, PipelineConfig};
use crate::store::{SignalStore, StoreError};

/// Slots listed in an intraday report.
pub const TOP_SLOTS: usize = 5;
/// Daily bars inspected by the recent-trend warning.
pub const TREND_LOOKBACK: usize = 5;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// The collaborators a pipeline reads from.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub prices: &'a dyn PriceSource,
    pub flows: &'a dyn FlowSource,
    pub chains: &'a dyn ChainSource,
    pub news: &'a dyn NewsSource,
}

impl<'a> Sources<'a> {
    /// All four roles served by one source.
    pub fn single<S>(source: &'a S) -> Self
    where
        S: PriceSource + FlowSource + ChainSource + NewsSource,
    {
        Self {
            prices: source,
            flows: source,
            chains: source,
            news: source,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRunReport {
    pub analyses: usize,
    pub quick: usize,
    /// Records with no same-date daily bar.
    pub unmatched_dates: usize,
    pub latest: Option<FlowAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrapRunReport {
    pub evaluated: usize,
    pub detected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub sessions: usize,
    pub computed: Vec<NaiveDate>,
    /// Sessions without a daily bar or a chain.
    pub skipped: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesScan {
    pub index: String,
    pub interval: Interval,
    pub bars: usize,
    pub detected: usize,
    /// Set when the price fetch failed and the series was scanned as empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReversalRunReport {
    pub series: Vec<SeriesScan>,
    pub detected: usize,
    /// Events whose key was new to the store.
    pub inserted: usize,
}

/// Reversal view of one index: stored events, pivots and their confluence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalDashboard {
    pub index: String,
    pub summary: ReversalSummary,
    pub latest: Option<ReversalEvent>,
    pub daily_pivot: Option<PivotLevels>,
    pub weekly_pivot: Option<PivotLevels>,
    pub hourly_pivot: Option<PivotLevels>,
    pub confluence: Confluence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayReport {
    pub index: String,
    pub date: NaiveDate,
    pub interval: Interval,
    pub pcr: Option<f64>,
    pub decision: Decision,
    pub traps: Vec<IntradayTrap>,
    pub suggestions: Vec<SlotSuggestion>,
    pub warning: Option<String>,
    pub probability: u8,
    pub recap: Vec<String>,
    pub narrative: String,
    /// `None` without a same-date flow record.
    pub flow_trend: Option<FlowTrend>,
    /// `None` without a same-date daily bar.
    pub trade_plan: Option<TradePlan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunAllReport {
    pub flows: FlowRunReport,
    pub traps: TrapRunReport,
    pub sniper: Option<SniperSetup>,
    pub snapshot: Option<MarketSnapshot>,
    pub reversals: ReversalRunReport,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    sources: Sources<'a>,
    store: &'a dyn SignalStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, sources: Sources<'a>, store: &'a dyn SignalStore) -> Self {
        Self {
            config,
            sources,
            store,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config
    }

    fn try_bars(&self, index: &str, interval: Interval) -> Result<Vec<PriceBar>, String> {
        self.sources.prices.bars(index, interval).map_err(|e| {
            warn!(index, %interval, error = %e, "price fetch failed; treating as missing");
            e.to_string()
        })
    }

    fn bars(&self, index: &str, interval: Interval) -> Vec<PriceBar> {
        self.try_bars(index, interval).unwrap_or_default()
    }

    fn daily_bars(&self, index: &str) -> Vec<PriceBar> {
        self.bars(index, Interval::Daily)
    }

    fn flow_records(&self) -> Vec<FlowRecord> {
        self.sources.flows.flows().unwrap_or_else(|e| {
            warn!(error = %e, "flow fetch failed; treating as missing");
            Vec::new()
        })
    }

    fn news_items(&self) -> Vec<NewsItem> {
        self.sources.news.news().unwrap_or_else(|e| {
            warn!(error = %e, "news fetch failed; treating as missing");
            Vec::new()
        })
    }

    fn fetch_chain(&self, index: &str, date: NaiveDate) -> Option<ChainPayload> {
        match self.sources.chains.chain(index, date) {
            Ok(payload) => payload.filter(|p| !p.chain.is_empty()),
            Err(e) => {
                warn!(index, %date, error = %e, "chain fetch failed; treating as missing");
                None
            }
        }
    }

    /// Normalize and reconcile every flow record, then run the quick check.
    pub fn run_flows(&self) -> Result<FlowRunReport, PipelineError> {
        let index = self.config.primary_index();
        let flows = self.flow_records();
        let bars = self.daily_bars(index);

        let analyses = reconcile_flows(
            &flows,
            &bars,
            &self.config.normalizer(),
            self.config.flow.risk_profile,
        );

        let by_date: HashMap<NaiveDate, &PriceBar> = bars.iter().map(|b| (b.date, b)).collect();
        let quick: Vec<_> = flows
            .iter()
            .map(|rec| quick_reconcile(rec, by_date.get(&rec.date).copied()))
            .collect();
        let unmatched_dates = quick.iter().filter(|q| q.matched.is_none()).count();

        self.store.upsert_flow_analyses(&analyses)?;
        self.store.upsert_quick_reconciliations(&quick)?;

        info!(
            index,
            analyses = analyses.len(),
            unmatched_dates,
            "flow analysis stored"
        );
        Ok(FlowRunReport {
            analyses: analyses.len(),
            quick: quick.len(),
            unmatched_dates,
            latest: analyses.last().cloned(),
        })
    }

    pub fn run_traps(&self, range: DateRange) -> Result<TrapRunReport, PipelineError> {
        let index = self.config.primary_index();
        let bars = self.daily_bars(index);
        let flows = self.flow_records();
        let news = self.news_items();

        let results = detect_price_traps(&bars, &flows, &news, range, &self.config.trap);
        self.store.upsert_traps(&results)?;

        let detected = results.iter().filter(|t| t.trap_detected).count();
        info!(index, evaluated = results.len(), detected, "trap detection stored");
        Ok(TrapRunReport {
            evaluated: results.len(),
            detected,
        })
    }

    fn sniper_for(&self, index: &str, bars: &[PriceBar], date: NaiveDate) -> Result<Option<SniperSetup>, PipelineError> {
        let bar = bars.iter().find(|b| b.date == date);
        if bar.is_none() {
            debug!(index, %date, "no daily bar; sniper skipped");
            return Ok(None);
        }
        let payload = self.fetch_chain(index, date);
        let setup = compute_sniper(bar, payload.as_ref().map(|p| &p.chain), &self.config.sniper);
        if let Some(setup) = &setup {
            self.store.replace_sniper(setup)?;
        }
        Ok(setup)
    }

    /// Bands and trades for one session. `None` (nothing stored) without a
    /// daily bar or a usable chain.
    pub fn run_sniper(&self, date: NaiveDate) -> Result<Option<SniperSetup>, PipelineError> {
        let index = self.config.primary_index();
        let bars = self.daily_bars(index);
        let setup = self.sniper_for(index, &bars, date)?;
        match &setup {
            Some(s) => info!(index, %date, atm = s.level.atm, trades = s.trades.len(), "sniper stored"),
            None => info!(index, %date, "sniper unavailable"),
        }
        Ok(setup)
    }

    /// Recompute sniper levels for every session in the configured window
    /// ending at `end`, oldest first.
    pub fn backfill_sniper(&self, end: NaiveDate) -> Result<BackfillReport, PipelineError> {
        let index = self.config.primary_index();
        let bars = self.daily_bars(index);
        let mut sessions = self
            .config
            .calendar()
            .recent_sessions(end, self.config.data.backfill_days);
        sessions.reverse();

        let mut report = BackfillReport {
            sessions: sessions.len(),
            ..Default::default()
        };
        for date in sessions {
            match self.sniper_for(index, &bars, date)? {
                Some(_) => report.computed.push(date),
                None => report.skipped.push(date),
            }
        }
        info!(
            index,
            %end,
            computed = report.computed.len(),
            skipped = report.skipped.len(),
            "sniper backfill complete"
        );
        Ok(report)
    }

    /// Capture one snapshot at `timestamp`, compared against the latest
    /// earlier capture in the store. `None` when no chain is available.
    pub fn capture_snapshot(&self, timestamp: NaiveDateTime) -> Result<Option<MarketSnapshot>, PipelineError> {
        let index = self.config.primary_index();
        let date = timestamp.date();
        let Some(payload) = self.fetch_chain(index, date) else {
            info!(index, %date, "no chain; snapshot skipped");
            return Ok(None);
        };

        let bars = self.daily_bars(index);
        let daily_bar = bars.iter().find(|b| b.date == date);
        let level = self.store.sniper_level(date)?;
        let prior = self.store.latest_snapshot_before(timestamp)?;

        let snapshot = build_snapshot(
            SnapshotInput {
                timestamp,
                daily_bar,
                sniper: level.as_ref(),
                chain: &payload.chain,
                raw_payload: &payload.raw,
                prior: prior.as_ref(),
            },
            &self.config.snapshot,
        );
        self.store.append_snapshot(&snapshot)?;

        info!(
            index,
            %timestamp,
            trap = snapshot.trap_flag,
            recommendation = %snapshot.recommendation,
            chain = snapshot.chain_hash.short(),
            "snapshot stored"
        );
        Ok(Some(snapshot))
    }

    /// Detect reversals over every configured index × interval in parallel,
    /// then insert the events whose key is new.
    pub fn run_reversals(&self) -> Result<ReversalRunReport, PipelineError> {
        let calendar = self.config.calendar();
        let combos: Vec<(&str, Interval)> = self
            .config
            .data
            .indices
            .iter()
            .flat_map(|idx| {
                self.config
                    .data
                    .reversal_intervals
                    .iter()
                    .map(move |iv| (idx.as_str(), *iv))
            })
            .collect();

        let scanned: Vec<(SeriesScan, Vec<ReversalEvent>)> = combos
            .par_iter()
            .map(|(index, interval)| {
                let (bars, error) = match self.try_bars(index, *interval) {
                    Ok(bars) => (bars, None),
                    Err(e) => (Vec::new(), Some(e)),
                };
                let events = detect_reversals(index, *interval, &bars, &calendar);
                let scan = SeriesScan {
                    index: index.to_string(),
                    interval: *interval,
                    bars: bars.len(),
                    detected: events.len(),
                    error,
                };
                (scan, events)
            })
            .collect();

        let mut report = ReversalRunReport::default();
        let mut events = Vec::new();
        for (scan, found) in scanned {
            report.detected += found.len();
            report.series.push(scan);
            events.extend(found);
        }
        report.inserted = self.store.insert_reversals(&events)?;

        info!(
            series = report.series.len(),
            failed = report.series.iter().filter(|s| s.error.is_some()).count(),
            detected = report.detected,
            inserted = report.inserted,
            "reversal scan stored"
        );
        Ok(report)
    }

    /// Stored reversals for `index` next to the current pivots.
    pub fn reversal_dashboard(&self, index: &str) -> Result<ReversalDashboard, PipelineError> {
        let data = self.store.load_all()?;
        let events: Vec<ReversalEvent> = data.reversals_for(index).into_iter().cloned().collect();
        let latest = events
            .iter()
            .filter(|e| e.interval == Interval::Daily)
            .max_by_key(|e| e.reversal_date)
            .cloned();

        let mut bars = self.daily_bars(index);
        bars.extend(self.bars(index, Interval::Hourly));
        let daily = daily_pivot(&bars);
        let conf = confluence(
            latest.as_ref().map(|e| e.to_trend),
            daily.as_ref().map(|p| p.sentiment),
        );

        Ok(ReversalDashboard {
            index: index.to_string(),
            summary: summarize(&events),
            latest,
            weekly_pivot: weekly_pivot(&bars),
            hourly_pivot: hourly_pivot(&bars),
            daily_pivot: daily,
            confluence: conf,
        })
    }

    /// Daily summary for `date`: recap, slot traps, narrative, time-slot
    /// suggestions, trade plan, trend warning and the probability score.
    pub fn intraday_report(&self, date: NaiveDate) -> Result<IntradayReport, PipelineError> {
        let index = self.config.primary_index();
        let interval = self.config.data.intraday_interval;
        let intraday = self.bars(index, interval);
        let daily = self.daily_bars(index);

        let mut slots: Vec<PriceBar> = intraday.iter().filter(|b| b.date == date).cloned().collect();
        slots.sort_by_key(|b| b.time);

        let pcr = {
            let mut out = None;
            self.store
                .view(&mut |data| out = data.latest_snapshot_on(date).map(|s| s.pcr))?;
            out
        };
        let flows: BTreeMap<NaiveDate, FlowRecord> =
            self.flow_records().into_iter().map(|f| (f.date, f)).collect();
        let flow = flows.get(&date);
        let prev_flow = flows.range(..date).next_back().map(|(_, f)| f);
        let bar = daily.iter().find(|b| b.date == date);
        let decision = bar.map_or(Decision::Neutral, PriceBar::decision);
        let trade_plan = bar.map(|b| {
            let chain = self.fetch_chain(index, date);
            build_trade_plan(b.close, chain.as_ref().map(|p| &p.chain), decision, lot_size(index))
        });
        let traps = annotate_intraday_traps(&slots, pcr);

        let stats = analyze_time_patterns(&intraday, date, self.config.data.pattern_days, interval);
        let report = IntradayReport {
            index: index.to_string(),
            date,
            interval,
            pcr,
            decision,
            recap: recap_lines(index, date, bar, prev_flow, flow, decision),
            narrative: build_narrative(bar, &traps, decision),
            flow_trend: flow.map(|f| trend_from_flows(f.fii_net, f.dii_net, bar.map_or(0.0, |b| b.points))),
            trade_plan,
            suggestions: time_based_suggestions(&stats, decision, TOP_SLOTS),
            warning: recent_trend_warning(&daily, date, TREND_LOOKBACK),
            probability: probability_score(pcr, flow.map(|f| f.fii_net), flow.map(|f| f.dii_net), decision),
            traps,
        };
        info!(
            index,
            %date,
            slots = slots.len(),
            traps = report.traps.len(),
            probability = report.probability,
            "intraday report built"
        );
        Ok(report)
    }

    /// Every stage for one session, in dependency order: the sniper level is
    /// stored before the snapshot that copies it.
    pub fn run_all(&self, timestamp: NaiveDateTime) -> Result<RunAllReport, PipelineError> {
        let date = timestamp.date();
        let flows = self.run_flows()?;
        let traps = self.run_traps(DateRange::all())?;
        let sniper = self.run_sniper(date)?;
        let snapshot = self.capture_snapshot(timestamp)?;
        let reversals = self.run_reversals()?;
        Ok(RunAllReport {
            flows,
            traps,
            sniper,
            snapshot,
            reversals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use niftylab_core::data::{DataError, MemorySource};
    use niftylab_core::domain::{fill_points, ChainRow, OptionChain, OptionQuote};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn bar(day: u32, open: f64, close: f64) -> PriceBar {
        PriceBar {
            index: "NIFTY".into(),
            interval: Interval::Daily,
            date: d(day),
            time: None,
            open,
            high: open.max(close) + 20.0,
            low: open.min(close) - 20.0,
            close,
            points: 0.0,
        }
    }

    fn chain() -> ChainPayload {
        let quote = |ltp: f64| {
            Some(OptionQuote {
                last_price: ltp,
                open_interest: 1_000,
                total_traded_volume: 5_000,
                implied_volatility: 12.0,
            })
        };
        let rows = [21_900.0, 22_000.0, 22_100.0]
            .iter()
            .map(|s| ChainRow {
                strike_price: *s,
                ce: quote(80.0),
                pe: quote(60.0),
            })
            .collect();
        let chain = OptionChain {
            underlying_value: Some(22_010.0),
            expiries: vec![],
            rows,
        };
        let raw = serde_json::to_vec(&chain).unwrap();
        ChainPayload { chain, raw }
    }

    fn source() -> MemorySource {
        // Mon 4 .. Fri 8 March 2024.
        let mut bars = vec![
            bar(4, 21_900.0, 21_950.0),
            bar(5, 21_950.0, 22_010.0),
            bar(6, 22_010.0, 21_980.0),
            bar(7, 21_980.0, 21_900.0),
            bar(8, 21_900.0, 22_020.0),
        ];
        fill_points(&mut bars);
        MemorySource::new()
            .with_bars(bars)
            .with_flows((4..=8).map(|day| FlowRecord::from_net(d(day), 500.0, -100.0)))
            .with_chain("NIFTY", d(5), chain())
    }

    #[test]
    fn flows_store_both_reconciliations() {
        let src = source();
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let report = Pipeline::new(&config, Sources::single(&src), &store).run_flows().unwrap();
        assert_eq!(report.analyses, 5);
        assert_eq!(report.unmatched_dates, 0);

        let data = store.load_all().unwrap();
        assert_eq!(data.flow_analyses.len(), 5);
        assert_eq!(data.quick_reconciliations[&d(6)].total_z, 0.4);
        assert_eq!(data.quick_reconciliations[&d(6)].matched, Some(false));
    }

    #[test]
    fn sniper_without_bar_or_chain_stores_nothing() {
        let src = source();
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, Sources::single(&src), &store);

        // Chain lookup falls back to the 5th, so the 6th has one.
        assert!(pipeline.run_sniper(d(6)).unwrap().is_some());
        assert!(pipeline.run_sniper(d(9)).unwrap().is_none());
        assert!(pipeline.run_sniper(d(1)).unwrap().is_none());
        assert_eq!(store.load_all().unwrap().sniper_levels.len(), 1);
    }

    #[test]
    fn backfill_walks_sessions_oldest_first() {
        let src = source();
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let report = Pipeline::new(&config, Sources::single(&src), &store)
            .backfill_sniper(d(10))
            .unwrap();
        // 1..=10 March holds sessions 1, 4, 5, 6, 7, 8.
        assert_eq!(report.sessions, 6);
        assert_eq!(report.computed, vec![d(5), d(6), d(7), d(8)]);
        assert_eq!(report.skipped, vec![d(1), d(4)]);
    }

    #[test]
    fn snapshot_copies_sniper_and_chains_prior() {
        let src = source();
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, Sources::single(&src), &store);
        pipeline.run_sniper(d(5)).unwrap();

        let first = pipeline
            .capture_snapshot(d(5).and_hms_opt(10, 0, 0).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(first.sniper, Some(70.0));
        assert_eq!(first.atm, Some(22_000));
        let second = pipeline
            .capture_snapshot(d(5).and_hms_opt(10, 20, 0).unwrap())
            .unwrap()
            .unwrap();
        assert!(!second.trap_flag);
        assert_eq!(second.chain_hash, first.chain_hash);
        assert_eq!(store.load_all().unwrap().snapshots.len(), 2);

        assert!(pipeline
            .capture_snapshot(d(1).and_hms_opt(10, 0, 0).unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn reversal_runs_are_idempotent() {
        let src = source();
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, Sources::single(&src), &store);

        let first = pipeline.run_reversals().unwrap();
        assert_eq!(first.series.len(), 9);
        assert!(first.detected > 0);
        assert_eq!(first.inserted, first.detected);

        let again = pipeline.run_reversals().unwrap();
        assert_eq!(again.detected, first.detected);
        assert_eq!(again.inserted, 0);

        let dash = pipeline.reversal_dashboard("NIFTY").unwrap();
        assert_eq!(dash.summary.total, first.detected);
        assert!(dash.daily_pivot.is_some());
        assert!(dash.hourly_pivot.is_none());
    }

    #[test]
    fn intraday_report_ties_summary_pieces_together() {
        let src = source();
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, Sources::single(&src), &store);

        let report = pipeline.intraday_report(d(5)).unwrap();
        assert_eq!(report.decision, Decision::Bullish);
        assert_eq!(report.flow_trend, Some(FlowTrend::FiiBullish));
        assert_eq!(report.recap[0], "Market Recap 05-Mar-2024");
        // 500 crore is not beyond the recap threshold.
        assert_eq!(report.recap[2], "Neutral flows yesterday.");
        assert!(report.narrative.starts_with("Market opened gap-up with strength."));
        assert_eq!(
            report.trade_plan,
            Some(TradePlan::Directional {
                side: niftylab_core::domain::Side::Ce,
                strike: 22_000,
                entry_low: 76.0,
                entry_high: 84.0,
                target: 120.0,
                stop_loss: 56.0,
                qty: 75,
                ltp: 80.0,
                oi: 1_000,
            })
        );

        let missing = pipeline.intraday_report(d(11)).unwrap();
        assert!(missing.trade_plan.is_none());
        assert!(missing.flow_trend.is_none());
        assert_eq!(missing.decision, Decision::Neutral);
    }

    /// Prices that time out for one index and delegate otherwise.
    struct FailingIndex<'a> {
        inner: &'a MemorySource,
        failing: &'static str,
    }

    impl PriceSource for FailingIndex<'_> {
        fn bars(&self, index: &str, interval: Interval) -> Result<Vec<PriceBar>, DataError> {
            if index == self.failing {
                return Err(DataError::CacheError("upstream timeout".into()));
            }
            self.inner.bars(index, interval)
        }
    }

    struct FailingFeeds;

    impl FlowSource for FailingFeeds {
        fn flows(&self) -> Result<Vec<FlowRecord>, DataError> {
            Err(DataError::Csv("flows unavailable".into()))
        }
    }

    impl NewsSource for FailingFeeds {
        fn news(&self) -> Result<Vec<NewsItem>, DataError> {
            Err(DataError::Csv("news unavailable".into()))
        }
    }

    #[test]
    fn failing_price_series_does_not_discard_other_series() {
        let src = source();
        let prices = FailingIndex {
            inner: &src,
            failing: "BANKNIFTY",
        };
        let sources = Sources {
            prices: &prices,
            ..Sources::single(&src)
        };
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, sources, &store);

        let report = pipeline.run_reversals().unwrap();
        assert_eq!(report.series.len(), 9);
        let failed: Vec<_> = report.series.iter().filter(|s| s.error.is_some()).collect();
        assert_eq!(failed.len(), 3);
        assert!(failed.iter().all(|s| s.index == "BANKNIFTY" && s.bars == 0));

        let baseline = Pipeline::new(&config, Sources::single(&src), &MemoryStore::new())
            .run_reversals()
            .unwrap();
        assert!(report.inserted > 0);
        assert_eq!(report.inserted, baseline.inserted);
        assert_eq!(store.load_all().unwrap().reversals_for("NIFTY").len(), report.inserted);

        // The primary index still works; a failing secondary index degrades to an empty view.
        assert!(pipeline.run_sniper(d(5)).unwrap().is_some());
        let dash = pipeline.reversal_dashboard("BANKNIFTY").unwrap();
        assert!(dash.daily_pivot.is_none());
    }

    #[test]
    fn failing_sources_degrade_to_missing_data() {
        let src = source();
        let prices = FailingIndex {
            inner: &src,
            failing: "NIFTY",
        };
        let sources = Sources {
            prices: &prices,
            chains: &src,
            flows: &FailingFeeds,
            news: &FailingFeeds,
        };
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, sources, &store);

        let report = pipeline.run_all(d(5).and_hms_opt(10, 0, 0).unwrap()).unwrap();
        assert_eq!(report.flows.analyses, 0);
        assert_eq!(report.traps.evaluated, 0);
        assert!(report.sniper.is_none());
        // The chain is still there; the snapshot falls back to its underlying value.
        assert!(report.snapshot.is_some());
        assert_eq!(report.reversals.inserted, 0);

        let intraday = pipeline.intraday_report(d(5)).unwrap();
        assert_eq!(intraday.decision, Decision::Neutral);
        assert!(intraday.traps.is_empty());
    }
}
