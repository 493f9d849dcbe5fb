//! Look-ahead contamination tests.
//!
//! Invariant: no derived value dated t may depend on input dated after t.
//!
//! Method: compute on a truncated series (first 120 sessions) and on the full
//! series (300 sessions). Every value dated inside the truncated window must be
//! identical between both runs.

use chrono::{Days, NaiveDate, NaiveDateTime};
use niftylab_core::calendar::TradingCalendar;
use niftylab_core::domain::{fill_points, FlowRecord, Interval, NewsItem, PriceBar};
use niftylab_core::flow::{reconcile_flows, FlowNormalizer, RiskProfile};
use niftylab_core::reversal::detect_reversals;
use niftylab_core::trap::{detect_price_traps, DateRange, TrapRules};

const FULL: usize = 300;
const TRUNC: usize = 120;

fn lcg(i: usize) -> f64 {
    let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    ((seed >> 33) % 2_000) as f64 - 1_000.0
}

fn sessions(n: usize) -> Vec<NaiveDate> {
    let cal = TradingCalendar::default();
    let mut date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        if cal.is_trading_day(date) {
            out.push(date);
        }
        date = date + Days::new(1);
    }
    out
}

fn make_flows(n: usize) -> Vec<FlowRecord> {
    sessions(n)
        .into_iter()
        .enumerate()
        .map(|(i, d)| FlowRecord::from_net(d, lcg(i) * 2.0, lcg(i + 7_919) * 1.5))
        .collect()
}

fn make_bars(n: usize) -> Vec<PriceBar> {
    let mut close = 18_000.0;
    let mut bars: Vec<PriceBar> = sessions(n)
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            // Steps of roughly ±3%, enough to cross the 2% trap threshold.
            close = (close + lcg(i + 31) * 0.55).max(1_000.0);
            let open = close - lcg(i + 101) * 0.1;
            PriceBar {
                index: "NIFTY".into(),
                interval: Interval::Daily,
                date,
                time: None,
                open,
                high: open.max(close) + 40.0,
                low: open.min(close) - 40.0,
                close: (close * 100.0).round() / 100.0,
                points: 0.0,
            }
        })
        .collect();
    fill_points(&mut bars);
    bars
}

fn make_news(dates: &[NaiveDate]) -> Vec<NewsItem> {
    dates
        .iter()
        .step_by(3)
        .enumerate()
        .map(|(i, d)| NewsItem {
            title: format!("headline {i}"),
            published_at: NaiveDateTime::new(*d, chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            impact_score: if i % 2 == 0 { 0.8 } else { 0.2 },
        })
        .collect()
}

#[test]
fn flow_normalizer_has_no_lookahead() {
    let full = make_flows(FULL);
    let norm = FlowNormalizer::default();

    let full_scores = norm.score(&full);
    let trunc_scores = norm.score(&full[..TRUNC]);

    assert_eq!(trunc_scores.len(), TRUNC);
    assert_eq!(&full_scores[..TRUNC], &trunc_scores[..]);
}

#[test]
fn reconciliation_has_no_lookahead() {
    let flows = make_flows(FULL);
    let bars = make_bars(FULL);
    let norm = FlowNormalizer::default();

    let full = reconcile_flows(&flows, &bars, &norm, RiskProfile::Medium);
    let trunc = reconcile_flows(&flows[..TRUNC], &bars[..TRUNC], &norm, RiskProfile::Medium);

    assert_eq!(&full[..TRUNC], &trunc[..]);
}

#[test]
fn price_traps_have_no_lookahead() {
    let flows = make_flows(FULL);
    let bars = make_bars(FULL);
    let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
    let news = make_news(&dates);
    let rules = TrapRules::default();

    let full = detect_price_traps(&bars, &flows, &news, DateRange::all(), &rules);
    let trunc = detect_price_traps(&bars[..TRUNC], &flows[..TRUNC], &news, DateRange::all(), &rules);

    assert_eq!(&full[..TRUNC], &trunc[..]);
    assert!(
        full.iter().any(|t| t.trap_detected),
        "fixture should produce at least one trap"
    );
}

#[test]
fn reversal_detector_has_no_lookahead() {
    let bars = make_bars(FULL);
    let cal = TradingCalendar::default();

    let full = detect_reversals("NIFTY", Interval::Daily, &bars, &cal);
    let trunc = detect_reversals("NIFTY", Interval::Daily, &bars[..TRUNC], &cal);
    assert!(!trunc.is_empty());

    // The newest truncated event may still have a growing streak; every
    // earlier one is final.
    let (last, settled) = trunc.split_last().unwrap();
    assert_eq!(&full[..settled.len()], settled);

    let same = &full[settled.len()];
    assert_eq!(same.key(), last.key());
    assert_eq!(same.prev_streak_len, last.prev_streak_len);
    assert_eq!(same.prev_change, last.prev_change);
    assert!(same.new_streak_len >= last.new_streak_len);
}
