//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Short flow histories always score z = 0 and Neutral
//! 2. A constant window never divides by zero
//! 3. Z-scores are bounded by the window size
//! 4. Reconciliation never invents a `matched` value
//! 5. Sniper ATM never sits above the close and bands are symmetric
//! 6. Reversal detection is deterministic and emits unique keys
//!
//! followed by the fixed worked examples.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use std::collections::HashSet;

use niftylab_core::calendar::TradingCalendar;
use niftylab_core::domain::{
    fill_points, ChainRow, Decision, FlowRecord, FlowSignal, Interval, OptionChain, OptionQuote,
    PriceBar,
};
use niftylab_core::flow::{label_from_z, reconcile_flows, FlowNormalizer, RiskProfile};
use niftylab_core::reversal::{detect_reversals, Trend};
use niftylab_core::sniper::{atm_for_close, compute_sniper, SniperLevel, SniperRules};
use niftylab_core::trap::{
    detect_chain_trap, detect_price_traps, ChainSummary, DateRange, TrapRules, TrapType,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn flows_from(nets: &[(f64, f64)]) -> Vec<FlowRecord> {
    nets.iter()
        .enumerate()
        .map(|(i, (f, d))| FlowRecord::from_net(start() + Days::new(i as u64), *f, *d))
        .collect()
}

/// One daily bar per trading session, with points filled.
fn daily_series(closes: &[f64]) -> Vec<PriceBar> {
    let cal = TradingCalendar::default();
    let mut date = start();
    let mut bars = Vec::with_capacity(closes.len());
    for &close in closes {
        while !cal.is_trading_day(date) {
            date = date + Days::new(1);
        }
        bars.push(PriceBar {
            index: "NIFTY".into(),
            interval: Interval::Daily,
            date,
            time: None,
            open: close,
            high: close + 10.0,
            low: close - 10.0,
            close,
            points: 0.0,
        });
        date = date + Days::new(1);
    }
    fill_points(&mut bars);
    bars
}

fn daily_bar(date: NaiveDate, open: f64, close: f64, low: f64) -> PriceBar {
    PriceBar {
        index: "NIFTY".into(),
        interval: Interval::Daily,
        date,
        time: None,
        open,
        high: open.max(close) + 1.0,
        low,
        close,
        points: 0.0,
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_net() -> impl Strategy<Value = f64> {
    (-10_000.0..10_000.0_f64).prop_map(|v| (v * 100.0).round() / 100.0)
}

fn arb_close() -> impl Strategy<Value = f64> {
    (15_000.0..25_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

proptest! {
    /// Fewer than min_periods observations → z exactly 0, Neutral.
    #[test]
    fn short_history_is_neutral(nets in prop::collection::vec((arb_net(), arb_net()), 0..10)) {
        let scores = FlowNormalizer::default().score(&flows_from(&nets));
        prop_assert_eq!(scores.len(), nets.len());
        for s in scores {
            prop_assert_eq!(s.total_z, 0.0);
            prop_assert_eq!(s.fii_z, 0.0);
            prop_assert_eq!(s.signal, FlowSignal::Neutral);
        }
    }

    /// A flat window has zero std; z must be 0, never NaN or infinite.
    #[test]
    fn constant_flows_score_zero(value in arb_net(), n in 10usize..80) {
        let nets = vec![(value, value); n];
        for s in FlowNormalizer::default().score(&flows_from(&nets)) {
            prop_assert_eq!(s.total_z, 0.0);
            prop_assert!(s.fii_z.is_finite() && s.dii_z.is_finite());
        }
    }

    /// A z-score against a sample of n values is bounded by (n-1)/sqrt(n).
    #[test]
    fn z_scores_are_bounded(nets in prop::collection::vec((arb_net(), arb_net()), 10..90)) {
        let window = 60usize;
        let bound = (window as f64 - 1.0) / (window as f64).sqrt() + 0.001;
        for s in FlowNormalizer::default().score(&flows_from(&nets)) {
            prop_assert!(s.total_z.abs() <= bound, "z={} out of bound", s.total_z);
            // The label comes from the unrounded z; it can only differ from
            // the stored value's label within half a unit of rounding of a threshold.
            let near_threshold = [-1.0, -0.5, 0.5, 1.0].iter().any(|t| (s.total_z - t).abs() <= 0.0005);
            if !near_threshold {
                prop_assert_eq!(s.signal, label_from_z(s.total_z));
            }
        }
    }

    /// `matched` is Some exactly when the flow date has a daily bar.
    #[test]
    fn matched_only_when_computable(
        nets in prop::collection::vec((arb_net(), arb_net()), 1..40),
        has_bar in prop::collection::vec(any::<bool>(), 40),
        closes in prop::collection::vec(arb_close(), 40),
    ) {
        let flows = flows_from(&nets);
        let bars: Vec<PriceBar> = flows
            .iter()
            .enumerate()
            .filter(|(i, _)| has_bar[*i])
            .map(|(i, f)| daily_bar(f.date, closes[i] - 25.0, closes[i], closes[i] - 50.0))
            .collect();
        let out = reconcile_flows(&flows, &bars, &FlowNormalizer::default(), RiskProfile::Medium);
        for (i, a) in out.iter().enumerate() {
            prop_assert_eq!(a.matched.is_some(), has_bar[i]);
            prop_assert_eq!(a.suggestion.atm.is_some(), has_bar[i]);
        }
    }

    /// ATM is a multiple of the step, never above the close, within one step.
    #[test]
    fn sniper_atm_floor_rule(close in arb_close()) {
        let atm = atm_for_close(close, 50);
        prop_assert_eq!(atm % 50, 0);
        prop_assert!(atm as f64 <= close);
        prop_assert!(close - (atm as f64) < 50.0);
    }

    /// Bands are symmetric around ATM and the double band is twice as wide.
    #[test]
    fn sniper_bands_are_symmetric(atm in 300i64..500, sniper in 1.0..400.0_f64) {
        let atm = atm * 50;
        let lv = SniperLevel::new(start(), atm as f64, atm, sniper, Decision::Neutral);
        let centre = atm as f64;
        prop_assert!((lv.upper - centre - (centre - lv.lower)).abs() < 1e-9);
        prop_assert!((lv.upper_double - lv.lower_double - 2.0 * (lv.upper - lv.lower)).abs() < 1e-9);
    }

    /// Detection over the same series is identical, keys are unique, and
    /// every event leaves a neutral or opposite trend.
    #[test]
    fn reversal_detection_is_idempotent(closes in prop::collection::vec(arb_close(), 2..120)) {
        let bars = daily_series(&closes);
        let cal = TradingCalendar::default();
        let once = detect_reversals("NIFTY", Interval::Daily, &bars, &cal);
        let twice = detect_reversals("NIFTY", Interval::Daily, &bars, &cal);
        prop_assert_eq!(&once, &twice);

        let keys: HashSet<_> = once.iter().map(|e| e.key()).collect();
        prop_assert_eq!(keys.len(), once.len());
        for e in &once {
            prop_assert!(e.to_trend != Trend::Neutral);
            prop_assert!(e.from_trend != e.to_trend);
        }
    }
}

// ── Worked examples ──────────────────────────────────────────────────

#[test]
fn classification_is_order_consistent() {
    let labels: Vec<FlowSignal> = [1.5, 0.7, 0.0, -0.6, -1.2].iter().map(|z| label_from_z(*z)).collect();
    assert_eq!(
        labels,
        vec![
            FlowSignal::StrongBullish,
            FlowSignal::Bullish,
            FlowSignal::Neutral,
            FlowSignal::Bearish,
            FlowSignal::StrongBearish,
        ]
    );
}

#[test]
fn bullish_flow_into_three_percent_drop_is_a_trap() {
    let d1 = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    let d2 = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let bars = vec![daily_bar(d1, 99.0, 100.0, 98.0), daily_bar(d2, 99.5, 97.0, 96.0)];
    let flows = vec![FlowRecord::from_net(d2, 800.0, 200.0)];

    let out = detect_price_traps(&bars, &flows, &[], DateRange::single(d2), &TrapRules::default());
    assert_eq!(out.len(), 1);
    let t = &out[0];
    assert!(t.trap_detected);
    assert_eq!(t.trap_type, TrapType::BullishTrap);
    assert_eq!(t.confidence, 0.8);
    assert_eq!(t.stop_loss_support, Some(95.52));
    assert_eq!(serde_json::to_string(&t.trap_type).unwrap(), "\"bullish_trap\"");
}

#[test]
fn half_percent_move_is_never_a_trap() {
    let d1 = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    let d2 = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let bars = vec![daily_bar(d1, 99.0, 100.0, 98.0), daily_bar(d2, 100.0, 100.5, 99.5)];
    for net in [1_000.0, -1_000.0, 0.0] {
        let flows = vec![FlowRecord::from_net(d2, net, 0.0)];
        let out = detect_price_traps(&bars, &flows, &[], DateRange::single(d2), &TrapRules::default());
        assert!(!out[0].trap_detected);
        assert_eq!(out[0].confidence, 0.0);
    }
}

#[test]
fn sniper_atm_examples() {
    assert_eq!(atm_for_close(19_530.0, 50), 19_500);
    assert_eq!(atm_for_close(19_470.0, 50), 19_450);

    let lv = SniperLevel::new(start(), 19_530.0, 19_500, 100.0, Decision::Bullish);
    assert_eq!((lv.upper, lv.lower), (19_550.0, 19_450.0));
    assert_eq!((lv.upper_double, lv.lower_double), (19_600.0, 19_400.0));
}

#[test]
fn sniper_without_chain_is_none() {
    let bar = daily_bar(start(), 19_500.0, 19_530.0, 19_480.0);
    let rules = SniperRules::default();
    assert!(compute_sniper(Some(&bar), None, &rules).is_none());
    assert!(compute_sniper(Some(&bar), Some(&OptionChain::default()), &rules).is_none());

    let chain = OptionChain {
        underlying_value: None,
        expiries: vec![],
        rows: vec![ChainRow {
            strike_price: 19_500.0,
            ce: Some(OptionQuote {
                last_price: 80.0,
                ..Default::default()
            }),
            pe: None,
        }],
    };
    assert!(compute_sniper(None, Some(&chain), &rules).is_none());
    let setup = compute_sniper(Some(&bar), Some(&chain), &rules).unwrap();
    assert_eq!(setup.level.sniper, 50.0);
}

#[test]
fn reversal_worked_example() {
    let bars = daily_series(&[100.0, 102.0, 105.0, 103.0, 101.0, 104.0]);
    let events = detect_reversals("NIFTY", Interval::Daily, &bars, &TradingCalendar::default());
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].reversal_date, bars[3].date);
    assert_eq!((events[0].from_trend, events[0].to_trend), (Trend::Bullish, Trend::Bearish));
    assert_eq!(events[1].reversal_date, bars[5].date);
    assert_eq!((events[1].from_trend, events[1].to_trend), (Trend::Bearish, Trend::Bullish));
}

#[test]
fn call_volume_spike_flags_chain_trap() {
    let prior = ChainSummary {
        call_vol: 1_000,
        put_vol: 900,
        call_oi: 5_000,
        put_oi: 5_000,
        ..Default::default()
    };
    let current = ChainSummary {
        call_vol: 1_600,
        put_vol: 900,
        call_oi: 5_000,
        put_oi: 5_000,
        ..Default::default()
    };
    let trap = detect_chain_trap(&current, Some(&prior));
    assert!(trap.flag);
    assert!(trap.note.contains("spike"));
}
