//! Periodic option-chain captures.
//!
//! A snapshot freezes one chain poll: aggregate LTP, volume and OI, the
//! chain-level trap check against the previous capture, a side
//! recommendation, and per-strike rows around ATM. Snapshots are append-only.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::domain::{ChainHash, OptionChain, PriceBar, Side};
use crate::math::round_dp;
use crate::sniper::{atm_for_close, SniperLevel};
use crate::trap::{detect_chain_trap, summarize_chain, ChainSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotRules {
    pub interval_minutes: u32,
    /// Strikes within ATM ± this get a per-strike row.
    pub focus_range: i64,
    /// Rows kept when no ATM could be determined.
    pub fallback_strikes: usize,
    pub strike_step: i64,
}

impl Default for SnapshotRules {
    fn default() -> Self {
        Self {
            interval_minutes: 20,
            focus_range: 300,
            fallback_strikes: 10,
            strike_step: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    Avoid,
    PreferCe,
    PreferPe,
    Monitor,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avoid => "Avoid",
            Self::PreferCe => "Prefer CE",
            Self::PreferPe => "Prefer PE",
            Self::Monitor => "Monitor",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Long,
    Short,
}

/// (current − entry) × qty, sign flipped for shorts, 2dp. Missing prices
/// give 0.
pub fn estimate_profit(
    entry: Option<f64>,
    current: Option<f64>,
    position: Position,
    qty: u32,
) -> f64 {
    let (Some(entry), Some(current)) = (entry, current) else {
        return 0.0;
    };
    let diff = match position {
        Position::Long => current - entry,
        Position::Short => entry - current,
    };
    round_dp(diff * f64::from(qty), 2)
}

/// One side of one strike inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSignal {
    pub side: Side,
    pub strike: i64,
    pub ltp: f64,
    pub oi: u64,
    pub volume: u64,
    pub est_profit: f64,
    pub trap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: NaiveDateTime,
    pub date: NaiveDate,
    pub interval_minutes: u32,
    pub close: Option<f64>,
    pub atm: Option<i64>,
    pub sniper: Option<f64>,
    pub total_call_ltp: f64,
    pub total_put_ltp: f64,
    pub call_volume: u64,
    pub put_volume: u64,
    pub call_oi: u64,
    pub put_oi: u64,
    pub pcr: f64,
    pub trap_flag: bool,
    pub trap_note: String,
    pub recommendation: Recommendation,
    pub chain_hash: ChainHash,
    pub signals: Vec<ChainSignal>,
    pub raw_chain: OptionChain,
}

impl MarketSnapshot {
    /// Aggregates in the shape the chain trap check compares.
    pub fn summary(&self) -> ChainSummary {
        ChainSummary {
            call_sum: self.total_call_ltp,
            put_sum: self.total_put_ltp,
            call_vol: self.call_volume,
            put_vol: self.put_volume,
            call_oi: self.call_oi,
            put_oi: self.put_oi,
            rows: Vec::new(),
        }
    }
}

/// Everything one capture needs.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInput<'a> {
    pub timestamp: NaiveDateTime,
    /// Today's daily bar, if already known.
    pub daily_bar: Option<&'a PriceBar>,
    pub sniper: Option<&'a SniperLevel>,
    pub chain: &'a OptionChain,
    /// Exact bytes received from the chain source; hashed for the snapshot.
    pub raw_payload: &'a [u8],
    /// Most recent earlier snapshot.
    pub prior: Option<&'a MarketSnapshot>,
}

pub fn recommend(trap_flag: bool, call_sum: f64, put_sum: f64) -> Recommendation {
    if trap_flag {
        Recommendation::Avoid
    } else if call_sum > put_sum * 1.1 {
        Recommendation::PreferCe
    } else if put_sum > call_sum * 1.1 {
        Recommendation::PreferPe
    } else {
        Recommendation::Monitor
    }
}

/// put OI / call OI. A zero call OI carries the prior capture's PCR forward,
/// or 0 when there is none.
pub fn put_call_ratio(put_oi: u64, call_oi: u64, prior: Option<&MarketSnapshot>) -> f64 {
    if call_oi == 0 {
        return prior.map_or(0.0, |p| p.pcr);
    }
    round_dp(put_oi as f64 / call_oi as f64, 4)
}

pub fn build_snapshot(input: SnapshotInput<'_>, rules: &SnapshotRules) -> MarketSnapshot {
    let close = match input.daily_bar.filter(|b| b.is_daily()) {
        Some(bar) => Some(bar.close),
        None => input.chain.underlying_value,
    }
    .filter(|c| c.is_finite() && *c > 0.0);
    let atm = close.map(|c| atm_for_close(c, rules.strike_step));

    let summary = summarize_chain(input.chain);
    let prior_summary = input.prior.map(MarketSnapshot::summary);
    let trap = detect_chain_trap(&summary, prior_summary.as_ref());
    let recommendation = recommend(trap.flag, summary.call_sum, summary.put_sum);
    let pcr = put_call_ratio(summary.put_oi, summary.call_oi, input.prior);

    let focused: Vec<i64> = {
        let mut strikes: Vec<i64> = summary.rows.iter().map(|r| r.strike).collect();
        strikes.sort_unstable();
        strikes.dedup();
        match atm {
            Some(atm) => strikes
                .into_iter()
                .filter(|s| (atm - rules.focus_range..=atm + rules.focus_range).contains(s))
                .collect(),
            None => strikes.into_iter().take(rules.fallback_strikes).collect(),
        }
    };

    let mut signals = Vec::new();
    for row in summary.rows.iter().filter(|r| focused.contains(&r.strike)) {
        for side in Side::BOTH {
            let ltp = row.ltp(side);
            signals.push(ChainSignal {
                side,
                strike: row.strike,
                ltp,
                oi: row.oi(side),
                volume: row.volume(side),
                est_profit: estimate_profit(Some(ltp), Some(ltp), Position::Long, 1),
                trap: false,
            });
        }
    }

    let snapshot = MarketSnapshot {
        timestamp: input.timestamp,
        date: input.timestamp.date(),
        interval_minutes: rules.interval_minutes,
        close,
        atm,
        sniper: input.sniper.map(|s| s.sniper),
        total_call_ltp: round_dp(summary.call_sum, 2),
        total_put_ltp: round_dp(summary.put_sum, 2),
        call_volume: summary.call_vol,
        put_volume: summary.put_vol,
        call_oi: summary.call_oi,
        put_oi: summary.put_oi,
        pcr,
        trap_flag: trap.flag,
        trap_note: trap.note,
        recommendation,
        chain_hash: ChainHash::from_bytes(input.raw_payload),
        signals,
        raw_chain: input.chain.clone(),
    };
    debug!(
        timestamp = %snapshot.timestamp,
        recommendation = %snapshot.recommendation,
        trap = snapshot.trap_flag,
        chain = snapshot.chain_hash.short(),
        "snapshot built"
    );
    snapshot
}
