//! Intraday analytics over sub-interval bars.
//!
//! Slot points, trap annotations for big slot moves, per-slot up/down
//! statistics over recent sessions, and the daily summary pieces built on
//! them: a streak warning, a 30 to 80 probability score, the recap lines, a
//! narrative, a flow-based trend label and an ATM option trade plan.

use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{Decision, FlowRecord, Interval, OptionChain, PriceBar, Side};
use crate::math::{nearest_strike, round_dp};

/// |points| at or above this marks a trap slot.
pub const TRAP_SLOT_POINTS: f64 = 30.0;
pub const DEFAULT_PATTERN_DAYS: u32 = 40;
pub const MIN_SLOT_SAMPLES: usize = 6;
pub const SLOT_EDGE: f64 = 0.55;
/// Prior-day |FII net| (crore) beyond which the recap calls out the flow.
pub const FII_RECAP_THRESHOLD: f64 = 500.0;
/// Strike step of the trade-plan ATM.
pub const PLAN_STRIKE_STEP: i64 = 50;

/// Recompute `points` within every (index, interval, date) group, ordered by
/// slot time. The first slot of a day gets 0.
pub fn recompute_points(bars: &mut [PriceBar]) {
    bars.sort_by(|a, b| {
        (&a.index, a.interval, a.date, a.time).cmp(&(&b.index, b.interval, b.date, b.time))
    });
    for i in 0..bars.len() {
        let same_day = i > 0
            && bars[i - 1].index == bars[i].index
            && bars[i - 1].interval == bars[i].interval
            && bars[i - 1].date == bars[i].date;
        bars[i].points = if same_day {
            round_dp(bars[i].close - bars[i - 1].close, 2)
        } else {
            0.0
        };
    }
}

fn slot_label(time: Option<NaiveTime>) -> String {
    time.map_or_else(|| "NA".to_string(), |t| t.format("%H:%M").to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayTrap {
    pub time: String,
    pub points: f64,
    pub direction: SlotDirection,
    pub annotation: String,
}

/// Who got caught on each big slot move. PCR adds a note on heavy OI.
pub fn annotate_intraday_traps(slots: &[PriceBar], pcr: Option<f64>) -> Vec<IntradayTrap> {
    let pcr = pcr.filter(|p| p.is_finite() && *p > 0.0);
    slots
        .iter()
        .filter(|s| s.points.is_finite() && s.points.abs() >= TRAP_SLOT_POINTS)
        .map(|s| {
            let (direction, annotation) = if s.points < 0.0 {
                let mut text = "Call buyers trapped; Put buyers profited".to_string();
                if pcr.is_some_and(|p| p > 1.2) {
                    text.push_str(" (PCR high → Put OI heavy)");
                }
                (SlotDirection::Down, text)
            } else {
                let mut text = "Put buyers trapped; Call buyers profited".to_string();
                if pcr.is_some_and(|p| p < 0.8) {
                    text.push_str(" (PCR low → Call OI heavy)");
                }
                (SlotDirection::Up, text)
            };
            IntradayTrap {
                time: slot_label(s.time),
                points: round_dp(s.points, 2),
                direction,
                annotation,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotStats {
    pub count: usize,
    pub up_prob: f64,
    pub down_prob: f64,
    /// Mean of positive moves; 0 without any.
    pub avg_up: f64,
    /// Mean of negative moves; 0 without any.
    pub avg_down: f64,
}

/// Per-slot ("HH:MM") statistics over the `days` calendar days before
/// `date`, exclusive at both ends.
pub fn analyze_time_patterns(
    bars: &[PriceBar],
    date: NaiveDate,
    days: u32,
    interval: Interval,
) -> BTreeMap<String, SlotStats> {
    let start = date
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);

    let mut moves: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for bar in bars {
        if bar.interval != interval || bar.date <= start || bar.date >= date {
            continue;
        }
        if !bar.points.is_finite() {
            continue;
        }
        moves.entry(slot_label(bar.time)).or_default().push(bar.points);
    }

    moves
        .into_iter()
        .map(|(slot, pts)| {
            let count = pts.len();
            let ups: Vec<f64> = pts.iter().copied().filter(|m| *m > 0.0).collect();
            let downs: Vec<f64> = pts.iter().copied().filter(|m| *m < 0.0).collect();
            let stats = SlotStats {
                count,
                up_prob: ups.len() as f64 / count as f64,
                down_prob: downs.len() as f64 / count as f64,
                avg_up: ups.iter().sum::<f64>() / ups.len().max(1) as f64,
                avg_down: downs.iter().sum::<f64>() / downs.len().max(1) as f64,
            };
            (slot, stats)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotAction {
    BuyCall,
    BuyPut,
    Avoid,
}

impl fmt::Display for SlotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BuyCall => "Buy Call",
            Self::BuyPut => "Buy Put",
            Self::Avoid => "Avoid",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSuggestion {
    pub time: String,
    pub action: SlotAction,
    pub confidence: u32,
    pub samples: usize,
}

/// Suggestions for well-sampled slots, highest confidence first.
pub fn time_based_suggestions(
    stats: &BTreeMap<String, SlotStats>,
    bias: Decision,
    top_n: usize,
) -> Vec<SlotSuggestion> {
    let mut out: Vec<SlotSuggestion> = stats
        .iter()
        .filter(|(_, st)| st.count >= MIN_SLOT_SAMPLES)
        .map(|(slot, st)| {
            let action = if st.up_prob > SLOT_EDGE {
                SlotAction::BuyCall
            } else if st.down_prob > SLOT_EDGE {
                SlotAction::BuyPut
            } else {
                SlotAction::Avoid
            };
            let mut confidence = (st.up_prob.max(st.down_prob) * 100.0).trunc() as u32;
            if matches!(
                (bias, action),
                (Decision::Bullish, SlotAction::BuyCall) | (Decision::Bearish, SlotAction::BuyPut)
            ) {
                confidence += 10;
            }
            SlotSuggestion {
                time: slot.clone(),
                action,
                confidence,
                samples: st.count,
            }
        })
        .collect();
    // Stable: equal confidence keeps slot order.
    out.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    out.truncate(top_n);
    out
}

/// Warn when each of the `lookback` daily bars before `date` closed the same
/// way as it opened.
pub fn recent_trend_warning(bars: &[PriceBar], date: NaiveDate, lookback: usize) -> Option<String> {
    let mut prior: Vec<&PriceBar> = bars
        .iter()
        .filter(|b| b.is_daily() && b.date < date)
        .collect();
    prior.sort_by(|a, b| b.date.cmp(&a.date));
    prior.truncate(lookback);
    if prior.is_empty() {
        return None;
    }

    let ups = prior.iter().filter(|b| b.close > b.open).count();
    let downs = prior.iter().filter(|b| b.close < b.open).count();
    if ups == lookback {
        Some(format!(
            "Last {lookback} days UP → Avoid fresh Calls, market may correct."
        ))
    } else if downs == lookback {
        Some(format!(
            "Last {lookback} days DOWN → Avoid fresh Puts, market may rebound."
        ))
    } else {
        None
    }
}

/// Heuristic 30–80 score from PCR, flows and the day's decision.
pub fn probability_score(
    pcr: Option<f64>,
    fii_net: Option<f64>,
    dii_net: Option<f64>,
    decision: Decision,
) -> u8 {
    let mut prob: i32 = 50;
    match pcr {
        Some(p) if p > 1.2 => prob -= 5,
        Some(p) if p < 0.8 => prob += 5,
        _ => {}
    }
    match fii_net {
        Some(f) if f > 0.0 => prob += 5,
        Some(f) if f < 0.0 => prob -= 5,
        _ => {}
    }
    match dii_net {
        Some(d) if d > 0.0 => prob += 3,
        Some(d) if d < 0.0 => prob -= 3,
        _ => {}
    }
    match decision {
        Decision::Bullish => prob += 5,
        Decision::Bearish => prob -= 5,
        Decision::Neutral => {}
    }
    prob.clamp(30, 80) as u8
}

/// Options contract lot size per index.
pub fn lot_size(index: &str) -> u32 {
    match index.to_ascii_uppercase().as_str() {
        "NIFTY" => 75,
        "BANKNIFTY" => 15,
        _ => 50,
    }
}

/// Headline lines of the daily summary: OHLC, yesterday's FII flow,
/// bias, and today's net flows when known.
pub fn recap_lines(
    index: &str,
    date: NaiveDate,
    bar: Option<&PriceBar>,
    prev_flow: Option<&FlowRecord>,
    flow: Option<&FlowRecord>,
    bias: Decision,
) -> Vec<String> {
    let mut lines = vec![format!("Market Recap {}", date.format("%d-%b-%Y"))];
    if let Some(b) = bar {
        lines.push(format!(
            "- {index} opened {:.2}, High {:.2}, Low {:.2}, Close {:.2}",
            b.open, b.high, b.low, b.close
        ));
    }
    lines.push(
        match prev_flow.map(|f| f.fii_net) {
            Some(net) if net < -FII_RECAP_THRESHOLD => "Yesterday's heavy FII selling hurt sentiment.",
            Some(net) if net > FII_RECAP_THRESHOLD => "Yesterday's strong FII buying supported strength.",
            _ => "Neutral flows yesterday.",
        }
        .to_string(),
    );
    lines.push(format!("Bias: {bias}"));
    if let Some(f) = flow {
        lines.push(format!("FII Net: {:.2} Cr | DII Net: {:.2} Cr", f.fii_net, f.dii_net));
    }
    lines
}

/// Plain-language story of the session from the daily bar and slot traps.
pub fn build_narrative(bar: Option<&PriceBar>, traps: &[IntradayTrap], bias: Decision) -> String {
    let Some(bar) = bar else {
        return "No daily bar; narrative unavailable.".to_string();
    };
    let mut story = vec![if bar.open > bar.close {
        "Market opened gap-down and weak."
    } else if bar.open < bar.close {
        "Market opened gap-up with strength."
    } else {
        "Market opened flat, no direction early."
    }];

    match traps.last() {
        None => story.push("Mostly consolidation, no big swings."),
        Some(last) => {
            if traps.iter().any(|t| t.direction == SlotDirection::Down) {
                story.push("Midday selling dragged index lower.");
            }
            if traps.iter().any(|t| t.direction == SlotDirection::Up) {
                story.push("Buyers lifted index intraday.");
            }
            story.push(match last.direction {
                SlotDirection::Down => "Closed near lows, sellers dominated.",
                SlotDirection::Up => "Recovered near close.",
            });
        }
    }

    story.push(match bias {
        Decision::Bullish => "Overall positive → Call buyers favoured.",
        Decision::Bearish => "Overall negative → Put buyers favoured.",
        Decision::Neutral => "Day ended neutral.",
    });
    story.join(" ")
}

/// Trend label from the sign pattern of FII and DII net flows, with the
/// day's price points breaking mixed or flat cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowTrend {
    StrongBullish,
    StrongBearish,
    FiiBullish,
    DiiBullish,
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for FlowTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StrongBullish => "Strong Bullish",
            Self::StrongBearish => "Strong Bearish",
            Self::FiiBullish => "FII Bullish",
            Self::DiiBullish => "DII Bullish",
            Self::Bullish => "Bullish",
            Self::Bearish => "Bearish",
            Self::Neutral => "Neutral",
        })
    }
}

pub fn trend_from_flows(fii_net: f64, dii_net: f64, price_points: f64) -> FlowTrend {
    let price_up = price_points >= 0.0;
    if fii_net > 0.0 && dii_net > 0.0 {
        FlowTrend::StrongBullish
    } else if fii_net < 0.0 && dii_net < 0.0 {
        FlowTrend::StrongBearish
    } else if fii_net > 0.0 && dii_net < 0.0 {
        if price_up {
            FlowTrend::FiiBullish
        } else {
            FlowTrend::Neutral
        }
    } else if fii_net < 0.0 && dii_net > 0.0 {
        if price_up {
            FlowTrend::DiiBullish
        } else {
            FlowTrend::Neutral
        }
    } else if price_up {
        FlowTrend::Bullish
    } else {
        FlowTrend::Bearish
    }
}

/// LTP assumed for a missing or zero CE quote.
const PLAN_CE_DEFAULT_LTP: f64 = 100.0;
/// LTP assumed for a missing or zero PE quote.
const PLAN_PE_DEFAULT_LTP: f64 = 120.0;

/// One-lot ATM option plan for the next session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradePlan {
    /// Buy the side the bias favours, entering within ±5% of LTP.
    Directional {
        side: Side,
        strike: i64,
        entry_low: f64,
        entry_high: f64,
        target: f64,
        stop_loss: f64,
        qty: u32,
        ltp: f64,
        oi: u64,
    },
    /// Neutral bias: buy both legs at the ATM.
    Straddle {
        strike: i64,
        avg_premium: f64,
        ce_ltp: f64,
        pe_ltp: f64,
        qty: u32,
    },
    /// No chain row at the ATM: a fixed PE plan.
    Fallback {
        side: Side,
        strike: i64,
        entry_low: f64,
        entry_high: f64,
        target: f64,
        stop_loss: f64,
        qty: u32,
        confidence: u8,
    },
}

impl TradePlan {
    pub fn strike(&self) -> i64 {
        match self {
            Self::Directional { strike, .. } | Self::Straddle { strike, .. } | Self::Fallback { strike, .. } => {
                *strike
            }
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Directional {
                side,
                strike,
                entry_low,
                entry_high,
                target,
                stop_loss,
                ltp,
                oi,
                ..
            } => format!(
                "Option Buy → {strike} {side} | Entry: {entry_low}-{entry_high} | Target: {target} | SL: {stop_loss} | LTP: {ltp} | OI: {oi}"
            ),
            Self::Straddle {
                strike, avg_premium, ..
            } => format!("Straddle at {strike} (Buy CE+PE). Premium {avg_premium}"),
            Self::Fallback { strike, side, .. } => format!("Option Buy → {strike} {side} (fallback plan)"),
        }
    }
}

/// Plan around the ATM nearest `close`: CE on a Bullish bias, PE on a
/// Bearish one, a straddle otherwise. Entry is LTP ±5%, target 1.5× and
/// stop 0.7×, all to 1dp.
pub fn build_trade_plan(close: f64, chain: Option<&OptionChain>, bias: Decision, qty: u32) -> TradePlan {
    let strike = nearest_strike(close, PLAN_STRIKE_STEP);
    let Some(row) = chain.and_then(|c| c.row_at(strike)) else {
        return TradePlan::Fallback {
            side: Side::Pe,
            strike,
            entry_low: 115.0,
            entry_high: 125.0,
            target: 180.0,
            stop_loss: 84.0,
            qty,
            confidence: 55,
        };
    };

    let ltp_or = |side: Side, default: f64| {
        let ltp = row.ltp(side);
        if ltp > 0.0 && ltp.is_finite() {
            ltp
        } else {
            default
        }
    };
    let oi = |side: Side| row.quote(side).map_or(0, |q| q.open_interest);
    let ce_ltp = ltp_or(Side::Ce, PLAN_CE_DEFAULT_LTP);
    let pe_ltp = ltp_or(Side::Pe, PLAN_PE_DEFAULT_LTP);

    let directional = |side: Side, ltp: f64| TradePlan::Directional {
        side,
        strike,
        entry_low: round_dp(ltp * 0.95, 1),
        entry_high: round_dp(ltp * 1.05, 1),
        target: round_dp(ltp * 1.5, 1),
        stop_loss: round_dp(ltp * 0.7, 1),
        qty,
        ltp,
        oi: oi(side),
    };
    match bias {
        Decision::Bullish => directional(Side::Ce, ce_ltp),
        Decision::Bearish => directional(Side::Pe, pe_ltp),
        Decision::Neutral => TradePlan::Straddle {
            strike,
            avg_premium: round_dp((ce_ltp + pe_ltp) / 2.0, 1),
            ce_ltp,
            pe_ltp,
            qty,
        },
    }
}
