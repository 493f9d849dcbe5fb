//! Chain-level trap detection.
//!
//! Works on aggregate summaries of two consecutive chain captures. Rules are
//! not exclusive: every rule that fires adds its note, and the notes are
//! joined with "; ".

use serde::{Deserialize, Serialize};

use crate::domain::{OptionChain, Side};
use crate::math::pct_diff;

/// Per-strike quotes flattened out of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeSummary {
    pub strike: i64,
    pub ce_ltp: f64,
    pub ce_vol: u64,
    pub ce_oi: u64,
    pub pe_ltp: f64,
    pub pe_vol: u64,
    pub pe_oi: u64,
}

impl StrikeSummary {
    pub fn ltp(&self, side: Side) -> f64 {
        match side {
            Side::Ce => self.ce_ltp,
            Side::Pe => self.pe_ltp,
        }
    }

    pub fn volume(&self, side: Side) -> u64 {
        match side {
            Side::Ce => self.ce_vol,
            Side::Pe => self.pe_vol,
        }
    }

    pub fn oi(&self, side: Side) -> u64 {
        match side {
            Side::Ce => self.ce_oi,
            Side::Pe => self.pe_oi,
        }
    }
}

/// Aggregate LTP, volume and OI of one chain capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub call_sum: f64,
    pub put_sum: f64,
    pub call_vol: u64,
    pub put_vol: u64,
    pub call_oi: u64,
    pub put_oi: u64,
    #[serde(default)]
    pub rows: Vec<StrikeSummary>,
}

/// Sum both sides of a chain. A missing leg counts as zero.
pub fn summarize_chain(chain: &OptionChain) -> ChainSummary {
    let mut summary = ChainSummary::default();
    for row in &chain.rows {
        let ce = row.ce.clone().unwrap_or_default();
        let pe = row.pe.clone().unwrap_or_default();
        let ce_ltp = if ce.last_price.is_finite() { ce.last_price } else { 0.0 };
        let pe_ltp = if pe.last_price.is_finite() { pe.last_price } else { 0.0 };

        summary.call_sum += ce_ltp;
        summary.put_sum += pe_ltp;
        summary.call_vol += ce.total_traded_volume;
        summary.put_vol += pe.total_traded_volume;
        summary.call_oi += ce.open_interest;
        summary.put_oi += pe.open_interest;
        summary.rows.push(StrikeSummary {
            strike: row.strike(),
            ce_ltp,
            ce_vol: ce.total_traded_volume,
            ce_oi: ce.open_interest,
            pe_ltp,
            pe_vol: pe.total_traded_volume,
            pe_oi: pe.open_interest,
        });
    }
    summary
}

/// Outcome of a chain-level check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTrap {
    pub flag: bool,
    pub note: String,
}

/// Compare the current capture with the prior one (if any).
pub fn detect_chain_trap(current: &ChainSummary, prior: Option<&ChainSummary>) -> ChainTrap {
    let mut notes: Vec<String> = Vec::new();
    let mut flag = false;

    let call_vol = current.call_vol as f64;
    let put_vol = current.put_vol as f64;

    match prior {
        Some(prev) => {
            let call_spike = pct_diff(call_vol, prev.call_vol as f64);
            let put_spike = pct_diff(put_vol, prev.put_vol as f64);

            if call_spike > 50.0 && current.call_vol > current.put_vol {
                flag = true;
                notes.push(format!("Call volume spike {call_spike:.0}%"));
            }
            if put_spike > 50.0 && current.put_vol > current.call_vol {
                flag = true;
                notes.push(format!("Put volume spike {put_spike:.0}%"));
            }
            if pct_diff(current.call_oi as f64, prev.call_oi as f64) < -10.0
                && current.call_vol > prev.call_vol
            {
                flag = true;
                notes.push("Call OI fell while call volume rose (possible covering)".into());
            }
            if pct_diff(current.put_oi as f64, prev.put_oi as f64) < -10.0
                && current.put_vol > prev.put_vol
            {
                flag = true;
                notes.push("Put OI fell while put volume rose (possible covering)".into());
            }
        }
        None => {
            if call_vol > put_vol * 1.5 {
                flag = true;
                notes.push("Call volume >> Put volume".into());
            }
            if put_vol > call_vol * 1.5 {
                flag = true;
                notes.push("Put volume >> Call volume".into());
            }
        }
    }

    // Informational only.
    if current.call_sum > current.put_sum * 1.2 {
        notes.push("Call LTP > Put LTP (call strength)".into());
    } else if current.put_sum > current.call_sum * 1.2 {
        notes.push("Put LTP > Call LTP (put strength)".into());
    }

    ChainTrap {
        flag,
        note: notes.join("; "),
    }
}
