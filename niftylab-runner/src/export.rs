//! Reporting and export: JSON, CSV, and Markdown artifacts from the store.
//!
//! - **JSON**: the whole store, round-trippable, with schema versioning
//! - **CSV**: one table per signal family for spreadsheet tools
//! - **Markdown**: a one-session summary
//!
//! Unknown schema versions are rejected on import.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use niftylab_core::trap::TrapType;

use crate::store::{StoreData, STORE_SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(data: &StoreData) -> Result<String> {
    serde_json::to_string_pretty(data).context("failed to serialize store to JSON")
}

/// Deserialize a store dump, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<StoreData> {
    let data: StoreData = serde_json::from_str(json).context("failed to deserialize store JSON")?;
    if data.schema_version > STORE_SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            data.schema_version,
            STORE_SCHEMA_VERSION
        );
    }
    Ok(data)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt_f64(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_default()
}

fn opt_bool(v: Option<bool>) -> &'static str {
    match v {
        Some(true) => "true",
        Some(false) => "false",
        None => "",
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, fii_net, dii_net, total_net, fii_z, dii_z, total_z,
/// signal, matched, intraday_change, prev_close_change, strategy, atm,
/// confidence, quick_total_z, quick_matched, quick_suggestion
pub fn export_flows_csv(data: &StoreData) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "fii_net",
        "dii_net",
        "total_net",
        "fii_z",
        "dii_z",
        "total_z",
        "signal",
        "matched",
        "intraday_change",
        "prev_close_change",
        "strategy",
        "atm",
        "confidence",
        "quick_total_z",
        "quick_matched",
        "quick_suggestion",
    ])?;

    for (date, a) in &data.flow_analyses {
        let s = &a.score;
        let quick = data.quick_reconciliations.get(date);
        let row: &[&str] = &[
            &date.to_string(),
            &format!("{:.2}", s.fii_net),
            &format!("{:.2}", s.dii_net),
            &format!("{:.2}", s.total_net),
            &format!("{:.3}", s.fii_z),
            &format!("{:.3}", s.dii_z),
            &format!("{:.3}", s.total_z),
            s.signal.as_str(),
            opt_bool(a.matched),
            &opt_f64(a.intraday_change),
            &opt_f64(a.prev_close_change),
            &a.suggestion.strategy,
            &a.suggestion.atm.map(|v| v.to_string()).unwrap_or_default(),
            &a.suggestion.confidence.to_string(),
            &quick.map(|q| format!("{:.2}", q.total_z)).unwrap_or_default(),
            quick.map_or("", |q| opt_bool(q.matched)),
            quick.map_or("", |q| q.suggestion_text.as_str()),
        ];
        wtr.write_record(row)?;
    }
    finish(wtr)
}

/// Columns: date, trap_detected, trap_type, confidence, fii_dii_signal,
/// future_decision, stop_loss_support, stop_loss_resistance, related_news
pub fn export_traps_csv(data: &StoreData) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "trap_detected",
        "trap_type",
        "confidence",
        "fii_dii_signal",
        "future_decision",
        "stop_loss_support",
        "stop_loss_resistance",
        "related_news",
    ])?;
    for t in data.traps.values() {
        let row: &[&str] = &[
            &t.date.to_string(),
            &t.trap_detected.to_string(),
            t.trap_type.as_str(),
            &format!("{:.2}", t.confidence),
            t.fii_dii_signal.map_or("", |d| d.as_str()),
            &t.future_decision,
            &opt_f64(t.stop_loss_support),
            &opt_f64(t.stop_loss_resistance),
            &t.related_news,
        ];
        wtr.write_record(row)?;
    }
    finish(wtr)
}

/// One row per trade, with the level's bands repeated.
pub fn export_sniper_csv(data: &StoreData) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "close",
        "atm",
        "sniper",
        "upper",
        "lower",
        "upper_double",
        "lower_double",
        "bias",
        "side",
        "strike",
        "entry",
        "stoploss",
        "target1",
        "target2",
        "risk_reward",
        "confidence",
        "action",
        "note",
    ])?;
    for (date, level) in &data.sniper_levels {
        let trades = data.sniper_trades.get(date).map(Vec::as_slice).unwrap_or_default();
        for t in trades {
            let row: &[&str] = &[
                &date.to_string(),
                &format!("{:.2}", level.close_price),
                &level.atm.to_string(),
                &format!("{:.2}", level.sniper),
                &format!("{:.2}", level.upper),
                &format!("{:.2}", level.lower),
                &format!("{:.2}", level.upper_double),
                &format!("{:.2}", level.lower_double),
                level.bias.as_str(),
                t.side.as_str(),
                &t.strike.to_string(),
                &format!("{:.2}", t.entry),
                &format!("{:.2}", t.stoploss),
                &format!("{:.2}", t.target1),
                &format!("{:.2}", t.target2),
                &format!("{:.2}", t.risk_reward),
                &t.confidence.to_string(),
                &t.action.label(),
                &t.note,
            ];
            wtr.write_record(row)?;
        }
    }
    finish(wtr)
}

pub fn export_reversals_csv(data: &StoreData) -> Result<String> {
    let mut events: Vec<_> = data.reversals.iter().collect();
    events.sort_by(|a, b| a.key().cmp(&b.key()));

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "index",
        "interval",
        "reversal_date",
        "from_trend",
        "to_trend",
        "prev_streak_len",
        "new_streak_len",
        "prev_change",
        "new_change",
        "momentum_bias",
        "option_signal",
        "trade_confidence",
        "remarks",
    ])?;
    for e in events {
        let row: &[&str] = &[
            &e.index,
            e.interval.as_str(),
            &e.reversal_date.to_string(),
            e.from_trend.as_str(),
            e.to_trend.as_str(),
            &e.prev_streak_len.to_string(),
            &e.new_streak_len.to_string(),
            &format!("{:.2}", e.prev_change),
            &format!("{:.2}", e.new_change),
            e.momentum_bias.as_str(),
            e.option_signal().as_str(),
            e.trade_confidence().as_str(),
            &e.remarks,
        ];
        wtr.write_record(row)?;
    }
    finish(wtr)
}

/// Snapshot aggregates; per-strike rows and the raw chain stay in JSON.
pub fn export_snapshots_csv(data: &StoreData) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "close",
        "atm",
        "sniper",
        "total_call_ltp",
        "total_put_ltp",
        "call_volume",
        "put_volume",
        "call_oi",
        "put_oi",
        "pcr",
        "trap_flag",
        "trap_note",
        "recommendation",
        "chain_hash",
    ])?;
    for s in &data.snapshots {
        let row: &[&str] = &[
            &s.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            &opt_f64(s.close),
            &s.atm.map(|v| v.to_string()).unwrap_or_default(),
            &opt_f64(s.sniper),
            &format!("{:.2}", s.total_call_ltp),
            &format!("{:.2}", s.total_put_ltp),
            &s.call_volume.to_string(),
            &s.put_volume.to_string(),
            &s.call_oi.to_string(),
            &s.put_oi.to_string(),
            &format!("{:.4}", s.pcr),
            &s.trap_flag.to_string(),
            &s.trap_note,
            s.recommendation.as_str(),
            s.chain_hash.as_str(),
        ];
        wtr.write_record(row)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `store.json` plus one CSV per signal family into `output_dir`.
///
/// Returns the written paths.
pub fn write_exports(data: &StoreData, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create export dir: {}", output_dir.display()))?;

    let files = [
        ("store.json", export_json(data)?),
        ("flows.csv", export_flows_csv(data)?),
        ("traps.csv", export_traps_csv(data)?),
        ("sniper.csv", export_sniper_csv(data)?),
        ("reversals.csv", export_reversals_csv(data)?),
        ("snapshots.csv", export_snapshots_csv(data)?),
    ];
    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = output_dir.join(name);
        std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Markdown summary of everything stored for one session.
pub fn generate_report(data: &StoreData, date: NaiveDate) -> String {
    let mut md = String::with_capacity(2048);
    md.push_str(&format!("# Session Report — {date}\n\n"));

    md.push_str("## Institutional Flows\n\n");
    match data.flow_analyses.get(&date) {
        Some(a) => {
            md.push_str("| Field | Value |\n| --- | --- |\n");
            md.push_str(&format!("| FII net | {:.2} |\n", a.score.fii_net));
            md.push_str(&format!("| DII net | {:.2} |\n", a.score.dii_net));
            md.push_str(&format!("| Total z | {:.3} |\n", a.score.total_z));
            md.push_str(&format!("| Signal | {} |\n", a.score.signal));
            md.push_str(&format!("| Matched | {} |\n", match a.matched {
                Some(true) => "yes",
                Some(false) => "no",
                None => "unknown",
            }));
            md.push_str(&format!("| Idea | {} |\n", a.suggestion.strategy));
            md.push_str(&format!("| Confidence | {} |\n\n", a.suggestion.confidence));
        }
        None => md.push_str("No flow analysis.\n\n"),
    }

    md.push_str("## Trap\n\n");
    match data.traps.get(&date) {
        Some(t) if t.trap_type != TrapType::None => {
            md.push_str(&format!("**{}** (confidence {:.2})\n", t.trap_type.as_str(), t.confidence));
            if let Some(s) = t.stop_loss_support {
                md.push_str(&format!("- Stop-loss support: {s:.2}\n"));
            }
            if let Some(r) = t.stop_loss_resistance {
                md.push_str(&format!("- Stop-loss resistance: {r:.2}\n"));
            }
            if !t.related_news.is_empty() {
                md.push_str(&format!("- News: {}\n", t.related_news));
            }
            md.push('\n');
        }
        Some(_) => md.push_str("No trap.\n\n"),
        None => md.push_str("Not evaluated.\n\n"),
    }

    md.push_str("## Sniper\n\n");
    match data.sniper(date) {
        Some(setup) => {
            let lv = &setup.level;
            md.push_str(&format!(
                "ATM {} | sniper {:.2} | bands {:.2} / {:.2} | double {:.2} / {:.2} | bias {}\n\n",
                lv.atm, lv.sniper, lv.lower, lv.upper, lv.lower_double, lv.upper_double, lv.bias
            ));
            md.push_str("| Leg | Entry | SL | T1 | T2 | R/R | Conf | Action |\n");
            md.push_str("| --- | ---: | ---: | ---: | ---: | ---: | ---: | --- |\n");
            for t in &setup.trades {
                md.push_str(&format!(
                    "| {}@{} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {} | {} |\n",
                    t.side,
                    t.strike,
                    t.entry,
                    t.stoploss,
                    t.target1,
                    t.target2,
                    t.risk_reward,
                    t.confidence,
                    t.action
                ));
            }
            md.push('\n');
        }
        None => md.push_str("No sniper level.\n\n"),
    }

    md.push_str("## Latest Snapshot\n\n");
    match data.latest_snapshot_on(date) {
        Some(s) => {
            md.push_str(&format!(
                "{} | PCR {:.2} | {} | {}\n\n",
                s.timestamp.format("%H:%M"),
                s.pcr,
                s.recommendation,
                if s.trap_flag { s.trap_note.as_str() } else { "no chain trap" }
            ));
        }
        None => md.push_str("No snapshot.\n\n"),
    }

    md.push_str("## Reversals\n\n");
    let todays: Vec<_> = data.reversals.iter().filter(|e| e.reversal_date == date).collect();
    if todays.is_empty() {
        md.push_str("None.\n");
    }
    for e in todays {
        md.push_str(&format!(
            "- {} {}: {} → {} ({})\n",
            e.index, e.interval, e.from_trend, e.to_trend, e.momentum_bias
        ));
    }
    md
}
