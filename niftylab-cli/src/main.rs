//! NiftyLab CLI: ingest, analyze and export commands.
//!
//! Commands:
//! - `init-config`: write a default `niftylab.toml`
//! - `ingest`: cache `prices.csv` as Parquet
//! - `flows`, `traps`, `sniper`, `backfill`, `snapshot`, `reversals`: one pipeline stage each
//! - `intraday`: slot traps, time-slot suggestions and the probability score
//! - `run-all`: every stage for one session
//! - `export`, `report`: CSV/JSON artifacts and a Markdown session report

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use niftylab_core::data::{parse_date, ParquetCache};
use niftylab_core::trap::DateRange;
use niftylab_runner::data_loader::CACHE_DIR;
use niftylab_runner::{
    generate_report, ingest_to_cache, load_dataset, write_exports, JsonFileStore, LoadedDataset,
    Pipeline, PipelineConfig, ReversalDashboard, SignalStore, Sources,
};

#[derive(Parser)]
#[command(
    name = "niftylab",
    about = "NiftyLab CLI: index flow, trap, sniper and reversal signals"
)]
struct Cli {
    /// Path to the TOML config. Missing file means defaults.
    #[arg(long, global = true, default_value = "niftylab.toml")]
    config: PathBuf,

    /// Log filter (e.g. "debug", "niftylab_runner=debug"). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration.
    InitConfig {
        #[arg(long, default_value = "niftylab.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Ingest prices.csv from the dataset directory into the Parquet cache.
    Ingest,
    #[command(flatten)]
    Session(SessionCommand),
}

/// Commands that run against a loaded dataset and the signal store.
#[derive(Subcommand)]
enum SessionCommand {
    /// Normalize and reconcile institutional flows.
    Flows,
    /// Detect price-level traps.
    Traps {
        /// First date (inclusive).
        #[arg(long)]
        start: Option<String>,
        /// Last date (inclusive).
        #[arg(long)]
        end: Option<String>,
    },
    /// Compute sniper bands and trades for one session. Defaults to today.
    Sniper {
        #[arg(long)]
        date: Option<String>,
    },
    /// Recompute sniper levels for the recent sessions ending at `--end`.
    Backfill {
        #[arg(long)]
        end: Option<String>,
    },
    /// Capture an options-chain snapshot. Defaults to now.
    Snapshot {
        /// Capture time, "YYYY-MM-DD HH:MM".
        #[arg(long)]
        at: Option<String>,
    },
    /// Detect and store trend reversals, then show the dashboard.
    Reversals {
        /// Index for the dashboard. Defaults to the primary index.
        #[arg(long)]
        index: Option<String>,
    },
    /// Intraday report for one session. Defaults to today.
    Intraday {
        #[arg(long)]
        date: Option<String>,
    },
    /// Run every stage for one session.
    RunAll {
        /// Capture time, "YYYY-MM-DD HH:MM". Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Write store.json and CSV tables.
    Export {
        #[arg(long, default_value = "exports")]
        output_dir: PathBuf,
    },
    /// Print the Markdown session report.
    Report {
        #[arg(long)]
        date: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::InitConfig { output, force } => run_init_config(&output, force),
        Commands::Ingest => run_ingest(&cli.config),
        Commands::Session(command) => Session::open(&cli.config)?.dispatch(command, cli.json),
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_day(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(s) => parse_date(s).with_context(|| format!("invalid date '{s}'")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn parse_at(raw: Option<&str>) -> Result<NaiveDateTime> {
    match raw {
        Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .with_context(|| format!("invalid timestamp '{s}' (expected YYYY-MM-DD HH:MM)")),
        None => Ok(chrono::Local::now().naive_local()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", output.display());
    }
    let toml = PipelineConfig::default().to_toml()?;
    std::fs::write(output, toml).with_context(|| format!("failed to write {}", output.display()))?;
    println!("Default config written to: {}", output.display());
    Ok(())
}

fn run_ingest(config_path: &Path) -> Result<()> {
    let config = PipelineConfig::load_or_default(config_path)?;
    let metas = ingest_to_cache(&config.data.dir)?;
    let cache = ParquetCache::new(config.data.dir.join(CACHE_DIR));

    println!("Cache: {}", cache.cache_dir().display());
    println!("{:<12} {:<6} {:<25} {:>8}", "Index", "Iv", "Date Range", "Bars");
    println!("{}", "-".repeat(54));
    for m in &metas {
        println!(
            "{:<12} {:<6} {:<25} {:>8}",
            m.index,
            m.interval,
            format!("{} to {}", m.start_date, m.end_date),
            m.bar_count
        );
    }
    Ok(())
}

/// Config, dataset and store for one invocation.
struct Session {
    config: PipelineConfig,
    loaded: LoadedDataset,
    store: JsonFileStore,
}

impl Session {
    fn open(config_path: &Path) -> Result<Self> {
        let config = PipelineConfig::load_or_default(config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?;
        let loaded = load_dataset(&config.data.dir)
            .with_context(|| format!("failed to load dataset {}", config.data.dir.display()))?;
        let store = JsonFileStore::open(&config.data.store_path)
            .with_context(|| format!("failed to open store {}", config.data.store_path.display()))?;
        info!(
            config = %config_path.display(),
            fingerprint = %config.fingerprint()?,
            dataset = %loaded.dataset_hash,
            "session opened"
        );
        Ok(Self {
            config,
            loaded,
            store,
        })
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.config, Sources::single(&self.loaded.source), &self.store)
    }

    fn dispatch(&self, command: SessionCommand, json: bool) -> Result<()> {
        let pipeline = self.pipeline();
        match command {
            SessionCommand::Flows => {
                let report = pipeline.run_flows()?;
                if json {
                    return print_json(&report);
                }
                println!("Flow analyses: {} ({} without a price bar)", report.analyses, report.unmatched_dates);
                if let Some(a) = &report.latest {
                    println!(
                        "Latest {}: total_z {:.3} → {} | matched: {} | {}",
                        a.date(),
                        a.score.total_z,
                        a.signal(),
                        a.matched.map_or("unknown".to_string(), |m| m.to_string()),
                        a.suggestion.strategy
                    );
                }
            }
            SessionCommand::Traps { start, end } => {
                let range = match (start.as_deref(), end.as_deref()) {
                    (None, None) => DateRange::all(),
                    (s, e) => DateRange {
                        start: s.map(|s| parse_day(Some(s))).transpose()?,
                        end: e.map(|e| parse_day(Some(e))).transpose()?,
                    },
                };
                let report = pipeline.run_traps(range)?;
                if json {
                    return print_json(&report);
                }
                println!("Evaluated {} sessions, {} trap(s)", report.evaluated, report.detected);
            }
            SessionCommand::Sniper { date } => {
                let date = parse_day(date.as_deref())?;
                let setup = pipeline.run_sniper(date)?;
                if json {
                    return print_json(&setup);
                }
                match setup {
                    Some(s) => {
                        let lv = &s.level;
                        println!(
                            "{} close {:.2} ATM {} sniper {:.2} bands {:.2}/{:.2} double {:.2}/{:.2} bias {}",
                            lv.date, lv.close_price, lv.atm, lv.sniper, lv.lower, lv.upper, lv.lower_double, lv.upper_double, lv.bias
                        );
                        for t in &s.trades {
                            println!(
                                "  {}@{:<6} entry {:>8.2} SL {:>8.2} T1 {:>8.2} T2 {:>8.2} {:<8} conf {:>3} {}",
                                t.side,
                                t.strike,
                                t.entry,
                                t.stoploss,
                                t.target1,
                                t.target2,
                                t.risk_reward_label(),
                                t.confidence,
                                t.action
                            );
                        }
                    }
                    None => println!("No sniper level for {date} (missing daily bar or option chain)"),
                }
            }
            SessionCommand::Backfill { end } => {
                let report = pipeline.backfill_sniper(parse_day(end.as_deref())?)?;
                if json {
                    return print_json(&report);
                }
                println!(
                    "Backfill: {} session(s), {} computed, {} skipped",
                    report.sessions,
                    report.computed.len(),
                    report.skipped.len()
                );
            }
            SessionCommand::Snapshot { at } => {
                let snap = pipeline.capture_snapshot(parse_at(at.as_deref())?)?;
                if json {
                    return print_json(&snap);
                }
                match snap {
                    Some(s) => println!(
                        "{} PCR {:.2} calls {:.2} puts {:.2} → {}{}",
                        s.timestamp.format("%Y-%m-%d %H:%M"),
                        s.pcr,
                        s.total_call_ltp,
                        s.total_put_ltp,
                        s.recommendation,
                        if s.trap_flag { format!(" | trap: {}", s.trap_note) } else { String::new() }
                    ),
                    None => println!("No option chain available; nothing captured"),
                }
            }
            SessionCommand::Reversals { index } => {
                let run = pipeline.run_reversals()?;
                let index = index.unwrap_or_else(|| self.config.primary_index().to_string());
                let dash = pipeline.reversal_dashboard(&index)?;
                if json {
                    return print_json(&(run, dash));
                }
                println!("Reversals: {} detected, {} new", run.detected, run.inserted);
                print_dashboard(&dash);
            }
            SessionCommand::Intraday { date } => {
                let report = pipeline.intraday_report(parse_day(date.as_deref())?)?;
                if json {
                    return print_json(&report);
                }
                for line in &report.recap {
                    println!("{line}");
                }
                println!(
                    "{} {} ({}) probability {}%{}",
                    report.index,
                    report.date,
                    report.interval,
                    report.probability,
                    report.flow_trend.map_or(String::new(), |t| format!(" | flows: {t}"))
                );
                println!("{}", report.narrative);
                if let Some(plan) = &report.trade_plan {
                    println!("Plan: {}", plan.summary());
                }
                if let Some(w) = &report.warning {
                    println!("Warning: {w}");
                }
                for t in &report.traps {
                    println!("  {} {:>8.2} {}", t.time, t.points, t.annotation);
                }
                for s in &report.suggestions {
                    println!("  {} {} ({}%, {} samples)", s.time, s.action, s.confidence, s.samples);
                }
            }
            SessionCommand::RunAll { at } => {
                let report = pipeline.run_all(parse_at(at.as_deref())?)?;
                if json {
                    return print_json(&report);
                }
                println!("Flows: {} analyses", report.flows.analyses);
                println!("Traps: {} evaluated, {} detected", report.traps.evaluated, report.traps.detected);
                println!(
                    "Sniper: {}",
                    report
                        .sniper
                        .as_ref()
                        .map_or("unavailable".to_string(), |s| format!("ATM {} ({} trades)", s.level.atm, s.trades.len()))
                );
                println!(
                    "Snapshot: {}",
                    report
                        .snapshot
                        .as_ref()
                        .map_or("skipped".to_string(), |s| s.recommendation.to_string())
                );
                println!("Reversals: {} detected, {} new", report.reversals.detected, report.reversals.inserted);
            }
            SessionCommand::Export { output_dir } => {
                let data = self.store.load_all()?;
                let written = write_exports(&data, &output_dir)?;
                for path in written {
                    println!("Wrote {}", path.display());
                }
            }
            SessionCommand::Report { date } => {
                let data = self.store.load_all()?;
                println!("{}", generate_report(&data, parse_day(date.as_deref())?));
            }
        }
        Ok(())
    }
}

fn print_dashboard(dash: &ReversalDashboard) {
    let s = &dash.summary;
    println!(
        "{}: {} events ({} bullish, {} bearish), avg new streak {:.2}, total change {:.2}",
        dash.index, s.total, s.bullish, s.bearish, s.avg_new_streak, s.total_new_change
    );
    if let Some(e) = &dash.latest {
        println!(
            "Latest daily: {} {} → {} | {} | {}",
            e.reversal_date,
            e.from_trend,
            e.to_trend,
            e.momentum_bias,
            e.trade_confidence()
        );
    }
    for (name, pivot) in [
        ("Daily", &dash.daily_pivot),
        ("Weekly", &dash.weekly_pivot),
        ("Hourly", &dash.hourly_pivot),
    ] {
        if let Some(p) = pivot {
            println!(
                "{name:<7} P {:.2} R1 {:.2} S1 {:.2} R2 {:.2} S2 {:.2} → {} ({})",
                p.p,
                p.r1,
                p.s1,
                p.r2,
                p.s2,
                p.sentiment,
                p.hint()
            );
        }
    }
    println!(
        "Confluence: {} ({}) {}",
        dash.confluence,
        dash.confluence.description(),
        dash.confluence.plan()
    );
}
