//! # Compute indicators for the nearest expiry on file
//! oiflow indicators --data-dir data/chains --out logs/nifty.jsonl
//!
//! # Windowed buildup summary for one expiry
//! oiflow buildup --data-dir data/chains --expiry 2024-06-27 --session
//!
//! # Backtest max pain predictions against settlement prints
//! oiflow backtest --history logs/nifty.jsonl --settlements data/settlements.toml

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use oiflow::alerts::AlertMonitor;
use oiflow::backtest::{BacktestComparator, BacktestItem, BacktestReport, SettlementBook};
use oiflow::buildup::{classify, summarize_session, BuildupCategory};
use oiflow::config::AnalyticsConfig;
use oiflow::data::calendar::{is_trading_day, previous_trading_day};
use oiflow::data::{ChainLoader, OptionChainSnapshot, RecordLog};
use oiflow::indicators::{IndicatorEngine, IndicatorSet};

const SEPARATOR: &str = "------------------------------------------------------------";

#[derive(Parser)]
#[command(name = "oiflow")]
#[command(about = "Option-chain OI analytics: PCR, max pain, buildups, alerts")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute indicator sets from captured chain files
    Indicators {
        /// Directory of captured parquet chain files
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Restrict to one expiry (YYYY-MM-DD)
        #[arg(short, long)]
        expiry: Option<NaiveDate>,

        /// Append computed sets to this JSONL log
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Classify OI buildup across consecutive snapshots
    Buildup {
        /// Directory of captured parquet chain files
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Restrict to one expiry (YYYY-MM-DD)
        #[arg(short, long)]
        expiry: Option<NaiveDate>,

        /// Windowed session summary instead of pair-by-pair output
        #[arg(long)]
        session: bool,
    },

    /// Compare frozen max pain predictions against settlement prints
    Backtest {
        /// JSONL log of indicator sets, as written by `indicators --out`
        #[arg(long)]
        history: PathBuf,

        /// TOML settlement book
        #[arg(long)]
        settlements: PathBuf,
    },

    /// Check alert thresholds over captured snapshots
    Alerts {
        /// Directory of captured parquet chain files
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Restrict to one expiry (YYYY-MM-DD)
        #[arg(short, long)]
        expiry: Option<NaiveDate>,
    },

    /// Validate the configuration and print the effective values
    CheckConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oiflow=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Indicators {
            data_dir,
            expiry,
            out,
        } => run_indicators(&config, &data_dir, expiry, out.as_deref()),
        Commands::Buildup {
            data_dir,
            expiry,
            session,
        } => run_buildup(&config, &data_dir, expiry, session),
        Commands::Backtest {
            history,
            settlements,
        } => run_backtest(&config, &history, &settlements),
        Commands::Alerts { data_dir, expiry } => run_alerts(&config, &data_dir, expiry),
        Commands::CheckConfig => check_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig> {
    match path {
        Some(path) => AnalyticsConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(AnalyticsConfig::default()),
    }
}

/// Load the configured underlying's snapshots, restricted to one expiry:
/// the requested one, or the nearest on file.
fn load_chain(
    config: &AnalyticsConfig,
    data_dir: &Path,
    expiry: Option<NaiveDate>,
) -> Result<Vec<OptionChainSnapshot>> {
    let loader = ChainLoader::new(data_dir);
    let mut snapshots = loader
        .load_dir()
        .with_context(|| format!("loading chain files from {}", data_dir.display()))?;
    snapshots.retain(|s| s.underlying == config.underlying);
    if snapshots.is_empty() {
        bail!(
            "no snapshots for {} in {}",
            config.underlying,
            data_dir.display()
        );
    }

    let target = match expiry {
        Some(expiry) => expiry,
        None => snapshots
            .iter()
            .map(|s| s.expiry)
            .min()
            .context("no expiries on file")?,
    };
    snapshots.retain(|s| s.expiry == target);
    if snapshots.is_empty() {
        bail!("no snapshots for expiry {target}");
    }
    Ok(snapshots)
}

fn fmt_iv(iv: Option<f64>) -> String {
    match iv {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "-".to_string(),
    }
}

fn print_set(set: &IndicatorSet) {
    println!("{SEPARATOR}");
    println!(
        "{} {}  spot {}  captured {}",
        set.underlying, set.expiry, set.spot, set.computed_at
    );
    println!(
        "  PCR(OI) {:.3}   PCR(vol) {:.3}",
        set.pcr_oi, set.pcr_volume
    );
    println!(
        "  max pain {}   pin distance {:.2}%",
        set.max_pain,
        set.pin_distance_pct()
    );
    println!(
        "  ATM {}   call IV {}   put IV {}",
        set.atm_strike,
        fmt_iv(set.atm_call_iv),
        fmt_iv(set.atm_put_iv)
    );
    if set.skipped_sides > 0 {
        println!("  unpriced sides: {}", set.skipped_sides);
    }
}

fn run_indicators(
    config: &AnalyticsConfig,
    data_dir: &Path,
    expiry: Option<NaiveDate>,
    out: Option<&Path>,
) -> Result<()> {
    let snapshots = load_chain(config, data_dir, expiry)?;
    let engine = IndicatorEngine::new(config.indicators.clone());
    let log = out.map(|path| RecordLog::<IndicatorSet>::new(path));

    let mut computed = 0usize;
    for snapshot in &snapshots {
        let set = match engine.compute(snapshot) {
            Ok(set) => set,
            Err(err) => {
                warn!(captured_at = %snapshot.captured_at, "skipping snapshot: {err}");
                continue;
            }
        };
        print_set(&set);
        if let Some(log) = &log {
            log.append(&set)
                .with_context(|| format!("appending to {}", log.path().display()))?;
        }
        computed += 1;
    }
    println!("{SEPARATOR}");
    println!("{computed} of {} snapshots computed", snapshots.len());
    Ok(())
}

fn run_buildup(
    config: &AnalyticsConfig,
    data_dir: &Path,
    expiry: Option<NaiveDate>,
    session: bool,
) -> Result<()> {
    let snapshots = load_chain(config, data_dir, expiry)?;
    if snapshots.len() < 2 {
        bail!(
            "buildup needs at least two snapshots, found {}",
            snapshots.len()
        );
    }

    if session {
        let summary =
            summarize_session(&snapshots, config.session.window_minutes, &config.buildup)?;
        println!("{SEPARATOR}");
        println!(
            "{} {}  session {} to {}",
            summary.underlying, summary.expiry, summary.session_start, summary.session_end
        );
        for window in &summary.windows {
            println!(
                "  [{:>2}] {}  {:<14}  pairs {:>3}  bullish {:>4}  bearish {:>4}",
                window.index,
                window.starts_at.format("%H:%M"),
                window.dominant.as_str(),
                window.pairs,
                window.bullish_entries,
                window.bearish_entries
            );
        }
        println!("final trend: {}", summary.final_trend.as_str());
        return Ok(());
    }

    for pair in snapshots.windows(2) {
        let report = classify(&pair[0], &pair[1], &config.buildup)?;
        println!("{SEPARATOR}");
        println!(
            "{} to {}  dominant: {}",
            report.from,
            report.to,
            report.dominant().as_str()
        );
        for category in BuildupCategory::ALL {
            let count = report.category_count(category);
            if count > 0 {
                println!("  {:<14} {count}", category.as_str());
            }
        }
        if report.excluded_illiquid > 0 || report.unmatched_strikes > 0 {
            println!(
                "  excluded: {} illiquid, {} unmatched",
                report.excluded_illiquid, report.unmatched_strikes
            );
        }
    }
    Ok(())
}

fn run_backtest(config: &AnalyticsConfig, history: &Path, settlements: &Path) -> Result<()> {
    let sets: Vec<IndicatorSet> = RecordLog::new(history)
        .read_all()
        .with_context(|| format!("reading indicator history from {}", history.display()))?;
    if sets.is_empty() {
        bail!("indicator history {} is empty", history.display());
    }
    let book = SettlementBook::from_toml_file(settlements)
        .with_context(|| format!("reading settlement book from {}", settlements.display()))?;

    let mut by_expiry: BTreeMap<(String, NaiveDate), Vec<IndicatorSet>> = BTreeMap::new();
    for set in sets {
        by_expiry
            .entry((set.underlying.clone(), set.expiry))
            .or_default()
            .push(set);
    }

    let holidays: HashSet<NaiveDate> = config.holidays.iter().copied().collect();
    let mut labels = Vec::new();
    let mut items = Vec::new();
    for ((underlying, expiry), expiry_history) in by_expiry {
        // A holiday expiry settles on the preceding session's print.
        let settlement = book.settlement(expiry).or_else(|| {
            if is_trading_day(expiry, &holidays) {
                None
            } else {
                book.settlement(previous_trading_day(expiry, &holidays))
            }
        });
        let Some(settlement) = settlement else {
            warn!(%underlying, %expiry, "no settlement print, skipping expiry");
            continue;
        };
        labels.push((underlying, expiry));
        items.push(BacktestItem {
            history: expiry_history,
            settlement,
        });
    }
    if items.is_empty() {
        bail!("no expiry in the history has a settlement print");
    }

    let comparator = BacktestComparator::new(config.backtest.clone());
    let outcomes = comparator.evaluate_batch(&items);

    println!("{SEPARATOR}");
    for ((underlying, expiry), outcome) in labels.iter().zip(&outcomes) {
        match outcome {
            Ok(result) => println!(
                "{} {}  predicted {}  settled {}  error {:.2}%  {}",
                underlying,
                expiry,
                result.predicted,
                result.settlement,
                result.error_pct,
                if result.within_tolerance { "HIT" } else { "miss" }
            ),
            Err(err) => println!("{underlying} {expiry}  failed: {err}"),
        }
    }
    println!("{SEPARATOR}");
    print!("{}", BacktestReport::from_outcomes(&outcomes).summary());
    Ok(())
}

fn run_alerts(config: &AnalyticsConfig, data_dir: &Path, expiry: Option<NaiveDate>) -> Result<()> {
    let snapshots = load_chain(config, data_dir, expiry)?;
    let engine = IndicatorEngine::new(config.indicators.clone());
    let monitor = AlertMonitor::new(config.alerts.clone());

    let mut previous: Option<IndicatorSet> = None;
    let mut fired = 0usize;
    for snapshot in &snapshots {
        let set = match engine.compute(snapshot) {
            Ok(set) => set,
            Err(err) => {
                warn!(captured_at = %snapshot.captured_at, "skipping snapshot: {err}");
                continue;
            }
        };
        for event in monitor.check(previous.as_ref(), &set) {
            println!(
                "[{}] {}  {}",
                event.observed_at, event.underlying, event.message
            );
            fired += 1;
        }
        previous = Some(set);
    }
    println!("{SEPARATOR}");
    println!("{fired} alerts over {} snapshots", snapshots.len());
    Ok(())
}

fn check_config(config: &AnalyticsConfig) -> Result<()> {
    config.validate()?;
    println!("configuration OK");
    println!("  underlying:      {}", config.underlying);
    println!("  holidays:        {}", config.holidays.len());
    println!("  risk-free rate:  {}", config.indicators.risk_free_rate);
    println!("  dividend yield:  {}", config.indicators.dividend_yield);
    println!("  strike step:     {}", config.indicators.strike_step);
    println!("  session window:  {} min", config.session.window_minutes);
    println!(
        "  backtest:        lookback {} d, tolerance {}%",
        config.backtest.lookback_days, config.backtest.tolerance_pct
    );
    Ok(())
}
