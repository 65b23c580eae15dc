//! Confluence CLI: training jobs, single backtests and schedule inspection.
//!
//! Commands:
//! - `run`: walk-forward train weights for a list of symbols and persist them
//! - `backtest`: backtest one symbol over a date range, print stats and a threshold sweep
//! - `tune-atr`: tune one symbol's stop/target ATR multipliers
//! - `schedule`: print the walk-forward schedule for a reference time

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use confluence_core::backtest::run_backtest;
use confluence_core::data::{fetch_candles, CandleSource, CsvSource, OandaSource, SyntheticSource};
use confluence_core::domain::{Candle, HistoricalSignal, WeightVector};
use confluence_runner::job::{LOOKAHEAD_DAYS, WARMUP_DAYS};
use confluence_runner::{
    build_schedule, optimal_threshold, run_job, threshold_sweep, tune_atr_multipliers, AtrTuningConfig, DateRange,
    FileGateway, JobConfig, JobResult, MemoryGateway, PersistenceGateway, SignalStats, SymbolStatus,
    MIN_SWEEP_SIGNALS, SWEEP_THRESHOLDS,
};

#[derive(Parser)]
#[command(name = "confluence", about = "Confluence CLI: adaptive signal-confidence training")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    /// OANDA v3 REST API (needs OANDA_API_KEY).
    Oanda,
    /// One `<SYMBOL>.csv` per symbol under --data-dir.
    Csv,
    /// Deterministic synthetic candles.
    Synthetic,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk-forward train weights for each symbol and persist the results.
    Run {
        /// Path to a TOML job file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbols to train (overrides the job file), e.g. --symbol EURUSD --symbol USDJPY.
        #[arg(long = "symbol")]
        symbols: Vec<String>,

        /// Optimizer learning rate.
        #[arg(long)]
        learning_rate: Option<f64>,

        /// Optimizer iteration budget.
        #[arg(long)]
        iterations: Option<usize>,

        /// Run symbols in parallel.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Reference time (RFC 3339 or YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        now: Option<String>,

        #[arg(long, value_enum, default_value_t = SourceKind::Oanda)]
        source: SourceKind,

        /// Candle directory for --source csv.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory for weights.json and training_log.jsonl. Without it, nothing is persisted.
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Write the JSON result here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Backtest one symbol and print statistics with a confidence-threshold sweep.
    Backtest {
        #[arg(long)]
        symbol: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD), exclusive.
        #[arg(long)]
        end: String,

        /// JSON weight vector. Defaults to the built-in weights.
        #[arg(long)]
        weights: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = SourceKind::Oanda)]
        source: SourceKind,

        /// Candle directory for --source csv.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Tune the stop-loss and take-profit ATR multipliers for one symbol.
    TuneAtr {
        #[arg(long)]
        symbol: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD), exclusive.
        #[arg(long)]
        end: String,

        /// JSON weight vector. Defaults to the built-in weights.
        #[arg(long)]
        weights: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = SourceKind::Oanda)]
        source: SourceKind,

        /// Candle directory for --source csv.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Write the JSON result here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the walk-forward schedule.
    Schedule {
        /// Reference time (RFC 3339 or YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        now: Option<String>,

        #[arg(long, default_value_t = 3)]
        training_months: u32,

        #[arg(long, default_value_t = 1)]
        test_months: u32,

        #[arg(long, default_value_t = 4)]
        total_months: u32,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            symbols,
            learning_rate,
            iterations,
            parallel,
            now,
            source,
            data_dir,
            store_dir,
            output,
        } => {
            let mut job = match config {
                Some(path) => JobConfig::from_file(&path)?,
                None => JobConfig::default(),
            };
            if !symbols.is_empty() {
                job.symbols = symbols;
            }
            if let Some(lr) = learning_rate {
                job.optimizer.learning_rate = lr;
            }
            if let Some(n) = iterations {
                job.optimizer.iterations = n;
            }
            job.parallel |= parallel;
            let now = now.as_deref().map(parse_time).transpose()?.unwrap_or_else(Utc::now);
            run_training(&job, now, source, &data_dir, store_dir.as_deref(), output.as_deref())
        }
        Commands::Backtest {
            symbol,
            start,
            end,
            weights,
            source,
            data_dir,
        } => run_backtest_cmd(&symbol, &start, &end, weights.as_deref(), source, &data_dir),
        Commands::TuneAtr {
            symbol,
            start,
            end,
            weights,
            source,
            data_dir,
            output,
        } => run_tune_atr(&symbol, &start, &end, weights.as_deref(), source, &data_dir, output.as_deref()),
        Commands::Schedule {
            now,
            training_months,
            test_months,
            total_months,
        } => {
            let now = now.as_deref().map(parse_time).transpose()?.unwrap_or_else(Utc::now);
            print_schedule(now, training_months, test_months, total_months)
        }
    }
}

fn make_source(kind: SourceKind, data_dir: &Path, granularity: &str) -> Result<Box<dyn CandleSource>> {
    Ok(match kind {
        SourceKind::Oanda => Box::new(OandaSource::from_env()?.with_granularity(granularity)),
        SourceKind::Csv => Box::new(CsvSource::new(data_dir)),
        SourceKind::Synthetic => Box::new(SyntheticSource::default()),
    })
}

fn run_training(
    job: &JobConfig,
    now: DateTime<Utc>,
    source: SourceKind,
    data_dir: &Path,
    store_dir: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let source = make_source(source, data_dir, &job.granularity)?;
    let gateway: Box<dyn PersistenceGateway> = match store_dir {
        Some(dir) => Box::new(FileGateway::new(dir)),
        None => {
            info!("no --store-dir given, results are not persisted");
            Box::new(MemoryGateway::new())
        }
    };

    let result = run_job(job, now, source.as_ref(), gateway.as_ref())?;
    print_job_summary(&result);

    let json = serde_json::to_string_pretty(&result)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Result saved to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Candles and signals entered in `[start, end)` for one symbol.
///
/// Candles are fetched with warmup before the range and lookahead after it,
/// so entries near the end still resolve.
fn load_signals(
    symbol: &str,
    range: &DateRange,
    weights_path: Option<&Path>,
    source: SourceKind,
    data_dir: &Path,
    threshold: f64,
) -> Result<(Vec<Candle>, Vec<HistoricalSignal>)> {
    let weights = match weights_path {
        Some(path) => {
            let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<WeightVector>(&content)?
        }
        None => WeightVector::default(),
    };

    let job = JobConfig::default();
    let source = make_source(source, data_dir, &job.granularity)?;
    let candles = fetch_candles(
        source.as_ref(),
        symbol,
        range.start - Duration::days(WARMUP_DAYS),
        range.end + Duration::days(LOOKAHEAD_DAYS),
        job.chunk_days,
    );
    if candles.is_empty() {
        bail!("no candles for {symbol} in {range}");
    }

    let mut backtest = job.backtest;
    backtest.threshold = threshold;
    let mut signals = run_backtest(symbol, &candles, &weights, &backtest);
    signals.retain(|s| range.contains(s.entry_time));
    Ok((candles, signals))
}

fn parse_range(start: &str, end: &str) -> Result<DateRange> {
    let range = DateRange::new(parse_time(start)?, parse_time(end)?);
    if range.is_empty() {
        bail!("--start must be before --end");
    }
    Ok(range)
}

fn run_backtest_cmd(
    symbol: &str,
    start: &str,
    end: &str,
    weights_path: Option<&Path>,
    source: SourceKind,
    data_dir: &Path,
) -> Result<()> {
    let range = parse_range(start, end)?;
    // Gate at the lowest sweep threshold so the sweep sees every candidate.
    let (candles, signals) = load_signals(symbol, &range, weights_path, source, data_dir, SWEEP_THRESHOLDS[0])?;

    let threshold = JobConfig::default().backtest.threshold;
    let gated: Vec<_> = signals.iter().filter(|s| s.confidence >= threshold).cloned().collect();
    print_stats(symbol, &range, candles.len(), &SignalStats::compute(&gated));

    let rows = threshold_sweep(&signals, &SWEEP_THRESHOLDS);
    println!();
    println!("--- Threshold Sweep (>= {MIN_SWEEP_SIGNALS} signals) ---");
    println!(
        "{:>9} {:>7} {:>9} {:>10} {:>8} {:>8} {:>9}",
        "threshold", "signals", "win rate", "total P&L", "sharpe", "PF", "composite"
    );
    for row in &rows {
        println!(
            "{:>9.0} {:>7} {:>8.1}% {:>9.2}% {:>8.3} {:>8.2} {:>9.2}",
            row.threshold,
            row.stats.count,
            row.stats.win_rate * 100.0,
            row.stats.total_pnl,
            row.stats.sharpe,
            row.stats.profit_factor,
            row.composite
        );
    }

    match optimal_threshold(&rows) {
        Some(best) => {
            println!();
            println!("Optimal Threshold: {:.0}", best.threshold);
            println!(
                "  {} signals, {:.1}% win rate, {:.3}% avg P&L, PF {:.2}",
                best.stats.count,
                best.stats.win_rate * 100.0,
                best.stats.avg_pnl,
                best.stats.profit_factor
            );
            for (label, dir) in [("BUY", &best.stats.buy), ("SELL", &best.stats.sell)] {
                if dir.count > 0 {
                    println!(
                        "  {label:<4} {} signals, {:.1}% win rate, {:.2}% P&L",
                        dir.count,
                        dir.win_rate * 100.0,
                        dir.total_pnl
                    );
                }
            }
        }
        None => println!("No threshold kept {MIN_SWEEP_SIGNALS} or more signals."),
    }
    Ok(())
}

fn run_tune_atr(
    symbol: &str,
    start: &str,
    end: &str,
    weights_path: Option<&Path>,
    source: SourceKind,
    data_dir: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let range = parse_range(start, end)?;
    let job = JobConfig::default();
    let (candles, signals) = load_signals(symbol, &range, weights_path, source, data_dir, job.backtest.threshold)?;

    let config = AtrTuningConfig::default();
    let Some(tuning) = tune_atr_multipliers(symbol, &signals, &candles, &job.backtest.simulator, &config) else {
        bail!(
            "{symbol}: only {} signals in {range}, need {}",
            signals.len(),
            config.min_signals
        );
    };

    println!();
    println!("=== ATR Multipliers: {symbol} ===");
    println!("Signals:        {}", tuning.signals);
    println!("Stop Loss:      {:.2} x ATR", tuning.sl_atr);
    println!("Take Profit:    {:.2} x ATR", tuning.tp_atr);
    println!("Reward/Risk:    1:{:.2}", tuning.reward_risk);
    println!(
        "Win Rate:       {:.1}% -> {:.1}%",
        tuning.baseline.win_rate * 100.0,
        tuning.tuned.win_rate * 100.0
    );
    println!("Total P&L:      {:.2}% -> {:.2}%", tuning.baseline.total_pnl, tuning.tuned.total_pnl);
    println!("Score:          {:.2} -> {:.2}", tuning.initial_score, tuning.score);

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&tuning)?)
            .with_context(|| format!("writing {}", path.display()))?;
        eprintln!("Result saved to: {}", path.display());
    }
    Ok(())
}

fn print_schedule(now: DateTime<Utc>, training: u32, test: u32, total: u32) -> Result<()> {
    let schedule = build_schedule(now, training, test, total);
    if schedule.is_empty() {
        bail!("no cycle fits: need total >= training + test and non-zero windows");
    }
    println!("Reference: {}", now.to_rfc3339());
    for cycle in &schedule {
        let months: Vec<String> = cycle.training.split_months().iter().map(DateRange::label).collect();
        println!(
            "Cycle {}: train {} [{}]  test {}",
            cycle.index,
            cycle.training,
            months.join(", "),
            cycle.test
        );
    }
    Ok(())
}

fn print_stats(symbol: &str, range: &DateRange, candles: usize, stats: &SignalStats) {
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {symbol}");
    println!("Period:         {range}");
    println!("Candles:        {candles}");
    println!("Signals:        {} ({} BUY / {} SELL)", stats.count, stats.buy.count, stats.sell.count);
    println!("Outcomes:       {} TP / {} SL / {} timed out", stats.wins, stats.losses, stats.timed_out);
    println!();
    println!("--- Performance ---");
    println!("Win Rate:       {:.1}%", stats.win_rate * 100.0);
    println!("Total P&L:      {:.2}%", stats.total_pnl);
    println!("Avg P&L:        {:.3}%", stats.avg_pnl);
    println!("Sharpe:         {:.3}", stats.sharpe);
    println!("Profit Factor:  {:.2}", stats.profit_factor);
    println!("Max Drawdown:   {:.2}%", stats.max_drawdown);
}

fn print_job_summary(result: &JobResult) {
    eprintln!();
    eprintln!("=== Training Job {} ===", &result.run_id[..12.min(result.run_id.len())]);
    eprintln!("Training:       {}", result.cycle.training);
    eprintln!("Test:           {}", result.cycle.test);
    for symbol in &result.symbols {
        let lift = match (&symbol.status, &symbol.test) {
            (SymbolStatus::Skipped, _) | (_, None) => "-".to_string(),
            (_, Some(t)) => format!("{:+.1}pp win rate", t.win_rate_lift),
        };
        eprintln!("{:<10} {:<8} {}", symbol.symbol, format!("{:?}", symbol.status), lift);
    }
    eprintln!("Status:         {:?}", result.status);
}

/// RFC 3339 timestamp or a `YYYY-MM-DD` date at midnight UTC.
fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))?;
    match date.and_hms_opt(0, 0, 0) {
        Some(t) => Ok(t.and_utc()),
        None => bail!("invalid date '{s}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_dates_and_timestamps() {
        assert_eq!(parse_time("2025-10-17").unwrap(), Utc.with_ymd_and_hms(2025, 10, 17, 0, 0, 0).unwrap());
        assert_eq!(
            parse_time("2025-10-17T09:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 10, 17, 7, 30, 0).unwrap()
        );
        assert!(parse_time("17/10/2025").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "confluence",
            "run",
            "--symbol",
            "EURUSD",
            "--symbol",
            "USDJPY",
            "--iterations",
            "50",
            "--source",
            "synthetic",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { symbols, iterations, .. } => {
                assert_eq!(symbols, vec!["EURUSD", "USDJPY"]);
                assert_eq!(iterations, Some(50));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn cli_parses_tune_atr() {
        let cli = Cli::try_parse_from([
            "confluence",
            "tune-atr",
            "--symbol",
            "XAUUSD",
            "--start",
            "2025-05-01",
            "--end",
            "2025-09-01",
            "--source",
            "synthetic",
        ])
        .unwrap();
        match cli.command {
            Commands::TuneAtr { symbol, start, output, .. } => {
                assert_eq!(symbol, "XAUUSD");
                assert_eq!(start, "2025-05-01");
                assert!(output.is_none());
            }
            _ => panic!("expected tune-atr"),
        }
    }

    #[test]
    fn backtest_signals_near_range_end_resolve() {
        let range = parse_range("2024-03-01", "2024-04-01").unwrap();
        let (candles, signals) =
            load_signals("EUR_USD", &range, None, SourceKind::Synthetic, Path::new("data"), SWEEP_THRESHOLDS[0]).unwrap();
        assert!(candles.last().unwrap().timestamp >= range.end);
        assert!(signals.iter().all(|s| range.contains(s.entry_time)));

        // without lookahead the last horizon's worth of entries is lost
        let cut = candles.partition_point(|c| c.timestamp < range.end);
        let mut backtest = JobConfig::default().backtest;
        backtest.threshold = SWEEP_THRESHOLDS[0];
        let truncated = run_backtest("EUR_USD", &candles[..cut], &WeightVector::default(), &backtest);
        let horizon_start = candles[cut - backtest.simulator.horizon].timestamp;
        assert!(truncated.iter().all(|s| s.entry_time < horizon_start));
        for s in truncated.iter().filter(|s| range.contains(s.entry_time)) {
            assert!(signals.iter().any(|t| t == s));
        }
    }

    #[test]
    fn empty_range_is_rejected() {
        assert!(parse_range("2025-02-01", "2025-01-01").is_err());
    }
}
