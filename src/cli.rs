//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestResult, StrategyRule, run_backtest};
use crate::domain::config_validation::{parse_max_pivot_age, parse_rule_name, validate_config};
use crate::domain::error::EngineError;
use crate::domain::metrics::Metrics;
use crate::domain::pipeline::{LiveAnalysis, StrategyParams, latest_signal};
use crate::domain::pullback::PullbackParams;
use crate::domain::scan::{
    Ranking, ScanReport, ScanSource, collect_changes, parse_symbols, rank_by_return, rank_movers,
    scan_symbols,
};
use crate::logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "pivotrader", about = "Pivot-breakout signal and backtest engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Write a JSON report (candles, signals, result) to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Evaluate the signal rule on the latest candle
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Backtest many symbols in parallel and rank them by return
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated list; defaults to [market] symbols
        #[arg(long)]
        symbols: Option<String>,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Rank symbols by percentage price change
    Movers {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbols: Option<String>,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            output,
            data_dir,
        } => run_backtest_command(&config, symbol.as_deref(), output.as_deref(), data_dir),
        Command::Signal {
            config,
            symbol,
            data_dir,
        } => run_signal_command(&config, symbol.as_deref(), data_dir),
        Command::Scan {
            config,
            symbols,
            top,
            data_dir,
        } => run_scan_command(&config, symbols.as_deref(), top, data_dir),
        Command::Movers {
            config,
            symbols,
            top,
            data_dir,
        } => run_movers_command(&config, symbols.as_deref(), top, data_dir),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: EngineError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

/// Loads, validates and starts logging from the config at `path`.
fn prepare(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    let adapter = load_config(path)?;
    init_logging(&adapter);
    validate_config(&adapter).map_err(fail)?;
    Ok(adapter)
}

pub fn init_logging(config: &dyn ConfigPort) {
    let level = config
        .get_string("logging", "level")
        .unwrap_or_else(|| "info".to_string());
    let json = config.get_bool("logging", "json", false);
    logging::init(&level, json);
}

/// Where candles come from and how many to load.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub timeframe: String,
    pub candle_limit: usize,
    pub data_dir: PathBuf,
}

fn get_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, EngineError> {
    let value = config.get_int(section, key, default as i64);
    match usize::try_from(value) {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err(EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be at least 1"),
        }),
    }
}

pub fn build_market_settings(
    config: &dyn ConfigPort,
    data_dir_override: Option<PathBuf>,
) -> Result<MarketSettings, EngineError> {
    let timeframe = config
        .get_string("market", "timeframe")
        .unwrap_or_else(|| "1h".to_string());
    let data_dir = data_dir_override
        .or_else(|| config.get_string("market", "data_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data"));

    Ok(MarketSettings {
        timeframe,
        candle_limit: get_count(config, "market", "candle_limit", 1000)?,
        data_dir,
    })
}

pub fn build_strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, EngineError> {
    let defaults = StrategyParams::default();
    Ok(StrategyParams {
        pivot_left: get_count(config, "strategy", "pivot_left", defaults.pivot_left)?,
        pivot_right: get_count(config, "strategy", "pivot_right", defaults.pivot_right)?,
        atr_period: get_count(config, "strategy", "atr_period", defaults.atr_period)?,
        atr_multiplier: config.get_double("strategy", "atr_multiplier", defaults.atr_multiplier),
        trend_ema_period: get_count(
            config,
            "strategy",
            "trend_ema_period",
            defaults.trend_ema_period,
        )?,
        rsi_period: get_count(config, "strategy", "rsi_period", defaults.rsi_period)?,
        volume_lookback: get_count(
            config,
            "strategy",
            "volume_lookback",
            defaults.volume_lookback,
        )?,
        vol_multiplier: config.get_double("strategy", "vol_multiplier", defaults.vol_multiplier),
        sl_pct: config.get_double("strategy", "sl_pct", defaults.sl_pct),
        tp_pct: config.get_double("strategy", "tp_pct", defaults.tp_pct),
        half_close_pct: config.get_double("strategy", "half_close_pct", defaults.half_close_pct),
        max_pivot_age: parse_max_pivot_age(config)?,
    })
}

pub fn build_pullback_params(config: &dyn ConfigPort) -> Result<PullbackParams, EngineError> {
    let defaults = PullbackParams::default();
    Ok(PullbackParams {
        trend_ema_period: get_count(
            config,
            "pullback",
            "trend_ema_period",
            defaults.trend_ema_period,
        )?,
        entry_rsi_period: get_count(
            config,
            "pullback",
            "entry_rsi_period",
            defaults.entry_rsi_period,
        )?,
        exit_rsi_period: get_count(config, "pullback", "exit_rsi_period", defaults.exit_rsi_period)?,
        entry_rsi_below: config.get_double("pullback", "entry_rsi_below", defaults.entry_rsi_below),
        exit_rsi_above: config.get_double("pullback", "exit_rsi_above", defaults.exit_rsi_above),
        stop_pct: config.get_double("pullback", "stop_pct", defaults.stop_pct),
    })
}

/// `[strategy] rule`, with `[pullback]` tunables for the pullback rule.
pub fn build_strategy_rule(config: &dyn ConfigPort) -> Result<StrategyRule, EngineError> {
    match parse_rule_name(config)?.as_str() {
        "rsi_pullback" => Ok(StrategyRule::RsiPullback(build_pullback_params(config)?)),
        _ => Ok(StrategyRule::PivotBreakout),
    }
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, EngineError> {
    Ok(BacktestConfig {
        strategy: build_strategy_params(config)?,
        rule: build_strategy_rule(config)?,
        initial_capital: config.get_double("backtest", "initial_capital", 1000.0),
    })
}

/// Single symbol for `backtest`/`signal`: the override, else `[market] symbol`,
/// else the first entry of `[market] symbols`.
pub fn resolve_symbol(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, EngineError> {
    if let Some(s) = symbol_override {
        return Ok(s.trim().to_uppercase());
    }
    if let Some(s) = config.get_string("market", "symbol") {
        let s = s.trim().to_uppercase();
        if !s.is_empty() {
            return Ok(s);
        }
    }
    resolve_symbols(None, config)?
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::ConfigMissing {
            section: "market".into(),
            key: "symbol".into(),
        })
}

/// Symbol list for `scan`/`movers`: the override, else `[market] symbols`,
/// else `[market] symbol`.
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, EngineError> {
    if let Some(list) = symbols_override {
        return parse_symbols(list);
    }
    if let Some(list) = config.get_string("market", "symbols") {
        return parse_symbols(&list);
    }
    match config.get_string("market", "symbol") {
        Some(s) if !s.trim().is_empty() => Ok(vec![s.trim().to_uppercase()]),
        _ => Err(EngineError::ConfigMissing {
            section: "market".into(),
            key: "symbols".into(),
        }),
    }
}

fn run_backtest_command(
    config_path: &Path,
    symbol_override: Option<&str>,
    output_path: Option<&Path>,
    data_dir: Option<PathBuf>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match prepare(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Build settings
    let settings = build_market_settings(&adapter, data_dir).and_then(|m| {
        Ok((m, build_backtest_config(&adapter)?, resolve_symbol(symbol_override, &adapter)?))
    });
    let (market, bt_config, symbol) = match settings {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stages 3-5: Fetch, simulate, report
    let data_port = CsvAdapter::new(market.data_dir.clone());
    let report_port = JsonReportAdapter::pretty();
    let report = output_path.map(|p| (&report_port as &dyn ReportPort, p));

    match run_backtest_pipeline(&data_port, &symbol, &market, &bt_config, report) {
        Ok(result) => {
            print_backtest_summary(&symbol, &result);
            if let Some(path) = output_path {
                eprintln!("\nReport written to: {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Fetches candles, runs the backtest and optionally writes a report.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    symbol: &str,
    market: &MarketSettings,
    config: &BacktestConfig,
    report: Option<(&dyn ReportPort, &Path)>,
) -> Result<BacktestResult, EngineError> {
    let candles = data_port.fetch_candles(symbol, &market.timeframe, market.candle_limit)?;
    info!(symbol, bars = candles.len(), timeframe = %market.timeframe, "candles loaded");

    let result = run_backtest(symbol, &candles, config)?;

    if let Some((port, path)) = report {
        port.write(symbol, &candles, &result, &path.to_string_lossy())?;
    }
    Ok(result)
}

pub fn print_backtest_summary(symbol: &str, result: &BacktestResult) {
    let metrics = Metrics::compute(result);

    eprintln!("\n=== Backtest Results: {} ===", symbol);
    eprintln!("Initial Capital:  {:.2}", result.initial_capital);
    eprintln!("Final Capital:    {:.2}", result.final_capital);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.2}%", result.max_drawdown_pct);
    eprintln!("Trades Opened:    {}", result.trade_count);
    eprintln!(
        "Closed:           {} ({} long, {} short)",
        result.trades.len(),
        metrics.long_trades,
        metrics.short_trades
    );
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    match metrics.profit_factor {
        Some(pf) => eprintln!("Profit Factor:    {:.2}", pf),
        None => eprintln!("Profit Factor:    n/a (no losing trades)"),
    }
    eprintln!("Avg Bars Held:    {:.1}", metrics.avg_bars_held);
    if let Some(open) = &result.open_position {
        eprintln!(
            "Open Position:    {} @ {:.4} (since bar {})",
            open.side, open.entry_price, open.opened_at_index
        );
    }
}

fn run_signal_command(
    config_path: &Path,
    symbol_override: Option<&str>,
    data_dir: Option<PathBuf>,
) -> ExitCode {
    let adapter = match prepare(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let settings = build_market_settings(&adapter, data_dir).and_then(|m| {
        Ok((m, build_strategy_params(&adapter)?, resolve_symbol(symbol_override, &adapter)?))
    });
    let (market, params, symbol) = match settings {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let data_port = CsvAdapter::new(market.data_dir.clone());
    let live = match run_signal_pipeline(&data_port, &symbol, &market, &params) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };

    match &live.signal {
        Some(signal) => eprintln!(
            "{} {} entry {:.4} stop {:.4} target {:.4}",
            live.symbol,
            signal.side,
            signal.entry_price,
            signal.stop_price,
            signal.take_profit_price
        ),
        None => eprintln!("{}: no signal at close {:.4}", live.symbol, live.last_close),
    }

    match serde_json::to_string_pretty(&live) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(EngineError::Report {
            reason: e.to_string(),
        }),
    }
}

pub fn run_signal_pipeline(
    data_port: &dyn DataPort,
    symbol: &str,
    market: &MarketSettings,
    params: &StrategyParams,
) -> Result<LiveAnalysis, EngineError> {
    let candles = data_port.fetch_candles(symbol, &market.timeframe, market.candle_limit)?;
    latest_signal(symbol, &candles, params)
}

fn run_scan_command(
    config_path: &Path,
    symbols_override: Option<&str>,
    top: Option<usize>,
    data_dir: Option<PathBuf>,
) -> ExitCode {
    let adapter = match prepare(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let settings = build_market_settings(&adapter, data_dir).and_then(|m| {
        Ok((
            m,
            build_backtest_config(&adapter)?,
            resolve_symbols(symbols_override, &adapter)?,
            get_count(&adapter, "scan", "max_concurrency", 4)?,
            get_count(&adapter, "scan", "top_n", 10)?,
        ))
    });
    let (market, bt_config, symbols, max_concurrency, top_n) = match settings {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let top_n = top.unwrap_or(top_n);

    eprintln!("Scanning {} symbols on {}...", symbols.len(), market.timeframe);
    let data_port = CsvAdapter::new(market.data_dir.clone());
    let source = ScanSource {
        timeframe: &market.timeframe,
        limit: market.candle_limit,
        max_concurrency,
    };

    let report = match scan_symbols(&data_port, &symbols, &source, &bt_config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    if report.results.is_empty() {
        eprintln!("error: no symbols had enough data to backtest");
        return ExitCode::from(5);
    }

    print_scan_summary(&report, &rank_by_return(&report.results, top_n));
    ExitCode::SUCCESS
}

pub fn print_scan_summary(report: &ScanReport, ranking: &Ranking) {
    eprintln!(
        "\n=== Scan Results: {} of {} symbols ===",
        report.results.len(),
        report.results.len() + report.skipped.len()
    );
    print_ranking("Best", "Worst", ranking);

    if !report.skipped.is_empty() {
        eprintln!("\n=== Skipped ===");
        for s in &report.skipped {
            eprintln!("  {}: {:?}", s.symbol, s.reason);
        }
    }
}

fn print_ranking(top_label: &str, bottom_label: &str, ranking: &Ranking) {
    eprintln!("\n{}:", top_label);
    for (i, e) in ranking.top.iter().enumerate() {
        eprintln!("  {:>2}. {:<12} {:+.2}%", i + 1, e.symbol, e.pct);
    }
    eprintln!("\n{}:", bottom_label);
    for (i, e) in ranking.bottom.iter().enumerate() {
        eprintln!("  {:>2}. {:<12} {:+.2}%", i + 1, e.symbol, e.pct);
    }
}

fn run_movers_command(
    config_path: &Path,
    symbols_override: Option<&str>,
    top: Option<usize>,
    data_dir: Option<PathBuf>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    init_logging(&adapter);

    let settings = build_market_settings(&adapter, data_dir).and_then(|m| {
        Ok((
            m,
            get_count(&adapter, "scan", "max_concurrency", 4)?,
            get_count(&adapter, "scan", "top_n", 10)?,
        ))
    });
    let (market, max_concurrency, top_n) = match settings {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let data_port = CsvAdapter::new(market.data_dir.clone());
    let symbols = match resolve_movers_universe(&data_port, symbols_override, &adapter, &market) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let source = ScanSource {
        timeframe: &market.timeframe,
        limit: market.candle_limit,
        max_concurrency,
    };
    let changes = match collect_changes(&data_port, &symbols, &source) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!(
        "\n=== Movers: {} of {} symbols on {} ===",
        changes.len(),
        symbols.len(),
        market.timeframe
    );
    print_ranking("Gainers", "Losers", &rank_movers(&changes, top.unwrap_or(top_n)));
    ExitCode::SUCCESS
}

/// Configured symbols when present, otherwise everything the data source lists.
pub fn resolve_movers_universe(
    data_port: &dyn DataPort,
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
    market: &MarketSettings,
) -> Result<Vec<String>, EngineError> {
    match resolve_symbols(symbols_override, config) {
        Ok(symbols) => Ok(symbols),
        Err(EngineError::ConfigMissing { .. }) => data_port.list_symbols(&market.timeframe),
        Err(e) => Err(e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        return fail(e);
    }

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let params = &bt_config.strategy;

    eprintln!("\nRule:             {}", bt_config.rule.name());
    if let StrategyRule::RsiPullback(pullback) = &bt_config.rule {
        eprintln!("\nPullback:");
        eprintln!("  Trend EMA:      {}", pullback.trend_ema_period);
        eprintln!(
            "  Entry RSI:      {} below {}",
            pullback.entry_rsi_period, pullback.entry_rsi_below
        );
        eprintln!(
            "  Exit RSI:       {} above {}",
            pullback.exit_rsi_period, pullback.exit_rsi_above
        );
        eprintln!("  Stop:           {}", pullback.stop_pct);
    }

    eprintln!("\nStrategy:");
    eprintln!("  Pivot window:   {} left / {} right", params.pivot_left, params.pivot_right);
    eprintln!("  Trend EMA:      {}", params.trend_ema_period);
    eprintln!(
        "  ATR:            {} x {}",
        params.atr_period, params.atr_multiplier
    );
    eprintln!(
        "  Volume:         {} bars x {}",
        params.volume_lookback, params.vol_multiplier
    );
    eprintln!(
        "  Exits:          sl {} / tp {} / half {}",
        params.sl_pct, params.tp_pct, params.half_close_pct
    );
    match params.max_pivot_age {
        Some(age) => eprintln!("  Max pivot age:  {} bars", age),
        None => eprintln!("  Max pivot age:  unlimited"),
    }
    eprintln!("  Minimum bars:   {}", bt_config.min_bars());

    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}
