//! Multi-symbol scan and ranking.
//!
//! Each symbol runs its own fetch → analyse → simulate pipeline on a private
//! worker pool. A symbol that cannot be fetched or is too short is skipped
//! without affecting the others; results are joined only for ranking.

use std::cmp::Ordering;
use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::backtest::{BacktestConfig, BacktestResult, run_backtest};
use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::ports::data_port::DataPort;

/// Parses a comma-separated symbol list, uppercasing each entry.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, EngineError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(symbols_invalid("empty token in symbol list".to_string()));
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(symbols_invalid(format!("duplicate symbol: {symbol}")));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

fn symbols_invalid(reason: String) -> EngineError {
    EngineError::ConfigInvalid {
        section: "market".to_string(),
        key: "symbols".to_string(),
        reason,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Also covers failed fetches and empty series, reported with `bars: 0`.
    InsufficientBars { bars: usize, minimum: usize },
    InvalidSeries { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    pub symbol: String,
    pub result: BacktestResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Completed symbols, in request order.
    pub results: Vec<SymbolResult>,
    pub skipped: Vec<SkippedSymbol>,
}

enum SymbolOutcome {
    Completed(SymbolResult),
    Skipped(SkippedSymbol),
}

/// Where a scan reads its candles from.
#[derive(Debug, Clone, Copy)]
pub struct ScanSource<'a> {
    pub timeframe: &'a str,
    pub limit: usize,
    pub max_concurrency: usize,
}

fn worker_pool(max_concurrency: usize) -> Result<rayon::ThreadPool, EngineError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(max_concurrency.max(1))
        .build()
        .map_err(|e| EngineError::WorkerPool {
            reason: e.to_string(),
        })
}

/// A failed fetch is logged and treated as an empty series.
fn fetch_or_empty(port: &dyn DataPort, symbol: &str, source: &ScanSource<'_>) -> Vec<Candle> {
    match port.fetch_candles(symbol, source.timeframe, source.limit) {
        Ok(candles) => candles,
        Err(e) => {
            warn!(symbol, error = %e, "fetch failed");
            Vec::new()
        }
    }
}

fn backtest_symbol(
    port: &dyn DataPort,
    symbol: &str,
    source: &ScanSource<'_>,
    config: &BacktestConfig,
) -> SymbolOutcome {
    let candles = fetch_or_empty(port, symbol, source);
    let skipped = |reason: SkipReason| {
        info!(symbol, ?reason, "skipping symbol");
        SymbolOutcome::Skipped(SkippedSymbol {
            symbol: symbol.to_string(),
            reason,
        })
    };

    match run_backtest(symbol, &candles, config) {
        Ok(result) => SymbolOutcome::Completed(SymbolResult {
            symbol: symbol.to_string(),
            result,
        }),
        Err(EngineError::InsufficientData { bars, minimum, .. }) => {
            skipped(SkipReason::InsufficientBars { bars, minimum })
        }
        Err(e) => skipped(SkipReason::InvalidSeries {
            reason: e.to_string(),
        }),
    }
}

/// Backtests every symbol on a pool of at most `source.max_concurrency` workers.
pub fn scan_symbols(
    port: &dyn DataPort,
    symbols: &[String],
    source: &ScanSource<'_>,
    config: &BacktestConfig,
) -> Result<ScanReport, EngineError> {
    let pool = worker_pool(source.max_concurrency)?;
    let outcomes: Vec<SymbolOutcome> = pool.install(|| {
        symbols
            .par_iter()
            .map(|symbol| backtest_symbol(port, symbol, source, config))
            .collect()
    });

    let mut report = ScanReport::default();
    for outcome in outcomes {
        match outcome {
            SymbolOutcome::Completed(r) => report.results.push(r),
            SymbolOutcome::Skipped(s) => report.skipped.push(s),
        }
    }

    info!(
        completed = report.results.len(),
        skipped = report.skipped.len(),
        "scan complete"
    );
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub symbol: String,
    pub pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// Highest first.
    pub top: Vec<RankEntry>,
    /// Lowest first.
    pub bottom: Vec<RankEntry>,
}

fn by_pct_then_symbol(a: &RankEntry, b: &RankEntry) -> Ordering {
    a.pct.total_cmp(&b.pct).then_with(|| a.symbol.cmp(&b.symbol))
}

/// Top-`n` and bottom-`n` entries; the result does not depend on input order.
pub fn rank(entries: &[RankEntry], n: usize) -> Ranking {
    let mut ascending = entries.to_vec();
    ascending.sort_by(by_pct_then_symbol);

    let bottom: Vec<RankEntry> = ascending.iter().take(n).cloned().collect();

    let mut descending = entries.to_vec();
    descending.sort_by(|a, b| b.pct.total_cmp(&a.pct).then_with(|| a.symbol.cmp(&b.symbol)));
    let top: Vec<RankEntry> = descending.into_iter().take(n).collect();

    Ranking { top, bottom }
}

/// Ranks completed backtests by total return.
pub fn rank_by_return(results: &[SymbolResult], n: usize) -> Ranking {
    let entries: Vec<RankEntry> = results
        .iter()
        .map(|r| RankEntry {
            symbol: r.symbol.clone(),
            pct: r.result.total_return_pct(),
        })
        .collect();
    rank(&entries, n)
}

/// First-to-last close change in percent, ignoring malformed candles.
pub fn pct_change(candles: &[Candle]) -> Option<f64> {
    let mut finite = candles.iter().filter(|c| c.is_finite());
    let first = finite.next()?.close;
    let last = finite.last()?.close;
    if first == 0.0 {
        return None;
    }
    Some((last - first) / first * 100.0)
}

/// Top gainers and losers among `changes`.
pub fn rank_movers(changes: &[RankEntry], n: usize) -> Ranking {
    rank(changes, n)
}

/// Percentage change of every symbol with at least two usable candles.
pub fn collect_changes(
    port: &dyn DataPort,
    symbols: &[String],
    source: &ScanSource<'_>,
) -> Result<Vec<RankEntry>, EngineError> {
    let pool = worker_pool(source.max_concurrency)?;
    let changes: Vec<RankEntry> = pool.install(|| {
        symbols
            .par_iter()
            .filter_map(|symbol| {
                let candles = fetch_or_empty(port, symbol, source);
                let pct = pct_change(&candles);
                if pct.is_none() {
                    info!(symbol, bars = candles.len(), "no usable price change");
                }
                pct.map(|pct| RankEntry {
                    symbol: symbol.clone(),
                    pct,
                })
            })
            .collect()
    });
    Ok(changes)
}
