//! Candles → indicators → pivots → signal.
//!
//! `analyze` validates and cleans one symbol's series, then computes the
//! indicator columns and swing pivots as independent branches joined before
//! the signal stage. Both the backtest and the live signal read from the
//! resulting [`Analysis`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::candle::{Candle, PriceColumns, sanitize, validate_series};
use crate::domain::error::EngineError;
use crate::domain::indicator::{self, IndicatorSeries};
use crate::domain::pivot::{ClassicPivotLevels, PivotSet, classic_pivot_levels, detect_pivots};
use crate::domain::position::ExitRules;
use crate::domain::signal::{Signal, SignalParams, signal_at};

/// Every tunable of the pivot-breakout strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub pivot_left: usize,
    pub pivot_right: usize,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub trend_ema_period: usize,
    pub rsi_period: usize,
    pub volume_lookback: usize,
    pub vol_multiplier: f64,
    pub sl_pct: f64,
    pub tp_pct: f64,
    pub half_close_pct: f64,
    pub max_pivot_age: Option<usize>,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            pivot_left: 2,
            pivot_right: 2,
            atr_period: 14,
            atr_multiplier: 1.5,
            trend_ema_period: 100,
            rsi_period: 14,
            volume_lookback: 10,
            vol_multiplier: 1.2,
            sl_pct: 0.03,
            tp_pct: 0.06,
            half_close_pct: 0.03,
            max_pivot_age: None,
        }
    }
}

impl StrategyParams {
    pub fn signal_params(&self) -> SignalParams {
        SignalParams {
            sl_pct: self.sl_pct,
            tp_pct: self.tp_pct,
            vol_multiplier: self.vol_multiplier,
            atr_multiplier: self.atr_multiplier,
            volume_lookback: self.volume_lookback,
            max_pivot_age: self.max_pivot_age,
        }
    }

    pub fn exit_rules(&self) -> ExitRules {
        ExitRules {
            sl_pct: self.sl_pct,
            tp_pct: self.tp_pct,
            half_close_pct: self.half_close_pct,
        }
    }

    /// Shortest series worth analysing.
    pub fn min_bars(&self) -> usize {
        (self.pivot_left + self.pivot_right + 1)
            .max(self.atr_period)
            .max(self.trend_ema_period)
            .max(self.volume_lookback)
    }

    /// First bar at which the trend EMA, ATR and volume average all exist.
    pub fn first_signal_bar(&self) -> usize {
        self.atr_period
            .max(self.trend_ema_period.saturating_sub(1))
            .max(self.volume_lookback)
    }
}

/// Batch-computed view of one symbol's series.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Candles that survived sanitisation; the indicator and pivot columns
    /// below are indexed by position in this vector.
    pub candles: Vec<Candle>,
    /// Input position of each entry in `candles`.
    pub source_index: Vec<usize>,
    pub trend_ema: IndicatorSeries,
    pub rsi: IndicatorSeries,
    pub atr: IndicatorSeries,
    pub pivots: PivotSet,
}

impl Analysis {
    /// Signal on the cleaned bar `index`, its index mapped back to the input series.
    pub fn signal_at(&self, index: usize, params: &SignalParams) -> Option<Signal> {
        signal_at(
            &self.candles,
            index,
            &self.trend_ema,
            &self.atr,
            &self.pivots,
            params,
        )
        .map(|signal| Signal {
            index: self.source_index(signal.index),
            ..signal
        })
    }

    /// Position in the input series of the cleaned bar `index`.
    pub fn source_index(&self, index: usize) -> usize {
        self.source_index.get(index).copied().unwrap_or(index)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

pub fn analyze(
    symbol: &str,
    candles: &[Candle],
    params: &StrategyParams,
) -> Result<Analysis, EngineError> {
    validate_series(candles)?;
    let clean = sanitize(candles);
    let (candles, source_index) = (clean.candles, clean.source_index);

    let minimum = params.min_bars();
    if candles.len() < minimum {
        return Err(EngineError::InsufficientData {
            symbol: symbol.to_string(),
            bars: candles.len(),
            minimum,
        });
    }

    let cols = PriceColumns::from_candles(&candles);
    let ((trend_ema, (rsi, atr)), pivots) = rayon::join(
        || {
            rayon::join(
                || indicator::ema(&cols.closes, params.trend_ema_period),
                || {
                    rayon::join(
                        || indicator::rsi(&cols.closes, params.rsi_period),
                        || indicator::atr(&cols.highs, &cols.lows, &cols.closes, params.atr_period),
                    )
                },
            )
        },
        || detect_pivots(&candles, params.pivot_left, params.pivot_right),
    );

    debug!(
        symbol,
        bars = candles.len(),
        pivot_highs = pivots.highs.len(),
        pivot_lows = pivots.lows.len(),
        "analysis complete"
    );

    Ok(Analysis {
        candles,
        source_index,
        trend_ema,
        rsi,
        atr,
        pivots,
    })
}

/// Latest-bar snapshot for the live signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveAnalysis {
    pub symbol: String,
    pub signal: Option<Signal>,
    pub last_close: f64,
    pub last_ema: Option<f64>,
    pub last_rsi: Option<f64>,
    pub last_atr: Option<f64>,
    pub classic_levels: Option<ClassicPivotLevels>,
}

/// Evaluates the signal rule on the most recent bar.
///
/// Classic levels come from the last raw candle; when it is malformed they
/// are left out and the rest of the snapshot is still produced.
pub fn latest_signal(
    symbol: &str,
    candles: &[Candle],
    params: &StrategyParams,
) -> Result<LiveAnalysis, EngineError> {
    let analysis = analyze(symbol, candles, params)?;
    let last = analysis.len() - 1;

    let classic_levels = match candles.last().map(classic_pivot_levels) {
        Some(Ok(levels)) => Some(levels),
        Some(Err(e)) => {
            warn!(symbol, error = %e, "skipping classic pivot levels");
            None
        }
        None => None,
    };

    Ok(LiveAnalysis {
        symbol: symbol.to_string(),
        signal: analysis.signal_at(last, &params.signal_params()),
        last_close: analysis.candles[last].close,
        last_ema: analysis.trend_ema.at(last),
        last_rsi: analysis.rsi.at(last),
        last_atr: analysis.atr.at(last),
        classic_levels,
    })
}
