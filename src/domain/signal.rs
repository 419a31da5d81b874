//! Pivot-cluster breakout signal.
//!
//! A long fires when price is above the trend EMA, the three most recent
//! pivot highs sit within `atr * atr_multiplier` of each other, the close
//! breaks above all of them and volume exceeds the trailing average by
//! `vol_multiplier`. Shorts mirror this against pivot lows.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::candle::Candle;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::pivot::{PivotPoint, PivotSet};

/// Number of pivots that form a support/resistance cluster.
pub const PIVOT_CLUSTER_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub index: usize,
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
}

impl Signal {
    pub fn new(index: usize, side: Side, entry_price: f64, sl_pct: f64, tp_pct: f64) -> Self {
        let (stop_price, take_profit_price) = match side {
            Side::Long => (entry_price * (1.0 - sl_pct), entry_price * (1.0 + tp_pct)),
            Side::Short => (entry_price * (1.0 + sl_pct), entry_price * (1.0 - tp_pct)),
        };
        Signal {
            index,
            side,
            entry_price,
            stop_price,
            take_profit_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalParams {
    pub sl_pct: f64,
    pub tp_pct: f64,
    pub vol_multiplier: f64,
    pub atr_multiplier: f64,
    pub volume_lookback: usize,
    /// Ignore pivots more than this many bars before the evaluated bar.
    pub max_pivot_age: Option<usize>,
}

impl Default for SignalParams {
    fn default() -> Self {
        SignalParams {
            sl_pct: 0.03,
            tp_pct: 0.06,
            vol_multiplier: 1.2,
            atr_multiplier: 1.5,
            volume_lookback: 10,
            max_pivot_age: None,
        }
    }
}

/// Everything one evaluation looks at.
#[derive(Debug, Clone, Copy)]
pub struct SignalInput<'a> {
    pub candles: &'a [Candle],
    pub index: usize,
    pub trend_ema: Option<f64>,
    pub atr: Option<f64>,
    pub pivot_highs: &'a [PivotPoint],
    pub pivot_lows: &'a [PivotPoint],
}

/// Mean volume of the `lookback` bars before `index` (the current bar excluded).
pub fn average_volume(candles: &[Candle], index: usize, lookback: usize) -> Option<f64> {
    if lookback == 0 || index < lookback || index > candles.len() {
        return None;
    }
    let window = &candles[index - lookback..index];
    Some(window.iter().map(|c| c.volume).sum::<f64>() / lookback as f64)
}

fn cluster_prices(pivots: &[PivotPoint], index: usize, max_age: Option<usize>) -> Option<Vec<f64>> {
    let prices: Vec<f64> = pivots
        .iter()
        .filter(|p| p.index < index)
        .filter(|p| max_age.is_none_or(|age| index - p.index <= age))
        .map(|p| p.price)
        .collect();
    let start = prices.len().checked_sub(PIVOT_CLUSTER_SIZE)?;
    Some(prices[start..].to_vec())
}

fn spread(prices: &[f64]) -> (f64, f64) {
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    (min, max)
}

pub fn generate_signal(input: &SignalInput<'_>, params: &SignalParams) -> Option<Signal> {
    let candle = input.candles.get(input.index)?;
    let trend = input.trend_ema?;
    let atr = input.atr?;
    let avg_volume = average_volume(input.candles, input.index, params.volume_lookback)?;

    let price = candle.close;
    let tolerance = atr * params.atr_multiplier;
    let volume_ok = candle.volume > avg_volume * params.vol_multiplier;

    if price > trend {
        let highs = cluster_prices(input.pivot_highs, input.index, params.max_pivot_age)?;
        let (min, max) = spread(&highs);
        if max - min <= tolerance && price > max && volume_ok {
            return Some(Signal::new(
                input.index,
                Side::Long,
                price,
                params.sl_pct,
                params.tp_pct,
            ));
        }
    } else if price < trend {
        let lows = cluster_prices(input.pivot_lows, input.index, params.max_pivot_age)?;
        let (min, max) = spread(&lows);
        if max - min <= tolerance && price < min && volume_ok {
            return Some(Signal::new(
                input.index,
                Side::Short,
                price,
                params.sl_pct,
                params.tp_pct,
            ));
        }
    }

    None
}

/// Evaluates the rule at `index` using batch-computed indicators and pivots.
pub fn signal_at(
    candles: &[Candle],
    index: usize,
    trend_ema: &IndicatorSeries,
    atr: &IndicatorSeries,
    pivots: &PivotSet,
    params: &SignalParams,
) -> Option<Signal> {
    let input = SignalInput {
        candles,
        index,
        trend_ema: trend_ema.at(index),
        atr: atr.at(index),
        pivot_highs: pivots.recent_highs(index, PIVOT_CLUSTER_SIZE),
        pivot_lows: pivots.recent_lows(index, PIVOT_CLUSTER_SIZE),
    };
    generate_signal(&input, params)
}
