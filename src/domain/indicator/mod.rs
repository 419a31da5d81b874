//! Technical indicator implementations.
//!
//! Every indicator is a pure function over a price column that returns only
//! the valid (post warm-up) values. `IndicatorSeries` pairs those values with
//! the warm-up offset so that index `k` of the series maps to candle
//! `k + offset`:
//! - EMA: offset `period - 1`
//! - RSI: offset `period`
//! - ATR: offset `period`

pub mod atr;
pub mod ema;
pub mod rsi;

use std::fmt;

pub use atr::atr;
pub use ema::ema;
pub use rsi::rsi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
}

impl IndicatorType {
    /// Number of leading candles with no indicator value.
    pub fn offset(&self) -> usize {
        match self {
            IndicatorType::Ema(period) => period.saturating_sub(1),
            IndicatorType::Rsi(period) | IndicatorType::Atr(period) => *period,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<f64>,
}

impl IndicatorSeries {
    pub fn new(indicator_type: IndicatorType, values: Vec<f64>) -> Self {
        Self {
            indicator_type,
            values,
        }
    }

    pub fn offset(&self) -> usize {
        self.indicator_type.offset()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value aligned to `candle_index`, or `None` while still in warm-up.
    pub fn at(&self, candle_index: usize) -> Option<f64> {
        let k = candle_index.checked_sub(self.offset())?;
        self.values.get(k).copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}
