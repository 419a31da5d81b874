//! Swing pivot detection and classic floor-pivot levels.
//!
//! A swing pivot high at `i` has a high greater than or equal to every high
//! in `[i-left, i+right]`; a pivot low mirrors it with lows. Flat tops and
//! bottoms mark every tied bar.

use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoint {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

/// Swing pivots of one series, each list in ascending index order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotSet {
    pub highs: Vec<PivotPoint>,
    pub lows: Vec<PivotPoint>,
}

impl PivotSet {
    /// Up to `count` most recent pivot highs with index strictly before `before`.
    pub fn recent_highs(&self, before: usize, count: usize) -> &[PivotPoint] {
        recent(&self.highs, before, count)
    }

    /// Up to `count` most recent pivot lows with index strictly before `before`.
    pub fn recent_lows(&self, before: usize, count: usize) -> &[PivotPoint] {
        recent(&self.lows, before, count)
    }
}

fn recent(points: &[PivotPoint], before: usize, count: usize) -> &[PivotPoint] {
    let end = points.partition_point(|p| p.index < before);
    &points[end.saturating_sub(count)..end]
}

pub fn detect_pivots(candles: &[Candle], left: usize, right: usize) -> PivotSet {
    let mut set = PivotSet::default();
    if candles.len() < left + right + 1 {
        return set;
    }

    for i in left..candles.len() - right {
        let window = &candles[i - left..=i + right];
        let candle = &candles[i];
        if window.iter().all(|c| candle.high >= c.high) {
            set.highs.push(PivotPoint {
                index: i,
                price: candle.high,
                kind: PivotKind::High,
            });
        }
        if window.iter().all(|c| candle.low <= c.low) {
            set.lows.push(PivotPoint {
                index: i,
                price: candle.low,
                kind: PivotKind::Low,
            });
        }
    }

    set
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassicPivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

/// Floor-trader pivot levels from one candle's high, low and close.
pub fn classic_pivot_levels(candle: &Candle) -> Result<ClassicPivotLevels, EngineError> {
    let Candle {
        high, low, close, ..
    } = *candle;
    if !(high.is_finite() && low.is_finite() && close.is_finite()) {
        return Err(EngineError::InvalidCandle {
            reason: "high/low/close must be finite for pivot levels".into(),
        });
    }

    let pp = candle.typical_price();
    Ok(ClassicPivotLevels {
        pivot: pp,
        r1: 2.0 * pp - low,
        r2: pp + (high - low),
        r3: high + 2.0 * (pp - low),
        s1: 2.0 * pp - high,
        s2: pp - (high - low),
        s3: low - 2.0 * (high - pp),
    })
}
