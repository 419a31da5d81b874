//! Property tests for indicator, pivot, backtest and ranking invariants.
//!
//! Uses proptest to verify:
//! 1. Indicator bounds: RSI stays in [0, 100], ATR is never negative
//! 2. Indicator fixed points on constant and monotonic input
//! 3. Pivot detection on monotonic highs
//! 4. Backtest determinism and drawdown bookkeeping
//! 5. Ranking independent of input order

mod common;

use common::*;
use pivotrader::domain::backtest::run_backtest;
use pivotrader::domain::candle::Candle;
use pivotrader::domain::indicator::atr::atr;
use pivotrader::domain::indicator::ema::ema;
use pivotrader::domain::indicator::rsi::rsi;
use pivotrader::domain::performance::max_drawdown;
use pivotrader::domain::pivot::detect_pivots;
use pivotrader::domain::scan::{RankEntry, rank};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1000.0_f64, 2..80)
}

fn arb_period() -> impl Strategy<Value = usize> {
    1usize..20
}

/// Random walk around 100 with a spread and volume per bar.
fn arb_candles() -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-1.5..1.5_f64, 0.0..1.0_f64, 0.0..1.0_f64, 50.0..600.0_f64), 10..120)
        .prop_map(|steps| {
            let mut close = 100.0;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (step, up, down, volume))| {
                    close += step;
                    make_candle(i, close + up, close - down, close, volume)
                })
                .collect()
        })
}

// ── 1. Indicator bounds ──────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_is_bounded(closes in arb_closes(), period in arb_period()) {
        for value in rsi(&closes, period).values {
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn atr_is_non_negative(candles in arb_candles(), period in arb_period()) {
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        for value in atr(&highs, &lows, &closes, period).values {
            prop_assert!(value >= 0.0);
        }
    }

    #[test]
    fn indicator_lengths_follow_offsets(closes in arb_closes(), period in arb_period()) {
        let e = ema(&closes, period);
        let r = rsi(&closes, period);
        prop_assert_eq!(e.len(), (closes.len() + 1).saturating_sub(period));
        prop_assert_eq!(r.len(), closes.len().saturating_sub(period));
        if let Some(last) = e.last() {
            prop_assert_eq!(e.at(closes.len() - 1), Some(last));
        }
    }
}

// ── 2. Fixed points ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn ema_of_constant_is_constant(price in 1.0..1000.0_f64, len in 1usize..60, period in arb_period()) {
        let closes = vec![price; len];
        for value in ema(&closes, period).values {
            prop_assert!((value - price).abs() <= 1e-9 * price);
        }
    }

    #[test]
    fn rsi_of_rising_series_is_100(start in 1.0..100.0_f64, len in 2usize..60, period in arb_period()) {
        let closes: Vec<f64> = (0..len).map(|i| start + i as f64).collect();
        for value in rsi(&closes, period).values {
            prop_assert_eq!(value, 100.0);
        }
    }

    #[test]
    fn atr_of_flat_candles_is_zero(price in 1.0..1000.0_f64, len in 2usize..60, period in arb_period()) {
        let flat = vec![price; len];
        for value in atr(&flat, &flat, &flat, period).values {
            prop_assert_eq!(value, 0.0);
        }
    }
}

// ── 3. Pivots ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rising_highs_have_no_pivot_highs(
        len in 3usize..60,
        left in 1usize..4,
        right in 1usize..4,
    ) {
        let candles: Vec<Candle> = (0..len)
            .map(|i| {
                let high = 100.0 + i as f64;
                make_candle(i, high, high - 1.0, high - 0.5, 100.0)
            })
            .collect();
        let pivots = detect_pivots(&candles, left, right);
        prop_assert!(pivots.highs.is_empty());
    }

    #[test]
    fn pivots_lie_inside_the_confirmed_range(
        candles in arb_candles(),
        left in 1usize..4,
        right in 1usize..4,
    ) {
        let pivots = detect_pivots(&candles, left, right);
        for p in pivots.highs.iter().chain(pivots.lows.iter()) {
            prop_assert!(p.index >= left);
            prop_assert!(p.index + right < candles.len());
        }
    }
}

// ── 4. Backtest ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn backtest_is_deterministic(candles in arb_candles()) {
        let first = run_backtest("PROP", &candles, &test_config()).unwrap();
        let second = run_backtest("PROP", &candles, &test_config()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn drawdown_matches_equity_curve(candles in arb_candles()) {
        let result = run_backtest("PROP", &candles, &test_config()).unwrap();
        prop_assert_eq!(max_drawdown(&result.equity_curve) * 100.0, result.max_drawdown_pct);
        prop_assert_eq!(result.equity_curve.first().copied(), Some(result.initial_capital));
        prop_assert_eq!(result.equity_curve.last().copied(), Some(result.final_capital));
        prop_assert!(result.trades.len() <= result.trade_count);
    }

    #[test]
    fn trades_never_overlap(candles in arb_candles()) {
        let result = run_backtest("PROP", &candles, &test_config()).unwrap();
        for pair in result.trades.windows(2) {
            prop_assert!(pair[0].exit_index < pair[1].entry_index);
        }
        for trade in &result.trades {
            prop_assert!(trade.entry_index < trade.exit_index);
        }
    }
}

// ── 5. Ranking ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ranking_ignores_input_order(
        pcts in prop::collection::vec(-50.0..50.0_f64, 0..30),
        n in 0usize..10,
        shift in 0usize..30,
    ) {
        let entries: Vec<RankEntry> = pcts
            .iter()
            .enumerate()
            .map(|(i, &pct)| RankEntry { symbol: format!("S{i:02}"), pct })
            .collect();
        let mut shuffled = entries.clone();
        shuffled.reverse();
        if !shuffled.is_empty() {
            let k = shift % shuffled.len();
            shuffled.rotate_left(k);
        }

        let ranking = rank(&entries, n);
        prop_assert_eq!(&ranking, &rank(&shuffled, n));
        prop_assert_eq!(ranking.top.len(), n.min(entries.len()));
        for pair in ranking.top.windows(2) {
            prop_assert!(pair[0].pct >= pair[1].pct);
        }
    }
}
