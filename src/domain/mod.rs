//! Core domain types and logic.

pub mod backtest;
pub mod candle;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod performance;
pub mod pipeline;
pub mod pivot;
pub mod position;
pub mod pullback;
pub mod scan;
pub mod signal;
