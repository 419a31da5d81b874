//! Configuration validation.
//!
//! Checks every section a run reads before any data is fetched. Missing
//! optional keys fall back to their defaults and are not errors.

use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_market_config(config)?;
    validate_strategy_config(config)?;
    validate_pullback_config(config)?;
    validate_backtest_config(config)?;
    validate_scan_config(config)?;
    Ok(())
}

pub fn validate_market_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_symbols(config)?;
    validate_at_least_one(config, "market", "candle_limit", 1000)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_at_least_one(config, "strategy", "pivot_left", 2)?;
    validate_at_least_one(config, "strategy", "pivot_right", 2)?;
    validate_at_least_one(config, "strategy", "atr_period", 14)?;
    validate_at_least_one(config, "strategy", "trend_ema_period", 100)?;
    validate_at_least_one(config, "strategy", "rsi_period", 14)?;
    validate_at_least_one(config, "strategy", "volume_lookback", 10)?;
    validate_positive(config, "strategy", "atr_multiplier", 1.5)?;
    validate_positive(config, "strategy", "vol_multiplier", 1.2)?;
    validate_fraction(config, "strategy", "sl_pct", 0.03)?;
    validate_fraction(config, "strategy", "tp_pct", 0.06)?;
    validate_fraction(config, "strategy", "half_close_pct", 0.03)?;
    parse_max_pivot_age(config)?;
    parse_rule_name(config)?;
    Ok(())
}

pub fn validate_pullback_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_at_least_one(config, "pullback", "trend_ema_period", 29)?;
    validate_at_least_one(config, "pullback", "entry_rsi_period", 3)?;
    validate_at_least_one(config, "pullback", "exit_rsi_period", 7)?;
    validate_rsi_level(config, "pullback", "entry_rsi_below", 40.0)?;
    validate_rsi_level(config, "pullback", "exit_rsi_above", 70.0)?;
    validate_fraction(config, "pullback", "stop_pct", 0.10)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_positive(config, "backtest", "initial_capital", 1000.0)
}

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_at_least_one(config, "scan", "max_concurrency", 4)?;
    validate_at_least_one(config, "scan", "top_n", 10)?;
    Ok(())
}

/// `[strategy] max_pivot_age`: unset or blank means no age limit.
pub fn parse_max_pivot_age(config: &dyn ConfigPort) -> Result<Option<usize>, EngineError> {
    let Some(raw) = config.get_string("strategy", "max_pivot_age") else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<usize>() {
        Ok(age) if age >= 1 => Ok(Some(age)),
        _ => Err(invalid(
            "strategy",
            "max_pivot_age",
            "max_pivot_age must be a positive whole number of bars",
        )),
    }
}

/// Names accepted by `[strategy] rule`.
pub const RULE_NAMES: [&str; 2] = ["pivot_breakout", "rsi_pullback"];

/// `[strategy] rule`, lowercased; unset or blank selects `pivot_breakout`.
pub fn parse_rule_name(config: &dyn ConfigPort) -> Result<String, EngineError> {
    let name = config
        .get_string("strategy", "rule")
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| RULE_NAMES[0].to_string());
    if !RULE_NAMES.contains(&name.as_str()) {
        return Err(invalid(
            "strategy",
            "rule",
            &format!("unknown rule '{name}', expected one of {}", RULE_NAMES.join(", ")),
        ));
    }
    Ok(name)
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let symbols = config.get_string("market", "symbols");
    let symbol = config.get_string("market", "symbol");

    match (symbols, symbol) {
        (Some(s), _) if !s.trim().is_empty() => Ok(()),
        (_, Some(s)) if !s.trim().is_empty() => Ok(()),
        _ => Err(EngineError::ConfigMissing {
            section: "market".to_string(),
            key: "symbol".to_string(),
        }),
    }
}

fn validate_at_least_one(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), EngineError> {
    if config.get_int(section, key, default) < 1 {
        return Err(invalid(section, key, &format!("{key} must be at least 1")));
    }
    Ok(())
}

fn validate_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), EngineError> {
    let value = config.get_double(section, key, default);
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(section, key, &format!("{key} must be positive")));
    }
    Ok(())
}

fn validate_fraction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), EngineError> {
    let value = config.get_double(section, key, default);
    if !(value > 0.0 && value < 1.0) {
        return Err(invalid(
            section,
            key,
            &format!("{key} must be between 0 and 1 (exclusive)"),
        ));
    }
    Ok(())
}

fn validate_rsi_level(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), EngineError> {
    let value = config.get_double(section, key, default);
    if !(value > 0.0 && value < 100.0) {
        return Err(invalid(section, key, &format!("{key} must be between 0 and 100")));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(err: EngineError) -> String {
        match err {
            EngineError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other}"),
        }
    }

    #[test]
    fn valid_full_config_passes() {
        let config = make_config(
            r#"
[market]
symbol = BTCUSDT
timeframe = 4h
candle_limit = 500

[strategy]
pivot_left = 3
pivot_right = 3
atr_period = 14
atr_multiplier = 1.5
trend_ema_period = 100
volume_lookback = 10
vol_multiplier = 1.2
sl_pct = 0.03
tp_pct = 0.06
half_close_pct = 0.03
max_pivot_age = 50
rule = rsi_pullback

[pullback]
trend_ema_period = 29
entry_rsi_period = 3
exit_rsi_period = 7
entry_rsi_below = 40
exit_rsi_above = 70
stop_pct = 0.1

[backtest]
initial_capital = 1000

[scan]
max_concurrency = 8
top_n = 5
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn defaults_only_need_a_symbol() {
        let config = make_config("[market]\nsymbol = ETHUSDT\n");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn missing_symbol_fails() {
        let config = make_config("[market]\ntimeframe = 1h\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn symbols_list_satisfies_symbol_requirement() {
        let config = make_config("[market]\nsymbols = BTCUSDT, ETHUSDT\n");
        assert!(validate_market_config(&config).is_ok());
    }

    #[test]
    fn zero_period_fails() {
        let config = make_config("[market]\nsymbol = BTCUSDT\n[strategy]\natr_period = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "atr_period");
    }

    #[test]
    fn negative_pivot_window_fails() {
        let config = make_config("[strategy]\npivot_right = -1\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "pivot_right");
    }

    #[test]
    fn non_positive_multiplier_fails() {
        let config = make_config("[strategy]\nvol_multiplier = 0\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "vol_multiplier");
    }

    #[test]
    fn percentage_outside_unit_interval_fails() {
        let config = make_config("[strategy]\nsl_pct = 3\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "sl_pct");

        let config = make_config("[strategy]\ntp_pct = 0\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "tp_pct");

        let config = make_config("[strategy]\nhalf_close_pct = 1.0\n");
        assert_eq!(
            invalid_key(validate_strategy_config(&config).unwrap_err()),
            "half_close_pct"
        );
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\ninitial_capital = -100\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "initial_capital");

        let config = make_config("[backtest]\ninitial_capital = 0\n");
        assert!(validate_backtest_config(&config).is_err());
    }

    #[test]
    fn zero_concurrency_fails() {
        let config = make_config("[scan]\nmax_concurrency = 0\n");
        let err = validate_scan_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "max_concurrency");
    }

    #[test]
    fn rule_defaults_to_breakout() {
        assert_eq!(parse_rule_name(&make_config("[strategy]\n")).unwrap(), "pivot_breakout");
        assert_eq!(
            parse_rule_name(&make_config("[strategy]\nrule = RSI_Pullback\n")).unwrap(),
            "rsi_pullback"
        );
    }

    #[test]
    fn unknown_rule_fails() {
        let config = make_config("[market]\nsymbol = BTCUSDT\n[strategy]\nrule = martingale\n");
        let err = validate_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "rule");
    }

    #[test]
    fn pullback_levels_are_checked() {
        let config = make_config("[pullback]\nexit_rsi_above = 120\n");
        let err = validate_pullback_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "exit_rsi_above");

        let config = make_config("[pullback]\nstop_pct = 0\n");
        assert_eq!(invalid_key(validate_pullback_config(&config).unwrap_err()), "stop_pct");

        let config = make_config("[pullback]\nentry_rsi_period = 0\n");
        assert_eq!(
            invalid_key(validate_pullback_config(&config).unwrap_err()),
            "entry_rsi_period"
        );
    }

    #[test]
    fn max_pivot_age_parsing() {
        assert_eq!(parse_max_pivot_age(&make_config("[strategy]\n")).unwrap(), None);
        assert_eq!(
            parse_max_pivot_age(&make_config("[strategy]\nmax_pivot_age = 40\n")).unwrap(),
            Some(40)
        );
        assert_eq!(
            parse_max_pivot_age(&make_config("[strategy]\nmax_pivot_age =\n")).unwrap(),
            None
        );
        let err = parse_max_pivot_age(&make_config("[strategy]\nmax_pivot_age = soon\n")).unwrap_err();
        assert_eq!(invalid_key(err), "max_pivot_age");
        assert!(parse_max_pivot_age(&make_config("[strategy]\nmax_pivot_age = 0\n")).is_err());
    }
}
