//! Builds and validates an [`EngineConfig`] from a [`ConfigPort`].
//!
//! Missing keys fall back to defaults; present keys that do not parse are
//! errors. Percent-like values (buffer, profit target, trailing stop) are
//! fractions: `0.001` is 0.1%.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveTime;

use crate::domain::config::EngineConfig;
use crate::domain::error::VwaptraderError;
use crate::domain::indicator::{IndicatorConfig, PriceMode};
use crate::domain::signal::{SignalConfig, VwapStopMode};
use crate::domain::sizing::SizingPolicy;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

/// Regular session window used to filter raw feed rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for SessionWindow {
    fn default() -> Self {
        SessionWindow {
            start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl SessionWindow {
    /// Both ends inclusive.
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, VwaptraderError> {
    let defaults = EngineConfig::default();

    let engine = EngineConfig {
        initial_capital: get_f64(config, "backtest", "initial_capital", defaults.initial_capital)?,
        commission_per_share: get_f64(
            config,
            "backtest",
            "commission_per_share",
            defaults.commission_per_share,
        )?,
        max_trades_per_day: get_opt(config, "strategy", "max_trades_per_day", None)?,
        indicators: build_indicators(config)?,
        signals: build_signals(config)?,
        sizing: build_sizing(config)?,
        symbol_scale: build_symbol_scale(config)?,
    };
    engine.validate()?;
    Ok(engine)
}

/// Symbols listed under `[backtest] symbols`, or an empty list when unset.
pub fn build_symbols(config: &dyn ConfigPort) -> Result<Vec<String>, VwaptraderError> {
    match config.get_string("backtest", "symbols") {
        None => Ok(Vec::new()),
        Some(s) if s.trim().is_empty() => Ok(Vec::new()),
        Some(s) => {
            parse_symbols(&s).map_err(|e| VwaptraderError::invalid("backtest", "symbols", e.to_string()))
        }
    }
}

pub fn build_session_window(config: &dyn ConfigPort) -> Result<SessionWindow, VwaptraderError> {
    let defaults = SessionWindow::default();
    let window = SessionWindow {
        start: get_time(config, "backtest", "session_start", defaults.start)?,
        end: get_time(config, "backtest", "session_end", defaults.end)?,
    };
    if window.end <= window.start {
        return Err(VwaptraderError::invalid(
            "backtest",
            "session_end",
            format!("{} must be after session_start {}", window.end, window.start),
        ));
    }
    Ok(window)
}

fn build_indicators(config: &dyn ConfigPort) -> Result<IndicatorConfig, VwaptraderError> {
    let d = IndicatorConfig::default();
    let price_mode = match config.get_string("indicators", "price_mode") {
        None => d.price_mode,
        Some(s) => PriceMode::from_str(&s)
            .map_err(|reason| VwaptraderError::invalid("indicators", "price_mode", reason))?,
    };
    Ok(IndicatorConfig {
        price_mode,
        vwap_min_volume: get_f64(config, "indicators", "vwap_min_volume", d.vwap_min_volume)?,
        volume_window: get_parsed(config, "indicators", "volume_window", d.volume_window)?,
        atr_period: get_parsed(config, "indicators", "atr_period", d.atr_period)?,
        trend_window: get_opt(config, "indicators", "trend_window", d.trend_window)?,
        volatility_window: get_parsed(config, "indicators", "volatility_window", d.volatility_window)?,
    })
}

fn build_signals(config: &dyn ConfigPort) -> Result<SignalConfig, VwaptraderError> {
    let d = SignalConfig::default();
    let section = "strategy";

    let mut vwap_stop = match config.get_string(section, "vwap_stop") {
        None => d.vwap_stop,
        Some(s) => VwapStopMode::from_str(&s)
            .map_err(|reason| VwaptraderError::invalid(section, "vwap_stop", reason))?,
    };
    if let VwapStopMode::Confirmed(n) = vwap_stop {
        vwap_stop = VwapStopMode::Confirmed(get_parsed(config, section, "exit_confirmation_bars", n)?);
    }

    Ok(SignalConfig {
        entry_start: get_time(config, section, "entry_start", d.entry_start)?,
        entry_end: get_time(config, section, "entry_end", d.entry_end)?,
        exit_cutoff: get_opt_time(config, section, "exit_cutoff", d.exit_cutoff)?,
        vwap_buffer: get_f64(config, section, "vwap_buffer", d.vwap_buffer)?,
        volume_multiplier: get_f64(config, section, "volume_multiplier", d.volume_multiplier)?,
        trend_filter: get_bool(config, section, "trend_filter", d.trend_filter)?,
        entry_confirmation_bars: get_parsed(
            config,
            section,
            "entry_confirmation_bars",
            d.entry_confirmation_bars,
        )?,
        min_session_bars: get_parsed(config, section, "min_session_bars", d.min_session_bars)?,
        vwap_stop,
        max_hold_minutes: get_opt(config, section, "max_hold_minutes", d.max_hold_minutes)?,
        profit_target: get_opt(config, section, "profit_target", d.profit_target)?,
        trailing_stop: get_opt(config, section, "trailing_stop", d.trailing_stop)?,
    })
}

fn build_sizing(config: &dyn ConfigPort) -> Result<SizingPolicy, VwaptraderError> {
    let section = "sizing";
    let policy = config
        .get_string(section, "policy")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "flat".to_string());

    match policy.as_str() {
        "flat" => Ok(SizingPolicy::FlatFraction {
            fraction: get_f64(config, section, "fraction", 1.0)?,
        }),
        "risk" => Ok(SizingPolicy::RiskBased {
            atr_multiplier: get_f64(config, section, "atr_multiplier", 1.5)?,
            max_risk_fraction: get_f64(config, section, "max_risk_fraction", 0.01)?,
            max_capital_fraction: get_f64(config, section, "max_capital_fraction", 1.0)?,
        }),
        "volatility" => Ok(SizingPolicy::VolatilityScaled {
            k: get_f64(config, section, "volatility_k", 100.0)?,
            min_scale: get_f64(config, section, "min_scale", 0.3)?,
            max_scale: get_f64(config, section, "max_scale", 1.0)?,
        }),
        other => Err(VwaptraderError::invalid(
            section,
            "policy",
            format!("unknown policy '{other}', expected flat, risk or volatility"),
        )),
    }
}

/// `[symbol_scale]` entries. Keys come back lower-cased from INI parsing.
fn build_symbol_scale(config: &dyn ConfigPort) -> Result<BTreeMap<String, f64>, VwaptraderError> {
    config
        .keys("symbol_scale")
        .into_iter()
        .map(|key| {
            let scale = get_f64(config, "symbol_scale", &key, 1.0)?;
            Ok((key.to_uppercase(), scale))
        })
        .collect()
}

fn is_disabled(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "" | "none" | "off" | "disabled"
    )
}

fn get_parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, VwaptraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<T>()
            .map_err(|_| VwaptraderError::invalid(section, key, format!("cannot parse '{s}'"))),
    }
}

fn get_f64(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, VwaptraderError> {
    get_parsed(config, section, key, default)
}

/// Like [`get_parsed`], but `none`/`off`/empty disables the setting.
fn get_opt<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Option<T>,
) -> Result<Option<T>, VwaptraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) if is_disabled(&s) => Ok(None),
        Some(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| VwaptraderError::invalid(section, key, format!("cannot parse '{s}'"))),
    }
}

fn get_bool(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, VwaptraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(VwaptraderError::invalid(section, key, format!("expected a boolean, got '{s}'"))),
        },
    }
}

fn parse_time(section: &str, key: &str, value: &str) -> Result<NaiveTime, VwaptraderError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| VwaptraderError::invalid(section, key, format!("invalid time '{value}', expected HH:MM")))
}

fn get_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: NaiveTime,
) -> Result<NaiveTime, VwaptraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => parse_time(section, key, &s),
    }
}

fn get_opt_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Option<NaiveTime>,
) -> Result<Option<NaiveTime>, VwaptraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) if is_disabled(&s) => Ok(None),
        Some(s) => parse_time(section, key, &s).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn invalid_key(result: Result<EngineConfig, VwaptraderError>) -> String {
        match result {
            Err(VwaptraderError::ConfigInvalid { key, .. }) => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = make_config("[backtest]\n");
        assert_eq!(build_engine_config(&config).unwrap(), EngineConfig::default());
        assert!(build_symbols(&config).unwrap().is_empty());
        assert_eq!(build_session_window(&config).unwrap(), SessionWindow::default());
    }

    #[test]
    fn full_config_parses() {
        let config = make_config(
            r#"
[backtest]
initial_capital = 50000
commission_per_share = 0.01
symbols = qqq, tqqq
session_start = 09:30
session_end = 16:00

[indicators]
price_mode = typical
vwap_min_volume = 1000
volume_window = 10
atr_period = 7
trend_window = 20
volatility_window = 30

[strategy]
entry_start = 09:35
entry_end = 15:00:00
exit_cutoff = 15:55
vwap_buffer = 0.002
volume_multiplier = 1.5
trend_filter = yes
entry_confirmation_bars = 2
min_session_bars = 5
vwap_stop = confirmed
exit_confirmation_bars = 3
max_hold_minutes = off
profit_target = 0.02
trailing_stop = 0.005
max_trades_per_day = 3

[sizing]
policy = risk
atr_multiplier = 2.0
max_risk_fraction = 0.02
max_capital_fraction = 0.5

[symbol_scale]
TQQQ = 0.5
"#,
        );
        let engine = build_engine_config(&config).unwrap();
        assert!((engine.initial_capital - 50_000.0).abs() < f64::EPSILON);
        assert_eq!(engine.max_trades_per_day, Some(3));
        assert_eq!(engine.indicators.price_mode, PriceMode::Typical);
        assert_eq!(engine.indicators.trend_window, Some(20));
        assert_eq!(engine.indicators.atr_period, 7);
        assert!((engine.indicators.vwap_min_volume - 1000.0).abs() < f64::EPSILON);
        assert_eq!(engine.signals.entry_start, hm(9, 35));
        assert_eq!(engine.signals.entry_end, hm(15, 0));
        assert_eq!(engine.signals.exit_cutoff, Some(hm(15, 55)));
        assert!(engine.signals.trend_filter);
        assert_eq!(engine.signals.vwap_stop, VwapStopMode::Confirmed(3));
        assert_eq!(engine.signals.max_hold_minutes, None);
        assert_eq!(engine.signals.profit_target, Some(0.02));
        assert_eq!(engine.signals.trailing_stop, Some(0.005));
        assert_eq!(
            engine.sizing,
            SizingPolicy::RiskBased {
                atr_multiplier: 2.0,
                max_risk_fraction: 0.02,
                max_capital_fraction: 0.5,
            }
        );
        assert!((engine.size_scale("TQQQ") - 0.5).abs() < f64::EPSILON);

        assert_eq!(build_symbols(&config).unwrap(), vec!["QQQ", "TQQQ"]);
    }

    #[test]
    fn immediate_stop_ignores_confirmation_bars() {
        let config = make_config("[strategy]\nvwap_stop = immediate\nexit_confirmation_bars = 4\n");
        let engine = build_engine_config(&config).unwrap();
        assert_eq!(engine.signals.vwap_stop, VwapStopMode::Immediate);
    }

    #[test]
    fn unparseable_number_fails() {
        let config = make_config("[backtest]\ninitial_capital = lots\n");
        assert_eq!(invalid_key(build_engine_config(&config)), "initial_capital");
    }

    #[test]
    fn bad_time_fails() {
        let config = make_config("[strategy]\nentry_start = 9.45am\n");
        assert_eq!(invalid_key(build_engine_config(&config)), "entry_start");
    }

    #[test]
    fn contradictory_window_fails() {
        let config = make_config("[strategy]\nentry_start = 14:00\nentry_end = 10:00\n");
        assert_eq!(invalid_key(build_engine_config(&config)), "entry_end");
    }

    #[test]
    fn unknown_policy_fails() {
        let config = make_config("[sizing]\npolicy = kelly\n");
        assert_eq!(invalid_key(build_engine_config(&config)), "policy");
    }

    #[test]
    fn volatility_policy_defaults() {
        let config = make_config("[sizing]\npolicy = volatility\n");
        assert_eq!(
            build_engine_config(&config).unwrap().sizing,
            SizingPolicy::VolatilityScaled {
                k: 100.0,
                min_scale: 0.3,
                max_scale: 1.0,
            }
        );
    }

    #[test]
    fn bad_price_mode_fails() {
        let config = make_config("[indicators]\nprice_mode = median\n");
        assert_eq!(invalid_key(build_engine_config(&config)), "price_mode");
    }

    #[test]
    fn bad_bool_fails() {
        let config = make_config("[strategy]\ntrend_filter = maybe\n");
        assert_eq!(invalid_key(build_engine_config(&config)), "trend_filter");
    }

    #[test]
    fn duplicate_symbols_fail() {
        let config = make_config("[backtest]\nsymbols = QQQ, qqq\n");
        assert!(matches!(
            build_symbols(&config),
            Err(VwaptraderError::ConfigInvalid { key, .. }) if key == "symbols"
        ));
    }

    #[test]
    fn session_window_must_be_ordered() {
        let config = make_config("[backtest]\nsession_start = 16:00\nsession_end = 09:30\n");
        assert!(build_session_window(&config).is_err());
    }

    #[test]
    fn session_window_contains() {
        let window = SessionWindow::default();
        assert!(window.contains(hm(9, 30)));
        assert!(window.contains(hm(16, 0)));
        assert!(!window.contains(hm(16, 1)));
        assert!(!window.contains(hm(9, 29)));
    }
}
