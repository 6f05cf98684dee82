#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
pub use vwaptrader::domain::bar::Bar;
use vwaptrader::domain::config::EngineConfig;
use vwaptrader::domain::error::VwaptraderError;
use vwaptrader::domain::signal::{SignalConfig, VwapStopMode};
use vwaptrader::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, VwaptraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(VwaptraderError::NoData {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, VwaptraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn at(d: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(2024, 3, d).and_hms_opt(hour, minute, 0).unwrap()
}

/// Flat bar (open = high = low = close) on 2024-03-`d`.
pub fn make_bar(symbol: &str, d: u32, hour: u32, minute: u32, close: f64, volume: i64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp: at(d, hour, minute),
        open: close,
        high: close,
        low: close,
        close,
        volume,
    }
}

/// Strategy with every optional exit disabled and no warm-up, so short
/// hand-written feeds can trigger entries.
pub fn sample_config() -> EngineConfig {
    EngineConfig {
        initial_capital: 100_000.0,
        commission_per_share: 0.005,
        signals: SignalConfig {
            entry_start: hm(9, 30),
            entry_end: hm(15, 30),
            exit_cutoff: None,
            vwap_buffer: 0.001,
            volume_multiplier: 1.0,
            trend_filter: false,
            entry_confirmation_bars: 0,
            min_session_bars: 0,
            vwap_stop: VwapStopMode::Immediate,
            max_hold_minutes: None,
            profit_target: None,
            trailing_stop: None,
        },
        ..Default::default()
    }
}

/// 100, 101, then 99 on thin volume: one long entered at 101 and stopped
/// out at 99.
pub fn long_then_stop_bars(symbol: &str, d: u32) -> Vec<Bar> {
    vec![
        make_bar(symbol, d, 9, 30, 100.0, 500),
        make_bar(symbol, d, 9, 31, 101.0, 500),
        make_bar(symbol, d, 9, 45, 99.0, 400),
    ]
}
