//! CSV minute-bar data adapter.
//!
//! One file per symbol, `<dir>/<SYMBOL>.csv`, with a header row naming at
//! least `datetime,open,high,low,close,volume`. Timestamps may carry a
//! numeric UTC offset; the local wall-clock time is kept. Rows outside the
//! session window are dropped. Row order is preserved as-is.

use crate::domain::bar::Bar;
use crate::domain::config_validation::SessionWindow;
use crate::domain::error::VwaptraderError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

const COLUMNS: [&str; 6] = ["datetime", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
    session: SessionWindow,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf, session: SessionWindow) -> Self {
        Self { base_path, session }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn no_data(symbol: &str, reason: impl Into<String>) -> VwaptraderError {
    VwaptraderError::NoData {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

/// `YYYY-MM-DD HH:MM[:SS]`, `T` separator allowed, optional `+HH:MM` /
/// `+HHMM` offset.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(ts);
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%z",
    ] {
        if let Ok(ts) = DateTime::<FixedOffset>::parse_from_str(value, fmt) {
            return Some(ts.naive_local());
        }
    }
    None
}

fn parse_volume(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        let v = value.parse::<f64>().ok()?;
        (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, VwaptraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| no_data(symbol, format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| no_data(symbol, format!("CSV header error: {}", e)))?
            .clone();

        let mut index = [0usize; 6];
        for (slot, name) in index.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| no_data(symbol, format!("missing {} column", name)))?;
        }
        let [ts_col, open_col, high_col, low_col, close_col, volume_col] = index;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let line = row + 2;
            let record =
                result.map_err(|e| no_data(symbol, format!("CSV parse error: {}", e)))?;
            let field = |col: usize, name: &str| {
                record
                    .get(col)
                    .ok_or_else(|| no_data(symbol, format!("line {}: missing {}", line, name)))
            };
            let price = |col: usize, name: &str| -> Result<f64, VwaptraderError> {
                field(col, name)?.trim().parse::<f64>().map_err(|e| {
                    no_data(symbol, format!("line {}: invalid {} value: {}", line, name, e))
                })
            };

            let raw_ts = field(ts_col, "datetime")?;
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                no_data(symbol, format!("line {}: invalid datetime '{}'", line, raw_ts))
            })?;
            if !self.session.contains(timestamp.time()) {
                continue;
            }

            let raw_volume = field(volume_col, "volume")?;
            let volume = parse_volume(raw_volume).ok_or_else(|| {
                no_data(symbol, format!("line {}: invalid volume '{}'", line, raw_volume))
            })?;

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: price(open_col, "open")?,
                high: price(high_col, "high")?,
                low: price(low_col, "low")?,
                close: price(close_col, "close")?,
                volume,
            });
        }

        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, VwaptraderError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                symbols.push(stem.to_string_lossy().into_owned());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "datetime,open,high,low,close,volume\n\
            2024-03-01 09:29:00,99.0,99.5,98.5,99.0,100\n\
            2024-03-01 09:30:00,100.0,100.5,99.5,100.0,500\n\
            2024-03-01 09:31:00-05:00,100.5,101.2,100.4,101.0,500\n\
            2024-03-01 16:01:00,101.0,101.0,101.0,101.0,900\n";

        fs::write(path.join("QQQ.csv"), csv_content).unwrap();
        fs::write(path.join("SPY.csv"), "datetime,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    fn adapter(path: PathBuf) -> CsvAdapter {
        CsvAdapter::new(path, SessionWindow::default())
    }

    #[test]
    fn fetch_bars_filters_session_and_keeps_local_time() {
        let (_dir, path) = setup_test_data();
        let bars = adapter(path).fetch_bars("QQQ").unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].symbol, "QQQ");
        assert_eq!(bars[0].time(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(bars[1].time(), NaiveTime::from_hms_opt(9, 31, 0).unwrap());
        assert_eq!(bars[1].high, 101.2);
        assert_eq!(bars[1].close, 101.0);
        assert_eq!(bars[1].volume, 500);
    }

    #[test]
    fn fetch_bars_empty_file() {
        let (_dir, path) = setup_test_data();
        assert!(adapter(path).fetch_bars("SPY").unwrap().is_empty());
    }

    #[test]
    fn fetch_bars_missing_file() {
        let (_dir, path) = setup_test_data();
        let result = adapter(path).fetch_bars("TQQQ");
        assert!(matches!(result, Err(VwaptraderError::NoData { symbol, .. }) if symbol == "TQQQ"));
    }

    #[test]
    fn fetch_bars_missing_column() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("QQQ.csv"),
            "datetime,open,high,low,close\n2024-03-01 09:30:00,1,1,1,1\n",
        )
        .unwrap();
        let result = adapter(dir.path().to_path_buf()).fetch_bars("QQQ");
        assert!(matches!(result, Err(VwaptraderError::NoData { reason, .. }) if reason.contains("volume")));
    }

    #[test]
    fn fetch_bars_does_not_reorder() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("QQQ.csv"),
            "datetime,open,high,low,close,volume\n\
             2024-03-01 09:31,1,1,1,1,10\n\
             2024-03-01 09:30,1,1,1,1,10\n",
        )
        .unwrap();
        let bars = adapter(dir.path().to_path_buf()).fetch_bars("QQQ").unwrap();
        assert!(bars[0].timestamp > bars[1].timestamp);
    }

    #[test]
    fn parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:30:00-04:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:30:00+0100"), Some(expected));
        assert_eq!(parse_timestamp("03/01/2024 09:30"), None);
    }

    #[test]
    fn parse_volume_accepts_integral_floats() {
        assert_eq!(parse_volume("500"), Some(500));
        assert_eq!(parse_volume("500.0"), Some(500));
        assert_eq!(parse_volume("500.5"), None);
        assert_eq!(parse_volume("-3"), Some(-3));
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        assert_eq!(adapter(path).list_symbols().unwrap(), vec!["QQQ", "SPY"]);
    }
}
