//! Minute bar representation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::error::DataQualityIssue;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Structural checks a bar must pass before it is replayed.
    pub fn check(&self) -> Result<(), DataQualityIssue> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in prices {
            if !value.is_finite() || value <= 0.0 {
                return Err(DataQualityIssue::Malformed {
                    timestamp: self.timestamp,
                    reason: format!("{field} must be a positive finite price, got {value}"),
                });
            }
        }
        if self.high < self.low {
            return Err(DataQualityIssue::Malformed {
                timestamp: self.timestamp,
                reason: format!("high {} below low {}", self.high, self.low),
            });
        }
        if self.volume < 0 {
            return Err(DataQualityIssue::Malformed {
                timestamp: self.timestamp,
                reason: format!("negative volume {}", self.volume),
            });
        }
        Ok(())
    }
}
