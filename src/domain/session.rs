//! Per-symbol bar feed validation and trading-day boundaries.
//!
//! A feed is accepted only if it is non-empty, belongs to one symbol, is
//! strictly ascending in time and every bar is well formed. Nothing is
//! repaired: the first violation is reported.

use crate::domain::bar::Bar;
use crate::domain::error::{DataQualityIssue, VwaptraderError};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::ops::Range;

/// Contiguous run of bars sharing one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingDay {
    pub date: NaiveDate,
    pub range: Range<usize>,
}

impl TradingDay {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub days: Vec<TradingDay>,
}

impl SymbolData {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, VwaptraderError> {
        let symbol = symbol.into();
        validate_feed(&symbol, &bars)?;
        let days = split_days(&bars);
        Ok(Self { symbol, bars, days })
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn day_bars(&self, day: &TradingDay) -> &[Bar] {
        &self.bars[day.range.clone()]
    }
}

/// Checks `bar` against the bar replayed just before it.
pub fn check_next(symbol: &str, previous: Option<&Bar>, bar: &Bar) -> Result<(), DataQualityIssue> {
    if bar.symbol != symbol {
        return Err(DataQualityIssue::SymbolMismatch {
            timestamp: bar.timestamp,
            found: bar.symbol.clone(),
        });
    }
    bar.check()?;
    if let Some(prev) = previous {
        if bar.timestamp == prev.timestamp {
            return Err(DataQualityIssue::Duplicate(bar.timestamp));
        }
        if bar.timestamp < prev.timestamp {
            return Err(DataQualityIssue::OutOfOrder {
                previous: prev.timestamp,
                current: bar.timestamp,
            });
        }
    }
    Ok(())
}

pub fn validate_feed(symbol: &str, bars: &[Bar]) -> Result<(), VwaptraderError> {
    if bars.is_empty() {
        return Err(VwaptraderError::data_quality(
            symbol,
            DataQualityIssue::EmptySession,
        ));
    }
    let mut previous: Option<&Bar> = None;
    for bar in bars {
        check_next(symbol, previous, bar)
            .map_err(|issue| VwaptraderError::data_quality(symbol, issue))?;
        previous = Some(bar);
    }
    Ok(())
}

/// Splits an ascending feed into trading days by calendar date.
pub fn split_days(bars: &[Bar]) -> Vec<TradingDay> {
    let mut days: Vec<TradingDay> = Vec::new();
    for (i, bar) in bars.iter().enumerate() {
        match days.last_mut() {
            Some(day) if day.date == bar.date() => day.range.end = i + 1,
            _ => days.push(TradingDay {
                date: bar.date(),
                range: i..i + 1,
            }),
        }
    }
    days
}

/// Union of all dates across several date sequences, ascending.
pub fn build_unified_timeline<'a, I>(dates: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let unique: BTreeSet<NaiveDate> = dates.into_iter().copied().collect();
    unique.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn make_bar(symbol: &str, ts: &str, close: f64) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M").unwrap(),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn splits_days_by_date() {
        let bars = vec![
            make_bar("QQQ", "2024-03-01 09:30", 100.0),
            make_bar("QQQ", "2024-03-01 09:31", 101.0),
            make_bar("QQQ", "2024-03-04 09:30", 102.0),
            make_bar("QQQ", "2024-03-04 09:31", 103.0),
            make_bar("QQQ", "2024-03-04 09:32", 104.0),
        ];
        let data = SymbolData::new("QQQ", bars).unwrap();

        assert_eq!(data.days.len(), 2);
        assert_eq!(data.days[0].range, 0..2);
        assert_eq!(data.days[1].range, 2..5);
        assert_eq!(data.day_bars(&data.days[1]).len(), 3);
        assert_eq!(data.bar_count(), 5);
    }

    #[test]
    fn rejects_empty_feed() {
        let err = SymbolData::new("QQQ", vec![]).unwrap_err();
        assert!(matches!(
            err,
            VwaptraderError::DataQuality {
                issue: DataQualityIssue::EmptySession,
                ..
            }
        ));
    }

    #[test]
    fn rejects_duplicate_timestamp() {
        let bars = vec![
            make_bar("QQQ", "2024-03-01 09:30", 100.0),
            make_bar("QQQ", "2024-03-01 09:30", 100.5),
        ];
        let err = SymbolData::new("QQQ", bars).unwrap_err();
        assert!(matches!(
            err,
            VwaptraderError::DataQuality {
                issue: DataQualityIssue::Duplicate(_),
                ..
            }
        ));
    }

    #[test]
    fn rejects_out_of_order_timestamp() {
        let bars = vec![
            make_bar("QQQ", "2024-03-01 09:31", 100.0),
            make_bar("QQQ", "2024-03-01 09:30", 100.5),
        ];
        let err = SymbolData::new("QQQ", bars).unwrap_err();
        assert!(matches!(
            err,
            VwaptraderError::DataQuality {
                issue: DataQualityIssue::OutOfOrder { .. },
                ..
            }
        ));
    }

    #[test]
    fn rejects_foreign_symbol() {
        let bars = vec![
            make_bar("QQQ", "2024-03-01 09:30", 100.0),
            make_bar("TQQQ", "2024-03-01 09:31", 50.0),
        ];
        let err = SymbolData::new("QQQ", bars).unwrap_err();
        assert!(matches!(
            err,
            VwaptraderError::DataQuality {
                issue: DataQualityIssue::SymbolMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn unified_timeline_dedups_and_sorts() {
        let a = [
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ];
        let b = [NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()];
        let timeline = build_unified_timeline(a.iter().chain(b.iter()));
        assert_eq!(
            timeline,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            ]
        );
    }
}
