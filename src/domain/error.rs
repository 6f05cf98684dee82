//! Domain error types.

use chrono::NaiveDateTime;

/// What was wrong with a symbol's bar feed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataQualityIssue {
    #[error("empty bar sequence")]
    EmptySession,

    #[error("out-of-order timestamp {current} after {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("duplicate timestamp {0}")]
    Duplicate(NaiveDateTime),

    #[error("bar at {timestamp} belongs to {found}")]
    SymbolMismatch {
        timestamp: NaiveDateTime,
        found: String,
    },

    #[error("malformed bar at {timestamp}: {reason}")]
    Malformed {
        timestamp: NaiveDateTime,
        reason: String,
    },
}

/// Top-level error type for vwaptrader.
#[derive(Debug, thiserror::Error)]
pub enum VwaptraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data quality error for {symbol}: {issue}")]
    DataQuality {
        symbol: String,
        issue: DataQualityIssue,
    },

    #[error("no data for {symbol}: {reason}")]
    NoData { symbol: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VwaptraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        VwaptraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn data_quality(symbol: &str, issue: DataQualityIssue) -> Self {
        VwaptraderError::DataQuality {
            symbol: symbol.to_string(),
            issue,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            VwaptraderError::ConfigParse { .. }
                | VwaptraderError::ConfigMissing { .. }
                | VwaptraderError::ConfigInvalid { .. }
        )
    }
}

impl From<&VwaptraderError> for std::process::ExitCode {
    fn from(err: &VwaptraderError) -> Self {
        let code: u8 = match err {
            VwaptraderError::Io(_) => 1,
            VwaptraderError::ConfigParse { .. }
            | VwaptraderError::ConfigMissing { .. }
            | VwaptraderError::ConfigInvalid { .. } => 2,
            VwaptraderError::DataQuality { .. } | VwaptraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn data_quality_message_names_symbol_and_issue() {
        let err = VwaptraderError::data_quality(
            "QQQ",
            DataQualityIssue::OutOfOrder {
                previous: ts("2024-03-01 09:31"),
                current: ts("2024-03-01 09:30"),
            },
        );
        assert_eq!(
            err.to_string(),
            "data quality error for QQQ: out-of-order timestamp 2024-03-01 09:30:00 after 2024-03-01 09:31:00"
        );
    }

    #[test]
    fn config_errors_are_classified() {
        let err = VwaptraderError::invalid("strategy", "entry_end", "before entry_start");
        assert!(err.is_config_error());
        assert_eq!(
            err.to_string(),
            "invalid config value [strategy] entry_end: before entry_start"
        );

        let err = VwaptraderError::NoData {
            symbol: "QQQ".into(),
            reason: "missing file".into(),
        };
        assert!(!err.is_config_error());
    }
}
