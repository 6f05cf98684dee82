//! Symbol universe: list parsing and feed loading.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::domain::bar::Bar;
use crate::domain::error::VwaptraderError;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Comma-separated symbols, trimmed and upper-cased, in input order.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Fetches every symbol's bars. Failures are kept per symbol so the
/// engine can report them alongside successful runs.
pub fn load_feeds(
    data_port: &dyn DataPort,
    symbols: &[String],
) -> Vec<(String, Result<Vec<Bar>, VwaptraderError>)> {
    symbols
        .iter()
        .map(|symbol| {
            let feed = data_port.fetch_bars(symbol);
            match &feed {
                Ok(bars) => info!(symbol = %symbol, bars = bars.len(), "loaded feed"),
                Err(e) => warn!(symbol = %symbol, error = %e, "could not load feed"),
            }
            (symbol.clone(), feed)
        })
        .collect()
}
