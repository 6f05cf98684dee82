//! Minute-bar feed port.

use crate::domain::bar::Bar;
use crate::domain::error::VwaptraderError;

pub trait DataPort {
    /// All bars for `symbol`, in feed order.
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, VwaptraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, VwaptraderError>;
}
