//! Bar data access port.

use chrono::NaiveDateTime;

use crate::domain::bar::Bar;
use crate::domain::error::StratsimError;

pub trait DataPort {
    /// Fetch the bar series for `symbol`, optionally clipped to an
    /// inclusive time range. Bars come back in ascending time order.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, StratsimError>;

    fn list_symbols(&self) -> Result<Vec<String>, StratsimError>;
}
