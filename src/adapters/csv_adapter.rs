//! CSV file bar adapter.
//!
//! One file per symbol (`<symbol>.csv`) under a base directory, columns
//! `time,open,high,low,close[,volume]` with a header row. Timestamps accept
//! `YYYY-MM-DD HH:MM:SS`, the ISO `T` form, or a bare date (midnight).

use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::domain::bar::Bar;
use crate::domain::error::StratsimError;
use crate::ports::data_port::DataPort;

pub struct CsvBarAdapter {
    base_path: PathBuf,
}

impl CsvBarAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn parse_time(value: &str) -> Result<NaiveDateTime, StratsimError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|e| StratsimError::BarSource {
            reason: format!("invalid time {value:?}: {e}"),
        })
}

fn parse_price(record: &StringRecord, index: usize, name: &str) -> Result<f64, StratsimError> {
    record
        .get(index)
        .ok_or_else(|| StratsimError::BarSource {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| StratsimError::BarSource {
            reason: format!("invalid {name} value: {e}"),
        })
}

impl DataPort for CsvBarAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, StratsimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| StratsimError::BarSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| StratsimError::BarSource {
                reason: format!("CSV parse error: {e}"),
            })?;

            let time_str = record.get(0).ok_or_else(|| StratsimError::BarSource {
                reason: "missing time column".into(),
            })?;
            let time = parse_time(time_str.trim())?;

            if start.is_some_and(|s| time < s) || end.is_some_and(|e| time > e) {
                continue;
            }

            let volume = match record.get(5).map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(raw.parse().map_err(|e| StratsimError::BarSource {
                    reason: format!("invalid volume value: {e}"),
                })?),
            };

            bars.push(Bar {
                time,
                open: parse_price(&record, 1, "open")?,
                high: parse_price(&record, 2, "high")?,
                low: parse_price(&record, 3, "low")?,
                close: parse_price(&record, 4, "close")?,
                volume,
            });
        }

        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, StratsimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| StratsimError::BarSource {
            reason: format!("failed to read directory {}: {}", self.base_path.display(), e),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StratsimError::BarSource {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".csv") {
                symbols.push(stem.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "time,open,high,low,close,volume\n\
            2024-01-15 09:15:00,100.0,110.0,90.0,105.0,50000\n\
            2024-01-15 09:30:00,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15 09:45:00,110.0,120.0,105.0,115.0,55000\n";
        fs::write(path.join("NIFTY.csv"), csv_content).unwrap();

        let no_volume = "time,open,high,low,close\n\
            2024-01-15,100.0,110.0,90.0,105.0\n";
        fs::write(path.join("BANKNIFTY.csv"), no_volume).unwrap();

        (dir, path)
    }

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn fetch_bars_returns_parsed_rows() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvBarAdapter::new(path);

        let bars = adapter.fetch_bars("NIFTY", None, None).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].time, ts(9, 15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, Some(50_000.0));
    }

    #[test]
    fn fetch_bars_clips_to_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvBarAdapter::new(path);

        let bars = adapter
            .fetch_bars("NIFTY", Some(ts(9, 30)), Some(ts(9, 30)))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].time, ts(9, 30));
    }

    #[test]
    fn missing_volume_column_is_none() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvBarAdapter::new(path);

        let bars = adapter.fetch_bars("BANKNIFTY", None, None).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].time, ts(0, 0));
        assert!(bars[0].volume.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvBarAdapter::new(path);
        assert!(adapter.fetch_bars("UNKNOWN", None, None).is_err());
    }

    #[test]
    fn list_symbols_returns_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvBarAdapter::new(path);
        assert_eq!(adapter.list_symbols().unwrap(), vec!["BANKNIFTY", "NIFTY"]);
    }
}
