//! JSON file strategy store.
//!
//! One pretty-printed JSON document per strategy under a base directory,
//! keyed by a slug of the strategy name.

use std::fs;
use std::path::PathBuf;

use crate::domain::error::StratsimError;
use crate::domain::strategy::StrategyDsl;
use crate::ports::store_port::StrategyStore;

pub struct JsonFileStore {
    base_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}.json"))
    }
}

/// Lowercased alphanumeric runs joined by single dashes.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() { "strategy".into() } else { out }
}

impl StrategyStore for JsonFileStore {
    fn save(&self, strategy: &StrategyDsl) -> Result<String, StratsimError> {
        fs::create_dir_all(&self.base_path).map_err(|e| StratsimError::Store {
            reason: format!("failed to create {}: {}", self.base_path.display(), e),
        })?;
        let id = slug(&strategy.name);
        let json = serde_json::to_string_pretty(strategy)?;
        let path = self.file_path(&id);
        fs::write(&path, json).map_err(|e| StratsimError::Store {
            reason: format!("failed to write {}: {}", path.display(), e),
        })?;
        Ok(id)
    }

    fn load(&self, id: &str) -> Result<StrategyDsl, StratsimError> {
        let path = self.file_path(id);
        let content = fs::read_to_string(&path).map_err(|e| StratsimError::Store {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn list(&self) -> Result<Vec<String>, StratsimError> {
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StratsimError::Store {
                    reason: format!("failed to read directory {}: {}", self.base_path.display(), e),
                });
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StratsimError::Store {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".json") {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::risk::{ExecutionConfig, RiskConfig, Sizing};
    use crate::domain::rule::RuleSet;
    use tempfile::TempDir;

    fn sample(name: &str) -> StrategyDsl {
        StrategyDsl {
            name: name.into(),
            version: "1".into(),
            indicators: vec![],
            rules: RuleSet::default(),
            risk: RiskConfig {
                sizing: Sizing::FixedQuantity { quantity: 1.0 },
                stop_loss: None,
                take_profit: None,
                trailing_stop: None,
                max_open_positions: 1,
                allow_pyramiding: false,
            },
            execution: ExecutionConfig::default(),
        }
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());

        let strategy = sample("RSI Reversal v2");
        let id = store.save(&strategy).unwrap();
        assert_eq!(id, "rsi-reversal-v2");

        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded, strategy);
    }

    #[test]
    fn list_returns_sorted_ids() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());

        store.save(&sample("Momentum")).unwrap();
        store.save(&sample("Breakout")).unwrap();
        assert_eq!(store.list().unwrap(), vec!["breakout", "momentum"]);
    }

    #[test]
    fn list_on_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nowhere"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn load_missing_id_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load("ghost"),
            Err(StratsimError::Store { .. })
        ));
    }
}
