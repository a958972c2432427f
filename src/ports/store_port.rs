//! Strategy persistence port.

use crate::domain::error::StratsimError;
use crate::domain::strategy::StrategyDsl;

pub trait StrategyStore {
    /// Persist a strategy, returning the id it can be loaded by.
    fn save(&self, strategy: &StrategyDsl) -> Result<String, StratsimError>;

    fn load(&self, id: &str) -> Result<StrategyDsl, StratsimError>;

    /// Ids of every stored strategy, sorted.
    fn list(&self) -> Result<Vec<String>, StratsimError>;
}
