// Keyforge Rule Table
// Editable rule list with a lock-light dispatch snapshot

pub mod cycle;
pub mod table;

use thiserror::Error;

use crate::KeyName;

pub use cycle::find_cycle;
pub use table::{DispatchMap, RuleId, RuleTable, RulesHandle};

/// A rule edit that would close a remap loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Remap cycle detected: {}", cycle::format_path(.path))]
pub struct CycleError {
    path: Vec<KeyName>,
}

impl CycleError {
    pub fn new(path: Vec<KeyName>) -> Self {
        Self { path }
    }

    /// The loop, first node repeated at the end
    pub fn path(&self) -> &[KeyName] {
        &self.path
    }
}

/// Errors from rule table edits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("No rule at index {index} (table holds {len})")]
    Index { index: usize, len: usize },

    #[error("Rule {field} must not be empty")]
    EmptyKey { field: &'static str },

    #[error("Key '{0}' is already remapped by another enabled rule")]
    DuplicateSource(KeyName),
}
