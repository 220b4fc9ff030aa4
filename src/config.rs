use crate::error::ConfigError;
use crate::grid::{DEFAULT_COLS, DEFAULT_ROWS};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::selection::EnterPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Editor settings, read from JSON. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub default_rows: usize,
    pub default_cols: usize,
    pub history_capacity: usize,
    pub autosave_quiet_ms: u64,
    pub enter_policy: EnterPolicy,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            default_rows: DEFAULT_ROWS,
            default_cols: DEFAULT_COLS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            autosave_quiet_ms: 2000,
            enter_policy: EnterPolicy::CommitAndMove,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_ms)
    }
}
