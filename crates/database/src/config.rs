//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration of a [`Database`](crate::Database).
///
/// Deserializes from a partial JSON object; missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Records transaction latencies when true.
    pub monitor: bool,
    /// Number of most recent transactions averaged by `avg_recent`.
    pub recent_window: usize,
    /// Field identifying records for item caches and projections.
    pub id_field: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            monitor: false,
            recent_window: 10,
            id_field: String::from("id"),
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monitor(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_recent_window(mut self, window: usize) -> Self {
        self.recent_window = window;
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }
}
