//! Engine statistics snapshot.

use crate::monitor::MonitorStats;
use ripple_reactive::DispatcherStats;
use serde::Serialize;
use std::fmt;

/// Point-in-time statistics of a [`Database`](crate::Database).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EngineStats {
    pub dispatcher: DispatcherStats,
    /// Present while monitoring is on.
    pub transactions: Option<MonitorStats>,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subscriptions: {}, subscribers: {}, tables: [{}]",
            self.dispatcher.subscriptions,
            self.dispatcher.subscribers,
            self.dispatcher.tables.join(", ")
        )?;
        if let Some(transactions) = &self.transactions {
            write!(f, ", {transactions}")?;
        }
        Ok(())
    }
}
