//! Transaction latency instrumentation.

use ripple_core::{Error, Result};
use serde::Serialize;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Source of wall-clock time in milliseconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// The host clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(all(feature = "wasm", target_arch = "wasm32"))]
    fn now(&self) -> f64 {
        js_sys::Date::now()
    }

    #[cfg(not(all(feature = "wasm", target_arch = "wasm32")))]
    fn now(&self) -> f64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Identifier of a monitored transaction.
pub type MonitoredId = u64;

/// One monitored transaction.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: MonitoredId,
    pub start_time: f64,
    pub elapsed: Option<f64>,
    pub open: bool,
}

/// Aggregate latency statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStats {
    /// Highest number of simultaneously active transactions seen.
    pub max_active: usize,
    pub active: usize,
    pub fulfilled: usize,
    /// Mean elapsed time over every completed transaction, in ms.
    pub avg: f64,
    /// Mean elapsed time over the most recent completed transactions, in ms.
    pub avg_recent: f64,
}

impl fmt::Display for MonitorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max active: {}, active: {}, fulfilled: {}, avg: {:.2}, avg recent: {:.2}",
            self.max_active, self.active, self.fulfilled, self.avg, self.avg_recent
        )
    }
}

/// Records start and end times of transactions.
pub struct TransactionMonitor {
    clock: Rc<dyn Clock>,
    recent_window: usize,
    next_id: MonitoredId,
    active: BTreeMap<MonitoredId, TransactionRecord>,
    fulfilled: BTreeMap<MonitoredId, TransactionRecord>,
    history: Vec<f64>,
    max_active: usize,
}

impl TransactionMonitor {
    /// Creates a monitor on the system clock.
    pub fn new(recent_window: usize) -> Self {
        Self::with_clock(Rc::new(SystemClock), recent_window)
    }

    pub fn with_clock(clock: Rc<dyn Clock>, recent_window: usize) -> Self {
        Self {
            clock,
            recent_window,
            next_id: 1,
            active: BTreeMap::new(),
            fulfilled: BTreeMap::new(),
            history: Vec::new(),
            max_active: 0,
        }
    }

    /// Records the start of a transaction.
    pub fn start(&mut self) -> MonitoredId {
        let id = self.next_id;
        self.next_id += 1;
        self.active.insert(
            id,
            TransactionRecord {
                id,
                start_time: self.clock.now(),
                elapsed: None,
                open: true,
            },
        );
        self.max_active = self.max_active.max(self.active.len());
        id
    }

    /// Records the end of a transaction and returns its elapsed time.
    pub fn end(&mut self, id: MonitoredId) -> Result<f64> {
        let mut record = self
            .active
            .remove(&id)
            .ok_or_else(|| Error::invalid_operation(format!("transaction {id} is not active")))?;
        let elapsed = self.clock.now() - record.start_time;
        record.elapsed = Some(elapsed);
        record.open = false;
        self.history.push(elapsed);
        self.fulfilled.insert(id, record);
        Ok(elapsed)
    }

    /// Returns the record of a transaction, active or fulfilled.
    pub fn record(&self, id: MonitoredId) -> Option<&TransactionRecord> {
        self.active.get(&id).or_else(|| self.fulfilled.get(&id))
    }

    /// Elapsed times in completion order.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn stats(&self) -> MonitorStats {
        let recent_start = self.history.len().saturating_sub(self.recent_window);
        MonitorStats {
            max_active: self.max_active,
            active: self.active.len(),
            fulfilled: self.fulfilled.len(),
            avg: mean(&self.history),
            avg_recent: mean(&self.history[recent_start..]),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual(window: usize) -> (Rc<ManualClock>, TransactionMonitor) {
        let clock = Rc::new(ManualClock::new(1_000.0));
        let monitor = TransactionMonitor::with_clock(clock.clone(), window);
        (clock, monitor)
    }

    #[test]
    fn test_monitor_average_two_decimals() {
        let (clock, mut monitor) = manual(10);
        for elapsed in [10.0, 20.0, 30.0, 40.0, 50.0] {
            let id = monitor.start();
            clock.advance(elapsed);
            monitor.end(id).unwrap();
        }

        let stats = monitor.stats();
        assert_eq!(stats.avg, 30.0);
        assert_eq!(format!("{:.2}", stats.avg), "30.00");
        assert!(stats.to_string().contains("avg: 30.00"));
        assert_eq!(stats.fulfilled, 5);
        assert_eq!(stats.active, 0);
    }

    #[test]
    fn test_monitor_recent_window() {
        let (clock, mut monitor) = manual(2);
        for elapsed in [10.0, 20.0, 30.0, 40.0] {
            let id = monitor.start();
            clock.advance(elapsed);
            monitor.end(id).unwrap();
        }
        let stats = monitor.stats();
        assert_eq!(stats.avg, 25.0);
        assert_eq!(stats.avg_recent, 35.0);
    }

    #[test]
    fn test_monitor_empty_history() {
        let (_, monitor) = manual(10);
        assert_eq!(monitor.stats(), MonitorStats::default());
        assert_eq!(
            monitor.stats().to_string(),
            "max active: 0, active: 0, fulfilled: 0, avg: 0.00, avg recent: 0.00"
        );
    }

    #[test]
    fn test_monitor_tracks_max_active() {
        let (clock, mut monitor) = manual(10);
        let a = monitor.start();
        let b = monitor.start();
        let c = monitor.start();
        assert_eq!(monitor.stats().active, 3);

        clock.advance(5.0);
        monitor.end(b).unwrap();
        monitor.end(a).unwrap();
        let d = monitor.start();

        let stats = monitor.stats();
        assert_eq!(stats.max_active, 3);
        assert_eq!(stats.active, 2);
        assert!(monitor.record(c).unwrap().open);
        assert!(monitor.record(d).unwrap().open);
        assert_eq!(monitor.record(a).unwrap().elapsed, Some(5.0));
    }

    #[test]
    fn test_monitor_end_unknown_id() {
        let (_, mut monitor) = manual(10);
        assert!(monitor.end(99).is_err());

        let id = monitor.start();
        monitor.end(id).unwrap();
        assert!(monitor.end(id).is_err());
        assert_eq!(monitor.history().len(), 1);
    }
}
