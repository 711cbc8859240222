use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::host::QueryDesc;

/// Accumulates elapsed time of one statement across its execution loops.
#[derive(Clone, Debug, Default)]
pub struct Instrumentation {
    running: bool,
    starttime: Option<Instant>,
    // current loop
    counter: Duration,
    tuplecount: f64,
    // finished loops
    total: f64,
    ntuples: f64,
    nloops: u64,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing one execution pass.
    pub fn start(&mut self) {
        if self.starttime.is_some() {
            warn!("Instrumentation timer already running");
            return;
        }
        self.starttime = Some(Instant::now());
    }

    /// Stops timing the current pass and counts the tuples it produced.
    pub fn stop(&mut self, tuples: f64) {
        match self.starttime.take() {
            Some(started) => {
                self.counter += started.elapsed();
                self.tuplecount += tuples;
                self.running = true;
            }
            None => warn!("Instrumentation stopped without being started"),
        }
    }

    /// Folds the current loop into the totals. A second call without an
    /// intervening pass changes nothing.
    pub fn end_loop(&mut self) {
        if !self.running {
            return;
        }
        if self.starttime.take().is_some() {
            warn!("Instrumentation loop ended while timer was running");
        }

        self.total += self.counter.as_secs_f64();
        self.ntuples += self.tuplecount;
        self.nloops += 1;

        self.running = false;
        self.counter = Duration::ZERO;
        self.tuplecount = 0.0;
    }

    /// Seconds accumulated over finished loops.
    pub fn total_seconds(&self) -> f64 {
        self.total
    }

    pub fn ntuples(&self) -> f64 {
        self.ntuples
    }

    pub fn nloops(&self) -> u64 {
        self.nloops
    }
}

/// Attaches a timing instrument to `query` unless one is already present.
/// Returns true if this call attached it.
pub fn ensure_attached(query: &mut QueryDesc) -> bool {
    if query.totaltime.is_some() {
        return false;
    }
    query.totaltime = Some(Instrumentation::new());
    true
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatementTiming {
    pub elapsed_seconds: f64,
    pub start_timestamp: DateTime<Utc>,
}

/// Closes the measurement and derives the statement start as
/// `now - elapsed` at millisecond precision. Absent instrument, absent timing.
pub fn finalize(instrument: Option<&mut Instrumentation>, now: DateTime<Utc>) -> Option<StatementTiming> {
    let instrument = instrument?;
    instrument.end_loop();

    let elapsed_seconds = instrument.total_seconds().max(0.0);
    let elapsed_ms = (elapsed_seconds * 1000.0).round() as i64;

    Some(StatementTiming {
        elapsed_seconds,
        start_timestamp: now - ChronoDuration::milliseconds(elapsed_ms),
    })
}
