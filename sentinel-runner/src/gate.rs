//! Clock and periodic run gate.
//!
//! "Today" always comes from a `Clock` so jobs are testable with a fixed date.
//! A `RunGate` allows a job once at least `min_interval_days` have passed since
//! its last recorded checkpoint.

use chrono::{Local, NaiveDate};
use sentinel_core::store::{CheckpointStore, StoreError};

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Never run before.
    FirstRun,
    /// Interval has elapsed.
    Due { last_run: NaiveDate },
    /// Caller asked to bypass the gate.
    Forced,
    /// Ran too recently.
    NotDue { last_run: NaiveDate, next_due: NaiveDate },
}

impl GateDecision {
    pub fn should_run(&self) -> bool {
        !matches!(self, GateDecision::NotDue { .. })
    }
}

pub struct RunGate<'a> {
    job: &'a str,
    min_interval_days: i64,
    checkpoints: &'a CheckpointStore,
}

impl<'a> RunGate<'a> {
    pub fn new(job: &'a str, min_interval_days: i64, checkpoints: &'a CheckpointStore) -> Self {
        Self {
            job,
            min_interval_days,
            checkpoints,
        }
    }

    pub fn check(&self, today: NaiveDate, force: bool) -> Result<GateDecision, StoreError> {
        if force {
            return Ok(GateDecision::Forced);
        }
        let Some(last_run) = self.checkpoints.last_run(self.job)? else {
            return Ok(GateDecision::FirstRun);
        };
        if (today - last_run).num_days() >= self.min_interval_days {
            Ok(GateDecision::Due { last_run })
        } else {
            Ok(GateDecision::NotDue {
                last_run,
                next_due: last_run + chrono::Duration::days(self.min_interval_days),
            })
        }
    }

    /// Record a completed run.
    pub fn record(&self, today: NaiveDate) -> Result<(), StoreError> {
        self.checkpoints.record(self.job, today)
    }
}
