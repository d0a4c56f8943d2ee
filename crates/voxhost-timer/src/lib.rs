//! Wall-clock deadline scheduling for Voxhost.
//!
//! Ephemeral rooms are removed at an absolute deadline that survives
//! restarts, so timers here are keyed by wall-clock instants
//! ([`DateTime<Utc>`]) rather than relative durations.
//!
//! - [`Clock`]: where "now" comes from ([`SystemClock`] in production,
//!   [`TokioClock`] under a paused Tokio runtime in tests).
//! - [`DeadlineScheduler`]: one-shot timers keyed by room; scheduling
//!   an existing key replaces its deadline, cancelling removes it.
//! - [`Sweeper`]: a periodic tick for catching deadlines missed while
//!   the process was suspended.
//!
//! # Integration
//!
//! Both futures are designed to sit inside an actor's `tokio::select!`
//! loop next to its command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         due = timers.wait_for_due() => { /* remove due rooms */ }
//!         _ = sweeper.wait() => { /* remove anything overdue */ }
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{self, Instant as TokioInstant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current wall-clock time.
pub trait Clock: fmt::Debug + Send + Sync + 'static {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A wall clock that advances with Tokio's clock.
///
/// Anchored to a fixed wall-clock instant at construction, it then moves
/// forward exactly as `tokio::time::Instant` does, so `tokio::time::pause`
/// and `advance` control it deterministically.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    wall_anchor: DateTime<Utc>,
    anchor: TokioInstant,
}

impl TokioClock {
    /// Starts the clock at `wall_anchor`.
    pub fn starting_at(wall_anchor: DateTime<Utc>) -> Self {
        Self {
            wall_anchor,
            anchor: TokioInstant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TokioInstant::now().saturating_duration_since(self.anchor);
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.wall_anchor + chrono::Duration::nanoseconds(nanos)
    }
}

/// Converts a wall-clock gap into a sleep duration, flooring at zero.
pub fn until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters kept by a [`DeadlineScheduler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// New keys scheduled.
    pub scheduled: u64,
    /// Existing keys given a new deadline.
    pub rescheduled: u64,
    /// Keys cancelled before firing.
    pub cancelled: u64,
    /// Keys that came due.
    pub fired: u64,
}

// ---------------------------------------------------------------------------
// DeadlineScheduler
// ---------------------------------------------------------------------------

/// One-shot timers keyed by `K`, each firing at an absolute deadline.
///
/// A key is either pending or absent: scheduling it again replaces the
/// deadline, and once it fires or is cancelled it is gone. That makes
/// "fire at most once per key" hold without extra bookkeeping.
pub struct DeadlineScheduler<K> {
    clock: Arc<dyn Clock>,
    deadlines: HashMap<K, DateTime<Utc>>,
    stats: SchedulerStats,
}

impl<K> fmt::Debug for DeadlineScheduler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlineScheduler")
            .field("pending", &self.deadlines.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<K> DeadlineScheduler<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates an empty scheduler reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            deadlines: HashMap::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// The clock this scheduler reads.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Schedules `key` to fire at `at`, replacing any earlier deadline.
    ///
    /// Returns the replaced deadline, if there was one. A deadline in the
    /// past fires on the next [`wait_for_due`](Self::wait_for_due).
    pub fn schedule(&mut self, key: K, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let previous = self.deadlines.insert(key.clone(), at);
        if previous.is_some() {
            self.stats.rescheduled += 1;
        } else {
            self.stats.scheduled += 1;
        }
        trace!(?key, %at, replaced = previous.is_some(), "deadline scheduled");
        previous
    }

    /// Cancels `key`. Returns `true` if it was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        let removed = self.deadlines.remove(key).is_some();
        if removed {
            self.stats.cancelled += 1;
            trace!(?key, "deadline cancelled");
        }
        removed
    }

    /// The pending deadline for `key`.
    pub fn deadline(&self, key: &K) -> Option<DateTime<Utc>> {
        self.deadlines.get(key).copied()
    }

    /// Whether `key` is pending.
    pub fn contains(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    /// Number of pending keys.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.deadlines.values().min().copied()
    }

    /// Counters since construction.
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Removes and returns every key due at `now`, earliest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<K> {
        let mut due: Vec<(DateTime<Utc>, K)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, at)| (*at, k.clone()))
            .collect();
        due.sort_by_key(|(at, _)| *at);

        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        self.stats.fired += due.len() as u64;
        due.into_iter().map(|(_, k)| k).collect()
    }

    /// Waits until at least one key is due and returns the due keys.
    ///
    /// With nothing pending this future pends forever; `tokio::select!`
    /// keeps servicing its other branches. Dropping the future before it
    /// resolves loses nothing, because deadlines are only removed once
    /// they are returned.
    pub async fn wait_for_due(&mut self) -> Vec<K> {
        loop {
            let Some(next) = self.next_deadline() else {
                return std::future::pending().await;
            };

            let remaining = until(self.clock.now(), next);
            if !remaining.is_zero() {
                time::sleep(remaining).await;
            }

            let due = self.take_due(self.clock.now());
            if !due.is_empty() {
                debug!(count = due.len(), "deadlines due");
                return due;
            }
            // The clock lagged the sleep by a rounding margin; go again.
        }
    }
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

/// A periodic tick for reconciliation sweeps.
///
/// Missed ticks (the process was suspended, or the loop was busy) are
/// skipped rather than replayed, so a wake-up produces one sweep.
pub struct Sweeper {
    interval: Option<Interval>,
}

impl Sweeper {
    /// Ticks every `period`. A zero period disables the sweeper.
    pub fn new(period: Duration) -> Self {
        let interval = (!period.is_zero()).then(|| {
            let mut interval = time::interval_at(TokioInstant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        if interval.is_none() {
            debug!("periodic sweep disabled");
        }
        Self { interval }
    }

    /// Whether this sweeper ever ticks.
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Waits for the next tick. Pends forever when disabled.
    pub async fn wait(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
