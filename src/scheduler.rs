//! Cycle scheduler.
//!
//! Fires a [`CycleJob`] on a fixed interval or a cron schedule until shutdown
//! is signalled. Cycles never overlap: the next tick is only awaited after
//! the current cycle has finished, and ticks missed meanwhile are skipped.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::ConfigError;
use crate::pipeline::{CycleReport, PipelineError};

/// Minimum allowed interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Schedule for cycle execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed period between cycle starts.
    ///
    /// Interval is clamped to a minimum of 1 second.
    Interval(Duration),

    /// Cron expression: `sec min hour day month weekday` (6-field).
    /// Example: `"0/30 * * * * *"` = every 30 seconds
    Cron(String),
}

impl Schedule {
    /// Create an interval schedule.
    ///
    /// Interval is clamped to a minimum of 1 second.
    pub fn interval(duration: Duration) -> Self {
        if duration < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Interval duration is less than minimum allowed. Using minimum duration."
            );
            Self::Interval(MIN_INTERVAL)
        } else {
            Self::Interval(duration)
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval(d) => write!(f, "every {:?}", d),
            Self::Cron(expr) => write!(f, "cron: {}", expr),
        }
    }
}

/// Something the scheduler can run once per tick.
#[async_trait::async_trait]
pub trait CycleJob: Send + Sync + 'static {
    /// Run one complete cycle.
    async fn run_cycle(&self) -> Result<CycleReport, PipelineError>;
}

enum Ticker {
    Interval(Interval),
    Cron {
        schedule: Box<cron::Schedule>,
        last: Option<DateTime<Utc>>,
    },
}

/// First cron slot strictly after both `now` and the last slot fired.
///
/// Slots that passed while a cycle was running are skipped, and a timer that
/// wakes slightly before the wall clock reaches its slot cannot fire that
/// slot a second time.
fn next_cron_fire(
    schedule: &cron::Schedule,
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let from = last.map_or(now, |last| last.max(now));
    schedule.after(&from).next()
}

impl Ticker {
    /// Wait for the next fire time. Returns `false` when the schedule has none.
    async fn tick(&mut self) -> bool {
        match self {
            Self::Interval(interval) => {
                interval.tick().await;
                true
            }
            Self::Cron { schedule, last } => {
                let now = Utc::now();
                let Some(next) = next_cron_fire(schedule, *last, now) else {
                    return false;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;
                *last = Some(next);
                true
            }
        }
    }
}

/// Drives a [`CycleJob`] according to a [`Schedule`].
pub struct Scheduler<J> {
    job: Arc<J>,
    schedule: Schedule,
    cron: Option<Box<cron::Schedule>>,
    run_immediately: bool,
}

impl<J: CycleJob> Scheduler<J> {
    /// Create a scheduler.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` for an invalid cron expression.
    pub fn new(job: Arc<J>, schedule: Schedule) -> Result<Self, ConfigError> {
        let cron = match &schedule {
            Schedule::Interval(_) => None,
            Schedule::Cron(expr) => Some(Box::new(cron::Schedule::from_str(expr).map_err(
                |e| ConfigError::ValidationError(format!("invalid cron expression: {e}")),
            )?)),
        };
        Ok(Self {
            job,
            schedule,
            cron,
            run_immediately: false,
        })
    }

    /// Run one cycle at startup instead of waiting for the first tick.
    pub fn with_run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A cycle in progress is always allowed to finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = match (&self.schedule, self.cron.clone()) {
            (_, Some(schedule)) => Ticker::Cron {
                schedule,
                last: None,
            },
            (Schedule::Interval(period), None) => {
                let mut interval = tokio::time::interval_at(Instant::now() + *period, *period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ticker::Interval(interval)
            }
            (Schedule::Cron(_), None) => return,
        };

        tracing::info!(
            schedule = %self.schedule,
            run_immediately = self.run_immediately,
            "Scheduler started"
        );

        if self.run_immediately {
            self.fire().await;
        }

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                more = ticker.tick() => {
                    if !more {
                        tracing::warn!(schedule = %self.schedule, "Schedule has no further fire times");
                        break;
                    }
                    self.fire().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    async fn fire(&self) {
        match self.job.run_cycle().await {
            Ok(report) => {
                tracing::info!(
                    probed = report.probed,
                    reachable = report.reachable,
                    stored = report.stored,
                    charts = report.charts,
                    chart_failures = report.chart_failures,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Cycle complete"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Cycle failed; retrying on next tick");
            }
        }
    }
}

impl<J> fmt::Debug for Scheduler<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("schedule", &self.schedule)
            .field("run_immediately", &self.run_immediately)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    impl CountingJob {
        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CycleJob for CountingJob {
        async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::Storage(StorageError::Io(
                    std::io::Error::other("disk unavailable"),
                )));
            }
            Ok(CycleReport::default())
        }
    }

    #[test]
    fn test_schedule_interval_minimum() {
        let schedule = Schedule::interval(Duration::from_millis(100));
        assert_eq!(schedule, Schedule::Interval(MIN_INTERVAL));
    }

    #[test]
    fn test_schedule_interval_valid() {
        let schedule = Schedule::interval(Duration::from_secs(10));
        assert_eq!(schedule, Schedule::Interval(Duration::from_secs(10)));
        assert_eq!(schedule.to_string(), "every 10s");
    }

    #[test]
    fn test_scheduler_rejects_invalid_cron() {
        let job = Arc::new(CountingJob::default());
        let result = Scheduler::new(job, Schedule::Cron("not a cron".to_string()));
        assert!(result.is_err());
    }

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap() + chrono::Duration::milliseconds(ms.into())
    }

    #[test]
    fn test_next_cron_fire_never_repeats_a_slot() {
        let every_ten = cron::Schedule::from_str("0/10 * * * * *").unwrap();
        let fired = at(12, 0, 10, 0);

        // Woken a little early: the wall clock has not reached the slot yet.
        let next = next_cron_fire(&every_ten, Some(fired), at(12, 0, 9, 995));
        assert_eq!(next, Some(at(12, 0, 20, 0)));

        let first = next_cron_fire(&every_ten, None, at(12, 0, 9, 995));
        assert_eq!(first, Some(fired));
    }

    #[test]
    fn test_next_cron_fire_skips_missed_slots() {
        let every_ten = cron::Schedule::from_str("0/10 * * * * *").unwrap();

        // A cycle that overran by several slots resumes at the next future one.
        let next = next_cron_fire(&every_ten, Some(at(12, 0, 10, 0)), at(12, 0, 43, 0));
        assert_eq!(next, Some(at(12, 0, 50, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_waits_one_period() {
        let job = Arc::new(CountingJob::default());
        let (tx, rx) = watch::channel(false);
        let scheduler =
            Scheduler::new(Arc::clone(&job), Schedule::interval(Duration::from_secs(10))).unwrap();
        let handle = tokio::spawn(scheduler.run(rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(job.runs(), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(job.runs(), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_immediately() {
        let job = Arc::new(CountingJob::default());
        let (tx, rx) = watch::channel(false);
        let scheduler =
            Scheduler::new(Arc::clone(&job), Schedule::interval(Duration::from_secs(10))).unwrap()
            .with_run_immediately(true);
        let handle = tokio::spawn(scheduler.run(rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(job.runs(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_do_not_stop_scheduler() {
        let job = Arc::new(CountingJob {
            fail: true,
            ..Default::default()
        });
        let (tx, rx) = watch::channel(false);
        let scheduler =
            Scheduler::new(Arc::clone(&job), Schedule::interval(Duration::from_secs(1))).unwrap();
        let handle = tokio::spawn(scheduler.run(rx));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(job.runs(), 3);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_scheduler() {
        let job = Arc::new(CountingJob::default());
        let (tx, rx) = watch::channel(false);
        let scheduler =
            Scheduler::new(Arc::clone(&job), Schedule::interval(Duration::from_secs(60))).unwrap();
        let handle = tokio::spawn(scheduler.run(rx));

        drop(tx);
        handle.await.unwrap();
        assert_eq!(job.runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_schedule_fires() {
        let job = Arc::new(CountingJob::default());
        let (tx, rx) = watch::channel(false);
        let scheduler =
            Scheduler::new(Arc::clone(&job), Schedule::Cron("* * * * * *".to_string())).unwrap();
        let handle = tokio::spawn(scheduler.run(rx));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(job.runs() >= 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
