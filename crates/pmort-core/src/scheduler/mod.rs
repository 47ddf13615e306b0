//! The adaptive collection loop.
//!
//! Each iteration samples the one-minute load once, runs every collector
//! (serially, or one scoped thread per collector when the load is above the
//! learned maximum), hands results to the output sink, ratchets the learned
//! maximum, and waits for an interval that shrinks as load approaches the
//! learned maximum.
//!
//! ```text
//!          ┌─────────────────── Idle ◄──────────────────┐
//!          │ timer fires                                │ arm timer
//!          ▼                                            │
//!   sample load ─► serial / parallel ─► join ─► observe ─► next_interval
//! ```

pub mod timer;

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::collector::{Collector, CollectorSet, LoadSource};
use crate::config::Config;
use crate::learner::{IntervalBounds, Learner};
use crate::output::OutputSink;

pub use timer::{Shutdown, SleepTimer, Timer, Wake};

/// How the collectors of one iteration were dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One at a time, in set order.
    Serial,
    /// One thread per collector, no ordering.
    Parallel,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Serial => write!(f, "serial"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// What happened to a single collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Recorded { bytes: usize },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct CollectorReport {
    pub name: String,
    pub outcome: TaskOutcome,
    pub elapsed: Duration,
}

/// Summary of one iteration.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub started: DateTime<Local>,
    /// The single load sample used for every decision in the iteration.
    pub load: f64,
    pub mode: ExecutionMode,
    /// In set order, whatever the mode.
    pub collectors: Vec<CollectorReport>,
    /// Whether this iteration raised the learned maximum.
    pub learned_updated: bool,
    /// Learned maximum after observing `load`.
    pub learned_max: f64,
    pub next_interval: Duration,
}

impl IterationReport {
    pub fn recorded(&self) -> usize {
        self.collectors
            .iter()
            .filter(|c| matches!(c.outcome, TaskOutcome::Recorded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.collectors.len() - self.recorded()
    }
}

/// Drives iterations until shutdown is requested.
pub struct Scheduler<L: LoadSource, T: Timer> {
    learner: Learner,
    bounds: IntervalBounds,
    load: L,
    collectors: CollectorSet,
    sink: Arc<dyn OutputSink>,
    timer: T,
    shutdown: Shutdown,
}

impl<L: LoadSource, T: Timer> Scheduler<L, T> {
    /// Builds a scheduler from a validated configuration.
    pub fn new(
        config: &Config,
        load: L,
        collectors: CollectorSet,
        sink: Arc<dyn OutputSink>,
        timer: T,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            learner: Learner::new(config.cache_dir.clone(), config.fact()),
            bounds: config.interval_bounds(),
            load,
            collectors,
            sink,
            timer,
            shutdown,
        }
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    pub fn collectors(&self) -> &CollectorSet {
        &self.collectors
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Whether `current_load` warrants running collectors in parallel.
    pub fn should_run_parallel(&self, current_load: f64) -> bool {
        self.learner.should_escalate(current_load)
    }

    /// Interval to wait after an iteration that saw `current_load`.
    pub fn next_interval(&self, current_load: f64) -> Duration {
        self.learner.next_interval(current_load, self.bounds)
    }

    /// Feeds `current_load` to the learner's ratchet.
    pub fn record_observation(&self, current_load: f64) -> bool {
        self.learner.observe(current_load)
    }

    /// Reads the one-minute load, treating a failure as an idle host.
    pub fn sample_load(&self) -> f64 {
        match self.load.one_minute() {
            Ok(load) => load,
            Err(e) => {
                warn!(error = %e, "failed to read load average, assuming 0");
                0.0
            }
        }
    }

    /// Runs one full iteration without waiting afterwards.
    pub fn run_iteration(&self) -> IterationReport {
        let started = Local::now();
        let load = self.sample_load();
        let mode = if self.should_run_parallel(load) {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Serial
        };
        debug!(load, %mode, collectors = self.collectors.len(), "starting iteration");

        if let Err(e) = self.sink.begin_iteration(started) {
            error!(error = %e, "failed to prepare output for iteration");
        }

        let sink = self.sink.as_ref();
        let collectors: Vec<CollectorReport> = match mode {
            ExecutionMode::Serial => self
                .collectors
                .iter()
                .map(|c| run_collector(c, sink))
                .collect(),
            ExecutionMode::Parallel => run_parallel(&self.collectors, sink),
        };

        let learned_updated = self.record_observation(load);
        let learned_max = self.learner.learned_maximum();
        let next_interval = self.next_interval(load);

        IterationReport {
            started,
            load,
            mode,
            collectors,
            learned_updated,
            learned_max,
            next_interval,
        }
    }

    /// Runs iterations until shutdown. Returns the number of iterations.
    pub fn run(&mut self) -> u64 {
        self.run_with(|_| {})
    }

    /// Like [`Scheduler::run`], calling `on_iteration` after each iteration.
    pub fn run_with(&mut self, mut on_iteration: impl FnMut(&IterationReport)) -> u64 {
        let mut iterations = 0u64;

        while !self.shutdown.is_requested() {
            let report = self.run_iteration();
            iterations += 1;

            info!(
                load = report.load,
                mode = %report.mode,
                recorded = report.recorded(),
                failed = report.failed(),
                learned_max = report.learned_max,
                next_interval_secs = report.next_interval.as_secs_f64(),
                "iteration complete"
            );
            on_iteration(&report);

            if self.timer.wait(report.next_interval, &self.shutdown) == Wake::Shutdown {
                break;
            }
        }

        info!(iterations, "scheduler stopped");
        iterations
    }
}

/// A collector handed to its own thread, or already run inline because no
/// thread could be started.
enum Dispatch<'a> {
    Spawned(&'a str, thread::ScopedJoinHandle<'a, CollectorReport>),
    Inline(CollectorReport),
}

fn run_parallel(collectors: &CollectorSet, sink: &dyn OutputSink) -> Vec<CollectorReport> {
    thread::scope(|s| {
        let dispatched: Vec<Dispatch<'_>> = collectors
            .iter()
            .map(|c| {
                let spawned = thread::Builder::new()
                    .name(format!("collector-{}", c.name()))
                    .spawn_scoped(s, move || run_collector(c, sink));
                match spawned {
                    Ok(handle) => Dispatch::Spawned(c.name(), handle),
                    Err(e) => Dispatch::Inline(run_after_spawn_failure(c, sink, &e)),
                }
            })
            .collect();

        dispatched
            .into_iter()
            .map(|d| match d {
                Dispatch::Inline(report) => report,
                Dispatch::Spawned(name, handle) => handle.join().unwrap_or_else(|_| {
                    error!(collector = name, "collector thread panicked");
                    CollectorReport {
                        name: name.to_string(),
                        outcome: TaskOutcome::Failed {
                            error: "collector thread panicked".to_string(),
                        },
                        elapsed: Duration::ZERO,
                    }
                }),
            })
            .collect()
    })
}

/// Runs `collector` on the calling thread after its thread failed to start.
fn run_after_spawn_failure(
    collector: &dyn Collector,
    sink: &dyn OutputSink,
    error: &io::Error,
) -> CollectorReport {
    warn!(
        collector = collector.name(),
        error = %error,
        "failed to start collector thread, running inline"
    );
    run_collector(collector, sink)
}

fn run_collector(collector: &dyn Collector, sink: &dyn OutputSink) -> CollectorReport {
    let name = collector.name();
    let start = Instant::now();

    let result = catch_unwind(AssertUnwindSafe(|| collector.collect()));
    let outcome = match result {
        Ok(Ok(text)) => match sink.record(name, &text) {
            Ok(()) => {
                debug!(collector = name, bytes = text.len(), "recorded");
                TaskOutcome::Recorded { bytes: text.len() }
            }
            Err(e) => {
                warn!(collector = name, error = %e, "failed to record output");
                TaskOutcome::Failed {
                    error: format!("record failed: {}", e),
                }
            }
        },
        Ok(Err(e)) => {
            warn!(collector = name, error = %e, "collector failed");
            TaskOutcome::Failed {
                error: e.to_string(),
            }
        }
        Err(_) => {
            error!(collector = name, "collector panicked");
            TaskOutcome::Failed {
                error: "collector panicked".to_string(),
            }
        }
    };

    CollectorReport {
        name: name.to_string(),
        outcome,
        elapsed: start.elapsed(),
    }
}
