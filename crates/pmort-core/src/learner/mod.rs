//! Load learning: the ratcheted maximum load and the interval it implies.
//!
//! The learner keeps one fact, the highest one-minute load average seen on
//! this host. It only ever moves up. The same value serves as the threshold
//! above which collectors run in parallel and as the denominator of the
//! linear interval formula in [`linear`].

pub mod fact;
pub mod linear;

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use fact::{DEFAULT_LOAD_THRESHOLD, Fact, FactError, FactLayout, FactStore};
pub use linear::{ScheduleState, load_scale, next_interval};

/// Minimum and maximum polling interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalBounds {
    pub minimum: Duration,
    pub maximum: Duration,
}

impl Default for IntervalBounds {
    fn default() -> Self {
        Self {
            minimum: Duration::from_secs(1),
            maximum: Duration::from_secs(600),
        }
    }
}

/// Learns the host's maximum one-minute load.
///
/// Not synchronised: the scheduler calls it from one thread, once per
/// iteration, after all collectors have finished.
#[derive(Debug, Clone)]
pub struct Learner {
    store: FactStore,
    fact: Fact,
}

impl Learner {
    pub fn new(cache_dir: impl Into<PathBuf>, fact: Fact) -> Self {
        Self {
            store: FactStore::new(cache_dir),
            fact,
        }
    }

    pub fn fact(&self) -> &Fact {
        &self.fact
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    /// Current learned maximum, or the fact's default.
    pub fn learned_maximum(&self) -> f64 {
        self.store.get(&self.fact)
    }

    /// Whether `current_load` is above the learned threshold.
    pub fn should_escalate(&self, current_load: f64) -> bool {
        current_load > self.learned_maximum()
    }

    /// Ratchet update: persists `current_load` if it exceeds the stored value.
    ///
    /// Returns `true` if the stored value changed. Write failures are logged
    /// and reported as no change.
    pub fn observe(&self, current_load: f64) -> bool {
        let learned = self.learned_maximum();
        if !(current_load > learned) {
            debug!(
                fact = self.fact.name,
                current_load, learned, "load below learned maximum"
            );
            return false;
        }

        match self.store.put(&self.fact, current_load) {
            Ok(()) => {
                info!(
                    fact = self.fact.name,
                    from = learned,
                    to = current_load,
                    "learned new maximum load"
                );
                true
            }
            Err(e) => {
                warn!(
                    fact = self.fact.name,
                    path = %self.store.path(&self.fact).display(),
                    error = %e,
                    "failed to persist learned load"
                );
                false
            }
        }
    }

    /// Interval for `current_load` against the current learned maximum.
    ///
    /// Saturates at `bounds.maximum` when the result is not representable.
    pub fn next_interval(&self, current_load: f64, bounds: IntervalBounds) -> Duration {
        let state = ScheduleState {
            current_load,
            learned_max: self.learned_maximum(),
            minimum_interval: bounds.minimum.as_secs_f64(),
            maximum_interval: bounds.maximum.as_secs_f64(),
        };
        Duration::try_from_secs_f64(state.next_interval()).unwrap_or(bounds.maximum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_observe_ratchets_up_only() {
        let dir = tempdir().unwrap();
        let learner = Learner::new(dir.path(), Fact::LOAD_THRESHOLD);
        assert_eq!(learner.learned_maximum(), 0.1);

        assert!(learner.observe(1.5));
        assert_eq!(learner.learned_maximum(), 1.5);

        assert!(!learner.observe(1.2));
        assert!(!learner.observe(1.5));
        assert_eq!(learner.learned_maximum(), 1.5);

        assert!(learner.observe(2.25));
        assert_eq!(learner.learned_maximum(), 2.25);
    }

    #[test]
    fn test_observe_non_increasing_sequence_is_idempotent() {
        let dir = tempdir().unwrap();
        let learner = Learner::new(dir.path(), Fact::MAXIMUM_ONE_MINUTE_LOAD);

        assert!(learner.observe(3.0));
        let path = learner.store().path(learner.fact());
        let before = std::fs::read_to_string(&path).unwrap();

        for load in [3.0, 2.9, 1.0, 0.0, -1.0, f64::NAN] {
            assert!(!learner.observe(load));
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(learner.learned_maximum(), 3.0);
    }

    #[test]
    fn test_observe_below_default_writes_nothing() {
        let dir = tempdir().unwrap();
        let learner = Learner::new(dir.path(), Fact::LOAD_THRESHOLD);

        assert!(!learner.observe(0.05));
        assert!(!learner.store().path(learner.fact()).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_observe_write_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        // A regular file where the cache directory should be.
        let blocker = dir.path().join("cache");
        std::fs::write(&blocker, "").unwrap();

        let learner = Learner::new(&blocker, Fact::MAXIMUM_ONE_MINUTE_LOAD);
        assert!(!learner.observe(5.0));
        assert_eq!(learner.learned_maximum(), 0.1);
    }

    #[test]
    fn test_should_escalate() {
        let dir = tempdir().unwrap();
        let learner = Learner::new(dir.path(), Fact::LOAD_THRESHOLD);

        assert!(!learner.should_escalate(0.1));
        assert!(learner.should_escalate(0.11));

        learner.observe(2.0);
        assert!(!learner.should_escalate(1.0));
        assert!(learner.should_escalate(2.5));
    }

    #[test]
    fn test_next_interval_uses_learned_maximum() {
        let dir = tempdir().unwrap();
        let learner = Learner::new(dir.path(), Fact::LOAD_THRESHOLD);
        learner.observe(1.0);

        let bounds = IntervalBounds::default();
        assert_eq!(learner.next_interval(0.0, bounds), Duration::from_secs(600));
        assert_eq!(
            learner.next_interval(0.5, bounds),
            Duration::from_secs_f64(300.5)
        );
        assert_eq!(learner.next_interval(1.0, bounds), Duration::from_secs(1));
    }

    #[test]
    fn test_next_interval_with_extreme_bounds_saturates() {
        let dir = tempdir().unwrap();
        let learner = Learner::new(dir.path(), Fact::LOAD_THRESHOLD);
        let bounds = IntervalBounds {
            minimum: Duration::from_secs(1),
            maximum: Duration::MAX,
        };

        assert_eq!(learner.next_interval(0.0, bounds), Duration::MAX);
        assert_eq!(learner.next_interval(5.0, bounds), Duration::from_secs(1));
    }
}
