//! Linear load-to-interval scheduling.
//!
//! As the current load approaches the learned maximum, the polling interval
//! shrinks linearly from the maximum interval toward the minimum:
//!
//! ```text
//! scale    = min(current_load / learned_max, 1)  (0 when learned_max <= 0)
//! interval = max((1 - scale) * max + scale * min, min)
//! ```

/// Inputs for one interval computation. Rebuilt every iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleState {
    /// One-minute load sampled this iteration.
    pub current_load: f64,
    /// Learned maximum one-minute load.
    pub learned_max: f64,
    /// Lower interval bound in seconds.
    pub minimum_interval: f64,
    /// Upper interval bound in seconds.
    pub maximum_interval: f64,
}

impl ScheduleState {
    /// Seconds to sleep before the next iteration.
    pub fn next_interval(&self) -> f64 {
        next_interval(
            self.current_load,
            self.learned_max,
            self.minimum_interval,
            self.maximum_interval,
        )
    }
}

/// Ratio of current load to the learned maximum, capped at `1.0`.
///
/// Non-positive or non-finite maxima, NaN and non-positive loads give `0.0`,
/// which maps to the maximum interval. An infinite load gives `1.0`.
pub fn load_scale(current_load: f64, learned_max: f64) -> f64 {
    if !learned_max.is_finite() || learned_max <= 0.0 {
        return 0.0;
    }
    if current_load.is_nan() || current_load <= 0.0 {
        return 0.0;
    }
    (current_load / learned_max).min(1.0)
}

/// Computes the next polling interval in seconds.
pub fn next_interval(
    current_load: f64,
    learned_max: f64,
    minimum_interval: f64,
    maximum_interval: f64,
) -> f64 {
    let scale = load_scale(current_load, learned_max);
    let interval = (1.0 - scale) * maximum_interval + scale * minimum_interval;
    interval.max(minimum_interval)
}
