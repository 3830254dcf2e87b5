//! # Drift Scheduler
//!
//! Every successfully reconciled record is revisited on a fixed interval to
//! catch changes made directly against the gateway. The revisit is an
//! ordinary pass; there is no separate drift logic.
//!
//! Records are spread over the interval with a small jitter derived from the
//! record's key, so records created together do not revisit together.
//!
//! ```text
//! interval 300s, jitter ±10%
//! ml/eng    ──► 291.4s
//! ml/ops    ──► 318.9s
//! ml/eng    ──► 291.4s   (stable per key)
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use litellm_core::ObjectKey;

/// Fraction of the interval used for jitter, in each direction.
const JITTER: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct DriftScheduler {
    interval: Duration,
}

impl DriftScheduler {
    pub fn new(interval: Duration) -> Self {
        DriftScheduler { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Delay until the next drift check of `key`.
    pub fn delay_for(&self, key: &ObjectKey) -> Duration {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // Map the hash onto [-1.0, 1.0].
        let unit = (hasher.finish() % 2001) as f64 / 1000.0 - 1.0;
        self.interval.mul_f64(1.0 + JITTER * unit)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_stable_and_bounded() {
        let drift = DriftScheduler::new(Duration::from_secs(300));
        let low = Duration::from_secs(270);
        let high = Duration::from_secs(330);

        for name in ["eng", "ops", "research", "ci-runner", "a"] {
            let key = ObjectKey::new("ml", name);
            let delay = drift.delay_for(&key);
            assert!(delay >= low && delay <= high, "{:?} out of range", delay);
            assert_eq!(delay, drift.delay_for(&key));
        }
    }

    #[test]
    fn test_keys_spread() {
        let drift = DriftScheduler::new(Duration::from_secs(300));
        let delays: std::collections::HashSet<_> = (0..20)
            .map(|i| drift.delay_for(&ObjectKey::new("ml", format!("team-{}", i))))
            .collect();
        assert!(delays.len() > 1);
    }
}
