//! [`Jitter`]: the re-expression randomness seam the engine reschedules itself through.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A source of the uniform re-expression delay added to the engine's periodic and
/// accelerated reschedules (§4.5, `jitter_range`).
pub trait Jitter: Send + Sync {
    /// A uniformly distributed duration within `range` (inclusive).
    fn jitter(&self, range: (Duration, Duration)) -> Duration;
}

/// A [`Jitter`] backed by a thread-safe, seeded PRNG, for production use.
pub struct RandJitter {
    rng: Mutex<StdRng>,
}

impl RandJitter {
    /// A jitter source seeded from the OS entropy pool.
    pub fn new() -> Self {
        RandJitter {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl Default for RandJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Jitter for RandJitter {
    fn jitter(&self, range: (Duration, Duration)) -> Duration {
        let (lo, hi) = range;
        if hi <= lo {
            return lo;
        }
        let lo_ns = lo.as_nanos() as u64;
        let hi_ns = hi.as_nanos() as u64;
        let ns = lock(&self.rng).gen_range(lo_ns..=hi_ns);
        Duration::from_nanos(ns)
    }
}

/// A [`Jitter`] that always returns the same duration, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub Duration);

impl Jitter for FixedJitter {
    fn jitter(&self, _range: (Duration, Duration)) -> Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_jitter_stays_within_range() {
        let jitter = RandJitter::new();
        let range = (Duration::from_millis(5), Duration::from_millis(20));
        for _ in 0..64 {
            let d = jitter.jitter(range);
            assert!(d >= range.0 && d <= range.1);
        }
    }

    #[test]
    fn fixed_jitter_is_constant() {
        let jitter = FixedJitter(Duration::from_millis(7));
        assert_eq!(jitter.jitter((Duration::ZERO, Duration::from_secs(1))), Duration::from_millis(7));
    }
}
