//! Synthetic CPU load for demo services

use std::hint::black_box;
use std::time::{Duration, Instant};

/// Terms per Fibonacci round; the 48th term overflows `u32`.
pub const FIB_TERMS: u32 = 47;

/// Result of one busy-loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Burn {
    pub rounds: u64,
    pub checksum: u32,
}

/// Last term of an iterative Fibonacci sequence of `terms` terms.
pub fn fibonacci(terms: u32) -> u32 {
    let (mut previous, mut current) = (0u32, 1u32);
    for _ in 1..terms {
        let next = previous.wrapping_add(current);
        previous = current;
        current = next;
    }
    if terms == 0 { 0 } else { previous }
}

/// Run Fibonacci rounds until `load` has elapsed.
pub fn burn(load: Duration) -> Burn {
    let mut result = Burn::default();
    if load.is_zero() {
        return result;
    }

    let started = Instant::now();
    while started.elapsed() < load {
        let value = black_box(fibonacci(black_box(FIB_TERMS)));
        result.checksum = result.checksum.wrapping_add(value);
        result.rounds = result.rounds.wrapping_add(1);
    }
    result
}

/// Service callback that burns `load` on every release.
pub fn callback(load: Duration) -> impl FnMut() + Send + 'static {
    let mut total = Burn::default();
    move || {
        let run = burn(load);
        total.rounds = total.rounds.wrapping_add(run.rounds);
        total.checksum ^= run.checksum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_terms() {
        let expected = [0, 0, 1, 1, 2, 3, 5, 8, 13, 21, 34];
        for (terms, want) in (0u32..).zip(expected) {
            assert_eq!(fibonacci(terms), want, "terms={terms}");
        }
        assert_eq!(fibonacci(FIB_TERMS), 1_836_311_903);
    }

    #[test]
    fn test_zero_load_returns_immediately() {
        assert_eq!(burn(Duration::ZERO), Burn::default());
    }

    #[test]
    fn test_burn_runs_for_at_least_load() {
        let started = Instant::now();
        let run = burn(Duration::from_millis(3));
        assert!(started.elapsed() >= Duration::from_millis(3));
        assert!(run.rounds > 0);
    }

    #[test]
    fn test_callback_is_reusable() {
        let mut work = callback(Duration::from_micros(200));
        let started = Instant::now();
        work();
        work();
        assert!(started.elapsed() >= Duration::from_micros(400));
    }
}
