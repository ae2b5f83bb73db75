//! Property-based tests for rtseq-atomic.
//!
//! These tests verify invariants that should hold for all inputs.

use proptest::prelude::*;
use quickcheck_macros::quickcheck;
use rtseq_atomic::{AtomicStat, ServiceStats};

#[quickcheck]
fn prop_min_mean_max_ordering_holds_after_every_update(samples: Vec<u32>) -> bool {
    let stat = AtomicStat::new();

    samples.iter().all(|&sample| {
        stat.record(u64::from(sample));
        let snapshot = stat.snapshot();
        match (snapshot.min(), snapshot.mean(), snapshot.max()) {
            (Some(min), Some(mean), Some(max)) => min <= mean && mean <= max,
            _ => false,
        }
    })
}

#[quickcheck]
fn prop_count_and_total_match_samples(samples: Vec<u32>) -> bool {
    let stat = AtomicStat::new();
    for &sample in &samples {
        stat.record(u64::from(sample));
    }

    let snapshot = stat.snapshot();
    let expected_total: u64 = samples.iter().map(|&s| u64::from(s)).sum();
    snapshot.count == samples.len() as u64 && snapshot.total == expected_total
}

#[quickcheck]
fn prop_extrema_match_samples(samples: Vec<u32>) -> bool {
    let stat = AtomicStat::new();
    for &sample in &samples {
        stat.record(u64::from(sample));
    }

    let snapshot = stat.snapshot();
    let expected_min = samples.iter().min().map(|&s| u64::from(s));
    let expected_max = samples.iter().max().map(|&s| u64::from(s));
    snapshot.min() == expected_min && snapshot.max() == expected_max
}

proptest! {
    #[test]
    fn prop_execution_jitter_recorded_for_all_but_first(
        executions in proptest::collection::vec(0u64..10_000_000, 0..200)
    ) {
        let stats = ServiceStats::new();
        for &execution in &executions {
            stats.record_execution(execution);
        }

        let snapshot = stats.snapshot();
        prop_assert_eq!(snapshot.releases(), executions.len() as u64);
        prop_assert_eq!(
            snapshot.execution_jitter.count,
            executions.len().saturating_sub(1) as u64
        );

        let expected_jitter_total: u64 = executions
            .windows(2)
            .map(|pair| match pair {
                [previous, current] => current.abs_diff(*previous),
                _ => 0,
            })
            .sum();
        prop_assert_eq!(snapshot.execution_jitter.total, expected_jitter_total);
    }

    #[test]
    fn prop_miss_rate_is_a_percentage(executions in 1u64..500, misses in 0u64..500) {
        let stats = ServiceStats::new();
        for _ in 0..executions {
            stats.record_execution(1);
        }
        for _ in 0..misses.min(executions) {
            stats.record_deadline_miss(1);
        }

        let rate = stats.snapshot().miss_rate_percent();
        prop_assert!((0.0..=100.0).contains(&rate));
    }
}
