//! Concurrency tests for rtseq-atomic.
//!
//! These tests verify that concurrent writers never lose samples and that
//! readers racing with writers only ever observe consistent snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rtseq_atomic::{AtomicStat, ServiceStats, StatSnapshot, TickCounters};

fn assert_consistent(snapshot: &StatSnapshot) {
    if let (Some(min), Some(mean), Some(max)) = (snapshot.min(), snapshot.mean(), snapshot.max()) {
        assert!(min <= mean, "min {min} > mean {mean}");
        assert!(mean <= max, "mean {mean} > max {max}");
    } else {
        assert!(snapshot.is_empty());
    }
}

#[test]
fn test_concurrent_writers_lose_no_samples() {
    let stat = Arc::new(AtomicStat::new());
    let num_threads: u64 = 8;
    let samples_per_thread: u64 = 10_000;

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let stat = Arc::clone(&stat);
            thread::spawn(move || {
                for i in 0..samples_per_thread {
                    stat.record(thread_id * samples_per_thread + i + 1);
                }
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().is_ok(), "thread panicked unexpectedly");
    }

    let snapshot = stat.snapshot();
    let n = num_threads * samples_per_thread;
    assert_eq!(snapshot.count, n);
    assert_eq!(snapshot.total, n * (n + 1) / 2);
    assert_eq!(snapshot.min(), Some(1));
    assert_eq!(snapshot.max(), Some(n));
}

#[test]
fn test_reader_never_sees_torn_snapshot() {
    let stat = Arc::new(AtomicStat::new());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let stat = Arc::clone(&stat);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            // Alternate extreme values so a torn total would push the mean
            // outside [min, max].
            for i in 0..200_000u64 {
                let value = if i % 2 == 0 { 1 } else { 1_000_000 };
                stat.record(value);
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut last_count = 0;
    while !done.load(Ordering::Acquire) {
        let snapshot = stat.snapshot();
        assert_consistent(&snapshot);
        assert!(snapshot.count >= last_count, "count went backwards");
        last_count = snapshot.count;
    }

    assert!(writer.join().is_ok(), "writer panicked unexpectedly");
    assert_eq!(stat.snapshot().count, 200_000);
}

#[test]
fn test_service_stats_single_writer_with_reader() {
    let stats = Arc::new(ServiceStats::new());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let stats = Arc::clone(&stats);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..50_000u64 {
                stats.record_release_jitter(i % 97);
                stats.record_execution(1_000 + (i % 13) * 100);
                if i % 1_000 == 0 {
                    stats.record_deadline_miss(i);
                }
            }
            done.store(true, Ordering::Release);
        })
    };

    while !done.load(Ordering::Acquire) {
        let snapshot = stats.snapshot();
        assert_consistent(&snapshot.execution);
        assert_consistent(&snapshot.execution_jitter);
        assert_consistent(&snapshot.release_jitter);
        assert_consistent(&snapshot.lateness);
    }

    assert!(writer.join().is_ok(), "writer panicked unexpectedly");

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.releases(), 50_000);
    assert_eq!(snapshot.execution_jitter.count, 49_999);
    assert_eq!(snapshot.release_jitter.count, 50_000);
    assert_eq!(snapshot.deadline_misses(), 50);
}

#[test]
fn test_concurrent_tick_counters() {
    let counters = Arc::new(TickCounters::new());
    let num_threads: u64 = 4;
    let iterations: u64 = 5_000;

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let counters = Arc::clone(&counters);
            thread::spawn(move || {
                for i in 0..iterations {
                    counters.inc_tick();
                    if i % 10 == 0 {
                        counters.inc_overrun_by(1);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().is_ok(), "thread panicked unexpectedly");
    }

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.ticks, num_threads * iterations);
    assert_eq!(snapshot.overruns, num_threads * iterations / 10);
}
