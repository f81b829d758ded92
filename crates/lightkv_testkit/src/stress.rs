//! Stress tests for LightKV.
//!
//! These helpers drive transactions, readers and environment shutdown
//! from several threads at once.

use lightkv_core::{CoreError, DatabaseConfig, Environment};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of transactions to run in total.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of stored values in bytes.
    pub value_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            value_size: 64,
        }
    }
}

fn stress_key(thread: usize, i: usize) -> Vec<u8> {
    format!("t{thread:02}-{i:06}").into_bytes()
}

fn tally(successful: &AtomicUsize, failed: &AtomicUsize, ok: bool) {
    if ok {
        successful.fetch_add(1, Ordering::Relaxed);
    } else {
        failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Runs write transactions from several threads. Each transaction stores
/// one distinct key in the default database.
pub fn stress_concurrent_writers(env: &Environment, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let env = env.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let value = value.clone();

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let result = env.transaction(|txn| {
                        let db = txn.open_database(None, DatabaseConfig::new())?;
                        txn.put(&db, &stress_key(t, i), &value)
                    });
                    tally(&successful, &failed, result.is_ok());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Runs readers against a writer that always updates two keys together.
///
/// A read counts as failed if it sees the two keys disagree, which would
/// mean a reader observed a partial commit.
pub fn stress_readers_during_writes(env: &Environment, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);

    let seeded = env.transaction(|txn| {
        let db = txn.open_database(None, DatabaseConfig::new())?;
        txn.put(&db, b"left", &0u64.to_ne_bytes())?;
        txn.put(&db, b"right", &0u64.to_ne_bytes())
    });
    if seeded.is_err() {
        return StressTestResult::new(0, config.operations, Duration::ZERO);
    }

    let start = Instant::now();

    let writer = {
        let env = env.clone();
        let successful = Arc::clone(&successful);
        let failed = Arc::clone(&failed);
        thread::spawn(move || {
            for round in 1..=ops_per_thread as u64 {
                let result = env.transaction(|txn| {
                    let db = txn.open_database(None, DatabaseConfig::new())?;
                    txn.put(&db, b"left", &round.to_ne_bytes())?;
                    txn.put(&db, b"right", &round.to_ne_bytes())
                });
                tally(&successful, &failed, result.is_ok());
            }
        })
    };

    let readers: Vec<_> = (1..config.threads.max(2))
        .map(|_| {
            let env = env.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    let consistent = (|| {
                        let txn = env.begin_read_transaction()?;
                        let db = txn.open_database(None, DatabaseConfig::new())?;
                        let left = txn.get(&db, b"left")?;
                        let right = txn.get(&db, b"right")?;
                        Ok::<_, CoreError>(left.is_some() && left == right)
                    })();
                    tally(&successful, &failed, matches!(consistent, Ok(true)));
                }
            })
        })
        .collect();

    writer.join().expect("Writer panicked");
    for handle in readers {
        handle.join().expect("Reader panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Runs parent/child transaction pairs. Every other parent aborts after its
/// child committed, so the child's write must vanish.
///
/// Returns the result and the number of keys that should be visible.
pub fn stress_nested_transactions(env: &Environment, config: &StressConfig) -> (StressTestResult, usize) {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    let mut expected = 0usize;

    for i in 0..config.operations {
        let keep = i % 2 == 0;
        let result = (|| {
            let parent = env.begin_transaction()?;
            let db = parent.open_database(None, DatabaseConfig::new())?;
            let child = parent.begin_child()?;
            child.put(&db, &stress_key(0, i), b"nested")?;
            child.commit()?;
            if keep {
                parent.commit()
            } else {
                parent.abort();
                Ok(())
            }
        })();
        match result {
            Ok(()) => {
                successful += 1;
                if keep {
                    expected += 1;
                }
            }
            Err(_) => failed += 1,
        }
    }

    (StressTestResult::new(successful, failed, start.elapsed()), expected)
}

/// Closes `env` while writer threads are committing.
///
/// Operations that fail because the environment closed under them count as
/// failed; any other error panics the writer thread.
pub fn stress_close_during_commits(env: Environment, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);
    let barrier = Arc::new(Barrier::new(config.threads + 1));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let env = env.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                for i in 0..ops_per_thread {
                    let result = env.transaction(|txn| {
                        let db = txn.open_database(None, DatabaseConfig::new())?;
                        txn.put(&db, &stress_key(t, i), b"racing")
                    });
                    match result {
                        Ok(()) => tally(&successful, &failed, true),
                        Err(_) if env.is_closed() => tally(&successful, &failed, false),
                        Err(err) => panic!("unexpected error before close: {err}"),
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    thread::sleep(Duration::from_millis(2));
    env.close();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
