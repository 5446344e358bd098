//! Stress tests for locket_db stores.
//!
//! These drivers hammer one shared store from several threads and then
//! verify the final contents against what each thread believes it wrote.

use locket_db::Db;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
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
    /// Keys whose final value disagreed with the writer's record.
    pub mismatches: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, mismatches: usize, duration: Duration) -> Self {
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
            mismatches,
            duration,
            ops_per_second,
        }
    }

    /// Returns true if nothing failed and nothing was lost.
    pub fn is_clean(&self) -> bool {
        self.failed_ops == 0 && self.mismatches == 0
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Mismatched keys: {}", self.mismatches);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Distinct keys per thread.
    pub key_space: usize,
    /// Size of written values in bytes.
    pub value_size: usize,
    /// Largest batch a thread commits at once.
    pub max_batch: usize,
    /// Seed for the per-thread random generators.
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 2_000,
            threads: 4,
            key_space: 64,
            value_size: 32,
            max_batch: 16,
            seed: 0x10C_4E7,
        }
    }
}

impl StressConfig {
    /// A small configuration for quick test runs.
    pub fn quick() -> Self {
        Self {
            operations: 300,
            threads: 4,
            key_space: 32,
            value_size: 16,
            max_batch: 8,
            seed: 7,
        }
    }
}

/// Key owned by `thread`: `[thread, index (big-endian)]`.
fn thread_key(thread: usize, index: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(thread as u8);
    key.extend_from_slice(&(index as u32).to_be_bytes());
    key
}

#[derive(Default)]
struct ThreadTally {
    successful: usize,
    failed: usize,
    expected: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl ThreadTally {
    fn record(&mut self, ok: bool) {
        if ok {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }
}

fn run_writer(db: &dyn Db, config: &StressConfig, thread: usize) -> ThreadTally {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(thread as u64));
    let mut tally = ThreadTally::default();

    for _ in 0..config.operations {
        let key = thread_key(thread, rng.gen_range(0..config.key_space));
        match rng.gen_range(0..10) {
            0..=4 => {
                let value = vec![rng.gen::<u8>(); config.value_size];
                let sync = rng.gen_bool(0.05);
                let result = if sync { db.set_sync(&key, &value) } else { db.set(&key, &value) };
                if result.is_ok() {
                    tally.expected.insert(key, Some(value));
                }
                tally.record(result.is_ok());
            }
            5 | 6 => {
                let result = db.delete(&key);
                if result.is_ok() {
                    tally.expected.insert(key, None);
                }
                tally.record(result.is_ok());
            }
            7 | 8 => {
                let ok = match db.get(&key) {
                    Ok(found) => tally.expected.get(&key).map_or(true, |want| &found == want),
                    Err(_) => false,
                };
                tally.record(ok);
            }
            _ => {
                let mut batch = db.new_batch();
                let mut staged = Vec::new();
                for _ in 0..rng.gen_range(1..=config.max_batch) {
                    let key = thread_key(thread, rng.gen_range(0..config.key_space));
                    if rng.gen_bool(0.8) {
                        let value = vec![rng.gen::<u8>(); config.value_size];
                        let _ = batch.set(&key, &value);
                        staged.push((key, Some(value)));
                    } else {
                        let _ = batch.delete(&key);
                        staged.push((key, None));
                    }
                }
                let ok = batch.write().is_ok();
                let _ = batch.close();
                if ok {
                    tally.expected.extend(staged);
                }
                tally.record(ok);
            }
        }
    }
    tally
}

/// Runs point operations and batch commits from `config.threads` threads.
///
/// Each thread owns a disjoint key range, so its own record of what it
/// wrote must match the store once all threads finish.
pub fn stress_concurrent_mixed(db: Arc<dyn Db>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|thread| {
            let db = Arc::clone(&db);
            let config = config.clone();
            thread::spawn(move || run_writer(&*db, &config, thread))
        })
        .collect();

    let mut successful = 0;
    let mut failed = 0;
    let mut mismatches = 0;
    for handle in handles {
        let tally = handle.join().expect("Stress thread panicked");
        successful += tally.successful;
        failed += tally.failed;
        for (key, want) in &tally.expected {
            match db.get(key) {
                Ok(found) if &found == want => {}
                _ => mismatches += 1,
            }
        }
    }

    StressTestResult::new(successful, failed, mismatches, start.elapsed())
}

/// Scans the whole store from `readers` threads while one thread writes.
///
/// Checks that every scan is strictly ordered and never fails.
pub fn stress_scan_while_writing(db: Arc<dyn Db>, config: &StressConfig, readers: usize) -> StressTestResult {
    let start = Instant::now();

    let writer = {
        let db = Arc::clone(&db);
        let config = config.clone();
        thread::spawn(move || run_writer(&*db, &config, 0))
    };

    let scanners: Vec<_> = (0..readers)
        .map(|_| {
            let db = Arc::clone(&db);
            let rounds = (config.operations / 50).max(1);
            thread::spawn(move || {
                let mut ok = 0;
                let mut bad = 0;
                for reverse in (0..rounds).map(|i| i % 2 == 1) {
                    let iter = if reverse {
                        db.reverse_iterator(None, None)
                    } else {
                        db.iterator(None, None)
                    };
                    let Ok(mut iter) = iter else {
                        bad += 1;
                        continue;
                    };
                    let keys: Vec<Vec<u8>> = iter.collect_pairs().into_iter().map(|(k, _)| k).collect();
                    let ordered = keys
                        .windows(2)
                        .all(|w| if reverse { w[0] > w[1] } else { w[0] < w[1] });
                    if ordered && iter.error().is_none() && iter.close().is_ok() {
                        ok += 1;
                    } else {
                        bad += 1;
                    }
                }
                (ok, bad)
            })
        })
        .collect();

    let tally = writer.join().expect("Writer thread panicked");
    let mut successful = tally.successful;
    let mut failed = tally.failed;
    for scanner in scanners {
        let (ok, bad) = scanner.join().expect("Scanner thread panicked");
        successful += ok;
        failed += bad;
    }

    StressTestResult::new(successful, failed, 0, start.elapsed())
}
