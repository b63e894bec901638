//! Stress harness for the handoff queue and order keys
//!
//! Used by the `queue-stress` binary to check a build on real hardware:
//! every item pushed through the queue by many threads must come out exactly
//! once, and order key batches must stay short.

use crate::config::StressConfig;
use crate::order_key::OrderKey;
use crate::queue::ConcurrentBoundedQueue;
use anyhow::{anyhow, Context, Result};
use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Item pushed through the queue: (producer, sequence number)
type Tag = (usize, usize);

/// Outcome of a multi-threaded queue run
#[derive(Debug, Clone)]
pub struct QueueStressReport {
    /// Items enqueued across all producers
    pub items: usize,
    pub elapsed: Duration,
    /// Tags that never came out of the queue
    pub lost: usize,
    /// Extra copies of tags that came out more than once
    pub duplicated: usize,
    /// Items a consumer received before an earlier item of the same producer
    pub out_of_order: usize,
}

impl QueueStressReport {
    pub fn is_clean(&self) -> bool {
        self.lost == 0 && self.duplicated == 0 && self.out_of_order == 0
    }

    pub fn items_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.items as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Longest keys produced by the different insertion patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKeyGrowth {
    pub batch: usize,
    /// One `multi` call between two adjacent keys
    pub multi_magnitude: usize,
    /// Appending one key at a time after the last one
    pub append_magnitude: usize,
    /// Inserting one key at a time right after the same first key
    pub split_magnitude: usize,
}

/// Run producers and consumers against one queue and verify the handoff
///
/// Producers keep the number of in-flight items within capacity, which is
/// the admission control the queue expects from its callers.
pub fn run_queue_stress(config: &StressConfig) -> Result<QueueStressReport> {
    config.validate()?;

    let capacity = config.capacity as usize;
    let queue = Arc::new(ConcurrentBoundedQueue::<Tag>::with_capacity(config.capacity)?);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let abort = Arc::new(AtomicBool::new(false));

    log::info!(
        "queue stress: {} producers x {} items, {} consumers, capacity {}",
        config.producers,
        config.items_per_producer,
        config.consumers,
        capacity
    );

    let started = Instant::now();

    let mut consumers = Vec::with_capacity(config.consumers);
    for index in 0..config.consumers {
        let consumer_queue = Arc::clone(&queue);
        let consumer_in_flight = Arc::clone(&in_flight);
        let consumer_stop = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name(format!("stress-consumer-{}", index))
            .spawn(move || {
                let mut received = Vec::new();
                while let Some(tag) = consumer_queue.dequeue_or_stop(&consumer_stop) {
                    consumer_in_flight.fetch_sub(1, Ordering::AcqRel);
                    received.push(tag);
                }
                received
            });
        match spawned {
            Ok(handle) => consumers.push(handle),
            Err(e) => {
                stop_consumers(&queue, &stop);
                join_all(consumers);
                return Err(e).context("Failed to spawn consumer thread");
            }
        }
    }

    let mut producers: Vec<JoinHandle<()>> = Vec::with_capacity(config.producers);
    for producer in 0..config.producers {
        let producer_queue = Arc::clone(&queue);
        let producer_in_flight = Arc::clone(&in_flight);
        let producer_abort = Arc::clone(&abort);
        let items = config.items_per_producer;
        let spawned = thread::Builder::new()
            .name(format!("stress-producer-{}", producer))
            .spawn(move || {
                for sequence in 0..items {
                    if !admit(&producer_in_flight, capacity, &producer_abort) {
                        return;
                    }
                    producer_queue.enqueue((producer, sequence));
                }
            });
        match spawned {
            Ok(handle) => producers.push(handle),
            Err(e) => {
                abort.store(true, Ordering::SeqCst);
                join_all(producers);
                stop_consumers(&queue, &stop);
                join_all(consumers);
                return Err(e).context("Failed to spawn producer thread");
            }
        }
    }

    let mut producer_panicked = false;
    for handle in producers {
        producer_panicked |= handle.join().is_err();
    }

    if !producer_panicked {
        while in_flight.load(Ordering::Acquire) > 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
    stop_consumers(&queue, &stop);

    let mut received = Vec::with_capacity(config.consumers);
    for handle in consumers {
        received.push(
            handle
                .join()
                .map_err(|_| anyhow!("Stress consumer thread panicked"))?,
        );
    }
    if producer_panicked {
        return Err(anyhow!("Stress producer thread panicked"));
    }
    let elapsed = started.elapsed();

    let report = verify(config, &received, elapsed);
    log::info!(
        "queue stress: {} items in {:.2?} ({:.0} items/s), lost {}, duplicated {}, out of order {}",
        report.items,
        report.elapsed,
        report.items_per_second(),
        report.lost,
        report.duplicated,
        report.out_of_order
    );
    Ok(report)
}

/// Measure key growth for `batch` insertions in each pattern
pub fn order_key_growth(batch: usize) -> OrderKeyGrowth {
    let first = OrderKey::single(None, None);
    let neighbor = OrderKey::single(Some(&first), None);

    let mut keys = Vec::with_capacity(batch);
    OrderKey::multi(&mut keys, Some(&first), Some(&neighbor), batch);
    let multi_magnitude = keys.iter().map(OrderKey::magnitude).max().unwrap_or(0);

    let mut last = first.clone();
    let mut append_magnitude = 0;
    for _ in 0..batch {
        last = OrderKey::single(Some(&last), None);
        append_magnitude = append_magnitude.max(last.magnitude());
    }

    let mut upper = neighbor;
    let mut split_magnitude = 0;
    for _ in 0..batch {
        upper = OrderKey::single(Some(&first), Some(&upper));
        split_magnitude = split_magnitude.max(upper.magnitude());
    }

    let growth = OrderKeyGrowth {
        batch,
        multi_magnitude,
        append_magnitude,
        split_magnitude,
    };
    log::info!(
        "order keys: batch {} -> multi {} digits, append {} digits, split {} digits",
        growth.batch,
        growth.multi_magnitude,
        growth.append_magnitude,
        growth.split_magnitude
    );
    growth
}

/// Wait until one more item fits within `capacity`, then count it
///
/// Returns `false` without counting once `abort` is set.
fn admit(in_flight: &AtomicUsize, capacity: usize, abort: &AtomicBool) -> bool {
    let backoff = Backoff::new();
    loop {
        if abort.load(Ordering::SeqCst) {
            return false;
        }
        let current = in_flight.load(Ordering::Acquire);
        if current < capacity
            && in_flight
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            return true;
        }
        backoff.snooze();
    }
}

/// Join threads on an error path, ignoring their results
fn join_all<R>(handles: Vec<JoinHandle<R>>) {
    for handle in handles {
        let _ = handle.join();
    }
}

fn stop_consumers(queue: &ConcurrentBoundedQueue<Tag>, stop: &AtomicBool) {
    stop.store(true, Ordering::SeqCst);
    queue.wakeup_all();
}

/// Count lost, duplicated and reordered tags across all consumers
fn verify(config: &StressConfig, received: &[Vec<Tag>], elapsed: Duration) -> QueueStressReport {
    let items = config.producers * config.items_per_producer;
    let mut seen = vec![0u32; items];
    let mut out_of_order = 0;

    for tags in received {
        let mut last: Vec<Option<usize>> = vec![None; config.producers];
        for &(producer, sequence) in tags {
            seen[producer * config.items_per_producer + sequence] += 1;
            if last[producer] >= Some(sequence) {
                out_of_order += 1;
            }
            last[producer] = Some(sequence);
        }
    }

    let lost = seen.iter().filter(|&&count| count == 0).count();
    let duplicated = seen
        .iter()
        .map(|&count| count.saturating_sub(1) as usize)
        .sum();

    QueueStressReport {
        items,
        elapsed,
        lost,
        duplicated,
        out_of_order,
    }
}
