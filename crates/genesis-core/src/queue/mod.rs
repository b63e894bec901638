//! Lock-free bounded queue for cross-thread buffer handoff
//!
//! Worker threads render or decode audio buffers and the real-time callback
//! consumes them (and vice versa for buffers going back to be recycled).
//! [`ConcurrentBoundedQueue`] moves fixed-type items between any number of
//! producers and consumers:
//!
//! - **Producers never park.** `enqueue` claims a slot with one fetch-add,
//!   stores the item and publishes it.
//! - **Consumers park only on an empty queue.** `dequeue` takes an item in a
//!   few atomic operations when one is available and otherwise sleeps on a
//!   futex until a producer signals it, so wake latency is a single syscall
//!   rather than a polling interval.
//!
//! # Slot lifecycle
//!
//! ```text
//! free ─▶ claimed by producer ─▶ stored ─▶ visible ─▶ claimed by consumer ─▶ free
//!         (write_index += 1)     (stamp)   (count+1)  (count-1, read_index += 1)
//! ```
//!
//! Items come out in the order their producers claimed write slots. Under
//! producer contention that is not necessarily the order the `enqueue` calls
//! started in.
//!
//! # Capacity contract
//!
//! The queue never grows. Callers must keep the number of items enqueued but
//! not yet returned from `dequeue` at or below [`capacity`](ConcurrentBoundedQueue::capacity);
//! going over would overwrite unread data, so it panics instead.
//!
//! # Usage
//!
//! ```ignore
//! // At startup, before sharing the queue
//! let mut queue = ConcurrentBoundedQueue::new();
//! queue.resize(64)?;
//! let queue = Arc::new(queue);
//!
//! // Worker thread
//! queue.enqueue(buffer);
//!
//! // Consumer thread, stopped by setting `stop` and calling `wakeup_all`
//! while let Some(buffer) = queue.dequeue_or_stop(&stop) {
//!     play(buffer);
//! }
//! ```

mod error;
pub mod parker;

pub use error::{QueueError, QueueResult};

use crossbeam::utils::{Backoff, CachePadded};
use parker::Futex;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};

/// One storage location of the circular buffer
///
/// `stamp` tracks the slot's state for the claim index `i` mapped onto it,
/// written as a position `lap * one_lap + slot` (see
/// [`position`](ConcurrentBoundedQueue::position)): `position(i)` while free
/// for producer `i`, `position(i) + 1` once that producer has stored its
/// item, and `position(i) + one_lap` after the consumer has moved it out.
/// `one_lap` is above the capacity, so a stored stamp never equals the free
/// stamp of the next lap, even with a single slot.
struct Slot<T> {
    stamp: AtomicU64,
    item: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new(stamp: u64) -> Self {
        Self {
            stamp: AtomicU64::new(stamp),
            item: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Many-producer, many-consumer, fixed-capacity FIFO queue
///
/// Must be sized with [`resize`](Self::resize) (or built with
/// [`with_capacity`](Self::with_capacity)) before it is shared. Items still
/// queued when the queue is dropped are dropped with it.
pub struct ConcurrentBoundedQueue<T> {
    slots: Box<[Slot<T>]>,
    /// Stamp distance between two laps over the same slot
    one_lap: u64,
    /// Next write claim; 64-bit so it never wraps and needs no rebasing
    write_index: CachePadded<AtomicU64>,
    /// Next read claim
    read_index: CachePadded<AtomicU64>,
    /// Stored items that no consumer has reserved yet (never negative)
    queue_count: CachePadded<AtomicI32>,
    /// Consumers registered as about to park or parked
    waiter_count: CachePadded<AtomicU32>,
    /// Word consumers sleep on; bumped before every wake
    wake_sequence: CachePadded<Futex>,
    /// Bumped by `wakeup_all` so parked consumers know to give up
    interrupt_epoch: AtomicU32,
}

// SAFETY: items are moved in by exactly one producer and out by exactly one
// consumer per lap, with the slot stamp ordering the two accesses.
unsafe impl<T: Send> Send for ConcurrentBoundedQueue<T> {}
unsafe impl<T: Send> Sync for ConcurrentBoundedQueue<T> {}

impl<T> Default for ConcurrentBoundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentBoundedQueue<T> {
    /// Create an unsized queue; call [`resize`](Self::resize) before use
    pub fn new() -> Self {
        Self {
            slots: Box::new([]),
            one_lap: 1,
            write_index: CachePadded::new(AtomicU64::new(0)),
            read_index: CachePadded::new(AtomicU64::new(0)),
            queue_count: CachePadded::new(AtomicI32::new(0)),
            waiter_count: CachePadded::new(AtomicU32::new(0)),
            wake_sequence: CachePadded::new(Futex::new(0)),
            interrupt_epoch: AtomicU32::new(0),
        }
    }

    /// Create a queue holding up to `capacity` items
    pub fn with_capacity(capacity: i64) -> QueueResult<Self> {
        let mut queue = Self::new();
        queue.resize(capacity)?;
        Ok(queue)
    }

    /// Allocate slot storage for `capacity` items and reset all counters
    ///
    /// Taking `&mut self` makes this single-threaded by construction: it can
    /// only run before the queue is shared or after every other handle is
    /// gone. Items still queued are dropped.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidCapacity`] unless `1 <= capacity <= i32::MAX`
    /// - [`QueueError::NoMemory`] if the slots cannot be allocated
    pub fn resize(&mut self, capacity: i64) -> QueueResult<()> {
        if capacity <= 0 || capacity > i32::MAX as i64 {
            return Err(QueueError::InvalidCapacity(capacity));
        }
        let capacity = capacity as usize;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::NoMemory { capacity })?;
        slots.extend((0..capacity as u64).map(Slot::new));

        self.drop_queued_items();
        self.slots = slots.into_boxed_slice();
        self.one_lap = (capacity as u64 + 1).next_power_of_two();
        *self.write_index.get_mut() = 0;
        *self.read_index.get_mut() = 0;
        *self.queue_count.get_mut() = 0;
        *self.waiter_count.get_mut() = 0;
        *self.interrupt_epoch.get_mut() = 0;
        self.wake_sequence.reset();

        log::debug!("resize: queue sized to {} slots", capacity);
        Ok(())
    }

    /// Maximum number of items the queue can hold
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of items currently available to consumers
    ///
    /// A snapshot; other threads may change it immediately.
    pub fn len(&self) -> usize {
        self.queue_count.load(Ordering::SeqCst).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of consumers currently blocked (or about to block) in `dequeue`
    pub fn waiting_consumers(&self) -> u32 {
        self.waiter_count.load(Ordering::SeqCst)
    }

    /// Add an item, waking one blocked consumer if there is one
    ///
    /// Never parks. It can spin for a moment if a consumer of the previous
    /// lap is still moving its item out of the same slot.
    ///
    /// # Panics
    ///
    /// If the queue was never sized, or if this item would exceed the
    /// capacity (it would otherwise overwrite an unread slot).
    pub fn enqueue(&self, item: T) {
        let capacity = self.slots.len() as u64;
        if capacity == 0 {
            panic!("enqueue on a queue with no capacity; resize it first");
        }

        let write = self.write_index.fetch_add(1, Ordering::SeqCst);
        let read = self.read_index.load(Ordering::SeqCst);
        if write >= read + capacity {
            panic!(
                "queue capacity {} exceeded: write claim {} with reads claimed up to {}",
                capacity, write, read
            );
        }

        let slot = &self.slots[(write % capacity) as usize];
        let position = self.position(write);
        let backoff = Backoff::new();
        while slot.stamp.load(Ordering::Acquire) != position {
            backoff.snooze();
        }
        // SAFETY: the stamp says the slot is free for this claim and no other
        // producer holds the same claim index
        unsafe { (*slot.item.get()).write(item) };
        slot.stamp.store(position + 1, Ordering::Release);

        let previous = self.queue_count.fetch_add(1, Ordering::SeqCst);
        if previous as u64 >= capacity {
            panic!(
                "queue capacity {} exceeded: {} items already visible",
                capacity, previous
            );
        }

        if self.waiter_count.load(Ordering::SeqCst) > 0 {
            self.wake_sequence.bump();
            self.wake_sequence.wake(1);
        }
    }

    /// Remove the oldest item, blocking while the queue is empty
    ///
    /// Returns `None` only if [`wakeup_all`](Self::wakeup_all) interrupted
    /// the call while no item was available.
    pub fn dequeue(&self) -> Option<T> {
        let epoch = self.interrupt_epoch.load(Ordering::SeqCst);
        self.dequeue_until(|| self.interrupt_epoch.load(Ordering::SeqCst) != epoch)
    }

    /// Like [`dequeue`](Self::dequeue), but gives up once `stop` is set
    ///
    /// Items already queued are still returned after `stop` is set, so a
    /// consumer loop drains the queue before exiting. The flag is checked
    /// after the consumer registers as a waiter, so setting it and then
    /// calling [`wakeup_all`](Self::wakeup_all) always releases the consumer.
    pub fn dequeue_or_stop(&self, stop: &AtomicBool) -> Option<T> {
        let epoch = self.interrupt_epoch.load(Ordering::SeqCst);
        self.dequeue_until(|| {
            stop.load(Ordering::SeqCst) || self.interrupt_epoch.load(Ordering::SeqCst) != epoch
        })
    }

    /// Wake every blocked consumer, e.g. at shutdown
    ///
    /// Each consumer inside `dequeue` at this point returns, with an item if
    /// one is available and `None` otherwise.
    pub fn wakeup_all(&self) {
        self.interrupt_epoch.fetch_add(1, Ordering::SeqCst);
        self.wake_sequence.bump();
        let waiters = self.waiter_count.load(Ordering::SeqCst);
        let woken = self.wake_sequence.wake(waiters);
        log::debug!(
            "wakeup_all: woke {} of {} waiting consumers",
            woken,
            waiters
        );
    }

    /// Reserve an item, parking until one arrives or `interrupted` holds
    fn dequeue_until(&self, interrupted: impl Fn() -> bool) -> Option<T> {
        loop {
            if self.try_reserve() {
                return Some(self.take_reserved());
            }
            if interrupted() {
                return None;
            }

            // Snapshot the sequence before registering: any producer that
            // misses our registration has already bumped past this value
            let sequence = self.wake_sequence.load();
            self.waiter_count.fetch_add(1, Ordering::SeqCst);

            if self.try_reserve() {
                self.waiter_count.fetch_sub(1, Ordering::SeqCst);
                return Some(self.take_reserved());
            }
            if interrupted() {
                self.waiter_count.fetch_sub(1, Ordering::SeqCst);
                return None;
            }

            // Woken, signaled before the sleep, or interrupted: all retry the take
            let _outcome = self.wake_sequence.wait(sequence);
            self.waiter_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Claim one unit of `queue_count` if any item is visible
    fn try_reserve(&self) -> bool {
        let mut count = self.queue_count.load(Ordering::SeqCst);
        while count > 0 {
            match self.queue_count.compare_exchange_weak(
                count,
                count - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }
        false
    }

    /// Move out the item at the next read claim; requires a prior reservation
    fn take_reserved(&self) -> T {
        let capacity = self.slots.len() as u64;
        let read = self.read_index.fetch_add(1, Ordering::SeqCst);
        let slot = &self.slots[(read % capacity) as usize];
        let position = self.position(read);

        // A reservation guarantees this claim's producer exists, but it may
        // not have finished storing yet if a later producer published first
        let backoff = Backoff::new();
        while slot.stamp.load(Ordering::Acquire) != position + 1 {
            backoff.snooze();
        }
        // SAFETY: a stored stamp means the item is initialized, and the read
        // claim is unique to this consumer
        let item = unsafe { (*slot.item.get()).assume_init_read() };
        slot.stamp.store(position + self.one_lap, Ordering::Release);
        item
    }

    /// Stamp value of claim `index` while its slot is free
    fn position(&self, index: u64) -> u64 {
        let capacity = self.slots.len() as u64;
        (index / capacity) * self.one_lap + index % capacity
    }

    /// Drop items that were enqueued but never dequeued
    fn drop_queued_items(&mut self) {
        if !std::mem::needs_drop::<T>() || self.slots.is_empty() {
            return;
        }
        let capacity = self.slots.len() as u64;
        let read = *self.read_index.get_mut();
        let write = *self.write_index.get_mut();
        let one_lap = self.one_lap;
        for index in read..write {
            let position = self.position(index);
            let slot = &mut self.slots[(index % capacity) as usize];
            if *slot.stamp.get_mut() == position + 1 {
                // SAFETY: exclusive access, and the stamp marks it initialized
                unsafe { slot.item.get_mut().assume_init_drop() };
                *slot.stamp.get_mut() = position + one_lap;
            }
        }
    }
}

impl<T> Drop for ConcurrentBoundedQueue<T> {
    fn drop(&mut self) {
        self.drop_queued_items();
    }
}
