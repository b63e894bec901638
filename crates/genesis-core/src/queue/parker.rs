//! Thread parking on a 32-bit atomic word
//!
//! [`Futex`] owns the word that blocked consumers sleep on, so queue logic
//! never hands raw addresses around. On Linux it is a thin wrapper over
//! `futex(2)`; the syscall takes the address of a plain `u32`, and
//! `AtomicU32` is guaranteed to have the same in-memory representation.
//! Elsewhere a mutex/condvar pair provides the same contract.

use std::sync::atomic::{AtomicU32, Ordering};

/// How a [`Futex::wait`] call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Another thread called [`Futex::wake`] (or the OS woke us spuriously)
    Woken,
    /// The word no longer held the expected value, so we never slept
    ValueChanged,
    /// A signal interrupted the sleep
    Interrupted,
}

/// A 32-bit word threads can block on until it is signaled
pub struct Futex {
    word: AtomicU32,
    #[cfg(not(target_os = "linux"))]
    fallback: fallback::Fallback,
}

impl Futex {
    pub fn new(value: u32) -> Self {
        Self {
            word: AtomicU32::new(value),
            #[cfg(not(target_os = "linux"))]
            fallback: fallback::Fallback::default(),
        }
    }

    /// Current value of the word
    #[inline]
    pub fn load(&self) -> u32 {
        self.word.load(Ordering::SeqCst)
    }

    /// Advance the word so that sleepers comparing against an older value wake
    #[inline]
    pub fn bump(&self) {
        self.word.fetch_add(1, Ordering::SeqCst);
    }

    /// Reset the word; only valid while no thread can be waiting on it
    pub fn reset(&mut self) {
        *self.word.get_mut() = 0;
    }

    /// Sleep while the word equals `expected`
    ///
    /// # Panics
    ///
    /// If the OS reports the operation as unsupported or its arguments as
    /// invalid. Both mean the queue cannot block correctly on this system.
    pub fn wait(&self, expected: u32) -> WaitOutcome {
        #[cfg(target_os = "linux")]
        {
            linux::wait(&self.word, expected)
        }
        #[cfg(not(target_os = "linux"))]
        {
            self.fallback.wait(&self.word, expected)
        }
    }

    /// Wake up to `count` threads sleeping on the word, returning how many woke
    pub fn wake(&self, count: u32) -> usize {
        if count == 0 {
            return 0;
        }
        #[cfg(target_os = "linux")]
        {
            linux::wake(&self.word, count)
        }
        #[cfg(not(target_os = "linux"))]
        {
            self.fallback.wake(count)
        }
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::WaitOutcome;
    use std::ptr;
    use std::sync::atomic::AtomicU32;

    pub(super) fn wait(word: &AtomicU32, expected: u32) -> WaitOutcome {
        // SAFETY: `word` is a live, aligned u32 for the duration of the call
        let result = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                expected,
                ptr::null::<libc::timespec>(),
            )
        };
        if result == 0 {
            return WaitOutcome::Woken;
        }

        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::EAGAIN) => WaitOutcome::ValueChanged,
            Some(libc::EINTR) => WaitOutcome::Interrupted,
            Some(code) => panic!(
                "futex wait failed: {}",
                std::io::Error::from_raw_os_error(code)
            ),
            None => panic!("futex wait failed without an OS error code"),
        }
    }

    pub(super) fn wake(word: &AtomicU32, count: u32) -> usize {
        let count = count.min(i32::MAX as u32) as libc::c_int;
        // SAFETY: as above; FUTEX_WAKE only uses the address as a key
        let result = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
            )
        };
        if result < 0 {
            panic!("futex wake failed: {}", std::io::Error::last_os_error());
        }
        result as usize
    }
}

#[cfg(not(target_os = "linux"))]
mod fallback {
    use super::WaitOutcome;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Condvar, Mutex, PoisonError};

    /// Mutex/condvar stand-in for the futex syscall
    ///
    /// The value check and the sleep happen under `lock`, and `wake` takes
    /// `lock` before notifying, so a change made before `wake` is never missed.
    #[derive(Default)]
    pub(super) struct Fallback {
        lock: Mutex<()>,
        condvar: Condvar,
    }

    impl Fallback {
        pub(super) fn wait(&self, word: &AtomicU32, expected: u32) -> WaitOutcome {
            let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            if word.load(Ordering::SeqCst) != expected {
                return WaitOutcome::ValueChanged;
            }
            drop(
                self.condvar
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            );
            WaitOutcome::Woken
        }

        pub(super) fn wake(&self, count: u32) -> usize {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            if count == 1 {
                self.condvar.notify_one();
            } else {
                self.condvar.notify_all();
            }
            count as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_when_value_differs() {
        let futex = Futex::new(7);
        assert_eq!(futex.wait(3), WaitOutcome::ValueChanged);
    }

    #[test]
    fn test_wake_without_sleepers() {
        let futex = Futex::new(0);
        assert_eq!(futex.wake(0), 0);
        #[cfg(target_os = "linux")]
        assert_eq!(futex.wake(1), 0);
    }

    #[test]
    fn test_bump_then_wake_releases_sleeper() {
        let futex = Arc::new(Futex::new(0));
        let sleeper = {
            let futex = Arc::clone(&futex);
            thread::spawn(move || loop {
                // Spurious wakes and signals just mean "check again"
                if futex.load() != 0 {
                    return;
                }
                futex.wait(0);
            })
        };

        thread::sleep(Duration::from_millis(20));
        futex.bump();
        futex.wake(1);
        sleeper.join().unwrap();
    }
}
