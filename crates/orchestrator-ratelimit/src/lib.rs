//! # orchestrator-ratelimit
//!
//! Per-agent dual-window (per-minute, per-hour) token-bucket rate limiting.
//!
//! ```
//! use orchestrator_ratelimit::RateLimiter;
//!
//! let limiter = RateLimiter::new(60, 1000);
//! limiter.acquire(); // blocks only if a window is saturated
//! ```
//!
//! `acquire` never fails; it may block indefinitely while a window is
//! saturated. [`RateLimiter::acquire_cancellable`] offers the same contract
//! but returns early when a [`CancellationToken`] is tripped, so a caller can
//! unwind a blocked session instead of waiting out the window.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// The sleep is chopped into slices of this size so a cancellation can
/// interrupt it promptly instead of waiting out the full backoff.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Raised by [`RateLimiter::acquire_cancellable`] when the token is tripped
/// while the caller was waiting for a window to free up.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("rate limiter wait was cancelled")]
pub struct Cancelled;

/// A cooperative cancellation flag shared between a waiter and whoever wants
/// to interrupt it. Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Both sliding-window queues behind one lock, so evicting expired entries,
/// checking headroom, and recording a new request happen as one atomic
/// step — no caller can observe or act on a state where the check has run
/// but the corresponding timestamp has not yet been recorded.
#[derive(Debug, Default)]
struct Windows {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

/// Per-agent dual sliding-window token bucket: `requests_per_minute` and
/// `requests_per_hour` caps, each enforced independently. Safe for
/// concurrent callers sharing one instance: the check-and-record sequence
/// for both windows runs under a single mutex, so two callers can never
/// both observe headroom and both record a request.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    requests_per_hour: u32,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, requests_per_hour: u32) -> Self {
        Self {
            requests_per_minute,
            requests_per_hour,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    pub fn requests_per_hour(&self) -> u32 {
        self.requests_per_hour
    }

    /// Block until a token is available under both windows, then record the
    /// request. Never fails.
    pub fn acquire(&self) {
        loop {
            match self.try_acquire_or_wait(None) {
                Ok(()) => return,
                Err(Cancelled) => unreachable!("acquire never cancels"),
            }
        }
    }

    /// Same contract as [`Self::acquire`], but the wait is interrupted as
    /// soon as `cancel` is tripped, returning [`Cancelled`] instead of
    /// recording the request.
    pub fn acquire_cancellable(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        self.try_acquire_or_wait(Some(cancel))
    }

    fn try_acquire_or_wait(&self, cancel: Option<&CancellationToken>) -> Result<(), Cancelled> {
        loop {
            let now = Instant::now();
            let wait = {
                let mut windows = self.windows.lock().unwrap();
                evict_expired(&mut windows.minute, now, MINUTE);
                evict_expired(&mut windows.hour, now, HOUR);

                let minute_wait = window_wait(&windows.minute, self.requests_per_minute, now, MINUTE);
                let hour_wait = window_wait(&windows.hour, self.requests_per_hour, now, HOUR);
                match minute_wait.max(hour_wait) {
                    None => {
                        // Still holding the lock: record the request in the
                        // same critical section that just established
                        // headroom, so no other caller can slip in between.
                        windows.minute.push_back(now);
                        windows.hour.push_back(now);
                        None
                    }
                    Some(duration) => Some(duration),
                }
            };

            match wait {
                None => return Ok(()),
                Some(duration) => {
                    log::debug!(
                        "rate limiter waiting {} before next acquire",
                        humantime::format_duration(duration)
                    );
                    if sleep_cancellable(duration, cancel) {
                        return Err(Cancelled);
                    }
                }
            }
        }
    }
}

fn evict_expired(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = queue.front() {
        if now.duration_since(front) >= window {
            queue.pop_front();
        } else {
            break;
        }
    }
}

/// `None` if the window has headroom; `Some(duration)` to wait for the
/// oldest entry in the window to age out otherwise.
fn window_wait(
    queue: &VecDeque<Instant>,
    limit: u32,
    now: Instant,
    window: Duration,
) -> Option<Duration> {
    if (queue.len() as u32) < limit {
        return None;
    }
    let oldest = *queue.front()?;
    let elapsed = now.duration_since(oldest);
    Some(window.saturating_sub(elapsed))
}

/// Sleep in [`POLL_INTERVAL`] slices, returning `true` if `cancel` tripped
/// before the full duration elapsed.
fn sleep_cancellable(duration: Duration, cancel: Option<&CancellationToken>) -> bool {
    let Some(cancel) = cancel else {
        std::thread::sleep(duration);
        return false;
    };

    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return true;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        std::thread::sleep(remaining.min(POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_does_not_block_under_limit() {
        let limiter = RateLimiter::new(5, 100);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire();
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn minute_window_blocks_once_saturated() {
        let limiter = RateLimiter::new(2, 1000);
        limiter.acquire();
        limiter.acquire();

        // Synthetically age the minute window so the third acquire is
        // already past due instead of actually sleeping 60s in a test.
        {
            let mut windows = limiter.windows.lock().unwrap();
            for entry in windows.minute.iter_mut() {
                *entry -= Duration::from_secs(61);
            }
        }

        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn acquire_cancellable_returns_err_when_tripped() {
        let limiter = RateLimiter::new(1, 1000);
        limiter.acquire();

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            cancel_clone.cancel();
        });

        let start = Instant::now();
        let result = limiter.acquire_cancellable(&cancel);
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn hour_window_enforced_independently_of_minute() {
        let limiter = RateLimiter::new(1000, 2);
        limiter.acquire();
        limiter.acquire();

        {
            let mut windows = limiter.windows.lock().unwrap();
            for entry in windows.hour.iter_mut() {
                *entry -= Duration::from_secs(3601);
            }
        }

        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn cancellation_token_is_shared_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn concurrent_acquires_never_record_more_than_one_request_per_caller() {
        // Evict/check/record happen under one lock (`Windows` behind a
        // single `Mutex`), so `minute.len()` after every caller has returned
        // must equal exactly the number of callers — never fewer (a lost
        // update) and, more importantly, the check-then-record step can
        // never be split across two lock acquisitions the way it would be
        // with separate per-window mutexes.
        use std::sync::{Arc, Barrier};
        use std::thread;

        let threads = 16;
        let limiter = Arc::new(RateLimiter::new(threads as u32, 1_000_000));
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    limiter.acquire();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let windows = limiter.windows.lock().unwrap();
        assert_eq!(windows.minute.len(), threads);
    }
}
