//! Capped exponential backoff.
//!
//! The delay math is pure (an iterator), so it is unit-testable without a
//! timer. [`Backoff::retry`] layers tokio sleeps on top for callers that
//! want the whole loop; the synchronizer drives the iterator itself so its
//! sleeps can race against cancellation.

use std::future::Future;
use std::time::Duration;

/// Total retry budget if none is given.
pub const DEFAULT_MAX_TOTAL: Duration = Duration::from_millis(10_000);

/// First non-zero delay if none is given.
pub const DEFAULT_FIRST_DELAY: Duration = Duration::from_millis(300);

/// A capped exponential delay sequence.
///
/// delay(0) = 0; delay(n) = min(first_delay · 2^(n-1), cap) for n ≥ 1. The
/// sequence stops before the cumulative planned sleep plus the next delay
/// would exceed `max_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    max_total: Duration,
    first_delay: Duration,
    cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOTAL, DEFAULT_FIRST_DELAY)
    }
}

impl Backoff {
    /// Backoff with the default cap of `max_total / 3`.
    pub fn new(max_total: Duration, first_delay: Duration) -> Self {
        Self {
            max_total,
            first_delay,
            cap: max_total / 3,
        }
    }

    /// Override the per-delay cap.
    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    pub fn max_total(&self) -> Duration {
        self.max_total
    }

    /// The pure delay sequence.
    pub fn delays(&self) -> Delays {
        Delays {
            backoff: *self,
            yielded: 0,
            planned: Duration::ZERO,
        }
    }

    /// Run `op` once per delay (sleeping first), stopping early on success
    /// or on a non-retryable error.
    ///
    /// Returns the final result and a report of iterations performed and
    /// budget remaining. `Err(None)` in the result position means the budget
    /// was zero and `op` never ran.
    pub async fn retry<T, E, Op, Fut>(
        &self,
        mut op: Op,
        retryable: impl Fn(&E) -> bool,
    ) -> (Result<T, Option<E>>, BackoffReport)
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delays = self.delays();
        let mut last_err = None;
        while let Some(delay) = delays.next() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match op().await {
                Ok(value) => return (Ok(value), delays.report()),
                Err(err) if retryable(&err) => last_err = Some(err),
                Err(err) => return (Err(Some(err)), delays.report()),
            }
        }
        (Err(last_err), delays.report())
    }
}

/// Iterator over the planned sleep durations of one backoff run.
#[derive(Debug, Clone)]
pub struct Delays {
    backoff: Backoff,
    yielded: u32,
    planned: Duration,
}

impl Delays {
    /// Iterations performed so far and the unspent part of the budget.
    pub fn report(&self) -> BackoffReport {
        BackoffReport {
            iterations: self.yielded as usize,
            remaining: self.backoff.max_total.saturating_sub(self.planned),
        }
    }
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.backoff.max_total.is_zero() {
            return None;
        }
        let delay = if self.yielded == 0 {
            Duration::ZERO
        } else {
            let exp = 2u32
                .checked_pow(self.yielded - 1)
                .and_then(|factor| self.backoff.first_delay.checked_mul(factor))
                .unwrap_or(Duration::MAX);
            exp.min(self.backoff.cap)
        };
        if self.planned + delay > self.backoff.max_total {
            return None;
        }
        self.planned += delay;
        self.yielded += 1;
        Some(delay)
    }
}

/// Summary of a completed backoff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffReport {
    /// Number of delays yielded (equivalently, attempts made).
    pub iterations: usize,
    /// Budget left when the sequence stopped.
    pub remaining: Duration,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn default_cap_is_a_third_of_the_budget() {
        let delays: Vec<_> = Backoff::new(ms(1000), ms(100)).delays().collect();
        // 400 would exceed the 333ms cap; two capped delays still fit the
        // 1000ms budget (0+100+200+333+333 = 966).
        assert_eq!(delays, vec![ms(0), ms(100), ms(200), ms(333), ms(333)]);
    }

    #[test]
    fn overridden_cap_kicks_in_at_delay_four() {
        let backoff = Backoff::new(ms(1000), ms(100)).with_cap(ms(400));
        let mut delays = backoff.delays();
        let collected: Vec<_> = delays.by_ref().collect();
        // 0+100+200+400 = 700; the next 400 would exceed 1000, so stop.
        assert_eq!(collected, vec![ms(0), ms(100), ms(200), ms(400)]);
        let report = delays.report();
        assert_eq!(report.iterations, 4);
        assert_eq!(report.remaining, ms(300));
    }

    #[test]
    fn zero_budget_yields_no_iterations() {
        let mut delays = Backoff::new(Duration::ZERO, ms(100)).delays();
        assert_eq!(delays.next(), None);
        assert_eq!(delays.report().iterations, 0);
        assert_eq!(delays.report().remaining, Duration::ZERO);
    }

    #[test]
    fn tiny_first_delay_does_not_overflow() {
        let backoff = Backoff::new(Duration::from_secs(3600), Duration::from_nanos(1));
        // Enough doublings to overflow the u32 factor if unchecked.
        let count = backoff.delays().take(200).count();
        assert!(count > 50, "sequence should keep yielding capped delays");
    }

    #[test]
    fn report_tracks_cumulative_planned_sleep() {
        let mut delays = Backoff::new(ms(1000), ms(100)).delays();
        for _ in 0..5 {
            delays.next();
        }
        let report = delays.report();
        assert_eq!(report.iterations, 5);
        assert_eq!(report.remaining, ms(34)); // 1000 - 966
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_on_first_success() {
        let attempts = AtomicUsize::new(0);
        let backoff = Backoff::new(ms(1000), ms(100));
        let (result, report) = backoff
            .retry(
                || async {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(n)
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result.expect("third attempt succeeds"), 2);
        assert_eq!(report.iterations, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_bails_on_non_retryable_error() {
        let attempts = AtomicUsize::new(0);
        let backoff = Backoff::new(ms(1000), ms(100));
        let (result, report) = backoff
            .retry::<(), _, _, _>(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                },
                |_| false,
            )
            .await;
        assert_eq!(result.expect_err("must fail"), Some("fatal"));
        assert_eq!(report.iterations, 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhausts_the_budget_then_reports() {
        let attempts = AtomicUsize::new(0);
        let backoff = Backoff::new(ms(1000), ms(100));
        let (result, report) = backoff
            .retry::<(), _, _, _>(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("transient")
                },
                |_| true,
            )
            .await;
        assert_eq!(result.expect_err("must exhaust"), Some("transient"));
        assert_eq!(report.iterations, 5);
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }
}
