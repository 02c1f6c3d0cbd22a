//! Reconnect driver (4.F): exponential backoff, unbounded or bounded by
//! `failAfter`.

use std::time::Duration;

use crate::settings::ReconnectPolicy;

/// Produces the sequence of delays a reconnect loop should wait
/// between dial attempts.
pub struct Backoff {
    policy: ReconnectPolicy,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Backoff {
        Backoff {
            next: policy.initial_delay,
            policy,
            attempts: 0,
        }
    }

    /// `None` once `fail_after` attempts have been spent; otherwise the
    /// delay to wait before the next attempt, doubling each call up to
    /// `max_delay`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(limit) = self.policy.fail_after {
            if self.attempts >= limit {
                return None;
            }
        }
        self.attempts += 1;
        let delay = self.next;
        self.next = std::cmp::min(self.next * 2, self.policy.max_delay);
        Some(delay)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delay_doubles_up_to_max() {
        let mut b = Backoff::new(ReconnectPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(35),
            fail_after: None,
        });
        assert_eq!(b.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(b.next_delay(), Some(Duration::from_millis(20)));
        assert_eq!(b.next_delay(), Some(Duration::from_millis(35)));
        assert_eq!(b.next_delay(), Some(Duration::from_millis(35)));
    }

    #[test]
    fn bounded_attempts_exhaust() {
        let mut b = Backoff::new(ReconnectPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            fail_after: Some(2),
        });
        assert!(b.next_delay().is_some());
        assert!(b.next_delay().is_some());
        assert_eq!(b.next_delay(), None);
    }
}
