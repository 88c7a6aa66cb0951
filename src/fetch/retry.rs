use anyhow::{bail, Result};
use std::time::Duration;

/// Bounded exponential backoff: before attempt `n + 1` (attempts counted
/// from 0) the client waits `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Result<Self> {
        if max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        Ok(Self {
            max_attempts,
            base_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt `attempt`, or `None` once no attempts remain.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Every wait this policy can produce, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts)
            .map_while(|a| self.delay_after(a))
            .collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Where backoff waits go. Tests swap in a recorder.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, delay: Duration) {
        (**self).sleep(delay)
    }
}

/// Blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.schedule(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert_eq!(p.delay_after(2), None);
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let p = RetryPolicy::new(1, Duration::from_millis(10)).unwrap();
        assert!(p.schedule().is_empty());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(RetryPolicy::new(0, Duration::from_secs(1)).is_err());
    }
}
