//! Poll policies and tunables for resolution and joining

use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::device::DEFAULT_MULTICAST_GROUP;

/// Bounded polling: up to `max_attempts` tries, `interval` apart
///
/// `jitter` adds a random extra delay in `0..=jitter` to each wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub jitter: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            jitter: Duration::ZERO,
        }
    }

    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// The wait before the next attempt
    pub fn delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        self.interval + Duration::from_millis(extra)
    }

    pub fn wait(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    /// Upper bound on the total time spent waiting
    pub fn max_total(&self) -> Duration {
        (self.interval + self.jitter) * self.max_attempts
    }
}

/// Candidate resolution settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Retries of the receiver's visible-senders list while discovery propagates
    pub discovery: PollPolicy,
    pub multicast_group: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            discovery: PollPolicy::new(6, Duration::from_millis(500)),
            multicast_group: DEFAULT_MULTICAST_GROUP.to_string(),
        }
    }
}

/// Join state machine settings
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Convergence polling per candidate
    pub poll: PollPolicy,
    /// Pause after wake and source changes so the device can catch up
    pub settle: Duration,
    /// Send the synthesized reference directly when every candidate failed
    pub last_resort: bool,
    pub resolver: ResolverConfig,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::new(8, Duration::from_millis(500)),
            settle: Duration::from_secs(1),
            last_resort: true,
            resolver: ResolverConfig::default(),
        }
    }
}

impl JoinConfig {
    /// Zero-delay settings for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            poll: PollPolicy::immediate(8),
            settle: Duration::ZERO,
            last_resort: true,
            resolver: ResolverConfig {
                discovery: PollPolicy::immediate(6),
                ..ResolverConfig::default()
            },
        }
    }

    pub(crate) fn settle(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JoinConfig::default();
        assert_eq!(config.poll.max_attempts, 8);
        assert_eq!(config.poll.max_total(), Duration::from_secs(4));
        assert_eq!(config.resolver.discovery.max_attempts, 6);
        assert_eq!(config.resolver.multicast_group, "239.255.255.250:51972");
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = PollPolicy::new(3, Duration::from_millis(100)).with_jitter(Duration::from_millis(50));
        for _ in 0..100 {
            let delay = policy.delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_immediate_policy_has_no_delay() {
        assert_eq!(PollPolicy::immediate(4).delay(), Duration::ZERO);
    }
}
