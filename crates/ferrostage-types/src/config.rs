//! Validated configuration values shared by the orchestrator and its callers

use std::time::Duration;

/// Maximum number of concurrently active transfer jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct ConcurrencyLimit(usize);

impl ConcurrencyLimit {
    /// Minimum concurrency limit
    pub const MIN: usize = 1;
    /// Maximum concurrency limit
    pub const MAX: usize = 10;
    /// Default concurrency limit
    pub const DEFAULT: usize = 4;

    /// Create a new concurrency limit with validation
    pub fn new(limit: usize) -> Result<Self, String> {
        if limit < Self::MIN {
            Err(format!(
                "Concurrency limit {} is below minimum {}",
                limit,
                Self::MIN
            ))
        } else if limit > Self::MAX {
            Err(format!(
                "Concurrency limit {} exceeds maximum {}",
                limit,
                Self::MAX
            ))
        } else {
            Ok(Self(limit))
        }
    }

    /// Get the concurrency limit value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for ConcurrencyLimit {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConcurrencyLimit> for usize {
    fn from(limit: ConcurrencyLimit) -> Self {
        limit.0
    }
}

/// How long the transfer facility may retry a stalled transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    timeout: Duration,
}

impl RetryPolicy {
    /// Default delay between retries of a stalled transfer
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
    /// Default total time a stalled transfer may be retried
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

    /// Create a new retry policy with validation
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self, String> {
        if interval.is_zero() {
            return Err("Retry interval must be greater than zero".to_string());
        }
        if timeout < interval {
            return Err(format!(
                "Retry timeout {:?} cannot be shorter than retry interval {:?}",
                timeout, interval
            ));
        }
        Ok(Self { interval, timeout })
    }

    /// Delay between retries
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on total retry time
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// Sleep between two polling cycles of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval(Duration);

impl PollInterval {
    /// Minimum poll interval
    pub const MIN: Duration = Duration::from_millis(1);
    /// Maximum poll interval
    pub const MAX: Duration = Duration::from_secs(60);
    /// Default poll interval
    pub const DEFAULT: Duration = Duration::from_secs(2);

    /// Create a new poll interval with validation
    pub fn new(interval: Duration) -> Result<Self, String> {
        if interval < Self::MIN {
            Err(format!("Poll interval {:?} is below minimum {:?}", interval, Self::MIN))
        } else if interval > Self::MAX {
            Err(format!("Poll interval {:?} exceeds maximum {:?}", interval, Self::MAX))
        } else {
            Ok(Self(interval))
        }
    }

    /// Get the poll interval value
    pub fn get(self) -> Duration {
        self.0
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(10, true)]
    #[case(11, false)]
    fn test_concurrency_limit_bounds(#[case] value: usize, #[case] valid: bool) {
        assert_eq!(ConcurrencyLimit::new(value).is_ok(), valid);
    }

    #[test]
    fn test_retry_policy_validation() {
        assert!(RetryPolicy::new(Duration::ZERO, Duration::from_secs(1)).is_err());
        assert!(RetryPolicy::new(Duration::from_secs(10), Duration::from_secs(5)).is_err());

        let policy = RetryPolicy::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        assert_eq!(policy.interval(), Duration::from_secs(5));
        assert_eq!(policy.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_poll_interval_bounds() {
        assert!(PollInterval::new(Duration::ZERO).is_err());
        assert!(PollInterval::new(Duration::from_secs(61)).is_err());
        assert_eq!(
            PollInterval::new(Duration::from_millis(10)).unwrap().get(),
            Duration::from_millis(10)
        );
        assert_eq!(PollInterval::default().get(), PollInterval::DEFAULT);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_concurrency_limit_deserialization_validates() {
        assert!(serde_json::from_str::<ConcurrencyLimit>("3").is_ok());
        assert!(serde_json::from_str::<ConcurrencyLimit>("0").is_err());
    }
}
