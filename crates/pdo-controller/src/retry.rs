//! Requeue decisions and backoff

use std::time::Duration;

use crate::config::RetryConfig;

/// What the dispatcher should do with a policy key after a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Converged; wait for the next change notification
    AwaitChange,
    /// Redeliver after a fixed delay
    RequeueAfter(Duration),
}

/// Exponential backoff for failed passes, plus the fixed delay used while
/// credentials are unavailable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub credentials_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_secs(config.max_delay_secs),
            credentials_delay: Duration::from_secs(config.credentials_retry_secs),
        }
    }

    /// Delay before redelivering after `attempt` consecutive failures
    /// (0-indexed), doubling each time and capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Requeue action for a failed pass
    pub fn on_error(&self, attempt: u32) -> ReconcileAction {
        ReconcileAction::RequeueAfter(self.delay_for(attempt))
    }

    /// Requeue action while credentials cannot be loaded
    pub fn credentials_action(&self) -> ReconcileAction {
        ReconcileAction::RequeueAfter(self.credentials_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            credentials_delay: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_exponential() {
        let p = policy();
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(800));
        assert_eq!(p.delay_for(40), Duration::from_secs(10));
    }

    #[test]
    fn test_credentials_delay_is_longer_than_default_backoff() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.credentials_action(),
            ReconcileAction::RequeueAfter(Duration::from_secs(600))
        );
        assert!(p.credentials_delay > p.delay_for(u32::MAX));
    }

    proptest! {
        #[test]
        fn delay_is_monotonic_and_capped(attempt in 0u32..64) {
            let p = policy();
            prop_assert!(p.delay_for(attempt) <= p.max_delay);
            prop_assert!(p.delay_for(attempt) <= p.delay_for(attempt + 1));
        }
    }
}
