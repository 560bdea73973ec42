use std::time::Duration;

use crate::providers::RpcErrorClass;

/// Cooldowns and logging thresholds of a scan's retry loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Public endpoints meter requests per minute
    pub rate_limit_cooldown: Duration,
    /// Endpoints ban offenders for a few minutes
    pub forbidden_cooldown: Duration,
    pub warn_from_retry: u32,
    pub error_from_retry: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: Duration::from_secs(60),
            forbidden_cooldown: Duration::from_secs(10 * 60),
            warn_from_retry: 2,
            error_from_retry: 10,
        }
    }
}

impl RetryPolicy {
    pub fn with_cooldowns(mut self, rate_limit: Duration, forbidden: Duration) -> Self {
        self.rate_limit_cooldown = rate_limit;
        self.forbidden_cooldown = forbidden;

        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    RetryAfter(Duration),
    /// Give up the current endpoint, then retry on another
    Failover,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Silent,
    Warn,
    Error,
}

/// Retry state of one scan attempt. There is no ceiling: a scan retries
/// until it succeeds or its worker loses every endpoint.
pub struct ScanRetries<'a> {
    policy: &'a RetryPolicy,
    retries: u32,
}

impl<'a> ScanRetries<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    pub fn next_action(&mut self, class: RpcErrorClass) -> RetryAction {
        self.retries += 1;

        match class {
            RpcErrorClass::RateLimited => RetryAction::RetryAfter(self.policy.rate_limit_cooldown),
            RpcErrorClass::Forbidden => RetryAction::RetryAfter(self.policy.forbidden_cooldown),
            RpcErrorClass::Connection => RetryAction::Failover,
            RpcErrorClass::StaleFilter | RpcErrorClass::Unclassified => RetryAction::Retry,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Nodes routinely drop filters, so a first retry is not worth reporting
    pub fn severity(&self) -> Severity {
        if self.retries >= self.policy.error_from_retry {
            Severity::Error
        } else if self.retries >= self.policy.warn_from_retry {
            Severity::Warn
        } else {
            Severity::Silent
        }
    }
}
