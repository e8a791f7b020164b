use std::sync::Arc;
use std::time::Duration;

use super::store::{CounterStore, RateLimitError};

/// Maximum admitted operations per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub limit: u64,
    pub window: Duration,
}

impl RatePolicy {
    pub fn new(limit: u64, window_seconds: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_seconds.max(1)),
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted { remaining: u64, resets_in: Duration },
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Admission control for one policy, shared across replicas through its [`CounterStore`].
///
/// Counters are keyed `ratelimit:{scope}:{identity}`, so several limiters (uploads,
/// general HTTP) can share one store without interfering.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    policy: RatePolicy,
    scope: String,
    fail_open: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, scope: impl Into<String>, policy: RatePolicy) -> Self {
        Self {
            store,
            policy,
            scope: scope.into(),
            fail_open: true,
        }
    }

    /// Deny instead of admit when the counter store is unreachable.
    pub fn fail_closed(mut self) -> Self {
        self.fail_open = false;
        self
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    fn counter_key(&self, identity: &str) -> String {
        format!("ratelimit:{}:{}", self.scope, identity)
    }

    /// Count this call against `identity` and decide.
    ///
    /// The call that pushes the counter past the limit is itself counted, and so is
    /// every denied call after it, until the store expires the window.
    #[tracing::instrument(skip(self), fields(scope = %self.scope))]
    pub async fn try_admit(&self, identity: &str) -> Result<Decision, RateLimitError> {
        let observed = self
            .store
            .incr_with_expiry(&self.counter_key(identity), self.policy.window)
            .await?;

        if observed.count > self.policy.limit {
            tracing::debug!(
                identity = %identity,
                count = observed.count,
                limit = self.policy.limit,
                "Rate limit exceeded"
            );
            return Ok(Decision::Denied {
                retry_after: observed.resets_in,
            });
        }

        Ok(Decision::Admitted {
            remaining: self.policy.limit - observed.count,
            resets_in: observed.resets_in,
        })
    }

    /// [`try_admit`](Self::try_admit) with the configured store-failure policy applied.
    pub async fn admit(&self, identity: &str) -> Decision {
        match self.try_admit(identity).await {
            Ok(decision) => decision,
            Err(e) if self.fail_open => {
                tracing::error!(error = %e, scope = %self.scope, "Rate limiter unavailable, admitting");
                Decision::Admitted {
                    remaining: 0,
                    resets_in: self.policy.window,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, scope = %self.scope, "Rate limiter unavailable, denying");
                Decision::Denied {
                    retry_after: self.policy.window,
                }
            }
        }
    }
}
