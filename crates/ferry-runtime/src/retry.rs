//! Retry with exponential backoff
//!
//! [`Retry`] runs a fallible unit of work until it succeeds. Attempts are
//! strictly sequential: attempt `n + 1` starts only after attempt `n` failed
//! and its backoff delay has elapsed.

use crate::lifecycle::ReadyGate;
use ferry_config::CoreConfig;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff curve and overall time budget
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failure
    pub initial_delay: Duration,

    /// Upper bound for a single delay
    pub max_delay: Duration,

    /// Growth factor applied per failure
    pub multiplier: f64,

    /// Stop retrying once this much time would have elapsed (None = forever)
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Build the policy used for binds from the `core` config section
    pub fn from_config(core: &CoreConfig) -> Self {
        Self {
            initial_delay: core.retry.initial_delay,
            max_delay: core.retry.max_delay,
            multiplier: core.retry.multiplier,
            timeout: core.rebind_timeout,
        }
    }

    /// Set the overall time budget
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay to wait after the given (1-based) failed attempt
    ///
    /// Never decreases as `attempt` grows and never exceeds `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);

        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled)
        }
    }
}

/// A failed attempt, as seen by the error observer
#[derive(Debug)]
pub struct RetryAttempt<'e, E> {
    /// 1-based attempt number
    pub attempt: u32,
    /// Delay before the next attempt
    pub delay: Duration,
    /// Why the attempt failed
    pub error: &'e E,
}

/// Successful result of a retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed<T> {
    /// Value produced by the successful attempt
    pub value: T,
    /// Number of the attempt that succeeded
    pub attempts: u32,
}

/// The time budget ran out; carries the last error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    /// Attempts made before giving up
    pub attempts: u32,
    /// Error of the last attempt
    pub error: E,
}

impl<E: fmt::Display> fmt::Display for Exhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.error)
    }
}

type ErrorHook<'a, E> = Box<dyn FnMut(&RetryAttempt<'_, E>) + Send + 'a>;

/// Retry loop builder
///
/// Hooks are registered before the loop is armed with [`Retry::run`].
pub struct Retry<'a, E> {
    policy: RetryPolicy,
    on_error: Option<ErrorHook<'a, E>>,
    dependency: Option<ReadyGate>,
}

impl<E> fmt::Debug for Retry<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("policy", &self.policy)
            .field("on_error", &self.on_error.is_some())
            .field("dependency", &self.dependency.is_some())
            .finish()
    }
}

impl<'a, E> Retry<'a, E> {
    /// Create a retry loop with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            on_error: None,
            dependency: None,
        }
    }

    /// Observe every failed attempt that will be retried
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&RetryAttempt<'_, E>) + Send + 'a,
    {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Hold the first attempt until `gate` opens
    pub fn depend_on(mut self, gate: ReadyGate) -> Self {
        self.dependency = Some(gate);
        self
    }

    /// Arm the loop and drive it to completion
    ///
    /// `attempt` receives the 1-based attempt number. The loop ends on the
    /// first `Ok`. On `Err` the error hook is called and the next attempt is
    /// scheduled after the backoff delay, unless that would overrun the
    /// timeout budget, in which case the error is returned as [`Exhausted`].
    pub async fn run<T, F, Fut>(mut self, mut attempt: F) -> Result<Completed<T>, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(mut gate) = self.dependency.take() {
            gate.wait().await;
        }

        let started = Instant::now();
        let mut number: u32 = 1;

        loop {
            let error = match attempt(number).await {
                Ok(value) => {
                    return Ok(Completed {
                        value,
                        attempts: number,
                    })
                }
                Err(error) => error,
            };

            let delay = self.policy.delay_for(number);

            if let Some(budget) = self.policy.timeout {
                if started.elapsed() + delay > budget {
                    return Err(Exhausted {
                        attempts: number,
                        error,
                    });
                }
            }

            if let Some(hook) = self.on_error.as_mut() {
                hook(&RetryAttempt {
                    attempt: number,
                    delay,
                    error: &error,
                });
            }

            tokio::time::sleep(delay).await;
            number = number.saturating_add(1);
        }
    }
}
