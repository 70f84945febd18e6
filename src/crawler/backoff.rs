//! Retry and backoff decisions
//!
//! Rate-limited responses (429) honor the server's `Retry-After` seconds.
//! Every other retryable status, and transport errors, follow an
//! exponential curve capped at a maximum delay. Attempt counters are kept
//! per logical request key and dropped once the request proceeds or is
//! abandoned.

use crate::config::{RateLimitConfig, RetryConfig};
use crate::crawler::RenderedPage;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const TOO_MANY_REQUESTS: u16 = 429;

/// Outcome of consulting the controller about a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Hand the page to classification
    Proceed,
    /// Re-enqueue the request after `delay`; `attempt` counts from 1
    Retry { delay: Duration, attempt: u32 },
    /// Retry budget exhausted; report a terminal drop
    GiveUp { attempts: u32 },
}

/// Retry tunables, usually built from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub enabled: bool,
    pub retry_codes: Vec<u16>,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub rate_limit_delay: Duration,
}

impl BackoffPolicy {
    pub fn from_config(retry: &RetryConfig, rate_limit: &RateLimitConfig) -> Self {
        Self {
            enabled: retry.enabled,
            retry_codes: retry.http_codes.clone(),
            max_retries: retry.max_attempts,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            multiplier: retry.multiplier,
            rate_limit_delay: Duration::from_secs(rate_limit.default_delay_secs),
        }
    }

    /// Exponential delay for the given retry number (1-based), capped
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_millis() as f64;

        if !millis.is_finite() || millis >= cap {
            self.max_delay
        } else {
            Duration::from_millis(millis as u64)
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), &RateLimitConfig::default())
    }
}

/// Per-request retry bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
    pub key: String,
    /// Delay the server asked for on the most recent 429, if any
    pub declared_delay: Option<Duration>,
}

/// Decides whether responses are retried and how long to wait
pub struct BackoffController {
    policy: BackoffPolicy,
    states: Mutex<HashMap<String, RetryState>>,
}

impl BackoffController {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Decides what happens to the response for the request identified by `key`
    ///
    /// Statuses outside the retry set always proceed, including 4xx pages.
    pub fn decide(&self, key: &str, page: &RenderedPage) -> BackoffDecision {
        self.decide_status(key, page.status, page.header("retry-after"))
    }

    /// Same as [`decide`](Self::decide) from a bare status and `Retry-After` value
    pub fn decide_status(&self, key: &str, status: u16, retry_after: Option<&str>) -> BackoffDecision {
        if !self.policy.enabled {
            return BackoffDecision::Proceed;
        }

        if status == TOO_MANY_REQUESTS {
            let declared = retry_after
                .and_then(parse_retry_after)
                .map(|delay| self.clamp_declared(key, delay));
            let delay = declared.unwrap_or(self.policy.rate_limit_delay);
            return self.next_attempt(key, declared, |_| delay);
        }

        if self.policy.retry_codes.contains(&status) {
            return self.next_attempt(key, None, |attempt| self.policy.exponential_delay(attempt));
        }

        self.clear(key);
        BackoffDecision::Proceed
    }

    /// Decision for a transport failure (timeout, connection error)
    pub fn decide_error(&self, key: &str) -> BackoffDecision {
        if !self.policy.enabled {
            return BackoffDecision::GiveUp { attempts: 0 };
        }
        self.next_attempt(key, None, |attempt| self.policy.exponential_delay(attempt))
    }

    /// Number of requests currently between retries
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Retries recorded so far for a key
    pub fn attempts(&self, key: &str) -> u32 {
        self.lock().get(key).map_or(0, |state| state.attempts)
    }

    fn next_attempt<F>(&self, key: &str, declared: Option<Duration>, delay_for: F) -> BackoffDecision
    where
        F: FnOnce(u32) -> Duration,
    {
        let mut states = self.lock();
        let state = states.entry(key.to_string()).or_insert_with(|| RetryState {
            attempts: 0,
            key: key.to_string(),
            declared_delay: None,
        });

        if state.attempts >= self.policy.max_retries {
            let attempts = state.attempts;
            states.remove(key);
            return BackoffDecision::GiveUp { attempts };
        }

        state.attempts += 1;
        state.declared_delay = declared;
        let attempt = state.attempts;

        BackoffDecision::Retry {
            delay: delay_for(attempt),
            attempt,
        }
    }

    /// Caps a server-declared delay at the policy's maximum delay
    fn clamp_declared(&self, key: &str, delay: Duration) -> Duration {
        if delay > self.policy.max_delay {
            tracing::warn!(
                "Retry-After of {:?} for {} exceeds the {:?} ceiling, clamping",
                delay,
                key,
                self.policy.max_delay
            );
            return self.policy.max_delay;
        }
        delay
    }

    fn clear(&self, key: &str) {
        self.lock().remove(key);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RetryState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parses a `Retry-After` value given in whole seconds
///
/// HTTP-date values are not interpreted and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
