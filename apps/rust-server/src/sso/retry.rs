// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Retry policy applied to every outbound SSO call.
//!
//! Each attempt runs under its own timeout; an attempt that times out fails
//! with `DeadlineExceeded`. Failures whose code is in the retryable set are
//! retried with exponential backoff until `max_attempts` is reached, then the
//! last failure is returned as-is.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::rpc::{RpcCode, RpcStatus};

/// Codes that describe transient or ambiguous outcomes.
pub const DEFAULT_RETRYABLE_CODES: &[RpcCode] = &[
    RpcCode::NotFound,
    RpcCode::Aborted,
    RpcCode::DeadlineExceeded,
];

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Progress of one wrapped call.
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    started: Instant,
    last_code: Option<RpcCode>,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
            last_code: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    per_attempt_timeout: Duration,
    retryable: Vec<RpcCode>,
    initial_backoff: Duration,
    max_backoff: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; zero behaves like one.
    pub fn new(max_attempts: u32, per_attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            per_attempt_timeout,
            retryable: DEFAULT_RETRYABLE_CODES.to_vec(),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Replace the retryable code set.
    #[cfg(test)]
    pub(crate) fn with_codes(mut self, codes: &[RpcCode]) -> Self {
        self.retryable = codes.to_vec();
        self
    }

    pub fn with_backoff(mut self, initial: Duration, multiplier: f64, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.backoff_multiplier = multiplier;
        self.max_backoff = max;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    pub fn is_retryable(&self, code: RpcCode) -> bool {
        self.retryable.contains(&code)
    }

    /// Sleep before retry number `attempt` (0-indexed).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = (self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32)) as u128;
        let backoff = Duration::from_millis(backoff_ms.min(u64::MAX as u128) as u64);
        backoff.min(self.max_backoff)
    }

    /// Run `call` under this policy. `op` names the operation in logs.
    pub async fn call<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, RpcStatus>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RpcStatus>>,
    {
        let mut state = RetryState::new();

        loop {
            state.attempt += 1;

            let outcome = match tokio::time::timeout(self.per_attempt_timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RpcStatus::new(
                    RpcCode::DeadlineExceeded,
                    format!("attempt timed out after {:?}", self.per_attempt_timeout),
                )),
            };

            let status = match outcome {
                Ok(value) => {
                    if state.attempt > 1 {
                        debug!(
                            op,
                            attempt = state.attempt,
                            elapsed_ms = state.started.elapsed().as_millis() as u64,
                            "call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(status) => status,
            };

            state.last_code = Some(status.code);

            if !self.is_retryable(status.code) {
                return Err(status);
            }
            if state.attempt >= self.max_attempts {
                warn!(
                    op,
                    attempts = state.attempt,
                    elapsed_ms = state.started.elapsed().as_millis() as u64,
                    code = %status.code,
                    "retry budget exhausted"
                );
                return Err(status);
            }

            let backoff = self.backoff_for_attempt(state.attempt - 1);
            debug!(
                op,
                attempt = state.attempt,
                last_code = ?state.last_code,
                backoff_ms = backoff.as_millis() as u64,
                "retrying call"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
