// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry classification and backoff schedule.

use charter_core::ToolExecutionError;

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Jitter as a fraction of the computed delay (`0.2` = ±20%).
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 200, max_delay_ms: 5_000, jitter_ratio: 0.2 }
    }
}

impl RetryPolicy {
    /// Deterministic delay for attempt `n` (1-based):
    /// `min(max_delay, base * 2^(n-1))`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(32);
        let raw = self.base_delay_ms.saturating_mul(1u64 << shift);
        raw.min(self.max_delay_ms)
    }

    /// Delay for attempt `n` jittered by `±jitter_ratio * delay`.
    pub fn jittered_delay_ms(&self, attempt: u32) -> u64 {
        let delay = self.delay_ms(attempt) as f64;
        let spread = delay * self.jitter_ratio;
        let jitter = fastrand::f64() * 2.0 * spread - spread;
        (delay + jitter).max(0.0) as u64
    }
}

/// Shared retryability rules: explicit marks, rate limits, server errors,
/// and timeouts retry; everything else is terminal.
pub fn is_retryable(error: &ToolExecutionError) -> bool {
    if error.retryable {
        return true;
    }
    if error.code == "HTTP_429" {
        return true;
    }
    if error.code.starts_with("HTTP_5") {
        return true;
    }
    error.message.to_ascii_lowercase().contains("timeout")
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
