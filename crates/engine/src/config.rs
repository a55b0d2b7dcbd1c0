// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration from the environment.

use std::env;

/// Database DSN fallback when neither env var is set (single-process local
/// development against the in-memory store).
pub const DEFAULT_DATABASE_URL: &str = "local";

pub const DEFAULT_STEP_LIMIT: u32 = 16;
pub const DEFAULT_MEMORY_LIMIT: usize = 64;
pub const DEFAULT_EXECUTE_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_LEASE_MS: u64 = 30_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Worker and loop tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Resolved in priority `AGENT_DATABASE_URL > DATABASE_URL > local`.
    pub database_url: String,
    /// `SHORT_TERM_STEP_LIMIT`
    pub max_steps: u32,
    /// `LONG_TERM_MEMORY_LIMIT`
    pub memory_limit: usize,
    pub execute_timeout_ms: u64,
    pub lease_ms: u64,
    pub max_attempts: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_steps: DEFAULT_STEP_LIMIT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            execute_timeout_ms: DEFAULT_EXECUTE_TIMEOUT_MS,
            lease_ms: DEFAULT_LEASE_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("AGENT_DATABASE_URL")
                .or_else(|_| env::var("DATABASE_URL"))
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            max_steps: parsed("SHORT_TERM_STEP_LIMIT", DEFAULT_STEP_LIMIT),
            memory_limit: parsed("LONG_TERM_MEMORY_LIMIT", DEFAULT_MEMORY_LIMIT),
            execute_timeout_ms: parsed("EXECUTE_TIMEOUT_MS", DEFAULT_EXECUTE_TIMEOUT_MS),
            lease_ms: parsed("LEASE_MS", DEFAULT_LEASE_MS),
            max_attempts: parsed("MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
        }
    }
}

fn parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "unparseable env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
