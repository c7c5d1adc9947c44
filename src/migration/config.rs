// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Configuration for migration runs.

use std::time::Duration;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Tuning knobs for the orchestrator and per-key migrators.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Maximum records migrated concurrently.
    pub concurrency_limit: usize,
    /// Upper bound for any single provider or store call.
    pub step_timeout: Duration,
    /// Overall deadline; the run is cancelled cooperatively when it passes.
    pub run_timeout: Option<Duration>,
    /// Key generation attempts per record, including the first.
    pub generation_attempts: u32,
    /// Base backoff between generation attempts; doubles per retry.
    pub retry_backoff: Duration,
    /// Records fetched per scan page.
    pub scan_page_size: usize,
    /// Service name attached to audit events.
    pub service_name: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 32,
            step_timeout: Duration::from_secs(30),
            run_timeout: None,
            generation_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            scan_page_size: 256,
            service_name: "keymigrate".to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn with_generation_attempts(mut self, attempts: u32) -> Self {
        self.generation_attempts = attempts;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_scan_page_size(mut self, size: usize) -> Self {
        self.scan_page_size = size;
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_backoff.saturating_mul(factor)
    }

    /// Rejects settings that would stall a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Zero {
                field: "concurrency_limit",
            });
        }
        if self.generation_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "generation_attempts",
            });
        }
        if self.scan_page_size == 0 {
            return Err(ConfigError::Zero {
                field: "scan_page_size",
            });
        }
        if self.step_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "step_timeout",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MigrationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency_limit, 32);
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert_eq!(
            MigrationConfig::default()
                .with_concurrency_limit(0)
                .validate(),
            Err(ConfigError::Zero {
                field: "concurrency_limit"
            })
        );
        assert!(MigrationConfig::default()
            .with_generation_attempts(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_backoff_doubles() {
        let config = MigrationConfig::default().with_retry_backoff(Duration::from_millis(10));
        assert_eq!(config.backoff_for(1), Duration::from_millis(10));
        assert_eq!(config.backoff_for(2), Duration::from_millis(20));
        assert_eq!(config.backoff_for(3), Duration::from_millis(40));
        assert_eq!(config.backoff_for(64), Duration::from_millis(10) * u32::MAX);
    }
}
