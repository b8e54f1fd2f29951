//! Retry policy and per-task retry state.
//!
//! The policy decides whether a failure is retryable and how long to back
//! off; the state tracks attempts and the error history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Backoff strategy for failed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Never retry.
    None,
    /// Retry with no delay.
    Immediate,
    /// Delay grows linearly with the attempt number.
    Linear,
    /// Delay doubles each attempt.
    Exponential,
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Immediate => "immediate",
            Self::Linear => "linear",
            Self::Exponential => "exponential",
        };
        f.write_str(s)
    }
}

impl FromStr for RetryStrategy {
    type Err = RetryStrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "immediate" => Ok(Self::Immediate),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            other => Err(RetryStrategyParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RetryStrategy`] string.
#[derive(Debug, Clone)]
pub struct RetryStrategyParseError(pub String);

impl fmt::Display for RetryStrategyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid retry strategy: {:?}", self.0)
    }
}

impl std::error::Error for RetryStrategyParseError {}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for task retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub strategy: RetryStrategy,
    pub max_retries: u32,
    pub base_delay_seconds: f64,
    pub max_delay_seconds: f64,
    /// Substrings that mark an error as retryable. Empty = every error is.
    #[serde(default)]
    pub retry_on_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Exponential,
            max_retries: 3,
            base_delay_seconds: 1.0,
            max_delay_seconds: 60.0,
            retry_on_errors: Vec::new(),
        }
    }
}

impl RetryConfig {
    /// Delay in seconds before the given (1-based) retry attempt.
    ///
    /// `none` and `immediate` yield zero; `linear` is `base * attempt`;
    /// `exponential` is `base * 2^(attempt - 1)`. All delays are clamped to
    /// `max_delay_seconds`.
    pub fn delay(&self, attempt: u32) -> f64 {
        let delay = match self.strategy {
            RetryStrategy::None | RetryStrategy::Immediate => 0.0,
            RetryStrategy::Linear => self.base_delay_seconds * f64::from(attempt),
            RetryStrategy::Exponential => {
                self.base_delay_seconds * 2f64.powi(attempt.saturating_sub(1) as i32)
            }
        };
        delay.min(self.max_delay_seconds)
    }

    /// Check whether an error is retryable under this policy.
    ///
    /// A `none` strategy is never retryable. With an empty
    /// `retry_on_errors` list every error is retryable; otherwise at least
    /// one configured substring must appear in the error text
    /// (case-insensitive). A missing error message is treated as retryable.
    pub fn should_retry(&self, error_message: Option<&str>) -> bool {
        if self.strategy == RetryStrategy::None {
            return false;
        }
        if self.retry_on_errors.is_empty() {
            return true;
        }
        let Some(message) = error_message else {
            return true;
        };
        let lowered = message.to_lowercase();
        self.retry_on_errors
            .iter()
            .any(|needle| lowered.contains(&needle.to_lowercase()))
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// One recorded failure in a task's retry history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Tracks the retry state of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryState {
    pub attempt: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<RetryAttempt>,
}

impl RetryState {
    /// Record a failed attempt, appending to the error history.
    pub fn record_attempt(&mut self, error_message: Option<&str>) {
        self.attempt += 1;
        self.last_error = error_message.map(str::to_owned);
        self.last_attempt_at = Some(Utc::now());
        if let Some(error) = error_message {
            self.errors.push(RetryAttempt {
                attempt: self.attempt,
                error: error.to_owned(),
                timestamp: Utc::now(),
            });
        }
    }

    /// Check whether another retry is allowed under `config`.
    ///
    /// `attempt` counts recorded failures, so a task may be scheduled for
    /// retry up to `max_retries` times: the failure that pushes the counter
    /// past the cap is terminal.
    pub fn can_retry(&self, config: &RetryConfig) -> bool {
        self.attempt <= config.max_retries && config.should_retry(self.last_error.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
