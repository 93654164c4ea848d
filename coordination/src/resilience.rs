//! Resilience — primary/fallback tiers and backend health.
//!
//! Both networked components follow the same two-tier shape:
//!
//! ```text
//! component call
//!   ├─ primary backend Ok(..)  → result tagged ResultSource::Primary
//!   └─ primary backend Err(..) → deterministic fallback, ResultSource::Fallback
//! ```
//!
//! The primary call is always a `BackendResult<T>`; no error crosses the
//! component boundary. [`BackendHealth`] tracks each backend's recent
//! behaviour so operators can see degradation without reading logs.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// The networked backend answered with a usable result.
    Primary,
    /// The backend failed; the deterministic rule engine answered.
    Fallback,
}

impl ResultSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// How much of a backend's capability is currently available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DegradationLevel {
    /// Last call succeeded.
    Full,
    /// Recent failures; fallbacks are being served.
    Partial,
    /// Three or more consecutive failures.
    Unavailable,
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Partial => write!(f, "partial"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Health of a completion or search backend, tracked over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    /// Backend identifier.
    pub backend: String,
    /// Current degradation level.
    pub level: DegradationLevel,
    /// Consecutive successes since last failure.
    pub consecutive_successes: u32,
    /// Consecutive failures since last success.
    pub consecutive_failures: u32,
    /// Total primary calls made.
    pub total_calls: u64,
    /// Total failed primary calls.
    pub total_failures: u64,
    /// Last observed error message.
    pub last_error: Option<String>,
    /// When the level last changed.
    pub last_change: DateTime<Utc>,
}

impl BackendHealth {
    pub fn new(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            level: DegradationLevel::Full,
            consecutive_successes: 0,
            consecutive_failures: 0,
            total_calls: 0,
            total_failures: 0,
            last_error: None,
            last_change: Utc::now(),
        }
    }

    /// Record a successful primary call.
    pub fn record_success(&mut self) {
        self.total_calls += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;

        // Recover from degraded state after 3 consecutive successes
        if self.level != DegradationLevel::Full && self.consecutive_successes >= 3 {
            self.level = DegradationLevel::Full;
            self.last_change = Utc::now();
            self.last_error = None;
        }
    }

    /// Record a failed primary call.
    pub fn record_failure(&mut self, error: &BackendError) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_error = Some(error.to_string());

        let new_level = if self.consecutive_failures >= 3 {
            DegradationLevel::Unavailable
        } else {
            DegradationLevel::Partial
        };

        if new_level != self.level {
            self.level = new_level;
            self.last_change = Utc::now();
        }
    }

    /// Failure rate as a fraction (0.0–1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_calls as f64
        }
    }
}

/// Run a backend future under a timeout. Elapsed time is reported as
/// [`BackendError::Timeout`] so callers treat it like any other backend error.
pub async fn call_with_timeout<T, F>(timeout: Duration, call: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout)),
    }
}
