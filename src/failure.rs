//! Retry policy and classification of generation backend failures.

use crate::agents::GenerationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for transient generation failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Maximum retry attempts after the first call. Default: 2
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear backoff step in seconds. Default: 5
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u32,
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_secs() -> u32 {
    5
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

impl FailurePolicy {
    /// Delay before retry number `attempt` (1-based): `backoff_secs * attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(u64::from(self.backoff_secs) * u64::from(attempt))
    }
}

/// Patterns in process output that indicate a network problem.
pub const NETWORK_ERROR_PATTERN: &str =
    r"(?i)connect|network|ECONNREFUSED|ETIMEDOUT|connection\s+refused|name\s+resolution|DNS|socket";

/// Patterns in process output that indicate throttling or exhausted quota.
pub const RATE_LIMIT_PATTERN: &str =
    r"(?i)rate[\s_-]?limit|too\s+many\s+requests|\b429\b|quota|overloaded|usage\s+limit|credit\s+balance";

/// Patterns in process output that indicate missing or rejected credentials.
pub const AUTH_ERROR_PATTERN: &str =
    r"(?i)not\s+logged\s+in|unauthori[sz]ed|invalid\s+api\s+key|authentication\s+(failed|error|required)|\b401\b";

pub fn is_auth_error(output: &str) -> bool {
    Regex::new(AUTH_ERROR_PATTERN)
        .map(|re| re.is_match(output))
        .unwrap_or(false)
}

pub fn is_network_error(output: &str) -> bool {
    Regex::new(NETWORK_ERROR_PATTERN)
        .map(|re| re.is_match(output))
        .unwrap_or(false)
}

pub fn is_rate_limited(output: &str) -> bool {
    Regex::new(RATE_LIMIT_PATTERN)
        .map(|re| re.is_match(output))
        .unwrap_or(false)
}

/// Maps failed backend output to the generation error taxonomy.
///
/// Throttling wins over everything else. Rejected credentials are a
/// misconfiguration; anything else is reported as unavailable, with a
/// network hint when the output suggests one.
pub fn classify_failure(backend: &str, output: &str) -> GenerationError {
    let excerpt = last_lines(output, 5);
    if is_rate_limited(output) {
        GenerationError::RateLimited(format!("{}: {}", backend, excerpt))
    } else if is_auth_error(output) {
        GenerationError::Misconfigured(format!("{} (credentials): {}", backend, excerpt))
    } else if is_network_error(output) {
        GenerationError::ServiceUnavailable(format!("{} (network): {}", backend, excerpt))
    } else {
        GenerationError::ServiceUnavailable(format!("{}: {}", backend, excerpt))
    }
}

fn last_lines(output: &str, count: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(count);
    let tail = lines.get(start..).unwrap_or_default().join(" | ");
    if tail.is_empty() {
        "no output".to_string()
    } else {
        tail
    }
}
