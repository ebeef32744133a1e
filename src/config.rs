//! Evaluator configuration.

use std::time::Duration;

/// Tuning knobs for one evaluator.
///
/// `max_concurrency` bounds the worker pool that executes ready nodes;
/// dependency chains are serialized by the ordering guarantee regardless.
/// `deadline`, when set, is measured from the start of each `evaluate` call:
/// nodes not yet claimed when it elapses are reported as timed out, and
/// already-running operations are left to finish.
#[derive(Clone, Debug)]
pub struct EvalConfig {
    pub max_concurrency: usize,
    pub deadline: Option<Duration>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            max_concurrency: parallelism,
            deadline: None,
        }
    }
}

impl EvalConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Build a config from the environment (after loading `.env` if present).
    ///
    /// Recognized variables:
    /// - `CADENZA_MAX_CONCURRENCY`: worker-pool size (positive integer)
    /// - `CADENZA_DEADLINE_MS`: per-evaluation deadline in milliseconds
    ///
    /// Unset or unparsable values fall back to the defaults with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("CADENZA_MAX_CONCURRENCY") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => config.max_concurrency = n,
                _ => tracing::warn!(value = %raw, "ignoring invalid CADENZA_MAX_CONCURRENCY"),
            }
        }
        if let Ok(raw) = std::env::var("CADENZA_DEADLINE_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => config.deadline = Some(Duration::from_millis(ms)),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid CADENZA_DEADLINE_MS"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test covers both the parsed and the fallback paths so the
    // process-global environment is only touched from a single place.
    #[test]
    fn from_env_parses_and_falls_back() {
        unsafe {
            std::env::set_var("CADENZA_MAX_CONCURRENCY", "3");
            std::env::set_var("CADENZA_DEADLINE_MS", "250");
        }
        let parsed = EvalConfig::from_env();
        assert_eq!(parsed.max_concurrency, 3);
        assert_eq!(parsed.deadline, Some(Duration::from_millis(250)));

        unsafe {
            std::env::set_var("CADENZA_MAX_CONCURRENCY", "zero");
            std::env::set_var("CADENZA_DEADLINE_MS", "soon");
        }
        let fallback = EvalConfig::from_env();
        assert_eq!(fallback.max_concurrency, EvalConfig::default().max_concurrency);
        assert_eq!(fallback.deadline, None);

        unsafe {
            std::env::remove_var("CADENZA_MAX_CONCURRENCY");
            std::env::remove_var("CADENZA_DEADLINE_MS");
        }
        let unset = EvalConfig::from_env();
        assert_eq!(unset.deadline, None);
    }
}
