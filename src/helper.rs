// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Time Helper Executor
 * Runs the external time helper with a bounded pool and a hard timeout
 *
 * Features:
 * - Concurrency bound via semaphore, saturation reported instead of queued
 * - Hard timeout with child cancellation
 * - Typed outcome instead of an unguarded message wait
 *
 * @copyright 2025 Bountyy Oy
 * @license Proprietary
 */

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::debug;

use crate::config::HelperConfig;
use crate::errors::HelperError;

/// Terminal states of one helper run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HelperStatus {
    Success,
    Timeout,
    Failed,
    Saturated,
}

/// Typed result of one helper run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperOutcome {
    pub status: HelperStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub completed_at: String,
}

impl HelperOutcome {
    fn success(message: String, duration_ms: u64) -> Self {
        Self {
            status: HelperStatus::Success,
            message: Some(message),
            error: None,
            duration_ms,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn failure(err: &HelperError, duration_ms: u64) -> Self {
        let status = match err {
            HelperError::Timeout { .. } => HelperStatus::Timeout,
            HelperError::Saturated { .. } => HelperStatus::Saturated,
            _ => HelperStatus::Failed,
        };
        Self {
            status,
            message: None,
            error: Some(err.to_string()),
            duration_ms,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Bounded executor for the time helper command.
///
/// The naive pattern forks one helper per request and waits forever for its
/// first message; a hung helper leaks a process and a pending response. Here
/// each run takes a pool permit up front, is killed at the timeout, and
/// always resolves to a [`HelperOutcome`].
pub struct TimeHelper {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    max_concurrent: usize,
    permits: Arc<Semaphore>,
}

impl TimeHelper {
    pub fn new(config: &HelperConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_concurrent: config.max_concurrent,
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
        }
    }

    /// Run the helper once and report what happened
    pub async fn run(&self) -> HelperOutcome {
        let started = Instant::now();
        match self.run_inner().await {
            Ok(message) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                debug!(duration_ms, "Time helper completed");
                HelperOutcome::success(message, duration_ms)
            }
            Err(err) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                debug!(duration_ms, error = %err, "Time helper run failed");
                HelperOutcome::failure(&err, duration_ms)
            }
        }
    }

    /// First line of helper stdout, treated as an opaque message
    async fn run_inner(&self) -> Result<String, HelperError> {
        let _permit = self
            .permits
            .try_acquire()
            .map_err(|_| HelperError::Saturated {
                max: self.max_concurrent,
            })?;

        let mut cmd = TokioCommand::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the timed-out future must reap the child
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| HelperError::SpawnFailed {
            command: self.command.clone(),
            reason: e.to_string(),
        })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(HelperError::SpawnFailed {
                    command: self.command.clone(),
                    reason: format!("wait failed: {}", e),
                });
            }
            Err(_) => {
                return Err(HelperError::Timeout {
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(HelperError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.lines().next().map(str::trim).unwrap_or("");
        if first_line.is_empty() {
            return Err(HelperError::NoOutput);
        }
        Ok(first_line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper_config(command: &str, args: &[&str], timeout_ms: u64, max_concurrent: usize) -> HelperConfig {
        HelperConfig {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_ms,
            max_concurrent,
        }
    }

    #[tokio::test]
    async fn test_success_returns_first_stdout_line() {
        let helper = TimeHelper::new(&helper_config("echo", &["bench-ok"], 5000, 2));
        let outcome = helper.run().await;

        assert_eq!(outcome.status, HelperStatus::Success);
        assert_eq!(outcome.message.as_deref(), Some("bench-ok"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_multiline_output_is_truncated_to_first_line() {
        let helper = TimeHelper::new(&helper_config("sh", &["-c", "printf 'first\\nsecond\\n'"], 5000, 2));
        let outcome = helper.run().await;

        assert_eq!(outcome.status, HelperStatus::Success);
        assert_eq!(outcome.message.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_timeout_kills_slow_helper() {
        let helper = TimeHelper::new(&helper_config("sleep", &["5"], 100, 2));
        let outcome = helper.run().await;

        assert_eq!(outcome.status, HelperStatus::Timeout);
        assert!(outcome.duration_ms >= 100);
        assert!(outcome.duration_ms < 3000);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_silent_helper_is_a_failure_not_a_hang() {
        let helper = TimeHelper::new(&helper_config("true", &[], 5000, 2));
        let outcome = helper.run().await;

        assert_eq!(outcome.status, HelperStatus::Failed);
        assert!(outcome.error.as_deref().unwrap_or("").contains("without producing output"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_code() {
        let helper = TimeHelper::new(&helper_config("sh", &["-c", "exit 3"], 5000, 2));
        let outcome = helper.run().await;

        assert_eq!(outcome.status, HelperStatus::Failed);
        assert!(outcome.error.as_deref().unwrap_or("").contains('3'));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_cleanly() {
        let helper = TimeHelper::new(&helper_config("definitely-not-a-real-helper", &[], 5000, 2));
        let outcome = helper.run().await;

        assert_eq!(outcome.status, HelperStatus::Failed);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_pool_saturation_is_reported_not_queued() {
        let helper = Arc::new(TimeHelper::new(&helper_config("sleep", &["1"], 5000, 1)));

        let background = {
            let helper = Arc::clone(&helper);
            tokio::spawn(async move { helper.run().await })
        };
        // Give the first run time to take the only permit
        tokio::time::sleep(Duration::from_millis(200)).await;

        let second = helper.run().await;
        assert_eq!(second.status, HelperStatus::Saturated);

        // sleep produces no stdout, so the first run completes as a failure
        let first = background.await.expect("background run panicked");
        assert_eq!(first.status, HelperStatus::Failed);
    }
}
