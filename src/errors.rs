// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Pollution Bench Error Types
 * Error handling with thiserror
 *
 * @copyright 2025 Bountyy Oy
 * @license Proprietary
 */

use std::time::Duration;
use thiserror::Error;

/// Main bench error type
#[derive(Error, Debug)]
pub enum BenchError {
    /// Key path parsing errors
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// Time helper subprocess errors
    #[error("Helper error: {0}")]
    Helper(#[from] HelperError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors produced while parsing a property key path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty key path")]
    Empty,

    #[error("Empty segment at position {position}")]
    EmptySegment { position: usize },

    #[error("Unterminated bracket starting at byte {position}")]
    UnterminatedBracket { position: usize },

    #[error("Empty bracket at byte {position}")]
    EmptyBracket { position: usize },

    #[error("Index {index} exceeds auto-extension cap {max}")]
    IndexOutOfRange { index: usize, max: usize },
}

/// Errors produced by the time helper subprocess
#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Failed to spawn helper '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Helper timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Helper exited without producing output")]
    NoOutput,

    #[error("Helper exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Helper pool saturated: {max} concurrent runs already in flight")]
    Saturated { max: usize },
}

impl HelperError {
    /// Whether the failure consumed the full time budget
    pub fn is_timeout(&self) -> bool {
        matches!(self, HelperError::Timeout { .. })
    }

    /// Whether the caller should retry once the pool drains
    pub fn is_retryable(&self) -> bool {
        matches!(self, HelperError::Saturated { .. } | HelperError::Timeout { .. })
    }
}

/// Result type for bench operations
pub type BenchResult<T> = Result<T, BenchError>;
