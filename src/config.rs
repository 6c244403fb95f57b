// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Bench Configuration
 * Defaults plus environment overrides, validated before startup
 *
 * @copyright 2025 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::assign::AssignmentPolicy;
use crate::errors::{BenchError, BenchResult};
use crate::path::DEFAULT_MAX_AUTO_INDEX;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,

    pub store: StoreConfig,

    pub helper: HelperConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,

    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    #[serde(default = "default_true")]
    pub graceful_shutdown: bool,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    #[serde(default)]
    pub assignment_policy: AssignmentPolicy,

    #[validate(range(min = 1, max = 1000000))]
    #[serde(default = "default_max_auto_index")]
    pub max_auto_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HelperConfig {
    #[validate(length(min = 1))]
    #[serde(default = "default_helper_command")]
    pub command: String,

    #[serde(default = "default_helper_args")]
    pub args: Vec<String>,

    #[validate(range(min = 100, max = 600000))]
    #[serde(default = "default_helper_timeout")]
    pub timeout_ms: u64,

    #[validate(range(min = 1, max = 64))]
    #[serde(default = "default_helper_concurrency")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_auto_index() -> usize {
    DEFAULT_MAX_AUTO_INDEX
}

fn default_helper_command() -> String {
    "date".to_string()
}

fn default_helper_args() -> Vec<String> {
    vec!["-u".to_string()]
}

fn default_helper_timeout() -> u64 {
    5000
}

fn default_helper_concurrency() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn create_default_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 10200,
            graceful_shutdown: true,
            shutdown_timeout_secs: default_shutdown_timeout(),
        },
        store: StoreConfig {
            assignment_policy: AssignmentPolicy::default(),
            max_auto_index: default_max_auto_index(),
        },
        helper: HelperConfig {
            command: default_helper_command(),
            args: default_helper_args(),
            timeout_ms: default_helper_timeout(),
            max_concurrent: default_helper_concurrency(),
        },
        observability: ObservabilityConfig::default(),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults
    ///
    /// Supports the following environment variables:
    /// - SERVER_HOST / SERVER_PORT: listen address
    /// - ASSIGNMENT_POLICY: `hardened` (default) or `unsafe`
    /// - MAX_AUTO_INDEX: array auto-extension cap
    /// - TIME_HELPER_CMD: helper command line, whitespace-separated
    /// - TIME_HELPER_TIMEOUT_MS / TIME_HELPER_MAX_CONCURRENT: helper bounds
    /// - LOG_LEVEL: tracing filter when RUST_LOG is unset
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = create_default_config();

        if let Ok(host) = std::env::var("SERVER_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid SERVER_PORT value"))?;
        }

        if let Ok(policy) = std::env::var("ASSIGNMENT_POLICY") {
            config.store.assignment_policy = policy
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
        }

        if let Ok(cap) = std::env::var("MAX_AUTO_INDEX") {
            config.store.max_auto_index = cap
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid MAX_AUTO_INDEX value"))?;
        }

        if let Ok(cmdline) = std::env::var("TIME_HELPER_CMD") {
            let mut parts = cmdline.split_whitespace().map(str::to_string);
            match parts.next() {
                Some(command) => {
                    config.helper.command = command;
                    config.helper.args = parts.collect();
                }
                None => return Err(anyhow::anyhow!("Empty TIME_HELPER_CMD value")),
            }
        }

        if let Ok(timeout) = std::env::var("TIME_HELPER_TIMEOUT_MS") {
            config.helper.timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid TIME_HELPER_TIMEOUT_MS value"))?;
        }

        if let Ok(concurrency) = std::env::var("TIME_HELPER_MAX_CONCURRENT") {
            config.helper.max_concurrent = concurrency
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid TIME_HELPER_MAX_CONCURRENT value"))?;
        }

        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            config.observability.log_level = log_level;
        }

        Ok(config)
    }

    /// Validate every section, naming the offending one
    pub fn validate_all(&self) -> BenchResult<()> {
        let sections: [(&str, Result<(), validator::ValidationErrors>); 3] = [
            ("server", self.server.validate()),
            ("store", self.store.validate()),
            ("helper", self.helper.validate()),
        ];
        for (section, result) in sections {
            result.map_err(|e| BenchError::Configuration(format!("{}: {}", section, e)))?;
        }
        Ok(())
    }
}
