//! Resolved settings handed to the capture engine and inference client.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Upper bound for the inference timeout, in seconds
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Resolved wrapper configuration.
///
/// Built once at startup (defaults, then config file, then environment) and
/// passed explicitly into the capture and inference components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Bedrock model settings
    #[serde(default)]
    pub bedrock: BedrockSettings,

    /// Capture and excerpt bounds
    #[serde(default)]
    pub limits: Limits,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

/// Settings for the Bedrock inference endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedrockSettings {
    /// Model identifier, e.g. `us.anthropic.claude-sonnet-4-20250514-v1:0`
    pub model_id: Option<String>,

    /// AWS region hosting the model
    pub region: Option<String>,

    /// Hard timeout for the inference call in seconds
    #[serde(default = "default_timeout", deserialize_with = "timeout_magnitude")]
    pub timeout: u64,

    /// Base URL override for the runtime endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Maximum tokens the model may generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Bounds applied to captured output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum stdout characters sent for analysis
    #[serde(default = "default_output_chars")]
    pub output_chars: usize,

    /// Maximum stderr characters sent for analysis
    #[serde(default = "default_error_chars")]
    pub error_chars: usize,

    /// Lines retained per stream while the command runs
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bedrock: BedrockSettings::default(),
            limits: Limits::default(),
            debug: false,
        }
    }
}

impl Default for BedrockSettings {
    fn default() -> Self {
        Self {
            model_id: None,
            region: None,
            timeout: default_timeout(),
            endpoint: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            output_chars: default_output_chars(),
            error_chars: default_error_chars(),
            max_lines: default_max_lines(),
        }
    }
}

impl Config {
    /// Clamp values into their supported ranges
    pub fn sanitize(mut self) -> Self {
        self.bedrock.timeout = self.bedrock.timeout.clamp(1, MAX_TIMEOUT_SECS);
        self.limits.max_lines = self.limits.max_lines.max(1);
        self
    }

    /// Check that every required setting is present
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSetting`] for the first absent or blank
    /// required key.
    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.bedrock.model_id) {
            return Err(Error::MissingSetting {
                key: "bedrock.model_id",
                env_var: "TERN_BEDROCK_MODEL_ID",
            });
        }
        if is_blank(&self.bedrock.region) {
            return Err(Error::MissingSetting {
                key: "bedrock.region",
                env_var: "TERN_BEDROCK_REGION",
            });
        }
        Ok(())
    }

    /// Inference timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.bedrock.timeout)
    }

    /// Model identifier, empty if unset
    pub fn model_id(&self) -> &str {
        self.bedrock.model_id.as_deref().unwrap_or_default()
    }

    /// Region, empty if unset
    pub fn region(&self) -> &str {
        self.bedrock.region.as_deref().unwrap_or_default()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Accept a negative timeout and keep its magnitude
fn timeout_magnitude<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    i64::deserialize(deserializer).map(i64::unsigned_abs)
}

// Helper functions for default values
fn default_timeout() -> u64 {
    180
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_output_chars() -> usize {
    15_000
}

fn default_error_chars() -> usize {
    5_000
}

fn default_max_lines() -> usize {
    10_000
}
