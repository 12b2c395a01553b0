//! Types shared by the capture engine, the inference client and the CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::{BedrockSettings, Config, Limits};
pub use error::{Error, Result};
pub use types::{
    CommandResult, FailureKind, InferenceFailure, InferenceOutcome, SkipReason, StreamName,
};
