//! # tern
//!
//! Run any shell command exactly as it would run on its own, then append AI
//! commentary about what happened.
//!
//! The command's stdout and stderr are relayed byte-for-byte as they are
//! produced. A bounded tail of each stream is kept in memory and, once the
//! command has exited, sent to an AWS Bedrock model. The wrapper always exits
//! with the command's own exit code; analysis failures are reported on stderr
//! and never change it.
//!
//! ```rust,no_run
//! use tern::{BedrockClient, CommandWrapper, Config, Invocation};
//!
//! # #[tokio::main]
//! # async fn main() -> tern::Result<()> {
//! let mut config = Config::default();
//! config.bedrock.model_id = Some("us.anthropic.claude-sonnet-4-20250514-v1:0".into());
//! config.bedrock.region = Some("us-east-2".into());
//!
//! let backend = BedrockClient::builder().config(&config).build()?;
//! let wrapper = CommandWrapper::new(config, backend);
//! let report = wrapper.run(Invocation::new("terraform plan")).await?;
//! std::process::exit(report.result.exit_code);
//! # }
//! ```

pub mod core;
pub mod runtime;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::core::{
    BedrockSettings, CommandResult, Config, Error, FailureKind, InferenceFailure,
    InferenceOutcome, Limits, Result, SkipReason, StreamName,
};
pub use crate::runtime::{
    analyzer::Analyzer,
    client::{BedrockClient, ClientBuilder, InferenceBackend, InferenceRequest},
    detect::StdoutMode,
    wrapper::{CommandWrapper, Invocation, RunReport},
};
