use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which output stream of the wrapped command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

impl StreamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one wrapped command, created once after both streams closed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// The command text as handed to the shell
    pub command: String,
    /// Exit code, or `128 + signal` if the command was killed by a signal
    pub exit_code: i32,
    /// Tail of stdout, at most `limits.output_chars` characters
    pub stdout_excerpt: String,
    /// Tail of stderr, at most `limits.error_chars` characters
    pub stderr_excerpt: String,
    /// True if either stream lost lines or characters to the bounds
    pub truncated: bool,
    /// True if a stream ended on a read or write error
    pub partial_capture: bool,
    /// Bytes observed on stdout
    pub stdout_bytes: u64,
    /// Bytes observed on stderr
    pub stderr_bytes: u64,
    /// When the command was spawned
    pub started_at: DateTime<Utc>,
    /// Wall-clock time until both streams closed
    pub duration: Duration,
}

impl CommandResult {
    /// True if neither stream produced anything worth analyzing
    pub fn has_output(&self) -> bool {
        !self.stdout_excerpt.is_empty() || !self.stderr_excerpt.is_empty()
    }
}

/// Why no inference call was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The wrapper's stdout is a pipe
    Piped,
    /// Analysis was disabled with `--no-ai`
    Disabled,
    /// The command wrote nothing to either stream
    NoOutput,
    /// The user interrupted the analysis call
    Interrupted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Piped => "output is piped",
            Self::Disabled => "analysis disabled",
            Self::NoOutput => "command produced no output",
            Self::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

/// Classified inference failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    AccessDenied,
    ModelNotFound,
    ExpiredCredentials,
    ConnectionError,
    Timeout,
    Unclassified,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::ModelNotFound => "ModelNotFound",
            Self::ExpiredCredentials => "ExpiredCredentials",
            Self::ConnectionError => "ConnectionError",
            Self::Timeout => "Timeout",
            Self::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed inference attempt: a kind plus the provider's message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl InferenceFailure {
    pub fn new<S: Into<String>>(kind: FailureKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("no response within {} seconds", after.as_secs()),
        )
    }
}

impl fmt::Display for InferenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Exactly one of these is produced per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InferenceOutcome {
    Success { text: String },
    Skipped { reason: SkipReason },
    Failure(InferenceFailure),
}

impl InferenceOutcome {
    pub fn success<S: Into<String>>(text: S) -> Self {
        Self::Success { text: text.into() }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    /// True if a request reached (or tried to reach) the endpoint
    pub fn attempted(&self) -> bool {
        !matches!(self, Self::Skipped { .. })
    }
}

impl From<InferenceFailure> for InferenceOutcome {
    fn from(failure: InferenceFailure) -> Self {
        Self::Failure(failure)
    }
}
