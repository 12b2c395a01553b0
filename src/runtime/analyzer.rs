//! Decides whether a run is analyzed and makes the single timed attempt.

use crate::core::{CommandResult, Config, InferenceFailure, InferenceOutcome, SkipReason};
use crate::runtime::client::{InferenceBackend, InferenceRequest};
use crate::runtime::detect::StdoutMode;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Decide before spawning whether analysis may run
pub fn gate(no_ai: bool, mode: StdoutMode) -> Option<SkipReason> {
    if no_ai {
        Some(SkipReason::Disabled)
    } else if mode.is_piped() {
        Some(SkipReason::Piped)
    } else {
        None
    }
}

/// Sends a finished command to the model, at most once per run
pub struct Analyzer<B> {
    backend: B,
    config: Arc<Config>,
}

impl<B: InferenceBackend> Analyzer<B> {
    pub fn new(backend: B, config: Arc<Config>) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Make a single inference attempt bounded by the configured timeout.
    ///
    /// Every failure is folded into the returned outcome; nothing here can
    /// affect the command's exit code.
    pub async fn analyze(&self, result: &CommandResult) -> InferenceOutcome {
        if !result.has_output() {
            debug!("nothing to analyze");
            return InferenceOutcome::skipped(SkipReason::NoOutput);
        }

        let request = InferenceRequest::new(&self.config, result);
        debug!(
            model = %request.model_id,
            region = %request.region,
            timeout_secs = request.timeout.as_secs(),
            prompt_chars = request.prompt.chars().count(),
            "requesting analysis"
        );

        let started = Instant::now();
        let outcome =
            match tokio::time::timeout(request.timeout, self.backend.invoke(&request)).await {
                Ok(Ok(text)) => InferenceOutcome::success(text),
                Ok(Err(failure)) => InferenceOutcome::Failure(failure),
                Err(_) => InferenceOutcome::Failure(InferenceFailure::timeout(request.timeout)),
            };
        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            attempted = outcome.attempted(),
            "analysis finished"
        );
        outcome
    }
}
