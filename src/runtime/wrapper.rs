//! Runs one invocation end to end: pipe warning, supervised command,
//! excerpts, then at most one analysis call.

use crate::core::error::Result;
use crate::core::{CommandResult, Config, InferenceOutcome, SkipReason};
use crate::runtime::analyzer::{gate, Analyzer};
use crate::runtime::client::InferenceBackend;
use crate::runtime::detect::{piped_warning, StdoutMode};
use crate::runtime::excerpt::Excerpt;
use crate::runtime::supervisor::{ProcessOutput, Supervisor};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// A command to wrap, as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub no_ai: bool,
}

impl Invocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            no_ai: false,
        }
    }

    /// Run the command without analysis
    pub fn without_analysis(mut self) -> Self {
        self.no_ai = true;
        self
    }
}

/// What one run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub result: CommandResult,
    pub outcome: InferenceOutcome,
}

/// Runs a command transparently and analyzes its output afterwards
pub struct CommandWrapper<B> {
    config: Arc<Config>,
    analyzer: Analyzer<B>,
}

impl<B: InferenceBackend> CommandWrapper<B> {
    /// Create a wrapper; `config` should already be validated
    pub fn new(config: Config, backend: B) -> Self {
        let config = Arc::new(config);
        Self {
            analyzer: Analyzer::new(backend, Arc::clone(&config)),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyzer(&self) -> &Analyzer<B> {
        &self.analyzer
    }

    /// Run against the process's own stdout and stderr
    ///
    /// # Errors
    ///
    /// Only fails if the shell cannot be spawned or a stream task panics.
    pub async fn run(&self, invocation: Invocation) -> Result<RunReport> {
        let (report, _, _) = self
            .run_with(
                invocation,
                StdoutMode::detect(),
                tokio::io::stdout(),
                tokio::io::stderr(),
            )
            .await?;
        Ok(report)
    }

    /// Run with explicit sinks and stdout mode; the sinks are handed back
    pub async fn run_with<O, E>(
        &self,
        invocation: Invocation,
        mode: StdoutMode,
        out: O,
        err: E,
    ) -> Result<(RunReport, O, E)>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.execute(run_id, invocation, mode, out, err)
            .instrument(span)
            .await
    }

    async fn execute<O, E>(
        &self,
        run_id: Uuid,
        invocation: Invocation,
        mode: StdoutMode,
        out: O,
        mut err: E,
    ) -> Result<(RunReport, O, E)>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let skip = gate(invocation.no_ai, mode);
        debug!(command = %invocation.command, ?mode, ?skip, "starting");

        // Every piped run warns, whether or not analysis was also disabled
        if mode.is_piped() {
            let line = format!("{}\n", piped_warning(&invocation.command));
            // The command must still run even if stderr is gone
            if let Err(e) = write_line(&mut err, &line).await {
                debug!(error = %e, "could not write pipe warning");
            }
        }

        let capture = skip.is_none().then_some(self.config.limits.max_lines);
        let (output, out, err) = Supervisor::new(capture)
            .run(&invocation.command, out, err)
            .await?;
        let result = self.command_result(&invocation.command, &output);

        let outcome = match skip {
            Some(reason) => InferenceOutcome::skipped(reason),
            None => self.analyze_interruptible(&result).await,
        };

        let report = RunReport {
            run_id,
            result,
            outcome,
        };
        Ok((report, out, err))
    }

    fn command_result(&self, command: &str, output: &ProcessOutput) -> CommandResult {
        let limits = &self.config.limits;
        let stdout = Excerpt::from_stream(&output.stdout, limits.output_chars);
        let stderr = Excerpt::from_stream(&output.stderr, limits.error_chars);
        CommandResult {
            command: command.to_string(),
            exit_code: output.exit_code,
            truncated: stdout.truncated || stderr.truncated,
            partial_capture: output.stdout.partial || output.stderr.partial,
            stdout_excerpt: stdout.text,
            stderr_excerpt: stderr.text,
            stdout_bytes: output.stdout.bytes,
            stderr_bytes: output.stderr.bytes,
            started_at: output.started_at,
            duration: output.duration,
        }
    }

    /// Ctrl-C while waiting on the model abandons the call, not the run
    async fn analyze_interruptible(&self, result: &CommandResult) -> InferenceOutcome {
        tokio::select! {
            outcome = self.analyzer.analyze(result) => outcome,
            Ok(()) = tokio::signal::ctrl_c() => {
                debug!("analysis interrupted");
                InferenceOutcome::skipped(SkipReason::Interrupted)
            }
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
