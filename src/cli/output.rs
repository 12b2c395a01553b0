//! Report rendering. Commentary goes to stdout after the command's own
//! output; failures go to stderr so they never mix with piped data.

use crate::core::{CommandResult, FailureKind, InferenceFailure, InferenceOutcome};
use crate::runtime::wrapper::RunReport;
use colored::Colorize;
use std::io::{self, Write};

/// Width of the `=` rules around the analysis block
pub const RULE_WIDTH: usize = 60;

/// Write `report` to the given sinks; skipped runs write nothing
pub fn write_report<O: Write, E: Write>(report: &RunReport, out: &mut O, err: &mut E) -> io::Result<()> {
    match &report.outcome {
        InferenceOutcome::Success { text } => {
            out.write_all(render_analysis(&report.result, text).as_bytes())?;
            out.flush()
        }
        InferenceOutcome::Failure(failure) => {
            err.write_all(render_failure(failure).as_bytes())?;
            err.flush()
        }
        InferenceOutcome::Skipped { .. } => Ok(()),
    }
}

/// Write `report` to the process's stdout and stderr
pub fn print_report(report: &RunReport) -> io::Result<()> {
    write_report(report, &mut io::stdout().lock(), &mut io::stderr().lock())
}

/// The commentary block shown after a successful analysis
pub fn render_analysis(result: &CommandResult, text: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut block = format!(
        "\n{}\n{}\n{}\n",
        rule,
        "TERN AI Analysis:".bold().cyan(),
        text.trim_end()
    );
    if result.truncated {
        block.push_str(&format!(
            "\n{}\n",
            "(Note: output was long; only its most recent part was analyzed)".dimmed()
        ));
    }
    if result.partial_capture {
        block.push_str(&format!(
            "{}\n",
            "(Note: output capture ended early; the analysis may be incomplete)".dimmed()
        ));
    }
    block.push_str(&rule);
    block.push('\n');
    block
}

/// The stderr lines for a failed analysis
pub fn render_failure(failure: &InferenceFailure) -> String {
    format!(
        "tern: AI analysis failed ({}): {}\ntern: {}\n",
        failure.kind,
        failure.message,
        hint(failure.kind)
    )
}

/// What the user can do about each kind of failure
pub fn hint(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::AccessDenied => {
            "check that AWS_BEARER_TOKEN_BEDROCK is set and grants bedrock:InvokeModel on this model"
        }
        FailureKind::ModelNotFound => {
            "check bedrock.model_id and that the model is enabled in bedrock.region"
        }
        FailureKind::ExpiredCredentials => {
            "your Bedrock API key has expired; generate a new one and export AWS_BEARER_TOKEN_BEDROCK"
        }
        FailureKind::ConnectionError => {
            "could not reach Bedrock; check your network and bedrock.region (or bedrock.endpoint)"
        }
        FailureKind::Timeout => {
            "the model did not answer in time; raise bedrock.timeout or TERN_BEDROCK_TIMEOUT"
        }
        FailureKind::Unclassified => "rerun with --debug for details",
    }
}
