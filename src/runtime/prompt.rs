//! Prompt text for one finished command.

use crate::core::CommandResult;

const INSTRUCTIONS: &str = "Analyze this command output. Provide helpful commentary about what \
happened, explain any errors, and suggest improvements or best practices where relevant. \
Be concise and practical.";

/// Build the prompt sent to the model for one command run
pub fn build_prompt(result: &CommandResult) -> String {
    let output = non_empty_or(&result.stdout_excerpt, "(no output)");
    let errors = non_empty_or(&result.stderr_excerpt, "(no errors)");

    let mut prompt = format!(
        "{INSTRUCTIONS}\n\nCommand: `{}`\nReturn Code: {}\n\nOutput:\n```\n{}\n```\n\nErrors:\n```\n{}\n```",
        result.command,
        result.exit_code,
        output.trim_end_matches('\n'),
        errors.trim_end_matches('\n'),
    );
    if result.truncated {
        prompt.push_str("\n\nNote: only the most recent part of the output is shown.");
    }
    prompt
}

fn non_empty_or<'a>(text: &'a str, placeholder: &'a str) -> &'a str {
    if text.is_empty() {
        placeholder
    } else {
        text
    }
}
