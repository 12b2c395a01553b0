//! Argument parsing and the top-level run: config, validation, wrapped
//! command, report.

use crate::cli::config::ConfigLoader;
use crate::cli::error::{CliError, Result};
use crate::cli::{output, Logging};
use crate::runtime::client::BedrockClient;
use crate::runtime::detect::StdoutMode;
use crate::runtime::wrapper::{CommandWrapper, Invocation};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::debug;

/// Flags from older releases that are accepted and ignored
const LEGACY_FLAGS: &[&str] = &["--ai-verbose", "--ai-summary"];

/// Run a command unchanged, then explain its output with AI
#[derive(Parser, Debug)]
#[command(name = "tern", author, version, about, long_about = None)]
#[command(
    after_help = "Quote the command to wrap a whole pipeline: tern 'make 2>&1 | tail -n 50'"
)]
pub struct Cli {
    /// Run the command without AI analysis
    #[arg(long)]
    pub no_ai: bool,

    /// Config file (defaults to $TERN_CONFIG, then ~/.tern.conf)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long)]
    pub debug: bool,

    /// Print a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,

    /// The command to run, passed to the shell as one string
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// The command string and analysis switch, after flag cleanup
    ///
    /// `--no-ai` is honoured anywhere among the command words; legacy
    /// analysis flags are dropped.
    pub fn invocation(&self) -> Result<Invocation> {
        let mut no_ai = self.no_ai;
        let words: Vec<&str> = self
            .command
            .iter()
            .map(String::as_str)
            .filter(|word| {
                if *word == "--no-ai" {
                    no_ai = true;
                    false
                } else {
                    !LEGACY_FLAGS.contains(word)
                }
            })
            .collect();

        let command = words.join(" ");
        if command.trim().is_empty() {
            return Err(CliError::NoCommand);
        }
        let mut invocation = Invocation::new(command);
        invocation.no_ai = no_ai;
        Ok(invocation)
    }

    /// Run the wrapped command and return the exit code to leave with
    pub async fn execute(self, logging: &Logging) -> Result<i32> {
        if let Some(shell) = self.completions {
            generate_completion(shell);
            return Ok(0);
        }

        let invocation = self.invocation()?;
        let loader = ConfigLoader::new()
            .file(self.config.clone())
            .debug(self.debug);
        let loaded = loader
            .load()
            .map_err(|e| CliError::setting(e, loader.path()))?;
        if loaded.config.debug {
            logging.enable_debug();
        }
        debug!(path = %loaded.path.display(), "configuration loaded");

        // Fatal before anything is spawned, even for runs that skip analysis
        loaded
            .config
            .validate()
            .map_err(|e| CliError::setting(e, &loaded.path))?;
        let mode = StdoutMode::detect();

        let backend = BedrockClient::builder().config(&loaded.config).build()?;
        let wrapper = CommandWrapper::new(loaded.config, backend);
        let (report, _, _) = wrapper
            .run_with(invocation, mode, tokio::io::stdout(), tokio::io::stderr())
            .await?;

        if let Err(e) = output::print_report(&report) {
            debug!(error = %e, "could not print report");
        }
        Ok(report.result.exit_code)
    }

    /// Usage line shown when no command is given
    pub fn usage() -> String {
        Self::command().render_usage().to_string()
    }
}

/// Generate shell completion script
fn generate_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
