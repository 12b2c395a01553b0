use crate::core::error::Error;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the `tern` binary before or instead of running a command
#[derive(Error, Debug)]
pub enum CliError {
    #[error("no command given")]
    NoCommand,

    #[error("{source}")]
    Setting {
        #[source]
        source: Error,
        /// The config file that was (or would have been) read
        file: PathBuf,
    },

    #[error("failed to start command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{0}")]
    Wrapper(Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for CliError {
    fn from(err: Error) -> Self {
        match err {
            Error::Spawn(e) => Self::Spawn(e),
            other => Self::Wrapper(other),
        }
    }
}

impl CliError {
    /// Create a configuration error tied to `file`
    pub fn setting(source: Error, file: impl Into<PathBuf>) -> Self {
        Self::Setting {
            source,
            file: file.into(),
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::NoCommand => {
                "no command given. Usage: tern [--no-ai] <command> [args...]".to_string()
            }
            Self::Setting {
                source: Error::MissingSetting { key, env_var },
                file,
            } => {
                let field = key.rsplit('.').next().unwrap_or(*key);
                format!(
                    "missing required setting '{}'. Add `{} = \"...\"` under [bedrock] in {} or set {}.",
                    key,
                    field,
                    file.display(),
                    env_var
                )
            }
            Self::Setting { source, file } => {
                format!("{} (config file: {})", source, file.display())
            }
            Self::Spawn(e) => {
                format!("failed to start the shell: {}. Check that `sh` is installed.", e)
            }
            _ => self.to_string(),
        }
    }
}

/// Convenient result type for the CLI
pub type Result<T> = std::result::Result<T, CliError>;
