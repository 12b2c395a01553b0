use thiserror::Error;

/// Errors raised by the wrapper itself.
///
/// Failures of the wrapped command are never represented here: its exit code
/// and stderr are reported as-is. Inference failures are not represented here
/// either; see [`InferenceFailure`](crate::core::InferenceFailure).
#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required setting '{key}'")]
    MissingSetting {
        key: &'static str,
        env_var: &'static str,
    },

    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to start command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Async task error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an invalid setting error
    pub fn invalid_setting<V: Into<String>, R: Into<String>>(
        key: &'static str,
        value: V,
        reason: R,
    ) -> Self {
        Self::InvalidSetting {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that must stop the wrapper before any command is spawned
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingSetting { .. } | Self::InvalidSetting { .. })
    }
}

/// Convenient result type for the library
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_missing_setting_display_names_the_key() {
        let err = Error::MissingSetting {
            key: "bedrock.region",
            env_var: "TERN_BEDROCK_REGION",
        };
        assert_eq!(err.to_string(), "missing required setting 'bedrock.region'");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_setting_helper() {
        let err = Error::invalid_setting("limits.max_lines", "lots", "expected an integer");
        match &err {
            Error::InvalidSetting { key, value, reason } => {
                assert_eq!(*key, "limits.max_lines");
                assert_eq!(value, "lots");
                assert_eq!(reason, "expected an integer");
            }
            _ => panic!("Expected InvalidSetting error"),
        }
        assert!(err.is_configuration());
    }

    #[test]
    fn test_runtime_errors_are_not_configuration() {
        let spawn = Error::Spawn(io::Error::new(io::ErrorKind::NotFound, "no sh"));
        assert!(!spawn.is_configuration());
        assert!(spawn.to_string().contains("failed to start command"));

        let io_err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "closed").into();
        assert!(matches!(io_err, Error::Io(_)));
    }
}
