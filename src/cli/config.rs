//! Layered configuration: built-in defaults, then the config file, then
//! `TERN_*` environment variables, then command-line flags.

use crate::core::error::{Error, Result};
use crate::core::Config;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "TERN_CONFIG";

/// Config file looked up in the home directory
pub const DEFAULT_FILE_NAME: &str = ".tern.conf";

const ENV_PREFIX: &str = "TERN_";

/// Recognized variables and the setting each one overrides
const ENV_SETTINGS: &[(&str, &str)] = &[
    (CONFIG_PATH_ENV, "config file path"),
    ("TERN_BEDROCK_MODEL_ID", "bedrock.model_id"),
    ("TERN_BEDROCK_REGION", "bedrock.region"),
    ("TERN_BEDROCK_ENDPOINT", "bedrock.endpoint"),
    ("TERN_BEDROCK_TIMEOUT", "bedrock.timeout"),
    ("TERN_LIMITS_OUTPUT_CHARS", "limits.output_chars"),
    ("TERN_LIMITS_ERROR_CHARS", "limits.error_chars"),
    ("TERN_LIMITS_MAX_LINES", "limits.max_lines"),
    ("TERN_DEBUG", "debug"),
];

/// Result of loading: the merged settings and the file they were read from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

/// Resolves a [`Config`] from every layer in precedence order
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: HashMap<String, String>,
    /// `TERN_*` variables whose value is not valid UTF-8
    undecodable: Vec<(String, String)>,
    debug: bool,
}

impl ConfigLoader {
    /// Create a loader reading `TERN_*` variables from the process environment
    pub fn new() -> Self {
        Self::default().with_env_os(std::env::vars_os())
    }

    /// Replace the environment layer
    pub fn with_env<I, K, V>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_env_os(
            vars.into_iter()
                .map(|(k, v)| (OsString::from(k.into()), OsString::from(v.into()))),
        )
    }

    /// Replace the environment layer from raw OS strings.
    ///
    /// Variables outside the `TERN_` namespace are never decoded, so foreign
    /// non-UTF-8 values cannot affect loading.
    pub fn with_env_os<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        self.env.clear();
        self.undecodable.clear();
        for (key, value) in vars {
            let Some(key) = key.to_str().filter(|k| k.starts_with(ENV_PREFIX)) else {
                continue;
            };
            match value.into_string() {
                Ok(value) => {
                    self.env.insert(key.to_string(), value);
                }
                Err(raw) => {
                    self.undecodable
                        .push((key.to_string(), raw.to_string_lossy().into_owned()));
                }
            }
        }
        self
    }

    /// Read this file instead of the default location
    pub fn file(mut self, path: Option<PathBuf>) -> Self {
        self.file = path;
        self
    }

    /// Force debug logging on (the `--debug` flag)
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The file that will be read: `--config`, then `TERN_CONFIG`, then `~/.tern.conf`
    pub fn path(&self) -> PathBuf {
        if let Some(path) = &self.file {
            return path.clone();
        }
        if let Some(path) = self.var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        default_path()
    }

    /// Merge all layers.
    ///
    /// A missing, unreadable or unparseable file only produces a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] if a numeric or boolean environment
    /// variable cannot be parsed. Required keys are not checked here; see
    /// [`Config::validate`].
    pub fn load(&self) -> Result<LoadedConfig> {
        if let Some((name, value)) = self.undecodable.first() {
            let key = ENV_SETTINGS
                .iter()
                .find(|(var, _)| *var == name.as_str())
                .map_or("environment", |(_, key)| *key);
            return Err(Error::invalid_setting(
                key,
                value.as_str(),
                format!("{} is not valid UTF-8", name),
            ));
        }
        let path = self.path();
        let mut config = read_file(&path).unwrap_or_default();
        self.apply_env(&mut config)?;
        if self.debug {
            config.debug = true;
        }
        Ok(LoadedConfig {
            config: config.sanitize(),
            path,
        })
    }

    fn apply_env(&self, config: &mut Config) -> Result<()> {
        if let Some(v) = self.var("TERN_BEDROCK_MODEL_ID") {
            config.bedrock.model_id = Some(v.to_string());
        }
        if let Some(v) = self.var("TERN_BEDROCK_REGION") {
            config.bedrock.region = Some(v.to_string());
        }
        if let Some(v) = self.var("TERN_BEDROCK_ENDPOINT") {
            config.bedrock.endpoint = Some(v.to_string());
        }
        if let Some(v) = self.var("TERN_BEDROCK_TIMEOUT") {
            config.bedrock.timeout = parse_timeout(v)?;
        }
        if let Some(v) = self.var("TERN_LIMITS_OUTPUT_CHARS") {
            config.limits.output_chars = parse_number("limits.output_chars", v)?;
        }
        if let Some(v) = self.var("TERN_LIMITS_ERROR_CHARS") {
            config.limits.error_chars = parse_number("limits.error_chars", v)?;
        }
        if let Some(v) = self.var("TERN_LIMITS_MAX_LINES") {
            config.limits.max_lines = parse_number("limits.max_lines", v)?;
        }
        if let Some(v) = self.var("TERN_DEBUG") {
            config.debug = parse_bool("debug", v)?;
        }
        Ok(())
    }

    /// A set, non-blank variable
    fn var(&self, name: &str) -> Option<&str> {
        self.env
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// `~/.tern.conf`, or `./.tern.conf` when there is no home directory
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_FILE_NAME)
}

/// Parse a config file as JSON, falling back to TOML
fn read_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("could not read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<Config>(&content) {
        Ok(config) => return Some(config),
        Err(e) => debug!(error = %e, "config file is not JSON"),
    }
    match toml::from_str::<Config>(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(
                "ignoring config file {}: not valid JSON or TOML ({})",
                path.display(),
                e.message()
            );
            None
        }
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid_setting(key, value, "expected a non-negative integer"))
}

/// Negative timeouts are taken by magnitude, as in the config file
fn parse_timeout(value: &str) -> Result<u64> {
    value
        .parse::<i64>()
        .map(i64::unsigned_abs)
        .map_err(|_| Error::invalid_setting("bedrock.timeout", value, "expected an integer"))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_setting(key, value, "expected true or false")),
    }
}
