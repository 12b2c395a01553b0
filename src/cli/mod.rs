//! Command-line front end for `tern`.
//!
//! ## Usage
//!
//! ```bash
//! # Run a command and get commentary afterwards
//! tern terraform plan
//!
//! # Wrap a whole pipeline
//! tern 'kubectl get pods | grep -v Running'
//!
//! # Skip analysis
//! tern --no-ai make
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod output;

pub use app::Cli;
pub use error::{CliError, Result};

use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Version information for the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Filter used when the `debug` setting is on
pub const DEBUG_LOG_FILTER: &str = "tern=debug";

/// Handle to the installed log subscriber
pub struct Logging {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
    from_env: bool,
}

impl Logging {
    /// Install a stderr subscriber; stdout belongs to the wrapped command
    pub fn init() -> Self {
        let from_env = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let (filter, handle) = reload::Layer::new(filter);

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
            .is_ok();

        Self {
            handle: installed.then_some(handle),
            from_env,
        }
    }

    /// Switch to debug output unless `RUST_LOG` already chose a filter
    pub fn enable_debug(&self) {
        if self.from_env {
            return;
        }
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.reload(EnvFilter::new(DEBUG_LOG_FILTER)) {
                eprintln!("tern: could not enable debug logging: {}", e);
            }
            debug!("debug logging enabled");
        }
    }
}
