use anyhow::Result;
use clap::Parser;
use tern::cli::{Cli, CliError, Logging};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let logging = Logging::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    match cli.execute(&logging).await {
        // Always leave with the wrapped command's own exit code
        Ok(code) => std::process::exit(code),
        Err(e) => {
            debug!("tern failed: {:?}", e);

            eprintln!("tern: {}", e.user_message());
            if matches!(e, CliError::NoCommand) {
                eprint!("{}", Cli::usage());
                eprintln!();
            }
            std::process::exit(1);
        }
    }
}
