//! Decides, once and before spawning, whether analysis can run at all.

use std::io::IsTerminal;

/// Where the wrapper's own stdout goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdoutMode {
    /// A terminal or a regular file
    Direct,
    /// A pipe (or socket) into another process
    Piped,
}

impl StdoutMode {
    /// Inspect the current process's stdout
    pub fn detect() -> Self {
        if stdout_is_pipe() {
            Self::Piped
        } else {
            Self::Direct
        }
    }

    pub fn is_piped(&self) -> bool {
        matches!(self, Self::Piped)
    }
}

#[cfg(unix)]
fn stdout_is_pipe() -> bool {
    use std::os::fd::AsFd;

    let stdout = std::io::stdout();
    if stdout.is_terminal() {
        return false;
    }
    is_pipe(stdout.as_fd()).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "could not inspect stdout");
        false
    })
}

/// FIFO or socket: the descriptor feeds another process
#[cfg(unix)]
fn is_pipe(fd: std::os::fd::BorrowedFd<'_>) -> std::io::Result<bool> {
    use std::os::unix::fs::FileTypeExt;

    let file = std::fs::File::from(fd.try_clone_to_owned()?);
    let kind = file.metadata()?.file_type();
    Ok(kind.is_fifo() || kind.is_socket())
}

#[cfg(not(unix))]
fn stdout_is_pipe() -> bool {
    !std::io::stdout().is_terminal()
}

/// The one-line advisory printed to stderr when stdout is piped
pub fn piped_warning(command: &str) -> String {
    let mut suggestion = format!("tern '{} | ...'", command);
    if suggestion.chars().count() > 60 {
        let head: String = command.chars().take(40).collect();
        suggestion = format!("tern '{}... | ...'", head);
    }
    format!(
        "tern: output is piped, AI analysis disabled. To analyze the whole pipeline use: {}",
        suggestion
    )
}
