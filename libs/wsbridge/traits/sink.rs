use std::io::Write;
use tracing::{info, warn};

/// Receiver of rendered commands
///
/// This is the host's command-execution facade. The bridge hands over each
/// command as an opaque string and never observes the outcome; whatever
/// parsing or permission model the host applies is its own business.
///
/// Dispatch always happens on the cooperative scheduler context, so
/// implementations see one call at a time.
///
/// # Example
///
/// ```ignore
/// struct ConsoleSink {
///     console: Arc<Mutex<ServerConsole>>,
/// }
///
/// impl CommandSink for ConsoleSink {
///     fn dispatch(&self, command: &str) {
///         self.console.lock().execute(command);
///     }
/// }
/// ```
pub trait CommandSink: Send + Sync + 'static {
    /// Execute (or forward) one command
    fn dispatch(&self, command: &str);
}

/// Writes each command as a line on stdout
///
/// Lets the bridge feed a host console through a pipe:
/// `wss-to-command | server-console`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl CommandSink for StdoutSink {
    fn dispatch(&self, command: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", command).and_then(|_| stdout.flush()) {
            warn!("Failed to write command to stdout: {}", e);
        }
    }
}

/// Only logs each command
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl CommandSink for LogSink {
    fn dispatch(&self, command: &str) {
        info!("Dispatching command: {}", command);
    }
}
