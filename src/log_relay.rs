//! Relays the native client's diagnostic stream into `tracing`.
//!
//! Native coordination clients write their own log lines to a raw stream
//! in a `...:LEVEL@message` framing. [`LogRelay`] drains such a stream
//! (delivered by the transport integration as a line channel) and
//! re-emits each line through the structured logger, reclassifying two
//! patterns the native client logs at a misleading severity.
//!
//! The relay is an explicit handle owned by the caller; there is no
//! process-wide install state. Dropping the handle without `stop()`
//! leaves the task draining until the sender side closes.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelayLevel {
    Debug,
    Info,
    Warn,
    Error,
}

pub struct LogRelay {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LogRelay {
    /// Spawns the relay task draining `lines`
    pub fn start(lines: UnboundedReceiver<String>) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(relay_loop(lines, cancel.clone()));
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Stops the relay and waits for the task to drain
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn relay_loop(
    mut lines: UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => {
                match line {
                    Some(line) => emit(line.trim()),
                    // sender side closed, nothing more to relay
                    None => break,
                }
            }
        }
    }
}

fn emit(line: &str) {
    if line.is_empty() {
        return;
    }

    match classify(line) {
        Some((RelayLevel::Debug, message)) => debug!(target: "keeper_client::native", "{message}"),
        Some((RelayLevel::Info, message)) => info!(target: "keeper_client::native", "{message}"),
        Some((RelayLevel::Warn, message)) => warn!(target: "keeper_client::native", "{message}"),
        Some((RelayLevel::Error, message)) => error!(target: "keeper_client::native", "{message}"),
        // unframed line, relay verbatim
        None => info!(target: "keeper_client::native", "{line}"),
    }
}

/// Parses the `...:LEVEL@message` framing and applies the severity
/// corrections for two known-noisy native messages.
pub(crate) fn classify(line: &str) -> Option<(RelayLevel, &str)> {
    let (prefix, message) = line.split_once('@')?;
    let level_token = prefix.rsplit(':').next().unwrap_or("");

    let mut level = match level_token {
        "ZOO_DEBUG" => RelayLevel::Debug,
        "ZOO_INFO" => RelayLevel::Info,
        "ZOO_WARN" => RelayLevel::Warn,
        "ZOO_ERROR" => RelayLevel::Error,
        _ => return None,
    };

    // this line is definitely misclassified in the native client
    if level == RelayLevel::Warn && message.contains("Exceeded deadline by") {
        level = RelayLevel::Debug;
    }

    // failed server connection attempts are routine during reconnects
    if level == RelayLevel::Error && message.contains("server refused to accept the client") {
        level = RelayLevel::Info;
    }

    Some((level, message))
}
