//! OS signal handling

use crate::lifecycle::Lifecycle;
use tokio::signal;

/// Turns SIGINT/SIGTERM (or Ctrl+C) into a lifecycle stop
#[derive(Debug)]
pub struct SignalHandler {
    lifecycle: Lifecycle,
}

impl SignalHandler {
    /// Create a new signal handler
    pub fn new(lifecycle: Lifecycle) -> Self {
        Self { lifecycle }
    }

    /// Wait for the first OS signal, then stop the lifecycle
    ///
    /// Returns early without stopping if the lifecycle is stopped by other
    /// means first.
    pub async fn run(self) {
        let stopping = self.lifecycle.stopping();

        tokio::select! {
            _ = stopping.cancelled() => {}
            name = wait_for_signal() => {
                tracing::info!(signal = name, "Received {}", name);
                self.lifecycle.stop();
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Failed to install unix signal handlers, falling back to Ctrl+C");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
