//! Startup and shutdown signals shared by every plugin instance
//!
//! A [`Lifecycle`] carries two one-way switches: the input side becoming
//! ready, which gates the first bind attempt, and the stop signal, which is
//! the only way to cancel anything.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Startup-ready and stop signals
#[derive(Debug, Clone)]
pub struct Lifecycle {
    ready: Arc<watch::Sender<bool>>,
    stopping: CancellationToken,
}

impl Lifecycle {
    /// Create a lifecycle that is neither ready nor stopping
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            ready: Arc::new(ready),
            stopping: CancellationToken::new(),
        }
    }

    /// Gate that opens once [`Lifecycle::mark_ready`] is called
    pub fn ready_gate(&self) -> ReadyGate {
        ReadyGate {
            rx: self.ready.subscribe(),
        }
    }

    /// Open every ready gate
    pub fn mark_ready(&self) {
        if !self.ready.send_replace(true) {
            tracing::debug!("Input side ready");
        }
    }

    /// Whether the ready gate is open
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Request shutdown; safe to call any number of times from any state
    pub fn stop(&self) {
        if !self.stopping.is_cancelled() {
            tracing::info!("Stop signal triggered");
            self.stopping.cancel();
        }
    }

    /// Whether shutdown was requested
    pub fn is_stopping(&self) -> bool {
        self.stopping.is_cancelled()
    }

    /// Token that is cancelled when shutdown is requested
    pub fn stopping(&self) -> CancellationToken {
        self.stopping.clone()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for the input side of a [`Lifecycle`] to become ready
#[derive(Debug, Clone)]
pub struct ReadyGate {
    rx: watch::Receiver<bool>,
}

impl ReadyGate {
    /// Resolve once the gate is open
    ///
    /// A gate whose lifecycle has been dropped without becoming ready never
    /// opens.
    pub async fn wait(&mut self) {
        let opened = self.rx.wait_for(|ready| *ready).await.is_ok();
        if !opened {
            std::future::pending::<()>().await;
        }
    }

    /// Whether the gate is already open
    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }
}
