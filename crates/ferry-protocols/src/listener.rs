//! Handle of a running listener

use ferry_core::Result;
use ferry_runtime::BindHandle;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Running listener task plus the socket address it is bound to
///
/// Releasing the handle cancels the receive loop and aborts its task, which
/// closes the socket. Dropping an unreleased handle does the same.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(local_addr: SocketAddr, cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            local_addr,
            cancel,
            task,
        }
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn shut_down(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl BindHandle for ListenerHandle {
    fn release(self) -> Result<()> {
        self.shut_down();
        tracing::debug!(local_addr = %self.local_addr, "Listener released");
        Ok(())
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(local_addr = %self.local_addr, "Listener dropped without release");
            self.shut_down();
        }
    }
}
