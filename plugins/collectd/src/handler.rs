//! Receive side of the collectd listener

use async_trait::async_trait;
use bytes::Bytes;
use ferry_protocols::ReceiveHandler;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of what a listener has received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectdStats {
    /// Datagrams or stream chunks received
    pub datagrams: u64,
    /// Payload bytes received
    pub bytes: u64,
}

/// Counts collectd packets as they arrive
#[derive(Debug)]
pub struct CollectdHandler {
    types_db: PathBuf,
    datagrams: AtomicU64,
    bytes: AtomicU64,
}

impl CollectdHandler {
    /// Create a handler for the given types database
    pub fn new(types_db: impl Into<PathBuf>) -> Self {
        Self {
            types_db: types_db.into(),
            datagrams: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Types database this handler was configured with
    pub fn types_db(&self) -> &Path {
        &self.types_db
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CollectdStats {
        CollectdStats {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl ReceiveHandler for CollectdHandler {
    async fn receive(&self, peer: SocketAddr, data: Bytes) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        tracing::trace!(peer = %peer, size = data.len(), "collectd packet");
    }
}
