//! Receive handler trait

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;

/// Consumer of bytes arriving on a bound listener
///
/// TCP handlers see raw chunks as they are read from each connection; UDP
/// handlers see one call per datagram. Framing and decoding belong to the
/// handler.
#[async_trait]
pub trait ReceiveHandler: Send + Sync + fmt::Debug {
    /// Bytes received from `peer`
    async fn receive(&self, peer: SocketAddr, data: Bytes);

    /// A stream peer connected
    fn connected(&self, peer: SocketAddr) {
        tracing::debug!(peer = %peer, "Peer connected");
    }

    /// A stream peer disconnected
    fn disconnected(&self, peer: SocketAddr) {
        tracing::debug!(peer = %peer, "Peer disconnected");
    }
}
