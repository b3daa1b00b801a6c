//! UDP listener

use crate::handler::ReceiveHandler;
use crate::listener::ListenerHandle;
use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::{Error, Result};
use ferry_runtime::Binder;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Largest payload a UDP datagram can carry
const MAX_DATAGRAM: usize = 65_535;

/// Binds a UDP socket and feeds every datagram to a [`ReceiveHandler`]
#[derive(Debug, Clone)]
pub struct UdpBinder {
    host: String,
    port: u16,
    handler: Arc<dyn ReceiveHandler>,
}

impl UdpBinder {
    /// Create a binder for `host:port`
    pub fn new(host: impl Into<String>, port: u16, handler: Arc<dyn ReceiveHandler>) -> Self {
        Self {
            host: host.into(),
            port,
            handler,
        }
    }
}

#[async_trait]
impl Binder for UdpBinder {
    type Handle = ListenerHandle;

    fn target(&self) -> String {
        format!("udp://{}:{}", self.host, self.port)
    }

    async fn bind(&self) -> Result<ListenerHandle> {
        let socket = UdpSocket::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::bind(self.target(), e))?;
        let local_addr = socket.local_addr()?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(receive_loop(socket, Arc::clone(&self.handler), cancel.clone()));

        Ok(ListenerHandle::new(local_addr, cancel, task))
    }
}

async fn receive_loop(socket: UdpSocket, handler: Arc<dyn ReceiveHandler>, cancel: CancellationToken) {
    let mut buffer = vec![0u8; MAX_DATAGRAM];

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buffer) => received,
        };

        match received {
            Ok((len, peer)) => {
                handler
                    .receive(peer, Bytes::copy_from_slice(&buffer[..len]))
                    .await;
            }
            // ICMP errors from earlier sends surface here; keep receiving
            Err(e) => tracing::debug!(error = %e, "Datagram receive failed"),
        }
    }
}
