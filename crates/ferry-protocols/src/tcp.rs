//! TCP listener

use crate::handler::ReceiveHandler;
use crate::listener::ListenerHandle;
use async_trait::async_trait;
use bytes::BytesMut;
use ferry_core::{Error, Result};
use ferry_runtime::Binder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

const READ_BUFFER: usize = 8 * 1024;

/// Binds a TCP listener and feeds every connection to a [`ReceiveHandler`]
#[derive(Debug, Clone)]
pub struct TcpBinder {
    host: String,
    port: u16,
    handler: Arc<dyn ReceiveHandler>,
}

impl TcpBinder {
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
impl Binder for TcpBinder {
    type Handle = ListenerHandle;

    fn target(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    async fn bind(&self) -> Result<ListenerHandle> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::bind(self.target(), e))?;
        let local_addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.handler),
            cancel.clone(),
        ));

        Ok(ListenerHandle::new(local_addr, cancel, task))
    }
}

async fn accept_loop(listener: TcpListener, handler: Arc<dyn ReceiveHandler>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::trace!(peer = %peer, "Accepted connection");
                    tokio::spawn(read_connection(
                        stream,
                        peer,
                        Arc::clone(&handler),
                        cancel.child_token(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

async fn read_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn ReceiveHandler>,
    cancel: CancellationToken,
) {
    handler.connected(peer);
    let mut buffer = BytesMut::with_capacity(READ_BUFFER);

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read_buf(&mut buffer) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                let chunk = buffer.split().freeze();
                handler.receive(peer, chunk).await;
                buffer.reserve(READ_BUFFER);
            }
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "Connection read failed");
                break;
            }
        }
    }

    handler.disconnected(peer);
}
