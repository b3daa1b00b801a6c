//! Protocol binders for the Ferry metrics forwarder
//!
//! Resolves a protocol identifier (`tcp`, `udp`) to a listener binder and
//! runs it under a retry-guarded bind lifecycle. Decoding what arrives on the
//! socket is left to each plugin's [`ReceiveHandler`].

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod handler;
pub mod listener;
pub mod protocol;
pub mod tcp;
pub mod udp;

pub use handler::ReceiveHandler;
pub use listener::ListenerHandle;
pub use protocol::{BindContext, BindFailure, BindFailures, BindOwner, Protocol};
pub use tcp::TcpBinder;
pub use udp::UdpBinder;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::handler::ReceiveHandler;
    pub use crate::protocol::{BindContext, BindOwner, Protocol};
}
