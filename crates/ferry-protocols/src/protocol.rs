//! Protocol dispatch
//!
//! Maps a protocol identifier from configuration to the binder that
//! implements it, and wraps the bind in a [`BindLifecycle`].

use crate::handler::ReceiveHandler;
use crate::tcp::TcpBinder;
use crate::udp::UdpBinder;
use ferry_core::{Capability, Error, Result};
use ferry_runtime::{BindLifecycle, Binder, Lifecycle, RetryPolicy};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Transport a listener is bound with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Stream listener
    Tcp,
    /// Datagram socket
    Udp,
}

impl Protocol {
    /// Parse a protocol identifier, ignoring case
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(Error::UnknownProtocol(name.to_string())),
        }
    }

    /// Start a retry-guarded bind of `host:port`
    ///
    /// The bind waits for the context's ready gate, and the listener is
    /// released when the context's lifecycle stops. If the retry budget runs
    /// out, the error is reported once through [`BindContext::failures`],
    /// tagged with the context's owner.
    pub fn bind(
        &self,
        ctx: &BindContext,
        host: impl Into<String>,
        port: u16,
        handler: Arc<dyn ReceiveHandler>,
    ) -> JoinHandle<()> {
        let host = host.into();

        match self {
            Protocol::Tcp => spawn_bind(ctx, TcpBinder::new(host, port, handler)),
            Protocol::Udp => spawn_bind(ctx, UdpBinder::new(host, port, handler)),
        }
    }
}

fn spawn_bind<B>(ctx: &BindContext, binder: B) -> JoinHandle<()>
where
    B: Binder + 'static,
    B::Handle: 'static,
{
    let target = binder.target();
    let owner = ctx.owner.clone();
    let reports = ctx.reports.clone();
    let lifecycle = BindLifecycle::new(binder, ctx.lifecycle.clone()).policy(ctx.policy.clone());

    ctx.tracker.spawn(async move {
        let Err(error) = lifecycle.run().await else {
            return;
        };

        let failure = BindFailure {
            owner,
            target,
            error,
        };
        if let Err(unsent) = reports.send(failure) {
            let failure = unsent.0;
            tracing::error!(
                address = %failure.target,
                error = %failure.error,
                "Bind failed and no one is collecting failures"
            );
        }
    })
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Plugin instance a bind was started for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOwner {
    /// Plugin name
    pub plugin: String,
    /// Role the instance was set up for
    pub role: Capability,
}

impl BindOwner {
    /// Create an owner tag
    pub fn new(plugin: impl Into<String>, role: Capability) -> Self {
        Self {
            plugin: plugin.into(),
            role,
        }
    }
}

impl fmt::Display for BindOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} plugin '{}'", self.role, self.plugin)
    }
}

/// A bind that gave up
#[derive(Debug)]
pub struct BindFailure {
    /// Instance that started the bind, if known
    pub owner: Option<BindOwner>,
    /// Target in `proto://host:port` form
    pub target: String,
    /// Terminal error, usually [`Error::RetryExhausted`]
    pub error: Error,
}

/// Receiving side of bind failures, shared by every clone of a context
#[derive(Debug, Clone)]
pub struct BindFailures {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<BindFailure>>>,
}

impl BindFailures {
    /// Wait for the next failure
    pub async fn next(&self) -> Option<BindFailure> {
        self.rx.lock().await.recv().await
    }

    /// Next failure that has already been reported, without waiting
    pub fn try_next(&self) -> Option<BindFailure> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

/// What every bind needs from the daemon
///
/// Cloning is cheap; clones share the same lifecycle, task tracker and
/// failure channel.
#[derive(Debug, Clone)]
pub struct BindContext {
    /// Ready gate and stop signal
    pub lifecycle: Lifecycle,
    /// Backoff and retry budget for binds
    pub policy: RetryPolicy,
    /// Tracks spawned bind tasks so shutdown can wait for them
    pub tracker: TaskTracker,
    owner: Option<BindOwner>,
    reports: mpsc::UnboundedSender<BindFailure>,
    failures: BindFailures,
}

impl BindContext {
    /// Create a context with a fresh task tracker and failure channel
    pub fn new(lifecycle: Lifecycle, policy: RetryPolicy) -> Self {
        let (reports, rx) = mpsc::unbounded_channel();
        Self {
            lifecycle,
            policy,
            tracker: TaskTracker::new(),
            owner: None,
            reports,
            failures: BindFailures {
                rx: Arc::new(Mutex::new(rx)),
            },
        }
    }

    /// Clone of this context whose binds are reported as `owner`'s
    pub fn with_owner(&self, owner: BindOwner) -> Self {
        Self {
            owner: Some(owner),
            ..self.clone()
        }
    }

    /// Owner binds from this context are reported as
    pub fn owner(&self) -> Option<&BindOwner> {
        self.owner.as_ref()
    }

    /// Failures of binds started from this context or any clone of it
    pub fn failures(&self) -> BindFailures {
        self.failures.clone()
    }
}
