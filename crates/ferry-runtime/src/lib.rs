//! # Ferry Runtime
//!
//! Lifecycle plumbing shared by every plugin instance:
//! - Retry with exponential backoff and an optional time budget
//! - Startup-ready gate and stop signal
//! - Retry-guarded listener binding tied to those signals
//! - OS signal handling

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod bind;
pub mod lifecycle;
pub mod retry;
pub mod shutdown;

pub use bind::{BindHandle, BindLifecycle, BindObserver, BindState, Binder, TracingObserver};
pub use lifecycle::{Lifecycle, ReadyGate};
pub use retry::{Completed, Exhausted, Retry, RetryAttempt, RetryPolicy};
pub use shutdown::SignalHandler;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bind::{BindHandle, BindLifecycle, BindState, Binder};
    pub use crate::lifecycle::Lifecycle;
    pub use crate::retry::{Retry, RetryPolicy};
    pub use crate::shutdown::SignalHandler;
}
