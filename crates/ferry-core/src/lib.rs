//! # Ferry Core
//!
//! Core types and error handling shared by every Ferry crate:
//! - The capability model (`input`, `output`, `tunnel`)
//! - Plugin option metadata
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::*;
}
