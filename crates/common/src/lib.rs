//! Common utilities and types shared across mesh authentication components.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for common data types
pub mod types;

/// Module for the wall-clock abstraction
pub mod clock;

pub use clock::{Clock, SystemClock};
pub use types::{AuthType, Identity, NodeId};
