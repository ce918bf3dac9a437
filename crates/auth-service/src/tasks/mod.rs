//! Background tasks of the auth service.
//!
//! # Tasks
//!
//! - `auth_requests` - Drains the signal channel, one tracked task per request
//! - `reauthentication` - Evicts entries of identities whose credentials rotated
//! - `expiration_gc` - Periodically removes expired entries
//! - `lifecycle_gc` - Removes entries of deleted identities and nodes
//!
//! Every task exits when its cancellation token is triggered or its input
//! stream ends.

pub mod auth_requests;
pub mod expiration_gc;
pub mod lifecycle_gc;
pub mod reauthentication;

pub use auth_requests::start_auth_request_processing;
pub use expiration_gc::start_expiration_gc;
pub use lifecycle_gc::{start_identity_gc, start_node_gc};
pub use reauthentication::start_reauthentication;
