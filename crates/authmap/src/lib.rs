//! Auth map shared between the authentication control plane and the datapath.
//!
//! This crate defines the fixed-layout binary records for auth map entries
//! and "authentication required" signals, and the [`AuthMapStore`]
//! persistence boundary with its in-memory and file-backed implementations.

#![warn(clippy::pedantic)]

pub mod codec;
pub mod file;
pub mod memory;
pub mod record;
pub mod store;

pub use codec::CodecError;
pub use file::FileAuthMap;
pub use memory::InMemoryAuthMap;
pub use record::{AuthInfo, AuthKey, SignalAuthKey};
pub use store::{AuthMapStore, StoreError, DEFAULT_MAX_ENTRIES};
