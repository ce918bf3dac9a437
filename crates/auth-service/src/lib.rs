//! Auth Service Library
//!
//! The mutual authentication decision engine. The datapath raises an
//! "authentication required" signal for traffic between two security
//! identities; this crate turns the signal into an authentication decision,
//! records it in the auth map the datapath reads, and keeps the map
//! consistent as identities, nodes, and certificates change.
//!
//! # Architecture
//!
//! ```text
//! SignalSource ──► signal channel ──► auth_requests task ──► AuthManager
//!                                                             │  ├── AuthHandler (per AuthType)
//!                                                             ▼  │
//!                                                        AuthMapCache ──► AuthMapStore
//!                                                             ▲
//! rotation streams ──► reauthentication task ─────────────────┤
//! identity/node feeds ──► lifecycle_gc tasks ──► GC ──────────┤
//! timer ──► expiration_gc task ──► GC ────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Write-through mirror of the auth map
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types
//! - [`gc`] - Expired, identity, and node garbage collection
//! - [`handlers`] - Authentication strategies
//! - [`manager`] - Request orchestration and rotation handling
//! - [`node`] - Node id to address resolution
//! - [`signal`] - Bounded signal channel
//! - [`subsystem`] - Startup and shutdown wiring
//! - [`tasks`] - Background tasks

#![warn(clippy::pedantic)]

pub mod cache;
pub mod config;
pub mod errors;
pub mod gc;
pub mod handlers;
pub mod manager;
pub mod node;
pub mod observability;
pub mod signal;
pub mod subsystem;
pub mod tasks;

pub use cache::AuthMapCache;
pub use config::{AuthConfig, MutualAuthConfig};
pub use errors::{AuthError, GcError, HandlerError};
pub use gc::{AuthMapGarbageCollector, IdentityDescriptor, IdentityEvent, NodeDescriptor, NodeEvent};
pub use handlers::{AuthHandler, AuthRequest, AuthResponse};
pub use manager::{AuthManager, AuthOutcome};
pub use node::{NodeIdResolver, NodeIdTable};
pub use signal::{SignalReceiver, SignalSender, SignalSource};
pub use subsystem::{AuthSubsystem, AuthSubsystemParams};
