//! # Auth Test Utilities
//!
//! Mocks and fixtures for testing the auth subsystem without a datapath,
//! a certificate authority, or real peer nodes.
//!
//! ## Modules
//!
//! - `mock_clock` - Manually advanced wall clock
//! - `mock_store` - Auth map store with failure injection and call counters
//! - `mock_handler` - Counting, scriptable auth handler with a rotation stream
//! - `mock_mutual` - Certificate provider and handshaker for the mutual handler
//! - `mock_signal_source` - Signal source capturing the registered sender
//! - `fixtures` - Common keys, signals, and node tables
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! let clock = Arc::new(MockClock::at_unix(1_700_000_000));
//! let (handler, rotations) = MockAuthHandler::new(AuthType::Mutual, clock.clone())
//!     .with_validity_secs(600)
//!     .with_rotation_stream(8);
//!
//! let store = Arc::new(MockAuthMap::new());
//! store.fail_updates(true);
//! ```

pub mod fixtures;
pub mod mock_clock;
pub mod mock_handler;
pub mod mock_mutual;
pub mod mock_signal_source;
pub mod mock_store;

pub use fixtures::*;
pub use mock_clock::*;
pub use mock_handler::*;
pub use mock_mutual::*;
pub use mock_signal_source::*;
pub use mock_store::*;

/// Install a tracing subscriber writing to the test output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
