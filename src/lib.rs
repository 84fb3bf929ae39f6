// Library exports for integration tests and the curator binary

pub mod auth;
pub mod config;
pub mod organizer;
pub mod plex;
pub mod servers;
pub mod session_store;

// Test support (only available with test-utils feature)
#[cfg(feature = "test-utils")]
pub mod test_support;
