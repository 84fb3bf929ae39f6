//! Plex directory-service client
//!
//! Talks to the plex.tv account API (sign-in, token validation, resource
//! listing) and to individual media servers (identity lookup on a direct
//! connection). The `DirectoryService` trait is the seam the rest of the
//! crate works against; `PlexClient` is the production implementation.

pub mod client;
pub mod models;

pub use client::{AuthError, ConnectionError, DirectoryService, PlexClient};
pub use models::{
    AccountSession, ResourceConnection, ServerHandle, ServerIdentity, ServerResource,
};
