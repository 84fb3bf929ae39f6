use thiserror::Error;

use crate::auth::{Session, SessionAuthenticator};
use crate::plex::{AuthError, ConnectionError};
use crate::servers::{RegistryError, ServerRegistry, ServerRegistryResolver};

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("server resolution failed: {0}")]
    Resolve(#[from] ConnectionError),
}

/// Connection state for one organizer run.
///
/// Owns the session and the server registry explicitly instead of spreading
/// them across ambient mutable fields. The run moves through three states:
/// unauthenticated (no session), authenticated (session stored), servers
/// resolved (registry populated). A failure in either step is terminal for
/// this layer; retry policy belongs to the caller.
pub struct Organizer {
    authenticator: SessionAuthenticator,
    resolver: ServerRegistryResolver,
    session: Option<Session>,
    registry: ServerRegistry,
}

impl Organizer {
    pub fn new(authenticator: SessionAuthenticator, resolver: ServerRegistryResolver) -> Self {
        Organizer {
            authenticator,
            resolver,
            session: None,
            registry: ServerRegistry::new(),
        }
    }

    /// Log in, then resolve the reachable servers into the registry.
    ///
    /// Resolution only starts after `login()` has completed and produced a
    /// session; a login failure leaves the registry untouched and no
    /// session stored. Returns whether at least one server was found.
    pub async fn connect(&mut self) -> Result<bool, ConnectError> {
        let session = self.authenticator.login().await?;
        let found = self.resolver.resolve(&session, &mut self.registry).await?;
        self.session = Some(session);
        Ok(found)
    }

    /// The authenticated session, once `connect` has succeeded.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Re-point the current server at another resolved entry, for
    /// downstream operations that target a specific server.
    pub fn select_server(&mut self, machine_identifier: &str) -> Result<(), RegistryError> {
        self.registry.select(machine_identifier)
    }
}
