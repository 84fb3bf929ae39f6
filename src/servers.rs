use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::plex::{ConnectionError, DirectoryService, ResourceConnection, ServerResource};

/// Connection info for a resolved server. Opaque to downstream consumers;
/// only the resolver builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConnection {
    pub uri: String,
    pub access_token: String,
}

/// One reachable media server. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDescriptor {
    pub machine_identifier: String,
    pub friendly_name: String,
    pub connection: ServerConnection,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no server with machine identifier {0}")]
    UnknownServer(String),
}

/// Locally addressable view of the servers visible to the session, keyed by
/// machine identifier, plus the server the organizer currently operates
/// against.
///
/// Populated wholesale by `ServerRegistryResolver::resolve`; a repeated
/// resolve replaces the contents instead of appending to them.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: HashMap<String, ServerDescriptor>,
    current_server_id: Option<String>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, machine_identifier: &str) -> Option<&ServerDescriptor> {
        self.servers.get(machine_identifier)
    }

    pub fn contains(&self, machine_identifier: &str) -> bool {
        self.servers.contains_key(machine_identifier)
    }

    pub fn servers(&self) -> impl Iterator<Item = &ServerDescriptor> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn current_server_id(&self) -> Option<&str> {
        self.current_server_id.as_deref()
    }

    pub fn current_server(&self) -> Option<&ServerDescriptor> {
        self.current_server_id
            .as_deref()
            .and_then(|id| self.servers.get(id))
    }

    /// Point the current server at another resolved entry.
    pub fn select(&mut self, machine_identifier: &str) -> Result<(), RegistryError> {
        if !self.servers.contains_key(machine_identifier) {
            return Err(RegistryError::UnknownServer(
                machine_identifier.to_string(),
            ));
        }
        self.current_server_id = Some(machine_identifier.to_string());
        Ok(())
    }

    fn replace(&mut self, descriptors: Vec<ServerDescriptor>, current: Option<String>) {
        self.servers = descriptors
            .into_iter()
            .map(|d| (d.machine_identifier.clone(), d))
            .collect();
        self.current_server_id = current;
    }
}

/// Turns an authenticated session into a populated server registry.
pub struct ServerRegistryResolver {
    directory: Arc<dyn DirectoryService>,
    /// Server the configuration asks for, picked as current when the
    /// account resolves to more than one server.
    preferred_server_id: Option<String>,
}

impl ServerRegistryResolver {
    pub fn new(directory: Arc<dyn DirectoryService>, preferred_server_id: Option<String>) -> Self {
        ServerRegistryResolver {
            directory,
            preferred_server_id,
        }
    }

    /// Resolve the session's reachable servers into `registry`.
    ///
    /// Returns whether at least one server was found; zero servers is a
    /// legitimate outcome, not an error. The session itself is never
    /// mutated.
    pub async fn resolve(
        &self,
        session: &Session,
        registry: &mut ServerRegistry,
    ) -> Result<bool, ConnectionError> {
        let account = match session {
            Session::Direct(handle) => {
                // The session already is a server connection; ask that
                // server who it is instead of going through the directory.
                let identity = self.directory.server_identity(handle).await?;
                info!(
                    "Connected directly to {} ({})",
                    identity.friendly_name, identity.machine_identifier
                );
                let current = identity.machine_identifier.clone();
                registry.replace(
                    vec![ServerDescriptor {
                        machine_identifier: identity.machine_identifier,
                        friendly_name: identity.friendly_name,
                        connection: ServerConnection {
                            uri: handle.base_url.clone(),
                            access_token: handle.auth_token.clone(),
                        },
                    }],
                    Some(current),
                );
                return Ok(true);
            }
            Session::Account(account) => account,
        };

        let resources = self.directory.resources(account).await?;
        let mut descriptors = Vec::new();

        for resource in &resources {
            if !resource.provides_server {
                debug!("Skipping {}: not a server", resource.name);
                continue;
            }
            let connection = match best_connection(resource) {
                Some(connection) => connection,
                None => {
                    warn!("Server {} has no usable connection", resource.name);
                    continue;
                }
            };
            let access_token = resource
                .access_token
                .clone()
                .unwrap_or_else(|| account.auth_token.clone());
            descriptors.push(ServerDescriptor {
                machine_identifier: resource.client_identifier.clone(),
                friendly_name: resource.name.clone(),
                connection: ServerConnection {
                    uri: connection.uri.clone(),
                    access_token,
                },
            });
        }

        let found = !descriptors.is_empty();
        if found {
            info!("Resolved {} reachable server(s)", descriptors.len());
        } else {
            info!("Account has no reachable servers");
        }

        let current = pick_current(self.preferred_server_id.as_deref(), &descriptors);
        registry.replace(descriptors, current);
        Ok(found)
    }
}

/// Prefer a direct connection over a relayed one.
fn best_connection(resource: &ServerResource) -> Option<&ResourceConnection> {
    resource
        .connections
        .iter()
        .find(|c| !c.relay)
        .or_else(|| resource.connections.first())
}

/// The preferred server when it resolved, otherwise the only server when
/// exactly one did, otherwise unset.
fn pick_current(preferred: Option<&str>, descriptors: &[ServerDescriptor]) -> Option<String> {
    if let Some(preferred) = preferred {
        if descriptors.iter().any(|d| d.machine_identifier == preferred) {
            return Some(preferred.to_string());
        }
    }
    if descriptors.len() == 1 {
        return Some(descriptors[0].machine_identifier.clone());
    }
    None
}
