/// Authenticated plex.tv account session.
///
/// Produced by a successful sign-in, saved-session reconnect, or token
/// validation. The token authorizes directory-service calls for the account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSession {
    pub auth_token: String,
    pub username: String,
    pub uuid: String,
}

/// Direct connection handle to a single media server.
///
/// Built from a pre-supplied token and base URL without contacting the
/// directory service. The token is not validated until the first request
/// against the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerHandle {
    pub base_url: String,
    pub auth_token: String,
}

/// Identity reported by a server's root endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerIdentity {
    pub machine_identifier: String,
    pub friendly_name: String,
}

/// One device visible to the account, as reported by the directory service.
///
/// Covers every linked device (players, controllers, servers); only entries
/// with `provides_server` set are candidates for the server registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResource {
    pub name: String,
    pub client_identifier: String,
    pub provides_server: bool,
    /// Server-scoped access token, when the directory service issues one.
    pub access_token: Option<String>,
    pub connections: Vec<ResourceConnection>,
}

/// One advertised way to reach a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConnection {
    pub uri: String,
    pub local: bool,
    /// Relayed through the directory service's proxy rather than direct.
    pub relay: bool,
}
