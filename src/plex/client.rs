use crate::plex::models::{
    AccountSession, ResourceConnection, ServerHandle, ServerIdentity, ServerResource,
};
use async_trait::async_trait;
use reqwest::{Client, Error as ReqwestError};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Error code the directory service attaches to a 401 when a verification
/// code is required to complete the sign-in.
const TWO_FACTOR_ERROR_CODE: i64 = 1029;

const PRODUCT_NAME: &str = "curator";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("credentials rejected by the directory service")]
    Unauthorized,
    #[error("two-factor verification code required")]
    TwoFactorRequired,
    #[error("account or resource not found")]
    NotFound,
    #[error("directory service unreachable: {0}")]
    Unreachable(#[from] ReqwestError),
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("authentication rejected: {0}")]
    Auth(#[from] AuthError),
}

/// Account-level directory operations plus identity lookup on a direct
/// server connection (allows mocking for tests).
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Sign in with account credentials, optionally completing a two-factor
    /// challenge with an out-of-band verification code.
    async fn signin(
        &self,
        username: &str,
        password: &str,
        verification_code: Option<&str>,
    ) -> Result<AccountSession, AuthError>;

    /// Rebuild an account session from a previously issued token.
    async fn reconnect(&self, auth_token: &str) -> Result<AccountSession, AuthError>;

    /// List every device linked to the account.
    async fn resources(
        &self,
        session: &AccountSession,
    ) -> Result<Vec<ServerResource>, ConnectionError>;

    /// Ask a server for its identity over a direct connection.
    async fn server_identity(
        &self,
        server: &ServerHandle,
    ) -> Result<ServerIdentity, ConnectionError>;
}

/// Sign-in and token-validation response body
#[derive(Debug, Deserialize)]
struct UserResponse {
    username: String,
    uuid: String,
    #[serde(rename = "authToken")]
    auth_token: String,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ErrorsResponse {
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
}

/// One entry of the account resource listing
#[derive(Debug, Deserialize)]
struct ResourceResponse {
    name: String,
    #[serde(rename = "clientIdentifier")]
    client_identifier: String,
    provides: String,
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    #[serde(default)]
    connections: Vec<ConnectionResponse>,
}

#[derive(Debug, Deserialize)]
struct ConnectionResponse {
    uri: String,
    #[serde(default)]
    local: bool,
    #[serde(default)]
    relay: bool,
}

/// Server root response carrying the identity fields
#[derive(Debug, Deserialize)]
struct IdentityResponse {
    #[serde(rename = "MediaContainer")]
    media_container: IdentityContainer,
}

#[derive(Debug, Deserialize)]
struct IdentityContainer {
    #[serde(rename = "machineIdentifier")]
    machine_identifier: String,
    #[serde(rename = "friendlyName")]
    friendly_name: String,
}

#[derive(Clone)]
pub struct PlexClient {
    client: Client,
    base_url: String,
    /// Identifies this installation to the directory service; generated
    /// once per client.
    client_identifier: String,
}

impl PlexClient {
    pub fn new() -> Self {
        Self::with_base_url("https://plex.tv".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        PlexClient {
            client: Client::new(),
            base_url,
            client_identifier: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Accept", "application/json")
            .header("X-Plex-Product", PRODUCT_NAME)
            .header("X-Plex-Version", env!("CARGO_PKG_VERSION"))
            .header("X-Plex-Client-Identifier", &self.client_identifier)
    }
}

impl Default for PlexClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Check a 401 body for the error code that signals a pending two-factor
/// challenge.
fn two_factor_signalled(body: &str) -> bool {
    match serde_json::from_str::<ErrorsResponse>(body) {
        Ok(response) => response
            .errors
            .iter()
            .any(|e| e.code == TWO_FACTOR_ERROR_CODE),
        Err(_) => false,
    }
}

#[async_trait]
impl DirectoryService for PlexClient {
    async fn signin(
        &self,
        username: &str,
        password: &str,
        verification_code: Option<&str>,
    ) -> Result<AccountSession, AuthError> {
        let url = format!("{}/api/v2/users/signin", self.base_url);

        let mut params = vec![("login", username), ("password", password)];
        if let Some(code) = verification_code {
            params.push(("verificationCode", code));
        }

        let response = self
            .request(self.client.post(&url))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            let user: UserResponse = response.json().await?;
            debug!("Signed in to directory service as {}", user.username);
            Ok(AccountSession {
                auth_token: user.auth_token,
                username: user.username,
                uuid: user.uuid,
            })
        } else if response.status() == 401 {
            let body = response.text().await?;
            if two_factor_signalled(&body) {
                Err(AuthError::TwoFactorRequired)
            } else {
                Err(AuthError::Unauthorized)
            }
        } else if response.status() == 404 {
            Err(AuthError::NotFound)
        } else {
            Err(AuthError::Unreachable(
                response.error_for_status().unwrap_err(),
            ))
        }
    }

    async fn reconnect(&self, auth_token: &str) -> Result<AccountSession, AuthError> {
        let url = format!("{}/api/v2/user", self.base_url);

        let response = self
            .request(self.client.get(&url))
            .header("X-Plex-Token", auth_token)
            .send()
            .await?;

        if response.status().is_success() {
            let user: UserResponse = response.json().await?;
            debug!("Validated stored token for {}", user.username);
            Ok(AccountSession {
                auth_token: user.auth_token,
                username: user.username,
                uuid: user.uuid,
            })
        } else if response.status() == 401 {
            Err(AuthError::Unauthorized)
        } else if response.status() == 404 {
            Err(AuthError::NotFound)
        } else {
            Err(AuthError::Unreachable(
                response.error_for_status().unwrap_err(),
            ))
        }
    }

    async fn resources(
        &self,
        session: &AccountSession,
    ) -> Result<Vec<ServerResource>, ConnectionError> {
        let url = format!("{}/api/v2/resources", self.base_url);

        let response = self
            .request(self.client.get(&url))
            .query(&[("includeHttps", "1"), ("includeRelay", "1")])
            .header("X-Plex-Token", &session.auth_token)
            .send()
            .await?;

        if response.status().is_success() {
            let resources: Vec<ResourceResponse> = response.json().await?;
            Ok(resources.into_iter().map(map_resource).collect())
        } else if response.status() == 401 {
            Err(ConnectionError::Auth(AuthError::Unauthorized))
        } else {
            Err(ConnectionError::Request(
                response.error_for_status().unwrap_err(),
            ))
        }
    }

    async fn server_identity(
        &self,
        server: &ServerHandle,
    ) -> Result<ServerIdentity, ConnectionError> {
        // First actual use of a pre-supplied token: the server rejects it
        // here if it is not valid.
        let url = format!("{}/", server.base_url.trim_end_matches('/'));

        let response = self
            .request(self.client.get(&url))
            .header("X-Plex-Token", &server.auth_token)
            .send()
            .await?;

        if response.status().is_success() {
            let identity: IdentityResponse = response.json().await?;
            Ok(ServerIdentity {
                machine_identifier: identity.media_container.machine_identifier,
                friendly_name: identity.media_container.friendly_name,
            })
        } else if response.status() == 401 {
            warn!("Server {} rejected the supplied token", server.base_url);
            Err(ConnectionError::Auth(AuthError::Unauthorized))
        } else if response.status() == 404 {
            Err(ConnectionError::UnexpectedResponse(format!(
                "no media server at {}",
                server.base_url
            )))
        } else {
            Err(ConnectionError::Request(
                response.error_for_status().unwrap_err(),
            ))
        }
    }
}

fn map_resource(resource: ResourceResponse) -> ServerResource {
    ServerResource {
        provides_server: resource.provides.split(',').any(|p| p == "server"),
        name: resource.name,
        client_identifier: resource.client_identifier,
        access_token: resource.access_token,
        connections: resource
            .connections
            .into_iter()
            .map(|c| ResourceConnection {
                uri: c.uri,
                local: c.local,
                relay: c.relay,
            })
            .collect(),
    }
}
