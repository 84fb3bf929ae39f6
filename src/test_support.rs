// Test support utilities for both unit and integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::TwoFactorPrompt;
use crate::plex::{
    AccountSession, AuthError, ConnectionError, DirectoryService, ResourceConnection,
    ServerHandle, ServerIdentity, ServerResource,
};

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Scripted directory service for testing login and resolution flows
/// without external dependencies.
///
/// Every call is counted so tests can assert ordering and retry behavior.
pub struct MockDirectoryService {
    username: String,
    password: String,
    /// Verification code the account expects; `Some` makes the first
    /// code-less sign-in come back as a two-factor challenge.
    verification_code: Option<String>,
    /// Tokens `reconnect` accepts.
    valid_tokens: Vec<String>,
    /// Simulate a two-factor demand on reconnect.
    reconnect_two_factor: bool,
    resources: Vec<ServerResource>,
    identity: Option<ServerIdentity>,
    pub signin_calls: AtomicUsize,
    pub reconnect_calls: AtomicUsize,
    pub resources_calls: AtomicUsize,
    pub identity_calls: AtomicUsize,
}

impl Default for MockDirectoryService {
    fn default() -> Self {
        MockDirectoryService {
            username: "user".to_string(),
            password: "pass".to_string(),
            verification_code: None,
            valid_tokens: Vec::new(),
            reconnect_two_factor: false,
            resources: Vec::new(),
            identity: None,
            signin_calls: AtomicUsize::new(0),
            reconnect_calls: AtomicUsize::new(0),
            resources_calls: AtomicUsize::new(0),
            identity_calls: AtomicUsize::new(0),
        }
    }
}

impl MockDirectoryService {
    /// Create a new mock directory service
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// Require `code` before the sign-in completes.
    pub fn with_two_factor(mut self, code: &str) -> Self {
        self.verification_code = Some(code.to_string());
        self
    }

    pub fn with_valid_token(mut self, token: &str) -> Self {
        self.valid_tokens.push(token.to_string());
        self
    }

    pub fn with_reconnect_two_factor(mut self) -> Self {
        self.reconnect_two_factor = true;
        self
    }

    pub fn with_resources(mut self, resources: Vec<ServerResource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_identity(mut self, machine_identifier: &str, friendly_name: &str) -> Self {
        self.identity = Some(ServerIdentity {
            machine_identifier: machine_identifier.to_string(),
            friendly_name: friendly_name.to_string(),
        });
        self
    }

    fn account(&self) -> AccountSession {
        AccountSession {
            auth_token: "account-token".to_string(),
            username: self.username.clone(),
            uuid: "account-uuid".to_string(),
        }
    }
}

#[async_trait]
impl DirectoryService for MockDirectoryService {
    async fn signin(
        &self,
        username: &str,
        password: &str,
        verification_code: Option<&str>,
    ) -> Result<AccountSession, AuthError> {
        self.signin_calls.fetch_add(1, Ordering::SeqCst);

        if username != self.username || password != self.password {
            return Err(AuthError::Unauthorized);
        }
        if let Some(expected) = &self.verification_code {
            match verification_code {
                None => return Err(AuthError::TwoFactorRequired),
                Some(code) if code != expected => return Err(AuthError::Unauthorized),
                Some(_) => {}
            }
        }
        Ok(self.account())
    }

    async fn reconnect(&self, auth_token: &str) -> Result<AccountSession, AuthError> {
        self.reconnect_calls.fetch_add(1, Ordering::SeqCst);

        if self.reconnect_two_factor {
            return Err(AuthError::TwoFactorRequired);
        }
        if !self.valid_tokens.iter().any(|t| t == auth_token) {
            return Err(AuthError::Unauthorized);
        }
        Ok(AccountSession {
            auth_token: auth_token.to_string(),
            username: self.username.clone(),
            uuid: "account-uuid".to_string(),
        })
    }

    async fn resources(
        &self,
        _session: &AccountSession,
    ) -> Result<Vec<ServerResource>, ConnectionError> {
        self.resources_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.resources.clone())
    }

    async fn server_identity(
        &self,
        _server: &ServerHandle,
    ) -> Result<ServerIdentity, ConnectionError> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        self.identity.clone().ok_or_else(|| {
            ConnectionError::UnexpectedResponse("no identity scripted".to_string())
        })
    }
}

/// Scripted verification-code source. Counts how often it is consulted.
pub struct MockPrompt {
    code: Option<String>,
    pub calls: AtomicUsize,
}

impl MockPrompt {
    /// Prompt that answers with `code`.
    pub fn answering(code: &str) -> Arc<Self> {
        Arc::new(MockPrompt {
            code: Some(code.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Prompt with no code to give (headless or unattended runs).
    pub fn refusing() -> Arc<Self> {
        Arc::new(MockPrompt {
            code: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TwoFactorPrompt for MockPrompt {
    async fn verification_code(&self) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.code.clone()
    }
}

/// Build a server resource with one direct connection.
pub fn server_resource(name: &str, client_identifier: &str) -> ServerResource {
    ServerResource {
        name: name.to_string(),
        client_identifier: client_identifier.to_string(),
        provides_server: true,
        access_token: Some(format!("{}-token", client_identifier)),
        connections: vec![ResourceConnection {
            uri: format!("https://{}.example:32400", client_identifier),
            local: false,
            relay: false,
        }],
    }
}
