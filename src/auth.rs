use std::io::{self, BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::plex::{AccountSession, AuthError, DirectoryService, ServerHandle};
use crate::session_store::{SavedSession, SessionStore};

/// How a run authenticates against the directory service. Fixed once
/// selected from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Interactive,
    Remembered,
    HeadlessToken,
}

/// Login material for a run. Exactly one variant is populated, and the
/// variant determines the login strategy.
#[derive(Debug, Clone)]
pub enum Credentials {
    Password {
        username: String,
        password: String,
    },
    /// Previously persisted session; `None` when nothing was stored.
    SavedSession { blob: Option<SavedSession> },
    BearerToken {
        token: String,
        url: String,
    },
}

impl Credentials {
    pub fn mode(&self) -> LoginMode {
        match self {
            Credentials::Password { .. } => LoginMode::Interactive,
            Credentials::SavedSession { .. } => LoginMode::Remembered,
            Credentials::BearerToken { .. } => LoginMode::HeadlessToken,
        }
    }
}

/// An authenticated handle to the remote side.
///
/// Only `SessionAuthenticator::login` produces one, so holding a `Session`
/// is proof that authentication completed.
#[derive(Debug, Clone)]
pub enum Session {
    /// plex.tv account session; servers are discovered through the
    /// directory service.
    Account(AccountSession),
    /// Direct connection to a single server (headless token login); the
    /// server is the same object the session was built from.
    Direct(ServerHandle),
}

impl Session {
    /// Direct server handle, present only for headless token sessions.
    pub fn server_handle(&self) -> Option<&ServerHandle> {
        match self {
            Session::Direct(handle) => Some(handle),
            Session::Account(_) => None,
        }
    }

    pub fn auth_token(&self) -> &str {
        match self {
            Session::Account(account) => &account.auth_token,
            Session::Direct(handle) => &handle.auth_token,
        }
    }
}

/// Source of the out-of-band verification code for two-factor challenges
/// (allows scripting the code in tests).
#[async_trait]
pub trait TwoFactorPrompt: Send + Sync {
    /// Obtain a verification code, or `None` when no code can be provided.
    async fn verification_code(&self) -> Option<String>;
}

/// Reads the verification code from stdin. The blocking read runs on the
/// blocking pool so the runtime is not stalled.
pub struct StdinPrompt;

#[async_trait]
impl TwoFactorPrompt for StdinPrompt {
    async fn verification_code(&self) -> Option<String> {
        let line = tokio::task::spawn_blocking(|| {
            print!("Verification code: ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).ok().map(|_| line)
        })
        .await
        .ok()
        .flatten()?;

        let code = line.trim().to_string();
        if code.is_empty() {
            None
        } else {
            Some(code)
        }
    }
}

/// Produces an authenticated `Session` from the configured credentials.
///
/// Dispatches on the credentials variant:
/// - `Password`: sign in against the directory service, retrying exactly
///   once with a verification code if a two-factor challenge comes back.
/// - `SavedSession`: rebuild the session from the persisted blob; no
///   fallback to interactive login if the blob is missing or rejected.
/// - `BearerToken`: build a direct server session locally. No network
///   round trip, and the prompt is never consulted.
pub struct SessionAuthenticator {
    directory: Arc<dyn DirectoryService>,
    store: SessionStore,
    prompt: Arc<dyn TwoFactorPrompt>,
    credentials: Credentials,
    remember: bool,
}

impl SessionAuthenticator {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        store: SessionStore,
        prompt: Arc<dyn TwoFactorPrompt>,
        credentials: Credentials,
        remember: bool,
    ) -> Self {
        SessionAuthenticator {
            directory,
            store,
            prompt,
            credentials,
            remember,
        }
    }

    pub fn mode(&self) -> LoginMode {
        self.credentials.mode()
    }

    pub async fn login(&self) -> Result<Session, AuthError> {
        match &self.credentials {
            Credentials::BearerToken { token, url } => {
                info!("Using pre-supplied token for server at {}", url);
                Ok(Session::Direct(ServerHandle {
                    base_url: url.trim_end_matches('/').to_string(),
                    auth_token: token.clone(),
                }))
            }
            Credentials::SavedSession { blob } => {
                let saved = blob.as_ref().ok_or(AuthError::Unauthorized)?;
                let account = self.directory.reconnect(&saved.auth_token).await?;
                info!("Resumed remembered session for {}", account.username);
                Ok(Session::Account(account))
            }
            Credentials::Password { username, password } => {
                let account = match self.directory.signin(username, password, None).await {
                    Ok(account) => account,
                    Err(AuthError::TwoFactorRequired) => {
                        debug!("Directory service requested a verification code");
                        let code = self
                            .prompt
                            .verification_code()
                            .await
                            .ok_or(AuthError::TwoFactorRequired)?;
                        self.directory
                            .signin(username, password, Some(code.as_str()))
                            .await?
                    }
                    Err(e) => return Err(e),
                };

                if self.remember {
                    if let Err(e) = self.store.save(&SavedSession::from_account(&account)) {
                        warn!("Failed to persist session for later runs: {}", e);
                    }
                }

                info!("Signed in as {}", account.username);
                Ok(Session::Account(account))
            }
        }
    }
}
