use thiserror::Error;
use tracing::warn;

use crate::auth::{Credentials, LoginMode};
use crate::session_store::SessionStore;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CURATOR_PLEX_TOKEN is required for token login")]
    MissingToken,
    #[error("CURATOR_PLEX_URL is required for token login")]
    MissingUrl,
    #[error("CURATOR_PLEX_USERNAME and CURATOR_PLEX_PASSWORD are required for interactive login")]
    MissingCredentials,
}

/// Application configuration, read from the environment.
/// In debug builds a .env file is loaded first.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Explicitly configured login mode, if any.
    pub mode: Option<LoginMode>,
    pub plex_url: Option<String>,
    pub plex_token: Option<String>,
    pub plex_username: Option<String>,
    pub plex_password: Option<String>,
    /// Persist the session after an interactive login.
    pub remember: bool,
    /// Server to operate against when the account has several.
    pub preferred_server_id: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        if dotenvy::dotenv().is_ok() {
            tracing::debug!("Config: loaded .env file");
        }

        Self::from_env()
    }

    fn from_env() -> Self {
        Config {
            mode: non_empty_var("CURATOR_LOGIN_MODE").and_then(|v| parse_mode(&v)),
            plex_url: non_empty_var("CURATOR_PLEX_URL"),
            plex_token: non_empty_var("CURATOR_PLEX_TOKEN"),
            plex_username: non_empty_var("CURATOR_PLEX_USERNAME"),
            plex_password: non_empty_var("CURATOR_PLEX_PASSWORD"),
            remember: non_empty_var("CURATOR_PLEX_REMEMBER")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            preferred_server_id: non_empty_var("CURATOR_PLEX_SERVER"),
        }
    }

    /// The login mode for this run. A configured token always selects the
    /// headless path, whatever else is set.
    pub fn login_mode(&self) -> LoginMode {
        if self.plex_token.is_some() {
            return LoginMode::HeadlessToken;
        }
        self.mode.unwrap_or(LoginMode::Interactive)
    }

    /// Build the run's login credentials.
    pub fn credentials(&self, store: &SessionStore) -> Result<Credentials, ConfigError> {
        match self.login_mode() {
            LoginMode::HeadlessToken => {
                let token = self.plex_token.clone().ok_or(ConfigError::MissingToken)?;
                let url = self.plex_url.clone().ok_or(ConfigError::MissingUrl)?;
                Ok(Credentials::BearerToken { token, url })
            }
            LoginMode::Remembered => {
                let blob = match store.load() {
                    Ok(blob) => blob,
                    Err(e) => {
                        warn!("Failed to read saved session: {}", e);
                        None
                    }
                };
                Ok(Credentials::SavedSession { blob })
            }
            LoginMode::Interactive => match (&self.plex_username, &self.plex_password) {
                (Some(username), Some(password)) => Ok(Credentials::Password {
                    username: username.clone(),
                    password: password.clone(),
                }),
                _ => Err(ConfigError::MissingCredentials),
            },
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_mode(value: &str) -> Option<LoginMode> {
    match value.to_lowercase().as_str() {
        "interactive" => Some(LoginMode::Interactive),
        "remembered" => Some(LoginMode::Remembered),
        "token" => Some(LoginMode::HeadlessToken),
        other => {
            warn!("Config: unknown login mode {:?}, ignoring", other);
            None
        }
    }
}
