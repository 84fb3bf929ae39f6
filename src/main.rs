use std::sync::Arc;

use tracing::{error, info};

use curator::auth::{SessionAuthenticator, StdinPrompt};
use curator::config::Config;
use curator::organizer::Organizer;
use curator::plex::PlexClient;
use curator::servers::ServerRegistryResolver;
use curator::session_store::SessionStore;

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let config = Config::load();

    let store = match SessionStore::new() {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open the session store: {}", e);
            std::process::exit(1);
        }
    };

    let credentials = match config.credentials(&store) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let directory = Arc::new(PlexClient::new());
    let authenticator = SessionAuthenticator::new(
        directory.clone(),
        store,
        Arc::new(StdinPrompt),
        credentials,
        config.remember,
    );
    let resolver = ServerRegistryResolver::new(directory, config.preferred_server_id.clone());
    let mut organizer = Organizer::new(authenticator, resolver);

    match organizer.connect().await {
        Ok(true) => {
            for server in organizer.registry().servers() {
                info!(
                    "Found server {} ({})",
                    server.friendly_name, server.machine_identifier
                );
            }
            if let Some(current) = organizer.registry().current_server() {
                info!(
                    "Operating against {} ({})",
                    current.friendly_name, current.machine_identifier
                );
            }
        }
        Ok(false) => {
            info!("Authenticated, but the account has no reachable servers");
        }
        Err(e) => {
            error!("Connection failed: {}", e);
            std::process::exit(1);
        }
    }
}
