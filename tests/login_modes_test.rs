#![cfg(feature = "test-utils")]

use std::sync::atomic::Ordering;
use std::sync::Arc;

use curator::auth::{Credentials, SessionAuthenticator, TwoFactorPrompt};
use curator::organizer::{ConnectError, Organizer};
use curator::plex::AuthError;
use curator::servers::ServerRegistryResolver;
use curator::session_store::{SavedSession, SessionStore};
use curator::test_support::{
    server_resource, tracing_init, MockDirectoryService, MockPrompt,
};

fn password_credentials() -> Credentials {
    Credentials::Password {
        username: "user".to_string(),
        password: "pass".to_string(),
    }
}

fn organizer_with(
    directory: Arc<MockDirectoryService>,
    prompt: Arc<MockPrompt>,
    store: SessionStore,
    credentials: Credentials,
    remember: bool,
) -> Organizer {
    let authenticator =
        SessionAuthenticator::new(directory.clone(), store, prompt, credentials, remember);
    let resolver = ServerRegistryResolver::new(directory, None);
    Organizer::new(authenticator, resolver)
}

#[tokio::test]
async fn interactive_login_succeeds_in_one_round_trip() {
    tracing_init();

    let directory = Arc::new(
        MockDirectoryService::new().with_resources(vec![server_resource("Media Box", "abc123")]),
    );
    let prompt = MockPrompt::refusing();
    let mut organizer = organizer_with(
        directory.clone(),
        prompt.clone(),
        SessionStore::in_memory(),
        password_credentials(),
        false,
    );

    let found = organizer.connect().await.unwrap();

    assert!(found);
    assert_eq!(directory.signin_calls.load(Ordering::SeqCst), 1);
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);
    assert!(organizer.registry().contains("abc123"));
}

#[tokio::test]
async fn interactive_two_factor_retries_exactly_once() {
    tracing_init();

    let directory = Arc::new(
        MockDirectoryService::new()
            .with_two_factor("123456")
            .with_resources(vec![server_resource("Media Box", "abc123")]),
    );
    let prompt = MockPrompt::answering("123456");
    let mut organizer = organizer_with(
        directory.clone(),
        prompt.clone(),
        SessionStore::in_memory(),
        password_credentials(),
        false,
    );

    assert!(organizer.connect().await.unwrap());

    // First attempt hit the challenge, second carried the code.
    assert_eq!(directory.signin_calls.load(Ordering::SeqCst), 2);
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn interactive_two_factor_without_a_code_is_fatal() {
    tracing_init();

    let directory = Arc::new(MockDirectoryService::new().with_two_factor("123456"));
    let prompt = MockPrompt::refusing();
    let mut organizer = organizer_with(
        directory.clone(),
        prompt.clone(),
        SessionStore::in_memory(),
        password_credentials(),
        false,
    );

    let err = organizer.connect().await.unwrap_err();
    assert!(matches!(
        err,
        ConnectError::Auth(AuthError::TwoFactorRequired)
    ));
    assert_eq!(directory.signin_calls.load(Ordering::SeqCst), 1);
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
    // Resolution never starts after a failed login.
    assert_eq!(directory.resources_calls.load(Ordering::SeqCst), 0);
    assert!(organizer.session().is_none());
}

#[tokio::test]
async fn interactive_wrong_code_fails_without_a_third_attempt() {
    tracing_init();

    let directory = Arc::new(MockDirectoryService::new().with_two_factor("123456"));
    let prompt = MockPrompt::answering("999999");
    let mut organizer = organizer_with(
        directory.clone(),
        prompt.clone(),
        SessionStore::in_memory(),
        password_credentials(),
        false,
    );

    let err = organizer.connect().await.unwrap_err();
    assert!(matches!(err, ConnectError::Auth(AuthError::Unauthorized)));
    assert_eq!(directory.signin_calls.load(Ordering::SeqCst), 2);
    assert_eq!(directory.resources_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remembered_login_without_a_blob_is_unauthorized() {
    tracing_init();

    let directory = Arc::new(MockDirectoryService::new());
    let mut organizer = organizer_with(
        directory.clone(),
        MockPrompt::refusing(),
        SessionStore::in_memory(),
        Credentials::SavedSession { blob: None },
        false,
    );

    let err = organizer.connect().await.unwrap_err();
    assert!(matches!(err, ConnectError::Auth(AuthError::Unauthorized)));

    // Nothing was attempted remotely, and resolution never ran.
    assert_eq!(directory.reconnect_calls.load(Ordering::SeqCst), 0);
    assert_eq!(directory.signin_calls.load(Ordering::SeqCst), 0);
    assert_eq!(directory.resources_calls.load(Ordering::SeqCst), 0);
    assert!(organizer.registry().is_empty());
}

#[tokio::test]
async fn remembered_login_with_a_rejected_blob_does_not_fall_back() {
    tracing_init();

    // The store has a blob, but the directory service no longer accepts it.
    let directory = Arc::new(MockDirectoryService::new().with_valid_token("other-token"));
    let saved = SavedSession {
        auth_token: "stale-token".to_string(),
        username: "user".to_string(),
        saved_at: chrono::Utc::now(),
    };
    let mut organizer = organizer_with(
        directory.clone(),
        MockPrompt::refusing(),
        SessionStore::in_memory(),
        Credentials::SavedSession { blob: Some(saved) },
        false,
    );

    let err = organizer.connect().await.unwrap_err();
    assert!(matches!(err, ConnectError::Auth(AuthError::Unauthorized)));
    assert_eq!(directory.reconnect_calls.load(Ordering::SeqCst), 1);
    // No silent fallback to interactive login.
    assert_eq!(directory.signin_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remembered_two_factor_demand_is_fatal_with_no_retry() {
    tracing_init();

    let directory = Arc::new(
        MockDirectoryService::new()
            .with_valid_token("stored-token")
            .with_reconnect_two_factor(),
    );
    let prompt = MockPrompt::answering("123456");
    let saved = SavedSession {
        auth_token: "stored-token".to_string(),
        username: "user".to_string(),
        saved_at: chrono::Utc::now(),
    };
    let mut organizer = organizer_with(
        directory.clone(),
        prompt.clone(),
        SessionStore::in_memory(),
        Credentials::SavedSession { blob: Some(saved) },
        false,
    );

    let err = organizer.connect().await.unwrap_err();
    assert!(matches!(
        err,
        ConnectError::Auth(AuthError::TwoFactorRequired)
    ));
    // The retry-with-code path is interactive-only.
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);
    assert_eq!(directory.reconnect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(directory.signin_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remember_flag_persists_the_session_after_interactive_login() {
    tracing_init();

    let directory = Arc::new(
        MockDirectoryService::new().with_resources(vec![server_resource("Media Box", "abc123")]),
    );
    let store = SessionStore::in_memory();
    let mut organizer = organizer_with(
        directory.clone(),
        MockPrompt::refusing(),
        store.clone(),
        password_credentials(),
        true,
    );

    assert!(organizer.connect().await.unwrap());

    let saved = store.load().unwrap().expect("session persisted");
    assert_eq!(saved.auth_token, "account-token");
    assert_eq!(saved.username, "user");
}

#[tokio::test]
async fn prompts_with_blank_codes_surface_the_challenge() {
    tracing_init();

    // A prompt can also yield nothing at all; make sure a scripted empty
    // answer behaves like a refusal at the authenticator level.
    struct BlankPrompt;

    #[async_trait::async_trait]
    impl TwoFactorPrompt for BlankPrompt {
        async fn verification_code(&self) -> Option<String> {
            None
        }
    }

    let directory = Arc::new(MockDirectoryService::new().with_two_factor("123456"));
    let authenticator = SessionAuthenticator::new(
        directory.clone(),
        SessionStore::in_memory(),
        Arc::new(BlankPrompt),
        password_credentials(),
        false,
    );

    let err = authenticator.login().await.unwrap_err();
    assert!(matches!(err, AuthError::TwoFactorRequired));
    assert_eq!(directory.signin_calls.load(Ordering::SeqCst), 1);
}
