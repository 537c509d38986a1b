//! Behavior against a backend that refuses connections.
//!
//! Port 9 on loopback has no listener, so every call fails at transport
//! level without touching the network.

use std::sync::Arc;

use slr_client::ApiClient;
use slr_core::{
    ApiConfig, AutoSaveConfig, GenerationClient, Language, NoticeLevel, Notifier, RemoteCallError,
    ResponseOutcome, WizardError, WizardSession,
};

fn client() -> ApiClient {
    ApiClient::new(ApiConfig::new("http://127.0.0.1:9").with_token("test-token")).unwrap()
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    let err = client()
        .translate_text("hola", Language::Es, Language::En)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, RemoteCallError::Transport { endpoint, .. } if endpoint == "/api/ai/translate"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_session_survives_unreachable_backend() {
    let api = Arc::new(client());
    let (notifier, mut rx) = Notifier::channel();
    let session = WizardSession::new(api.clone(), api, notifier, AutoSaveConfig::default());

    assert_eq!(
        session.generate_titles().await.unwrap(),
        ResponseOutcome::Fallback
    );
    assert_eq!(session.titles().len(), 5);

    let before = session.data();
    assert!(matches!(
        session.generate_protocol_analysis().await,
        Err(WizardError::Remote(RemoteCallError::Transport { .. }))
    ));
    assert_eq!(session.data(), before);

    let mut levels = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        levels.push(notice.level);
    }
    assert_eq!(levels.last(), Some(&NoticeLevel::Error));
}
