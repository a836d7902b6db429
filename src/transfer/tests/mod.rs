use super::test_helpers::{Poll, ScriptedClient, candidate, multi_file_torrent, single_file_torrent};
use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(budget: u32) -> OrchestratorSettings {
    OrchestratorSettings {
        poll_interval: Duration::from_millis(2),
        missing_poll_budget: budget,
        category: Some("anime".into()),
    }
}

async fn serve(server: &MockServer, route: &str, body: Vec<u8>) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

fn orchestrator(client: Arc<ScriptedClient>, budget: u32) -> TransferOrchestrator {
    TransferOrchestrator::new(client, reqwest::Client::new(), settings(budget))
}

#[tokio::test]
async fn test_immediate_completion() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", single_file_torrent("show.mkv")).await;
    let client = Arc::new(ScriptedClient::new(vec![Poll::Complete], "/tmp/x"));

    let done = orchestrator(client.clone(), 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(done.payload_path, PathBuf::from("/tmp/x/show.mkv"));
    let hash = done.candidate.info_hash.clone().unwrap();
    assert_eq!(hash.len(), 40);
    assert_eq!(*client.deleted.lock().unwrap(), vec![hash]);
    assert_eq!(
        *client.added.lock().unwrap(),
        vec![("show.mkv".to_string(), Some("anime".to_string()))]
    );
}

#[tokio::test]
async fn test_five_missing_polls_then_complete_succeeds() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", single_file_torrent("show.mkv")).await;
    let mut script = vec![Poll::Missing; 5];
    script.push(Poll::Complete);
    let client = Arc::new(ScriptedClient::new(script, "/tmp/x"));

    let done = orchestrator(client.clone(), 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap();

    let hash = done.candidate.info_hash.unwrap();
    assert_eq!(client.polls_for(&hash), 6);
}

#[tokio::test]
async fn test_sixth_missing_poll_fails_as_disappeared() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", single_file_torrent("show.mkv")).await;
    let mut script = vec![Poll::Missing; 6];
    script.push(Poll::Complete);
    let client = Arc::new(ScriptedClient::new(script, "/tmp/x"));

    let err = orchestrator(client.clone(), 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TransferError::Disappeared {
            missed_polls: 6,
            ..
        }
    ));
    assert_eq!(err.kind(), crate::error::FailureKind::TransferClient);
    assert!(client.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_counter_resets_when_job_reappears() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", single_file_torrent("show.mkv")).await;
    let mut script = vec![Poll::Missing; 4];
    script.push(Poll::Active);
    script.extend([Poll::Missing; 4]);
    script.push(Poll::Complete);
    let client = Arc::new(ScriptedClient::new(script, "/tmp/x"));

    let result = orchestrator(client, 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_errored_job_fails_immediately() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", single_file_torrent("show.mkv")).await;
    let client = Arc::new(ScriptedClient::new(
        vec![Poll::Active, Poll::Errored, Poll::Complete],
        "/tmp/x",
    ));

    let err = orchestrator(client, 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Errored { .. }));
}

#[tokio::test]
async fn test_add_rejected_is_a_client_failure() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", single_file_torrent("show.mkv")).await;
    let client = Arc::new(ScriptedClient::new(vec![Poll::Complete], "/tmp/x").rejecting("show.mkv"));

    let err = orchestrator(client.clone(), 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::AddRejected { .. }));
    assert_eq!(err.kind(), crate::error::FailureKind::TransferClient);
    assert!(err.to_string().contains("failed to add torrent"));
}

#[tokio::test]
async fn test_descriptor_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let client = Arc::new(ScriptedClient::new(vec![Poll::Complete], "/tmp/x"));
    let link = format!("{}/download/404.torrent", server.uri());

    let err = orchestrator(client.clone(), 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        TransferError::DescriptorFetch { status, .. } => assert_eq!(status, "404"),
        other => panic!("Expected DescriptorFetch, got {other:?}"),
    }
    assert!(client.added.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_descriptor() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", b"<html>nope</html>".to_vec()).await;
    let client = Arc::new(ScriptedClient::new(vec![Poll::Complete], "/tmp/x"));

    let err = orchestrator(client, 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::InvalidDescriptor { .. }));
    assert_eq!(err.kind(), crate::error::FailureKind::TransferDescriptor);
}

#[tokio::test]
async fn test_multi_file_descriptor_is_refused() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/batch.torrent", multi_file_torrent()).await;
    let client = Arc::new(ScriptedClient::new(vec![Poll::Complete], "/tmp/x"));

    let err = orchestrator(client.clone(), 5)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::TooManyFiles { count: 2, .. }));
    assert!(client.added.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_client_exhausts_budget() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", single_file_torrent("show.mkv")).await;
    let client = Arc::new(ScriptedClient::new(vec![Poll::Fail], "/tmp/x"));

    let err = orchestrator(client, 2)
        .run(candidate("show", 5, link), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Client { .. }));
}

#[tokio::test]
async fn test_cancellation_stops_polling() {
    let server = MockServer::start().await;
    let link = serve(&server, "/download/1.torrent", single_file_torrent("show.mkv")).await;
    let client = Arc::new(ScriptedClient::new(vec![Poll::Active], "/tmp/x"));
    let cancel = CancellationToken::new();

    let orchestrator = orchestrator(client, 5);
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = orchestrator
        .run(candidate("show", 5, link), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Cancelled { .. }));
}

#[tokio::test]
async fn test_cancelled_before_start_does_nothing() {
    let client = Arc::new(ScriptedClient::new(vec![Poll::Complete], "/tmp/x"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator(client.clone(), 5)
        .run(
            candidate("show", 5, "http://127.0.0.1:9/never.torrent".into()),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Cancelled { .. }));
    assert!(client.added.lock().unwrap().is_empty());
}
