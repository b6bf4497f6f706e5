use std::net::SocketAddr;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use firds_fetch::{download_archive, fetch, http_client, FetchError};
use tempfile::TempDir;

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

#[tokio::test]
async fn fetch_returns_body_on_success() {
    let addr = serve(Router::new().route("/DLTINS.zip", get(|| async { "payload" }))).await;
    let client = http_client(Some(Duration::from_secs(5))).unwrap();

    let body = fetch(&client, &format!("http://{addr}/DLTINS.zip")).await.unwrap();

    assert_eq!(&body[..], b"payload");
}

#[tokio::test]
async fn not_found_is_a_network_error_and_writes_nothing() {
    let addr = serve(Router::new()).await;
    let client = http_client(None).unwrap();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("DLTINS.zip");

    let err = download_archive(&client, &format!("http://{addr}/DLTINS.zip"), &destination)
        .await
        .unwrap_err();

    assert!(err.is_network());
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert!(!destination.exists());
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = http_client(Some(Duration::from_secs(5))).unwrap();

    let err = fetch(&client, &format!("http://{addr}/DLTINS.zip")).await.unwrap_err();

    assert!(matches!(err, FetchError::Network { .. }));
    assert!(err.is_network());
}

#[tokio::test]
async fn download_archive_saves_payload() {
    let addr = serve(Router::new().route("/DLTINS.zip", get(|| async { vec![1u8, 2, 3] }))).await;
    let client = http_client(None).unwrap();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("DLTINS.zip");

    let body = download_archive(&client, &format!("http://{addr}/DLTINS.zip"), &destination)
        .await
        .unwrap();

    assert_eq!(&body[..], &[1, 2, 3]);
    assert_eq!(std::fs::read(&destination).unwrap(), vec![1, 2, 3]);
}
