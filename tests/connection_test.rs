//! Tests for the tracker connection handle lifecycle

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

use tokio_test::assert_ok;

use storlink::{ConnectionSettings, TrackerConnection, TrackerEndpoint};

fn direct() -> ConnectionSettings {
    ConnectionSettings::direct(Duration::from_secs(3))
}

async fn local_listener() -> (TcpListener, TrackerEndpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, TrackerEndpoint::new("127.0.0.1", port))
}

#[tokio::test]
async fn connect_establishes_transport() {
    let (listener, endpoint) = local_listener().await;
    let server = tokio::spawn(async move {
        let (_sock, _) = listener.accept().await.unwrap();
        sleep(Duration::from_secs(5)).await;
    });

    let mut conn = TrackerConnection::connect(endpoint, direct()).await.unwrap();
    assert!(conn.is_connected());
    assert!(conn.is_available());

    assert_ok!(conn.close().await);
    server.abort();
}

#[tokio::test]
async fn liveness_check_does_not_acquire() {
    let (listener, endpoint) = local_listener().await;

    let conn = TrackerConnection::new(endpoint, direct());
    assert!(!conn.is_connected());
    assert!(!conn.is_available());

    // no connection may have been opened as a side effect
    let accepted = timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err());
}

#[tokio::test]
async fn adopted_transport_is_served_unchanged() {
    let (listener, endpoint) = local_listener().await;

    let stream = TcpStream::connect(("127.0.0.1", endpoint.port()))
        .await
        .unwrap();
    let (_server_sock, _) = listener.accept().await.unwrap();
    let local = stream.local_addr().unwrap();

    let mut conn = TrackerConnection::with_stream(stream, endpoint, direct());
    let held = conn.acquire().await.unwrap();
    assert_eq!(held.local_addr().unwrap(), local);

    // acquisition must not have dialed a second connection
    let accepted = timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err());
}

#[tokio::test]
async fn close_clears_transport_and_is_idempotent() {
    let (listener, endpoint) = local_listener().await;
    let server = tokio::spawn(async move {
        let (_sock, _) = listener.accept().await.unwrap();
        sleep(Duration::from_secs(5)).await;
    });

    let mut conn = TrackerConnection::connect(endpoint, direct()).await.unwrap();
    assert!(conn.is_connected());

    conn.close().await.unwrap();
    assert!(!conn.is_connected());
    assert!(!conn.is_available());

    // second close finds an empty slot and is a no-op
    assert_ok!(conn.close().await);
    server.abort();
}

#[tokio::test]
async fn handle_reacquires_after_close() {
    let (listener, endpoint) = local_listener().await;
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((sock, _)) => held.push(sock),
                Err(_) => break,
            }
        }
    });

    let mut conn = TrackerConnection::connect(endpoint, direct()).await.unwrap();
    conn.close().await.unwrap();
    assert!(!conn.is_connected());

    conn.acquire().await.unwrap();
    assert!(conn.is_connected());

    conn.close().await.unwrap();
    server.abort();
}

#[tokio::test]
async fn failed_connect_fails_construction() {
    // bind then drop a listener so the port is known-closed
    let (listener, endpoint) = local_listener().await;
    drop(listener);

    let result = TrackerConnection::connect(endpoint, direct()).await;
    let err = result.err().expect("construction must fail");
    assert!(err.is_connect_failure());
}

#[tokio::test]
async fn split_gives_working_stream_halves() {
    let (listener, endpoint) = local_listener().await;
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 16];
        let n = sock.read(&mut buf).await.unwrap();
        sock.write_all(&buf[..n]).await.unwrap();
    });

    let mut conn = TrackerConnection::connect(endpoint, direct()).await.unwrap();
    let (mut reader, mut writer) = conn.split().await.unwrap();

    writer.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    conn.close().await.unwrap();
}

#[tokio::test]
async fn peer_half_close_makes_connection_unavailable() {
    let (listener, endpoint) = local_listener().await;
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        // shut down the server's write half, keep the socket alive
        sock.shutdown().await.unwrap();
        sleep(Duration::from_secs(5)).await;
    });

    let mut conn = TrackerConnection::connect(endpoint, direct()).await.unwrap();

    // give the FIN a moment to arrive
    sleep(Duration::from_millis(100)).await;

    assert!(conn.is_connected());
    assert!(!conn.is_available());

    conn.close().await.unwrap();
    server.abort();
}

#[tokio::test]
async fn last_access_time_is_settable() {
    let endpoint = TrackerEndpoint::new("tracker1", 22122);
    let mut conn = TrackerConnection::new(endpoint, direct());

    assert!(conn.last_access_time() > 0);
    conn.set_last_access_time(12345);
    assert_eq!(conn.last_access_time(), 12345);
}
