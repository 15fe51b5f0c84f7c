//! WebSocket transport against a local server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ipsync_client::{StreamConnector, SyncError, WebSocketConnector};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Accept one connection, send `frames`, then close.
async fn serve_once(frames: Vec<Message>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        ws.close(None).await.unwrap();
        // Drive the close handshake.
        while let Some(Ok(_)) = ws.next().await {}
    });

    format!("ws://{}/qos/stream", addr)
}

#[tokio::test]
async fn text_frames_are_delivered_in_order() {
    let url = serve_once(vec![
        Message::Text(r#"{"type":"ip","ip_stat":{"ip":"10.0.0.1"}}"#.into()),
        Message::Ping(vec![1, 2, 3]),
        Message::Binary(br#"{"type":"global","global_stat":{}}"#.to_vec()),
    ])
    .await;

    let connector = WebSocketConnector::new(url);
    let mut conn = connector.connect().await.unwrap();

    let first = conn.recv().await.unwrap().unwrap();
    assert!(first.contains("10.0.0.1"));

    let second = conn.recv().await.unwrap().unwrap();
    assert!(second.contains("global"));

    assert!(conn.recv().await.is_none());
}

#[tokio::test]
async fn non_utf8_binary_frame_is_skipped() {
    let url = serve_once(vec![
        Message::Binary(vec![0xff, 0xfe, 0xfd]),
        Message::Text(r#"{"type":"ip","ip_stat":{"ip":"10.0.0.9"}}"#.into()),
    ])
    .await;

    let mut conn = WebSocketConnector::new(url).connect().await.unwrap();
    let frame = conn.recv().await.unwrap().unwrap();
    assert!(frame.contains("10.0.0.9"));
    assert!(conn.recv().await.is_none());
}

#[tokio::test]
async fn client_close_completes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut conn = WebSocketConnector::new(format!("ws://{}/", addr))
        .connect()
        .await
        .unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn close_gives_up_on_silent_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let _ws = accept_async(tcp).await.unwrap();
        // Hold the socket without ever reading the close frame.
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let mut conn = WebSocketConnector::new(format!("ws://{}/", addr))
        .with_close_timeout(Duration::from_millis(200))
        .connect()
        .await
        .unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(10), conn.close())
        .await
        .expect("close must not wait on the peer forever");
    assert!(matches!(closed, Err(SyncError::Timeout(_))));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = WebSocketConnector::new(format!("ws://{}/qos/stream", addr))
        .connect()
        .await;
    assert!(matches!(result, Err(SyncError::Transport(_))));
}
