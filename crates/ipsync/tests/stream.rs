//! Sessions over a real WebSocket served from a local listener.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ipsync::{
    IpDelta, IpRecord, MemorySnapshotStore, SyncSession, SyncState, WebSocketConnector,
};
use ipsync_testkit::{delta_frame, snapshot_frame, test_config, ScriptedFetcher, StateRecorder};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Serve `frames` to the first client, then keep the socket open until the
/// client goes away.
async fn serve(frames: Vec<Message>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    format!("ws://{}/qos/stream", addr)
}

#[tokio::test]
async fn undecodable_binary_frame_does_not_drop_the_connection() {
    let url = serve(vec![
        Message::Text(snapshot_frame(1, &[IpRecord::new("10.0.0.1")]).to_string()),
        Message::Binary(vec![0xff, 0xfe]),
        Message::Text(delta_frame(&IpDelta::new("10.0.0.9").download_rate(2.5)).to_string()),
    ])
    .await;

    let fetcher = ScriptedFetcher::new();
    let _hold = fetcher.push_pending();
    let handle = SyncSession::new(
        test_config().with_stream_url(url.as_str()),
        WebSocketConnector::new(url),
        fetcher,
        Arc::new(MemorySnapshotStore::new()),
    )
    .start(StateRecorder::new());

    let mut rx = handle.subscribe();
    let waited = tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|s: &SyncState| s.ip("10.0.0.9").is_some()),
    )
    .await;
    let state = match waited {
        Ok(Ok(state)) => state.clone(),
        _ => panic!("delta after the bad frame never arrived: {:?}", handle.get_state()),
    };

    assert!(state.is_connected);
    assert_eq!(state.error, None);
    assert_eq!(state.sequence, 1);
    assert_eq!(state.ips.len(), 2);
    handle.close();
}
