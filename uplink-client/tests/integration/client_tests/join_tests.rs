use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uplink_core::UplinkError;

use crate::integration::{init_tracing, joined_client, test_config, wait_until};
use crate::utils::{MockPeerFactory, MockSfu};
use uplink_client::SessionClient;

#[tokio::test]
async fn join_returns_the_room_snapshot() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let client = SessionClient::with_peer_factory(
        test_config(&sfu),
        Arc::new(MockPeerFactory::new()),
    );

    let join = tokio::spawn({
        let client = client.clone();
        async move { client.join("room-1", "alice").await }
    });

    let request = sfu.recv_action("join").await;
    assert_eq!(request["roomId"], "room-1");
    assert_eq!(request["participantId"], "alice");

    sfu.reply(
        &request,
        json!({
            "roomInfo": {
                "participantId": "alice-1",
                "streams": [{
                    "publishStreamId": "p1",
                    "participantId": "bob",
                    "hasAudio": true,
                    "hasVideo": false
                }]
            }
        }),
    );

    let info = join.await.unwrap().unwrap();
    assert_eq!(info.streams.len(), 1);
    assert_eq!(info.streams[0].publish_stream_id.as_str(), "p1");
    assert!(info.streams[0].has_audio);
    assert!(!info.streams[0].has_video);

    assert!(client.is_joined());
    // the server reassigned the identity
    assert_eq!(client.participant_id().unwrap().as_str(), "alice-1");
}

#[tokio::test]
async fn join_while_joined_is_a_state_error() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;

    let err = client.join("room-2", "alice").await.unwrap_err();
    assert!(matches!(err, UplinkError::State(_)), "got {err:?}");
    assert!(client.is_joined());
}

#[tokio::test]
async fn failed_join_leaves_the_client_free_to_retry() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let client = SessionClient::with_peer_factory(
        test_config(&sfu),
        Arc::new(MockPeerFactory::new()),
    );

    let join = tokio::spawn({
        let client = client.clone();
        async move { client.join("room-1", "alice").await }
    });
    let request = sfu.recv_action("join").await;
    sfu.reply(&request, json!({ "error": true, "reason": "unknown room" }));

    let err = join.await.unwrap().unwrap_err();
    assert!(matches!(err, UplinkError::Protocol { .. }), "got {err:?}");
    assert!(!client.is_joined());

    // second attempt comes in on a fresh connection
    let retry = tokio::spawn({
        let client = client.clone();
        async move { client.join("room-1", "alice").await }
    });
    let request = sfu.recv_action("join").await;
    sfu.reply(
        &request,
        json!({ "roomInfo": { "participantId": "alice", "streams": [] } }),
    );
    retry.await.unwrap().unwrap();
    assert!(client.is_joined());
}

#[tokio::test]
async fn remote_disconnect_leaves_the_room_automatically() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;

    sfu.drop_connection();
    wait_until(|| !client.is_joined()).await;
    assert!(client.participant_id().is_none());
}

#[tokio::test]
async fn leave_is_idempotent() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;

    client.leave();
    assert!(!client.is_joined());
    client.leave();
    assert!(!client.is_joined());
}

#[tokio::test]
async fn room_events_are_reemitted_with_their_payload() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Value>();
    client
        .on("streamAdded", move |payload| {
            let _ = seen_tx.send(payload.clone());
        })
        .unwrap();

    let data = json!({
        "publishStreamId": "p9",
        "participantId": "carol",
        "hasAudio": true,
        "hasVideo": true
    });
    sfu.send(json!({ "type": "streamAdded", "data": data }));

    let payload = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .expect("no streamAdded event")
        .unwrap();
    assert_eq!(payload, data);
}

#[tokio::test]
async fn participant_events_are_reemitted() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Value>();
    client
        .on("participantLeft", move |payload| {
            let _ = seen_tx.send(payload.clone());
        })
        .unwrap();

    sfu.send(json!({ "type": "participantLeft", "data": { "participantId": "bob" } }));

    let payload = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .expect("no participantLeft event")
        .unwrap();
    assert_eq!(payload["participantId"], "bob");
}
