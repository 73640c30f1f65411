use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uplink_core::{MediaKind, UplinkError};

use crate::integration::{
    init_tracing, joined_client, publish_stream, subscribe_stream, wait_until,
};
use crate::utils::MockSfu;
use uplink_client::MediaTrack;

fn capture(events: &Arc<Mutex<Vec<Value>>>) -> impl Fn(&Value) + Send + Sync + 'static {
    let events = events.clone();
    move |payload| events.lock().unwrap().push(payload.clone())
}

#[tokio::test]
async fn mute_disables_matching_tracks_and_tells_the_server() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;
    let stream = publish_stream(
        &mut sfu,
        &client,
        vec![
            MediaTrack::new("a0", MediaKind::Audio),
            MediaTrack::new("v0", MediaKind::Video),
        ],
    )
    .await;

    let events = Arc::new(Mutex::new(Vec::new()));
    stream.on("mute", capture(&events)).unwrap();

    stream.mute("audio").unwrap();

    let media = stream.media();
    assert!(!media.tracks_of(MediaKind::Audio)[0].is_enabled());
    assert!(media.tracks_of(MediaKind::Video)[0].is_enabled());

    let notification = sfu.recv_action("publish_muteOrUnmute").await;
    assert_eq!(notification["streamId"], "s1");
    assert_eq!(notification["muted"], true);
    assert_eq!(notification["type"], "audio");
    assert!(notification.get("transactionId").is_none());

    assert_eq!(*events.lock().unwrap(), vec![json!("audio")]);
}

#[tokio::test]
async fn unmute_restores_the_tracks_and_tells_the_server() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;
    let stream = publish_stream(
        &mut sfu,
        &client,
        vec![MediaTrack::new("v0", MediaKind::Video)],
    )
    .await;

    stream.mute("video").unwrap();
    sfu.recv_action("publish_muteOrUnmute").await;

    stream.unmute("video").unwrap();
    assert!(stream.media().tracks_of(MediaKind::Video)[0].is_enabled());

    let notification = sfu.recv_action("publish_muteOrUnmute").await;
    assert_eq!(notification["muted"], false);
    assert_eq!(notification["type"], "video");
}

#[tokio::test]
async fn invalid_kind_is_rejected_without_side_effects() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;
    let stream = publish_stream(
        &mut sfu,
        &client,
        vec![MediaTrack::new("a0", MediaKind::Audio)],
    )
    .await;

    let err = stream.mute("bogus").unwrap_err();
    assert!(matches!(err, UplinkError::Validation { .. }), "got {err:?}");

    assert!(stream.media().tracks_of(MediaKind::Audio)[0].is_enabled());
    let sent = sfu
        .try_recv_action("publish_muteOrUnmute", Duration::from_millis(200))
        .await;
    assert!(sent.is_none());
}

#[tokio::test]
async fn repeating_a_mute_is_not_a_toggle() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;
    let stream = publish_stream(
        &mut sfu,
        &client,
        vec![MediaTrack::new("a0", MediaKind::Audio)],
    )
    .await;

    stream.mute("audio").unwrap();
    stream.mute("audio").unwrap();

    // still muted, and the server heard about it both times
    assert!(!stream.media().tracks_of(MediaKind::Audio)[0].is_enabled());
    sfu.recv_action("publish_muteOrUnmute").await;
    let second = sfu.recv_action("publish_muteOrUnmute").await;
    assert_eq!(second["muted"], true);
}

#[tokio::test]
async fn subscribed_mute_stays_local() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, factory) = joined_client(&mut sfu).await;
    let stream = subscribe_stream(&mut sfu, &client, "p1", "sub1").await;

    factory.inject_track(0, MediaTrack::new("remote-a", MediaKind::Audio));
    wait_until(|| !stream.media().tracks().is_empty()).await;

    let events = Arc::new(Mutex::new(Vec::new()));
    stream.on("mute", capture(&events)).unwrap();

    stream.mute("audio").unwrap();
    assert!(!stream.media().tracks_of(MediaKind::Audio)[0].is_enabled());
    assert_eq!(*events.lock().unwrap(), vec![json!("audio")]);

    // nothing goes out on the wire for a subscriber-side mute
    let sent = sfu
        .try_recv_action("publish_muteOrUnmute", Duration::from_millis(200))
        .await;
    assert!(sent.is_none());
}

#[tokio::test]
async fn remote_mute_push_redispatches_on_the_matching_stream() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;
    let stream = subscribe_stream(&mut sfu, &client, "p1", "sub1").await;

    let events = Arc::new(Mutex::new(Vec::new()));
    stream.on("mute", capture(&events)).unwrap();

    sfu.send(json!({
        "type": "publishMuteOrUnmute",
        "data": { "publishStreamId": "p1", "muted": true, "type": "audio" }
    }));
    wait_until(|| !events.lock().unwrap().is_empty()).await;
    assert_eq!(*events.lock().unwrap(), vec![json!("audio")]);

    // a push for some other publish stream is not ours
    sfu.send(json!({
        "type": "publishMuteOrUnmute",
        "data": { "publishStreamId": "p2", "muted": true, "type": "video" }
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn remote_unmute_push_redispatches_as_unmute() {
    init_tracing();
    let mut sfu = MockSfu::start().await;
    let (client, _factory) = joined_client(&mut sfu).await;
    let stream = subscribe_stream(&mut sfu, &client, "p1", "sub1").await;

    let events = Arc::new(Mutex::new(Vec::new()));
    stream.on("unmute", capture(&events)).unwrap();

    sfu.send(json!({
        "type": "publishMuteOrUnmute",
        "data": { "publishStreamId": "p1", "muted": false, "type": "video" }
    }));
    wait_until(|| !events.lock().unwrap().is_empty()).await;
    assert_eq!(*events.lock().unwrap(), vec![json!("video")]);
}
