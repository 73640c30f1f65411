use crate::events::{EventDispatcher, EventPayload, ListenerId};
use crate::media::{MediaStream, PeerSession};
use crate::signaling::SignalingChannel;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uplink_core::{MediaKind, SignalNotification, SignalRequest, StreamId, UplinkError};

struct PublishedInner {
    stream_id: StreamId,
    media: MediaStream,
    session: Mutex<Option<Arc<dyn PeerSession>>>,
    signaling: SignalingChannel,
    events: EventDispatcher,
}

/// Outbound negotiated stream. Mute/unmute toggle the local tracks and tell
/// the server so other participants learn about it.
#[derive(Clone)]
pub struct PublishedStream {
    inner: Arc<PublishedInner>,
}

impl PublishedStream {
    pub(crate) fn new(
        media: MediaStream,
        stream_id: StreamId,
        session: Arc<dyn PeerSession>,
        signaling: SignalingChannel,
    ) -> Self {
        Self {
            inner: Arc::new(PublishedInner {
                stream_id,
                media,
                session: Mutex::new(Some(session)),
                signaling,
                events: EventDispatcher::new(),
            }),
        }
    }

    /// Server-assigned publish stream id.
    pub fn id(&self) -> &StreamId {
        &self.inner.stream_id
    }

    pub fn media(&self) -> MediaStream {
        self.inner.media.clone()
    }

    pub fn mute(&self, kind: &str) -> Result<(), UplinkError> {
        self.set_muted(kind, true)
    }

    pub fn unmute(&self, kind: &str) -> Result<(), UplinkError> {
        self.set_muted(kind, false)
    }

    fn set_muted(&self, kind: &str, muted: bool) -> Result<(), UplinkError> {
        let kind = MediaKind::parse(kind)?;
        self.inner.media.set_enabled(kind, !muted);

        // fire-and-forget so other participants get told; a send failure is
        // not surfaced, the local state change already happened
        let notification = SignalRequest::PublishMuteOrUnmute {
            stream_id: self.inner.stream_id.clone(),
            muted,
            kind,
        };
        if let Err(e) = self.inner.signaling.send_notification(&notification) {
            warn!(stream = %self.inner.stream_id, "mute notification not sent: {e}");
        }

        let event = if muted { "mute" } else { "unmute" };
        self.inner.events.emit(event, &json!(kind.as_str()));
        Ok(())
    }

    /// Releases the negotiated session. A second call is a no-op.
    pub async fn close(&self) {
        let session = {
            self.inner
                .session
                .lock()
                .expect("published stream poisoned")
                .take()
        };
        if let Some(session) = session {
            session.close().await;
        }
    }

    pub async fn stats(&self) -> Result<Value, UplinkError> {
        let session = {
            self.inner
                .session
                .lock()
                .expect("published stream poisoned")
                .clone()
        };
        match session {
            Some(session) => session.stats().await,
            None => Err(UplinkError::state("session not available")),
        }
    }

    pub fn on(
        &self,
        event: &str,
        listener: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> Result<ListenerId, UplinkError> {
        self.inner.events.on(event, listener)
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.events.off(event, id)
    }
}

impl std::fmt::Debug for PublishedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishedStream")
            .field("stream_id", &self.inner.stream_id)
            .finish_non_exhaustive()
    }
}

struct SubscribedInner {
    subscribe_id: StreamId,
    publish_id: StreamId,
    media: MediaStream,
    session: Mutex<Option<Arc<dyn PeerSession>>>,
    signaling: SignalingChannel,
    events: EventDispatcher,
    channel_listeners: Mutex<Vec<ListenerId>>,
    ended: AtomicBool,
}

/// Inbound negotiated stream. Reacts to push notifications scoped to the
/// publish stream it tracks: remote mute state re-dispatches as local
/// `mute`/`unmute` events, `streamRemoved` closes the handle and emits a
/// terminal `ended` exactly once.
#[derive(Clone)]
pub struct SubscribedStream {
    inner: Arc<SubscribedInner>,
}

impl SubscribedStream {
    pub(crate) fn new(
        signaling: SignalingChannel,
        session: Arc<dyn PeerSession>,
        subscribe_id: StreamId,
        publish_id: StreamId,
        media: MediaStream,
    ) -> Result<Self, UplinkError> {
        let stream = Self {
            inner: Arc::new(SubscribedInner {
                subscribe_id,
                publish_id,
                media,
                session: Mutex::new(Some(session)),
                signaling: signaling.clone(),
                events: EventDispatcher::new(),
                channel_listeners: Mutex::new(Vec::new()),
                ended: AtomicBool::new(false),
            }),
        };

        let handle = stream.clone();
        let mute_listener = signaling.on_notification(move |raw| handle.handle_mute_push(raw))?;
        let handle = stream.clone();
        let removed_listener =
            signaling.on_notification(move |raw| handle.handle_removed_push(raw))?;
        stream
            .inner
            .channel_listeners
            .lock()
            .expect("subscribed stream poisoned")
            .extend([mute_listener, removed_listener]);

        Ok(stream)
    }

    /// Server-assigned subscribe stream id.
    pub fn id(&self) -> &StreamId {
        &self.inner.subscribe_id
    }

    /// The publish stream this subscription tracks.
    pub fn publish_id(&self) -> &StreamId {
        &self.inner.publish_id
    }

    pub fn media(&self) -> MediaStream {
        self.inner.media.clone()
    }

    /// Local toggle only. Remote mute state arrives via push notification,
    /// never via an outbound call from the subscriber.
    pub fn mute(&self, kind: &str) -> Result<(), UplinkError> {
        self.set_enabled(kind, false)
    }

    pub fn unmute(&self, kind: &str) -> Result<(), UplinkError> {
        self.set_enabled(kind, true)
    }

    fn set_enabled(&self, kind: &str, enabled: bool) -> Result<(), UplinkError> {
        let kind = MediaKind::parse(kind)?;
        self.inner.media.set_enabled(kind, enabled);
        let event = if enabled { "unmute" } else { "mute" };
        self.inner.events.emit(event, &json!(kind.as_str()));
        Ok(())
    }

    /// Releases the negotiated session and emits the terminal `ended` event.
    /// A second call is a no-op.
    pub async fn close(&self) {
        let session = {
            self.inner
                .session
                .lock()
                .expect("subscribed stream poisoned")
                .take()
        };

        let listeners: Vec<ListenerId> = {
            self.inner
                .channel_listeners
                .lock()
                .expect("subscribed stream poisoned")
                .drain(..)
                .collect()
        };
        for id in listeners {
            self.inner.signaling.off_notification(id);
        }

        if let Some(session) = session {
            session.close().await;
        }
        self.emit_ended();
    }

    pub async fn stats(&self) -> Result<Value, UplinkError> {
        let session = {
            self.inner
                .session
                .lock()
                .expect("subscribed stream poisoned")
                .clone()
        };
        match session {
            Some(session) => session.stats().await,
            None => Err(UplinkError::state("session not available")),
        }
    }

    pub fn on(
        &self,
        event: &str,
        listener: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> Result<ListenerId, UplinkError> {
        self.inner.events.on(event, listener)
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.events.off(event, id)
    }

    fn handle_mute_push(&self, raw: &EventPayload) {
        let Ok(SignalNotification::PublishMuteOrUnmute(info)) =
            serde_json::from_value::<SignalNotification>(raw.clone())
        else {
            return;
        };
        if info.publish_stream_id != self.inner.publish_id {
            return;
        }

        let event = if info.muted { "mute" } else { "unmute" };
        debug!(stream = %self.inner.subscribe_id, kind = %info.kind, event, "remote mute state changed");
        self.inner.events.emit(event, &json!(info.kind.as_str()));
    }

    fn handle_removed_push(&self, raw: &EventPayload) {
        let Ok(SignalNotification::StreamRemoved { publish_stream_id }) =
            serde_json::from_value::<SignalNotification>(raw.clone())
        else {
            return;
        };
        if publish_stream_id != self.inner.publish_id {
            return;
        }

        debug!(stream = %self.inner.subscribe_id, "publish stream removed, closing");
        let handle = self.clone();
        tokio::spawn(async move {
            handle.close().await;
        });
    }

    fn emit_ended(&self) {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner
            .events
            .emit("ended", &json!(self.inner.subscribe_id.as_str()));
    }
}

impl std::fmt::Debug for SubscribedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscribedStream")
            .field("subscribe_id", &self.inner.subscribe_id)
            .field("publish_id", &self.inner.publish_id)
            .finish_non_exhaustive()
    }
}
