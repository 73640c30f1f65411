use crate::config::ClientConfig;
use crate::device::Device;
use crate::events::{EventDispatcher, EventPayload, ListenerId};
use crate::media::{
    self, MediaStream, PeerFactory, SendEncoding,
};
use crate::rtc::RtcPeerFactory;
use crate::signaling::SignalingChannel;
use crate::stream::{PublishedStream, SubscribedStream};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uplink_core::{
    ParticipantId, RemoteStreamInfo, RoomId, RoomInfo, SignalNotification, SignalRequest, StreamId,
    UplinkError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Joining,
    Joined,
    Leaving,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinReply {
    room_info: RoomInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NegotiateReply {
    answer: String,
    stream_id: StreamId,
}

struct ClientState {
    phase: Phase,
    signaling: Option<SignalingChannel>,
    participant_id: Option<ParticipantId>,
    push_listener: Option<ListenerId>,
}

struct ClientInner {
    config: ClientConfig,
    peers: Arc<dyn PeerFactory>,
    events: EventDispatcher,
    state: Mutex<ClientState>,
}

/// Top-level session orchestrator: join/leave lifecycle, stream negotiation,
/// room-level event fan-out.
///
/// The client exclusively owns the signaling channel; stream handles receive
/// shared references for scoped sends and pushes but never close it.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<ClientInner>,
}

impl SessionClient {
    /// Client backed by the native WebRTC peer capability.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_peer_factory(config, Arc::new(RtcPeerFactory::new()))
    }

    /// Client with a caller-supplied peer capability, the seam tests use.
    pub fn with_peer_factory(config: ClientConfig, peers: Arc<dyn PeerFactory>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                peers,
                events: EventDispatcher::new(),
                state: Mutex::new(ClientState {
                    phase: Phase::Idle,
                    signaling: None,
                    participant_id: None,
                    push_listener: None,
                }),
            }),
        }
    }

    /// Opens the signaling channel and joins the room. Returns the room
    /// snapshot: assigned identity plus the currently active remote streams.
    pub async fn join(
        &self,
        room_id: impl Into<RoomId>,
        participant_id: impl Into<ParticipantId>,
    ) -> Result<RoomInfo, UplinkError> {
        {
            let mut state = self.lock_state();
            if state.phase != Phase::Idle {
                return Err(UplinkError::state("already joined"));
            }
            state.phase = Phase::Joining;
        }

        let participant_id = participant_id.into();
        let channel = SignalingChannel::new(
            self.inner.config.keepalive_interval,
            self.inner.config.request_timeout,
        );

        let url = self.inner.config.signaling_url();
        match self
            .finish_join(&channel, url, room_id.into(), participant_id)
            .await
        {
            Ok(info) => Ok(info),
            Err(e) => {
                // the channel is unusable after a failed join; closing it
                // leaves the client free to retry
                channel.close();
                self.lock_state().phase = Phase::Idle;
                Err(e)
            }
        }
    }

    async fn finish_join(
        &self,
        channel: &SignalingChannel,
        url: String,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> Result<RoomInfo, UplinkError> {
        channel.open(&url).await?;

        let push_client = self.clone();
        let push_listener = channel.on_notification(move |raw| push_client.handle_push(raw))?;

        let reply = channel
            .send_request(&SignalRequest::Join {
                room_id: room_id.clone(),
                participant_id: participant_id.clone(),
            })
            .await?;

        let parsed: JoinReply = serde_json::from_value(reply).map_err(|e| UplinkError::Protocol {
            action: "join".to_string(),
            reason: format!("malformed reply: {e}"),
        })?;

        let assigned = if parsed.room_info.participant_id.as_str().is_empty() {
            participant_id
        } else {
            parsed.room_info.participant_id.clone()
        };
        info!(room = %room_id, participant = %assigned, "joined room");

        let mut state = self.lock_state();
        state.phase = Phase::Joined;
        state.signaling = Some(channel.clone());
        state.participant_id = Some(assigned);
        state.push_listener = Some(push_listener);
        Ok(parsed.room_info)
    }

    /// Negotiates an outbound stream carrying the device's tracks. Encoding
    /// parameters are passed through to the peer capability unvalidated;
    /// `None` selects the defaults.
    pub async fn publish(
        &self,
        device: &Device,
        audio_encodings: Option<Vec<SendEncoding>>,
        video_encodings: Option<Vec<SendEncoding>>,
    ) -> Result<PublishedStream, UplinkError> {
        let channel = self.joined_channel()?;

        let media = device.media();
        let session = self
            .inner
            .peers
            .create_send_session(
                media.clone(),
                audio_encodings.unwrap_or_else(media::default_audio_encodings),
                video_encodings.unwrap_or_else(media::default_video_encodings),
            )
            .await?;

        let offer = session.create_offer().await?;
        let reply = channel
            .send_request(&SignalRequest::Publish { offer })
            .await?;
        let negotiated: NegotiateReply =
            serde_json::from_value(reply).map_err(|e| UplinkError::Protocol {
                action: "publish".to_string(),
                reason: format!("malformed reply: {e}"),
            })?;

        session.apply_answer(negotiated.answer).await?;
        info!(stream = %negotiated.stream_id, "publish negotiated");

        Ok(PublishedStream::new(
            media,
            negotiated.stream_id,
            session,
            channel,
        ))
    }

    /// Negotiates a receive-only stream for the given remote descriptor.
    /// Remote tracks accumulate into the handle's media stream as they
    /// arrive; arrival order is not significant.
    pub async fn subscribe(
        &self,
        remote: &RemoteStreamInfo,
    ) -> Result<SubscribedStream, UplinkError> {
        let channel = self.joined_channel()?;

        let (session, mut tracks_rx) = self
            .inner
            .peers
            .create_recv_session(remote.has_audio, remote.has_video)
            .await?;

        let media = MediaStream::new();
        let sink = media.clone();
        tokio::spawn(async move {
            while let Some(track) = tracks_rx.recv().await {
                debug!(kind = %track.kind(), id = track.id(), "remote track arrived");
                sink.add_track(track);
            }
        });

        let offer = session.create_offer().await?;
        let reply = channel
            .send_request(&SignalRequest::Subscribe {
                stream_id: remote.publish_stream_id.clone(),
                participant_id: remote.participant_id.clone(),
                offer,
            })
            .await?;
        let negotiated: NegotiateReply =
            serde_json::from_value(reply).map_err(|e| UplinkError::Protocol {
                action: "subscribe".to_string(),
                reason: format!("malformed reply: {e}"),
            })?;

        session.apply_answer(negotiated.answer).await?;
        info!(stream = %negotiated.stream_id, of = %remote.publish_stream_id, "subscribe negotiated");

        SubscribedStream::new(
            channel,
            session,
            negotiated.stream_id,
            remote.publish_stream_id.clone(),
            media,
        )
    }

    /// Leaves the room and closes the signaling channel, rejecting any
    /// in-flight transactions. No-op when not joined.
    pub fn leave(&self) {
        let channel = {
            let mut state = self.lock_state();
            if state.phase != Phase::Joined {
                return;
            }
            state.phase = Phase::Leaving;
            state.participant_id = None;
            state.push_listener = None;
            state.signaling.take()
        };

        if let Some(channel) = channel {
            channel.close();
        }

        self.lock_state().phase = Phase::Idle;
        info!("left room");
    }

    pub fn is_joined(&self) -> bool {
        self.lock_state().phase == Phase::Joined
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.lock_state().participant_id.clone()
    }

    /// Registers a listener for room-level events: `streamAdded`,
    /// `participantJoined`, `participantLeft`.
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

    fn handle_push(&self, raw: &EventPayload) {
        let note: SignalNotification = match serde_json::from_value(raw.clone()) {
            Ok(note) => note,
            Err(e) => {
                debug!("ignoring unrecognized push notification: {e}");
                return;
            }
        };

        match note {
            SignalNotification::SignalingDisconnected => {
                warn!("signaling disconnected, leaving room");
                self.leave();
            }
            SignalNotification::StreamAdded(_)
            | SignalNotification::ParticipantJoined(_)
            | SignalNotification::ParticipantLeft(_) => {
                let data = raw.get("data").cloned().unwrap_or(Value::Null);
                self.inner.events.emit(note.kind(), &data);
            }
            // stream-scoped notifications are handled by the stream handles
            SignalNotification::PublishMuteOrUnmute(_)
            | SignalNotification::StreamRemoved { .. } => {}
        }
    }

    fn joined_channel(&self) -> Result<SignalingChannel, UplinkError> {
        let state = self.lock_state();
        if state.phase != Phase::Joined {
            return Err(UplinkError::state("not joined"));
        }
        state
            .signaling
            .clone()
            .ok_or_else(|| UplinkError::state("not joined"))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ClientState> {
        self.inner.state.lock().expect("client state poisoned")
    }
}
