use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uplink_core::{MediaKind, UplinkError};

/// One media track, local or remote. The `enabled` flag is the mute state:
/// flipping it must stay consistent no matter how often it is re-applied.
#[derive(Debug)]
pub struct MediaTrack {
    id: String,
    kind: MediaKind,
    enabled: AtomicBool,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            kind,
            enabled: AtomicBool::new(true),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

/// A set of tracks treated as one media handle. Publish wraps the capture
/// device's tracks; subscribe accumulates remote tracks into one of these as
/// they arrive (arrival order carries no meaning).
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Arc<Mutex<Vec<Arc<MediaTrack>>>>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracks(tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self {
            tracks: Arc::new(Mutex::new(tracks)),
        }
    }

    pub fn add_track(&self, track: Arc<MediaTrack>) {
        self.tracks.lock().expect("media stream poisoned").push(track);
    }

    pub fn tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.tracks.lock().expect("media stream poisoned").clone()
    }

    pub fn tracks_of(&self, kind: MediaKind) -> Vec<Arc<MediaTrack>> {
        self.tracks()
            .into_iter()
            .filter(|t| t.kind() == kind)
            .collect()
    }

    pub fn has_kind(&self, kind: MediaKind) -> bool {
        !self.tracks_of(kind).is_empty()
    }

    /// Applies the enabled flag to every track of the given kind. Tracks of
    /// the other kind are untouched.
    pub fn set_enabled(&self, kind: MediaKind, enabled: bool) {
        for track in self.tracks_of(kind) {
            track.set_enabled(enabled);
        }
    }
}

/// Send-direction encoding hint, passed through to the peer capability
/// unvalidated. Defaults mirror the transceiver setup the reference client
/// uses when the caller supplies nothing.
#[derive(Debug, Clone)]
pub struct SendEncoding {
    pub rid: String,
    pub active: bool,
    pub max_bitrate: u32,
}

pub fn default_audio_encodings() -> Vec<SendEncoding> {
    vec![SendEncoding {
        rid: "q".to_string(),
        active: true,
        max_bitrate: 64_000,
    }]
}

pub fn default_video_encodings() -> Vec<SendEncoding> {
    vec![SendEncoding {
        rid: "q".to_string(),
        active: true,
        max_bitrate: 200_000,
    }]
}

/// One negotiated peer session: creates the local offer, applies the remote
/// answer, reports stats, releases transport resources on close.
///
/// This is the boundary to the media transport; the signaling layer never
/// sees what is behind it.
#[async_trait]
pub trait PeerSession: Send + Sync {
    async fn create_offer(&self) -> Result<String, UplinkError>;
    async fn apply_answer(&self, sdp: String) -> Result<(), UplinkError>;
    async fn stats(&self) -> Result<Value, UplinkError>;
    async fn close(&self);
}

/// Builds peer sessions for the two directions.
#[async_trait]
pub trait PeerFactory: Send + Sync {
    /// Send-only session carrying the given local tracks with per-kind
    /// encoding hints.
    async fn create_send_session(
        &self,
        media: MediaStream,
        audio_encodings: Vec<SendEncoding>,
        video_encodings: Vec<SendEncoding>,
    ) -> Result<Arc<dyn PeerSession>, UplinkError>;

    /// Receive-only session for the declared media kinds. Remote tracks
    /// arrive asynchronously on the returned receiver.
    async fn create_recv_session(
        &self,
        has_audio: bool,
        has_video: bool,
    ) -> Result<(Arc<dyn PeerSession>, mpsc::UnboundedReceiver<Arc<MediaTrack>>), UplinkError>;
}
