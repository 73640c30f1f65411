use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uplink_client::{MediaStream, MediaTrack, PeerFactory, PeerSession, SendEncoding};
use uplink_core::UplinkError;

/// Scripted peer session: deterministic offer, records every applied answer.
pub struct MockPeerSession {
    label: String,
    answers: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockPeerSession {
    fn new(label: String) -> Arc<Self> {
        Arc::new(Self {
            label,
            answers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerSession for MockPeerSession {
    async fn create_offer(&self) -> Result<String, UplinkError> {
        Ok(format!("offer-{}", self.label))
    }

    async fn apply_answer(&self, sdp: String) -> Result<(), UplinkError> {
        self.answers.lock().unwrap().push(sdp);
        Ok(())
    }

    async fn stats(&self) -> Result<Value, UplinkError> {
        Ok(json!({ "session": self.label }))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FactoryState {
    sessions: Vec<Arc<MockPeerSession>>,
    track_taps: Vec<mpsc::UnboundedSender<Arc<MediaTrack>>>,
    audio_encodings: Option<Vec<SendEncoding>>,
    video_encodings: Option<Vec<SendEncoding>>,
}

/// Peer capability seam for tests: hands out scripted sessions, remembers the
/// encoding hints it was given, and lets the test inject remote tracks into
/// receive sessions.
#[derive(Default)]
pub struct MockPeerFactory {
    state: Mutex<FactoryState>,
}

impl MockPeerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The n-th session this factory handed out, send and receive combined.
    pub fn session(&self, index: usize) -> Arc<MockPeerSession> {
        self.state.lock().unwrap().sessions[index].clone()
    }

    /// Feeds a remote track into the n-th receive session.
    pub fn inject_track(&self, index: usize, track: Arc<MediaTrack>) {
        let tap = self.state.lock().unwrap().track_taps[index].clone();
        tap.send(track).expect("receive session gone");
    }

    pub fn audio_encodings(&self) -> Option<Vec<SendEncoding>> {
        self.state.lock().unwrap().audio_encodings.clone()
    }

    pub fn video_encodings(&self) -> Option<Vec<SendEncoding>> {
        self.state.lock().unwrap().video_encodings.clone()
    }
}

#[async_trait]
impl PeerFactory for MockPeerFactory {
    async fn create_send_session(
        &self,
        _media: MediaStream,
        audio_encodings: Vec<SendEncoding>,
        video_encodings: Vec<SendEncoding>,
    ) -> Result<Arc<dyn PeerSession>, UplinkError> {
        let mut state = self.state.lock().unwrap();
        let session = MockPeerSession::new(format!("send-{}", state.sessions.len()));
        state.sessions.push(session.clone());
        state.audio_encodings = Some(audio_encodings);
        state.video_encodings = Some(video_encodings);
        Ok(session)
    }

    async fn create_recv_session(
        &self,
        _has_audio: bool,
        _has_video: bool,
    ) -> Result<(Arc<dyn PeerSession>, mpsc::UnboundedReceiver<Arc<MediaTrack>>), UplinkError>
    {
        let (track_tx, track_rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        let session = MockPeerSession::new(format!("recv-{}", state.sessions.len()));
        state.sessions.push(session.clone());
        state.track_taps.push(track_tx);
        Ok((session, track_rx))
    }
}
