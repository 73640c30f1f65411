//! Native peer capability backed by the `webrtc` crate.

use crate::media::{MediaStream, MediaTrack, PeerFactory, PeerSession, SendEncoding};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uplink_core::{MediaKind, UplinkError};
use webrtc::api::API;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;

fn to_transport(e: webrtc::Error) -> UplinkError {
    UplinkError::transport(format!("peer connection: {e}"))
}

/// Builds `webrtc`-backed peer sessions.
pub struct RtcPeerFactory {
    ice_servers: Vec<String>,
}

impl RtcPeerFactory {
    pub fn new() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }

    pub fn with_ice_servers(ice_servers: Vec<String>) -> Self {
        Self { ice_servers }
    }

    fn build_api(&self) -> Result<API, UplinkError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(to_transport)?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(to_transport)?;

        Ok(APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build())
    }

    async fn new_peer_connection(&self) -> Result<Arc<RTCPeerConnection>, UplinkError> {
        let api = self.build_api()?;

        let ice_servers = if self.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };

        let config = RTCConfiguration {
            ice_servers,
            bundle_policy: RTCBundlePolicy::MaxBundle,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await.map_err(to_transport)?);

        pc.on_peer_connection_state_change(Box::new(move |state| {
            Box::pin(async move {
                info!("peer connection state: {state}");
            })
        }));

        Ok(pc)
    }
}

impl Default for RtcPeerFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn transceiver_init(direction: RTCRtpTransceiverDirection) -> RTCRtpTransceiverInit {
    // encoding hints (rid/bitrate) are negotiated parameters the SFU reads
    // from the offer; webrtc-rs takes no per-encoding setup here
    RTCRtpTransceiverInit {
        direction,
        send_encodings: vec![],
    }
}

#[async_trait]
impl PeerFactory for RtcPeerFactory {
    async fn create_send_session(
        &self,
        media: MediaStream,
        _audio_encodings: Vec<SendEncoding>,
        _video_encodings: Vec<SendEncoding>,
    ) -> Result<Arc<dyn PeerSession>, UplinkError> {
        let pc = self.new_peer_connection().await?;

        if media.has_kind(MediaKind::Audio) {
            pc.add_transceiver_from_kind(
                RTPCodecType::Audio,
                Some(transceiver_init(RTCRtpTransceiverDirection::Sendonly)),
            )
            .await
            .map_err(to_transport)?;
        }
        if media.has_kind(MediaKind::Video) {
            pc.add_transceiver_from_kind(
                RTPCodecType::Video,
                Some(transceiver_init(RTCRtpTransceiverDirection::Sendonly)),
            )
            .await
            .map_err(to_transport)?;
        }

        Ok(Arc::new(RtcPeerSession { pc }))
    }

    async fn create_recv_session(
        &self,
        has_audio: bool,
        has_video: bool,
    ) -> Result<(Arc<dyn PeerSession>, mpsc::UnboundedReceiver<Arc<MediaTrack>>), UplinkError>
    {
        let pc = self.new_peer_connection().await?;

        if has_audio {
            pc.add_transceiver_from_kind(
                RTPCodecType::Audio,
                Some(transceiver_init(RTCRtpTransceiverDirection::Recvonly)),
            )
            .await
            .map_err(to_transport)?;
        }
        if has_video {
            pc.add_transceiver_from_kind(
                RTPCodecType::Video,
                Some(transceiver_init(RTCRtpTransceiverDirection::Recvonly)),
            )
            .await
            .map_err(to_transport)?;
        }

        let (track_tx, track_rx) = mpsc::unbounded_channel();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let track_tx = track_tx.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => MediaKind::Audio,
                    RTPCodecType::Video => MediaKind::Video,
                    _ => return,
                };
                debug!(kind = %kind, ssrc = track.ssrc(), "remote track");
                let _ = track_tx.send(MediaTrack::new(track.id(), kind));
            })
        }));

        Ok((Arc::new(RtcPeerSession { pc }), track_rx))
    }
}

struct RtcPeerSession {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerSession for RtcPeerSession {
    async fn create_offer(&self) -> Result<String, UplinkError> {
        let offer = self.pc.create_offer(None).await.map_err(to_transport)?;
        self.pc
            .set_local_description(offer.clone())
            .await
            .map_err(to_transport)?;
        Ok(offer.sdp)
    }

    async fn apply_answer(&self, sdp: String) -> Result<(), UplinkError> {
        let answer = RTCSessionDescription::answer(sdp).map_err(to_transport)?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(to_transport)
    }

    async fn stats(&self) -> Result<Value, UplinkError> {
        let report = self.pc.get_stats().await;
        serde_json::to_value(&report.reports)
            .map_err(|e| UplinkError::transport(format!("stats: {e}")))
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("peer connection close: {e}");
        }
    }
}
