use crate::model::{MediaKind, ParticipantId, RemoteStreamInfo, RoomId, StreamId};
use serde::{Deserialize, Serialize};

/// Outbound signaling message, tagged by `action` on the wire.
///
/// RPC actions (`join`, `publish`, `subscribe`) additionally carry a
/// `transactionId` that the signaling channel attaches at send time; it is
/// not part of the model. `publish_muteOrUnmute` and `keepAlive` are
/// fire-and-forget notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SignalRequest {
    #[serde(rename_all = "camelCase")]
    Join {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    Publish {
        offer: String,
    },
    #[serde(rename_all = "camelCase")]
    Subscribe {
        stream_id: StreamId,
        participant_id: ParticipantId,
        offer: String,
    },
    #[serde(rename = "publish_muteOrUnmute", rename_all = "camelCase")]
    PublishMuteOrUnmute {
        stream_id: StreamId,
        muted: bool,
        #[serde(rename = "type")]
        kind: MediaKind,
    },
    KeepAlive,
}

impl SignalRequest {
    /// Wire name of the action, for logging and error context.
    pub fn action(&self) -> &'static str {
        match self {
            SignalRequest::Join { .. } => "join",
            SignalRequest::Publish { .. } => "publish",
            SignalRequest::Subscribe { .. } => "subscribe",
            SignalRequest::PublishMuteOrUnmute { .. } => "publish_muteOrUnmute",
            SignalRequest::KeepAlive => "keepAlive",
        }
    }
}

/// Payload of a `publishMuteOrUnmute` push notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteInfo {
    pub publish_stream_id: StreamId,
    pub muted: bool,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

/// Participant payload of `participantJoined` / `participantLeft`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub participant_id: ParticipantId,
}

/// Server push notification, tagged by `type` with the payload under `data`.
///
/// A message carrying a `transactionId` is never one of these; the channel
/// settles it against the pending-transaction table instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SignalNotification {
    StreamAdded(RemoteStreamInfo),
    ParticipantJoined(ParticipantInfo),
    ParticipantLeft(ParticipantInfo),
    SignalingDisconnected,
    PublishMuteOrUnmute(MuteInfo),
    #[serde(rename_all = "camelCase")]
    StreamRemoved {
        publish_stream_id: StreamId,
    },
}

impl SignalNotification {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalNotification::StreamAdded(_) => "streamAdded",
            SignalNotification::ParticipantJoined(_) => "participantJoined",
            SignalNotification::ParticipantLeft(_) => "participantLeft",
            SignalNotification::SignalingDisconnected => "signalingDisconnected",
            SignalNotification::PublishMuteOrUnmute(_) => "publishMuteOrUnmute",
            SignalNotification::StreamRemoved { .. } => "streamRemoved",
        }
    }
}
