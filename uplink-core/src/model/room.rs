use crate::model::{ParticipantId, StreamId};
use serde::{Deserialize, Serialize};

/// Descriptor of one remote publish stream, as carried in the join snapshot
/// and in `streamAdded` notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStreamInfo {
    pub publish_stream_id: StreamId,
    pub participant_id: ParticipantId,
    pub has_audio: bool,
    pub has_video: bool,
}

/// Room snapshot returned by a successful join.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    #[serde(default)]
    pub participant_id: ParticipantId,
    #[serde(default)]
    pub streams: Vec<RemoteStreamInfo>,
}
