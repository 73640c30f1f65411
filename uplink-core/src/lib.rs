pub mod error;
pub mod model;

pub use error::UplinkError;
pub use model::{
    MediaKind, MuteInfo, ParticipantId, ParticipantInfo, RemoteStreamInfo, RoomId, RoomInfo,
    SignalNotification, SignalRequest, StreamId,
};
