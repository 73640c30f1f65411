mod ids;
mod kind;
mod message;
mod room;

pub use ids::{ParticipantId, RoomId, StreamId};
pub use kind::MediaKind;
pub use message::{MuteInfo, ParticipantInfo, SignalNotification, SignalRequest};
pub use room::{RemoteStreamInfo, RoomInfo};
