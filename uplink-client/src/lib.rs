pub mod client;
pub mod config;
pub mod device;
pub mod events;
pub mod media;
pub mod rtc;
pub mod signaling;
pub mod stream;

pub use client::SessionClient;
pub use config::ClientConfig;
pub use device::{Device, DeviceEnumerator, DeviceKind, MediaDeviceInfo};
pub use events::{EventDispatcher, EventPayload, ListenerId};
pub use media::{MediaStream, MediaTrack, PeerFactory, PeerSession, SendEncoding};
pub use rtc::RtcPeerFactory;
pub use signaling::SignalingChannel;
pub use stream::{PublishedStream, SubscribedStream};
