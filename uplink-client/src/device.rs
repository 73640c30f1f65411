use crate::media::{MediaStream, MediaTrack};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uplink_core::UplinkError;

/// Capture device kind, using the wire spellings of the enumeration API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

/// One enumerated capture or playback device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
}

/// Device enumeration seam. Platform backends implement `enumerate_all`;
/// the filtered views come for free.
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    async fn enumerate_all(&self) -> Result<Vec<MediaDeviceInfo>, UplinkError>;

    async fn enumerate_cameras(&self) -> Result<Vec<MediaDeviceInfo>, UplinkError> {
        self.enumerate_kind(DeviceKind::VideoInput).await
    }

    async fn enumerate_microphones(&self) -> Result<Vec<MediaDeviceInfo>, UplinkError> {
        self.enumerate_kind(DeviceKind::AudioInput).await
    }

    async fn enumerate_speakers(&self) -> Result<Vec<MediaDeviceInfo>, UplinkError> {
        self.enumerate_kind(DeviceKind::AudioOutput).await
    }

    async fn enumerate_kind(
        &self,
        kind: DeviceKind,
    ) -> Result<Vec<MediaDeviceInfo>, UplinkError> {
        let devices = self.enumerate_all().await?;
        Ok(devices.into_iter().filter(|d| d.kind == kind).collect())
    }
}

/// A local media source handed to `publish`. Capture itself stays behind the
/// boundary; the device simply owns the track set the caller acquired.
#[derive(Clone)]
pub struct Device {
    media: MediaStream,
}

impl Device {
    pub fn new(media: MediaStream) -> Self {
        Self { media }
    }

    pub fn from_tracks(tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self {
            media: MediaStream::with_tracks(tracks),
        }
    }

    pub fn media(&self) -> MediaStream {
        self.media.clone()
    }
}
