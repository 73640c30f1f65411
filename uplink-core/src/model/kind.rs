use crate::error::UplinkError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two media kinds a stream can carry. Mute state is tracked per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Parses the wire spelling. Anything but "audio" / "video" is rejected.
    pub fn parse(s: &str) -> Result<Self, UplinkError> {
        match s {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            other => Err(UplinkError::Validation {
                what: "media kind",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
