use thiserror::Error;

/// Error surface shared by every uplink crate.
///
/// Server-reported failures keep the action that was rejected so callers can
/// tell a failed `join` from a failed `publish` without string matching.
#[derive(Debug, Error)]
pub enum UplinkError {
    /// The server replied to an RPC with its error flag set.
    #[error("{action} rejected by server: {reason}")]
    Protocol { action: String, reason: String },

    /// The operation is not valid in the current lifecycle state.
    #[error("invalid state: {0}")]
    State(String),

    /// A caller-supplied argument failed validation.
    #[error("invalid {what}: {value:?}")]
    Validation { what: &'static str, value: String },

    /// The signaling connection failed to open, or dropped while in use.
    #[error("signaling transport: {0}")]
    Transport(String),

    /// An opt-in per-request timeout elapsed before the reply arrived.
    #[error("{action} timed out waiting for reply")]
    Timeout { action: String },
}

impl UplinkError {
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}
