use std::time::Duration;

/// Client configuration: where the signaling server lives and how the
/// channel behaves once connected.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// `wss://` when true, plain `ws://` otherwise.
    pub secure: bool,
    /// Interval between keepalive notifications while the channel is open.
    pub keepalive_interval: Duration,
    /// Optional bound on how long `send_request` waits for a reply. The
    /// protocol itself has no timeout; a pending transaction otherwise lives
    /// until the reply arrives or the channel closes.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn signaling_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
            secure: true,
            keepalive_interval: Duration::from_secs(1),
            request_timeout: None,
        }
    }
}
