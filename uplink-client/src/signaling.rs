use crate::events::{EventDispatcher, EventPayload, ListenerId};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uplink_core::{SignalRequest, UplinkError};

/// Internal event name all push notifications fan out on. Subscribers filter
/// by the message's `type` field themselves.
const NOTIFICATION_EVENT: &str = "notification";

struct PendingTransaction {
    action: String,
    tx: oneshot::Sender<Result<Value, UplinkError>>,
}

#[derive(Default)]
struct ChannelState {
    out: Option<mpsc::UnboundedSender<Message>>,
    pending: HashMap<String, PendingTransaction>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
    closed: bool,
}

struct ChannelInner {
    state: Mutex<ChannelState>,
    events: EventDispatcher,
    keepalive_interval: Duration,
    request_timeout: Option<Duration>,
}

/// One duplex signaling connection: request/reply multiplexing plus push
/// notification fan-out.
///
/// Replies are correlated by `transactionId`; a message without one is a push
/// notification. The channel owns the pending-transaction table exclusively;
/// stream handles and the session client only enqueue onto it. Cloning yields
/// another non-owning reference to the same connection.
#[derive(Clone)]
pub struct SignalingChannel {
    inner: Arc<ChannelInner>,
}

impl SignalingChannel {
    pub fn new(keepalive_interval: Duration, request_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                state: Mutex::new(ChannelState::default()),
                events: EventDispatcher::new(),
                keepalive_interval,
                request_timeout,
            }),
        }
    }

    /// Connects to the signaling server and starts the socket loops and the
    /// keepalive timer. A channel is single-use: once closed it cannot be
    /// reopened.
    pub async fn open(&self, url: &str) -> Result<(), UplinkError> {
        {
            let state = self.lock_state();
            if state.closed {
                return Err(UplinkError::state("signaling channel is closed"));
            }
            if state.out.is_some() {
                return Err(UplinkError::state("signaling channel is already open"));
            }
        }

        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| UplinkError::transport(format!("connect {url}: {e}")))?;
        info!(url, "signaling connected");

        let (mut sink, mut stream) = socket.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let reader = tokio::spawn({
            let inner = self.inner.clone();
            async move {
                while let Some(msg) = stream.next().await {
                    match msg {
                        Ok(Message::Text(text)) => Self::handle_incoming(&inner, &text),
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("signaling read error: {e}");
                            break;
                        }
                    }
                }
                Self::handle_transport_closed(&inner);
            }
        });

        let keepalive = tokio::spawn({
            let out = out_tx.clone();
            let interval = self.inner.keepalive_interval;
            async move {
                let mut tick = tokio::time::interval(interval);
                // keepalive is pure liveness: nothing ever replies to it
                let Ok(text) = serde_json::to_string(&SignalRequest::KeepAlive) else {
                    return;
                };
                loop {
                    tick.tick().await;
                    if out.send(Message::Text(text.clone())).is_err() {
                        break;
                    }
                }
            }
        });

        let mut state = self.lock_state();
        state.out = Some(out_tx);
        state.reader = Some(reader);
        state.writer = Some(writer);
        state.keepalive = Some(keepalive);
        Ok(())
    }

    /// Fire-and-forget send. No reply is expected or awaited.
    pub fn send_notification(&self, request: &SignalRequest) -> Result<(), UplinkError> {
        let out = self
            .lock_state()
            .out
            .clone()
            .ok_or_else(|| UplinkError::transport("signaling channel is not open"))?;
        let text = serde_json::to_string(request)
            .map_err(|e| UplinkError::transport(format!("encode {}: {e}", request.action())))?;
        out.send(Message::Text(text))
            .map_err(|_| UplinkError::transport("signaling channel is not open"))
    }

    /// Sends an RPC and waits for the correlated reply.
    ///
    /// The transaction id is generated fresh until it collides with nothing
    /// pending, attached to the payload, and stripped from the reply. The
    /// returned future fails if the server sets the error flag, if the
    /// channel closes first, or if the configured request timeout elapses.
    pub async fn send_request(&self, request: &SignalRequest) -> Result<Value, UplinkError> {
        let action = request.action();
        let mut payload = serde_json::to_value(request)
            .map_err(|e| UplinkError::transport(format!("encode {action}: {e}")))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let (transaction_id, out) = {
            let mut state = self.lock_state();
            let out = state
                .out
                .clone()
                .ok_or_else(|| UplinkError::transport("signaling channel is not open"))?;

            let mut id = rand::random::<u64>().to_string();
            while state.pending.contains_key(&id) {
                id = rand::random::<u64>().to_string();
            }
            state.pending.insert(
                id.clone(),
                PendingTransaction {
                    action: action.to_string(),
                    tx: reply_tx,
                },
            );
            (id, out)
        };

        payload["transactionId"] = Value::String(transaction_id.clone());
        if out.send(Message::Text(payload.to_string())).is_err() {
            self.lock_state().pending.remove(&transaction_id);
            return Err(UplinkError::transport("signaling channel is not open"));
        }
        debug!(action, %transaction_id, "request sent");

        match self.inner.request_timeout {
            None => reply_rx
                .await
                .map_err(|_| UplinkError::transport("signaling channel closed before reply"))?,
            Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
                Ok(reply) => reply
                    .map_err(|_| UplinkError::transport("signaling channel closed before reply"))?,
                Err(_) => {
                    self.lock_state().pending.remove(&transaction_id);
                    Err(UplinkError::Timeout {
                        action: action.to_string(),
                    })
                }
            },
        }
    }

    /// Registers a listener for push notifications. The raw message is
    /// delivered as-is for type-based filtering downstream.
    pub fn on_notification(
        &self,
        listener: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> Result<ListenerId, UplinkError> {
        self.inner.events.on(NOTIFICATION_EVENT, listener)
    }

    pub fn off_notification(&self, id: ListenerId) -> bool {
        self.inner.events.off(NOTIFICATION_EVENT, id)
    }

    pub fn is_open(&self) -> bool {
        let state = self.lock_state();
        state.out.is_some() && !state.closed
    }

    /// Closes the channel: cancels the keepalive timer, closes the socket,
    /// and rejects every transaction still pending. Idempotent.
    pub fn close(&self) {
        let (reader, keepalive, out, drained) = {
            let mut state = self.lock_state();
            if state.closed {
                debug!("signaling close: already closed");
                return;
            }
            state.closed = true;
            state.writer = None;
            (
                state.reader.take(),
                state.keepalive.take(),
                state.out.take(),
                state.pending.drain().collect::<Vec<_>>(),
            )
        };

        if let Some(task) = keepalive {
            task.abort();
        }
        if let Some(task) = reader {
            task.abort();
        }
        if let Some(out) = out {
            let _ = out.send(Message::Close(None));
        }
        // the writer drains its queue, sends the close frame and exits once
        // every sender is gone

        for (id, pending) in drained {
            debug!(transaction_id = %id, action = %pending.action, "rejecting pending transaction on close");
            let _ = pending.tx.send(Err(UplinkError::transport(
                "signaling channel closed with transaction pending",
            )));
        }
        info!("signaling channel closed");
    }

    fn handle_incoming(inner: &Arc<ChannelInner>, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("discarding malformed signaling message: {e}");
                return;
            }
        };

        let transaction_id = value
            .get("transactionId")
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(transaction_id) = transaction_id else {
            // no transaction id: push notification
            inner.events.emit(NOTIFICATION_EVENT, &value);
            return;
        };

        let entry = {
            let mut state = inner.state.lock().expect("signaling state poisoned");
            state.pending.remove(&transaction_id)
        };
        let Some(pending) = entry else {
            debug!(%transaction_id, "reply matches no pending transaction, dropped");
            return;
        };

        let mut reply = value;
        if let Some(obj) = reply.as_object_mut() {
            obj.remove("transactionId");
        }

        let failed = reply.get("error").and_then(Value::as_bool).unwrap_or(false);
        let outcome = if failed {
            let reason = reply
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("server error")
                .to_string();
            Err(UplinkError::Protocol {
                action: pending.action,
                reason,
            })
        } else {
            Ok(reply)
        };
        let _ = pending.tx.send(outcome);
    }

    /// Remote end dropped the connection: reject whatever is still pending
    /// and surface the drop as a synthetic push notification, not an error.
    fn handle_transport_closed(inner: &Arc<ChannelInner>) {
        let drained = {
            let mut state = inner.state.lock().expect("signaling state poisoned");
            if state.closed {
                return;
            }
            state.out = None;
            state.pending.drain().collect::<Vec<_>>()
        };

        for (_, pending) in drained {
            let _ = pending.tx.send(Err(UplinkError::transport(
                "signaling connection lost before reply",
            )));
        }

        info!("signaling transport closed by remote");
        inner
            .events
            .emit(NOTIFICATION_EVENT, &json!({"type": "signalingDisconnected"}));
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.inner.state.lock().expect("signaling state poisoned")
    }
}
