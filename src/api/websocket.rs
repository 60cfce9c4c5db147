//! Device WebSocket
//!
//! One socket per device. Binary frames of the configured length are audio;
//! everything else is control text. The socket is split into a reader task, a
//! writer task fed through a channel, and a heartbeat; the session loop itself
//! runs on the connection task and handles one message at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::ApiState;
use crate::gateway::Gateway;
use crate::session::Session;
use crate::voice::{AudioSink, Delivery, Inbound, SocketClosed};

/// Inbound messages queued while a response is playing
const INBOUND_QUEUE: usize = 256;

/// How long the writer gets to flush a close frame
const CLOSE_FLUSH: Duration = Duration::from_secs(1);

/// [`AudioSink`] over the writer task's channel
pub struct WsSink {
    tx: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
}

impl WsSink {
    #[must_use]
    pub const fn new(tx: mpsc::Sender<Message>, open: Arc<AtomicBool>) -> Self {
        Self { tx, open }
    }

    async fn send(&mut self, message: Message) -> Delivery {
        if !self.is_open() {
            return Err(SocketClosed);
        }
        self.tx.send(message).await.map_err(|_| {
            self.open.store(false, Ordering::Release);
            SocketClosed
        })
    }
}

#[async_trait]
impl AudioSink for WsSink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    async fn send_text(&mut self, text: &str) -> Delivery {
        self.send(Message::Text(text.to_owned().into())).await
    }

    async fn send_binary(&mut self, frame: Vec<u8>) -> Delivery {
        self.send(Message::Binary(frame.into())).await
    }
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> Response {
    if !state.registry.is_accepting() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let gateway = Arc::clone(&state.gateway);
    let config = gateway.config();
    let mut session = gateway.new_session();
    let session_id = session.id;

    let Some(closer) = state
        .registry
        .register(session_id, Arc::clone(&session.liveness))
        .await
    else {
        tracing::info!(session_id = %session_id, "refusing connection during shutdown");
        return;
    };

    tracing::info!(session_id = %session_id, "device connected");

    let (mut sender, mut receiver) = socket.split();
    let open = Arc::new(AtomicBool::new(true));

    // Spawn task to forward messages from channel to WebSocket
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(32);
    let writer_open = Arc::clone(&open);
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sender.send(msg).await.is_err() || closing {
                break;
            }
        }
        writer_open.store(false, Ordering::Release);
        let _ = sender.close().await;
    });

    // Spawn task to classify incoming messages for the session loop
    let (in_tx, mut in_rx) = mpsc::channel::<Inbound>(INBOUND_QUEUE);
    let frame_len = config.audio.frame_bytes;
    let liveness = Arc::clone(&session.liveness);
    let reader_open = Arc::clone(&open);
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "socket read failed");
                    break;
                }
            };
            let inbound = match msg {
                Message::Binary(data) => Inbound::from_binary(data, frame_len),
                Message::Text(text) => Inbound::Control(text.as_str().to_owned()),
                Message::Pong(_) => {
                    liveness.record_pong();
                    continue;
                }
                Message::Ping(data) => {
                    // axum answers pings itself
                    tracing::trace!(len = data.len(), "received ping");
                    continue;
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id, "WebSocket closed by device");
                    break;
                }
            };
            if in_tx.send(inbound).await.is_err() {
                break;
            }
        }
        reader_open.store(false, Ordering::Release);
    });

    // Heartbeat: detection only, a stale session is reported and left open
    let heartbeat_tx = out_tx.clone();
    let heartbeat_liveness = Arc::clone(&session.liveness);
    let period = config.server.heartbeat_interval;
    let heartbeat = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            if heartbeat_liveness.tick() {
                tracing::warn!(session_id = %session_id, "no pong within heartbeat interval");
            }
            if heartbeat_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                break;
            }
        }
    });

    let close_tx = out_tx.clone();
    let mut sink = WsSink::new(out_tx, Arc::clone(&open));

    let shutdown = tokio::select! {
        () = serve_session(&gateway, &mut session, &mut in_rx, &mut sink) => false,
        () = closer.notified() => true,
    };

    if shutdown {
        tracing::info!(session_id = %session_id, "closing session for shutdown");
        let _ = close_tx.send(Message::Close(None)).await;
    }

    // No sends after this point
    open.store(false, Ordering::Release);
    session.teardown();
    heartbeat.abort();
    recv_task.abort();
    drop(sink);
    drop(close_tx);

    if tokio::time::timeout(CLOSE_FLUSH, &mut send_task).await.is_err() {
        send_task.abort();
    }

    state.registry.deregister(session_id).await;
    tracing::info!(session_id = %session_id, "device disconnected");
}

/// Welcome the device, then handle its messages in order until it leaves
async fn serve_session(
    gateway: &Gateway,
    session: &mut Session,
    inbound: &mut mpsc::Receiver<Inbound>,
    sink: &mut WsSink,
) {
    gateway.welcome(session, sink).await;

    while let Some(message) = inbound.recv().await {
        gateway.handle_inbound(session, message, sink).await;
        if !sink.is_open() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_forwards_until_writer_goes_away() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = WsSink::new(tx, Arc::new(AtomicBool::new(true)));

        sink.send_text("AUDIO_STREAM_START").await.unwrap();
        sink.send_binary(vec![1, 2]).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Message::Text(t)) if t.as_str() == "AUDIO_STREAM_START"));
        assert!(matches!(rx.recv().await, Some(Message::Binary(b)) if b[..] == [1, 2]));

        drop(rx);
        assert!(!sink.is_open());
        assert_eq!(sink.send_binary(vec![3]).await, Err(SocketClosed));
    }

    #[tokio::test]
    async fn cleared_flag_stops_sends() {
        let (tx, mut rx) = mpsc::channel(4);
        let open = Arc::new(AtomicBool::new(true));
        let mut sink = WsSink::new(tx, Arc::clone(&open));

        open.store(false, Ordering::Release);

        assert_eq!(sink.send_text("x").await, Err(SocketClosed));
        assert!(rx.try_recv().is_err());
    }
}
