//! WebSocket upgrade handler

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::EngineHandle;
use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::gate::{InboundGate, INTENT_FLUSH};
use crate::ws::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    debug!(%addr, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let session = Uuid::new_v4();
    state.open_session(session, addr);
    info!(session_id = %session, %addr, "New WebSocket connection");

    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.session_queue);
    if state.engine.connect(session, outbound_tx).await.is_err() {
        error!(session_id = %session, "Engine unavailable, closing connection");
        state.close_session(&session);
        return;
    }

    let (ws_sink, ws_stream) = socket.split();
    run_session(session, &state.engine, ws_sink, ws_stream, outbound_rx).await;

    // Cleanup on disconnect
    state.engine.disconnect(session).await;
    match state.close_session(&session) {
        Some(info) => info!(
            session_id = %session,
            addr = %info.addr,
            connected_secs = info.connected_secs(),
            "WebSocket connection closed"
        ),
        None => info!(session_id = %session, "WebSocket connection closed"),
    }
}

/// Longest a single socket write may take before the session is abandoned
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the WebSocket session with read/write split
async fn run_session(
    session: Uuid,
    engine: &EngineHandle,
    ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    outbound_rx: mpsc::Receiver<Arc<str>>,
) {
    let mut gate = InboundGate::new(SessionRateLimiter::new());
    let mut flush_timer = interval(INTENT_FLUSH);
    flush_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Spawn writer task: engine frames -> WebSocket
    let mut writer = tokio::spawn(forward_frames(session, ws_sink, outbound_rx, WRITE_TIMEOUT));

    // Reader loop: WebSocket -> engine
    loop {
        tokio::select! {
            _ = &mut writer => {
                // The engine detached this session or the socket broke
                debug!(session_id = %session, "Writer finished");
                break;
            }
            _ = flush_timer.tick(), if gate.has_held_intent() => {
                if let Some(msg) = gate.flush() {
                    if !submit_all(engine, session, vec![msg]).await {
                        break;
                    }
                }
            }
            next = ws_stream.next() => {
                let Some(result) = next else {
                    break;
                };
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                        Ok(msg) => {
                            let throttled = gate.throttled();
                            let forward = gate.admit(msg);
                            if gate.throttled() > throttled && gate.throttled() % 30 == 1 {
                                warn!(
                                    session_id = %session,
                                    throttled = gate.throttled(),
                                    "Rate limited client frames"
                                );
                            }
                            if !submit_all(engine, session, forward).await {
                                break;
                            }
                        }
                        Err(e) => {
                            engine.record_protocol_error();
                            debug!(session_id = %session, error = %e, "Failed to parse client message");
                        }
                    },
                    Ok(Message::Binary(_)) => {
                        engine.record_protocol_error();
                        debug!(session_id = %session, "Received binary message, ignoring");
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        info!(session_id = %session, "Client initiated close");
                        break;
                    }
                    Err(e) => {
                        debug!(session_id = %session, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    writer.abort();
}

/// Returns false once the engine queue has closed
async fn submit_all(engine: &EngineHandle, session: Uuid, msgs: Vec<ClientMsg>) -> bool {
    for msg in msgs {
        if engine.submit(session, msg).await.is_err() {
            debug!(session_id = %session, "Engine queue closed");
            return false;
        }
    }
    true
}

/// Write engine frames to the socket until the queue closes or a write fails or stalls
async fn forward_frames<S>(
    session: Uuid,
    mut sink: S,
    mut outbound_rx: mpsc::Receiver<Arc<str>>,
    write_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(frame) = outbound_rx.recv().await {
        match timeout(write_timeout, sink.send(Message::Text(frame.to_string()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(session_id = %session, error = %e, "WebSocket send failed");
                break;
            }
            Err(_) => {
                warn!(session_id = %session, "WebSocket send timed out");
                break;
            }
        }
    }
    let _ = timeout(write_timeout, sink.close()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_forwards_frames_in_order() {
        let (sink, written) = futures::channel::mpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(4);
        tx.send(Arc::from("first")).await.unwrap();
        tx.send(Arc::from("second")).await.unwrap();
        drop(tx);

        forward_frames(Uuid::new_v4(), sink, rx, Duration::from_secs(1)).await;

        let frames: Vec<Message> = written.collect().await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], Message::Text(t) if t == "first"));
        assert!(matches!(&frames[1], Message::Text(t) if t == "second"));
    }

    #[tokio::test]
    async fn stuck_socket_write_gives_up() {
        let sink = Box::pin(futures::sink::unfold((), |(), _frame: Message| async {
            std::future::pending::<Result<(), std::io::Error>>().await
        }));
        let (tx, rx) = mpsc::channel(4);
        tx.send(Arc::from("frame")).await.unwrap();

        let finished = timeout(
            Duration::from_secs(2),
            forward_frames(Uuid::new_v4(), sink, rx, Duration::from_millis(20)),
        )
        .await;

        // Sender still open, so only the write timeout can end the writer
        tokio_test::assert_ok!(finished);
        drop(tx);
    }
}
