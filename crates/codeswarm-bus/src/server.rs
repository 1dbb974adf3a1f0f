//! WebSocket surface for the message bus.
//!
//! One `/ws` upgrade per agent: the client's first frame must be a
//! `register` message; after that the socket carries [`BusMessage`] frames
//! from the client and [`BusMessage`]/control frames from the server.

use crate::bus::MessageBus;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use codeswarm_core::protocol::{BusMessage, BusMessageKind, ControlFrame, ControlKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Build the bus router with `/ws` and `/health`.
pub fn build_router(bus: Arc<MessageBus>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(bus)
}

async fn health_handler() -> impl IntoResponse {
    serde_json::json!({"status": "ok", "service": "codeswarm-bus"}).to_string()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(bus): State<Arc<MessageBus>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, bus))
}

async fn handle_socket(socket: WebSocket, bus: Arc<MessageBus>) {
    use futures_util::{SinkExt, StreamExt};

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for frames headed back to this socket.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let welcome = ControlFrame::new(ControlKind::Welcome);
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = tx.send(json);
    }

    // Task: forward frames from the channel to the WebSocket.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Task: receive frames from the WebSocket and route them.
    let recv_bus = Arc::clone(&bus);
    let recv_tx = tx.clone();
    let recv_task = tokio::spawn(async move {
        // Set once the connection registers, for disconnect cleanup.
        let mut registered_agent: Option<String> = None;

        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let parsed: BusMessage = match serde_json::from_str(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            debug!(error = %e, "dropping malformed frame");
                            let error = ControlFrame::new(ControlKind::Error)
                                .content(serde_json::json!({ "reason": e.to_string() }));
                            if let Ok(json) = serde_json::to_string(&error) {
                                let _ = recv_tx.send(json);
                            }
                            continue;
                        }
                    };
                    dispatch(&recv_bus, &recv_tx, &mut registered_agent, parsed).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        if let Some(agent_id) = registered_agent {
            recv_bus.disconnect(&agent_id).await;
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
    info!("WebSocket closed");
}

async fn dispatch(
    bus: &Arc<MessageBus>,
    tx: &mpsc::UnboundedSender<String>,
    registered_agent: &mut Option<String>,
    msg: BusMessage,
) {
    match msg.kind {
        BusMessageKind::Register => {
            let role = msg.role.clone().unwrap_or_else(|| "unknown".to_string());
            if bus
                .register(&msg.agent_id, &msg.room_id, &role, tx.clone())
                .await
                .is_ok()
            {
                *registered_agent = Some(msg.agent_id.clone());
            }
        }
        BusMessageKind::Heartbeat => {
            bus.heartbeat(&msg.agent_id).await;
            let pong = ControlFrame::new(ControlKind::Pong).agent(&msg.agent_id);
            if let Ok(json) = serde_json::to_string(&pong) {
                let _ = tx.send(json);
            }
        }
        BusMessageKind::Message => {
            // A targetAgentId in the payload makes this a direct message;
            // otherwise it fans out to the room.
            match msg.content.get("targetAgentId").and_then(|v| v.as_str()) {
                Some(target) => {
                    let target = target.to_string();
                    bus.send_to_agent(&target, msg).await;
                }
                None => {
                    let sender = msg.agent_id.clone();
                    let room = msg.room_id.clone();
                    bus.broadcast_to_room(&room, &msg, Some(&sender)).await;
                }
            }
        }
        BusMessageKind::RoomUpdate => {
            let sender = msg.agent_id.clone();
            let room = msg.room_id.clone();
            bus.broadcast_to_room(&room, &msg, Some(&sender)).await;
        }
        BusMessageKind::Request => {
            let Some(target) = msg
                .content
                .get("targetAgentId")
                .and_then(|v| v.as_str())
                .map(ToString::to_string)
            else {
                warn!(agent_id = %msg.agent_id, "request without targetAgentId");
                return;
            };
            if let Err(e) = bus.handle_request(&target, msg).await {
                warn!(error = %e, "failed to route request");
            }
        }
        BusMessageKind::Response => {
            if let Err(e) = bus.handle_response(msg).await {
                warn!(error = %e, "failed to route response");
            }
        }
    }
}
