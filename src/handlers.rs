// handlers.rs

use crate::models::{SequenceStatus, WsMessage};
use crate::events::EventDispatcher;
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct AppState {
    pub dispatcher: EventDispatcher,
    pub status: watch::Receiver<SequenceStatus>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws/control", get(handle_control_ws_upgrade))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

pub async fn handle_control_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("Control client connection attempt");
    ws.on_upgrade(|socket| handle_control(socket, state))
}

fn status_frame(status: &SequenceStatus) -> Option<Message> {
    match serde_json::to_string(&WsMessage::Status(status.clone())) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            error!("Status serialization failed: {}", e);
            None
        }
    }
}

async fn handle_control(socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4();
    let source = format!("ws:{client_id}");
    state.dispatcher.on_connect(&source);

    let (mut sender, mut receiver) = socket.split();
    let mut status = state.status.clone();

    let send_task = tokio::spawn(async move {
        let current = status.borrow_and_update().clone();
        if let Some(frame) = status_frame(&current) {
            if sender.send(frame).await.is_err() {
                return;
            }
        }
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            let Some(frame) = status_frame(&current) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn({
        let state = Arc::clone(&state);
        async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => state.dispatcher.on_message(text.as_str()).await,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%client_id, "Control socket error: {}", e);
                        break;
                    }
                }
            }
        }
    });

    tokio::pin!(send_task, recv_task);
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    };

    state.dispatcher.on_disconnect(&source);
}
