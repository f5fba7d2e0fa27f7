//! WebSocket Handler
//!
//! /ws/events：连接后先推送一次会话快照，之后转发全部会话事件

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::application::SessionSnapshot;
use crate::infrastructure::http::state::AppState;

/// 连接建立时的首帧
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InitialFrame {
    Snapshot { session: SessionSnapshot },
}

/// 事件 WebSocket 连接处理
pub async fn events_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_events_socket(socket, state))
}

async fn handle_events_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // 先订阅再取快照，快照之后的事件不会丢
    let mut event_rx = state.event_publisher.subscribe();
    let initial = InitialFrame::Snapshot {
        session: state.orchestrator.snapshot(),
    };

    tracing::info!(clients = state.event_publisher.receiver_count(), "Event WebSocket connected");

    // 事件转发任务
    let forward_task = tokio::spawn(async move {
        match serde_json::to_string(&initial) {
            Ok(json) => {
                if sender.send(Message::Text(json)).await.is_err() {
                    return;
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize session snapshot"),
        }

        loop {
            let event = match event_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    // 客户端可通过 GET /api/session 重新同步
                    tracing::debug!(skipped, "Event WebSocket lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // 接收客户端消息（心跳）
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::info!("Event WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Event WebSocket error");
                    break;
                }
                // Ping 由 axum 自动回复 Pong
                _ => {}
            }
        }
    });

    // 等待任一任务完成
    tokio::select! {
        _ = forward_task => {}
        _ = receive_task => {}
    }

    tracing::info!("Event WebSocket disconnected");
}
