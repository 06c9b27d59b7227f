//! Chat WebSocket handler.
//!
//! One connection session per socket. Client frames drive the session; the
//! session's events are forwarded as server frames.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;

use super::messages::{ClientMessage, ServerMessage};
use crate::chat::{ChatService, CloseReason, ConnectionSession, SessionEvent};
use crate::web::dto::MessageResponse;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;
use crate::RoomcastError;

/// WebSocket chat handler.
///
/// GET /api/ws?token={session_token}
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Response {
    let user_id = auth.user_id();
    tracing::info!(
        "WebSocket connection from user {} ({})",
        auth.0.username,
        user_id
    );

    let chat = state.chat.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, chat, user_id))
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, WsMessage>,
    frame: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => sender.send(WsMessage::Text(json)).await,
        Err(e) => {
            tracing::error!("Failed to serialize server frame: {}", e);
            Ok(())
        }
    }
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, chat: ChatService, user_id: i64) {
    let mut session = chat.open_session(user_id);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let frame = match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_client_text(&chat, &mut session, &text).await
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = sender.send(WsMessage::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::debug!("WebSocket closed by client: {}", session.id());
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                };
                if send_frame(&mut sender, &frame).await.is_err() {
                    break;
                }
            }

            event = session.next_event() => {
                if send_frame(&mut sender, &event_frame(event)).await.is_err() {
                    break;
                }
            }
        }
    }

    session.disconnect();
}

/// Translate a session event into a server frame.
pub fn event_frame(event: SessionEvent) -> ServerMessage {
    match event {
        SessionEvent::Message(message) => ServerMessage::Message {
            message: MessageResponse::from(message.as_ref()),
        },
        SessionEvent::Closed {
            room_id,
            reason: CloseReason::RoomClosed,
            ..
        } => ServerMessage::RoomClosed { room_id },
        SessionEvent::Closed {
            room_id,
            reason,
            cursor,
        } => ServerMessage::SubscriptionEnded {
            room_id,
            reason: reason.as_str().to_string(),
            cursor,
        },
    }
}

fn error_frame(err: RoomcastError) -> ServerMessage {
    let api = ApiError::from(err);
    ServerMessage::error(api.code().as_str(), api.message())
}

/// Parse and apply one client text frame, returning the reply.
pub async fn handle_client_text(
    chat: &ChatService,
    session: &mut ConnectionSession,
    text: &str,
) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => handle_client_message(chat, session, msg).await,
        Err(e) => {
            tracing::debug!("Failed to parse client message: {}", e);
            ServerMessage::error("INVALID_MESSAGE", "Invalid message format")
        }
    }
}

/// Apply one client frame to the session.
pub async fn handle_client_message(
    chat: &ChatService,
    session: &mut ConnectionSession,
    msg: ClientMessage,
) -> ServerMessage {
    let user_id = session.user_id();

    match msg {
        ClientMessage::Subscribe {
            room_id,
            cursor,
            limit,
        } => match session.open_room(room_id, limit, cursor).await {
            Ok(opened) => ServerMessage::Subscribed {
                room_id: opened.room_id,
                history: opened.history.iter().map(MessageResponse::from).collect(),
                cursor: opened.cursor,
            },
            Err(e) => error_frame(e),
        },

        ClientMessage::Unsubscribe { room_id } => {
            if session.close_room(room_id) {
                ServerMessage::Unsubscribed { room_id }
            } else {
                ServerMessage::error("NOT_SUBSCRIBED", "Room is not open on this connection")
            }
        }

        ClientMessage::Send { room_id, content } => {
            match chat.send_message(user_id, room_id, &content).await {
                Ok(message) => ServerMessage::Sent {
                    message: message.into(),
                },
                Err(e) => error_frame(e),
            }
        }

        ClientMessage::MarkRead { message_id } => match chat.mark_read(user_id, message_id).await {
            Ok(message) => ServerMessage::Read {
                message: message.into(),
            },
            Err(e) => error_frame(e),
        },

        ClientMessage::Ping => ServerMessage::Pong,
    }
}
