use crate::error::AppError;
use crate::realtime::{ClientEvent, ConnectionId, Hub, ServerEvent};
use crate::services::message_service::MessageService;
use crate::services::room_service::RoomService;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub(crate) struct Session {
    pub(crate) user_id: i64,
    pub(crate) conn_id: ConnectionId,
    pub(crate) socket: WebSocket,
    pub(crate) hub: Arc<Hub>,
    pub(crate) message_service: MessageService,
    pub(crate) room_service: RoomService,
    pub(crate) outbound_rx: mpsc::Receiver<ServerEvent>,
    pub(crate) shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

/// The parts of a session needed to route inbound events, separated from
/// the socket halves so the loop can own both independently.
struct EventRouter {
    user_id: i64,
    conn_id: ConnectionId,
    hub: Arc<Hub>,
    message_service: MessageService,
    room_service: RoomService,
}

impl Session {
    #[tracing::instrument(
        name = "websocket_session",
        skip(self),
        fields(
            user_id = %self.user_id,
            ws.session_id = %Uuid::new_v4()
        )
    )]
    pub(crate) async fn run(self) {
        let Self {
            user_id,
            conn_id,
            socket,
            hub,
            message_service,
            room_service,
            mut outbound_rx,
            mut shutdown_rx,
        } = self;

        tracing::info!("WebSocket connected");

        let router = EventRouter { user_id, conn_id, hub, message_service, room_service };
        let (mut ws_sink, mut ws_stream) = socket.split();

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(axum::extract::ws::CloseFrame {
                        code: axum::extract::ws::close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                msg = ws_stream.next() => {
                    let continue_loop = match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            match serde_json::from_str::<ClientEvent>(text.as_str()) {
                                Ok(event) => {
                                    router.dispatch(event).await;
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Failed to decode client event");
                                    router.hub.emit_to_connection(
                                        router.conn_id,
                                        &ServerEvent::Error { message: "Malformed event".to_string() },
                                    );
                                }
                            }
                            true
                        }
                        Some(Ok(WsMessage::Binary(_))) => {
                            tracing::warn!("Received unexpected binary frame");
                            true
                        }
                        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => true,
                        Some(Ok(WsMessage::Close(_)) | Err(_)) | None => false,
                    };

                    if !continue_loop { break; }
                }

                event = outbound_rx.recv() => {
                    match event {
                        Some(event) => {
                            let frame = match serde_json::to_string(&event) {
                                Ok(json) => json,
                                Err(e) => {
                                    tracing::error!(error = %e, "Failed to encode server event");
                                    continue;
                                }
                            };
                            if ws_sink.send(WsMessage::Text(frame.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        let _ = ws_sink.close().await;
        tracing::info!("WebSocket disconnected");
    }
}

impl EventRouter {
    /// Routes one inbound event through the service layer. A failure turns
    /// into a single error event on this connection; nobody else sees it
    /// and no fan-out happens.
    async fn dispatch(&self, event: ClientEvent) {
        let result = match event {
            ClientEvent::DirectMessageSend { receiver_id, content } => self
                .message_service
                .send_direct_message(self.user_id, receiver_id, &content, None)
                .await
                .map(drop),
            ClientEvent::GroupMessageSend { room_id, content } => self
                .room_service
                .send_group_message(room_id, self.user_id, &content, None)
                .await
                .map(drop),
            ClientEvent::JoinRoom(room_id) => {
                // Subscription is connection-scoped; a second device joins
                // independently. Membership gates the subscription.
                let joined = self.room_service.ensure_member(room_id, self.user_id).await;
                if joined.is_ok() {
                    self.hub.join_room(self.conn_id, room_id);
                }
                joined
            }
            ClientEvent::LeaveRoom(room_id) => {
                self.hub.leave_room(self.conn_id, room_id);
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "Client action failed");
            self.hub.emit_to_connection(
                self.conn_id,
                &ServerEvent::Error { message: client_message(&e) },
            );
        }
    }
}

/// Client-safe rendering of an error, mirroring the request layer's
/// response mapping.
fn client_message(err: &AppError) -> String {
    match err {
        AppError::Validation(msg) | AppError::Authorization(msg) => msg.clone(),
        AppError::NotFound => "Not found".to_string(),
        AppError::Auth => "Unauthorized".to_string(),
        AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
    }
}
