pub(crate) mod session;

use crate::config::WsConfig;
use crate::realtime::{Hub, PresenceTracker, ServerEvent};
use crate::services::gateway::session::Session;
use crate::services::message_service::MessageService;
use crate::services::room_service::RoomService;
use axum::extract::ws::WebSocket;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connection-oriented transport over the conversation store.
///
/// The gateway is a thin adapter: every inbound action routes through the
/// same service layer as the request/response surface, so there is exactly
/// one canonical implementation of each operation.
#[derive(Clone, Debug)]
pub struct GatewayService {
    hub: Arc<Hub>,
    presence: Arc<PresenceTracker>,
    message_service: MessageService,
    room_service: RoomService,
    config: WsConfig,
}

impl GatewayService {
    #[must_use]
    pub fn new(
        hub: Arc<Hub>,
        presence: Arc<PresenceTracker>,
        message_service: MessageService,
        room_service: RoomService,
        config: WsConfig,
    ) -> Self {
        Self { hub, presence, message_service, room_service, config }
    }

    pub async fn handle_socket(
        &self,
        socket: WebSocket,
        user_id: i64,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_buffer_size);
        let conn_id = self.hub.register(user_id, outbound_tx);

        // Presence only flips on the first connection; a second device
        // connecting is invisible to peers.
        if self.presence.connect(user_id) {
            self.hub.emit_to_all(&ServerEvent::PresenceChange { user_id, is_online: true });
        }

        let session = Session {
            user_id,
            conn_id,
            socket,
            hub: Arc::clone(&self.hub),
            message_service: self.message_service.clone(),
            room_service: self.room_service.clone(),
            outbound_rx,
            shutdown_rx,
        };

        session.run().await;

        self.hub.unregister(conn_id);

        // Symmetrically, presence only flips when the last connection for
        // the user goes away.
        if self.presence.disconnect(user_id) {
            self.hub.emit_to_all(&ServerEvent::PresenceChange { user_id, is_online: false });
        }
    }
}
