use async_trait::async_trait;
use huddle_server::api::ServiceContainer;
use huddle_server::auth::{Identity, JwtVerifier, Role};
use huddle_server::config::{
    AuthConfig, Config, HealthConfig, PushConfig, RateLimitConfig, ServerConfig, UploadConfig,
    WsConfig,
};
use huddle_server::domain::notification::PushSubscription;
use huddle_server::push::{PushError, PushPayload, PushProvider};
use huddle_server::realtime::{Broadcaster, ServerEvent};
use huddle_server::services::message_service::MessageService;
use huddle_server::services::notification_service::NotificationService;
use huddle_server::services::room_service::RoomService;
use huddle_server::storage::message_repo::MessageRepository;
use huddle_server::storage::notification_repo::NotificationRepository;
use huddle_server::storage::room_repo::RoomRepository;
use huddle_server::storage::user_repo::UserRepository;
use huddle_server::storage::{self, DbPool};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Mutex, Once};
use tokio::sync::watch;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("huddle_server=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Fresh file-backed database per call, migrated and ready.
pub async fn get_test_pool() -> DbPool {
    setup_tracing();

    let path = std::env::temp_dir().join(format!("huddle-test-{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}", path.display());

    let pool = storage::init_pool(&url).await.expect("Failed to open test database");
    storage::run_migrations(&pool).await.expect("Failed to run migrations");

    pool
}

pub async fn seed_user(pool: &DbPool, user_id: i64, display_name: &str) {
    UserRepository::new(pool.clone())
        .upsert(user_id, display_name)
        .await
        .expect("Failed to seed user");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    User(i64),
    Room(i64),
}

/// Broadcaster fake that records every emit for assertions.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(Target, ServerEvent)>>,
}

impl RecordingBroadcaster {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn events_for_user(&self, user_id: i64) -> Vec<ServerEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == Target::User(user_id))
            .map(|(_, event)| event.clone())
            .collect()
    }

    #[allow(dead_code)]
    pub fn events_for_room(&self, room_id: i64) -> Vec<ServerEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == Target::Room(room_id))
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn emit_to_user(&self, user_id: i64, event: &ServerEvent) {
        self.events.lock().unwrap().push((Target::User(user_id), event.clone()));
    }

    fn emit_to_room(&self, room_id: i64, event: &ServerEvent) {
        self.events.lock().unwrap().push((Target::Room(room_id), event.clone()));
    }

    fn is_connected(&self, _user_id: i64) -> bool {
        true
    }
}

/// Push provider fake: records deliveries, optionally reports endpoints as
/// unregistered.
#[derive(Debug, Default)]
pub struct RecordingPushProvider {
    delivered: Mutex<Vec<(String, String)>>,
    unregistered: Mutex<HashSet<String>>,
}

impl RecordingPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn mark_unregistered(&self, endpoint: &str) {
        self.unregistered.lock().unwrap().insert(endpoint.to_string());
    }

    #[allow(dead_code)]
    pub fn delivered_endpoints(&self) -> Vec<String> {
        self.delivered.lock().unwrap().iter().map(|(endpoint, _)| endpoint.clone()).collect()
    }
}

#[async_trait]
impl PushProvider for RecordingPushProvider {
    async fn send_push(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload<'_>,
    ) -> Result<(), PushError> {
        if self.unregistered.lock().unwrap().contains(&subscription.endpoint) {
            return Err(PushError::Unregistered);
        }

        self.delivered
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.title.to_string()));
        Ok(())
    }
}

#[allow(dead_code)]
pub const TEST_PUBLIC_BASE: &str = "/uploads";

/// Service graph over recording fakes, for store-level tests that do not
/// need a live gateway.
#[allow(dead_code)]
pub fn build_test_services(
    pool: &DbPool,
    broadcaster: &std::sync::Arc<RecordingBroadcaster>,
    push: &std::sync::Arc<RecordingPushProvider>,
) -> (MessageService, RoomService, NotificationService) {
    let broadcaster: std::sync::Arc<dyn Broadcaster> = broadcaster.clone();
    let push: std::sync::Arc<dyn PushProvider> = push.clone();

    let message_service = MessageService::new(
        MessageRepository::new(pool.clone()),
        std::sync::Arc::clone(&broadcaster),
        TEST_PUBLIC_BASE.to_string(),
    );
    let room_service = RoomService::new(
        RoomRepository::new(pool.clone()),
        std::sync::Arc::clone(&broadcaster),
        TEST_PUBLIC_BASE.to_string(),
    );
    let notification_service = NotificationService::new(
        NotificationRepository::new(pool.clone()),
        push,
        broadcaster,
    );

    (message_service, room_service, notification_service)
}

#[allow(dead_code)]
pub const TEST_JWT_SECRET: &str = "test_secret";

#[allow(dead_code)]
pub fn get_test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        log_json: false,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            shutdown_timeout_secs: 1,
        },
        auth: AuthConfig { jwt_secret: TEST_JWT_SECRET.to_string() },
        rate_limit: RateLimitConfig { per_second: 10000, burst: 10000 },
        websocket: WsConfig { outbound_buffer_size: 64 },
        push: PushConfig { timeout_secs: 1 },
        uploads: UploadConfig { public_base: TEST_PUBLIC_BASE.to_string() },
        health: HealthConfig { db_timeout_ms: 1000 },
    }
}

/// Full application spawned on an ephemeral port, for gateway and REST
/// tests over real sockets.
#[allow(dead_code)]
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: DbPool,
    pub client: reqwest::Client,
    verifier: JwtVerifier,
    shutdown_tx: watch::Sender<bool>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn spawn() -> Self {
        setup_tracing();

        let pool = get_test_pool().await;
        let config = get_test_config();
        let push = std::sync::Arc::new(RecordingPushProvider::new());

        let services: ServiceContainer =
            huddle_server::wire_services(pool.clone(), &config, push);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = huddle_server::api::app_router(config, services, shutdown_rx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .expect("Test server crashed");
        });

        Self {
            addr,
            pool,
            client: reqwest::Client::new(),
            verifier: JwtVerifier::new(TEST_JWT_SECRET),
            shutdown_tx,
        }
    }

    pub fn token(&self, user_id: i64) -> String {
        self.verifier
            .issue(Identity { id: user_id, role: Role::Member }, 3600)
            .expect("Failed to issue test token")
    }

    pub async fn seed_user(&self, user_id: i64, display_name: &str) {
        seed_user(&self.pool, user_id, display_name).await;
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/v1/gateway?token={}", self.addr, token)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
