use clap::{Args, Parser};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "HUDDLE_DATABASE_URL", default_value = "sqlite:huddle.db")]
    pub database_url: String,

    /// Emit logs as JSON instead of human-readable text
    #[arg(long, env = "HUDDLE_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub websocket: WsConfig,

    #[command(flatten)]
    pub push: PushConfig,

    #[command(flatten)]
    pub uploads: UploadConfig,

    #[command(flatten)]
    pub health: HealthConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "HUDDLE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "HUDDLE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management (health) listener
    #[arg(long, env = "HUDDLE_MGMT_PORT", default_value_t = 3001)]
    pub mgmt_port: u16,

    /// How long to wait for in-flight work during shutdown
    #[arg(long, env = "HUDDLE_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for verifying identity tokens
    #[arg(long, env = "HUDDLE_JWT_SECRET")]
    pub jwt_secret: String,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed per client
    #[arg(long, env = "HUDDLE_RATE_LIMIT_PER_SECOND", default_value_t = 20)]
    pub per_second: u32,

    /// Burst allowance per client
    #[arg(long, env = "HUDDLE_RATE_LIMIT_BURST", default_value_t = 40)]
    pub burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct WsConfig {
    /// Size of each connection's outbound event buffer
    #[arg(long, env = "HUDDLE_WS_OUTBOUND_BUFFER_SIZE", default_value_t = 64)]
    pub outbound_buffer_size: usize,
}

#[derive(Clone, Debug, Args)]
pub struct PushConfig {
    /// Per-attempt timeout for push delivery
    #[arg(long, env = "HUDDLE_PUSH_TIMEOUT_SECS", default_value_t = 5)]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct UploadConfig {
    /// Public base path under which stored attachments are served
    #[arg(long, env = "HUDDLE_UPLOAD_PUBLIC_BASE", default_value = "/uploads")]
    pub public_base: String,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the readiness database check
    #[arg(long, env = "HUDDLE_HEALTH_DB_TIMEOUT_MS", default_value_t = 1000)]
    pub db_timeout_ms: u64,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
