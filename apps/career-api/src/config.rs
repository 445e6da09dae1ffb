use std::time::Duration;

/// Career API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// HS256 secret shared by token issuance and the gateway handshake.
    pub secret_key: String,
    /// Lifetime of issued access tokens, in minutes.
    pub access_token_expire_minutes: i64,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// WebSocket URL advertised to clients after login.
    pub public_ws_url: Option<String>,
    /// Snowflake worker ID for this process (0–1023).
    pub worker_id: u16,
    /// Real-time gateway tuning.
    pub gateway: GatewayConfig,
}

/// Per-connection limits for the real-time gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How often the server pings an idle client.
    pub ping_interval: Duration,
    /// Connections with no inbound traffic for this long are closed.
    pub idle_timeout: Duration,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            outbound_buffer: 64,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing
    /// or a numeric variable is out of range.
    pub fn from_env() -> Self {
        let defaults = GatewayConfig::default();

        let worker_id = parsed_var("WORKER_ID", 0u16);
        if worker_id > 1023 {
            panic!("WORKER_ID must be between 0 and 1023, got {worker_id}");
        }

        Self {
            database_url: required_var("DATABASE_URL"),
            secret_key: required_var("SECRET_KEY"),
            access_token_expire_minutes: parsed_var("ACCESS_TOKEN_EXPIRE_MINUTES", 30),
            port: parsed_var("PORT", 8000),
            public_ws_url: std::env::var("PUBLIC_WS_URL").ok().filter(|s| !s.is_empty()),
            worker_id,
            gateway: GatewayConfig {
                ping_interval: Duration::from_secs(parsed_var(
                    "WS_PING_INTERVAL_SECS",
                    defaults.ping_interval.as_secs(),
                )
                .max(1)),
                idle_timeout: Duration::from_secs(parsed_var(
                    "WS_IDLE_TIMEOUT_SECS",
                    defaults.idle_timeout.as_secs(),
                )
                .max(1)),
                outbound_buffer: parsed_var("WS_OUTBOUND_BUFFER", defaults.outbound_buffer).max(1),
            },
        }
    }

    /// The WebSocket endpoint clients should connect to.
    pub fn ws_url(&self) -> String {
        self.public_ws_url
            .clone()
            .unwrap_or_else(|| format!("ws://localhost:{}/api/v1/ws", self.port))
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
