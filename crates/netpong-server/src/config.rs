use serde::Deserialize;

/// Top-level server configuration, loaded from `netpong.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "web".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Maximum concurrent WebSocket connections per IP address.
    pub max_ws_per_ip: usize,
    /// Token refill rate per connection. Also the burst size.
    pub ws_rate_limit_per_sec: f64,
    /// Outbound frames buffered per player before the server starts dropping.
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            max_ws_per_ip: 10,
            // One paddle_move per frame at 60 Hz plus lobby chatter.
            ws_rate_limit_per_sec: 120.0,
            player_message_buffer: 256,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub max_players: u8,
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            idle_timeout_secs: 3600,
            idle_check_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Every fatal problem with the config, as `(key, message)` pairs.
    pub fn problems(&self) -> Vec<(&'static str, &'static str)> {
        let mut problems = Vec::new();
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            problems.push(("listen_addr", "is not a valid socket address"));
        }
        if self.limits.max_ws_connections == 0 {
            problems.push(("limits.max_ws_connections", "must be > 0"));
        }
        if self.limits.max_ws_per_ip == 0 {
            problems.push(("limits.max_ws_per_ip", "must be > 0"));
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            problems.push(("limits.ws_rate_limit_per_sec", "must be > 0"));
        }
        if self.limits.player_message_buffer == 0 {
            problems.push(("limits.player_message_buffer", "must be > 0"));
        }
        if self.rooms.max_players < 2 {
            problems.push(("rooms.max_players", "must be at least 2"));
        }
        if self.rooms.idle_timeout_secs == 0 {
            problems.push(("rooms.idle_timeout_secs", "must be > 0"));
        }
        if self.rooms.idle_check_interval_secs == 0 {
            problems.push(("rooms.idle_check_interval_secs", "must be > 0"));
        }
        problems
    }

    /// Validate configuration. Logs every problem and exits if there are any.
    pub fn validate(&self) {
        let problems = self.problems();
        for (key, message) in &problems {
            tracing::error!("{key} {message}");
        }
        if !problems.is_empty() {
            std::process::exit(1);
        }
    }

    /// Load config from `netpong.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let path = std::env::var("NETPONG_CONFIG").unwrap_or_else(|_| "netpong.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "Loaded server configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path, "Failed to parse server config: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path = %path, "No server config found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `NETPONG_*` overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("NETPONG_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(root) = lookup("NETPONG_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = root;
        }
        if let Some(val) = lookup("NETPONG_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = lookup("NETPONG_MAX_WS_PER_IP")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_per_ip = n;
        }
        if let Some(val) = lookup("NETPONG_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
        if let Some(val) = lookup("NETPONG_MAX_PLAYERS")
            && let Ok(n) = val.parse::<u8>()
        {
            self.rooms.max_players = n;
        }
        if let Some(val) = lookup("NETPONG_IDLE_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            self.rooms.idle_timeout_secs = n;
        }
    }
}
