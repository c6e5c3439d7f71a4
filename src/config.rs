use std::time::Duration;

/// Fixed game constants. These are properties of the game itself and are
/// not configurable per room.
pub const MAX_PLAYERS: usize = 6;
pub const MIN_PLAYERS: usize = 2;
pub const CHAMBER_COUNT: u32 = 6;
pub const MAX_NAME_LEN: usize = 20;
pub const ROOM_ID_LEN: usize = 8;

/// How often the background reaper scans the registry.
pub const REAP_INTERVAL: Duration = Duration::from_secs(300);

/// How long an empty room may sit idle before the reaper deletes it.
pub const INACTIVE_TIMEOUT: Duration = Duration::from_secs(900);

/// Server settings read from the environment. None of these affect game
/// behavior, only where the process listens and how much it logs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .expect("Invalid PORT");
        let debug = std::env::var("DEBUG")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(true);
        Self { host, port, debug }
    }
}
