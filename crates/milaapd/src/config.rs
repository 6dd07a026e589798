use std::path::PathBuf;

use milaap_core::{DEFAULT_MAX_DISTANCE, DEFAULT_SIMILARITY_BOUND};

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// HTTP bind address (default: 127.0.0.1:8741).
    pub bind_addr: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Euclidean distance threshold for a positive match.
    pub max_distance: f32,
    /// Normalization bound for the presentation similarity score.
    pub similarity_bound: f32,
    /// Result count cap applied when a match request names no limit.
    pub default_limit: usize,
    /// Timeout in seconds for a single HTTP request.
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `MILAAP_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("milaap");

        let db_path = std::env::var("MILAAP_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("persons.db"));

        Self {
            bind_addr: std::env::var("MILAAP_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8741".to_string()),
            db_path,
            max_distance: env_f32("MILAAP_MAX_DISTANCE", DEFAULT_MAX_DISTANCE),
            similarity_bound: env_f32("MILAAP_SIMILARITY_BOUND", DEFAULT_SIMILARITY_BOUND),
            default_limit: env_usize("MILAAP_DEFAULT_LIMIT", 20),
            request_timeout_secs: env_u64("MILAAP_REQUEST_TIMEOUT_SECS", 10),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
