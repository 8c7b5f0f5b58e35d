//! Service configuration, read from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for officemill.
///
/// Every field has a default so the service starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// Where uploads are staged before conversion.
    pub upload_dir: PathBuf,

    /// Where converted files wait to be downloaded.
    pub output_dir: PathBuf,

    /// Upper bound for a single open/save/close sequence.
    pub conversion_timeout: Duration,

    /// Tear the office session down after a timed-out conversion so the next
    /// request starts from a fresh instance.
    pub reinit_on_timeout: bool,

    /// How long a converted file stays available for `/download`.
    pub output_retention: Duration,

    /// Request body limit for uploads, in bytes.
    pub max_upload_bytes: usize,

    /// Emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("OFFICEMILL_ADDR", "0.0.0.0:8000"),
            upload_dir: PathBuf::from(env_or("OFFICEMILL_UPLOAD_DIR", "/tmp/uploads")),
            output_dir: PathBuf::from(env_or("OFFICEMILL_OUTPUT_DIR", "/tmp/outputs")),
            conversion_timeout: Duration::from_secs(parse_env("OFFICEMILL_TIMEOUT_SECS", 120)),
            reinit_on_timeout: parse_bool("OFFICEMILL_REINIT_ON_TIMEOUT", true),
            output_retention: Duration::from_secs(parse_env(
                "OFFICEMILL_OUTPUT_RETENTION_SECS",
                600,
            )),
            max_upload_bytes: parse_env::<usize>("OFFICEMILL_MAX_UPLOAD_MB", 50) * 1024 * 1024,
            log_json: parse_bool("OFFICEMILL_LOG_JSON", false),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
