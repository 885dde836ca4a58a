// ===============================
// src/config.rs
// ===============================
use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Where inbound messages come from / where outbound messages go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportMode {
    Mock,
    Telegram,
}

impl TransportMode {
    pub fn from_env(key: &str, default_mode: TransportMode) -> TransportMode {
        match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
            "mock" => TransportMode::Mock,
            "telegram" => TransportMode::Telegram,
            _ => default_mode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Mock => "mock",
            TransportMode::Telegram => "telegram",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Args {
    // transport / feed
    pub transport_mode: TransportMode,
    pub feed_mode: TransportMode,
    pub telegram_token: Option<String>,
    pub telegram_api_url: String,
    /// operator chat that receives finalized reports
    pub admin_chat_id: i64,

    // intake
    pub intake_workers: usize,

    // files/metrics
    pub record_file: Option<String>,
    pub metrics_port: u16,
}

/// Guard-rail knobs for the intake boundary and the dispatcher.
#[derive(Clone, Debug)]
pub struct Limits {
    /// rate limiter: at most `rate_max` admissions per `rate_window`
    pub rate_max: usize,
    pub rate_window: Duration,
    /// dispatcher retry bound and base delay
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    /// sessions idle longer than this are evicted
    pub session_ttl: Duration,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

pub fn load() -> (Args, Limits) {
    // read .env so TELEGRAM_TOKEN, ADMIN_CHAT_ID etc. are available
    let _ = dotenv();

    let transport_mode = TransportMode::from_env("TRANSPORT_MODE", TransportMode::Mock);
    let feed_mode = TransportMode::from_env("FEED_MODE", transport_mode.clone());

    let telegram_token = env::var("TELEGRAM_TOKEN").ok().filter(|s| !s.is_empty());
    let telegram_api_url =
        env::var("TELEGRAM_API_URL").unwrap_or_else(|_| "https://api.telegram.org".to_string());
    let admin_chat_id = env_parse("ADMIN_CHAT_ID", 0_i64);

    let intake_workers = env_parse("INTAKE_WORKERS", 4_usize).max(1);
    let record_file = env::var("RECORD_FILE").ok();
    let metrics_port = env_parse("METRICS_PORT", 9898_u16);

    let args = Args {
        transport_mode,
        feed_mode,
        telegram_token,
        telegram_api_url,
        admin_chat_id,
        intake_workers,
        record_file,
        metrics_port,
    };

    let limits = Limits {
        rate_max: env_parse("RATE_LIMIT_MAX", 5_usize),
        rate_window: Duration::from_secs(env_parse("RATE_LIMIT_WINDOW_SECS", 60_u64)),
        retry_max_attempts: env_parse("RETRY_MAX_ATTEMPTS", 3_u32),
        retry_base_delay: Duration::from_millis(env_parse("RETRY_BASE_DELAY_MS", 500_u64)),
        session_ttl: Duration::from_secs(env_parse("SESSION_TTL_SECS", 1800_u64)),
    };

    (args, limits)
}
