// ===============================
// src/main.rs
// ===============================
//
// coatcalc_bot — coating cost comparison bot.
//
// Pipeline: feed (mock/Telegram) -> intake workers (rate limiter + session
// step machine + calculation engine) -> dispatcher (report rendering +
// retried delivery to the operator chat). Prometheus metrics on the side,
// optional JSONL event recorder.
//
mod calc;
mod config;
mod dispatch;
mod domain;
mod feed;
mod intake;
mod metrics;
mod ratelimit;
mod recorder;
mod report;
mod retry;
mod session;
mod telegram;
mod transport;

use std::sync::Arc;

use tokio::{sync::mpsc, time::Duration};
use tracing::{error, info};

use crate::domain::{Event, IntakeMessage, Report};
use crate::intake::Intake;
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::session::SessionStore;
use crate::transport::{MockTransport, TelegramTransport, Transport};

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt().with_env_filter("info").init();

    // ---- Load config & limits ----
    let (args, limits) = config::load();

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(args.metrics_port));

    info!(
        transport_mode = %args.transport_mode.as_str(),
        feed_mode = %args.feed_mode.as_str(),
        admin_chat_id = %args.admin_chat_id,
        intake_workers = args.intake_workers,
        rate_max = limits.rate_max,
        rate_window_secs = limits.rate_window.as_secs(),
        retry_max_attempts = limits.retry_max_attempts,
        session_ttl_secs = limits.session_ttl.as_secs(),
        "startup config"
    );

    metrics::CONFIG_TRANSPORT_MODE
        .with_label_values(&[args.transport_mode.as_str()])
        .set(1);
    metrics::CONFIG_RATE_LIMIT
        .with_label_values(&["max"])
        .set(limits.rate_max as i64);
    metrics::CONFIG_RATE_LIMIT
        .with_label_values(&["window_secs"])
        .set(limits.rate_window.as_secs() as i64);

    // ---- Transport ----
    let transport: Arc<dyn Transport> = match (&args.transport_mode, &args.telegram_token) {
        (config::TransportMode::Telegram, Some(token)) => {
            Arc::new(TelegramTransport::new(&args.telegram_api_url, token))
        }
        (config::TransportMode::Telegram, None) => {
            error!("TRANSPORT_MODE=telegram but TELEGRAM_TOKEN is unset, falling back to mock");
            Arc::new(MockTransport::new())
        }
        (config::TransportMode::Mock, _) => Arc::new(MockTransport::new()),
    };

    // ---- Recorder (optional) ----
    let rec_tx = args.record_file.clone().map(|path| {
        let (tx, rx) = mpsc::channel::<Event>(8192);
        tokio::spawn(recorder::run(rx, path));
        tx
    });

    // ---- Buses ----
    let (intake_tx, intake_rx) = mpsc::channel::<IntakeMessage>(2048);
    let (report_tx, report_rx) = mpsc::channel::<Report>(1024);

    // ---- Keyed stores ----
    let sessions = Arc::new(SessionStore::new());
    let limiter = Arc::new(RateLimiter::new(limits.rate_max, limits.rate_window));

    // ---- Dispatcher ----
    let policy = RetryPolicy::new(limits.retry_max_attempts, limits.retry_base_delay);
    let dispatcher = dispatch::Dispatcher::new(
        transport.clone(),
        Arc::new(report::TextRenderer),
        policy,
        args.admin_chat_id,
    );
    tokio::spawn(dispatch::run(dispatcher, report_rx, rec_tx.clone()));

    // ---- Intake workers ----
    let intake = Arc::new(Intake::new(sessions.clone(), limiter, report_tx, rec_tx.clone()));
    tokio::spawn(intake::run_workers(
        intake,
        transport.clone(),
        intake_rx,
        args.intake_workers,
    ));

    // ---- FEED ----
    match args.feed_mode {
        config::TransportMode::Mock => {
            tokio::spawn(feed::run_mock(intake_tx));
        }
        config::TransportMode::Telegram => match args.telegram_token.clone() {
            Some(token) => {
                let api = args.telegram_api_url.clone();
                tokio::spawn(feed::run_telegram(intake_tx, api, token));
            }
            None => {
                error!("FEED_MODE=telegram but TELEGRAM_TOKEN is unset, using mock feed");
                tokio::spawn(feed::run_mock(intake_tx));
            }
        },
    }

    // ---- Heartbeat + idle-session sweep ----
    let sweep_every = Duration::from_secs(60);
    loop {
        tokio::time::sleep(sweep_every).await;
        let evicted = sessions.evict_idle(limits.session_ttl);
        if !evicted.is_empty() {
            metrics::SESSIONS_EVICTED.inc_by(evicted.len() as u64);
            info!(count = evicted.len(), "evicted idle sessions");
        }
        metrics::SESSIONS_ACTIVE.set(sessions.len() as i64);
        info!(sessions = sessions.len(), "heartbeat");
    }
}
