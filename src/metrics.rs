// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Intake --------
pub static INTAKE_MESSAGES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("intake_messages_total", "inbound conversational messages").unwrap());

pub static RATE_LIMITED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("rate_limited_total", "messages denied by the rate limiter").unwrap());

pub static VALIDATION_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("validation_errors_total", "inputs rejected by the step machine").unwrap()
});

// -------- Domain --------
pub static COMPARISONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("comparisons_total", "finalized comparisons (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub static ORDERS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("orders_total", "finalized order requests").unwrap());

pub static SESSIONS_ACTIVE: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("sessions_active", "live conversational sessions").unwrap());

pub static SESSIONS_EVICTED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("sessions_evicted_total", "idle sessions swept").unwrap());

// -------- Delivery --------
pub static DELIVERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deliveries_total", "operator deliveries (label: outcome)"),
        &["outcome"],
    )
    .unwrap()
});

pub static DELIVERY_ATTEMPTS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("delivery_attempts_total", "transport attempts incl. retries").unwrap());

// ---- Config visibility ----
pub static CONFIG_TRANSPORT_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_transport_mode", "transport mode (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub static CONFIG_RATE_LIMIT: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_rate_limit", "rate limiter knobs (label: knob)"),
        &["knob"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(INTAKE_MESSAGES.clone())),
        REGISTRY.register(Box::new(RATE_LIMITED.clone())),
        REGISTRY.register(Box::new(VALIDATION_ERRORS.clone())),
        REGISTRY.register(Box::new(COMPARISONS.clone())),
        REGISTRY.register(Box::new(ORDERS.clone())),
        REGISTRY.register(Box::new(SESSIONS_ACTIVE.clone())),
        REGISTRY.register(Box::new(SESSIONS_EVICTED.clone())),
        REGISTRY.register(Box::new(DELIVERIES.clone())),
        REGISTRY.register(Box::new(DELIVERY_ATTEMPTS.clone())),
        REGISTRY.register(Box::new(CONFIG_TRANSPORT_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_RATE_LIMIT.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub async fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(%addr, ?e, "metrics bind failed");
                return;
            }
        };
        eprintln!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => eprintln!("metrics accept error: {}", e),
            }
        }
    });
}
