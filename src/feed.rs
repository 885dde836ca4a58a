// ===============================
// src/feed.rs
// ===============================
//
// Inbound message adapters:
// - run_mock     : scripted demo conversations from synthetic submitters
// - run_telegram : Telegram getUpdates long polling with offset tracking
//
use std::time::Duration;

use rand::Rng;
use tokio::{sync::mpsc, time::sleep};
use tracing::{error, info, warn};

use crate::domain::IntakeMessage;
use crate::telegram::{self, ApiResponse, Update};

/// Demo feed: a handful of submitters walking the calculator and order
/// branches end to end, so a local run exercises the whole pipeline.
pub async fn run_mock(tx: mpsc::Sender<IntakeMessage>) {
    const SCRIPT: &[&str] = &[
        "/start",
        "/theory",
        "12",
        "Primex; 1,4; 80; 450",
        "Duralux; 1.2; 60; 520",
        "/order",
        "steel",
        "RAL 9005",
        "25",
    ];

    info!("mock feed: started");
    loop {
        let submitter = 1_000 + rand::thread_rng().gen_range(0..5_i64);
        for line in SCRIPT {
            let msg = IntakeMessage { submitter_id: submitter, text: (*line).to_string() };
            if tx.send(msg).await.is_err() {
                warn!("mock feed: intake channel closed, stopping");
                return;
            }
            let pause = 200 + rand::thread_rng().gen_range(0..200);
            sleep(Duration::from_millis(pause)).await;
        }
        sleep(Duration::from_secs(5)).await;
    }
}

/// Long-poll the Telegram Bot API and forward text messages to intake.
pub async fn run_telegram(tx: mpsc::Sender<IntakeMessage>, api_base: String, token: String) {
    let http = reqwest::Client::new();
    let url = telegram::api_url(&api_base, &token, "getUpdates");
    let mut offset: i64 = 0;
    let mut attempt: u32 = 0;

    loop {
        let poll = http
            .post(&url)
            .json(&serde_json::json!({ "timeout": 25, "offset": offset }))
            .send()
            .await;

        match poll {
            Ok(rsp) if rsp.status().is_success() => {
                match rsp.json::<ApiResponse<Vec<Update>>>().await {
                    Ok(api) if api.ok => {
                        attempt = 0;
                        for update in api.result.unwrap_or_default() {
                            offset = offset.max(update.update_id + 1);
                            let Some(message) = update.message else { continue };
                            let Some(text) = message.text else { continue };
                            let msg = IntakeMessage { submitter_id: message.chat.id, text };
                            if tx.send(msg).await.is_err() {
                                warn!("telegram feed: intake channel closed, stopping");
                                return;
                            }
                        }
                        continue; // healthy poll, no backoff
                    }
                    Ok(api) => {
                        error!(description = ?api.description, "getUpdates rejected");
                    }
                    Err(e) => {
                        error!(?e, "getUpdates payload parse failed");
                    }
                }
            }
            Ok(rsp) => {
                let code = rsp.status();
                let body = rsp.text().await.unwrap_or_default();
                error!(%code, %body, "getUpdates failed");
            }
            Err(e) => {
                error!(?e, "getUpdates request error");
            }
        }

        // Exponential backoff + jitter before re-polling after a failure
        attempt = attempt.saturating_add(1);
        let shift = attempt.min(6);
        let factor = 1u64 << shift;
        let base_ms = 500u64.saturating_mul(factor);
        let jitter = rand::thread_rng().gen_range(0..=250);
        sleep(Duration::from_millis(base_ms + jitter)).await;
    }
}
