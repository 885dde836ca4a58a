// ===============================
// src/recorder.rs
// ===============================
//
// Optional JSONL audit trail of everything that flows through the bot:
// intake, replies, rate-limit denials, comparisons, orders, deliveries.
// Buffered writes, periodic + count-based flush, reopen on write failure.
//
// ENV: set `RECORD_FILE=/path/to/events.jsonl` to enable (see main.rs).
//
use std::path::Path;
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::Event;

async fn open_writer(path: &str) -> Option<BufWriter<tokio::fs::File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent).await {
                error!(?e, %path, "recorder: create_dir_all failed");
            }
        }
    }
    match OpenOptions::new().create(true).append(true).open(path).await {
        Ok(file) => Some(BufWriter::new(file)),
        Err(e) => {
            error!(?e, %path, "recorder: open failed, events will be dropped");
            None
        }
    }
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: String) {
    info!(%path, "recorder: started");
    let mut writer = open_writer(&path).await;

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut since_last_flush: u32 = 0;
    const FLUSH_EVERY_N_EVENTS: u32 = 1000;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                match maybe_ev {
                    Some(ev) => {
                        let mut line = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                error!(?e, "recorder: serialize error, skip event");
                                continue;
                            }
                        };
                        line.push('\n');

                        if writer.is_none() {
                            writer = open_writer(&path).await;
                        }
                        if let Some(w) = writer.as_mut() {
                            if let Err(e) = w.write_all(line.as_bytes()).await {
                                error!(?e, "recorder: write failed, attempting reopen");
                                writer = open_writer(&path).await;
                                if let Some(w2) = writer.as_mut() {
                                    if let Err(e2) = w2.write_all(line.as_bytes()).await {
                                        error!(?e2, "recorder: write failed again, drop event");
                                        continue;
                                    }
                                }
                            }
                        }

                        since_last_flush += 1;
                        if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                            if let Some(w) = writer.as_mut() {
                                let _ = w.flush().await;
                            }
                            since_last_flush = 0;
                        }
                    }
                    None => {
                        if let Some(w) = writer.as_mut() {
                            let _ = w.flush().await;
                        }
                        info!("recorder: channel closed, stopped");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                if let Some(w) = writer.as_mut() {
                    let _ = w.flush().await;
                }
                since_last_flush = 0;
            }
        }
    }
}
