// ===============================
// src/dispatch.rs
// ===============================
//
// Notification dispatcher: renders a finalized report and delivers it to the
// operator chat with bounded retry. Runs as its own task so retry sleeps
// never stall intake. Delivery is at-least-once: a retry after a partial
// attempt (text sent, document failed) re-sends the text.
//
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::domain::{DeliveryOutcome, Event, Report, SubmitterId};
use crate::metrics::{DELIVERIES, DELIVERY_ATTEMPTS};
use crate::report::{self, DocumentRenderer};
use crate::retry::RetryPolicy;
use crate::transport::Transport;

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    renderer: Arc<dyn DocumentRenderer>,
    policy: RetryPolicy,
    admin_chat_id: SubmitterId,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        renderer: Arc<dyn DocumentRenderer>,
        policy: RetryPolicy,
        admin_chat_id: SubmitterId,
    ) -> Self {
        Self { transport, renderer, policy, admin_chat_id }
    }

    /// One report -> operator chat. Returns the outcome and attempts used;
    /// exhausted retries are absorbed here, never raised to intake.
    pub async fn deliver(&self, report: &Report) -> (DeliveryOutcome, u32) {
        let text = report::operator_text(report);

        // rendering failure is non-fatal: fall back to text-only delivery
        let document = match self.renderer.render(report) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(?e, "document render failed, delivering text only");
                None
            }
        };
        let filename = self.renderer.filename();
        let text = text.as_str();

        let attempt_result = self
            .policy
            .run("operator delivery", || {
                let document = document.clone();
                async move {
                    self.transport.send(self.admin_chat_id, text).await?;
                    if let Some(bytes) = document {
                        self.transport.send_document(self.admin_chat_id, bytes, filename).await?;
                    }
                    Ok::<(), crate::transport::TransportError>(())
                }
            })
            .await;

        match attempt_result {
            Ok(((), attempts)) => {
                DELIVERIES.with_label_values(&["delivered"]).inc();
                DELIVERY_ATTEMPTS.inc_by(attempts as u64);
                info!(submitter = %report.submitter_id, attempts, "report delivered");
                (DeliveryOutcome::Delivered, attempts)
            }
            Err((e, attempts)) => {
                DELIVERIES.with_label_values(&["failed"]).inc();
                DELIVERY_ATTEMPTS.inc_by(attempts as u64);
                error!(?e, submitter = %report.submitter_id, attempts, "delivery abandoned");
                (DeliveryOutcome::Failed, attempts)
            }
        }
    }
}

/// Task: consume finalized reports and deliver them one by one.
pub async fn run(
    dispatcher: Dispatcher,
    mut rx: mpsc::Receiver<Report>,
    rec_tx: Option<mpsc::Sender<Event>>,
) {
    while let Some(report) = rx.recv().await {
        let (outcome, attempts) = dispatcher.deliver(&report).await;
        if let Some(tx) = &rec_tx {
            let _ = tx
                .send(Event::Delivery { submitter_id: report.submitter_id, outcome, attempts })
                .await;
        }
    }
    info!("dispatcher: report channel closed, stopped");
}
