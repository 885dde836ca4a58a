// ===============================
// src/intake.rs
// ===============================
//
// Intake boundary: rate limiter -> session step machine -> dispatcher
// handoff. Messages are fanned out to workers by submitter id, so one
// submitter's messages stay in arrival order while different submitters
// are processed in parallel.
//
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::calc::{self, CalcError};
use crate::domain::{ComparisonRequest, ComparisonResult, Event, IntakeMessage, Report, SubmitterId};
use crate::metrics::{
    COMPARISONS, INTAKE_MESSAGES, ORDERS, RATE_LIMITED, SESSIONS_ACTIVE, VALIDATION_ERRORS,
};
use crate::ratelimit::RateLimiter;
use crate::session::{self, Outcome, SessionStore};
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    /// input rejected, step unchanged; text invites re-entry
    Error(String),
    RateLimited,
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Text(s) | Reply::Error(s) => s,
            Reply::RateLimited => "Too many requests, please wait a minute and try again.",
        }
    }
}

pub struct Intake {
    sessions: Arc<SessionStore>,
    limiter: Arc<RateLimiter>,
    report_tx: mpsc::Sender<Report>,
    rec_tx: Option<mpsc::Sender<Event>>,
}

impl Intake {
    pub fn new(
        sessions: Arc<SessionStore>,
        limiter: Arc<RateLimiter>,
        report_tx: mpsc::Sender<Report>,
        rec_tx: Option<mpsc::Sender<Event>>,
    ) -> Self {
        Self { sessions, limiter, report_tx, rec_tx }
    }

    async fn record(&self, ev: Event) {
        if let Some(tx) = &self.rec_tx {
            let _ = tx.send(ev).await;
        }
    }

    /// One conversational message through the whole boundary.
    pub async fn handle_message(&self, msg: IntakeMessage) -> Reply {
        INTAKE_MESSAGES.inc();
        self.record(Event::Intake(msg.clone())).await;

        // denial has no side effects beyond the limiter's own bookkeeping
        if !self.limiter.check(msg.submitter_id) {
            RATE_LIMITED.inc();
            self.record(Event::RateLimited { submitter_id: msg.submitter_id }).await;
            return Reply::RateLimited;
        }

        let slot = self.sessions.entry(msg.submitter_id);
        SESSIONS_ACTIVE.set(self.sessions.len() as i64);

        // per-entry mutex: serializes this submitter, nobody else blocks
        let mut sess = slot.lock().await;
        sess.touch();

        match session::advance(&mut sess, &msg.text) {
            Outcome::Reply(text) => Reply::Text(text),

            Outcome::Completed { report, reply } => {
                if let Some(result) = &report.comparison {
                    COMPARISONS.with_label_values(&[result.mode.as_str()]).inc();
                    self.record(Event::Comparison(result.clone())).await;
                }
                self.hand_off(report).await;
                Reply::Text(reply)
            }

            Outcome::Submitted { report, reply } => {
                ORDERS.inc();
                if let Some(order) = &report.order {
                    self.record(Event::Order {
                        submitter_id: msg.submitter_id,
                        surface_type: order.surface_type.clone(),
                        quantity_kg: order.quantity_kg,
                    })
                    .await;
                }
                self.hand_off(report).await;

                drop(sess);
                self.sessions.remove(msg.submitter_id);
                self.limiter.forget(msg.submitter_id);
                SESSIONS_ACTIVE.set(self.sessions.len() as i64);
                Reply::Text(reply)
            }

            Outcome::Invalid(e) => {
                VALIDATION_ERRORS.inc();
                Reply::Error(format!("Invalid input: {e}. Please try again."))
            }
        }
    }

    async fn hand_off(&self, report: Report) {
        if let Err(e) = self.report_tx.send(report).await {
            // dispatcher gone; the submitter already has their result
            warn!(?e, "report hand-off failed, dispatcher unavailable");
        }
    }

    /// Direct submission path for the web layer: one-shot, no session.
    pub fn handle_request(&self, req: &ComparisonRequest) -> Result<ComparisonResult, CalcError> {
        let result = calc::compare(req)?;
        COMPARISONS.with_label_values(&[result.mode.as_str()]).inc();
        Ok(result)
    }
}

fn shard_for(id: SubmitterId, workers: usize) -> usize {
    id.rem_euclid(workers as i64) as usize
}

/// Fan intake messages out to `workers` tasks keyed by submitter id and send
/// each reply back through the transport (one shot; the operator path is the
/// retried one).
pub async fn run_workers(
    intake: Arc<Intake>,
    transport: Arc<dyn Transport>,
    mut rx: mpsc::Receiver<IntakeMessage>,
    workers: usize,
) {
    let mut worker_txs = Vec::with_capacity(workers);
    for _ in 0..workers {
        let (tx, mut worker_rx) = mpsc::channel::<IntakeMessage>(256);
        worker_txs.push(tx);

        let intake = intake.clone();
        let transport = transport.clone();
        tokio::spawn(async move {
            while let Some(msg) = worker_rx.recv().await {
                let submitter = msg.submitter_id;
                let reply = intake.handle_message(msg).await;
                intake
                    .record(Event::Reply { submitter_id: submitter, text: reply.text().to_string() })
                    .await;
                if let Err(e) = transport.send(submitter, reply.text()).await {
                    warn!(?e, chat_id = %submitter, "reply send failed");
                }
            }
        });
    }

    while let Some(msg) = rx.recv().await {
        let shard = shard_for(msg.submitter_id, workers);
        if worker_txs[shard].send(msg).await.is_err() {
            warn!(shard, "intake worker channel closed");
        }
    }
    info!("intake: feed channel closed, stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::session::Step;

    fn intake_with(limit: usize) -> (Arc<Intake>, Arc<SessionStore>, mpsc::Receiver<Report>) {
        let sessions = Arc::new(SessionStore::new());
        let limiter = Arc::new(RateLimiter::new(limit, Duration::from_secs(60)));
        let (report_tx, report_rx) = mpsc::channel(8);
        let intake = Arc::new(Intake::new(sessions.clone(), limiter, report_tx, None));
        (intake, sessions, report_rx)
    }

    fn msg(id: i64, text: &str) -> IntakeMessage {
        IntakeMessage { submitter_id: id, text: text.to_string() }
    }

    #[tokio::test]
    async fn rate_limited_message_has_no_session_side_effects() {
        let (intake, sessions, _rx) = intake_with(1);
        assert!(matches!(intake.handle_message(msg(1, "/theory")).await, Reply::Text(_)));

        // second message inside the window is denied before touching the session
        assert_eq!(intake.handle_message(msg(1, "12")).await, Reply::RateLimited);

        let slot = sessions.entry(1);
        let sess = slot.lock().await;
        assert!(
            matches!(sess.step, Step::AwaitingArea { .. }),
            "denied message must not advance the step"
        );
    }

    #[tokio::test]
    async fn completed_comparison_is_handed_to_the_dispatcher() {
        let (intake, _sessions, mut report_rx) = intake_with(100);
        for text in ["/practice", "12", "A; 0,85; 450"] {
            assert!(matches!(intake.handle_message(msg(5, text)).await, Reply::Text(_)));
        }
        let reply = intake.handle_message(msg(5, "B; 1; 500")).await;
        assert!(matches!(reply, Reply::Text(_)));
        assert!(reply.text().contains("Cheaper: A"));

        let report = report_rx.recv().await.expect("report handed off");
        assert_eq!(report.submitter_id, 5);
        assert!(report.comparison.is_some());
    }

    #[tokio::test]
    async fn submitted_order_destroys_the_session() {
        let (intake, sessions, mut report_rx) = intake_with(100);
        for text in ["/order", "steel", "black"] {
            intake.handle_message(msg(9, text)).await;
        }
        assert_eq!(sessions.len(), 1);
        let reply = intake.handle_message(msg(9, "25")).await;
        assert!(matches!(reply, Reply::Text(_)));
        assert!(sessions.is_empty(), "session destroyed after submission");

        let report = report_rx.recv().await.unwrap();
        assert!(report.order.is_some());
    }

    #[tokio::test]
    async fn invalid_input_yields_error_reply() {
        let (intake, _sessions, _rx) = intake_with(100);
        intake.handle_message(msg(2, "/theory")).await;
        let reply = intake.handle_message(msg(2, "not a number")).await;
        assert!(matches!(reply, Reply::Error(_)));
        assert!(reply.text().contains("try again"));
    }

    #[tokio::test]
    async fn direct_request_path_computes_without_a_session() {
        use crate::domain::{CalcMode, CoatingParams, CoatingSpec};
        let (intake, sessions, _rx) = intake_with(100);
        let req = ComparisonRequest {
            product_area: 12.0,
            mode: CalcMode::Practical,
            coating_a: CoatingSpec {
                name: "A".into(),
                params: CoatingParams::Practical { consumption: 0.85, price: 450.0 },
            },
            coating_b: CoatingSpec {
                name: "B".into(),
                params: CoatingParams::Practical { consumption: 1.0, price: 500.0 },
            },
        };
        let result = intake.handle_request(&req).unwrap();
        assert_eq!(result.cheaper_name(), "A");
        assert!(sessions.is_empty());

        let bad = ComparisonRequest { product_area: -1.0, ..req };
        assert_eq!(intake.handle_request(&bad), Err(CalcError::InvalidArea));
    }

    #[test]
    fn sharding_is_stable_and_in_range() {
        for id in [-5_i64, -1, 0, 1, 7, 1_000_003] {
            let s = shard_for(id, 4);
            assert!(s < 4);
            assert_eq!(s, shard_for(id, 4));
        }
    }
}
