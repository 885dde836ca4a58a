// ===============================
// src/session.rs
// ===============================
//
// Per-submitter conversational state. The store is a map of submitter id ->
// Arc<tokio::Mutex<Session>>: the outer std lock only guards map access, the
// per-entry mutex serializes messages from one submitter without blocking
// anyone else.
//
// Calculation branch: Idle -> AwaitingArea -> AwaitingCoatingA
//                     -> AwaitingCoatingB -> Completed
// Order branch:       AwaitingSurface -> AwaitingColor -> AwaitingQuantity
//                     -> submitted (session destroyed by the caller)
//
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ahash::AHashMap as HashMap;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::calc::{self, CalcError};
use crate::domain::{
    CalcMode, CoatingParams, CoatingSpec, ComparisonRequest, ComparisonResult, Report,
    SubmitterId, DEFAULT_LOSS_FACTOR,
};

#[derive(Debug, Error, PartialEq)]
pub enum StepError {
    #[error("expected a number, got `{0}`")]
    NotANumber(String),
    #[error("expected {expected} fields separated by `;`, got {got}")]
    FieldCount { expected: &'static str, got: usize },
    #[error(transparent)]
    Calc(#[from] CalcError),
    #[error("unknown command; send /theory, /practice or /order")]
    UnknownCommand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Idle,
    AwaitingArea { mode: CalcMode },
    AwaitingCoatingA { mode: CalcMode, area: f64 },
    AwaitingCoatingB { mode: CalcMode, area: f64, coating_a: CoatingSpec },
    Completed,
    AwaitingSurface,
    AwaitingColor { surface: String },
    AwaitingQuantity { surface: String, color: String },
}

#[derive(Debug)]
pub struct Session {
    pub submitter_id: SubmitterId,
    pub step: Step,
    pub last_result: Option<ComparisonResult>,
    pub last_activity_ms: i64,
}

impl Session {
    pub fn new(submitter_id: SubmitterId) -> Self {
        Self {
            submitter_id,
            step: Step::Idle,
            last_result: None,
            last_activity_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_ms = Utc::now().timestamp_millis();
    }
}

/// What one message did to the session.
#[derive(Debug)]
pub enum Outcome {
    /// step advanced (or a command was handled); reply for the submitter
    Reply(String),
    /// comparison finalized; session kept in `Completed` for a follow-on order
    Completed { report: Report, reply: String },
    /// order finalized; caller must destroy the session
    Submitted { report: Report, reply: String },
    /// input rejected; step and accumulated data unchanged
    Invalid(StepError),
}

const USAGE: &str = "Commands:\n\
    /theory — compare two coatings from physical parameters\n\
    /practice — compare two coatings from measured consumption\n\
    /order — place an order for the cheaper coating\n\
    /cancel — drop the current dialog";

fn greeting() -> String {
    format!("Welcome to the coating cost calculator!\n\n{USAGE}")
}

/// Accept both `12.5` and `12,5`.
fn parse_decimal(raw: &str) -> Result<f64, StepError> {
    let cleaned = raw.trim().replace(',', ".");
    cleaned
        .parse::<f64>()
        .map_err(|_| StepError::NotANumber(raw.trim().to_string()))
}

fn coating_prompt(mode: CalcMode, which: char) -> String {
    match mode {
        CalcMode::Theoretical => format!(
            "Coating {which}: send `name; density g/cm3; thickness um; price per kg` \
             (optionally `; loss factor`, default {DEFAULT_LOSS_FACTOR})"
        ),
        CalcMode::Practical => {
            format!("Coating {which}: send `name; consumption kg; price per kg`")
        }
    }
}

/// Positional, semicolon-separated coating input for the given mode.
/// Fields are validated for positivity here so a bad value is rejected at
/// the step it was typed, not at the end of the dialog.
fn parse_coating(raw: &str, mode: CalcMode) -> Result<CoatingSpec, StepError> {
    let fields: Vec<&str> = raw.split(';').map(str::trim).collect();
    match mode {
        CalcMode::Theoretical => {
            if fields.len() < 4 || fields.len() > 5 || fields[0].is_empty() {
                return Err(StepError::FieldCount {
                    expected: "name; density; thickness; price[; loss factor]",
                    got: fields.len(),
                });
            }
            let density = parse_decimal(fields[1])?;
            let thickness = parse_decimal(fields[2])?;
            let price = parse_decimal(fields[3])?;
            let loss_factor = match fields.get(4) {
                Some(f) => parse_decimal(f)?,
                None => DEFAULT_LOSS_FACTOR,
            };
            if density <= 0.0 || thickness <= 0.0 || price <= 0.0 || loss_factor <= 0.0 {
                return Err(StepError::Calc(CalcError::InvalidPhysicalParameter));
            }
            Ok(CoatingSpec {
                name: fields[0].to_string(),
                params: CoatingParams::Theoretical { density, thickness, price, loss_factor },
            })
        }
        CalcMode::Practical => {
            if fields.len() != 3 || fields[0].is_empty() {
                return Err(StepError::FieldCount {
                    expected: "name; consumption; price",
                    got: fields.len(),
                });
            }
            let consumption = parse_decimal(fields[1])?;
            let price = parse_decimal(fields[2])?;
            if consumption <= 0.0 {
                return Err(StepError::Calc(CalcError::InvalidConsumption));
            }
            if price <= 0.0 {
                return Err(StepError::Calc(CalcError::InvalidPhysicalParameter));
            }
            Ok(CoatingSpec {
                name: fields[0].to_string(),
                params: CoatingParams::Practical { consumption, price },
            })
        }
    }
}

/// Feed one textual input to the session. Commands are accepted in any
/// state; everything else is interpreted by the current step.
pub fn advance(session: &mut Session, text: &str) -> Outcome {
    let text = text.trim();

    match text {
        "/start" => {
            session.step = Step::Idle;
            return Outcome::Reply(greeting());
        }
        "/cancel" => {
            session.step = Step::Idle;
            return Outcome::Reply(format!("Dialog dropped.\n\n{USAGE}"));
        }
        "/theory" => {
            session.step = Step::AwaitingArea { mode: CalcMode::Theoretical };
            return Outcome::Reply("Product area, m2?".to_string());
        }
        "/practice" => {
            session.step = Step::AwaitingArea { mode: CalcMode::Practical };
            return Outcome::Reply("Product area, m2?".to_string());
        }
        "/order" => {
            session.step = Step::AwaitingSurface;
            return Outcome::Reply("Surface type? (e.g. steel, galvanized, aluminum)".to_string());
        }
        _ => {}
    }

    match session.step.clone() {
        Step::Idle | Step::Completed => Outcome::Invalid(StepError::UnknownCommand),

        Step::AwaitingArea { mode } => match parse_decimal(text) {
            Ok(area) if area > 0.0 => {
                session.step = Step::AwaitingCoatingA { mode, area };
                Outcome::Reply(coating_prompt(mode, '1'))
            }
            Ok(_) => Outcome::Invalid(StepError::Calc(CalcError::InvalidArea)),
            Err(e) => Outcome::Invalid(e),
        },

        Step::AwaitingCoatingA { mode, area } => match parse_coating(text, mode) {
            Ok(coating_a) => {
                session.step = Step::AwaitingCoatingB { mode, area, coating_a };
                Outcome::Reply(coating_prompt(mode, '2'))
            }
            Err(e) => Outcome::Invalid(e),
        },

        Step::AwaitingCoatingB { mode, area, coating_a } => {
            let coating_b = match parse_coating(text, mode) {
                Ok(c) => c,
                Err(e) => return Outcome::Invalid(e),
            };
            let req = ComparisonRequest {
                product_area: area,
                mode,
                coating_a,
                coating_b,
            };
            match calc::compare(&req) {
                Ok(result) => {
                    let reply = crate::report::summary(&result);
                    session.last_result = Some(result.clone());
                    session.step = Step::Completed;
                    let report = Report {
                        submitter_id: session.submitter_id,
                        comparison: Some(result),
                        order: None,
                    };
                    Outcome::Completed { report, reply }
                }
                Err(e) => Outcome::Invalid(StepError::Calc(e)),
            }
        }

        Step::AwaitingSurface => {
            if text.is_empty() {
                return Outcome::Invalid(StepError::UnknownCommand);
            }
            session.step = Step::AwaitingColor { surface: text.to_string() };
            Outcome::Reply("Color?".to_string())
        }

        Step::AwaitingColor { surface } => {
            if text.is_empty() {
                return Outcome::Invalid(StepError::UnknownCommand);
            }
            session.step = Step::AwaitingQuantity { surface, color: text.to_string() };
            Outcome::Reply("Quantity, kg?".to_string())
        }

        Step::AwaitingQuantity { surface, color } => match parse_decimal(text) {
            Ok(qty) if qty > 0.0 => {
                let order = crate::domain::OrderRequest {
                    surface_type: surface,
                    color,
                    quantity_kg: qty,
                    comparison: session.last_result.clone(),
                };
                let report = Report {
                    submitter_id: session.submitter_id,
                    comparison: None,
                    order: Some(order),
                };
                Outcome::Submitted {
                    report,
                    reply: "Order accepted, the operator will contact you shortly.".to_string(),
                }
            }
            Ok(_) => Outcome::Invalid(StepError::Calc(CalcError::InvalidConsumption)),
            Err(e) => Outcome::Invalid(e),
        },
    }
}

// -------- store --------

#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<SubmitterId, Arc<AsyncMutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing session for `id`, created on first contact.
    pub fn entry(&self, id: SubmitterId) -> Arc<AsyncMutex<Session>> {
        let mut map = self.inner.lock().expect("session store lock poisoned");
        map.entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(id))))
            .clone()
    }

    pub fn remove(&self, id: SubmitterId) {
        let mut map = self.inner.lock().expect("session store lock poisoned");
        map.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions idle for longer than `ttl`. Entries currently locked by
    /// an in-flight message are skipped and picked up on the next sweep.
    pub fn evict_idle(&self, ttl: Duration) -> Vec<SubmitterId> {
        self.evict_idle_at(ttl, Utc::now().timestamp_millis())
    }

    fn evict_idle_at(&self, ttl: Duration, now_ms: i64) -> Vec<SubmitterId> {
        let ttl_ms = ttl.as_millis() as i64;
        let mut map = self.inner.lock().expect("session store lock poisoned");
        let mut evicted = Vec::new();
        map.retain(|id, slot| match slot.try_lock() {
            Ok(sess) if now_ms - sess.last_activity_ms >= ttl_ms => {
                evicted.push(*id);
                false
            }
            _ => true,
        });
        evicted
    }
}
