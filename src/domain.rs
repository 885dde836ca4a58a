// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};

/// Identity of the person talking to the bot (Telegram chat id).
pub type SubmitterId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcMode { Theoretical, Practical }

impl CalcMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalcMode::Theoretical => "theoretical",
            CalcMode::Practical => "practical",
        }
    }
}

pub const DEFAULT_LOSS_FACTOR: f64 = 0.15;

/// Physical parameters of one coating, shaped by the calculation mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CoatingParams {
    /// density (g/cm3), thickness (µm), price per kg; loss_factor defaults to 0.15
    Theoretical { density: f64, thickness: f64, price: f64, loss_factor: f64 },
    /// measured consumption (kg) for the whole product area, price per kg
    Practical { consumption: f64, price: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoatingSpec {
    pub name: String,
    pub params: CoatingParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub product_area: f64,
    pub mode: CalcMode,
    pub coating_a: CoatingSpec,
    pub coating_b: CoatingSpec,
}

/// Per-coating figures derived by the calculation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoatingMetrics {
    pub name: String,
    /// m2 coverable by one kg at the given thickness/density
    pub coverage_area: f64,
    /// kg needed for the product area (loss included in theoretical mode)
    pub consumption: f64,
    pub cost: f64,
    pub cost_per_area: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cheaper { A, B }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub mode: CalcMode,
    pub product_area: f64,
    pub a: CoatingMetrics,
    pub b: CoatingMetrics,
    pub cheaper: Cheaper,
    /// cost_b - cost_a
    pub cost_difference: f64,
    pub difference_percent: f64,
}

impl ComparisonResult {
    pub fn cheaper_name(&self) -> &str {
        match self.cheaper {
            Cheaper::A => &self.a.name,
            Cheaper::B => &self.b.name,
        }
    }
}

/// Follow-on order collected after a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub surface_type: String,
    pub color: String,
    pub quantity_kg: f64,
    pub comparison: Option<ComparisonResult>,
}

/// Everything the dispatcher needs to notify the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub submitter_id: SubmitterId,
    pub comparison: Option<ComparisonResult>,
    pub order: Option<OrderRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome { Delivered, Failed }

/// One inbound conversational message tagged with its sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeMessage {
    pub submitter_id: SubmitterId,
    pub text: String,
}

/// Recorder event stream (JSONL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Intake(IntakeMessage),
    Reply { submitter_id: SubmitterId, text: String },
    RateLimited { submitter_id: SubmitterId },
    Comparison(ComparisonResult),
    Order { submitter_id: SubmitterId, surface_type: String, quantity_kg: f64 },
    Delivery { submitter_id: SubmitterId, outcome: DeliveryOutcome, attempts: u32 },
    Note(String),
}
