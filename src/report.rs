// ===============================
// src/report.rs
// ===============================
//
// Turns finalized data into operator-facing text and a document. The
// document renderer is a seam: the built-in one emits a plain-text file,
// a PDF typesetter can be plugged in behind the same trait.
//
use thiserror::Error;

use crate::domain::{CalcMode, CoatingMetrics, ComparisonResult, OrderRequest, Report};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render")]
    Empty,
}

pub trait DocumentRenderer: Send + Sync {
    /// Produce document bytes for the report. Failure is non-fatal: the
    /// dispatcher falls back to text-only delivery.
    fn render(&self, report: &Report) -> Result<Vec<u8>, RenderError>;

    fn filename(&self) -> &'static str {
        "coating_report.txt"
    }
}

fn mode_label(mode: CalcMode) -> &'static str {
    match mode {
        CalcMode::Theoretical => "Theoretical",
        CalcMode::Practical => "Practical",
    }
}

fn coating_block(label: &str, m: &CoatingMetrics) -> String {
    format!(
        "{label}: {name}\n\
         • coverage: {cov:.3} m2/kg\n\
         • consumption: {cons:.3} kg\n\
         • cost: {cost:.2}\n\
         • cost per m2: {cpa:.2}",
        name = m.name,
        cov = m.coverage_area,
        cons = m.consumption,
        cost = m.cost,
        cpa = m.cost_per_area,
    )
}

fn verdict(result: &ComparisonResult) -> String {
    format!(
        "Cheaper: {} — saves {:.2} ({:.1}%)",
        result.cheaper_name(),
        result.cost_difference.abs(),
        result.difference_percent,
    )
}

/// Plain-text summary sent back to the submitter and to the operator chat.
pub fn summary(result: &ComparisonResult) -> String {
    format!(
        "{mode} comparison, area {area} m2\n\n{a}\n\n{b}\n\n{v}",
        mode = mode_label(result.mode),
        area = result.product_area,
        a = coating_block("Coating 1", &result.a),
        b = coating_block("Coating 2", &result.b),
        v = verdict(result),
    )
}

fn order_block(order: &OrderRequest) -> String {
    format!(
        "Order\n\
         • surface: {}\n\
         • color: {}\n\
         • quantity: {:.2} kg",
        order.surface_type, order.color, order.quantity_kg,
    )
}

/// Operator-facing text for a finalized report.
pub fn operator_text(report: &Report) -> String {
    let mut parts = vec![format!("New request from submitter {}", report.submitter_id)];
    if let Some(order) = &report.order {
        parts.push(order_block(order));
        if let Some(result) = &order.comparison {
            parts.push(summary(result));
        }
    }
    if let Some(result) = &report.comparison {
        parts.push(summary(result));
    }
    parts.join("\n\n")
}

/// Built-in renderer: the operator text as a UTF-8 document.
pub struct TextRenderer;

impl DocumentRenderer for TextRenderer {
    fn render(&self, report: &Report) -> Result<Vec<u8>, RenderError> {
        if report.comparison.is_none() && report.order.is_none() {
            return Err(RenderError::Empty);
        }
        let mut doc = String::from("COATING COST REPORT\n===================\n\n");
        doc.push_str(&operator_text(report));
        doc.push('\n');
        Ok(doc.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc;
    use crate::domain::{CalcMode, CoatingParams, CoatingSpec, ComparisonRequest};

    fn sample_result() -> ComparisonResult {
        calc::compare(&ComparisonRequest {
            product_area: 12.0,
            mode: CalcMode::Practical,
            coating_a: CoatingSpec {
                name: "Primex".into(),
                params: CoatingParams::Practical { consumption: 0.85, price: 450.0 },
            },
            coating_b: CoatingSpec {
                name: "Duralux".into(),
                params: CoatingParams::Practical { consumption: 1.0, price: 500.0 },
            },
        })
        .unwrap()
    }

    #[test]
    fn summary_names_both_coatings_and_the_verdict() {
        let text = summary(&sample_result());
        assert!(text.contains("Primex"));
        assert!(text.contains("Duralux"));
        assert!(text.contains("Cheaper: Primex"));
        assert!(text.contains("382.50"));
    }

    #[test]
    fn renderer_produces_document_bytes() {
        let report = Report { submitter_id: 1, comparison: Some(sample_result()), order: None };
        let bytes = TextRenderer.render(&report).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("COATING COST REPORT"));
        assert!(text.contains("submitter 1"));
    }

    #[test]
    fn renderer_rejects_empty_report() {
        let report = Report { submitter_id: 1, comparison: None, order: None };
        assert!(TextRenderer.render(&report).is_err());
    }

    #[test]
    fn operator_text_includes_linked_comparison() {
        let order = OrderRequest {
            surface_type: "steel".into(),
            color: "RAL 9005".into(),
            quantity_kg: 25.0,
            comparison: Some(sample_result()),
        };
        let report = Report { submitter_id: 9, comparison: None, order: Some(order) };
        let text = operator_text(&report);
        assert!(text.contains("surface: steel"));
        assert!(text.contains("Cheaper: Primex"));
    }
}
