// ===============================
// src/calc.rs
// ===============================
//
// Calculation engine. Pure functions, no I/O.
//
// Canonical comparison rule (variants of the old webapp disagreed, we pin one):
//   difference = cost_b - cost_a
//   cheaper    = A when difference > 0, else B (ties go to B)
//   percent    = |difference| / min(cost_a, cost_b) * 100, or 0 when min is 0
//
use thiserror::Error;

use crate::domain::{
    CalcMode, Cheaper, CoatingMetrics, CoatingParams, CoatingSpec, ComparisonRequest,
    ComparisonResult,
};

#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("product area must be positive")]
    InvalidArea,
    #[error("consumption must be positive")]
    InvalidConsumption,
    #[error("density, thickness, price and loss factor must be positive")]
    InvalidPhysicalParameter,
    #[error("coating parameters do not match the requested mode")]
    ModeMismatch,
}

/// Metrics from physical parameters: coverage from density x thickness,
/// consumption scaled up by the loss factor.
pub fn theoretical(
    name: &str,
    density: f64,
    thickness: f64,
    price: f64,
    loss_factor: f64,
    area: f64,
) -> Result<CoatingMetrics, CalcError> {
    if area <= 0.0 {
        return Err(CalcError::InvalidArea);
    }
    if density <= 0.0 || thickness <= 0.0 || price <= 0.0 || loss_factor <= 0.0 {
        return Err(CalcError::InvalidPhysicalParameter);
    }
    let coverage = 1000.0 / (density * thickness);
    let theoretical_consumption = area / coverage;
    let practical_consumption = theoretical_consumption * (1.0 + loss_factor);
    let cost = practical_consumption * price;
    Ok(CoatingMetrics {
        name: name.to_string(),
        coverage_area: coverage,
        consumption: practical_consumption,
        cost,
        cost_per_area: cost / area,
    })
}

/// Metrics from a measured real consumption for the whole area.
pub fn practical(
    name: &str,
    consumption: f64,
    price: f64,
    area: f64,
) -> Result<CoatingMetrics, CalcError> {
    if area <= 0.0 {
        return Err(CalcError::InvalidArea);
    }
    if consumption <= 0.0 {
        return Err(CalcError::InvalidConsumption);
    }
    if price <= 0.0 {
        return Err(CalcError::InvalidPhysicalParameter);
    }
    let cost = consumption * price;
    Ok(CoatingMetrics {
        name: name.to_string(),
        coverage_area: area / consumption,
        consumption,
        cost,
        cost_per_area: cost / area,
    })
}

fn metrics_for(spec: &CoatingSpec, mode: CalcMode, area: f64) -> Result<CoatingMetrics, CalcError> {
    match (&spec.params, mode) {
        (
            CoatingParams::Theoretical { density, thickness, price, loss_factor },
            CalcMode::Theoretical,
        ) => theoretical(&spec.name, *density, *thickness, *price, *loss_factor, area),
        (CoatingParams::Practical { consumption, price }, CalcMode::Practical) => {
            practical(&spec.name, *consumption, *price, area)
        }
        _ => Err(CalcError::ModeMismatch),
    }
}

pub fn compare(req: &ComparisonRequest) -> Result<ComparisonResult, CalcError> {
    if req.product_area <= 0.0 {
        return Err(CalcError::InvalidArea);
    }
    let a = metrics_for(&req.coating_a, req.mode, req.product_area)?;
    let b = metrics_for(&req.coating_b, req.mode, req.product_area)?;

    let difference = b.cost - a.cost;
    let cheaper = if difference > 0.0 { Cheaper::A } else { Cheaper::B };
    let min_cost = a.cost.min(b.cost);
    let percent = if min_cost > 0.0 {
        difference.abs() / min_cost * 100.0
    } else {
        0.0
    };

    Ok(ComparisonResult {
        mode: req.mode,
        product_area: req.product_area,
        a,
        b,
        cheaper,
        cost_difference: difference,
        difference_percent: percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_LOSS_FACTOR;

    fn theo_spec(name: &str, density: f64, thickness: f64, price: f64) -> CoatingSpec {
        CoatingSpec {
            name: name.to_string(),
            params: CoatingParams::Theoretical {
                density,
                thickness,
                price,
                loss_factor: DEFAULT_LOSS_FACTOR,
            },
        }
    }

    fn pract_spec(name: &str, consumption: f64, price: f64) -> CoatingSpec {
        CoatingSpec {
            name: name.to_string(),
            params: CoatingParams::Practical { consumption, price },
        }
    }

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn theoretical_anchor_values() {
        // area=12, density=1.4, thickness=80, price=450, loss=0.15
        let m = theoretical("P1", 1.4, 80.0, 450.0, 0.15, 12.0).unwrap();
        assert!(close(m.coverage_area, 8.929, 0.001), "coverage {}", m.coverage_area);
        assert!(close(m.consumption, 1.546, 0.001), "consumption {}", m.consumption);
        assert!(close(m.cost, 695.5, 0.1), "cost {}", m.cost);
        assert!(close(m.cost_per_area, 695.5 / 12.0, 0.01));
    }

    #[test]
    fn practical_anchor_values() {
        let m = practical("P1", 0.85, 450.0, 12.0).unwrap();
        assert!(close(m.cost, 382.5, 1e-9));
        assert!(close(m.coverage_area, 14.1176, 0.001));
        assert!(close(m.cost_per_area, 31.875, 1e-9));
    }

    #[test]
    fn theoretical_consumption_scales_with_area() {
        let m1 = theoretical("P", 1.4, 80.0, 450.0, 0.15, 10.0).unwrap();
        let m2 = theoretical("P", 1.4, 80.0, 450.0, 0.15, 20.0).unwrap();
        assert!(close(m2.consumption, m1.consumption * 2.0, 1e-9));
        assert!(close(m2.cost, m1.cost * 2.0, 1e-9));
        // coverage does not depend on area
        assert!(close(m1.coverage_area, m2.coverage_area, 1e-12));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(theoretical("P", 1.4, 80.0, 450.0, 0.15, 0.0), Err(CalcError::InvalidArea));
        assert_eq!(
            theoretical("P", 0.0, 80.0, 450.0, 0.15, 12.0),
            Err(CalcError::InvalidPhysicalParameter)
        );
        assert_eq!(
            theoretical("P", 1.4, -1.0, 450.0, 0.15, 12.0),
            Err(CalcError::InvalidPhysicalParameter)
        );
        assert_eq!(practical("P", 0.0, 450.0, 12.0), Err(CalcError::InvalidConsumption));
        assert_eq!(practical("P", 0.85, 450.0, -3.0), Err(CalcError::InvalidArea));
    }

    #[test]
    fn compare_picks_cheaper_and_percent_over_min() {
        let req = ComparisonRequest {
            product_area: 12.0,
            mode: CalcMode::Practical,
            coating_a: pract_spec("Cheap", 0.85, 450.0),  // 382.5
            coating_b: pract_spec("Dear", 1.0, 500.0),    // 500.0
        };
        let res = compare(&req).unwrap();
        assert_eq!(res.cheaper, Cheaper::A);
        assert_eq!(res.cheaper_name(), "Cheap");
        assert!(close(res.cost_difference, 117.5, 1e-9));
        assert!(close(res.difference_percent, 117.5 / 382.5 * 100.0, 1e-9));
    }

    #[test]
    fn compare_is_symmetric_under_swap() {
        let a = theo_spec("A", 1.4, 80.0, 450.0);
        let b = theo_spec("B", 1.2, 60.0, 520.0);
        let fwd = compare(&ComparisonRequest {
            product_area: 12.0,
            mode: CalcMode::Theoretical,
            coating_a: a.clone(),
            coating_b: b.clone(),
        })
        .unwrap();
        let rev = compare(&ComparisonRequest {
            product_area: 12.0,
            mode: CalcMode::Theoretical,
            coating_a: b,
            coating_b: a,
        })
        .unwrap();

        // magnitudes travel with the coating, only label and sign flip
        assert_eq!(fwd.a, rev.b);
        assert_eq!(fwd.b, rev.a);
        assert!(close(fwd.cost_difference, -rev.cost_difference, 1e-9));
        assert!(close(fwd.difference_percent, rev.difference_percent, 1e-9));
        assert_eq!(fwd.cheaper_name(), rev.cheaper_name());
    }

    #[test]
    fn compare_tie_goes_to_b() {
        let req = ComparisonRequest {
            product_area: 10.0,
            mode: CalcMode::Practical,
            coating_a: pract_spec("A", 1.0, 100.0),
            coating_b: pract_spec("B", 1.0, 100.0),
        };
        let res = compare(&req).unwrap();
        assert_eq!(res.cheaper, Cheaper::B);
        assert!(close(res.cost_difference, 0.0, 1e-12));
        assert!(close(res.difference_percent, 0.0, 1e-12));
    }

    #[test]
    fn compare_rejects_mode_mismatch() {
        let req = ComparisonRequest {
            product_area: 12.0,
            mode: CalcMode::Theoretical,
            coating_a: pract_spec("A", 0.85, 450.0),
            coating_b: pract_spec("B", 1.0, 500.0),
        };
        assert_eq!(compare(&req), Err(CalcError::ModeMismatch));
    }
}
