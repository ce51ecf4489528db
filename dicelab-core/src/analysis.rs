//! Comparison analysis over a completed plan result.

use crate::runner::{PlanResult, SpecAggregate};
use serde::{Deserialize, Serialize};

/// Rankings and recommendations derived from a multi-spec run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Spec names ordered best-first by ROI
    pub by_roi: Vec<String>,
    /// Spec names ordered best-first by profitable-session rate
    pub by_profitability_rate: Vec<String>,
    /// Spec names ordered best-first by average win rate
    pub by_win_rate: Vec<String>,
    /// Spec names ordered best-first by (lowest) worst drawdown
    pub by_drawdown: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Rank the specs of a plan result along the standard axes.
pub fn analyze_comparison(result: &PlanResult) -> ComparisonReport {
    let specs = &result.per_spec;

    let ranked = |key: fn(&SpecAggregate) -> f64, descending: bool| -> Vec<String> {
        let mut ordered: Vec<&SpecAggregate> = specs.iter().collect();
        ordered.sort_by(|a, b| {
            let cmp = key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal);
            if descending {
                cmp.reverse()
            } else {
                cmp
            }
        });
        ordered.into_iter().map(|s| s.name.clone()).collect()
    };

    let by_roi = ranked(|s| s.aggregate.overall_roi, true);
    let by_profitability_rate = ranked(|s| s.aggregate.profitability_rate, true);
    let by_win_rate = ranked(|s| s.aggregate.average_win_rate, true);
    let by_drawdown = ranked(
        |s| {
            use rust_decimal::prelude::ToPrimitive;
            s.aggregate.worst_drawdown.to_f64().unwrap_or(1.0)
        },
        false,
    );

    let mut recommendations = Vec::new();
    let find = |name: &str| specs.iter().find(|s| s.name == name);
    if let Some(best) = by_roi.first().and_then(|n| find(n)) {
        recommendations.push(format!(
            "Best ROI: {} ({:.2}%)",
            best.name,
            best.aggregate.overall_roi * 100.0
        ));
    }
    if let Some(best) = by_profitability_rate.first().and_then(|n| find(n)) {
        recommendations.push(format!(
            "Most consistent: {} ({:.1}% profitable sessions)",
            best.name,
            best.aggregate.profitability_rate * 100.0
        ));
    }
    if let Some(best) = by_drawdown.first().and_then(|n| find(n)) {
        use rust_decimal::prelude::ToPrimitive;
        recommendations.push(format!(
            "Lowest risk: {} ({:.1}% worst drawdown)",
            best.name,
            best.aggregate.worst_drawdown.to_f64().unwrap_or(0.0) * 100.0
        ));
    }

    ComparisonReport {
        by_roi,
        by_profitability_rate,
        by_win_rate,
        by_drawdown,
        recommendations,
    }
}
