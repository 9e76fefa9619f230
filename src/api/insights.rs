use serde::Serialize;

use crate::core::SimulationResult;

const HIGH_RISK_CV: f64 = 0.3;
const MEDIUM_RISK_CV: f64 = 0.15;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classifies by coefficient of variation (`std_dev / mean`).
    pub fn classify(mean: f64, std_dev: f64) -> Self {
        if mean <= 0.0 {
            return if std_dev > 0.0 {
                RiskLevel::High
            } else {
                RiskLevel::Low
            };
        }

        let cv = std_dev / mean;
        if cv > HIGH_RISK_CV {
            RiskLevel::High
        } else if cv > MEDIUM_RISK_CV {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub expected_outcome: String,
    pub confidence_range: String,
    pub risk_level: RiskLevel,
    pub growth_probability: String,
}

pub fn build_insights(result: &SimulationResult, horizon_months: u32) -> Insights {
    Insights {
        expected_outcome: format!(
            "Expected MRR after {horizon_months} months is {} (median {})",
            format_money(result.mean),
            format_money(result.percentile_50)
        ),
        confidence_range: format!(
            "95% of simulated outcomes fall between {} and {}",
            format_money(result.confidence_interval_95_low),
            format_money(result.confidence_interval_95_high)
        ),
        risk_level: RiskLevel::classify(result.mean, result.std_dev),
        growth_probability: format!("{:.1}%", result.growth_probability),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub median: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaselineComparison {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_change_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_change_percent: Option<f64>,
}

pub fn compare_to_baseline(result: &SimulationResult, baseline: Baseline) -> BaselineComparison {
    BaselineComparison {
        median_change_percent: change_percent(baseline.median, result.percentile_50),
        mean_change_percent: change_percent(baseline.mean, result.mean),
    }
}

fn change_percent(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() {
        return None;
    }
    Some((current - previous) / previous.abs() * 100.0)
}

fn format_money(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
