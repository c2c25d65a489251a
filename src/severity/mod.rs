//! Severity scoring
//!
//! Pure, deterministic mapping from hazard measurements to a bounded score and
//! display tier. Never persisted; always recomputed from source measurements.

use serde::{Deserialize, Serialize};

/// Rainfall normalization domain upper bound (mm)
const RAINFALL_DOMAIN_MM: f64 = 500.0;
/// Wind normalization domain upper bound (km/h)
const WIND_DOMAIN_KMH: f64 = 200.0;

const RAINFALL_WEIGHT: f64 = 0.4;
const WIND_WEIGHT: f64 = 0.3;
const FLOODING_WEIGHT: f64 = 0.3;

/// Flooding risk reported for a district
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloodingRisk {
    Low,
    Moderate,
    High,
}

impl FloodingRisk {
    /// Fixed ordinal contribution on the 0-10 scale
    fn ordinal_score(self) -> f64 {
        match self {
            FloodingRisk::Low => 2.0,
            FloodingRisk::Moderate => 5.0,
            FloodingRisk::High => 9.0,
        }
    }
}

/// Display color tier derived from the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityColor {
    Yellow,
    Orange,
    Red,
}

/// Coarse severity level, same boundaries as the color tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Low,
    Moderate,
    High,
}

/// Result of scoring one set of measurements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityResult {
    /// Final weighted score, one decimal, in [0, 10]
    pub score: f64,
    pub color: SeverityColor,
    pub level: SeverityLevel,
}

/// A generic hazard indicator for the weighted-average entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardIndicator {
    /// Indicator kind, e.g. "storm-surge"
    pub kind: String,
    /// Value on the common 0-10 scale
    pub value: f64,
    /// Relative weight, must be positive to count
    pub weight: f64,
}

/// Clamp a possibly non-finite value into [lo, hi]
fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.max(lo).min(hi)
}

/// Normalize a measurement linearly from [0, domain] onto [0, 10], clamped
fn normalize(value: f64, domain: f64) -> f64 {
    clamp(value / domain * 10.0, 0.0, 10.0)
}

/// Round to one decimal place
fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Color tier on the final score: yellow up to 3.9, orange 4.0-6.9, red from 7.0
fn color_for(score: f64) -> SeverityColor {
    let score = clamp(score, 0.0, 10.0);
    if score < 4.0 {
        SeverityColor::Yellow
    } else if score < 7.0 {
        SeverityColor::Orange
    } else {
        SeverityColor::Red
    }
}

fn level_for(score: f64) -> SeverityLevel {
    let score = clamp(score, 0.0, 10.0);
    if score < 4.0 {
        SeverityLevel::Low
    } else if score < 7.0 {
        SeverityLevel::Moderate
    } else {
        SeverityLevel::High
    }
}

/// Score a district's measurements
///
/// Total for any finite or non-finite numeric input: out-of-domain and NaN values
/// are clamped rather than rejected.
pub fn calculate_severity(
    rainfall_mm: f64,
    wind_kmh: f64,
    flooding: FloodingRisk,
) -> SeverityResult {
    let rainfall_norm = normalize(rainfall_mm, RAINFALL_DOMAIN_MM);
    let wind_norm = normalize(wind_kmh, WIND_DOMAIN_KMH);
    let flooding_score = flooding.ordinal_score();

    let weighted = RAINFALL_WEIGHT * rainfall_norm
        + WIND_WEIGHT * wind_norm
        + FLOODING_WEIGHT * flooding_score;
    let score = round_one_decimal(clamp(weighted, 0.0, 10.0));

    SeverityResult {
        score,
        color: color_for(score),
        level: level_for(score),
    }
}

/// Weighted average over an arbitrary set of indicators
///
/// Generalized entry point for hazard types beyond the rainfall/wind/flooding
/// triple. Values are clamped to [0, 10]; indicators with non-positive weights are
/// skipped; an empty (or fully skipped) list scores 0.
pub fn combined_score(indicators: &[HazardIndicator]) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for indicator in indicators {
        if !indicator.weight.is_finite() || indicator.weight <= 0.0 {
            continue;
        }
        weighted_sum += clamp(indicator.value, 0.0, 10.0) * indicator.weight;
        weight_total += indicator.weight;
    }

    if weight_total == 0.0 {
        return 0.0;
    }

    round_one_decimal(weighted_sum / weight_total)
}
