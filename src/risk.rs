//! ==============================================================================
//! risk.rs - neuro-health risk assessment and air-quality bands
//! ==============================================================================
//!
//! purpose:
//!     pure functions over a window of readings. nothing here is stored; the
//!     dashboard recomputes on every window change.
//!
//!     cumulative_exposure   = mean pm2.5 over the window
//!     time_above_threshold  = % of samples with pm2.5 > threshold (35)
//!     level                 = exposure against the breakpoint table
//!     percentage            = 0.7 * exposure index + 0.3 * time above threshold
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};

use crate::domain::Reading;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

/// breakpoints and weights; all concentrations in µg/m³
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// exposure at or above this is moderate
    pub moderate: f64,
    /// exposure at or above this is high
    pub high: f64,
    /// exposure at or above this is critical
    pub critical: f64,
    /// a sample counts toward time_above_threshold when pm2.5 exceeds this
    pub threshold: f64,
    /// exposure mapped to a 100% exposure index
    pub saturation: f64,
    pub exposure_weight: f64,
    pub time_weight: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            moderate: 12.0,
            high: 35.0,
            critical: 55.0,
            threshold: 35.0,
            saturation: 75.0,
            exposure_weight: 0.7,
            time_weight: 0.3,
        }
    }
}

impl RiskPolicy {
    pub fn level_for(&self, exposure: f64) -> RiskLevel {
        if exposure >= self.critical {
            RiskLevel::Critical
        } else if exposure >= self.high {
            RiskLevel::High
        } else if exposure >= self.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub percentage: f64,
    pub cumulative_exposure: f64,
    pub time_above_threshold: f64,
    pub samples: usize,
}

pub fn assess(window: &[Reading], policy: &RiskPolicy) -> RiskAssessment {
    if window.is_empty() {
        return RiskAssessment {
            level: RiskLevel::Low,
            percentage: 0.0,
            cumulative_exposure: 0.0,
            time_above_threshold: 0.0,
            samples: 0,
        };
    }

    let n = window.len() as f64;
    let exposure = window.iter().map(|r| r.pm25).sum::<f64>() / n;
    let above = window.iter().filter(|r| r.pm25 > policy.threshold).count() as f64;
    let time_above = 100.0 * above / n;

    let exposure_index = if policy.saturation > 0.0 {
        (100.0 * exposure / policy.saturation).min(100.0)
    } else {
        100.0
    };
    let percentage = (policy.exposure_weight * exposure_index + policy.time_weight * time_above)
        .clamp(0.0, 100.0);

    RiskAssessment {
        level: policy.level_for(exposure),
        percentage,
        cumulative_exposure: exposure,
        time_above_threshold: time_above,
        samples: window.len(),
    }
}

/// us epa pm2.5 category of a single concentration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AirQualityBand {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AirQualityBand {
    pub fn classify(pm25: f64) -> Self {
        match pm25 {
            v if v <= 12.0 => Self::Good,
            v if v <= 35.4 => Self::Moderate,
            v if v <= 55.4 => Self::UnhealthySensitive,
            v if v <= 150.4 => Self::Unhealthy,
            v if v <= 250.4 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthySensitive => "Unhealthy for sensitive groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    /// marker color for map rendering
    pub fn color(&self) -> &'static str {
        match self {
            Self::Good => "#22c55e",
            Self::Moderate => "#eab308",
            Self::UnhealthySensitive => "#f97316",
            Self::Unhealthy => "#ef4444",
            Self::VeryUnhealthy => "#a855f7",
            Self::Hazardous => "#7f1d1d",
        }
    }
}

/// averages panel: means rounded to one decimal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub samples: usize,
    pub avg_pm25: f64,
    /// mean over readings that carry pm10; None when none do
    pub avg_pm10: Option<f64>,
}

impl WindowSummary {
    pub fn of(window: &[Reading]) -> Self {
        let round1 = |v: f64| (v * 10.0).round() / 10.0;
        let avg_pm25 = if window.is_empty() {
            0.0
        } else {
            round1(window.iter().map(|r| r.pm25).sum::<f64>() / window.len() as f64)
        };
        let pm10: Vec<f64> = window.iter().filter_map(|r| r.pm10).collect();
        let avg_pm10 = (!pm10.is_empty()).then(|| round1(pm10.iter().sum::<f64>() / pm10.len() as f64));
        Self { samples: window.len(), avg_pm25, avg_pm10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReadingKind;

    fn window(values: &[f64]) -> Vec<Reading> {
        values
            .iter()
            .enumerate()
            .map(|(i, &pm25)| Reading {
                seq: i as u64 + 1,
                kind: ReadingKind::Node,
                node: None,
                pm25,
                pm10: Some(pm25 + 1.0),
                lat: 45.0,
                lon: 9.0,
                timestamp: 1_700_000_000_000 + i as i64,
            })
            .collect()
    }

    #[test]
    fn reference_window_is_deterministic() {
        let a = assess(&window(&[10.0, 40.0, 40.0, 10.0]), &RiskPolicy::default());
        assert_eq!(a.time_above_threshold, 50.0);
        assert_eq!(a.cumulative_exposure, 25.0);
        assert_eq!(a.level, RiskLevel::Moderate);
        assert_eq!(a.samples, 4);
        // 0.7 * (25/75*100) + 0.3 * 50
        assert!((a.percentage - (0.7 * 100.0 / 3.0 + 15.0)).abs() < 1e-9);
    }

    #[test]
    fn empty_window_is_low_and_zero() {
        let a = assess(&[], &RiskPolicy::default());
        assert_eq!(a.level, RiskLevel::Low);
        assert_eq!(a.time_above_threshold, 0.0);
        assert_eq!(a.cumulative_exposure, 0.0);
        assert_eq!(a.percentage, 0.0);
    }

    #[test]
    fn breakpoints_are_inclusive_lower_bounds() {
        let p = RiskPolicy::default();
        assert_eq!(p.level_for(11.9), RiskLevel::Low);
        assert_eq!(p.level_for(12.0), RiskLevel::Moderate);
        assert_eq!(p.level_for(35.0), RiskLevel::High);
        assert_eq!(p.level_for(55.0), RiskLevel::Critical);
    }

    #[test]
    fn percentage_saturates_at_one_hundred() {
        let a = assess(&window(&[300.0, 400.0]), &RiskPolicy::default());
        assert_eq!(a.level, RiskLevel::Critical);
        assert_eq!(a.percentage, 100.0);
    }

    #[test]
    fn bands_follow_epa_breakpoints() {
        assert_eq!(AirQualityBand::classify(12.0), AirQualityBand::Good);
        assert_eq!(AirQualityBand::classify(12.1), AirQualityBand::Moderate);
        assert_eq!(AirQualityBand::classify(55.0), AirQualityBand::UnhealthySensitive);
        assert_eq!(AirQualityBand::classify(500.0), AirQualityBand::Hazardous);
    }

    #[test]
    fn summary_rounds_and_skips_missing_pm10() {
        let mut w = window(&[10.0, 11.0, 11.0]);
        w[2].pm10 = None;
        let s = WindowSummary::of(&w);
        assert_eq!(s.samples, 3);
        assert_eq!(s.avg_pm25, 10.7);
        assert_eq!(s.avg_pm10, Some(11.5));
        assert_eq!(WindowSummary::of(&[]).avg_pm10, None);
    }
}
