//! Estimator Configuration
//!
//! Policy constants for the confidence curve. Defaults match the practiced
//! putting range; the floor of 5 and the minimum span end of 30 may be raised
//! but never lowered.

use std::env;
use std::str::FromStr;

use putting_core::PuttingError;
use serde::{Deserialize, Serialize};

/// Lowest distance the curve may start at
pub const MIN_DISTANCE_FLOOR: u32 = 5;
/// Lowest value the curve's default end may take
pub const MIN_SPAN_END_FLOOR: u32 = 30;
/// Upper bound on `min_span_end`
pub const MAX_SPAN_END: u32 = 1_000;
/// Upper bound on `span_padding`
pub const MAX_SPAN_PADDING: u32 = 100;

/// How the Circle of Confidence is read off the curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CocPolicy {
    /// Edge of the first high-confidence run from the near end
    FirstBreak,
    /// Farthest qualifying distance anywhere on the curve
    GlobalMax,
}

impl FromStr for CocPolicy {
    type Err = PuttingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_break" | "first-break" => Ok(CocPolicy::FirstBreak),
            "global_max" | "global-max" => Ok(CocPolicy::GlobalMax),
            other => Err(PuttingError::InvalidConfig(format!(
                "unknown CoC policy '{other}' (expected first_break or global_max)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// First sampled distance
    pub min_distance: u32,
    /// The curve always reaches at least this far
    pub min_span_end: u32,
    /// Sampled past the farthest observed attempt
    pub span_padding: u32,
    /// Attempts within +/- this distance pool into one estimate
    pub window_radius: f64,
    /// Fewer attempts than this in a window means no local estimate
    pub min_samples: usize,
    /// First-point prior is `near_prior` below this distance, `far_prior` at or above
    pub near_prior_cutoff: u32,
    pub near_prior: f64,
    pub far_prior: f64,
    /// Weight of the previous smoothed value against a new raw estimate (weight 1)
    pub smoothing_weight: f64,
    /// Minimum probability counted as confident (inclusive)
    pub confidence_threshold: f64,
    pub policy: CocPolicy,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_distance: MIN_DISTANCE_FLOOR,
            min_span_end: MIN_SPAN_END_FLOOR,
            span_padding: 5,
            window_radius: 3.0,
            min_samples: 3,
            near_prior_cutoff: 10,
            near_prior: 1.0,
            far_prior: 0.5,
            smoothing_weight: 2.0,
            confidence_threshold: 0.90,
            policy: CocPolicy::FirstBreak,
        }
    }
}

impl EstimatorConfig {
    /// Load from `COC_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, PuttingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PuttingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            min_distance: parse_or(&lookup, "COC_MIN_DISTANCE", defaults.min_distance)?,
            min_span_end: parse_or(&lookup, "COC_MIN_SPAN_END", defaults.min_span_end)?,
            span_padding: parse_or(&lookup, "COC_SPAN_PADDING", defaults.span_padding)?,
            window_radius: parse_or(&lookup, "COC_WINDOW_RADIUS", defaults.window_radius)?,
            min_samples: parse_or(&lookup, "COC_MIN_SAMPLES", defaults.min_samples)?,
            near_prior_cutoff: defaults.near_prior_cutoff,
            near_prior: defaults.near_prior,
            far_prior: defaults.far_prior,
            smoothing_weight: parse_or(&lookup, "COC_SMOOTHING_WEIGHT", defaults.smoothing_weight)?,
            confidence_threshold: parse_or(&lookup, "COC_THRESHOLD", defaults.confidence_threshold)?,
            policy: match lookup("COC_POLICY") {
                Some(raw) => raw.parse()?,
                None => defaults.policy,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PuttingError> {
        if self.min_distance < MIN_DISTANCE_FLOOR {
            return invalid(format!("min_distance must be >= {MIN_DISTANCE_FLOOR}"));
        }
        if self.min_span_end < MIN_SPAN_END_FLOOR {
            return invalid(format!("min_span_end must be >= {MIN_SPAN_END_FLOOR}"));
        }
        if self.min_span_end > MAX_SPAN_END {
            return invalid(format!("min_span_end must be <= {MAX_SPAN_END}"));
        }
        if self.span_padding > MAX_SPAN_PADDING {
            return invalid(format!("span_padding must be <= {MAX_SPAN_PADDING}"));
        }
        if self.min_span_end < self.min_distance {
            return invalid("min_span_end must be >= min_distance".to_string());
        }
        if !self.window_radius.is_finite() || self.window_radius < 0.0 {
            return invalid("window_radius must be finite and >= 0".to_string());
        }
        if self.min_samples == 0 {
            return invalid("min_samples must be at least 1".to_string());
        }
        for (name, value) in [
            ("near_prior", self.near_prior),
            ("far_prior", self.far_prior),
            ("confidence_threshold", self.confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be between 0 and 1"));
            }
        }
        if !self.smoothing_weight.is_finite() || self.smoothing_weight < 0.0 {
            return invalid("smoothing_weight must be finite and >= 0".to_string());
        }
        Ok(())
    }

    /// Last sampled distance for a given farthest attempt.
    pub fn span_end(&self, max_observed: f64) -> u32 {
        let padded = (max_observed.ceil() as u32).saturating_add(self.span_padding);
        padded.max(self.min_span_end)
    }

    /// Probability assumed at the first point when it has too little data.
    pub fn prior_at(&self, distance: u32) -> f64 {
        if distance < self.near_prior_cutoff {
            self.near_prior
        } else {
            self.far_prior
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, PuttingError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PuttingError::InvalidConfig(format!("{key}='{raw}': {e}"))),
        None => Ok(default),
    }
}

fn invalid(message: String) -> Result<(), PuttingError> {
    Err(PuttingError::InvalidConfig(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EstimatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_distance, 5);
        assert_eq!(config.min_span_end, 30);
        assert_eq!(config.policy, CocPolicy::FirstBreak);
    }

    #[test]
    fn test_from_lookup_without_vars_gives_defaults() {
        let config = EstimatorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, EstimatorConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = EstimatorConfig::from_lookup(lookup_from(&[
            ("COC_MIN_SPAN_END", "40"),
            ("COC_WINDOW_RADIUS", "2.5"),
            ("COC_POLICY", "global_max"),
        ]))
        .unwrap();

        assert_eq!(config.min_span_end, 40);
        assert_eq!(config.window_radius, 2.5);
        assert_eq!(config.policy, CocPolicy::GlobalMax);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = EstimatorConfig::from_lookup(lookup_from(&[("COC_MIN_SAMPLES", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("COC_MIN_SAMPLES"));

        assert!(EstimatorConfig::from_lookup(lookup_from(&[("COC_POLICY", "widest")])).is_err());
    }

    #[test]
    fn test_floor_and_span_cannot_shrink() {
        let config = EstimatorConfig {
            min_distance: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EstimatorConfig {
            min_span_end: 20,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_span_is_bounded() {
        let err = EstimatorConfig::from_lookup(lookup_from(&[("COC_MIN_SPAN_END", "4000000000")]))
            .unwrap_err();
        assert!(err.to_string().contains("min_span_end"));

        let err = EstimatorConfig::from_lookup(lookup_from(&[("COC_SPAN_PADDING", "4294967295")]))
            .unwrap_err();
        assert!(err.to_string().contains("span_padding"));

        let config = EstimatorConfig {
            min_span_end: MAX_SPAN_END,
            span_padding: MAX_SPAN_PADDING,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_span_end_saturates() {
        let config = EstimatorConfig {
            span_padding: u32::MAX,
            ..Default::default()
        };
        assert_eq!(config.span_end(10.0), u32::MAX);
    }

    #[test]
    fn test_threshold_must_be_probability() {
        let config = EstimatorConfig {
            confidence_threshold: 1.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_span_end() {
        let config = EstimatorConfig::default();
        assert_eq!(config.span_end(10.0), 30);
        assert_eq!(config.span_end(25.0), 30);
        assert_eq!(config.span_end(25.2), 31);
        assert_eq!(config.span_end(40.0), 45);
    }

    #[test]
    fn test_prior_switches_at_cutoff() {
        let config = EstimatorConfig::default();
        assert_eq!(config.prior_at(9), 1.0);
        assert_eq!(config.prior_at(10), 0.5);
    }
}
