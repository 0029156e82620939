use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PuttingError;

/// Farthest distance accepted as a putt
pub const MAX_PUTT_DISTANCE: f64 = 500.0;

/// Check a putt distance is positive, finite and within [`MAX_PUTT_DISTANCE`].
pub fn validate_distance(distance: f64) -> Result<f64, PuttingError> {
    if distance.is_finite() && distance > 0.0 && distance <= MAX_PUTT_DISTANCE {
        Ok(distance)
    } else {
        Err(PuttingError::InvalidDistance {
            distance,
            max: MAX_PUTT_DISTANCE,
        })
    }
}

/// Result of a single putt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuttOutcome {
    Make,
    Miss,
}

impl PuttOutcome {
    pub fn is_make(&self) -> bool {
        matches!(self, PuttOutcome::Make)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PuttOutcome::Make => "make",
            PuttOutcome::Miss => "miss",
        }
    }
}

impl From<bool> for PuttOutcome {
    fn from(made: bool) -> Self {
        if made {
            PuttOutcome::Make
        } else {
            PuttOutcome::Miss
        }
    }
}

/// One recorded putt at a given distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuttAttempt {
    /// Distance to the basket (feet or meters, caller-consistent)
    pub distance: f64,
    pub outcome: PuttOutcome,
    /// Provenance only; scoring never looks at it
    pub recorded_at: DateTime<Utc>,
}

impl PuttAttempt {
    /// Build an attempt, rejecting distances [`validate_distance`] refuses.
    pub fn new(
        distance: f64,
        outcome: PuttOutcome,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, PuttingError> {
        Ok(Self {
            distance: validate_distance(distance)?,
            outcome,
            recorded_at,
        })
    }

    /// Shorthand stamped with the current time.
    pub fn now(distance: f64, outcome: PuttOutcome) -> Result<Self, PuttingError> {
        Self::new(distance, outcome, Utc::now())
    }

    pub fn is_make(&self) -> bool {
        self.outcome.is_make()
    }
}

/// Smoothed make-probability at one sampled distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceCurvePoint {
    pub distance: u32,
    pub probability: f64, // 0.0 to 1.0
}

/// Everything the dashboards need about a set of attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReport {
    /// Edge of the high-confidence zone, 0 when nothing qualifies
    pub circle_of_confidence: u32,
    /// Ascending by distance
    pub curve: Vec<ConfidenceCurvePoint>,
    pub total_attempts: usize,
    pub make_rate: f64,
}

impl ConfidenceReport {
    /// Report for a session with no putts
    pub fn empty() -> Self {
        Self {
            circle_of_confidence: 0,
            curve: Vec::new(),
            total_attempts: 0,
            make_rate: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_attempts == 0
    }

    /// Smoothed probability at an exact sampled distance, if it was sampled.
    pub fn probability_at(&self, distance: u32) -> Option<f64> {
        self.curve
            .binary_search_by_key(&distance, |p| p.distance)
            .ok()
            .map(|idx| self.curve[idx].probability)
    }
}

impl Default for ConfidenceReport {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_rejects_bad_distance() {
        assert!(PuttAttempt::now(0.0, PuttOutcome::Make).is_err());
        assert!(PuttAttempt::now(-4.0, PuttOutcome::Make).is_err());
        assert!(PuttAttempt::now(f64::NAN, PuttOutcome::Miss).is_err());
        assert!(PuttAttempt::now(f64::INFINITY, PuttOutcome::Miss).is_err());
        assert!(PuttAttempt::now(600.0, PuttOutcome::Miss).is_err());
        assert!(PuttAttempt::now(MAX_PUTT_DISTANCE, PuttOutcome::Miss).is_ok());
        assert!(PuttAttempt::now(12.5, PuttOutcome::Miss).is_ok());
    }

    #[test]
    fn test_distance_error_names_range_without_index() {
        let err = PuttAttempt::now(600.0, PuttOutcome::Make).unwrap_err();

        assert!(matches!(err, PuttingError::InvalidDistance { distance, .. } if distance == 600.0));
        assert!(err.to_string().contains("at most 500"));
        assert!(!err.to_string().contains('#'));
    }

    #[test]
    fn test_outcome_wire_format() {
        assert_eq!(serde_json::to_string(&PuttOutcome::Make).unwrap(), "\"make\"");
        let parsed: PuttOutcome = serde_json::from_str("\"miss\"").unwrap();
        assert_eq!(parsed, PuttOutcome::Miss);
        assert_eq!(PuttOutcome::from(true), PuttOutcome::Make);
    }

    #[test]
    fn test_report_uses_external_field_names() {
        let report = ConfidenceReport {
            circle_of_confidence: 16,
            curve: vec![ConfidenceCurvePoint {
                distance: 5,
                probability: 1.0,
            }],
            total_attempts: 15,
            make_rate: 0.75,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["circleOfConfidence"], 16);
        assert_eq!(json["totalAttempts"], 15);
        assert_eq!(json["makeRate"], 0.75);
        assert_eq!(json["curve"][0]["distance"], 5);
    }

    #[test]
    fn test_probability_lookup() {
        let report = ConfidenceReport {
            circle_of_confidence: 6,
            curve: vec![
                ConfidenceCurvePoint { distance: 5, probability: 1.0 },
                ConfidenceCurvePoint { distance: 6, probability: 0.95 },
            ],
            total_attempts: 3,
            make_rate: 1.0,
        };

        assert_eq!(report.probability_at(6), Some(0.95));
        assert_eq!(report.probability_at(7), None);
        assert!(ConfidenceReport::empty().is_empty());
    }
}
