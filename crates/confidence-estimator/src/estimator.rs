//! Circle of Confidence Estimation
//!
//! Turns a list of putt attempts into a smoothed make-probability curve and
//! reads the Circle of Confidence off it.
//!
//! Each integer distance in the sampled domain pools the attempts within
//! `window_radius` of it. Windows with too few attempts carry the previous
//! point forward; the rest are blended into the running curve with a 1:2
//! weighting of new:old so a single bad round cannot swing it.

use putting_core::{
    validate_distance, ConfidenceCurvePoint, ConfidenceModel, ConfidenceReport, PuttAttempt,
    PuttingError,
};

use crate::config::{CocPolicy, EstimatorConfig};

/// Windowed, smoothed make-probability estimator
#[derive(Debug, Clone, Default)]
pub struct ConfidenceEstimator {
    config: EstimatorConfig,
}

impl ConfidenceEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self, PuttingError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Compute the full report for a set of attempts.
    ///
    /// The whole call is rejected if any attempt has a non-positive,
    /// non-finite or out-of-range distance (see [`validate_distance`]).
    pub fn compute_report(&self, attempts: &[PuttAttempt]) -> Result<ConfidenceReport, PuttingError> {
        self.validate_attempts(attempts)?;

        if attempts.is_empty() {
            return Ok(ConfidenceReport::empty());
        }

        let makes = attempts.iter().filter(|a| a.is_make()).count();
        let make_rate = makes as f64 / attempts.len() as f64;

        let index = DistanceIndex::new(attempts);
        let curve = self.build_curve(&index);
        let circle_of_confidence = circle_of_confidence(
            &curve,
            self.config.confidence_threshold,
            self.config.policy,
        );

        tracing::debug!(
            attempts = attempts.len(),
            makes,
            points = curve.len(),
            circle_of_confidence,
            "computed confidence report"
        );

        Ok(ConfidenceReport {
            circle_of_confidence,
            curve,
            total_attempts: attempts.len(),
            make_rate,
        })
    }

    fn validate_attempts(&self, attempts: &[PuttAttempt]) -> Result<(), PuttingError> {
        for (index, attempt) in attempts.iter().enumerate() {
            if let Err(PuttingError::InvalidDistance { distance, max }) =
                validate_distance(attempt.distance)
            {
                tracing::warn!(index, distance, "rejecting attempts with malformed distance");
                return Err(PuttingError::InvalidAttempt { index, distance, max });
            }
        }
        Ok(())
    }

    fn build_curve(&self, index: &DistanceIndex) -> Vec<ConfidenceCurvePoint> {
        let start = self.config.min_distance;
        let end = self.config.span_end(index.max_distance());

        (start..=end).fold(
            Vec::with_capacity((end - start + 1) as usize),
            |mut curve, distance| {
                let raw = index.raw_probability(
                    distance as f64,
                    self.config.window_radius,
                    self.config.min_samples,
                );
                let previous = curve.last().map(|p: &ConfidenceCurvePoint| p.probability);
                curve.push(ConfidenceCurvePoint {
                    distance,
                    probability: self.smooth_step(previous, raw, distance),
                });
                curve
            },
        )
    }

    /// One step of the smoothing recurrence.
    ///
    /// `previous` is the smoothed value of the point before (`None` at the
    /// first point), `raw` the local make rate (`None` when the window is too
    /// sparse).
    pub fn smooth_step(&self, previous: Option<f64>, raw: Option<f64>, distance: u32) -> f64 {
        match (previous, raw) {
            (None, None) => self.config.prior_at(distance),
            (Some(prev), None) => prev,
            (None, Some(raw)) => raw,
            (Some(prev), Some(raw)) => {
                let weight = self.config.smoothing_weight;
                (raw + prev * weight) / (1.0 + weight)
            }
        }
    }
}

impl ConfidenceModel for ConfidenceEstimator {
    fn report(&self, attempts: &[PuttAttempt]) -> Result<ConfidenceReport, PuttingError> {
        self.compute_report(attempts)
    }
}

/// Report with the default policy constants.
pub fn compute_report(attempts: &[PuttAttempt]) -> Result<ConfidenceReport, PuttingError> {
    ConfidenceEstimator::default().compute_report(attempts)
}

/// Read the Circle of Confidence off an ascending curve.
///
/// A point qualifies when `probability >= threshold`. Returns 0 when no
/// point qualifies.
pub fn circle_of_confidence(
    curve: &[ConfidenceCurvePoint],
    threshold: f64,
    policy: CocPolicy,
) -> u32 {
    let qualifies = |p: &&ConfidenceCurvePoint| p.probability >= threshold;

    match policy {
        CocPolicy::FirstBreak => curve
            .iter()
            .take_while(qualifies)
            .last()
            .map_or(0, |p| p.distance),
        CocPolicy::GlobalMax => curve
            .iter()
            .filter(qualifies)
            .map(|p| p.distance)
            .max()
            .unwrap_or(0),
    }
}

/// Attempts sorted by distance with a running count of makes, so each
/// window is two binary searches.
struct DistanceIndex {
    distances: Vec<f64>,
    /// `make_prefix[i]` = makes among the first `i` sorted attempts
    make_prefix: Vec<usize>,
}

impl DistanceIndex {
    fn new(attempts: &[PuttAttempt]) -> Self {
        let mut sorted: Vec<(f64, bool)> = attempts
            .iter()
            .map(|a| (a.distance, a.is_make()))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let make_prefix = std::iter::once(0)
            .chain(sorted.iter().scan(0, |acc, &(_, made)| {
                *acc += made as usize;
                Some(*acc)
            }))
            .collect();

        Self {
            distances: sorted.into_iter().map(|(d, _)| d).collect(),
            make_prefix,
        }
    }

    fn max_distance(&self) -> f64 {
        self.distances.last().copied().unwrap_or(0.0)
    }

    /// Attempt count and makes with `|distance - center| <= radius`.
    fn window(&self, center: f64, radius: f64) -> (usize, usize) {
        let lo = self.distances.partition_point(|&d| d - center < -radius);
        let hi = self.distances.partition_point(|&d| d - center <= radius);
        (hi - lo, self.make_prefix[hi] - self.make_prefix[lo])
    }

    fn raw_probability(&self, center: f64, radius: f64, min_samples: usize) -> Option<f64> {
        let (count, makes) = self.window(center, radius);
        if count < min_samples {
            None
        } else {
            Some(makes as f64 / count as f64)
        }
    }
}
