use crate::{ConfidenceReport, PuttAttempt, PuttingError};

/// Anything that can turn a list of putt attempts into a confidence report.
///
/// The windowed estimator is the only implementation today; a fitted
/// logistic model would slot in here.
pub trait ConfidenceModel: Send + Sync {
    fn report(&self, attempts: &[PuttAttempt]) -> Result<ConfidenceReport, PuttingError>;
}
