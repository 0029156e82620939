//! Practice Session Accumulator
//!
//! Owned by whoever runs the practice screen; nothing here is global.

use chrono::{DateTime, Utc};
use putting_core::{
    validate_distance, ConfidenceModel, ConfidenceReport, PuttAttempt, PuttOutcome, PuttingError,
};
use serde::{Deserialize, Serialize};

use crate::history::{Round, RoundPutt};

/// Putts recorded during the current practice session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeSession {
    started_at: Option<DateTime<Utc>>,
    attempts: Vec<PuttAttempt>,
}

impl PracticeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a putt stamped with the current time.
    pub fn record(&mut self, distance: f64, outcome: PuttOutcome) -> Result<&PuttAttempt, PuttingError> {
        let attempt = PuttAttempt::now(distance, outcome)?;
        self.push(attempt)
    }

    /// Append an already built attempt.
    pub fn push(&mut self, attempt: PuttAttempt) -> Result<&PuttAttempt, PuttingError> {
        validate_distance(attempt.distance)?;

        self.started_at.get_or_insert(attempt.recorded_at);
        self.attempts.push(attempt);
        Ok(&self.attempts[self.attempts.len() - 1])
    }

    /// Drop the most recent putt.
    pub fn undo(&mut self) -> Option<PuttAttempt> {
        let removed = self.attempts.pop();
        if self.attempts.is_empty() {
            self.started_at = None;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.attempts.clear();
        self.started_at = None;
    }

    pub fn attempts(&self) -> &[PuttAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn makes(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_make()).count()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn report<M: ConfidenceModel + ?Sized>(&self, model: &M) -> Result<ConfidenceReport, PuttingError> {
        model.report(&self.attempts)
    }

    /// Group consecutive putts from the same (rounded) distance into rounds.
    ///
    /// Each putt keeps its exact distance; only the round label is rounded.
    pub fn into_rounds(self) -> Vec<Round> {
        let mut rounds: Vec<Round> = Vec::new();

        for attempt in self.attempts {
            let distance = (attempt.distance.round() as u32).max(1);
            let putt = RoundPutt {
                distance: attempt.distance,
                outcome: attempt.outcome,
                recorded_at: attempt.recorded_at,
            };

            match rounds.last_mut() {
                Some(round) if round.distance == distance => round.push(putt),
                _ => {
                    let mut round = Round::new(distance);
                    round.push(putt);
                    rounds.push(round);
                }
            }
        }

        rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::ConfidenceEstimator;

    #[test]
    fn test_record_and_undo() {
        let mut session = PracticeSession::new();
        assert!(session.started_at().is_none());

        session.record(10.0, PuttOutcome::Make).unwrap();
        session.record(10.0, PuttOutcome::Miss).unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session.makes(), 1);
        assert!(session.started_at().is_some());

        let undone = session.undo().unwrap();
        assert_eq!(undone.outcome, PuttOutcome::Miss);
        assert_eq!(session.len(), 1);

        session.undo();
        assert!(session.is_empty());
        assert!(session.started_at().is_none());
        assert!(session.undo().is_none());
    }

    #[test]
    fn test_record_rejects_bad_distance() {
        let mut session = PracticeSession::new();
        assert!(session.record(-1.0, PuttOutcome::Make).is_err());
        assert!(session.record(600.0, PuttOutcome::Miss).is_err());
        assert!(session.is_empty());
    }

    #[test]
    fn test_push_rejects_out_of_range_attempt() {
        let mut session = PracticeSession::new();
        let attempt = PuttAttempt {
            distance: 600.0,
            outcome: PuttOutcome::Miss,
            recorded_at: chrono::Utc::now(),
        };

        assert!(matches!(
            session.push(attempt),
            Err(PuttingError::InvalidDistance { .. })
        ));
        assert!(session.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut session = PracticeSession::new();
        session.record(15.0, PuttOutcome::Make).unwrap();
        session.clear();
        assert!(session.is_empty());
        assert!(session.started_at().is_none());
    }

    #[test]
    fn test_report_over_session() {
        let mut session = PracticeSession::new();
        for _ in 0..5 {
            session.record(10.0, PuttOutcome::Make).unwrap();
        }

        let report = session.report(&ConfidenceEstimator::default()).unwrap();
        assert_eq!(report.total_attempts, 5);
        assert_eq!(report.make_rate, 1.0);
        assert!(report.circle_of_confidence >= 10);
    }

    #[test]
    fn test_independent_sessions() {
        let mut first = PracticeSession::new();
        let second = PracticeSession::new();
        first.record(20.0, PuttOutcome::Miss).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn test_into_rounds_groups_consecutive_distances() {
        let mut session = PracticeSession::new();
        session.record(10.0, PuttOutcome::Make).unwrap();
        session.record(10.2, PuttOutcome::Miss).unwrap();
        session.record(15.0, PuttOutcome::Make).unwrap();
        session.record(10.0, PuttOutcome::Make).unwrap();

        let rounds = session.into_rounds();
        assert_eq!(rounds.len(), 3);
        assert_eq!(rounds[0].distance, 10);
        assert_eq!(rounds[0].attempts, 2);
        assert_eq!(rounds[0].makes, 1);
        assert_eq!(rounds[1].distance, 15);
        assert_eq!(rounds[2].distance, 10);
        assert_eq!(rounds[2].putts.len(), 1);
        assert_eq!(rounds[0].putts[1].distance, 10.2);
    }
}
