//! Circle of Confidence Module
//!
//! Estimates a putter's make-probability curve over distance and the
//! Circle of Confidence: the farthest distance still made at least 90% of
//! the time. Also keeps the practice session buffer and session history
//! the estimate is fed from.

pub mod config;
pub mod estimator;
pub mod history;
pub mod session;

pub use config::{CocPolicy, EstimatorConfig};
pub use estimator::{circle_of_confidence, compute_report, ConfidenceEstimator};
pub use history::{
    DistanceStats, NewSession, PracticeStats, Round, RoundPutt, Session, SessionHistoryStore,
    SessionKind,
};
pub use session::PracticeSession;
