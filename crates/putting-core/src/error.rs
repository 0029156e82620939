use thiserror::Error;

#[derive(Error, Debug)]
pub enum PuttingError {
    #[error("Invalid distance {distance}: must be positive, finite and at most {max}")]
    InvalidDistance { distance: f64, max: f64 },

    #[error("Invalid distance {distance} for attempt #{index}: must be positive, finite and at most {max}")]
    InvalidAttempt { index: usize, distance: f64, max: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
