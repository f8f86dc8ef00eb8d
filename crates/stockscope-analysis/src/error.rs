use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("{name} must be at least 1, got {value}")]
    InvalidPeriod { name: &'static str, value: usize },

    #[error("confidence must be strictly between 0 and 1, got {value}")]
    InvalidConfidence { value: f64 },

    #[error("need at least {needed} bars, got {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("indicator has {found} values but the series has {expected} bars")]
    LengthMismatch { expected: usize, found: usize },
}

pub(crate) fn check_period(name: &'static str, value: usize) -> Result<(), AnalysisError> {
    if value == 0 {
        return Err(AnalysisError::InvalidPeriod { name, value });
    }
    Ok(())
}
