//! Anomaly detection: series cleaning, isolation-forest scoring, and
//! threshold-based diagnostic rules.

pub mod forest;
pub mod outlier;
pub mod rules;
pub mod sanitize;

use thiserror::Error;

pub use self::outlier::{detect, Contamination, DetectorConfig};
pub use self::rules::{classify, Category, RuleSet, Suggestion};
pub use self::sanitize::{parse_series, sanitize, SanitizedSeries};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error("value {token:?} at position {position} is not a number")]
    InvalidInput { position: usize, token: String },

    #[error("insufficient data: need {needed} samples, have {have}")]
    InsufficientData { needed: usize, have: usize },

    #[error("outlier model could not be fit: {reason}")]
    ModelFit { reason: String },

    #[error("contamination must be \"auto\" or a fraction in (0, 1), got {0}")]
    InvalidContamination(f64),

    #[error("{field} must be between 1 and {max}, got {value}")]
    OptionOutOfRange {
        field: &'static str,
        max: usize,
        value: usize,
    },
}

impl DetectError {
    pub(crate) fn model_fit(reason: impl Into<String>) -> Self {
        DetectError::ModelFit {
            reason: reason.into(),
        }
    }
}
