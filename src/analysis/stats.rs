use serde::{Deserialize, Serialize};

/// Summary statistics of a cleaned sample series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    /// Non-finite samples removed before analysis.
    pub dropped: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Whether a log-scale axis makes sense for this series.
    pub any_positive: bool,
}

impl SeriesStats {
    pub fn from_values(values: &[f64], dropped: usize) -> Self {
        if values.is_empty() {
            return Self {
                dropped,
                ..Self::default()
            };
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Self {
            count,
            dropped,
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
            any_positive: values.iter().any(|&v| v > 0.0),
        }
    }
}
