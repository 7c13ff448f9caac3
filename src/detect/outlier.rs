//! Outlier selection on top of the isolation forest.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::forest::{ForestParams, IsolationForest};
use super::DetectError;

/// Expected share of outliers in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ContaminationRepr", into = "ContaminationRepr")]
pub enum Contamination {
    /// Flag points whose isolation score exceeds 0.5.
    #[default]
    Auto,
    /// Flag the top fraction of training scores.
    Fraction(f64),
}

impl Contamination {
    pub fn fraction(f: f64) -> Result<Self, DetectError> {
        if f > 0.0 && f < 1.0 {
            Ok(Contamination::Fraction(f))
        } else {
            Err(DetectError::InvalidContamination(f))
        }
    }
}

impl std::fmt::Display for Contamination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Contamination::Auto => write!(f, "auto"),
            Contamination::Fraction(x) => write!(f, "{}", x),
        }
    }
}

impl std::str::FromStr for Contamination {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Contamination::Auto);
        }
        let f = s.parse::<f64>().map_err(|_| DetectError::InvalidInput {
            position: 0,
            token: s.to_string(),
        })?;
        Contamination::fraction(f)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ContaminationRepr {
    Fraction(f64),
    Keyword(String),
}

impl TryFrom<ContaminationRepr> for Contamination {
    type Error = DetectError;

    fn try_from(repr: ContaminationRepr) -> Result<Self, Self::Error> {
        match repr {
            ContaminationRepr::Fraction(f) => Contamination::fraction(f),
            ContaminationRepr::Keyword(s) => s.parse(),
        }
    }
}

impl From<Contamination> for ContaminationRepr {
    fn from(c: Contamination) -> Self {
        match c {
            Contamination::Auto => ContaminationRepr::Keyword("auto".to_string()),
            Contamination::Fraction(f) => ContaminationRepr::Fraction(f),
        }
    }
}

/// Per-call detector settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Below this many clean samples nothing is flagged.
    pub min_samples: usize,
    pub seed: u64,
    pub contamination: Contamination,
    pub trees: usize,
    pub max_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            min_samples: 2,
            seed: forest.seed,
            contamination: Contamination::Auto,
            trees: forest.trees,
            max_samples: forest.max_samples,
        }
    }
}

impl DetectorConfig {
    fn forest_params(&self) -> ForestParams {
        ForestParams {
            trees: self.trees,
            max_samples: self.max_samples,
            seed: self.seed,
        }
    }
}

/// Outlier positions with their isolation scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub indices: BTreeSet<usize>,
    /// Score for every input position, empty when the batch was too short.
    pub scores: Vec<f64>,
}

/// Positions in `clean` judged anomalous.
pub fn detect(clean: &[f64], config: &DetectorConfig) -> Result<BTreeSet<usize>, DetectError> {
    detect_scored(clean, config).map(|d| d.indices)
}

/// Like [`detect`], also returning the per-sample scores.
pub fn detect_scored(clean: &[f64], config: &DetectorConfig) -> Result<Detection, DetectError> {
    if clean.len() < config.min_samples.max(1) {
        debug!(
            have = clean.len(),
            needed = config.min_samples,
            "too few samples to fit outlier model"
        );
        return Ok(Detection::default());
    }

    let forest = IsolationForest::fit(clean, &config.forest_params())?;
    let scores = forest.scores(clean);

    let threshold = match config.contamination {
        Contamination::Auto => 0.5,
        Contamination::Fraction(f) => percentile(&scores, 1.0 - f),
    };

    let indices = scores
        .iter()
        .enumerate()
        .filter(|&(_, &s)| s > threshold)
        .map(|(i, _)| i)
        .collect();

    Ok(Detection { indices, scores })
}

/// Linear-interpolated quantile `q` in [0, 1] of `values`.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_spike() -> Vec<f64> {
        let mut data: Vec<f64> = (0..30).map(|i| 1000.0 + ((i * 37) % 29) as f64 * 3.0).collect();
        data[17] = 250_000.0;
        data
    }

    #[test]
    fn test_short_series_is_empty() {
        let config = DetectorConfig {
            min_samples: 5,
            ..Default::default()
        };
        assert!(detect(&[1.0, 2.0, 900.0, 4.0], &config).unwrap().is_empty());
        assert!(detect(&[], &DetectorConfig::default()).unwrap().is_empty());
        assert!(detect(&[42.0], &DetectorConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_constant_series_is_model_fit_error() {
        let err = detect(&[5.0; 12], &DetectorConfig::default()).unwrap_err();
        assert!(matches!(err, DetectError::ModelFit { .. }));
    }

    #[test]
    fn test_auto_flags_spike() {
        let anomalies = detect(&cluster_with_spike(), &DetectorConfig::default()).unwrap();
        assert!(anomalies.contains(&17));
        assert!(anomalies.len() < 15, "{:?}", anomalies);
    }

    #[test]
    fn test_fraction_bounds_flag_count() {
        let config = DetectorConfig {
            contamination: Contamination::fraction(0.1).unwrap(),
            ..Default::default()
        };
        let anomalies = detect(&cluster_with_spike(), &config).unwrap();
        assert!(anomalies.contains(&17));
        // strictly above the 90th percentile: at most 10% of 30
        assert!(anomalies.len() <= 3, "{:?}", anomalies);
    }

    #[test]
    fn test_scores_cover_every_sample() {
        let data = cluster_with_spike();
        let detection = detect_scored(&data, &DetectorConfig::default()).unwrap();
        assert_eq!(detection.scores.len(), data.len());
    }

    #[test]
    fn test_contamination_parsing() {
        assert_eq!("auto".parse::<Contamination>().unwrap(), Contamination::Auto);
        assert_eq!(
            "0.05".parse::<Contamination>().unwrap(),
            Contamination::Fraction(0.05)
        );
        assert!(matches!(
            "1.5".parse::<Contamination>(),
            Err(DetectError::InvalidContamination(_))
        ));
        assert!("often".parse::<Contamination>().is_err());
    }

    #[test]
    fn test_contamination_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            contamination: Contamination,
        }
        let auto: Wrapper = toml::from_str("contamination = \"auto\"").unwrap();
        assert_eq!(auto.contamination, Contamination::Auto);
        let frac: Wrapper = toml::from_str("contamination = 0.2").unwrap();
        assert_eq!(frac.contamination, Contamination::Fraction(0.2));
        assert!(toml::from_str::<Wrapper>("contamination = 2.0").is_err());
        assert_eq!(
            serde_json::to_value(Contamination::Auto).unwrap(),
            serde_json::json!("auto")
        );
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.5), 3.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 5.0);
        assert!((percentile(&values, 0.9) - 4.6).abs() < 1e-12);
    }
}
