//! Analysis runs: sanitize, detect, classify, and package one batch.

pub mod session;
pub mod stats;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detect::forest::{MAX_SUB_SAMPLE, MAX_TREES};
use crate::detect::{Contamination, DetectError, DetectorConfig, RuleSet, Suggestion};

pub use self::session::{run, AnalysisSession};
pub use self::stats::SeriesStats;

/// Simulated byte counts the dashboard starts with.
pub const DEMO_SERIES: [f64; 23] = [
    25000.0, 30000.0, 28000.0, 35000.0, 40000.0, 38000.0, 42000.0, 39000.0, 150000.0, 160000.0,
    45000.0, 40000.0, 38000.0, 950000.0, 41000.0, 37000.0, 39000.0, 43000.0, 500.0, 35000.0,
    38000.0, 40000.0, 41000.0,
];

/// Where a series came from, which decides its default options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisContext {
    /// One-shot batch of simulated or edited byte counts.
    #[default]
    Batch,
    /// Live bytes/second samples from the traffic sampler.
    Streaming,
}

impl std::fmt::Display for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisContext::Batch => write!(f, "batch"),
            AnalysisContext::Streaming => write!(f, "streaming"),
        }
    }
}

impl std::str::FromStr for AnalysisContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "batch" => Ok(AnalysisContext::Batch),
            "streaming" | "live" => Ok(AnalysisContext::Streaming),
            other => Err(format!("unknown analysis context '{}'", other)),
        }
    }
}

/// Options accepted by a single analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub minimum_sample_count: usize,
    pub random_seed: u64,
    pub contamination: Contamination,
    pub rule_set: RuleSet,
    /// Isolation trees per fit.
    pub trees: usize,
    /// Cap on the per-tree sub-sample.
    pub max_samples: usize,
}

impl AnalysisOptions {
    pub fn batch() -> Self {
        let detector = DetectorConfig::default();
        Self {
            minimum_sample_count: 2,
            random_seed: detector.seed,
            contamination: detector.contamination,
            rule_set: RuleSet::RawCounts,
            trees: detector.trees,
            max_samples: detector.max_samples,
        }
    }

    pub fn streaming() -> Self {
        Self {
            minimum_sample_count: 5,
            rule_set: RuleSet::RateBps,
            ..Self::batch()
        }
    }

    pub fn for_context(context: AnalysisContext) -> Self {
        match context {
            AnalysisContext::Batch => Self::batch(),
            AnalysisContext::Streaming => Self::streaming(),
        }
    }

    /// Check the model size against the forest limits.
    pub fn validate(&self) -> Result<(), DetectError> {
        for (field, max, value) in [
            ("trees", MAX_TREES, self.trees),
            ("max_samples", MAX_SUB_SAMPLE, self.max_samples),
        ] {
            if !(1..=max).contains(&value) {
                return Err(DetectError::OptionOutOfRange { field, max, value });
            }
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            min_samples: self.minimum_sample_count,
            seed: self.random_seed,
            contamination: self.contamination,
            trees: self.trees,
            max_samples: self.max_samples,
        }
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::batch()
    }
}

/// Partial [`AnalysisOptions`]; unset fields keep the context default.
///
/// Used for config file sections, CLI flags, and API request bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_sample_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contamination: Option<Contamination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<RuleSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trees: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_samples: Option<usize>,
}

impl AnalysisOverrides {
    pub fn apply(&self, base: AnalysisOptions) -> AnalysisOptions {
        AnalysisOptions {
            minimum_sample_count: self.minimum_sample_count.unwrap_or(base.minimum_sample_count),
            random_seed: self.random_seed.unwrap_or(base.random_seed),
            contamination: self.contamination.unwrap_or(base.contamination),
            rule_set: self.rule_set.unwrap_or(base.rule_set),
            trees: self.trees.unwrap_or(base.trees),
            max_samples: self.max_samples.unwrap_or(base.max_samples),
        }
    }

    /// Layer `other` on top of `self`; fields set in `other` win.
    pub fn merge(&self, other: &AnalysisOverrides) -> AnalysisOverrides {
        AnalysisOverrides {
            minimum_sample_count: other.minimum_sample_count.or(self.minimum_sample_count),
            random_seed: other.random_seed.or(self.random_seed),
            contamination: other.contamination.or(self.contamination),
            rule_set: other.rule_set.or(self.rule_set),
            trees: other.trees.or(self.trees),
            max_samples: other.max_samples.or(self.max_samples),
        }
    }
}

impl From<AnalysisOptions> for AnalysisOverrides {
    fn from(o: AnalysisOptions) -> Self {
        Self {
            minimum_sample_count: Some(o.minimum_sample_count),
            random_seed: Some(o.random_seed),
            contamination: Some(o.contamination),
            rule_set: Some(o.rule_set),
            trees: Some(o.trees),
            max_samples: Some(o.max_samples),
        }
    }
}

/// Outcome of a run, independent of whether anything was flagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisStatus {
    Completed,
    InsufficientData { needed: usize, have: usize },
}

/// Non-fatal problems surfaced alongside a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// The outlier model could not be fit; no anomalies were reported.
    ModelFit { reason: String },
    /// Non-finite samples were skipped.
    DroppedSamples { count: usize },
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisWarning::ModelFit { reason } => {
                write!(f, "anomaly model could not be fit ({}); no anomalies reported", reason)
            }
            AnalysisWarning::DroppedSamples { count } => {
                write!(f, "{} unreadable sample(s) skipped", count)
            }
        }
    }
}

/// One flagged sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    /// Position in the original series.
    pub index: usize,
    pub value: f64,
    /// Isolation score in (0, 1].
    pub score: f64,
    pub suggestion: Suggestion,
}

/// Everything the presentation layer needs from one run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub rule_set: RuleSet,
    /// The series as submitted, gaps included.
    pub series: Vec<f64>,
    pub stats: SeriesStats,
    pub status: AnalysisStatus,
    /// Sorted by `index`.
    pub anomalies: Vec<AnomalyReport>,
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisResult {
    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.anomalies.iter().map(|a| a.index).collect()
    }

    pub fn model_failed(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, AnalysisWarning::ModelFit { .. }))
    }
}
