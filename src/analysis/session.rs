use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    AnalysisContext, AnalysisOptions, AnalysisResult, AnalysisStatus, AnalysisWarning,
    AnomalyReport, SeriesStats,
};
use crate::detect::outlier::detect_scored;
use crate::detect::{classify, parse_series, sanitize, DetectError};

/// Analyze one batch of raw samples.
///
/// Never fails: too-short input yields [`AnalysisStatus::InsufficientData`]
/// and a model that cannot be fit yields an empty anomaly list plus an
/// [`AnalysisWarning::ModelFit`].
pub fn run(raw: &[f64], options: &AnalysisOptions) -> AnalysisResult {
    let clean = sanitize(raw);
    let stats = SeriesStats::from_values(&clean.values, clean.dropped());

    let mut warnings = Vec::new();
    if clean.dropped() > 0 {
        debug!(dropped = clean.dropped(), "skipping non-finite samples");
        warnings.push(AnalysisWarning::DroppedSamples {
            count: clean.dropped(),
        });
    }

    let mut result = AnalysisResult {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        rule_set: options.rule_set,
        series: raw.to_vec(),
        stats,
        status: AnalysisStatus::Completed,
        anomalies: Vec::new(),
        warnings,
    };

    if clean.len() < options.minimum_sample_count {
        let err = DetectError::InsufficientData {
            needed: options.minimum_sample_count,
            have: clean.len(),
        };
        info!(%err, "analysis skipped");
        result.status = AnalysisStatus::InsufficientData {
            needed: options.minimum_sample_count,
            have: clean.len(),
        };
        return result;
    }

    let detection = match detect_scored(&clean.values, &options.detector_config()) {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, samples = clean.len(), "outlier model failed, reporting no anomalies");
            result.warnings.push(AnalysisWarning::ModelFit {
                reason: e.to_string(),
            });
            return result;
        }
    };

    result.anomalies = detection
        .indices
        .iter()
        .filter_map(|&i| {
            let index = clean.original_index(i)?;
            let value = raw[index];
            Some(AnomalyReport {
                index,
                value,
                score: detection.scores[i],
                suggestion: classify(value, options.rule_set),
            })
        })
        .collect();

    info!(
        samples = raw.len(),
        anomalies = result.anomalies.len(),
        rule_set = %options.rule_set,
        "analysis complete"
    );
    result
}

/// Per-context defaults for analysis runs.
///
/// Holds no results; every call returns a fresh [`AnalysisResult`] and the
/// caller decides whether it replaces an earlier one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSession {
    batch: AnalysisOptions,
    streaming: AnalysisOptions,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self {
            batch: AnalysisOptions::batch(),
            streaming: AnalysisOptions::streaming(),
        }
    }
}

impl AnalysisSession {
    pub fn new(batch: AnalysisOptions, streaming: AnalysisOptions) -> Self {
        Self { batch, streaming }
    }

    pub fn options(&self, context: AnalysisContext) -> &AnalysisOptions {
        match context {
            AnalysisContext::Batch => &self.batch,
            AnalysisContext::Streaming => &self.streaming,
        }
    }

    pub fn run(&self, raw: &[f64], context: AnalysisContext) -> AnalysisResult {
        run(raw, self.options(context))
    }

    /// Parse edited text and analyze it. A parse failure aborts the run.
    pub fn run_text(
        &self,
        text: &str,
        context: AnalysisContext,
    ) -> Result<AnalysisResult, DetectError> {
        let raw = parse_series(text)?;
        Ok(self.run(&raw, context))
    }
}
