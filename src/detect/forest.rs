//! Seeded isolation forest over one-dimensional samples.
//!
//! Anomalies sit far from the bulk of the data, so random axis splits
//! separate them from everything else after only a few cuts. Averaging the
//! isolation depth over many random trees gives a score in (0, 1]; values
//! near 1 are isolated quickly, values at or below 0.5 behave like the rest
//! of the sample.
//!
//! Reference: Liu, Ting & Zhou, "Isolation Forest", ICDM 2008.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::DetectError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Largest accepted tree count.
pub const MAX_TREES: usize = 1_000;
/// Largest accepted per-tree sub-sample.
pub const MAX_SUB_SAMPLE: usize = 4_096;

/// Forest hyper-parameters.
#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub trees: usize,
    /// Upper bound on the per-tree sub-sample size.
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

#[derive(Debug)]
enum Node {
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

impl Node {
    fn path_length(&self, x: f64, depth: usize) -> f64 {
        match self {
            Node::Split {
                threshold,
                left,
                right,
            } => {
                if x <= *threshold {
                    left.path_length(x, depth + 1)
                } else {
                    right.path_length(x, depth + 1)
                }
            }
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
        }
    }
}

/// Expected path length of an unsuccessful search in a binary search tree
/// of `n` points. Used both to normalize scores and to credit leaves that
/// hit the depth limit while still holding several points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let m = (n - 1) as f64;
            2.0 * (m.ln() + EULER_GAMMA) - 2.0 * m / n as f64
        }
    }
}

fn grow(values: Vec<f64>, depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || values.len() <= 1 {
        return Node::Leaf { size: values.len() };
    }

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if max <= min {
        return Node::Leaf { size: values.len() };
    }

    // threshold < max keeps both sides non-empty
    let threshold = if (max - min).is_finite() {
        rng.gen_range(min..max)
    } else {
        // span overflows f64: interpolate between the ends instead
        let t: f64 = rng.gen();
        let cut = min * (1.0 - t) + max * t;
        if cut < max {
            cut.max(min)
        } else {
            min
        }
    };
    let (left, right): (Vec<f64>, Vec<f64>) = values.into_iter().partition(|&v| v <= threshold);

    Node::Split {
        threshold,
        left: Box::new(grow(left, depth + 1, max_depth, rng)),
        right: Box::new(grow(right, depth + 1, max_depth, rng)),
    }
}

/// A fitted ensemble of isolation trees.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sub_sample: usize,
}

impl IsolationForest {
    /// Fit a forest on `data`. Every call starts a fresh RNG from
    /// `params.seed`, so the same data and seed give the same forest.
    pub fn fit(data: &[f64], params: &ForestParams) -> Result<Self, DetectError> {
        if data.is_empty() {
            return Err(DetectError::model_fit("no samples"));
        }
        if !(1..=MAX_TREES).contains(&params.trees) {
            return Err(DetectError::model_fit(format!(
                "tree count {} outside 1..={MAX_TREES}",
                params.trees
            )));
        }
        if !(1..=MAX_SUB_SAMPLE).contains(&params.max_samples) {
            return Err(DetectError::model_fit(format!(
                "sub-sample size {} outside 1..={MAX_SUB_SAMPLE}",
                params.max_samples
            )));
        }
        if let Some(bad) = data.iter().find(|v| !v.is_finite()) {
            return Err(DetectError::model_fit(format!(
                "non-finite sample {bad} reached the model"
            )));
        }
        let first = data[0];
        if data.iter().all(|&v| v == first) {
            return Err(DetectError::model_fit(format!(
                "zero variance: all {} samples equal {first}",
                data.len()
            )));
        }

        let sub_sample = params.max_samples.min(data.len());
        let max_depth = (sub_sample.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.trees)
            .map(|_| {
                let sample: Vec<f64> = index::sample(&mut rng, data.len(), sub_sample)
                    .into_iter()
                    .map(|i| data[i])
                    .collect();
                grow(sample, 0, max_depth, &mut rng)
            })
            .collect();

        Ok(Self { trees, sub_sample })
    }

    /// Mean isolation depth of `x` across all trees.
    pub fn mean_path_length(&self, x: f64) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(x, 0)).sum();
        total / self.trees.len() as f64
    }

    /// Anomaly score in (0, 1]. Higher means easier to isolate.
    pub fn score(&self, x: f64) -> f64 {
        let norm = average_path_length(self.sub_sample);
        if norm == 0.0 {
            return 0.5;
        }
        2f64.powf(-self.mean_path_length(x) / norm)
    }

    pub fn scores(&self, data: &[f64]) -> Vec<f64> {
        data.iter().map(|&x| self.score(x)).collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // 2 * (ln 255 + gamma) - 2 * 255 / 256
        let c256 = average_path_length(256);
        assert!((c256 - 10.2448).abs() < 1e-3, "c(256) = {}", c256);
    }

    #[test]
    fn test_spike_scores_highest() {
        let mut data = vec![100.0; 20];
        for (i, v) in data.iter_mut().enumerate() {
            *v += (i % 5) as f64;
        }
        data.push(10_000.0);

        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        let scores = forest.scores(&data);
        let spike = scores[20];
        assert!(spike > 0.5, "spike score {}", spike);
        assert!(scores[..20].iter().all(|&s| s < spike));
    }

    #[test]
    fn test_fit_is_reproducible() {
        let data = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 35.0];
        let params = ForestParams::default();
        let a = IsolationForest::fit(&data, &params).unwrap().scores(&data);
        let b = IsolationForest::fit(&data, &params).unwrap().scores(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sub_sample_capped_by_data() {
        let data: Vec<f64> = (0..10).map(f64::from).collect();
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        assert_eq!(forest.sub_sample, 10);
        assert_eq!(forest.trees.len(), 100);
    }

    #[test]
    fn test_fit_rejects_degenerate_input() {
        let params = ForestParams::default();
        assert!(matches!(
            IsolationForest::fit(&[], &params),
            Err(DetectError::ModelFit { .. })
        ));
        assert!(matches!(
            IsolationForest::fit(&[7.0; 8], &params),
            Err(DetectError::ModelFit { .. })
        ));
        assert!(matches!(
            IsolationForest::fit(&[1.0, f64::NAN], &params),
            Err(DetectError::ModelFit { .. })
        ));
        let no_trees = ForestParams {
            trees: 0,
            ..params
        };
        assert!(IsolationForest::fit(&[1.0, 2.0], &no_trees).is_err());
    }

    #[test]
    fn test_fit_rejects_oversized_params() {
        let data = [1.0, 2.0, 3.0, 40.0];
        let huge_forest = ForestParams {
            trees: usize::MAX / 4,
            ..ForestParams::default()
        };
        assert!(matches!(
            IsolationForest::fit(&data, &huge_forest),
            Err(DetectError::ModelFit { .. })
        ));
        let huge_sample = ForestParams {
            max_samples: MAX_SUB_SAMPLE + 1,
            ..ForestParams::default()
        };
        assert!(IsolationForest::fit(&data, &huge_sample).is_err());
    }

    #[test]
    fn test_fit_handles_extreme_span() {
        for data in [
            vec![-1e308, 1e308, 0.0, 5.0, 6.0],
            vec![f64::MIN, f64::MAX, 1.0, 2.0, 3.0, 4.0],
        ] {
            let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
            let scores = forest.scores(&data);
            assert!(
                scores.iter().all(|s| s.is_finite() && *s > 0.0 && *s <= 1.0),
                "{:?}",
                scores
            );
        }
    }
}
