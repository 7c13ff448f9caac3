//! Live throughput sampling from kernel interface counters.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed counters line: {0:?}")]
    Malformed(String),

    #[error("no usable interfaces in {0}")]
    NoInterfaces(PathBuf),
}

/// Something that reports a monotonically increasing byte total.
pub trait CounterSource: Send + Sync {
    fn read_total_bytes(&self) -> Result<u64, SamplerError>;
}

/// Linux `/proc/net/dev` counters, received plus transmitted.
#[derive(Debug, Clone)]
pub struct ProcNetDev {
    path: PathBuf,
    exclude: Vec<String>,
}

impl Default for ProcNetDev {
    fn default() -> Self {
        Self::new("/proc/net/dev", vec!["lo".to_string()])
    }
}

impl ProcNetDev {
    pub fn new(path: impl Into<PathBuf>, exclude: Vec<String>) -> Self {
        Self {
            path: path.into(),
            exclude,
        }
    }

    /// Sum rx + tx bytes over every non-excluded interface in `content`.
    pub fn parse_totals(&self, content: &str) -> Result<u64, SamplerError> {
        let mut total: u64 = 0;
        let mut seen = 0;

        // first two lines are column headers
        for line in content.lines().skip(2) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (iface, counters) = line
                .split_once(':')
                .ok_or_else(|| SamplerError::Malformed(line.to_string()))?;
            if self.exclude.iter().any(|e| e == iface.trim()) {
                continue;
            }

            let fields: Vec<&str> = counters.split_whitespace().collect();
            if fields.len() < 9 {
                return Err(SamplerError::Malformed(line.to_string()));
            }
            let rx: u64 = fields[0]
                .parse()
                .map_err(|_| SamplerError::Malformed(line.to_string()))?;
            let tx: u64 = fields[8]
                .parse()
                .map_err(|_| SamplerError::Malformed(line.to_string()))?;

            total = total.wrapping_add(rx).wrapping_add(tx);
            seen += 1;
        }

        if seen == 0 {
            return Err(SamplerError::NoInterfaces(self.path.clone()));
        }
        Ok(total)
    }
}

impl CounterSource for ProcNetDev {
    fn read_total_bytes(&self) -> Result<u64, SamplerError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SamplerError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.parse_totals(&content)
    }
}

/// Produces a bytes-per-second series, one value per tick.
///
/// Failed reads show up as `NaN` so the series keeps its time axis.
#[async_trait::async_trait]
pub trait TrafficSampler: Send + Sync {
    async fn collect(&self, samples: usize, interval: Duration) -> Vec<f64>;
}

/// Turns successive counter totals into rates.
pub struct RateSampler<C> {
    source: C,
}

impl<C: CounterSource> RateSampler<C> {
    pub fn new(source: C) -> Self {
        Self { source }
    }

    fn read(&self) -> Option<u64> {
        match self.source.read_total_bytes() {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(error = %e, "counter read failed");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl<C: CounterSource> TrafficSampler for RateSampler<C> {
    async fn collect(&self, samples: usize, interval: Duration) -> Vec<f64> {
        // interval() panics on a zero period
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.tick().await;

        let mut last = self.read().map(|total| (total, Instant::now()));
        let mut rates = Vec::with_capacity(samples);

        for _ in 0..samples {
            ticker.tick().await;
            let now = Instant::now();
            let current = self.read();

            let rate = match (last, current) {
                (Some((prev, then)), Some(total)) if total >= prev => {
                    let secs = now.duration_since(then).as_secs_f64();
                    if secs > 0.0 {
                        (total - prev) as f64 / secs
                    } else {
                        f64::NAN
                    }
                }
                (Some(_), Some(_)) => {
                    debug!("counter went backwards, rebasing");
                    f64::NAN
                }
                _ => f64::NAN,
            };
            rates.push(rate);
            last = current.map(|total| (total, now));
        }

        debug!(samples = rates.len(), "sampling finished");
        rates
    }
}

/// Replays a fixed series; cycles it when more samples are requested.
#[derive(Debug, Clone)]
pub struct FixedSampler {
    values: Vec<f64>,
}

impl FixedSampler {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

#[async_trait::async_trait]
impl TrafficSampler for FixedSampler {
    async fn collect(&self, samples: usize, _interval: Duration) -> Vec<f64> {
        if self.values.is_empty() {
            return vec![f64::NAN; samples];
        }
        self.values.iter().copied().cycle().take(samples).collect()
    }
}
