use std::sync::Arc;

use tokio::sync::RwLock;

use crate::analysis::{AnalysisResult, AnalysisSession, DEMO_SERIES};
use crate::config::{AppConfig, MonitorConfig};
use crate::system::{ProcNetDev, RateSampler, TrafficSampler};

/// What one dashboard user is looking at: the editable series and the
/// most recent result. Replaced on each run, reset on request.
#[derive(Debug, Clone)]
pub struct DashboardSession {
    pub series: Vec<f64>,
    pub latest: Option<AnalysisResult>,
}

impl Default for DashboardSession {
    fn default() -> Self {
        Self {
            series: DEMO_SERIES.to_vec(),
            latest: None,
        }
    }
}

impl DashboardSession {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub analysis: AnalysisSession,
    pub monitor: MonitorConfig,
    pub sampler: Arc<dyn TrafficSampler>,
    pub session: Arc<RwLock<DashboardSession>>,
}

impl AppState {
    /// State backed by the host's interface counters.
    pub fn new(config: &AppConfig) -> Self {
        let source = ProcNetDev::new(
            config.monitor.counters_path.clone(),
            config.monitor.exclude_interfaces.clone(),
        );
        Self::with_sampler(config, Arc::new(RateSampler::new(source)))
    }

    pub fn with_sampler(config: &AppConfig, sampler: Arc<dyn TrafficSampler>) -> Self {
        Self {
            analysis: config.analysis.session(),
            monitor: config.monitor.clone(),
            sampler,
            session: Arc::new(RwLock::new(DashboardSession::default())),
        }
    }
}
