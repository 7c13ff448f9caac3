use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use trafficmedic::analysis::{
    self, AnalysisContext, AnalysisOptions, AnalysisOverrides, AnalysisResult, AnalysisStatus,
};
use trafficmedic::config::{AppConfig, LoggingConfig};
use trafficmedic::detect::{parse_series, Contamination};
use trafficmedic::system::{ProcNetDev, RateSampler, TrafficSampler};

#[derive(Parser)]
#[command(
    name = "trafficmedic",
    about = "Local network traffic anomaly diagnostics",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Analyze a series of samples (defaults to the demo series)
    Analyze {
        /// Comma or whitespace separated values
        #[arg(long, conflicts_with = "file")]
        values: Option<String>,

        /// Read values from a file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Analysis context: batch (raw byte counts) or streaming (bytes/sec)
        #[arg(long, default_value = "batch")]
        context: AnalysisContext,

        #[command(flatten)]
        tuning: Tuning,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Sample live interface traffic, then analyze it
    Monitor {
        /// Number of samples (overrides config)
        #[arg(long)]
        samples: Option<usize>,

        /// Milliseconds between samples (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,

        #[command(flatten)]
        tuning: Tuning,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
struct Tuning {
    /// Random seed for the outlier model
    #[arg(long)]
    seed: Option<u64>,

    /// Outlier share: "auto" or a fraction in (0, 1)
    #[arg(long)]
    contamination: Option<Contamination>,

    /// Minimum clean samples before anything is flagged
    #[arg(long)]
    min_samples: Option<usize>,
}

impl Tuning {
    fn overrides(&self) -> AnalysisOverrides {
        AnalysisOverrides {
            minimum_sample_count: self.min_samples,
            random_seed: self.seed,
            contamination: self.contamination,
            ..Default::default()
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting trafficmedic dashboard");
            trafficmedic::serve(config).await?;
        }
        Commands::Analyze {
            values,
            file,
            context,
            tuning,
            json,
        } => {
            let raw = match (values, file) {
                (Some(text), _) => parse_series(&text)?,
                (None, Some(path)) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    parse_series(&text)?
                }
                (None, None) => analysis::DEMO_SERIES.to_vec(),
            };
            if raw.is_empty() {
                anyhow::bail!("no data to analyze");
            }

            let session = config.analysis.session();
            let options = tuning.overrides().apply(*session.options(context));
            options.validate()?;
            tracing::info!(samples = raw.len(), %context, "Running analysis");
            let result = analysis::run(&raw, &options);
            print_result(&result, json)?;
        }
        Commands::Monitor {
            samples,
            interval_ms,
            tuning,
            json,
        } => {
            let options = tuning
                .overrides()
                .apply(config.analysis.streaming_options());
            options.validate()?;

            let samples = samples.unwrap_or(config.monitor.samples);
            let interval_ms = interval_ms.unwrap_or(config.monitor.interval_ms);
            if samples == 0 || interval_ms == 0 {
                anyhow::bail!("samples and interval must be positive");
            }

            let source = ProcNetDev::new(
                config.monitor.counters_path.clone(),
                config.monitor.exclude_interfaces.clone(),
            );
            let sampler = RateSampler::new(source);
            tracing::info!(samples, interval_ms, "Sampling live traffic");
            let series = sampler
                .collect(samples, Duration::from_millis(interval_ms))
                .await;

            let result = tokio::task::spawn_blocking(move || analysis::run(&series, &options))
                .await
                .context("analysis task failed")?;
            print_result(&result, json)?;
        }
        Commands::Config => {
            #[derive(Serialize)]
            struct Effective {
                batch: AnalysisOptions,
                streaming: AnalysisOptions,
            }
            println!("{}", config.to_toml()?);
            println!("# effective analysis options");
            let effective = Effective {
                batch: config.analysis.batch_options(),
                streaming: config.analysis.streaming_options(),
            };
            for line in toml::to_string_pretty(&effective)?.lines() {
                if line.is_empty() {
                    println!("#");
                } else {
                    println!("# {}", line);
                }
            }
        }
    }

    Ok(())
}

fn print_result(result: &AnalysisResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("\n=== trafficmedic Anomaly Report ===");
    println!(
        "Samples:  {} ({} unreadable, rule set: {})",
        result.series.len(),
        result.stats.dropped,
        result.rule_set
    );
    if result.stats.count > 0 {
        println!(
            "Range:    {:.0} .. {:.0} (mean {:.1}, std dev {:.1})",
            result.stats.min, result.stats.max, result.stats.mean, result.stats.std_dev
        );
    }
    for warning in &result.warnings {
        println!("Warning:  {}", warning);
    }

    if let AnalysisStatus::InsufficientData { needed, have } = result.status {
        println!("\nNot enough data: need {} samples, have {}.", needed, have);
    } else if result.anomalies.is_empty() {
        println!("\nNo significant anomalies detected.");
    } else {
        println!();
        println!("{:<6} | {:>14} | {:<6} | Category", "Index", "Value", "Score");
        println!("{:-<6}-|-{:->14}-|-{:-<6}-|-{:-<20}", "", "", "", "");
        for a in &result.anomalies {
            println!(
                "{:<6} | {:>14.0} | {:<6.3} | {:?}",
                a.index, a.value, a.score, a.suggestion.category
            );
            println!("{:<6} | {:>14} | {:<6} |   -> {}", "", "", "", a.suggestion.message);
        }
    }
    println!("===================================\n");
    Ok(())
}
