#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hostmetrics::config::{self, HostmetricsConfig, load_configuration};
use hostmetrics::datamodel::duration::{parse_duration, parse_granularity};
use hostmetrics::identity::FileIdentity;
use hostmetrics::sampler::{self, SysinfoGauges};
use hostmetrics::store::{Aggregation, GnocchiClient, MeasureStore, Resample};
use hostmetrics::watch::{self, Series, SeriesShape, WatchOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, event};

#[derive(Parser)]
#[command(name = "hostmetrics")]
#[command(about = "Host usage producer and viewer for the Gnocchi measurement store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gnocchi listening URL
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Authentication token
    #[arg(short, long, global = true)]
    token: Option<String>,

    /// How the token is sent: keystone (X-Auth-Token) or bearer
    #[arg(long, global = true)]
    auth_scheme: Option<String>,

    /// Time between measurements (e.g. 30s, 5m)
    #[arg(short, long, global = true)]
    interval: Option<String>,

    /// OpenStack project ID owning created resources
    #[arg(long, global = true)]
    project_id: Option<String>,

    /// OpenStack user ID owning created resources
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// File holding the machine UUID, created if missing
    #[arg(long, global = true)]
    identity_file: Option<PathBuf>,

    /// Number of points kept per watched host
    #[arg(long, global = true)]
    window: Option<usize>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Push CPU and memory usage of this host periodically
    Produce,

    /// List the known hosts and their metrics
    List,

    /// Follow a metric on one or more hosts
    Watch {
        /// Host IDs
        #[arg(required = true)]
        hosts: Vec<String>,

        /// Metric name
        #[arg(short, long, default_value = "cpu")]
        metric: String,

        /// second, minute, hour, day or a duration
        #[arg(short, long, default_value = "second")]
        granularity: String,

        /// Resample on a coarser interval (e.g. 5m)
        #[arg(short, long)]
        resample: Option<String>,

        /// Aggregation used when resampling
        #[arg(short, long, default_value = "mean")]
        aggregation: String,

        /// Time between refreshes, defaults to the spacing of the series
        #[arg(long)]
        every: Option<String>,
    },
}

impl Cli {
    fn apply(&self, config: &mut HostmetricsConfig) {
        if let Some(url) = &self.url {
            config.store_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if let Some(auth_scheme) = &self.auth_scheme {
            config.auth_scheme = auth_scheme.clone();
        }
        if let Some(interval) = &self.interval {
            config.interval = interval.clone();
        }
        if let Some(project_id) = &self.project_id {
            config.project_id = project_id.clone();
        }
        if let Some(user_id) = &self.user_id {
            config.user_id = user_id.clone();
        }
        if let Some(identity_file) = &self.identity_file {
            config.identity_file = identity_file.clone();
        }
        if let Some(window) = self.window {
            config.window = window;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,hostmetrics=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .compact()
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to create Tokio runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<hostmetrics::Error>() {
        Some(hostmetrics::Error::CredentialExpired) => {
            event!(Level::ERROR, "Authentication token has expired");
            eprintln!("Authentication token has expired");
        }
        Some(error @ hostmetrics::Error::Configuration(_)) => {
            event!(Level::ERROR, "{}", error);
            eprintln!("{}", error);
        }
        _ => {
            event!(Level::ERROR, "Application error: {:#}", err);
            eprintln!("Application error: {:#}", err);
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    load_configuration(|config| cli.apply(config)).context("Failed to load configuration")?;
    let config = config::get().context("Failed to get configuration")?;

    let store: Arc<dyn MeasureStore> = Arc::new(GnocchiClient::new(config.store_settings()?)?);

    match cli.command {
        Commands::Produce => {
            let identity = FileIdentity::new(&config.identity_file);
            let interval = config.parse_interval()?;
            let gauges = tokio::task::spawn_blocking(SysinfoGauges::new)
                .await
                .context("Failed to initialize the host gauges")?;
            tokio::select! {
                result = sampler::produce(store, &identity, Box::new(gauges), interval) => {
                    let Err(error) = result;
                    Err(error.into())
                }
                _ = tokio::signal::ctrl_c() => {
                    event!(Level::INFO, "Interrupted, stopping the producer");
                    Ok(())
                }
            }
        }
        Commands::List => {
            for resource in store.list_resources().await? {
                let metrics: Vec<&str> = resource.metrics.keys().map(String::as_str).collect();
                println!("{}\t{}", resource.display_id(), metrics.join(", "));
            }
            Ok(())
        }
        Commands::Watch {
            hosts,
            metric,
            granularity,
            resample,
            aggregation,
            every,
        } => {
            let mut shape = SeriesShape::new(parse_granularity(&granularity)?);
            if let Some(resample) = resample {
                shape = shape.with_resample(Resample {
                    interval: parse_duration(&resample)?,
                    aggregation: aggregation.parse::<Aggregation>()?,
                });
            }
            let options = WatchOptions {
                hosts,
                metric,
                shape,
                window: config.window,
                every: every.as_deref().map(parse_duration).transpose()?,
            };

            tokio::select! {
                result = watch::watch(store, options, |series| println!("{}", render(series))) => {
                    let Err(error) = result;
                    Err(error.into())
                }
                _ = tokio::signal::ctrl_c() => {
                    event!(Level::INFO, "Interrupted, stopping the watch");
                    Ok(())
                }
            }
        }
    }
}

fn render(series: &Series) -> String {
    match (series.latest(), series.summary()) {
        (Some((timestamp, value)), Some(summary)) => format!(
            "{} {}: {:.2} at {} ({} points, min {:.2}, avg {:.2}, max {:.2})",
            series.host(),
            series.metric(),
            value,
            timestamp,
            series.len(),
            summary.min,
            summary.mean,
            summary.max
        ),
        _ => format!("{} {}: no data yet", series.host(), series.metric()),
    }
}
