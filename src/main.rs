//! CLI entry point for the signal processor.
//!
//! Consumes vehicle positions as JSON lines, publishes schedule events, and
//! serves the operational HTTP surface while it runs.

use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use signal_processor::api::{self, ApiState};
use signal_processor::config::{
    DEFAULT_ARRIVING_WINDOW_MINUTES, DEFAULT_INPUT_TOPIC, DEFAULT_OUTPUT_TOPIC,
    DEFAULT_PROXIMITY_THRESHOLD_KM, ProcessorConfig, Topics,
};
use signal_processor::consumer::Consumer;
use signal_processor::processor::{classify, nearest_stop};
use signal_processor::stats::ProcessorStats;
use signal_processor::stops::{StopRegistry, catalog_for_source};
use signal_processor::stream::{CsvEgress, Egress, JsonLinesEgress, JsonLinesIngress};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "signal_processor")]
#[command(about = "Turns vehicle positions into stop schedule events", long_about = None)]
struct Cli {
    /// Stop catalog: `builtin`, a JSON file, or an http(s) URL
    #[arg(long, global = true, env = "STOPS_SOURCE", default_value = "builtin")]
    stops: String,

    /// Bearer token for an HTTP stop catalog
    #[arg(long, global = true, env = "STOPS_TOKEN", hide_env_values = true)]
    stops_token: Option<String>,

    /// Maximum distance in km at which a vehicle is near a stop
    #[arg(long, global = true, env = "PROXIMITY_THRESHOLD_KM", default_value_t = DEFAULT_PROXIMITY_THRESHOLD_KM)]
    proximity_threshold_km: f64,

    /// Arriving window in minutes (reported only)
    #[arg(long, global = true, env = "ARRIVING_WINDOW_MINUTES", default_value_t = DEFAULT_ARRIVING_WINDOW_MINUTES)]
    arriving_window_minutes: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One `{"topic","key","value"}` envelope per line
    Json,
    /// One flattened row per event
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume positions and publish schedule events
    Run {
        /// JSON-lines file of position events, or `-` for stdin
        #[arg(short, long, env = "INPUT", default_value = "-")]
        input: String,

        /// Destination file, or `-` for stdout
        #[arg(short, long, env = "OUTPUT", default_value = "-")]
        output: String,

        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Number of partition workers
        #[arg(short, long, env = "WORKERS", default_value_t = 1)]
        workers: usize,

        /// Number of partitions vehicle ids are hashed into
        #[arg(long, env = "PARTITIONS", default_value_t = 8)]
        partitions: u32,

        #[arg(long, env = "INPUT_TOPIC", default_value = DEFAULT_INPUT_TOPIC)]
        input_topic: String,

        #[arg(long, env = "OUTPUT_TOPIC", default_value = DEFAULT_OUTPUT_TOPIC)]
        output_topic: String,

        /// Address of the health/info HTTP surface
        #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8082")]
        http_addr: SocketAddr,

        /// Do not start the HTTP surface
        #[arg(long, default_value_t = false)]
        no_http: bool,
    },
    /// List the loaded stops, or show one of them
    Stops {
        /// Only show the stop with this id
        #[arg(long)]
        id: Option<String>,
    },
    /// Match a single position against the stops
    Locate {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Speed in km/h
        #[arg(long, default_value_t = 0.0)]
        speed: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/signal_processor.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("signal_processor.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = ProcessorConfig::new(cli.proximity_threshold_km, cli.arriving_window_minutes)?;
    let registry = Arc::new(load_registry(&cli.stops, cli.stops_token.as_deref()).await?);

    match cli.command {
        Commands::Run {
            input,
            output,
            format,
            workers,
            partitions,
            input_topic,
            output_topic,
            http_addr,
            no_http,
        } => {
            let topics = Topics {
                consumes: input_topic,
                produces: output_topic,
            };
            let stats = Arc::new(ProcessorStats::new());

            if !no_http {
                let state = ApiState {
                    stats: Arc::clone(&stats),
                    config: config.clone(),
                    topics: topics.clone(),
                    stop_count: registry.len(),
                };
                tokio::spawn(async move {
                    if let Err(e) = api::serve(http_addr, state).await {
                        error!(error = %e, "HTTP surface stopped");
                    }
                });
            }

            let egress = open_egress(&output, format, &topics.produces).await?;
            let mut ingress = JsonLinesIngress::new(open_input(&input).await?, partitions);

            info!(
                consumes = %topics.consumes,
                produces = %topics.produces,
                threshold_km = config.proximity_threshold_km,
                workers,
                "Signal processor starting"
            );

            let consumer = Consumer::new(registry, config, egress, stats).with_workers(workers);

            tokio::select! {
                summary = consumer.run(&mut ingress) => {
                    let summary = summary?;
                    if !summary.uncommitted.is_empty() {
                        warn!(
                            count = summary.uncommitted.len(),
                            offsets = ?summary.uncommitted,
                            "Records left uncommitted"
                        );
                    }
                    info!(dedup_entries = summary.dedup_entries, "Run complete");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping");
                }
            }
        }
        Commands::Stops { id } => {
            let stops: Vec<_> = match id.as_deref() {
                Some(id) => match registry.get(id) {
                    Some(stop) => vec![stop],
                    None => bail!("no stop with id '{id}'"),
                },
                None => registry.iter().collect(),
            };
            info!(total = registry.len(), shown = stops.len(), "Stop list loaded");
            for stop in stops {
                let sequence = stop.sequence_number().ok();
                info!(
                    stop_id = %stop.stop_id,
                    name = %stop.name,
                    address = %stop.address,
                    latitude = stop.latitude,
                    longitude = stop.longitude,
                    sequence,
                    "Stop"
                );
            }
        }
        Commands::Locate { lat, lon, speed } => {
            match nearest_stop(&registry, lat, lon, config.proximity_threshold_km) {
                Some(nearby) => {
                    let status = classify(nearby.distance_km, speed, config.proximity_threshold_km);
                    info!(
                        stop_id = %nearby.stop.stop_id,
                        name = %nearby.stop.name,
                        distance_km = format_args!("{:.3}", nearby.distance_km),
                        %status,
                        "Nearest stop"
                    );
                }
                None => info!(
                    threshold_km = config.proximity_threshold_km,
                    "No stop within threshold"
                ),
            }
        }
    }

    Ok(())
}

/// Loads and validates the stop registry from `source`.
#[tracing::instrument(skip(token))]
async fn load_registry(source: &str, token: Option<&str>) -> Result<StopRegistry> {
    let stops = catalog_for_source(source, token)?.list_stops().await?;
    let registry = StopRegistry::new(stops)?;

    for stop_id in registry.malformed_ids() {
        warn!(stop_id, "Stop id has no numeric ordinal; positions matched to it will fail");
    }
    if registry.is_empty() {
        warn!("Stop list is empty; no schedule events will be produced");
    }
    info!(stops = registry.len(), "Stop registry loaded");

    Ok(registry)
}

async fn open_input(input: &str) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(input).await?;
    Ok(Box::new(BufReader::new(file)))
}

async fn open_egress(output: &str, format: OutputFormat, topic: &str) -> Result<Arc<dyn Egress>> {
    let egress: Arc<dyn Egress> = match (format, output) {
        (OutputFormat::Json, "-") => Arc::new(JsonLinesEgress::stdout(topic)),
        (OutputFormat::Json, path) => Arc::new(JsonLinesEgress::file(path, topic).await?),
        (OutputFormat::Csv, "-") => bail!("CSV output needs a file path"),
        (OutputFormat::Csv, path) => Arc::new(CsvEgress::new(path)),
    };
    Ok(egress)
}
