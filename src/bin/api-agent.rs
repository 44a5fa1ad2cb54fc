use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use resilient_api::client::builder;
use resilient_api::config::loader;
use resilient_api::observability::process_metrics::collect_process_metrics;
use resilient_api::observability::{CompositeSink, EventSink, Metrics, MetricsSink, TracingSink};
use resilient_api::server::server::{self, AppState};
use resilient_api::utils::constants::DEFAULT_CONFIG_PATH;
use resilient_api::utils::logging::{self, LogLevel};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let service_config = loader::file_to_config(Path::new(&args.config)).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Metrics and event sinks
    // -------------------------------

    let metrics = Metrics::new().context("registering metrics")?;
    let events: Arc<dyn EventSink> = Arc::new(CompositeSink::new(vec![
        Arc::new(TracingSink),
        Arc::new(MetricsSink::new(metrics.clone())),
    ]));

    // -------------------------------
    // 3. Client: authority, token provider, limiter, cache, transport
    // -------------------------------

    let client = builder::build_client(&service_config, events)?;

    // -------------------------------
    // 4. Http server and process metrics
    // -------------------------------

    let state = AppState::new(metrics.clone(), Arc::new(client));
    let http_server = server::start(&service_config.settings, state);
    let process_metrics = collect_process_metrics(metrics, service_config.settings.metrics.is_enabled);

    info!(upstream = %service_config.upstream.base_url, "api agent starting...");
    // the server returning ends the process; the sampler loops forever
    tokio::select! {
        res = http_server => res?,
        res = process_metrics => res?,
    }

    Ok(())
}
