//! cinegate - TMDB gateway command-line front end.

/// Application configuration (TOML + environment).
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cinegate_api::tmdb::{Gateway, LocalTmdbFetch, QueryParams, listing_endpoints};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_config_path};

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch a TMDB endpoint through the gateway.
    Fetch(FetchArgs),
    /// Prefetch listing endpoints concurrently.
    Warm(WarmArgs),
    /// Check TMDB connectivity with the next API key.
    Check,
    /// Show API key pool and cache status.
    Status,
    /// Write a default config file.
    Init(InitArgs),
}

/// Arguments for the `fetch` subcommand.
#[derive(clap::Args)]
struct FetchArgs {
    /// Endpoint path (e.g. "/movie/popular").
    endpoint: String,

    /// Query parameter as KEY=VALUE; repeatable.
    #[arg(long = "param", short = 'p', value_parser = parse_key_val)]
    params: Vec<(String, String)>,
}

/// Arguments for the `warm` subcommand.
#[derive(clap::Args)]
struct WarmArgs {
    /// Endpoints to prefetch. Defaults to every listing endpoint.
    endpoints: Vec<String>,
}

/// Arguments for the `init` subcommand.
#[derive(clap::Args)]
struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,
}

/// Parses a `KEY=VALUE` pair.
fn parse_key_val(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("invalid KEY=VALUE: no `=` found in {raw:?}");
    };
    if key.is_empty() {
        bail!("invalid KEY=VALUE: empty key in {raw:?}");
    }
    Ok((String::from(key), String::from(value)))
}

/// Loads config (file + env) and builds the gateway.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the gateway fails to build.
#[instrument(skip_all)]
fn build_gateway(dir: Option<&PathBuf>) -> Result<Gateway> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    let config = AppConfig::load_with_env(&config_path).context("failed to load config")?;
    config.tmdb.build_gateway()
}

/// Runs the `fetch` subcommand.
///
/// # Errors
///
/// Returns an error if the gateway fails to build or the fetch fails.
#[instrument(skip_all)]
async fn run_fetch(args: &FetchArgs, dir: Option<&PathBuf>) -> Result<()> {
    let gateway = build_gateway(dir)?;
    let params: QueryParams = args.params.iter().cloned().collect();

    let payload = gateway
        .fetch(&args.endpoint, &params)
        .await
        .with_context(|| format!("TMDB fetch failed: {}", args.endpoint))?;

    let pretty = serde_json::to_string_pretty(&payload).context("failed to format response")?;
    tracing::info!("{pretty}");

    Ok(())
}

/// Fetches every endpoint concurrently and returns the number that failed.
async fn warm_endpoints<G: LocalTmdbFetch>(gateway: &G, endpoints: &[String]) -> usize {
    let params = QueryParams::new();
    let results = join_all(
        endpoints
            .iter()
            .map(|endpoint| gateway.fetch(endpoint, &params)),
    )
    .await;

    let mut failed = 0usize;
    for (endpoint, result) in endpoints.iter().zip(results) {
        match result {
            Ok(payload) => {
                let items = payload
                    .get("results")
                    .and_then(serde_json::Value::as_array)
                    .map_or(0, Vec::len);
                tracing::info!("  OK    {endpoint} ({items} results)");
            }
            Err(err) => {
                failed = failed.saturating_add(1);
                tracing::warn!("  FAIL  {endpoint}: {err}");
            }
        }
    }
    failed
}

/// Runs the `warm` subcommand.
///
/// # Errors
///
/// Returns an error if the gateway fails to build or any endpoint fails.
#[instrument(skip_all)]
async fn run_warm(args: &WarmArgs, dir: Option<&PathBuf>) -> Result<()> {
    let gateway = build_gateway(dir)?;
    let endpoints: Vec<String> = if args.endpoints.is_empty() {
        listing_endpoints().map(|e| format!("/{e}")).collect()
    } else {
        args.endpoints.clone()
    };

    tracing::info!("Warming {} endpoint(s)...", endpoints.len());
    let failed = warm_endpoints(&gateway, &endpoints).await;
    tracing::info!("Cached entries: {}", gateway.status().cache.size);

    if failed > 0 {
        bail!("{failed} of {} endpoint(s) failed", endpoints.len());
    }
    Ok(())
}

/// Runs the `check` subcommand.
///
/// # Errors
///
/// Returns an error if the gateway fails to build or TMDB is unreachable.
#[instrument(skip_all)]
async fn run_check(dir: Option<&PathBuf>) -> Result<()> {
    let gateway = build_gateway(dir)?;
    let total = gateway.status().api_keys.total;

    gateway
        .check_connectivity()
        .await
        .context("TMDB API is not accessible")?;

    tracing::info!("TMDB API is accessible with rotating keys ({total} key(s))");
    Ok(())
}

/// Runs the `status` subcommand.
///
/// # Errors
///
/// Returns an error if the gateway fails to build.
#[instrument(skip_all)]
fn run_status(dir: Option<&PathBuf>) -> Result<()> {
    let gateway = build_gateway(dir)?;
    let status = serde_json::to_string_pretty(&gateway.status())
        .context("failed to format status")?;
    tracing::info!("{status}");
    Ok(())
}

/// Runs the `init` subcommand.
///
/// # Errors
///
/// Returns an error if the file exists (without `--force`) or cannot be written.
#[instrument(skip_all)]
fn run_init(args: &InitArgs, dir: Option<&PathBuf>) -> Result<()> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists; use --force to overwrite",
            config_path.display()
        );
    }
    AppConfig::default()
        .save(&config_path)
        .context("failed to save config")?;
    tracing::info!("Wrote default config to {}", config_path.display());
    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch(args) => run_fetch(&args, cli.dir.as_ref()).await,
        Commands::Warm(args) => run_warm(&args, cli.dir.as_ref()).await,
        Commands::Check => run_check(cli.dir.as_ref()).await,
        Commands::Status => run_status(cli.dir.as_ref()),
        Commands::Init(args) => run_init(&args, cli.dir.as_ref()),
    }
}
