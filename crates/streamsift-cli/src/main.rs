//! streamsift
//!
//! Replays recorded model generations through the streaming filter and
//! prints the resulting events as JSON lines.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use metrics_exporter_prometheus::PrometheusHandle;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use tracing::info;

mod input;
mod replay;

use input::Fragment;

#[derive(Parser, Debug)]
#[command(name = "streamsift")]
#[command(about = "Streaming post-processor for LLM output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON
    #[arg(long, global = true, env = "STREAMSIFT_JSON_LOGS")]
    json_logs: bool,

    /// Print a Prometheus snapshot of the filter metrics to stderr
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a recorded generation through the filter
    Replay(ReplayArgs),

    /// Print the built-in presets as YAML
    Presets,
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    /// Filter configuration file (YAML)
    #[arg(short, long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in preset name
    #[arg(short, long)]
    preset: Option<String>,

    /// Recorded generation; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Input format
    #[arg(short, long, value_enum, default_value_t = InputFormat::Text)]
    format: InputFormat,

    /// Characters per fragment for text input
    #[arg(long, default_value_t = 4)]
    fragment_chars: usize,

    /// Override the configured chunk size (fragments per text chunk)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Print a summary of the whole generation after the events
    #[arg(short, long)]
    aggregate: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum InputFormat {
    /// Plain text, cut into fragments of --fragment-chars characters
    Text,
    /// One {"text", "token_ids", "logprobs"} record per line
    Jsonl,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);
    let metrics_handle = if cli.metrics { Some(init_metrics()?) } else { None };

    match cli.command {
        Command::Replay(args) => run_replay(&args)?,
        Command::Presets => print!("{}", replay::presets_yaml()?),
    }

    if let Some(handle) = metrics_handle {
        eprint!("{}", handle.render());
    }
    Ok(())
}

fn run_replay(args: &ReplayArgs) -> Result<()> {
    let mut config = replay::resolve_config(args.config.as_deref(), args.preset.as_deref())?;
    if let Some(chunk_size) = args.chunk_size {
        config = config.into_builder().chunk_size(chunk_size).build();
    }
    info!(dialect = %config.dialect, chunk_size = config.chunk_size, "configuration loaded");

    let fragments = read_fragments(args)?;
    info!(fragments = fragments.len(), "input loaded");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = replay::replay(config, &fragments, &mut out)?;

    if args.aggregate {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn read_fragments(args: &ReplayArgs) -> Result<Vec<Fragment>> {
    let reader: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };

    match args.format {
        InputFormat::Jsonl => input::parse_jsonl(BufReader::new(reader)),
        InputFormat::Text => {
            let mut text = String::new();
            BufReader::new(reader)
                .read_to_string(&mut text)
                .context("input is not valid UTF-8 text")?;
            Ok(input::split_text(&text, args.fragment_chars))
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("streamsift=debug,streamsift_filter=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("streamsift=info,streamsift_filter=warn"))
    };

    // stdout carries the events
    let (plain, structured) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(io::stderr)))
    } else {
        (Some(tracing_subscriber::fmt::layer().with_writer(io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .init();
}

/// Initialize metrics recorder and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "streamsift_fragments_total",
        "Total number of fragments written to filter engines"
    );
    metrics::describe_counter!(
        "streamsift_events_total",
        "Total number of output events by kind"
    );
    metrics::describe_counter!(
        "streamsift_stops_total",
        "Total number of generations ended by a stop sequence or the repetition guard"
    );
    metrics::describe_counter!(
        "streamsift_markup_fallbacks_total",
        "Total number of unclosed spans released as plain text"
    );
    metrics::describe_histogram!(
        "streamsift_write_latency_us",
        metrics::Unit::Microseconds,
        "Time spent processing one write or flush in microseconds"
    );

    info!("Metrics recorder initialized");
    Ok(handle)
}
