// Binary includes library modules - some public API items are only for library consumers
#![allow(unused)]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod pipeline;
mod record;
mod source;
mod splitter;

use pipeline::Pipeline;
use source::{FileSource, RecordSource, StreamSource};
use splitter::KeyMetricSplitter;

#[derive(Parser, Debug)]
#[command(name = "metricsplit")]
#[command(about = "Splits dotted metric fields in event records into derived metric records")]
struct Args {
    /// Read records from a newline-delimited JSON file
    #[arg(short, long, conflicts_with = "connect")]
    file: Option<PathBuf>,

    /// Connect to a TCP endpoint for live records (host:port)
    #[arg(short, long)]
    connect: Option<String>,

    /// Only expand fields with this period (third key segment) and
    /// compute running diffs per (priority, instance) pair
    #[arg(long)]
    field: Option<String>,

    /// Drain interval in seconds
    #[arg(long, default_value = "1")]
    flush_secs: u64,

    /// Write derived records to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optional settings file (field, flush_secs, output); command-line
    /// flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Settings loadable from a config file or METRICSPLIT_* environment
/// variables.
#[derive(Debug, Default, Deserialize)]
struct Settings {
    field: Option<String>,
    flush_secs: Option<u64>,
    output: Option<PathBuf>,
}

impl Settings {
    fn load(path: &std::path::Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("METRICSPLIT"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    // Command-line flags win over the settings file.
    let field = args.field.or(settings.field);
    let flush_secs = if args.flush_secs != 1 {
        args.flush_secs
    } else {
        settings.flush_secs.unwrap_or(args.flush_secs)
    };
    let output = args.output.or(settings.output);

    let splitter = match field {
        Some(field) => {
            info!("Filtering to period '{}' with diffing enabled", field);
            KeyMetricSplitter::with_field(field)
        }
        None => KeyMetricSplitter::new(),
    };

    let sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };

    let flush_interval = Duration::from_secs(flush_secs);

    // File input needs no runtime; stream inputs keep one alive in the
    // background while the pipeline loop runs synchronously.
    if let Some(path) = &args.file {
        let source = Box::new(FileSource::new(path));
        return Pipeline::new(source, splitter, sink).run(flush_interval);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let source: Box<dyn RecordSource> = match &args.connect {
        Some(addr) => rt.block_on(async {
            use tokio::net::TcpStream;

            info!("Connecting to {}...", addr);
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    Ok(Box::new(StreamSource::spawn(stream, addr)) as Box<dyn RecordSource>)
                }
                Err(e) => Err(anyhow::anyhow!("Failed to connect to {}: {}", addr, e)),
            }
        })?,
        None => {
            let _guard = rt.enter();
            Box::new(StreamSource::spawn(tokio::io::stdin(), "stdin"))
        }
    };

    Pipeline::new(source, splitter, sink).run(flush_interval)
}
