//! Subscriber setup
//!
//! One subscriber per process: console output on stderr, text or JSON,
//! plus an optional plain-text log file per run.

use std::fs::File;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Console log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Install the global subscriber.
///
/// Returns the log file path when `log_dir` is given.
pub fn init(verbose: bool, format: LogFormat, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());
    layers.push(match format {
        LogFormat::Text => console.boxed(),
        LogFormat::Json => console.json().boxed(),
    });

    let log_path = match log_dir {
        Some(dir) => {
            let path = log_file_path(dir, chrono::Local::now());
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            );
            Some(path)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;
    Ok(log_path)
}

fn log_file_path<Tz>(dir: &Path, now: chrono::DateTime<Tz>) -> PathBuf
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    dir.join(format!("{}.log", now.format("%Y-%m-%d-%H-%M-%S")))
}
