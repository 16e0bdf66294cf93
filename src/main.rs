use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use designdiff::config::EngineConfig;
use designdiff::report::ComparisonResult;
use designdiff::selection::{self, IssueSelections};
use designdiff::{bulk, compare_images};

#[derive(Debug, Parser)]
#[command(name = "designdiff", version, about = "Compare a design export against a built screen")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compare one reference/built pair
    Compare {
        /// Reference design image
        reference: PathBuf,
        /// Screenshot of the implementation
        built: PathBuf,
        /// Existing directory for the annotated images
        #[arg(long)]
        out: PathBuf,
        /// Drop regions with this many pixels or fewer
        #[arg(long)]
        min_area: Option<u32>,
        /// JPEG quality (1-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Compare every screen listed in a JSON manifest
    Bulk {
        /// `[{"name": .., "figma": .., "built": ..}]`
        manifest: PathBuf,
        /// Root under which `bulk_comparisons/<timestamp>/` is created
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Drop findings a reviewer marked `neglect`
    Filter {
        /// Report produced by `compare`
        result: PathBuf,
        /// `{"<id>": "neglect" | ..}`
        selections: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env().context("failed to load configuration")?;

    match cli.command {
        Command::Compare {
            reference,
            built,
            out,
            min_area,
            quality,
            report,
        } => {
            if let Some(min_area) = min_area {
                config.min_area = min_area;
            }
            if let Some(quality) = quality {
                config.jpeg_quality = quality;
            }

            let result: ComparisonResult = tokio::task::spawn_blocking(move || {
                compare_images(&reference, &built, &out, &config)
            })
            .await
            .context("comparison task panicked")?
            .context("comparison failed")?;

            emit(&result, report.as_deref()).await?;
        }
        Command::Bulk {
            manifest,
            out,
            report,
        } => {
            let screens = bulk::load_manifest(&manifest)?;
            let run = bulk::run_bulk(screens, &out, &config).await?;
            emit(&run, report.as_deref()).await?;
        }
        Command::Filter { result, selections } => {
            let result: ComparisonResult = read_json(&result).await?;
            let selections: IssueSelections = read_json(&selections).await?;
            let filtered = selection::filter_findings(&result.detected_differences, &selections);
            tracing::info!(
                "{} of {} finding(s) kept, {} neglected",
                filtered.total_filtered,
                filtered.total_original,
                filtered.neglected_count
            );
            emit(&filtered, None).await?;
        }
    }

    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

async fn emit<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    match path {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
