use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use firds_core::{connect_store, inventory, Pipeline, PipelineConfig};
use firds_parser::{transform_with, IssuerScope, PairingPolicy, TransformOptions};
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch FIRDS reference data, flatten it to CSV and publish it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download, transform and publish using the environment configuration (default)
    Run,
    /// Convert a local FIRDS XML file to CSV
    Transform(TransformArgs),
    /// List the storage containers visible with the configured credentials
    Containers,
}

#[derive(Args, Debug)]
struct TransformArgs {
    xml: PathBuf,
    csv: PathBuf,
    /// Fail when instruments and issuers cannot all be paired
    #[arg(long)]
    strict: bool,
    /// Where each instrument's issuer is looked up (document or record)
    #[arg(long, default_value_t = IssuerScope::Document)]
    issuer_scope: IssuerScope,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();

    let outcome = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_pipeline().await,
        Command::Transform(args) => transform_file(args),
        Command::Containers => list_containers().await,
    };

    if let Err(err) = &outcome {
        error!(error = %format!("{err:#}"), "firds failed");
    }
    outcome
}

fn init_tracing() -> Result<()> {
    let writer = match std::env::var_os("FIRDS_LOG_FILE") {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("cannot open log file {}", PathBuf::from(&path).display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .json()
        .init();
    Ok(())
}

async fn run_pipeline() -> Result<()> {
    let config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    let store = connect_store(&config)
        .await
        .context("failed to set up the storage client")?;
    let pipeline = Pipeline::new(config, store)?;

    let summary = pipeline.run().await.context("pipeline run failed")?;
    info!(
        rows = summary.report.rows,
        unpaired = summary.report.unpaired,
        csv = %summary.csv.display(),
        container = %summary.container,
        key = %summary.object_key,
        "published instrument CSV"
    );
    Ok(())
}

fn transform_file(args: TransformArgs) -> Result<()> {
    let options = TransformOptions {
        pairing: if args.strict {
            PairingPolicy::Strict
        } else {
            PairingPolicy::Truncate
        },
        issuer_scope: args.issuer_scope,
    };

    let report = transform_with(&args.xml, &args.csv, &options).with_context(|| {
        format!(
            "failed to transform {} into {}",
            args.xml.display(),
            args.csv.display()
        )
    })?;
    info!(
        rows = report.rows,
        incomplete = report.incomplete_records,
        unpaired = report.unpaired,
        "transform finished"
    );
    Ok(())
}

async fn list_containers() -> Result<()> {
    let config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    let store = connect_store(&config)
        .await
        .context("failed to set up the storage client")?;
    let containers = inventory(store.as_ref()).await?;
    info!(count = containers.len(), "containers listed");
    Ok(())
}
