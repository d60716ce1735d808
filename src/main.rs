use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use crash_triage::config::get_config;
use crash_triage::fetch::HttpTransport;
use crash_triage::logging::init_logging;
use crash_triage::pipeline::{Pipeline, PipelineOptions};
use crash_triage::query::Restriction;
use crash_triage::render::{print_report, ConsoleStatus, TerminalRenderer};

#[derive(Parser)]
#[command(name = "crash-triage")]
#[command(about = "Triage shutdown-hang crash reports by annotation signature")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent days and print the per-signature triage report
    Report {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Show only the top N signatures
        #[arg(long)]
        limit: Option<usize>,
        /// How many days to cover, newest first
        #[arg(long)]
        days_back: Option<u32>,
        /// Per-day sample cap requested from the server
        #[arg(long)]
        sample_size: Option<usize>,
        /// Restrict the search to a "product version" pair (repeatable)
        #[arg(long = "version")]
        versions: Vec<String>,
        /// Restrict to annotations containing text, as ~text (repeatable)
        #[arg(long = "signature")]
        signatures: Vec<String>,
        /// Drop a "product version" pair client-side (repeatable)
        #[arg(long = "reject")]
        rejects: Vec<String>,
        /// Search endpoint to query
        #[arg(long)]
        endpoint: Option<String>,
        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Report {
        json: false,
        limit: None,
        days_back: None,
        sample_size: None,
        versions: Vec::new(),
        signatures: Vec::new(),
        rejects: Vec::new(),
        endpoint: None,
        quiet: false,
    }) {
        Commands::Report {
            json,
            limit,
            days_back,
            sample_size,
            versions,
            signatures,
            rejects,
            endpoint,
            quiet,
        } => {
            let config = get_config();
            let quiet = quiet || json;

            let options = PipelineOptions {
                days_back: days_back.unwrap_or(config.query.days_back),
                sample_size: sample_size.unwrap_or(config.query.sample_size),
                link_cap: config.display.links_per_day,
                endpoint: endpoint.unwrap_or_else(|| config.query.endpoint.clone()),
                report_base_url: config.display.report_base_url.clone(),
                initial_delay: Duration::from_millis(config.fetch.initial_delay_ms),
                max_attempts: config.fetch.max_attempts,
                debounce: Duration::from_millis(config.display.debounce_ms),
                restrict: Restriction {
                    versions,
                    signatures,
                },
            };

            let pipeline = Pipeline::new(
                options,
                Arc::new(HttpTransport::new()),
                Arc::new(ConsoleStatus::new(quiet)),
                Arc::new(TerminalRenderer::new(quiet)),
            );

            for pair in &rejects {
                let mut parts = pair.splitn(2, ' ');
                let product = parts.next().unwrap_or("");
                let version = parts.next().unwrap_or("");
                if let Err(e) = pipeline.seed_filter(product, version, false).await {
                    return handle_error(e, json);
                }
            }

            match pipeline.run().await {
                Ok(views) => {
                    if json {
                        let shown = limit.unwrap_or(views.len()).min(views.len());
                        println!("{}", serde_json::to_string_pretty(&views[..shown])?);
                    } else {
                        print_report(&views, limit);
                    }
                    Ok(())
                }
                Err(e) => handle_error(e, json),
            }
        }
    }
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{{\"error\": \"{}\"}}", e);
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
