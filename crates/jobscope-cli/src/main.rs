use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobscope_client::{CsvSink, ReqwestFetcher};
use jobscope_core::discovery;
use jobscope_core::pages;
use jobscope_core::{PersistPolicy, Pipeline, PipelineConfig, Politeness, TracingReporter};

#[derive(Parser)]
#[command(name = "jobscope", version, about = "Career statistics crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover job names, crawl their salary and trends pages, export CSV
    Crawl {
        /// CSV file to write (truncated if it exists)
        #[arg(short, long, env = "JOBSCOPE_OUTPUT", default_value = "jobscope.csv")]
        output: PathBuf,

        /// Maximum in-flight requests per stage
        #[arg(short, long, env = "JOBSCOPE_CONCURRENCY", default_value_t = 2)]
        concurrency: usize,

        /// Minimum delay between requests to the same host, in milliseconds
        #[arg(long, env = "JOBSCOPE_DELAY_MS", default_value_t = 500)]
        delay: u64,

        /// Per-request timeout, in milliseconds
        #[arg(long, env = "JOBSCOPE_TIMEOUT_MS", default_value_t = 20_000)]
        timeout: u64,

        /// Crawl only the first N discovered names
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep exporting when a row cannot be written
        #[arg(long, default_value_t = false)]
        keep_going: bool,

        /// Print the run summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Region prefix used in detail-page URLs
        #[arg(long, env = "JOBSCOPE_REGION", default_value = pages::DEFAULT_REGION)]
        region: String,

        #[arg(long, default_value = pages::DIRECTORY_URL)]
        directory_url: String,

        /// Salary page URL template with a {key} placeholder
        #[arg(long, default_value = pages::SALARY_URL_TEMPLATE)]
        salary_url: String,

        /// Trends page URL template with a {key} placeholder
        #[arg(long, default_value = pages::TRENDS_URL_TEMPLATE)]
        trends_url: String,
    },

    /// List the job names on the directory page
    Discover {
        #[arg(long, default_value = pages::DIRECTORY_URL)]
        directory_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobscope=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            output,
            concurrency,
            delay,
            timeout,
            limit,
            keep_going,
            json,
            region,
            directory_url,
            salary_url,
            trends_url,
        } => {
            let timeout = Duration::from_millis(timeout);
            let config = PipelineConfig {
                directory_url,
                region,
                salary_url,
                trends_url,
                politeness: Politeness::new(concurrency, Duration::from_millis(delay)),
                fetch_timeout: timeout,
                limit,
                persist_policy: if keep_going {
                    PersistPolicy::BestEffort
                } else {
                    PersistPolicy::FailFast
                },
            };
            cmd_crawl(&output, config, json).await?;
        }
        Commands::Discover { directory_url } => {
            cmd_discover(&directory_url).await?;
        }
    }

    Ok(())
}

/// Cancel `token` on Ctrl-C so rows already written are kept.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current rows");
            token.cancel();
        }
    });
}

async fn cmd_crawl(output: &Path, config: PipelineConfig, json: bool) -> Result<()> {
    // Opening the sink truncates the output file.
    config.validate().context("Invalid configuration")?;

    let fetcher =
        ReqwestFetcher::with_timeout(config.fetch_timeout).context("Failed to create HTTP client")?;
    let sink = CsvSink::create(output)
        .with_context(|| format!("Failed to open output file: {}", output.display()))?;

    let mut pipeline = Pipeline::new(fetcher, sink, config).context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let summary = pipeline.run(&cancel, &TracingReporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!(
        "{} discovered, {} exported, {} skipped, {} stage failures, {} persist failures{}",
        summary.discovered,
        summary.exported,
        summary.skipped,
        summary.stage_failures,
        summary.persist_failures,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    println!("Wrote {}", output.display());

    Ok(())
}

async fn cmd_discover(directory_url: &str) -> Result<()> {
    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    let selector = pages::directory_names()?;

    let names = discovery::discover(&fetcher, directory_url, &selector).await?;
    for name in &names {
        println!("{name}");
    }
    tracing::info!("{} names", names.len());

    Ok(())
}
