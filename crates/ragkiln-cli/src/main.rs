//! `ragkiln`: loads configuration, builds the rate-limited LLM/embedding
//! clients and the Postgres pool once, drives the crawler contract, and runs
//! the orchestrator to completion.

mod cli;
mod pages;
mod report_table;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ragkiln_core::StaticCrawler;
use ragkiln_llm::{EmbeddingClient, LlmClient, OpenAiChatProvider, OpenAiEmbeddingProvider, RetryConfig};
use ragkiln_pipeline::{ExtractorConfig, MergeThresholds, Orchestrator, OrchestratorConfig};
use ragkiln_store::{PgDocumentStore, PoolSettings};
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands, ConfigFormat, ReportFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ragkiln_config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let filter = cli.log_filter.clone().unwrap_or_else(|| config.logging.filter.clone());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Config { format } => print_config(&config, format),
        Commands::Ingest {
            pages,
            start_url,
            max_pages,
            format,
            no_progress,
        } => run_ingest(config, &pages, start_url, max_pages, format, no_progress).await,
    }
}

fn print_config(config: &ragkiln_config::RagkilnConfig, format: ConfigFormat) -> Result<()> {
    let text = match format {
        ConfigFormat::Toml => toml::to_string_pretty(config).context("failed to render config as TOML")?,
        ConfigFormat::Json => serde_json::to_string_pretty(config).context("failed to render config as JSON")?,
    };
    println!("{text}");
    Ok(())
}

async fn run_ingest(
    config: ragkiln_config::RagkilnConfig,
    pages_path: &Path,
    start_url_override: Option<String>,
    max_pages_override: Option<usize>,
    format: ReportFormat,
    no_progress: bool,
) -> Result<()> {
    let pages = pages::load_pages(pages_path)?;
    let page_count = pages.len();
    let crawler = StaticCrawler::new(pages, std::env::temp_dir().join("ragkiln"));

    // Constructed once and shared for the lifetime of the run:
    // the rate limiters each client owns internally, and the connection
    // pool, never get rebuilt mid-invocation.
    let http = reqwest::Client::new();
    let api_key = std::env::var("RAGKILN_API_KEY").unwrap_or_default();

    let llm_provider = OpenAiChatProvider::new(
        http.clone(),
        config.llm.base_url.clone(),
        api_key.clone(),
        config.llm.model.clone(),
    );
    let llm_client = LlmClient::new(
        llm_provider,
        Duration::from_secs_f64(config.llm.rate_delay_s),
        RetryConfig {
            max_attempts: config.llm.max_retries,
            base_delay: Duration::from_secs_f64(config.llm.retry_base_delay_s),
            ..RetryConfig::default()
        },
    );

    let embedding_provider = OpenAiEmbeddingProvider::new(
        http,
        config.embedding.base_url.clone(),
        api_key,
        config.embedding.model.clone(),
    );
    let embedding_client = EmbeddingClient::new(
        embedding_provider,
        Duration::from_secs_f64(config.embedding.rate_delay_s),
        RetryConfig {
            max_attempts: config.embedding.max_retries,
            base_delay: Duration::from_secs_f64(config.embedding.retry_base_delay_s),
            ..RetryConfig::default()
        },
    );

    let pool_settings = PoolSettings {
        dsn: config.db.dsn.clone(),
        min_connections: config.db.pool_min,
        max_connections: config.db.pool_max,
        acquire_timeout: Duration::from_secs(config.db.pool_acquire_timeout_s),
    };
    let store = PgDocumentStore::connect(&pool_settings)
        .await
        .context("failed to connect to the document store")?;
    store.migrate().await.context("failed to run store migrations")?;

    let orchestrator_config = OrchestratorConfig {
        start_url: start_url_override.unwrap_or(config.crawl.start_url),
        max_pages: max_pages_override.unwrap_or(config.crawl.max_pages),
        extractor: ExtractorConfig {
            max_prefix_chars: config.extractor.max_prefix_chars,
            skip_patterns: config.extractor.skip_patterns,
            dedup_title_ratio: config.extractor.dedup_title_ratio,
        },
        chunker: ragkiln_chunker::ChunkerConfig {
            max_tokens: config.chunker.max_tokens,
        },
        thresholds: MergeThresholds {
            high: config.merge.threshold_high,
            low: config.merge.threshold_low,
        },
        llm_concurrency: config.parallel.llm_concurrency,
    };

    let spinner = (!no_progress).then(|| {
        let bar = ProgressBar::new(page_count as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} ingesting {pos}/{len} pages")
                .expect("static template is valid"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    });

    let orchestrator = Orchestrator::new(&crawler, &store, &llm_client, &embedding_client, orchestrator_config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Table => println!("{}", report_table::render(&report)),
    }

    std::process::exit(report.exit_code());
}
