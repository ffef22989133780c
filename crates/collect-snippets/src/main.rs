use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use shared::{
    read_url_file, save_records_json, AiCapability, ClaudeClient, Config, HttpFetcher, Pipeline,
    PipelineConfig, ReportFormat, SnippetReport, TracingObserver,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "collect-snippets")]
#[command(about = "Summarize web pages, videos and PDFs into a snippet report")]
struct Args {
    /// URLs to process, in order
    urls: Vec<String>,

    /// Read URLs from a file, one per line
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Report path (defaults to SNIPPET_OUTPUT or ./Generated_Snippets.html)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for downloaded documents
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Report format: html or org (defaults to the output file extension)
    #[arg(long)]
    format: Option<String>,

    /// Also write every record, failures included, as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,shared=info,collect_snippets=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let mut config = Config::from_env()?;

    if let Some(dir) = args.staging_dir {
        config.staging_dir = dir;
    }
    if let Some(path) = args.output {
        config.output_path = path;
    }

    let format = match args.format {
        Some(name) => name.parse::<ReportFormat>().map_err(anyhow::Error::msg)?,
        None => ReportFormat::from_path(&config.output_path),
    };

    let mut urls = args.urls;
    if let Some(file) = &args.file {
        urls.extend(read_url_file(file)?);
    }

    if urls.is_empty() {
        println!("No URLs given. Pass them as arguments or with --file.");
        return Ok(());
    }

    println!("📚 {} URLs to process", urls.len());
    println!("📁 Staging directory: {}", config.staging_dir.display());

    let ai: Option<Arc<dyn AiCapability>> = match &config.anthropic_api_key {
        Some(key) => Some(Arc::new(ClaudeClient::new(key.clone(), config.model.clone())?)),
        None => {
            println!("⚠ ANTHROPIC_API_KEY not set; summaries will use local fallbacks.");
            None
        }
    };

    let fetcher = Arc::new(HttpFetcher::new()?);
    let pipeline = Pipeline::new(PipelineConfig::from(&config), fetcher, ai);

    println!("\n🤖 Processing...");
    let batch = pipeline
        .run(urls, &TracingObserver)
        .await
        .context("Batch could not start")?;

    println!(
        "✓ Processed {}/{} sources",
        batch.processed_count(),
        batch.records.len()
    );
    if batch.failed_count() > 0 {
        println!("\n⚠ Failed to process {} sources:", batch.failed_count());
        for record in batch.failed() {
            println!("  ✗ {}", record.source());
            println!("    {}", record.error_message());
        }
    }

    if let Some(json_path) = &args.json {
        let saved = save_records_json(&batch, json_path)?;
        println!("\n💾 Records saved to: {}", saved.display());
    }

    println!("\n📝 Writing {} report...", format);
    let content = SnippetReport::render(format, &batch.records, Local::now());
    let saved = SnippetReport::save(&content, &config.output_path)?;

    println!("\n✅ Report saved to: {}", saved.display());

    Ok(())
}
