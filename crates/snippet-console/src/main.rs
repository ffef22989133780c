use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use shared::{
    parse_url_list, AiCapability, ChannelObserver, ClaudeClient, Config, HttpFetcher, Pipeline,
    PipelineConfig, ProgressEvent, ReportFormat, SnippetReport, Status,
};
use std::io::{self as stdio, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snippet-console")]
#[command(about = "Paste URLs, watch them being processed, get a snippet report")]
struct Args {
    /// Report path (defaults to SNIPPET_OUTPUT or ./Generated_Snippets.html)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for downloaded documents
    #[arg(long)]
    staging_dir: Option<PathBuf>,
}

/// URLs until the first empty line or end of input
fn read_urls() -> Result<Vec<String>> {
    println!("Paste URLs, one per line. Finish with an empty line:");

    let stdin = stdio::stdin();
    let mut text = String::new();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        if line.trim().is_empty() {
            break;
        }
        text.push_str(&line);
        text.push('\n');
    }

    Ok(parse_url_list(&text))
}

fn render(event: ProgressEvent) -> Result<()> {
    match event {
        ProgressEvent::Progress(percent) => {
            print!("\r[{:>3}%] ", percent);
            stdio::stdout().flush()?;
        }
        ProgressEvent::Log(line) => println!("\r{}", line),
        ProgressEvent::Transition { status, source, .. } => {
            if status == Status::Processed {
                println!("\r✓ {}", source);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(stdio::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(dir) = args.staging_dir {
        config.staging_dir = dir;
    }
    if let Some(path) = args.output {
        config.output_path = path;
    }

    let urls = read_urls()?;
    if urls.is_empty() {
        println!("Please enter at least one URL.");
        return Ok(());
    }

    let ai: Option<Arc<dyn AiCapability>> = match &config.anthropic_api_key {
        Some(key) => Some(Arc::new(ClaudeClient::new(key.clone(), config.model.clone())?)),
        None => None,
    };
    let pipeline = Pipeline::new(
        PipelineConfig::from(&config),
        Arc::new(HttpFetcher::new()?),
        ai,
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(async move {
        let observer = ChannelObserver::new(tx);
        pipeline.run(urls, &observer).await
    });

    // The sender is dropped when the worker finishes, closing the channel
    while let Some(event) = rx.recv().await {
        render(event)?;
    }
    println!();

    let batch = worker
        .await
        .context("Processing task panicked")?
        .context("Batch could not start")?;

    println!(
        "\n✓ {} processed, {} failed",
        batch.processed_count(),
        batch.failed_count()
    );
    for record in batch.failed() {
        println!("  ✗ {}: {}", record.source(), record.error_message());
    }

    let format = ReportFormat::from_path(&config.output_path);
    let content = SnippetReport::render(format, &batch.records, Local::now());
    match SnippetReport::save(&content, &config.output_path) {
        Ok(path) => println!("\n✅ Report saved to: {}", path.display()),
        Err(e) => println!("\n⚠ {}", e),
    }

    Ok(())
}
