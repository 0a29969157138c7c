//! synd-history - inspect the delivery ledger

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use libsyndicate::{Config, Database};

#[derive(Parser)]
#[command(name = "synd-history")]
#[command(about = "Show crosspost delivery history for a content item", long_about = None)]
struct Cli {
    /// Content item id
    content_id: i64,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Config file path (overrides SYNDICATE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let db = Database::new(&config.database.path).await?;
    let records = db.list_deliveries(cli.content_id).await?;

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No delivery records for content {}", cli.content_id);
        return Ok(());
    }

    for record in records {
        let posted = record
            .posted_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "-".to_string());

        let detail = match record.status {
            libsyndicate::DeliveryStatus::Success => record
                .post_url
                .or(record.platform_post_id)
                .unwrap_or_else(|| "-".to_string()),
            _ => record
                .error_message
                .unwrap_or_else(|| "-".to_string()),
        };

        println!(
            "{:<10} {:<8} attempts: {:<3} posted: {:<17} {}",
            record.platform.to_string(),
            record.status.to_string(),
            record.retry_count,
            posted,
            detail
        );
    }

    Ok(())
}
