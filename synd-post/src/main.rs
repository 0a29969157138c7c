//! synd-post - publish a content item to its crosspost targets

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use libsyndicate::orchestrator::OrchestratorOptions;
use libsyndicate::{
    Config, CrosspostRequest, CrosspostResponse, Database, FileContentStore, Orchestrator,
    Platform, Result, SyndicateError, Vault,
};

#[derive(Parser, Debug)]
#[command(name = "synd-post")]
#[command(about = "Publish a content item to its crosspost targets", long_about = None)]
struct Cli {
    /// Path to the content item JSON document (single object or array)
    content: PathBuf,

    /// Content id to publish; may be omitted when the document holds
    /// exactly one item
    #[arg(long)]
    id: Option<i64>,

    /// Target specific platform(s) (comma-separated); defaults to all
    /// enabled crosspost targets
    #[arg(short, long)]
    platforms: Option<String>,

    /// Per-platform message override, repeatable (platform=text)
    #[arg(short, long = "message")]
    messages: Vec<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Config file path (overrides SYNDICATE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_writer(std::io::stderr)
            .init();
    }

    match run(cli).await {
        Ok(response) => {
            // Partial failure still reports the breakdown and exits 0;
            // only a run where every platform failed is an error exit.
            let all_failed =
                response.summary.total > 0 && response.summary.success == 0;
            std::process::exit(if all_failed { 1 } else { 0 });
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<CrosspostResponse> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let store = FileContentStore::new(&cli.content);
    let content_id = match cli.id {
        Some(id) => id,
        None => {
            let ids = store.item_ids()?;
            match ids.as_slice() {
                [only] => *only,
                [] => {
                    return Err(SyndicateError::InvalidInput(
                        "content document is empty".to_string(),
                    ))
                }
                _ => {
                    return Err(SyndicateError::InvalidInput(
                        "content document holds several items, pass --id".to_string(),
                    ))
                }
            }
        }
    };

    let platforms = cli
        .platforms
        .as_deref()
        .map(parse_platform_list)
        .transpose()?;
    let custom_messages = parse_messages(&cli.messages)?;

    let db = Database::new(&config.database.path).await?;
    let vault = Vault::new(&config.vault.resolve_secret()?);
    let options = OrchestratorOptions::from(&config.publish);

    let orchestrator = Orchestrator::new(db, vault, Arc::new(store), options);
    let response = orchestrator
        .crosspost(CrosspostRequest {
            content_id,
            platforms,
            custom_messages,
        })
        .await?;

    match cli.format.as_str() {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&response)
                .map_err(|e| SyndicateError::InvalidInput(e.to_string()))?
        ),
        _ => print_text(&response),
    }

    Ok(response)
}

fn parse_platform_list(raw: &str) -> Result<Vec<Platform>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Ok(Platform::from_str(s)?))
        .collect()
}

fn parse_messages(raw: &[String]) -> Result<HashMap<Platform, String>> {
    let mut messages = HashMap::new();
    for entry in raw {
        let Some((platform, text)) = entry.split_once('=') else {
            return Err(SyndicateError::InvalidInput(format!(
                "expected platform=text, got '{entry}'"
            )));
        };
        messages.insert(Platform::from_str(platform.trim())?, text.to_string());
    }
    Ok(messages)
}

fn print_text(response: &CrosspostResponse) {
    for (platform, outcome) in &response.results {
        if outcome.success && outcome.skipped {
            println!(
                "{platform}: already delivered ({})",
                outcome.platform_post_id.as_deref().unwrap_or("-")
            );
        } else if outcome.success {
            match &outcome.post_url {
                Some(url) => println!("{platform}: posted {url}"),
                None => println!(
                    "{platform}: posted ({})",
                    outcome.platform_post_id.as_deref().unwrap_or("-")
                ),
            }
        } else {
            println!(
                "{platform}: FAILED - {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!(
        "{} platform(s): {} succeeded, {} failed",
        response.summary.total, response.summary.success, response.summary.failed
    );
}
