//! synd-creds - platform credential administration
//!
//! Stores, rotates, and inspects the per-platform API credentials the
//! orchestrator publishes with. Tokens are encrypted through the vault
//! before they reach the database and only ever displayed masked.

use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use libsyndicate::{Config, Database, Platform, PlatformCredential, Vault};

#[derive(Parser)]
#[command(name = "synd-creds")]
#[command(about = "Manage platform credentials for crossposting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (overrides SYNDICATE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store or rotate the credential for a platform
    Set {
        /// Platform name (instagram, twitter, facebook, discord)
        platform: String,

        /// Access token; prompted for when omitted
        #[arg(long)]
        token: Option<String>,

        /// Read the access token from stdin (for automation)
        #[arg(long)]
        stdin: bool,

        /// Optional refresh token
        #[arg(long)]
        refresh_token: Option<String>,

        /// Platform-specific configuration as a JSON document
        /// (e.g. '{"webhook_url": "..."}' for discord)
        #[arg(long)]
        config_json: Option<String>,

        /// Token expiry as a unix timestamp
        #[arg(long)]
        expires_at: Option<i64>,
    },

    /// List stored credentials (without token values)
    List,

    /// Show one credential with its token masked
    Show {
        /// Platform name
        platform: String,
    },

    /// Delete the credential for a platform
    Remove {
        /// Platform name
        platform: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Mark a credential active
    Enable {
        /// Platform name
        platform: String,
    },

    /// Mark a credential inactive without deleting it
    Disable {
        /// Platform name
        platform: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let db = Database::new(&config.database.path).await?;
    let vault = Vault::new(&config.vault.resolve_secret()?);

    match cli.command {
        Commands::Set {
            platform,
            token,
            stdin,
            refresh_token,
            config_json,
            expires_at,
        } => set(&db, &vault, &platform, token, stdin, refresh_token, config_json, expires_at).await,
        Commands::List => list(&db).await,
        Commands::Show { platform } => show(&db, &vault, &platform).await,
        Commands::Remove { platform, force } => remove(&db, &platform, force).await,
        Commands::Enable { platform } => set_active(&db, &platform, true).await,
        Commands::Disable { platform } => set_active(&db, &platform, false).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn set(
    db: &Database,
    vault: &Vault,
    platform: &str,
    token: Option<String>,
    stdin: bool,
    refresh_token: Option<String>,
    config_json: Option<String>,
    expires_at: Option<i64>,
) -> Result<()> {
    let platform = Platform::from_str(platform)?;

    let token = match token {
        Some(token) => token,
        None if stdin => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read token from stdin")?;
            buffer.trim().to_string()
        }
        None => rpassword::prompt_password(format!("Access token for {platform}: "))
            .context("failed to read token")?,
    };

    if token.is_empty() {
        bail!("access token must not be empty");
    }

    // Syntactic check only; the publisher decodes the typed form.
    if let Some(raw) = &config_json {
        serde_json::from_str::<serde_json::Value>(raw)
            .context("--config-json is not valid JSON")?;
    }

    let credential = PlatformCredential {
        platform,
        is_active: true,
        access_token: vault.encrypt(&token)?,
        refresh_token: refresh_token.map(|t| vault.encrypt(&t)).transpose()?,
        config: config_json,
        token_expires_at: expires_at,
        last_used_at: None,
    };

    db.upsert_credential(&credential).await?;
    println!("Stored credential for {platform}");
    Ok(())
}

async fn list(db: &Database) -> Result<()> {
    let credentials = db.list_credentials().await?;
    if credentials.is_empty() {
        println!("No credentials stored");
        return Ok(());
    }

    for credential in credentials {
        let state = if credential.is_active { "active" } else { "disabled" };
        let last_used = credential
            .last_used_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<10} {:<9} refresh: {:<3} last used: {}",
            credential.platform.to_string(),
            state,
            if credential.refresh_token.is_some() { "yes" } else { "no" },
            last_used
        );
    }
    Ok(())
}

async fn show(db: &Database, vault: &Vault, platform: &str) -> Result<()> {
    let platform = Platform::from_str(platform)?;
    let Some(credential) = db.get_credential(platform).await? else {
        bail!("no credential stored for {platform}");
    };

    let token = vault.decrypt(&credential.access_token)?;
    println!("platform:     {platform}");
    println!("active:       {}", credential.is_active);
    println!("access token: {}", Vault::mask(&token, 4));
    if let Some(config) = &credential.config {
        println!("config:       {config}");
    }
    if let Some(expires) = credential.token_expires_at {
        println!("expires at:   {expires}");
    }
    Ok(())
}

async fn remove(db: &Database, platform: &str, force: bool) -> Result<()> {
    let platform = Platform::from_str(platform)?;

    if !force {
        eprint!("Delete credential for {platform}? [y/N] ");
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    if db.delete_credential(platform).await? {
        println!("Deleted credential for {platform}");
    } else {
        println!("No credential stored for {platform}");
    }
    Ok(())
}

async fn set_active(db: &Database, platform: &str, active: bool) -> Result<()> {
    let platform = Platform::from_str(platform)?;

    if db.set_credential_active(platform, active).await? {
        println!(
            "Credential for {platform} is now {}",
            if active { "active" } else { "disabled" }
        );
        Ok(())
    } else {
        bail!("no credential stored for {platform}");
    }
}
