//! # Service Token Issuer CLI
//!
//! Issues a service token for a worker deployment using the configured
//! signing key, and prints it to stdout.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use provisioning_core::auth::{ServicePermission, ServiceTokenIssuer, ServiceType};
use provisioning_core::config::ConfigManager;
use provisioning_core::constants::MAX_TOKEN_TTL_SECONDS;

#[derive(Parser)]
#[command(name = "issue-service-token")]
#[command(about = "Issue a scoped service token for a worker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Worker identity recorded as the token subject
    #[arg(long)]
    service_id: String,

    /// provisioning_worker or billing_worker
    #[arg(long)]
    service_type: ServiceType,

    /// Permission to grant, repeatable (e.g. tasks:update)
    #[arg(long = "permission", required = true)]
    permissions: Vec<String>,

    /// Token lifetime; defaults to auth.token_ttl_seconds
    #[arg(long)]
    ttl_seconds: Option<u64>,

    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    #[arg(short, long)]
    environment: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let environment = cli
        .environment
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir, &environment)
        .context("failed to load configuration")?;

    let issuer = ServiceTokenIssuer::from_config(&manager.config().auth)?;
    if !issuer.is_enabled() {
        bail!("service token authentication is disabled in the {environment} environment");
    }

    let permissions = cli
        .permissions
        .iter()
        .map(|raw| {
            ServicePermission::from_str_opt(raw).ok_or_else(|| anyhow!("unknown permission '{raw}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    let token = match cli.ttl_seconds {
        Some(ttl) => {
            let ttl = i64::try_from(ttl.min(MAX_TOKEN_TTL_SECONDS))?;
            issuer.generate_service_token_with_ttl(
                &cli.service_id,
                cli.service_type,
                &permissions,
                chrono::Duration::seconds(ttl),
            )?
        }
        None => issuer.generate_service_token(&cli.service_id, cli.service_type, &permissions)?,
    };

    println!("{token}");
    Ok(())
}
