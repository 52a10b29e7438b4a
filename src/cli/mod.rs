pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::session::Session;

#[derive(Parser)]
#[command(name = "console")]
#[command(about = "Admin console session client - tenant resolution and admin authentication")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Host the console is served from (defaults to the admin host)")]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Admin authentication and token management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Host classification and tenant resolution")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// `admin.<domain>` when a domain is configured, else local dev
pub fn default_host(config: &AppConfig) -> String {
    match &config.tenant.app_domain {
        Some(domain) => format!("admin.{}", domain.trim_start_matches("www.")),
        None => "localhost".to_string(),
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let session = Session::connect()?;
    let host = cli.host.unwrap_or_else(|| default_host(session.config()));

    match cli.command {
        Commands::Auth { cmd } => {
            session.bootstrap(&host).await;
            commands::auth::handle(cmd, &session, output_format).await
        }
        Commands::Tenant { cmd } => commands::tenant::handle(cmd, &session, &host, output_format).await,
    }
}
