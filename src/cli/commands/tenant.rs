use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::host::{classify, route_prefix};
use crate::session::Session;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Classify a hostname without any network call")]
    Classify {
        #[arg(help = "Host header value, e.g. acme.example.com:443")]
        host: String,
    },

    #[command(about = "Look up a center by slug on the resolution endpoint")]
    Resolve {
        #[arg(help = "Center slug")]
        slug: String,
    },

    #[command(about = "Bootstrap the session for --host and show the tenant state")]
    Current,
}

pub async fn handle(
    cmd: TenantCommands,
    session: &Session,
    host: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::Classify { host } => {
            let kind = classify(&host, session.config().tenant.app_domain.as_deref());
            output_record(
                &output_format,
                &json!({
                    "host": host,
                    "kind": kind.label(),
                    "slug": kind.center_slug(),
                    "route": route_prefix(&kind),
                }),
            )
        }
        TenantCommands::Resolve { slug } => match session.resolver().resolve_center(&slug).await? {
            Some(center) => output_record(&output_format, &serde_json::to_value(&center)?),
            None => output_error(&output_format, &format!("No center found for '{}'", slug), Some("NOT_FOUND")),
        },
        TenantCommands::Current => {
            let outcome = session.bootstrap(host).await;
            output_record(&output_format, &serde_json::to_value(&outcome)?)
        }
    }
}

