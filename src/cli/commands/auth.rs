use clap::Subcommand;
use serde_json::json;
use std::io::{self, BufRead, Write};

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::session::Session;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the admin console")]
    Login {
        #[arg(help = "Admin email")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Keep the session across restarts")]
        remember: bool,
    },

    #[command(about = "Logout and clear stored credentials")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh authentication token")]
    Refresh,

    #[command(about = "Show current admin profile")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, session: &Session, output_format: OutputFormat) -> anyhow::Result<()> {
    let auth = session.auth();

    match cmd {
        AuthCommands::Login { email, password, remember } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password()?,
            };

            let user = auth.login_admin(&email, &password, remember).await?;
            output_success(
                &output_format,
                &format!("Logged in as {}", user.email.as_deref().unwrap_or(&email)),
                Some(json!({ "user": user, "remember": remember })),
            )
        }
        AuthCommands::Logout => {
            auth.logout_admin().await;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let tokens = session.tokens();
            let tenant = session.tenant().get();
            let expires_at = tokens
                .get_access_token()
                .and_then(|token| crate::session::refresh::token_expiry(&token));

            output_record(
                &output_format,
                &json!({
                    "authenticated": tokens.has_token(),
                    "remember": tokens.get_remember_me(),
                    "expires_at": expires_at,
                    "center": tenant.center_slug,
                    "tenant_resolved": tenant.is_resolved,
                }),
            )
        }
        AuthCommands::Refresh => {
            auth.refresh_admin_session().await?;
            output_success(&output_format, "Token refreshed", None)
        }
        AuthCommands::Whoami => match auth.fetch_admin_profile().await? {
            Some(user) => output_record(&output_format, &serde_json::to_value(&user)?),
            None => output_error(&output_format, "Not logged in", Some("NOT_AUTHENTICATED")),
        },
    }
}

fn prompt_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}
