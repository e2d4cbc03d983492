//! Auth command - authentication management.

use std::io::Write;

use anyhow::{Context as _, Result, bail};
use bbkt_client::{Authenticator, BitbucketClient, User};
use bbkt_config::{
    AuthKind, ConfigError, CredentialRecord, CredentialStore, DEFAULT_PROFILE, EnvOverrides,
};
use bbkt_oauth::oauth::{
    build_authorization_url, exchange_code_for_tokens, generate_state, parse_callback_code,
};
use bbkt_oauth::{OAuthConfig, record_from_tokens};
use chrono::Utc;
use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;

use super::Context;
use crate::session::{self, Credentials};

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Store credentials for Bitbucket Cloud (API token by default)
    Login {
        /// Authenticate with an OAuth consumer instead of an API token
        #[arg(long)]
        oauth: bool,

        /// Profile name to save the credentials under
        #[arg(long)]
        name: Option<String>,
    },

    /// Show which credentials would be used and their state
    Status,

    /// Remove all stored credentials
    Logout,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { oauth, name } => {
            let name = name
                .or_else(|| ctx.profile.clone())
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
            if oauth {
                cmd_login_oauth(&name, ctx).await
            } else {
                cmd_login_api_token(&name, ctx).await
            }
        }
        AuthCommand::Status => cmd_status(ctx).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Login
// ─────────────────────────────────────────────────────────────────────────────

async fn cmd_login_api_token(name: &str, ctx: &Context) -> Result<()> {
    let file = ctx.store()?;

    println!("{}", style("Atlassian API Token Authentication (Basic Auth)").bold());
    println!();
    println!("Create an API token at:");
    println!("  https://id.atlassian.com/manage-profile/security/api-tokens");
    println!();
    println!("Recommended scopes:");
    println!("  read:workspace, read:account, read:user, read:repository:bitbucket,");
    println!("  write:repository:bitbucket, read:pullrequest:bitbucket,");
    println!("  write:pullrequest:bitbucket, read:pipeline:bitbucket,");
    println!("  write:pipeline:bitbucket");
    println!();
    println!("Operations are hidden when the token lacks their scope. To hide one");
    println!("regardless of scopes, list it in BITBUCKET_DISABLED_TOOLS.");
    println!();

    let email = prompt("Atlassian email: ")?;
    if email.is_empty() {
        bail!("email is required");
    }

    let token = rpassword::prompt_password("API token: ").context("Failed to read API token")?;
    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("API token is required");
    }

    println!();
    println!("Verifying credentials...");
    let client = BitbucketClient::new(Authenticator::basic(&email, &token))?;

    let scopes = match client.get_with_scopes("user").await {
        Ok((body, scopes)) => {
            if let Ok(user) = serde_json::from_value::<User>(body) {
                println!("Authenticated as: {}", style(display_name(&user)).cyan());
            }
            scopes.unwrap_or_default()
        }
        Err(e) if e.is_forbidden() => {
            println!(
                "Token verified (403 on /user: the token is valid but lacks account scopes)."
            );
            Vec::new()
        }
        Err(e) => {
            bail!(
                "credential verification failed: {}\n\nCheck that your email and API token are correct",
                e
            );
        }
    };

    let workspaces = client.workspaces().accessible_slugs().await;

    let record = CredentialRecord::new(
        name,
        AuthKind::ApiToken {
            email,
            api_token: token,
            scopes: scopes.join(" "),
        },
    )
    .with_workspaces(workspaces);

    save_login(&file, record)
}

async fn cmd_login_oauth(name: &str, ctx: &Context) -> Result<()> {
    let file = ctx.store()?;
    let env = EnvOverrides::from_env();

    let (Some(client_id), Some(client_secret)) = (env.oauth_client_id, env.oauth_client_secret)
    else {
        eprintln!("OAuth consumer credentials required. Set:");
        eprintln!("  {}", bbkt_config::env::OAUTH_CLIENT_ID_ENV);
        eprintln!("  {}", bbkt_config::env::OAUTH_CLIENT_SECRET_ENV);
        eprintln!();
        eprintln!("Create an OAuth consumer at:");
        eprintln!("  Bitbucket > Workspace settings > OAuth consumers > Add consumer");
        eprintln!("  Callback URL: http://localhost:<any-port>/callback");
        eprintln!("  Scopes: repository, repository:write, pullrequest, pullrequest:write,");
        eprintln!("          pipeline, pipeline:write, account");
        bail!("missing OAuth consumer credentials");
    };

    let config = OAuthConfig::bitbucket(client_id, client_secret);
    let state = generate_state();
    let auth_url = build_authorization_url(&config, &state);

    println!("{}", style("Bitbucket OAuth 2.0 Authentication").bold());
    println!();
    println!("Open this URL in your browser:");
    println!();
    println!("  {}", auth_url);
    println!();
    println!("After approving access you are redirected to your callback URL.");
    println!("Paste the full callback URL (or just the code) here:");
    println!();

    // Try to open the browser automatically
    if open_url(&auth_url).is_err() {
        println!("(Could not open browser automatically)");
        println!();
    }

    let input = prompt("code> ")?;
    if input.is_empty() {
        println!("No input provided, aborting.");
        return Ok(());
    }

    let code = parse_callback_code(&input, Some(&state))?;

    println!("Exchanging code for tokens...");
    let tokens = exchange_code_for_tokens(&config, &code)
        .await
        .context("Token exchange failed")?;

    let record = record_from_tokens(name, &config, tokens, Utc::now());
    let client = BitbucketClient::new(Authenticator::from_record(&record))?;
    let workspaces = client.workspaces().accessible_slugs().await;

    save_login(&file, record.with_workspaces(workspaces))
}

fn save_login(file: &CredentialStore, record: CredentialRecord) -> Result<()> {
    let name = record.profile_name.clone();
    let workspaces = record.accessible_workspaces.len();
    let store = file.save_profile(record)?;

    println!();
    println!("Credentials saved as profile '{}'", style(&name).green());
    println!("  File:       {}", file.path().display());
    println!("  Workspaces: {}", workspaces);
    if store.active_profile == name {
        println!("  This is the default profile.");
    } else {
        println!(
            "  Default profile is '{}'. Switch with: bbkt profile use {}",
            store.active_profile, name
        );
    }
    Ok(())
}

fn display_name(user: &User) -> &str {
    if user.display_name.is_empty() {
        &user.nickname
    } else {
        &user.display_name
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusOutput {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<ProfileStatus>,
}

#[derive(Serialize)]
struct ProfileStatus {
    name: String,
    resolved_from: String,
    auth_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    token: String,
    scopes: Vec<String>,
    created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
    expired: bool,
    workspaces: Vec<String>,
    file: String,
}

async fn cmd_status(ctx: &Context) -> Result<()> {
    let env = EnvOverrides::from_env();

    let credentials = match session::resolve(&env, ctx.profile.as_deref()) {
        Ok(credentials) => credentials,
        Err(e)
            if e.downcast_ref::<ConfigError>()
                .is_some_and(ConfigError::is_auth_required) =>
        {
            if ctx.json_output {
                let output = StatusOutput {
                    authenticated: false,
                    source: None,
                    profile: None,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Not authenticated. Run: bbkt auth login");
            }
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    match credentials {
        Credentials::Environment(creds) => {
            if ctx.json_output {
                let output = StatusOutput {
                    authenticated: true,
                    source: Some(creds.source().to_string()),
                    profile: None,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Authenticated via {} (environment)", creds.source());
                println!("  Stored profiles are ignored while these variables are set.");
            }
        }
        Credentials::Stored { file, resolved, .. } => {
            let record = &resolved.record;
            let status = ProfileStatus {
                name: record.profile_name.clone(),
                resolved_from: resolved.resolved_from.to_string(),
                auth_type: record.kind_label().to_string(),
                email: record.email().map(str::to_string),
                token: record.masked_secret(),
                scopes: record.granted_scopes(),
                created_at: record.created_at.to_rfc3339(),
                expires_at: record.expires_at().map(|t| t.to_rfc3339()),
                expired: record.is_expired(),
                workspaces: record.accessible_workspaces.clone(),
                file: file.path().display().to_string(),
            };

            if ctx.json_output {
                let output = StatusOutput {
                    authenticated: true,
                    source: Some("profile".to_string()),
                    profile: Some(status),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_profile_status(&status, record.is_oauth(), ctx.verbose);
            }
        }
    }

    Ok(())
}

fn print_profile_status(status: &ProfileStatus, oauth: bool, verbose: bool) {
    println!("Authenticated via {}", status.auth_type);
    println!("  Profile:  {} ({})", style(&status.name).cyan(), status.resolved_from);
    if let Some(email) = &status.email {
        println!("  Email:    {}", email);
    }
    println!("  Token:    {}", status.token);
    if !status.scopes.is_empty() {
        println!("  Scopes:   {}", status.scopes.join(" "));
    }
    println!("  Stored:   {}", status.created_at);
    if oauth {
        if status.expired {
            println!("  Status:   {}", style("expired (will auto-refresh)").yellow());
        } else {
            println!("  Status:   {}", style("valid").green());
        }
        if verbose && let Some(expires_at) = &status.expires_at {
            println!("  Expires:  {}", expires_at);
        }
    }
    if !status.workspaces.is_empty() {
        println!("  Workspaces: {}", status.workspaces.join(", "));
    }
    println!("  File:     {}", status.file);
}

// ─────────────────────────────────────────────────────────────────────────────
// Logout
// ─────────────────────────────────────────────────────────────────────────────

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let file = ctx.store()?;

    if file.remove()? {
        println!("Logged out. Credentials removed.");
    } else {
        println!("No stored credentials found.");
    }

    Ok(())
}

/// Try to open a URL in the default browser.
fn open_url(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).status()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).status()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .status()?;
    }
    Ok(())
}
