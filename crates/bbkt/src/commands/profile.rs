//! Profile command - credential profile management.

use anyhow::{Context as _, Result};
use bbkt_client::{Authenticator, BitbucketClient, ClientBuilder};
use bbkt_config::{ConfigError, CredentialStore, ProfileStore, local_repo, resolve_profile};
use bbkt_oauth::{OAuthRefresher, TokenEndpoint};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;

use super::Context;

/// Arguments for the profile command.
#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// List stored profiles
    List,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Re-fetch the workspaces a profile can access
    RefreshWorkspaces {
        /// Profile name (defaults to the resolved profile)
        name: Option<String>,
    },
}

/// Run the profile command.
pub async fn run(args: ProfileArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ProfileCommand::List => cmd_list(ctx).await,
        ProfileCommand::Use { name } => cmd_use(&name, ctx).await,
        ProfileCommand::RefreshWorkspaces { name } => cmd_refresh_workspaces(name, ctx).await,
    }
}

#[derive(Serialize)]
struct ProfileEntry<'a> {
    name: &'a str,
    default: bool,
    repo_match: bool,
    auth_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    workspaces: &'a [String],
}

async fn cmd_list(ctx: &Context) -> Result<()> {
    let store = ctx.store()?.load_or_default()?;
    let repo_workspace = local_repo().ok().map(|r| r.workspace);

    let entries: Vec<ProfileEntry> = store
        .profile_names()
        .into_iter()
        .filter_map(|name| store.get(name).map(|record| (name, record)))
        .map(|(name, record)| ProfileEntry {
            name,
            default: name == store.active_profile,
            repo_match: repo_workspace
                .as_deref()
                .is_some_and(|ws| record.serves_workspace(ws)),
            auth_type: if record.is_oauth() { "oauth" } else { "api_token" },
            email: record.email(),
            workspaces: &record.accessible_workspaces,
        })
        .collect();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No profiles found.");
        println!();
        println!("Create one with:");
        println!("  bbkt auth login --name work");
        return Ok(());
    }

    println!("DEFAULT   NAME            TYPE       WORKSPACES");
    for entry in &entries {
        let marker = if entry.default { "*" } else { " " };
        let repo = if entry.repo_match {
            format!(" {}", style("[repo]").cyan())
        } else {
            String::new()
        };
        println!(
            "{}         {:<15} {:<10} {}{}",
            marker,
            entry.name,
            entry.auth_type,
            entry.workspaces.join(","),
            repo
        );
    }

    Ok(())
}

async fn cmd_use(name: &str, ctx: &Context) -> Result<()> {
    let file = ctx.store()?;
    let mut store = file.load_or_default()?;

    store.use_profile(name)?;
    file.save(&store)?;

    println!("Default profile set to '{}'.", name);
    Ok(())
}

async fn cmd_refresh_workspaces(name: Option<String>, ctx: &Context) -> Result<()> {
    let file = ctx.store()?;
    let mut store = file.load_or_default()?;

    let name = match name.or_else(|| ctx.profile.clone()) {
        Some(name) => name,
        None => resolve_profile(&store, None, None)?.record.profile_name,
    };
    if store.get(&name).is_none() {
        return Err(ConfigError::ProfileNotFound(name).into());
    }

    let workspaces = refresh_cached_workspaces(
        &file,
        &mut store,
        &name,
        &OAuthRefresher::bitbucket(),
        BitbucketClient::builder(),
        Utc::now(),
    )
    .await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&workspaces)?);
    } else if workspaces.is_empty() {
        println!("Profile '{}' can access no workspaces.", name);
    } else {
        println!("Profile '{}' workspaces:", style(&name).cyan());
        for ws in &workspaces {
            println!("  - {}", ws);
        }
    }

    Ok(())
}

/// Re-fetch a profile's workspace list and persist it.
///
/// If the listing fails the cached list and the store file are left as they were.
async fn refresh_cached_workspaces<E: TokenEndpoint>(
    file: &CredentialStore,
    store: &mut ProfileStore,
    name: &str,
    refresher: &OAuthRefresher<E>,
    builder: ClientBuilder,
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    let record = refresher.ensure_fresh(file, store, name, now).await?;

    let client = builder
        .authenticator(Authenticator::from_record(&record))
        .build()?;
    let workspaces = client.workspaces().slugs().await.with_context(|| {
        format!(
            "could not list workspaces for profile '{}'; cached list kept",
            name
        )
    })?;

    if let Some(record) = store.get_mut(name) {
        record.accessible_workspaces = workspaces.clone();
    }
    file.save(store)?;

    Ok(workspaces)
}
