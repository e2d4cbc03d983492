//! bbkt - Bitbucket Cloud credential profiles and capability gating
//!
//! Main entry point for the bbkt CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod session;

use commands::{auth, profile, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// bbkt - Bitbucket Cloud credential profiles and capability gating
#[derive(Parser)]
#[command(name = "bbkt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Credential profile to use instead of the inferred one
    #[arg(short, long, global = true, env = "BBKT_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authentication management
    Auth(auth::AuthArgs),

    /// Manage credential profiles
    Profile(profile::ProfileArgs),

    /// Show which operations the current credentials expose
    Tools(tools::ToolsArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (stderr) plus a rotating JSON file
    let filter = if cli.verbose {
        "bbkt=debug,bbkt_config=debug,bbkt_oauth=debug,bbkt_client=debug,bbkt_gate=debug,info"
    } else {
        "bbkt=info,bbkt_config=info,bbkt_oauth=info,bbkt_client=warn,bbkt_gate=warn,warn"
    };

    let log_dir = bbkt_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|_| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "bbkt.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(cli.verbose)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "bbkt=trace,bbkt_config=trace,bbkt_oauth=trace,bbkt_client=debug,bbkt_gate=debug,info",
                )),
        )
        .init();

    // Create context for commands
    let ctx = commands::Context {
        profile: cli.profile.filter(|p| !p.is_empty()),
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Profile(args) => profile::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
    }
}
