//! Tools command - which operations the current credentials expose.

use anyhow::Result;
use bbkt_config::EnvOverrides;
use bbkt_gate::{CapabilityGate, Decision};
use clap::Args;
use console::style;
use serde::Serialize;

use super::Context;
use crate::session;

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Only list operations that are exposed
    #[arg(long)]
    pub exposed: bool,
}

#[derive(Serialize)]
struct ToolsOutput {
    credentials: String,
    scopes_known: bool,
    scopes: Vec<String>,
    operations: Vec<OperationOutput>,
}

#[derive(Serialize)]
struct OperationOutput {
    name: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_capability: Option<&'static str>,
    decision: Decision,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let env = EnvOverrides::from_env();
    let session = session::connect(session::resolve(&env, ctx.profile.as_deref())?).await?;

    let gate = CapabilityGate::introspect(
        &session.client,
        session.cached_scopes(),
        env.disabled_operations,
    )
    .await;

    let mut scopes: Vec<String> = gate.granted_scopes().iter().cloned().collect();
    scopes.sort();

    let operations: Vec<OperationOutput> = gate
        .decisions()
        .into_iter()
        .filter(|(_, decision)| !args.exposed || *decision == Decision::Exposed)
        .map(|(op, decision)| OperationOutput {
            name: op.name,
            description: op.description,
            required_capability: op.required_capability().map(|tag| tag.as_str()),
            decision,
        })
        .collect();

    if ctx.json_output {
        let output = ToolsOutput {
            credentials: session.origin.to_string(),
            scopes_known: gate.scopes_known(),
            scopes,
            operations,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Credentials: {}", session.origin);
    if gate.scopes_known() {
        println!("Scopes:      {}", scopes.join(" "));
    } else {
        println!(
            "Scopes:      {}",
            style("unknown (all operations exposed unless disabled)").yellow()
        );
    }
    println!();

    println!("{:<22} {:<18} {}", "OPERATION", "REQUIRES", "STATUS");
    for op in &operations {
        let status = match op.decision {
            Decision::Exposed => style(op.decision.to_string()).green(),
            Decision::Denied => style(op.decision.to_string()).dim(),
            Decision::MissingScope(_) => style(op.decision.to_string()).red(),
        };
        println!(
            "{:<22} {:<18} {}",
            op.name,
            op.required_capability.unwrap_or("-"),
            status
        );
        if ctx.verbose {
            println!("  {}", style(op.description).dim());
        }
    }

    Ok(())
}
