use std::time::Duration;

use serde::Serialize;

use crate::context::StackContext;
use crate::error::{Result, StackError};
use crate::services::docker;
use crate::services::process::ProcessRunner;
use crate::services::retry::retry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub name: String,
    /// Short id; `None` when the network does not exist.
    pub id: Option<String>,
    pub containers: usize,
}

pub async fn network_exists(runner: &dyn ProcessRunner, name: &str) -> Result<bool> {
    let out = docker::docker(runner, &["network", "inspect", name]).await?;
    Ok(out.success())
}

/// Create the bridge network `name` unless it already exists. Returns true
/// when a network was created.
pub async fn ensure_network(runner: &dyn ProcessRunner, name: &str) -> Result<bool> {
    if network_exists(runner, name).await? {
        tracing::debug!(network = name, "network already exists");
        return Ok(false);
    }
    let out = docker::docker(runner, &["network", "create", "--driver", "bridge", name]).await?;
    if out.success() {
        return Ok(true);
    }
    if out.stderr.contains("already exists") {
        return Ok(false);
    }
    Err(StackError::Network(format!(
        "could not create '{name}': {}",
        out.stderr.trim()
    )))
}

/// Upsert every network; any failure aborts.
pub async fn create_all(ctx: &StackContext, networks: &[String]) -> Result<()> {
    ctx.reporter.step("Creating Docker networks...");
    let mut created = 0;
    for name in networks {
        let was_created = retry(3, Duration::from_secs(1), || {
            ensure_network(ctx.runner.as_ref(), name)
        })
        .await
        .inspect_err(|e| ctx.reporter.error(&format!("Network {name}: {e}")))?;
        if was_created {
            created += 1;
            ctx.reporter.success(&format!("Network '{name}' created"));
        } else {
            ctx.reporter.info(&format!("Using existing network '{name}'"));
        }
    }
    tracing::info!(created, total = networks.len(), "networks ready");
    Ok(())
}

pub async fn network_status(runner: &dyn ProcessRunner, networks: &[String]) -> Result<Vec<NetworkStatus>> {
    let mut statuses = Vec::with_capacity(networks.len());
    for name in networks {
        let out = docker::docker(
            runner,
            &["network", "inspect", "-f", "{{.Id}} {{len .Containers}}", name],
        )
        .await?;
        let status = if out.success() {
            parse_inspect_line(name, &out.stdout)
        } else {
            NetworkStatus {
                name: name.clone(),
                id: None,
                containers: 0,
            }
        };
        statuses.push(status);
    }
    Ok(statuses)
}

fn parse_inspect_line(name: &str, stdout: &str) -> NetworkStatus {
    let mut parts = stdout.split_whitespace();
    let id = parts.next().map(|id| id.chars().take(12).collect::<String>());
    let containers = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
    NetworkStatus {
        name: name.to_string(),
        id,
        containers,
    }
}
