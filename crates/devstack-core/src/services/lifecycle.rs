use std::time::Duration;

use tokio::time::Instant;

use crate::context::StackContext;
use crate::error::Result;
use crate::models::{Launch, ReadinessProbe, ServiceDescriptor, VerifyOutcome};
use crate::services::docker;
use crate::services::entrypoint::LaravelEntrypoint;
use crate::services::network;
use crate::services::probe;
use crate::services::process::RunOptions;

const RESTART_PAUSE: Duration = Duration::from_secs(2);

/// Bring the container up without waiting for readiness.
///
/// Removes any leftover container first so the name is free. Returns false
/// when the docker CLI reports a failure.
pub async fn launch(ctx: &StackContext, descriptor: &ServiceDescriptor) -> Result<bool> {
    ctx.reporter
        .step(&format!("Starting {}...", descriptor.display_name));
    cleanup_existing(ctx, descriptor).await?;

    let out = match &descriptor.launch {
        Launch::Run => {
            for name in &descriptor.networks {
                if let Err(e) = network::ensure_network(ctx.runner.as_ref(), name).await {
                    ctx.reporter.warn(&format!("Network {name}: {e}"));
                }
            }
            let args = docker::run_args(descriptor);
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            docker::docker(ctx.runner.as_ref(), &args).await?
        }
        Launch::Compose { file, service } => {
            docker::compose(ctx.runner.as_ref(), file, &["up", "-d", service]).await?
        }
    };

    if !out.success() {
        ctx.reporter.error(&format!(
            "Failed to start {}: {}",
            descriptor.display_name,
            out.stderr.trim()
        ));
        return Ok(false);
    }
    ctx.reporter
        .success(&format!("{} started", descriptor.display_name));

    if descriptor.run_entrypoint {
        if let Err(e) = LaravelEntrypoint::new(&descriptor.container_name)
            .run(ctx)
            .await
        {
            ctx.reporter.error(&format!(
                "Entrypoint for {} failed: {e}",
                descriptor.display_name
            ));
            return Ok(false);
        }
    }
    Ok(true)
}

/// `launch`, then `verify` with the descriptor's attempt budget when `wait` is set.
pub async fn start(ctx: &StackContext, descriptor: &ServiceDescriptor, wait: bool) -> Result<bool> {
    if !launch(ctx, descriptor).await? {
        return Ok(false);
    }
    if !wait {
        return Ok(true);
    }
    Ok(verify(ctx, descriptor, descriptor.max_attempts)
        .await
        .is_ready())
}

/// Poll readiness up to `max_attempts` times, `poll_interval` apart, never
/// past the deadline `start + poll_interval × max_attempts`.
///
/// Each round first requires the container to be running, then runs the
/// probe. With `max_attempts == 0` this returns `TimedOut` without probing.
pub async fn verify(
    ctx: &StackContext,
    descriptor: &ServiceDescriptor,
    max_attempts: u32,
) -> VerifyOutcome {
    if max_attempts == 0 {
        return VerifyOutcome::TimedOut;
    }
    ctx.reporter
        .info(&format!("Waiting for {}...", descriptor.display_name));

    let interval = descriptor.poll_interval;
    let deadline = Instant::now() + interval * max_attempts;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match ready_once(ctx, descriptor).await {
            Ok(true) => {
                tracing::info!(service = %descriptor.name, attempt, "service ready");
                ctx.reporter
                    .success(&format!("{} is ready", descriptor.display_name));
                return VerifyOutcome::Ready;
            }
            Ok(false) => {
                tracing::trace!(service = %descriptor.name, attempt, "not ready yet");
            }
            Err(e) => {
                ctx.reporter.error(&format!(
                    "Could not check {}: {e}",
                    descriptor.display_name
                ));
                return VerifyOutcome::Failed(e.to_string());
            }
        }

        let now = Instant::now();
        if attempt >= max_attempts || now >= deadline {
            ctx.reporter.error(&format!(
                "{} not ready after {}s",
                descriptor.display_name,
                (interval * max_attempts).as_secs()
            ));
            return VerifyOutcome::TimedOut;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

async fn ready_once(ctx: &StackContext, descriptor: &ServiceDescriptor) -> Result<bool> {
    // HTTP probes go through published host ports and need no container check.
    if !matches!(descriptor.probe, ReadinessProbe::Http { .. })
        && !docker::is_container_running(ctx.runner.as_ref(), &descriptor.container_name).await?
    {
        return Ok(false);
    }
    probe::probe_once(ctx, descriptor).await
}

pub async fn stop(ctx: &StackContext, descriptor: &ServiceDescriptor) -> Result<bool> {
    ctx.reporter
        .step(&format!("Stopping {}...", descriptor.display_name));
    let stopped = match &descriptor.launch {
        Launch::Run => {
            let runner = ctx.runner.as_ref();
            let out = docker::docker(runner, &["stop", &descriptor.container_name]).await?;
            if out.success() {
                let rm = docker::docker(runner, &["rm", &descriptor.container_name]).await?;
                let removed = rm.success() || docker::is_missing_container(&rm.stderr);
                if !removed {
                    ctx.reporter.error(&format!(
                        "Failed to remove {}: {}",
                        descriptor.container_name,
                        rm.stderr.trim()
                    ));
                }
                removed
            } else if docker::is_missing_container(&out.stderr) {
                true
            } else {
                ctx.reporter.error(&format!(
                    "Failed to stop {}: {}",
                    descriptor.display_name,
                    out.stderr.trim()
                ));
                false
            }
        }
        Launch::Compose { file, service } => {
            let out = docker::compose(ctx.runner.as_ref(), file, &["down", service]).await?;
            if !out.success() {
                ctx.reporter.error(&format!(
                    "Failed to stop {}: {}",
                    descriptor.display_name,
                    out.stderr.trim()
                ));
            }
            out.success()
        }
    };
    if stopped {
        ctx.reporter
            .success(&format!("{} stopped", descriptor.display_name));
    }
    Ok(stopped)
}

/// Remove a pre-existing container with the same name. A missing container is fine.
pub async fn cleanup_existing(ctx: &StackContext, descriptor: &ServiceDescriptor) -> Result<bool> {
    match &descriptor.launch {
        Launch::Run => {
            let removed =
                docker::remove_container(ctx.runner.as_ref(), &descriptor.container_name).await?;
            if !removed {
                ctx.reporter.warn(&format!(
                    "Could not remove existing container {}",
                    descriptor.container_name
                ));
            }
            Ok(removed)
        }
        Launch::Compose { file, service } => {
            let out = docker::compose(ctx.runner.as_ref(), file, &["down", service]).await?;
            Ok(out.success())
        }
    }
}

/// Stream the service's logs to the terminal.
pub async fn logs(
    ctx: &StackContext,
    descriptor: &ServiceDescriptor,
    tail: usize,
    follow: bool,
) -> Result<bool> {
    let tail = tail.to_string();
    let mut args = vec!["logs"];
    if follow {
        args.push("-f");
    }
    args.extend(["--tail", tail.as_str()]);

    let out = match &descriptor.launch {
        Launch::Run => {
            args.push(&descriptor.container_name);
            let mut argv = vec!["docker".to_string()];
            argv.extend(args.iter().map(|a| a.to_string()));
            ctx.runner.run(&argv, &RunOptions::inherited()).await?
        }
        Launch::Compose { file, service } => {
            args.push(service);
            docker::compose_with(ctx.runner.as_ref(), file, &args, RunOptions::inherited()).await?
        }
    };
    if !out.success() {
        ctx.reporter.error(&format!(
            "Could not read logs for {}",
            descriptor.display_name
        ));
    }
    Ok(out.success())
}

/// Stop, pause briefly, then start and wait for readiness.
pub async fn restart(ctx: &StackContext, descriptor: &ServiceDescriptor) -> Result<bool> {
    if !stop(ctx, descriptor).await? {
        return Ok(false);
    }
    tokio::time::sleep(RESTART_PAUSE).await;
    start(ctx, descriptor, true).await
}
