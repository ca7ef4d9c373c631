use std::path::Path;

use crate::error::Result;
use crate::models::ServiceDescriptor;
use crate::services::process::{ProcessOutput, ProcessRunner, RunOptions};

async fn run_docker(
    runner: &dyn ProcessRunner,
    args: &[&str],
    options: &RunOptions,
) -> Result<ProcessOutput> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push("docker".to_string());
    argv.extend(args.iter().map(|a| a.to_string()));
    runner.run(&argv, options).await
}

pub async fn docker(runner: &dyn ProcessRunner, args: &[&str]) -> Result<ProcessOutput> {
    run_docker(runner, args, &RunOptions::default()).await
}

/// `docker compose -f <file> <args>` run from the compose file's directory.
pub async fn compose(
    runner: &dyn ProcessRunner,
    file: &Path,
    args: &[&str],
) -> Result<ProcessOutput> {
    compose_with(runner, file, args, RunOptions::default()).await
}

pub async fn compose_with(
    runner: &dyn ProcessRunner,
    file: &Path,
    args: &[&str],
    mut options: RunOptions,
) -> Result<ProcessOutput> {
    let file_arg = file.to_string_lossy();
    let mut full = vec!["compose", "-f", file_arg.as_ref()];
    full.extend_from_slice(args);
    if options.working_directory.is_none() {
        options.working_directory = file.parent().map(Path::to_path_buf);
    }
    run_docker(runner, &full, &options).await
}

pub async fn is_container_running(runner: &dyn ProcessRunner, container: &str) -> Result<bool> {
    let out = docker(runner, &["inspect", "-f", "{{.State.Running}}", container]).await?;
    Ok(out.success() && out.stdout.trim() == "true")
}

/// Live `docker ps` status line, e.g. `Up 3 minutes (healthy)`. `None` when
/// the container does not exist or is not running.
pub async fn container_status(
    runner: &dyn ProcessRunner,
    container: &str,
) -> Result<Option<String>> {
    let filter = format!("name=^{container}$");
    let out = docker(
        runner,
        &["ps", "--filter", &filter, "--format", "{{.Status}}"],
    )
    .await?;
    if !out.success() {
        return Ok(None);
    }
    Ok(out
        .stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string))
}

/// Force-remove a container. A container that does not exist counts as removed.
pub async fn remove_container(runner: &dyn ProcessRunner, container: &str) -> Result<bool> {
    let out = docker(runner, &["rm", "-f", container]).await?;
    Ok(out.success() || is_missing_container(&out.stderr))
}

pub fn is_missing_container(stderr: &str) -> bool {
    stderr.contains("No such container")
}

/// `docker exec [-w dir] <container> <command...>`.
pub async fn exec(
    runner: &dyn ProcessRunner,
    container: &str,
    workdir: Option<&str>,
    command: &[String],
) -> Result<ProcessOutput> {
    let mut args: Vec<&str> = vec!["exec"];
    if let Some(dir) = workdir {
        args.extend(["-w", dir]);
    }
    args.push(container);
    args.extend(command.iter().map(String::as_str));
    docker(runner, &args).await
}

/// Arguments after `docker` for a detached `docker run` of this descriptor.
pub fn run_args(descriptor: &ServiceDescriptor) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        descriptor.container_name.clone(),
    ];
    for port in &descriptor.ports {
        args.extend(["-p".to_string(), port.clone()]);
    }
    for env in &descriptor.environment {
        args.extend(["-e".to_string(), env.clone()]);
    }
    for volume in &descriptor.volumes {
        args.extend(["-v".to_string(), volume.clone()]);
    }
    for network in &descriptor.networks {
        args.extend(["--network".to_string(), network.clone()]);
    }
    if let Some(hc) = &descriptor.health_check {
        args.extend([
            "--health-cmd".to_string(),
            hc.command_line(),
            "--health-interval".to_string(),
            hc.interval.clone(),
            "--health-timeout".to_string(),
            hc.timeout.clone(),
            "--health-retries".to_string(),
            hc.retries.to_string(),
        ]);
    }
    args.push(descriptor.image.clone());
    args.extend(descriptor.command.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::models::{HealthCheck, Tier};
    use crate::testing::ScriptedRunner;

    #[test]
    fn run_args_follow_descriptor_order() {
        let d = ServiceDescriptor::new("redis", "Redis", "payment-redis", Tier::Datastore)
            .image("redis:7-alpine")
            .ports(&["6377:6379"])
            .environment(vec!["REDIS_PASSWORD=secret".into()])
            .volumes(&["redis_data:/data"])
            .networks(&["payment-api-cache"])
            .health_check(HealthCheck::new(&["CMD", "redis-cli", "ping"], "10s", "3s", 3))
            .command(&["redis-server", "--appendonly", "yes"]);

        assert_eq!(
            run_args(&d).join(" "),
            "run -d --name payment-redis -p 6377:6379 -e REDIS_PASSWORD=secret \
             -v redis_data:/data --network payment-api-cache \
             --health-cmd redis-cli ping --health-interval 10s --health-timeout 3s \
             --health-retries 3 redis:7-alpine redis-server --appendonly yes"
        );
    }

    #[test]
    fn run_args_without_optional_parts() {
        let d = ServiceDescriptor::new("x", "X", "x", Tier::Datastore).image("busybox");
        assert_eq!(run_args(&d), vec!["run", "-d", "--name", "x", "busybox"]);
    }

    #[tokio::test]
    async fn compose_runs_from_file_directory() {
        let runner = ScriptedRunner::new();
        let file = PathBuf::from("/srv/infra/docker/docker-compose.app.yml");
        compose(&runner, &file, &["up", "-d", "app"]).await.unwrap();
        assert_eq!(
            runner.calls(),
            vec!["docker compose -f /srv/infra/docker/docker-compose.app.yml up -d app"]
        );
    }

    #[tokio::test]
    async fn running_requires_true_from_inspect() {
        let runner = ScriptedRunner::new();
        runner.on("inspect", ProcessOutput::ok("true\n"));
        assert!(is_container_running(&runner, "payment-redis").await.unwrap());

        runner.on("inspect", ProcessOutput::ok("false\n"));
        assert!(!is_container_running(&runner, "payment-redis").await.unwrap());

        runner.on("inspect", ProcessOutput::failed(1, "Error: No such object"));
        assert!(!is_container_running(&runner, "payment-redis").await.unwrap());
    }

    #[tokio::test]
    async fn removing_absent_container_is_ok() {
        let runner = ScriptedRunner::new();
        runner.on(
            "rm -f",
            ProcessOutput::failed(1, "Error response from daemon: No such container: payment-redis"),
        );
        assert!(remove_container(&runner, "payment-redis").await.unwrap());

        runner.on("rm -f", ProcessOutput::failed(1, "permission denied"));
        assert!(!remove_container(&runner, "payment-redis").await.unwrap());
    }

    #[tokio::test]
    async fn container_status_reads_first_line() {
        let runner = ScriptedRunner::new();
        runner.on("ps --filter", ProcessOutput::ok("Up 2 minutes (healthy)\n"));
        assert_eq!(
            container_status(&runner, "payment-redis").await.unwrap().as_deref(),
            Some("Up 2 minutes (healthy)")
        );

        runner.on("ps --filter", ProcessOutput::ok(""));
        assert_eq!(container_status(&runner, "payment-redis").await.unwrap(), None);
    }
}
