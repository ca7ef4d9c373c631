use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::context::StackContext;
use crate::error::Result;
use crate::services::process::{argv, RunOptions};

pub const DEFAULT_TAG: &str = "simplified-payment:local";
pub const DEFAULT_DOCKERFILE: &str = "infra/docker/php/Dockerfile.local";

/// Builds the application image from the project root.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    project_root: PathBuf,
    dockerfile: String,
    tag: String,
    node_env: String,
}

impl ImageBuilder {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            dockerfile: DEFAULT_DOCKERFILE.into(),
            tag: DEFAULT_TAG.into(),
            node_env: "development".into(),
        }
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn dockerfile(mut self, dockerfile: &str) -> Self {
        self.dockerfile = dockerfile.into();
        self
    }

    /// Run `docker build` with provenance build args, then list the image
    /// and its layers. Returns false when the build fails.
    pub async fn build(&self, ctx: &StackContext) -> Result<bool> {
        let vcs_ref = self
            .git(ctx, &["rev-parse", "--short", "HEAD"])
            .await
            .unwrap_or_else(|| "unknown".into());
        let version = self
            .git(ctx, &["describe", "--tags", "--always"])
            .await
            .unwrap_or_else(|| "dev".into());

        let args = self.build_args(Utc::now(), &vcs_ref, &version);
        ctx.reporter.step(&format!("$ {}", args.join(" ")));
        let out = ctx
            .runner
            .run(
                &args,
                &RunOptions {
                    working_directory: Some(self.project_root.clone()),
                    inherit_output: true,
                    ..RunOptions::default()
                },
            )
            .await?;
        if !out.success() {
            ctx.reporter
                .error(&format!("Build failed with exit code {}", out.exit_code));
            return Ok(false);
        }
        ctx.reporter.success(&format!("Image -> {}", self.tag));

        let listing = argv(&[
            "docker",
            "image",
            "ls",
            "--format",
            "table {{.Repository}}:{{.Tag}}\t{{.ID}}\t{{.Size}}",
            &self.tag,
        ]);
        ctx.runner.run(&listing, &RunOptions::inherited()).await?;
        ctx.reporter.step(&format!("History (layers) -> {}", self.tag));
        ctx.runner
            .run(
                &argv(&["docker", "history", "--no-trunc", &self.tag]),
                &RunOptions::inherited(),
            )
            .await?;
        Ok(true)
    }

    /// Trimmed stdout of a git command, `None` if git is missing or fails.
    async fn git(&self, ctx: &StackContext, args: &[&str]) -> Option<String> {
        let mut command = vec!["git"];
        command.extend_from_slice(args);
        match ctx
            .runner
            .run(&argv(&command), &RunOptions::in_dir(&self.project_root))
            .await
        {
            Ok(out) if out.success() && !out.stdout.trim().is_empty() => {
                Some(out.stdout.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "git unavailable");
                None
            }
        }
    }

    fn build_args(&self, now: DateTime<Utc>, vcs_ref: &str, version: &str) -> Vec<String> {
        let build_date = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let mut args = argv(&["docker", "build", "--progress=plain"]);
        for arg in [
            format!("NODE_ENV={}", self.node_env),
            format!("BUILD_DATE={build_date}"),
            format!("VCS_REF={vcs_ref}"),
            format!("VERSION={version}"),
        ] {
            args.push("--build-arg".into());
            args.push(arg);
        }
        args.extend([
            "-f".into(),
            self.dockerfile.clone(),
            "-t".into(),
            self.tag.clone(),
            ".".into(),
        ]);
        args
    }
}
