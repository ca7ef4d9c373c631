use crate::context::StackContext;
use crate::error::{Result, StackError};
use crate::services::docker;
use crate::services::process::{argv, ProcessOutput};

pub const DEFAULT_BASE_PATH: &str = "/var/www/html";

const DEV_ENVIRONMENTS: [&str; 3] = ["local", "development", "testing"];

/// Bootstraps a running Laravel container from the host through `docker exec`.
#[derive(Debug, Clone)]
pub struct LaravelEntrypoint {
    container: String,
    base_path: String,
}

/// Steps that failed but did not stop the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrypointReport {
    pub warnings: Vec<String>,
}

impl EntrypointReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl LaravelEntrypoint {
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = base_path.to_string();
        self
    }

    /// Run every bootstrap step. Only a missing base directory is fatal; any
    /// other failure is reported as a warning and the run continues.
    pub async fn run(&self, ctx: &StackContext) -> Result<EntrypointReport> {
        ctx.reporter
            .step(&format!("Laravel entrypoint for container {}", self.container));
        let mut report = EntrypointReport::default();

        self.ensure_base_dir(ctx).await?;

        self.record(ctx, &mut report, "env file", self.ensure_env_file(ctx).await);
        self.record(ctx, &mut report, "composer install", self.composer_install(ctx).await);
        self.record(ctx, &mut report, "npm install", self.npm_install(ctx).await);
        self.record(ctx, &mut report, "APP_KEY", self.generate_app_key(ctx).await);
        self.record(ctx, &mut report, ".env.testing", self.copy_env_for_testing(ctx).await);
        for kind in ["config", "cache", "route", "view"] {
            let step = format!("{kind}:clear");
            let result = self.artisan(ctx, &[&step]).await;
            self.record(ctx, &mut report, &step, result);
        }
        self.record(ctx, &mut report, "migrations", self.run_migrations(ctx).await);
        for kind in ["config", "route", "view"] {
            let step = format!("{kind}:cache");
            let result = self.artisan(ctx, &[&step]).await;
            self.record(ctx, &mut report, &step, result);
        }
        for dir in ["storage", "bootstrap/cache"] {
            let result = self.fix_permissions(ctx, dir).await;
            self.record(ctx, &mut report, &format!("permissions on {dir}"), result);
        }

        if report.is_clean() {
            ctx.reporter.success("Entrypoint finished");
        } else {
            ctx.reporter.warn(&format!(
                "Entrypoint finished with {} warning(s)",
                report.warnings.len()
            ));
        }
        Ok(report)
    }

    fn record(&self, ctx: &StackContext, report: &mut EntrypointReport, step: &str, result: Result<()>) {
        match result {
            Ok(()) => tracing::debug!(container = %self.container, step, "entrypoint step ok"),
            Err(e) => {
                let message = format!("{step}: {e}");
                tracing::warn!(container = %self.container, step, error = %e, "entrypoint step failed");
                ctx.reporter.warn(&message);
                report.warnings.push(message);
            }
        }
    }

    async fn exec(&self, ctx: &StackContext, command: &[&str]) -> Result<ProcessOutput> {
        docker::exec(
            ctx.runner.as_ref(),
            &self.container,
            Some(&self.base_path),
            &argv(command),
        )
        .await
    }

    /// Like `exec` but a non-zero exit becomes an error.
    async fn exec_checked(&self, ctx: &StackContext, command: &[&str]) -> Result<ProcessOutput> {
        let out = self.exec(ctx, command).await?;
        if !out.success() {
            let detail = if out.stderr.trim().is_empty() {
                format!("exit code {}", out.exit_code)
            } else {
                out.stderr.trim().to_string()
            };
            return Err(StackError::Entrypoint(format!(
                "`{}` failed: {detail}",
                command.join(" ")
            )));
        }
        Ok(out)
    }

    async fn artisan(&self, ctx: &StackContext, args: &[&str]) -> Result<()> {
        let mut command = vec!["php", "artisan"];
        command.extend_from_slice(args);
        self.exec_checked(ctx, &command).await.map(|_| ())
    }

    fn env_file(&self) -> String {
        format!("{}/.env", self.base_path)
    }

    async fn ensure_base_dir(&self, ctx: &StackContext) -> Result<()> {
        let out = docker::exec(
            ctx.runner.as_ref(),
            &self.container,
            None,
            &argv(&["test", "-d", &self.base_path]),
        )
        .await?;
        if !out.success() {
            return Err(StackError::Entrypoint(format!(
                "base directory {} does not exist in {}",
                self.base_path, self.container
            )));
        }
        Ok(())
    }

    async fn ensure_env_file(&self, ctx: &StackContext) -> Result<()> {
        let env_file = self.env_file();
        if self.exec(ctx, &["test", "-f", &env_file]).await?.success() {
            return Ok(());
        }
        ctx.reporter.warn(&format!("{env_file} missing, writing a minimal one"));
        let script = format!("printf 'APP_NAME=Laravel\\nAPP_ENV=local\\nAPP_KEY=\\n' > {env_file}");
        self.exec_checked(ctx, &["sh", "-c", &script]).await.map(|_| ())
    }

    async fn read_env_value(&self, ctx: &StackContext, key: &str) -> Result<String> {
        let script = format!("grep '^{key}=' {} | cut -d'=' -f2-", self.env_file());
        let out = self.exec_checked(ctx, &["sh", "-c", &script]).await?;
        Ok(out.stdout.trim().to_string())
    }

    async fn composer_install(&self, ctx: &StackContext) -> Result<()> {
        let app_env = self
            .read_env_value(ctx, "APP_ENV")
            .await
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "production".to_string());
        let mut command = vec!["composer", "install", "--optimize-autoloader", "--no-scripts"];
        if !DEV_ENVIRONMENTS.contains(&app_env.as_str()) {
            command.push("--no-dev");
        }
        ctx.reporter.info(&format!("Composer install (APP_ENV={app_env})"));
        self.exec_checked(ctx, &command).await.map(|_| ())
    }

    async fn npm_install(&self, ctx: &StackContext) -> Result<()> {
        if !self.exec(ctx, &["which", "npm"]).await?.success() {
            ctx.reporter.info("npm not found in container, skipping JS dependencies");
            return Ok(());
        }
        self.exec_checked(ctx, &["npm", "install", "--production"])
            .await
            .map(|_| ())
    }

    async fn generate_app_key(&self, ctx: &StackContext) -> Result<()> {
        let current = self.read_env_value(ctx, "APP_KEY").await.unwrap_or_default();
        if !current.is_empty() {
            return Ok(());
        }
        ctx.reporter.info("APP_KEY empty, generating a new key");
        self.artisan(ctx, &["key:generate"]).await
    }

    async fn copy_env_for_testing(&self, ctx: &StackContext) -> Result<()> {
        let target = format!("{}/.env.testing", self.base_path);
        self.exec_checked(ctx, &["cp", &self.env_file(), &target])
            .await
            .map(|_| ())
    }

    async fn run_migrations(&self, ctx: &StackContext) -> Result<()> {
        if self.artisan(ctx, &["migrate", "--force"]).await.is_ok() {
            return Ok(());
        }
        ctx.reporter.warn("Migrations failed, resetting and running again");
        self.artisan(ctx, &["migrate:reset", "--force"]).await?;
        self.artisan(ctx, &["migrate", "--force"]).await
    }

    async fn fix_permissions(&self, ctx: &StackContext, dir: &str) -> Result<()> {
        let path = format!("{}/{dir}", self.base_path);
        self.exec_checked(ctx, &["chmod", "-R", "775", &path]).await?;
        self.exec_checked(ctx, &["chown", "-R", "appuser:appuser", &path])
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scripted_context;

    #[tokio::test]
    async fn missing_base_dir_is_fatal() {
        let (ctx, runner, _) = scripted_context();
        runner.on("test -d /var/www/html", ProcessOutput::failed(1, ""));

        let err = LaravelEntrypoint::new("payment-api").run(&ctx).await.unwrap_err();
        assert!(matches!(err, StackError::Entrypoint(_)));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn production_install_skips_dev_dependencies() {
        let (ctx, runner, _) = scripted_context();
        runner.on("grep '^APP_ENV='", ProcessOutput::ok("production\n"));
        runner.on("grep '^APP_KEY='", ProcessOutput::ok("base64:abc\n"));

        let report = LaravelEntrypoint::new("payment-api").run(&ctx).await.unwrap();
        assert!(report.is_clean());
        let composer = runner.calls_matching("composer install");
        assert_eq!(composer.len(), 1);
        assert!(composer[0].ends_with("--no-dev"));
        assert!(runner.calls_matching("key:generate").is_empty());
    }

    #[tokio::test]
    async fn local_install_keeps_dev_dependencies_and_generates_key() {
        let (ctx, runner, _) = scripted_context();
        runner.on("grep '^APP_ENV='", ProcessOutput::ok("local\n"));
        runner.on("grep '^APP_KEY='", ProcessOutput::ok("\n"));

        LaravelEntrypoint::new("payment-api").run(&ctx).await.unwrap();
        assert!(!runner.calls_matching("composer install")[0].contains("--no-dev"));
        assert_eq!(
            runner.calls_matching("key:generate"),
            vec!["docker exec -w /var/www/html payment-api php artisan key:generate"]
        );
    }

    #[tokio::test]
    async fn step_failures_become_warnings_and_run_continues() {
        let (ctx, runner, reporter) = scripted_context();
        runner.on("grep '^APP_KEY='", ProcessOutput::ok("base64:abc\n"));
        runner.on("composer install", ProcessOutput::failed(1, "composer: not found"));
        runner.on("migrate", ProcessOutput::failed(1, "SQLSTATE[HY000] [2002]"));

        let report = LaravelEntrypoint::new("payment-api").run(&ctx).await.unwrap();
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].starts_with("composer install"));
        assert!(report.warnings[1].starts_with("migrations"));
        assert_eq!(runner.calls_matching("migrate:reset").len(), 1);
        assert_eq!(runner.calls_matching("route:cache").len(), 1);
        assert_eq!(runner.calls_matching("chown -R appuser:appuser").len(), 2);
        assert!(reporter.contains("2 warning(s)"));
    }

    #[tokio::test]
    async fn missing_env_file_is_created() {
        let (ctx, runner, _) = scripted_context();
        runner.on("test -f /var/www/html/.env", ProcessOutput::failed(1, ""));

        LaravelEntrypoint::new("payment-api").run(&ctx).await.unwrap();
        let created = runner.calls_matching("printf");
        assert_eq!(created.len(), 1);
        assert!(created[0].contains("APP_ENV=local"));
    }

    #[tokio::test]
    async fn npm_is_skipped_when_absent() {
        let (ctx, runner, _) = scripted_context();
        runner.on("which npm", ProcessOutput::failed(1, ""));

        LaravelEntrypoint::new("payment-api").run(&ctx).await.unwrap();
        assert!(runner.calls_matching("npm install").is_empty());
    }
}
