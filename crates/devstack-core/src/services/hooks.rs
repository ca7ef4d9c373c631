use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::context::StackContext;
use crate::error::{Result, StackError};
use crate::models::StackConfig;
use crate::services::process::{argv, RunOptions};

/// Code quality PHARs installed under `infra/tools`, as (name, download URL).
pub const QUALITY_TOOLS: [(&str, &str); 3] = [
    ("php-cs-fixer", "https://cs.symfony.com/download/php-cs-fixer-v3.phar"),
    ("phpmd", "https://phpmd.org/static/latest/phpmd.phar"),
    (
        "phpstan",
        "https://github.com/phpstan/phpstan/releases/download/1.10.50/phpstan.phar",
    ),
];

const PRE_COMMIT: &str = r#"#!/bin/sh
. "$(dirname "$0")/_/husky.sh"

echo "Running code quality checks..."

echo "Laravel Pint..."
cd api
./vendor/bin/pint --test || {
    echo "Pint found problems, fixing..."
    ./vendor/bin/pint
    git add .
}

echo "PHP-CS-Fixer..."
cd ..
infra/tools/php-cs-fixer fix api/ --dry-run --diff || {
    echo "PHP-CS-Fixer found problems, fixing..."
    infra/tools/php-cs-fixer fix api/
    git add .
}

echo "PHPMD..."
infra/tools/phpmd api/app text cleancode,codesize,controversial,design,naming,unusedcode || {
    echo "PHPMD found problems. Review the code."
    exit 1
}

echo "Quality checks passed"
"#;

const PRE_PUSH: &str = r#"#!/bin/sh
. "$(dirname "$0")/_/husky.sh"

echo "Running static analysis..."

cd api
../infra/tools/phpstan analyse app/ || {
    echo "PHPStan found errors. Fix them before pushing."
    exit 1
}

echo "Static analysis passed"
"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookStatus {
    pub tools: Vec<(String, bool)>,
    pub husky_dir: bool,
    pub pre_commit: bool,
    pub pre_push: bool,
}

impl HookStatus {
    pub fn is_complete(&self) -> bool {
        self.tools.iter().all(|(_, present)| *present) && self.husky_dir && self.pre_commit
    }
}

/// Installs the code quality tools and the husky git hooks that call them.
#[derive(Debug, Clone)]
pub struct HookInstaller {
    project_root: PathBuf,
    app_dir: PathBuf,
    tools_dir: PathBuf,
    hooks_dir: PathBuf,
    tools: Vec<(String, String)>,
}

impl HookInstaller {
    pub fn new(config: &StackConfig) -> Self {
        let root = config.project_root.clone();
        Self {
            app_dir: config.app_path(),
            tools_dir: root.join("infra").join("tools"),
            hooks_dir: root.join(".husky"),
            project_root: root,
            tools: QUALITY_TOOLS
                .iter()
                .map(|(name, url)| (name.to_string(), url.to_string()))
                .collect(),
        }
    }

    /// Replace the download sources, e.g. with a mirror.
    pub fn with_tools(mut self, tools: Vec<(String, String)>) -> Self {
        self.tools = tools;
        self
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    pub fn hooks_dir(&self) -> &Path {
        &self.hooks_dir
    }

    /// Download missing tools and write the hooks.
    ///
    /// A failed download is reported and skipped; only filesystem errors
    /// while writing the hooks fail the install.
    pub async fn install(&self, ctx: &StackContext) -> Result<()> {
        ctx.reporter.step("Configuring git hooks...");
        tokio::fs::create_dir_all(&self.tools_dir).await?;
        for (name, url) in &self.tools {
            let target = self.tools_dir.join(name);
            if target.is_file() {
                ctx.reporter.info(&format!("{name}: already installed"));
                continue;
            }
            ctx.reporter.info(&format!("Downloading {name}..."));
            match download(ctx, url, &target).await {
                Ok(bytes) => {
                    tracing::debug!(tool = %name, bytes, "downloaded");
                    ctx.reporter
                        .success(&format!("{name}: installed in {}", target.display()));
                }
                Err(e) => ctx.reporter.warn(&format!("{name}: {e}")),
            }
        }

        self.install_husky(ctx).await;
        tokio::fs::create_dir_all(&self.hooks_dir).await?;
        let huskyrc = self.project_root.join(".huskyrc");
        if !huskyrc.exists() {
            tokio::fs::write(&huskyrc, "{\"hooks\": {}}").await?;
        }
        write_hook(&self.hooks_dir.join("pre-commit"), PRE_COMMIT).await?;
        write_hook(&self.hooks_dir.join("pre-push"), PRE_PUSH).await?;
        ctx.reporter.success("Git hooks configured");
        Ok(())
    }

    async fn install_husky(&self, ctx: &StackContext) {
        if !self.app_dir.join("package.json").exists() {
            return;
        }
        let out = ctx
            .runner
            .run(
                &argv(&["npm", "install", "--save-dev", "husky"]),
                &RunOptions::in_dir(&self.app_dir),
            )
            .await;
        match out {
            Ok(out) if out.success() => ctx.reporter.success("Husky installed via npm"),
            Ok(out) => ctx
                .reporter
                .warn(&format!("Could not install husky: {}", out.stderr.trim())),
            Err(e) => ctx.reporter.warn(&format!("Could not install husky: {e}")),
        }
    }

    pub fn verify(&self) -> HookStatus {
        HookStatus {
            tools: self
                .tools
                .iter()
                .map(|(name, _)| (name.clone(), self.tools_dir.join(name).is_file()))
                .collect(),
            husky_dir: self.hooks_dir.is_dir(),
            pre_commit: self.hooks_dir.join("pre-commit").is_file(),
            pre_push: self.hooks_dir.join("pre-push").is_file(),
        }
    }

    /// Delete `.husky/`. Installed tools stay.
    pub async fn remove(&self) -> Result<()> {
        if self.hooks_dir.exists() {
            tokio::fs::remove_dir_all(&self.hooks_dir).await?;
        }
        Ok(())
    }
}

async fn download(ctx: &StackContext, url: &str, target: &Path) -> Result<usize> {
    let response = ctx.http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StackError::Hooks(format!("download from {url} returned HTTP {status}")));
    }
    let bytes = response.bytes().await?;
    tokio::fs::write(target, &bytes).await?;
    make_executable(target).await?;
    Ok(bytes.len())
}

async fn write_hook(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents).await?;
    make_executable(path).await
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
