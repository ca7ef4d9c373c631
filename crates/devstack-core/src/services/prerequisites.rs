use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

use crate::context::StackContext;
use crate::error::Result;
use crate::models::{CheckResult, CheckStatus, NamedCheck, StackConfig};
use crate::services::docker;
use crate::services::process::{argv, RunOptions};

const SUPPORTED_OS: [&str; 3] = ["linux", "macos", "windows"];
const SUPPORTED_ARCH: [&str; 2] = ["x86_64", "aarch64"];
const MIN_DOCKER_VERSION: &str = "20.10.0";
const MIN_COMPOSE_VERSION: &str = "2.0.0";
const RECOMMENDED_COMPOSE_VERSION: &str = "2.20.0";
const REQUIRED_TOOLS: [&str; 2] = ["git", "curl"];
pub const REGISTRY_ENDPOINTS: [&str; 2] = ["https://registry-1.docker.io", "https://hub.docker.com"];
const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("valid regex"));
static PROJECT_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(docker-compose\.yml|docker-compose-.*\.yml|Dockerfile.*|setup.*\.sh)$")
        .expect("valid regex")
});

/// One environment validation run before the stack is touched.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, ctx: &StackContext) -> Result<CheckResult>;
}

/// The built-in battery, in the order it runs.
#[derive(Debug, Clone)]
pub enum StandardCheck {
    System,
    DockerInstalled,
    DockerDaemon,
    DockerPermissions,
    ComposeVersion,
    Tools,
    Network { endpoints: Vec<String> },
    DiskSpace { path: PathBuf, min_gb: f64, recommended_gb: f64 },
    FilePermissions { dir: PathBuf },
}

impl StandardCheck {
    pub fn battery(config: &StackConfig) -> Vec<StandardCheck> {
        vec![
            StandardCheck::System,
            StandardCheck::DockerInstalled,
            StandardCheck::DockerDaemon,
            StandardCheck::DockerPermissions,
            StandardCheck::ComposeVersion,
            StandardCheck::Tools,
            StandardCheck::Network {
                endpoints: REGISTRY_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            },
            StandardCheck::DiskSpace {
                path: config.project_root.clone(),
                min_gb: config.min_disk_gb,
                recommended_gb: config.recommended_disk_gb,
            },
            StandardCheck::FilePermissions {
                dir: config.docker_path(),
            },
        ]
    }
}

#[async_trait]
impl Check for StandardCheck {
    fn name(&self) -> &str {
        match self {
            StandardCheck::System => "system",
            StandardCheck::DockerInstalled => "docker",
            StandardCheck::DockerDaemon => "docker_daemon",
            StandardCheck::DockerPermissions => "docker_permissions",
            StandardCheck::ComposeVersion => "compose",
            StandardCheck::Tools => "tools",
            StandardCheck::Network { .. } => "network",
            StandardCheck::DiskSpace { .. } => "disk_space",
            StandardCheck::FilePermissions { .. } => "permissions",
        }
    }

    async fn run(&self, ctx: &StackContext) -> Result<CheckResult> {
        match self {
            StandardCheck::System => Ok(check_system(std::env::consts::OS, std::env::consts::ARCH)),
            StandardCheck::DockerInstalled => check_docker_installed(ctx).await,
            StandardCheck::DockerDaemon => check_daemon(ctx).await,
            StandardCheck::DockerPermissions => check_permissions(ctx).await,
            StandardCheck::ComposeVersion => check_compose(ctx).await,
            StandardCheck::Tools => Ok(check_tools(&REQUIRED_TOOLS)),
            StandardCheck::Network { endpoints } => Ok(check_network(ctx, endpoints).await),
            StandardCheck::DiskSpace {
                path,
                min_gb,
                recommended_gb,
            } => Ok(disk_space_result(
                available_bytes(path).map(|b| b as f64 / GIB),
                *min_gb,
                *recommended_gb,
            )),
            StandardCheck::FilePermissions { dir } => Ok(check_file_permissions(dir)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrerequisiteReport {
    pub checks: Vec<NamedCheck>,
}

impl PrerequisiteReport {
    /// False iff any check failed; warnings do not count.
    pub fn passed(&self) -> bool {
        self.checks
            .iter()
            .all(|c| c.result.status != CheckStatus::Fail)
    }

    fn messages(&self, status: CheckStatus) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.result.status == status)
            .map(|c| format!("{}: {}", c.name, c.result.message))
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(CheckStatus::Fail)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages(CheckStatus::Warning)
    }

    /// Hints derived from failure messages. Matching is by substring, so the
    /// wording of check messages above is load-bearing.
    pub fn fix_suggestions(&self) -> Vec<String> {
        let mut suggestions: Vec<String> = Vec::new();
        let failures = self
            .checks
            .iter()
            .filter(|c| c.result.status == CheckStatus::Fail);
        for check in failures {
            let e = check.result.message.to_lowercase();
            let hint = if e.contains("compose")
                && (e.contains("below minimum") || e.contains("not found"))
            {
                "Install or upgrade Docker Compose v2: https://docs.docker.com/compose/install/"
            } else if e.contains("docker") && e.contains("not found") {
                "Install Docker: https://docs.docker.com/get-docker/"
            } else if e.contains("docker daemon") && e.contains("not running") {
                "Start Docker: sudo systemctl start docker (Linux) or start Docker Desktop"
            } else if e.contains("docker permission") {
                "Add user to docker group: sudo usermod -aG docker $USER (then log out and in)"
            } else if e.contains("missing tools") {
                "Install the missing tools with your package manager"
            } else if e.contains("network connectivity") {
                "Check internet connection and firewall settings"
            } else if e.contains("disk space") {
                "Free up disk space or use a different directory"
            } else if e.contains("permission") {
                "Check file permissions and ownership"
            } else {
                continue;
            };
            if !suggestions.iter().any(|s| s == hint) {
                suggestions.push(hint.to_string());
            }
        }
        suggestions
    }
}

pub struct PrerequisiteChecker {
    checks: Vec<Box<dyn Check>>,
}

impl PrerequisiteChecker {
    pub fn new(checks: Vec<Box<dyn Check>>) -> Self {
        Self { checks }
    }

    pub fn standard(config: &StackConfig) -> Self {
        Self::new(
            StandardCheck::battery(config)
                .into_iter()
                .map(|c| Box::new(c) as Box<dyn Check>)
                .collect(),
        )
    }

    /// Run every check in order. A check that errors is recorded as a failure.
    pub async fn check_all(&self, ctx: &StackContext) -> PrerequisiteReport {
        ctx.reporter.step("Checking system prerequisites...");
        let mut report = PrerequisiteReport::default();
        for check in &self.checks {
            let name = check.name().to_string();
            let result = match check.run(ctx).await {
                Ok(result) => result,
                Err(e) => CheckResult::fail(format!("check could not run: {e}")),
            };
            let line = format!("{}: {}", title(&name), result.message);
            match result.status {
                CheckStatus::Pass => {
                    tracing::debug!(check = %name, message = %result.message, "check passed");
                    ctx.reporter.success(&line);
                }
                CheckStatus::Warning => {
                    tracing::warn!(check = %name, message = %result.message, "check warning");
                    ctx.reporter.warn(&line);
                }
                CheckStatus::Fail => {
                    tracing::error!(check = %name, message = %result.message, "check failed");
                    ctx.reporter.error(&line);
                }
            }
            report.checks.push(NamedCheck { name, result });
        }
        report
    }
}

/// `docker_daemon` -> `Docker Daemon`.
pub fn title(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn check_system(os: &str, arch: &str) -> CheckResult {
    if !SUPPORTED_OS.contains(&os) {
        return CheckResult::fail(format!(
            "Unsupported OS: {os}. Supported: {}",
            SUPPORTED_OS.join(", ")
        ));
    }
    if !SUPPORTED_ARCH.contains(&arch) {
        return CheckResult::warning(format!(
            "Architecture {arch} may not be fully supported. Recommended: x86_64"
        ));
    }
    CheckResult::pass(format!("{os} {arch} detected"))
        .detail("os", os)
        .detail("arch", arch)
}

fn quick() -> RunOptions {
    RunOptions::default().with_timeout(COMMAND_TIMEOUT)
}

async fn check_docker_installed(ctx: &StackContext) -> Result<CheckResult> {
    let out = match ctx.runner.run(&argv(&["docker", "--version"]), &quick()).await {
        Ok(out) => out,
        Err(_) => {
            return Ok(CheckResult::fail(
                "Docker command not found. Please install Docker.",
            ))
        }
    };
    if !out.success() {
        return Ok(CheckResult::fail("Docker not found or not working"));
    }
    let Some(version) = extract_version(&out.stdout) else {
        return Ok(CheckResult::warning(format!(
            "Could not parse Docker version from '{}'",
            out.stdout.trim()
        )));
    };
    if !version_at_least(&version, MIN_DOCKER_VERSION) {
        return Ok(CheckResult::warning(format!(
            "Docker version {version} is below recommended {MIN_DOCKER_VERSION}"
        )));
    }
    Ok(CheckResult::pass(format!("Docker {version} installed")).detail("version", version))
}

async fn check_daemon(ctx: &StackContext) -> Result<CheckResult> {
    match ctx.runner.run(&argv(&["docker", "info"]), &quick()).await {
        Ok(out) if out.success() => Ok(CheckResult::pass("Docker daemon is running")),
        Ok(_) => Ok(CheckResult::fail(
            "Docker daemon is not running. Please start Docker service.",
        )),
        Err(e) => Ok(CheckResult::fail(format!(
            "Docker daemon is not running: {e}"
        ))),
    }
}

async fn check_permissions(ctx: &StackContext) -> Result<CheckResult> {
    let out = ctx.runner.run(&argv(&["docker", "ps"]), &quick()).await?;
    let result = if out.success() {
        CheckResult::pass("Docker permissions OK")
    } else {
        let stderr = out.stderr.to_lowercase();
        if stderr.contains("permission denied") {
            CheckResult::fail(
                "Docker permission denied. Add user to docker group or run with sudo.",
            )
        } else {
            CheckResult::fail(format!(
                "Docker permission check failed: {}",
                stderr.trim()
            ))
        }
    };
    Ok(match docker_group_membership() {
        Some(member) => result.detail("docker_group", if member { "member" } else { "not a member" }),
        None => result,
    })
}

/// Whether the caller is root or in the `docker` group. `None` when it cannot be told.
#[cfg(unix)]
fn docker_group_membership() -> Option<bool> {
    // SAFETY: getgrnam returns a pointer into static storage or null; we copy
    // gr_gid out immediately. getgroups writes at most `len` entries.
    unsafe {
        if libc::geteuid() == 0 {
            return Some(true);
        }
        let group = libc::getgrnam(c"docker".as_ptr());
        if group.is_null() {
            return Some(false);
        }
        let gid = (*group).gr_gid;
        let count = libc::getgroups(0, std::ptr::null_mut());
        if count < 0 {
            return None;
        }
        let mut groups = vec![0 as libc::gid_t; count as usize];
        let written = libc::getgroups(count, groups.as_mut_ptr());
        if written < 0 {
            return None;
        }
        groups.truncate(written as usize);
        Some(groups.contains(&gid))
    }
}

#[cfg(not(unix))]
fn docker_group_membership() -> Option<bool> {
    None
}

async fn check_compose(ctx: &StackContext) -> Result<CheckResult> {
    let plugin = docker::docker(ctx.runner.as_ref(), &["compose", "version"]).await;
    let output = match plugin {
        Ok(out) if out.success() => Some(out.stdout),
        _ => match ctx
            .runner
            .run(&argv(&["docker-compose", "--version"]), &quick())
            .await
        {
            Ok(out) if out.success() => Some(out.stdout),
            _ => None,
        },
    };
    let Some(output) = output else {
        return Ok(CheckResult::fail("Docker Compose not found"));
    };
    Ok(compose_version_result(&output))
}

fn compose_version_result(output: &str) -> CheckResult {
    let Some(version) = extract_version(output) else {
        return CheckResult::warning(format!(
            "Could not parse Docker Compose version from '{}'",
            output.trim()
        ));
    };
    if !version_at_least(&version, MIN_COMPOSE_VERSION) {
        return CheckResult::fail(format!(
            "Docker Compose {version} is below minimum {MIN_COMPOSE_VERSION}"
        ));
    }
    if !version_at_least(&version, RECOMMENDED_COMPOSE_VERSION) {
        return CheckResult::warning(format!(
            "Docker Compose {version} works but {RECOMMENDED_COMPOSE_VERSION}+ recommended"
        ));
    }
    CheckResult::pass(format!("Docker Compose {version} OK")).detail("version", version)
}

fn check_tools(tools: &[&str]) -> CheckResult {
    let missing: Vec<&str> = tools.iter().copied().filter(|t| which(t).is_none()).collect();
    if missing.is_empty() {
        CheckResult::pass(format!("{} available", tools.join(", ")))
    } else {
        CheckResult::fail(format!("Missing tools: {}", missing.join(", ")))
    }
}

/// Locate `bin` on `PATH`.
pub fn which(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{bin}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

async fn check_network(ctx: &StackContext, endpoints: &[String]) -> CheckResult {
    let mut reachable = 0;
    for url in endpoints {
        // Any HTTP answer proves connectivity; only transport errors count.
        match ctx
            .http
            .head(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(_) => reachable += 1,
            Err(e) => tracing::debug!(url = %url, error = %e, "endpoint unreachable"),
        }
    }
    if reachable == endpoints.len() {
        CheckResult::pass("Network connectivity OK")
    } else if reachable > 0 {
        CheckResult::warning(format!(
            "Limited network connectivity ({reachable}/{} endpoints reachable)",
            endpoints.len()
        ))
    } else {
        CheckResult::fail("No network connectivity. Check internet connection.")
    }
}

fn disk_space_result(available_gb: Option<f64>, min_gb: f64, recommended_gb: f64) -> CheckResult {
    let Some(gb) = available_gb else {
        return CheckResult::warning("Could not check disk space");
    };
    if gb < min_gb {
        CheckResult::fail(format!(
            "Insufficient disk space: {gb:.2}GB available, need {min_gb}GB"
        ))
    } else if gb < recommended_gb {
        CheckResult::warning(format!(
            "Low disk space: {gb:.2}GB available, recommended {recommended_gb}GB+"
        ))
    } else {
        CheckResult::pass(format!("Disk space OK: {gb:.2}GB available"))
            .detail("available_gb", format!("{gb:.2}"))
    }
}

#[cfg(unix)]
fn available_bytes(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    // SAFETY: statvfs only writes into the zeroed struct we own.
    unsafe {
        let mut stat: libc::statvfs = std::mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return None;
        }
        Some(stat.f_bavail as u64 * stat.f_frsize as u64)
    }
}

#[cfg(windows)]
fn available_bytes(path: &Path) -> Option<u64> {
    use std::os::windows::ffi::OsStrExt;

    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
    let mut free: u64 = 0;
    // SAFETY: the path is NUL-terminated and the out pointer is valid.
    let ok = unsafe {
        windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW(
            wide.as_ptr(),
            &mut free,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    (ok != 0).then_some(free)
}

#[cfg(not(any(unix, windows)))]
fn available_bytes(_path: &Path) -> Option<u64> {
    None
}

fn check_file_permissions(dir: &Path) -> CheckResult {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return CheckResult::pass("No project files to check");
    };
    let mut issues = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        let relevant = PROJECT_FILE_RE.is_match(&name) || (name == "scripts" && path.is_dir());
        if relevant && !is_accessible(&path) {
            issues.push(name);
        }
    }
    if issues.is_empty() {
        CheckResult::pass("File permissions OK")
    } else {
        issues.sort();
        CheckResult::fail(format!("Permission issues with: {}", issues.join(", ")))
    }
}

fn is_accessible(path: &Path) -> bool {
    if path.is_dir() {
        std::fs::read_dir(path).is_ok()
    } else {
        std::fs::File::open(path).is_ok()
    }
}

/// First `major.minor[.patch]` found in `text`.
pub fn extract_version(text: &str) -> Option<String> {
    VERSION_RE.find(text).map(|m| m.as_str().to_string())
}

/// Numeric dotted comparison; missing components count as zero.
pub fn version_at_least(version: &str, minimum: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (mut a, mut b) = (parse(version), parse(minimum));
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a >= b
}
