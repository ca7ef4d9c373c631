use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

const SKIPPED_DIRS: [&str; 6] = [".git", "__pycache__", ".venv", "node_modules", "vendor", "target"];
const SKIPPED_FILES: [&str; 3] = [".env.example", "README.md", "CHANGELOG.md"];
const SKIPPED_EXTENSIONS: [&str; 3] = ["log", "pyc", "pyo"];
const MIN_VALUE_LEN: usize = 8;
const MAX_SHOWN_LEN: usize = 20;

/// Placeholder values that appear in templates and docs.
const SAFE_VALUES: [&str; 15] = [
    "password",
    "your_password_here",
    "your_mysql_password_here",
    "your_mongo_password_here",
    "your_redis_password_here",
    "changeme",
    "example",
    "placeholder",
    "dummy",
    "test",
    "localhost",
    "127.0.0.1",
    "payment-mysql",
    "payment-redis",
    "payment-mongo",
];

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("valid regex")
}

static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("password", pattern(r#"(?i)\b(password)\s*[=:]\s*["']?([^"\s';,]+)["']?"#)),
        ("api_key", pattern(r#"(?i)\b(api_key|apikey)\s*[=:]\s*["']?([^"\s';,]+)["']?"#)),
        ("secret", pattern(r#"(?i)\b(secret)\s*[=:]\s*["']?([^"\s';,]+)["']?"#)),
        ("token", pattern(r#"(?i)\b(token|auth_token)\s*[=:]\s*["']?([^"\s';,]+)["']?"#)),
        ("private_key", pattern(r"(?i)-----BEGIN\s+(?:RSA\s+)?PRIVATE\s+KEY-----")),
        ("aws_key", pattern(r"\b(AKIA[0-9A-Z]{16})\b")),
        ("generic_key", pattern(r#"(?i)\b(key)\s*[=:]\s*["']?([a-zA-Z0-9_-]{20,})["']?"#)),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub file: PathBuf,
    /// 1-based; 0 when the file could not be read.
    pub line: usize,
    pub kind: String,
    pub key: String,
    /// Truncated so the report never echoes a full secret.
    pub value: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// True unless something HIGH or MEDIUM turned up.
    pub fn passed(&self) -> bool {
        !self.findings.iter().any(|f| f.severity != Severity::Low)
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }
}

/// Walk `root` looking for hard-coded credentials.
pub fn scan(root: &Path) -> ScanReport {
    let mut report = ScanReport::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || is_skipped_file(entry.path()) {
            continue;
        }
        let display = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        match std::fs::read(entry.path()) {
            Ok(bytes) if is_binary(&bytes) => continue,
            Ok(bytes) => {
                report.files_scanned += 1;
                report
                    .findings
                    .extend(scan_text(&display, &String::from_utf8_lossy(&bytes)));
            }
            Err(e) => report.findings.push(Finding {
                file: display,
                line: 0,
                kind: "error".into(),
                key: "scan_error".into(),
                value: e.to_string(),
                severity: Severity::Low,
            }),
        }
    }
    tracing::info!(
        files = report.files_scanned,
        findings = report.findings.len(),
        "security scan finished"
    );
    report
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && SKIPPED_DIRS.contains(&&*name)
}

fn is_skipped_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if SKIPPED_FILES.contains(&name.as_str()) {
        return true;
    }
    path.extension()
        .is_some_and(|ext| SKIPPED_EXTENSIONS.contains(&&*ext.to_string_lossy()))
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(1024).any(|b| *b == 0)
}

fn scan_text(file: &Path, text: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (index, line) in text.lines().enumerate() {
        for (kind, re) in PATTERNS.iter() {
            for caps in re.captures_iter(line) {
                let (key, value) = match (caps.get(1), caps.get(2)) {
                    (Some(key), Some(value)) => (key.as_str(), value.as_str()),
                    (Some(only), None) => (*kind, only.as_str()),
                    _ => (*kind, caps.get(0).map_or("", |m| m.as_str())),
                };
                if is_ignored_value(value) {
                    continue;
                }
                findings.push(Finding {
                    file: file.to_path_buf(),
                    line: index + 1,
                    kind: kind.to_string(),
                    key: key.to_string(),
                    value: truncate(value),
                    severity: if matches!(*kind, "private_key" | "aws_key") {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                });
            }
        }
    }
    findings
}

fn is_ignored_value(value: &str) -> bool {
    value.chars().count() < MIN_VALUE_LEN
        || SAFE_VALUES.contains(&value.to_lowercase().as_str())
}

fn truncate(value: &str) -> String {
    if value.chars().count() > MAX_SHOWN_LEN {
        format!("{}...", value.chars().take(MAX_SHOWN_LEN).collect::<String>())
    } else {
        value.to_string()
    }
}
