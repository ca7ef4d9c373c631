//! Plain-text reports printed after a command finishes.

use devstack_core::models::CheckStatus;
use devstack_core::services::hooks::HookStatus;
use devstack_core::services::orchestrator::{StartReport, StatusReport};
use devstack_core::services::prerequisites::{title, PrerequisiteReport};
use devstack_core::services::security::{ScanReport, Severity};

/// Left-aligned columns separated by two spaces.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }
    let mut lines = vec![row_line(&widths, headers)];
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        lines.push(row_line(&widths, &cells));
    }
    lines.join("\n")
}

fn row_line(widths: &[usize], cells: &[&str]) -> String {
    let mut out = String::new();
    for (i, cell) in cells.iter().enumerate() {
        out.push_str(cell);
        if i + 1 < cells.len() {
            let pad = widths[i] - cell.chars().count() + 2;
            out.push_str(&" ".repeat(pad));
        }
    }
    out.trim_end().to_string()
}

pub fn status(report: &StatusReport) -> String {
    let networks: Vec<Vec<String>> = report
        .networks
        .iter()
        .map(|n| {
            vec![
                n.name.clone(),
                n.id.clone().unwrap_or_else(|| "missing".into()),
                n.containers.to_string(),
            ]
        })
        .collect();
    let services: Vec<Vec<String>> = report
        .services
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.state.label().to_string(),
                s.docker_status.clone().unwrap_or_else(|| "stopped".into()),
                if s.ports.is_empty() {
                    "-".into()
                } else {
                    s.ports.join(",")
                },
                s.container_name.clone(),
            ]
        })
        .collect();
    format!(
        "{}\n\n{}",
        table(&["NETWORK", "ID", "CONTAINERS"], &networks),
        table(&["SERVICE", "STATE", "DOCKER", "PORTS", "CONTAINER"], &services)
    )
}

pub fn start(report: &StartReport) -> String {
    let rows: Vec<Vec<String>> = report
        .services
        .iter()
        .map(|s| vec![s.display_name.clone(), s.state.label().to_string()])
        .collect();
    table(&["SERVICE", "STATE"], &rows)
}

pub fn prerequisites(report: &PrerequisiteReport) -> String {
    let rows: Vec<Vec<String>> = report
        .checks
        .iter()
        .map(|c| {
            let status = match c.result.status {
                CheckStatus::Pass => "PASS",
                CheckStatus::Warning => "WARN",
                CheckStatus::Fail => "FAIL",
            };
            vec![title(&c.name), status.to_string(), c.result.message.clone()]
        })
        .collect();
    let errors = report.errors().len();
    let warnings = report.warnings().len();
    let verdict = if report.passed() {
        format!("Result: PASSED ({warnings} warning(s))")
    } else {
        format!("Result: FAILED ({errors} error(s), {warnings} warning(s))")
    };
    format!("{}\n\n{verdict}", table(&["CHECK", "STATUS", "MESSAGE"], &rows))
}

pub fn suggestions(report: &PrerequisiteReport) -> String {
    let mut out = String::from("Fix suggestions:");
    for suggestion in report.fix_suggestions() {
        out.push_str(&format!("\n  - {suggestion}"));
    }
    out
}

pub fn scan(report: &ScanReport) -> String {
    let mut out = format!(
        "Files scanned: {}\nIssues found: {}",
        report.files_scanned,
        report.findings.len()
    );
    if report.findings.is_empty() {
        out.push_str("\n\nNo security issues found.");
        return out;
    }
    for severity in [Severity::High, Severity::Medium, Severity::Low] {
        let mut findings = report.with_severity(severity).peekable();
        if findings.peek().is_none() {
            continue;
        }
        out.push_str(&format!("\n\n{} severity issues:", severity.label()));
        for f in findings {
            out.push_str(&format!(
                "\n  {}:{}\n    {}: {} = {}",
                f.file.display(),
                f.line,
                f.kind,
                f.key,
                f.value
            ));
        }
    }
    out
}

pub fn hooks(status: &HookStatus) -> String {
    let mut lines: Vec<String> = status
        .tools
        .iter()
        .map(|(name, present)| {
            format!("{name}: {}", if *present { "installed" } else { "missing" })
        })
        .collect();
    let flag = |ok: bool, yes: &str, no: &str| if ok { yes.to_string() } else { no.to_string() };
    lines.push(format!("husky: {}", flag(status.husky_dir, "configured", "not configured")));
    lines.push(format!("pre-commit: {}", flag(status.pre_commit, "present", "missing")));
    lines.push(format!("pre-push: {}", flag(status.pre_push, "present", "missing")));
    lines.join("\n")
}
