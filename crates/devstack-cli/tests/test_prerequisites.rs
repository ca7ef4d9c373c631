mod common;

use devstack_cli::render;
use devstack_core::models::CheckResult;
use devstack_core::services::prerequisites::PrerequisiteReport;

use common::check;

fn mixed_report() -> PrerequisiteReport {
    PrerequisiteReport {
        checks: vec![
            check("system", CheckResult::pass("linux x86_64 detected")),
            check(
                "docker",
                CheckResult::warning("Docker version 19.03.12 is below recommended 20.10.0"),
            ),
            check(
                "docker_daemon",
                CheckResult::fail("Docker daemon is not running. Please start Docker service."),
            ),
            check("disk_space", CheckResult::pass("Disk space OK: 120.50GB available")),
        ],
    }
}

#[test]
fn prerequisite_summary_renders() {
    insta::assert_snapshot!(render::prerequisites(&mixed_report()), @r###"
    CHECK          STATUS  MESSAGE
    System         PASS    linux x86_64 detected
    Docker         WARN    Docker version 19.03.12 is below recommended 20.10.0
    Docker Daemon  FAIL    Docker daemon is not running. Please start Docker service.
    Disk Space     PASS    Disk space OK: 120.50GB available

    Result: FAILED (1 error(s), 1 warning(s))
    "###);
}

#[test]
fn passing_summary_counts_warnings() {
    let report = PrerequisiteReport {
        checks: vec![
            check("system", CheckResult::pass("linux x86_64 detected")),
            check("network", CheckResult::warning("Limited network connectivity (1/2 endpoints reachable)")),
        ],
    };
    let output = render::prerequisites(&report);
    assert!(output.ends_with("Result: PASSED (1 warning(s))"));
}

#[test]
fn fix_suggestions_render() {
    insta::assert_snapshot!(render::suggestions(&mixed_report()), @r###"
    Fix suggestions:
      - Start Docker: sudo systemctl start docker (Linux) or start Docker Desktop
    "###);
}
