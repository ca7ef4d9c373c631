// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::path::PathBuf;

use devstack_core::models::{CheckResult, NamedCheck, ServiceState};
use devstack_core::services::network::NetworkStatus;
use devstack_core::services::orchestrator::{ServiceOutcome, ServiceStatus};
use devstack_core::services::security::{Finding, Severity};

pub fn network(name: &str, id: Option<&str>, containers: usize) -> NetworkStatus {
    NetworkStatus {
        name: name.into(),
        id: id.map(str::to_string),
        containers,
    }
}

pub fn service(
    name: &str,
    state: ServiceState,
    docker_status: Option<&str>,
    ports: &[&str],
    container: &str,
) -> ServiceStatus {
    ServiceStatus {
        name: name.into(),
        display_name: name.to_uppercase(),
        container_name: container.into(),
        ports: ports.iter().map(|p| p.to_string()).collect(),
        state,
        docker_status: docker_status.map(str::to_string),
    }
}

pub fn outcome(name: &str, display_name: &str, state: ServiceState) -> ServiceOutcome {
    ServiceOutcome {
        name: name.into(),
        display_name: display_name.into(),
        state,
    }
}

pub fn check(name: &str, result: CheckResult) -> NamedCheck {
    NamedCheck {
        name: name.into(),
        result,
    }
}

pub fn finding(file: &str, line: usize, kind: &str, key: &str, value: &str, severity: Severity) -> Finding {
    Finding {
        file: PathBuf::from(file),
        line,
        kind: kind.into(),
        key: key.into(),
        value: value.into(),
        severity,
    }
}
