use std::time::Duration;

use serde::Serialize;

use crate::context::StackContext;
use crate::error::{Result, StackError};
use crate::models::{EnvVariableSet, ServiceDescriptor, ServiceState, StackConfig, VerifyOutcome};
use crate::services::catalog;
use crate::services::docker;
use crate::services::env_file;
use crate::services::lifecycle;
use crate::services::network::{self, NetworkStatus};
use crate::services::prerequisites::PrerequisiteChecker;

/// Final state of one service after `start_all`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOutcome {
    pub name: String,
    pub display_name: String,
    pub state: ServiceState,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StartReport {
    pub services: Vec<ServiceOutcome>,
}

impl StartReport {
    /// Every service is Ready, or Launched when the run did not wait.
    pub fn succeeded(&self) -> bool {
        self.services.iter().all(|s| s.state.satisfies_dependents())
    }

    pub fn state_of(&self, name: &str) -> Option<ServiceState> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.state)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub display_name: String,
    pub container_name: String,
    pub ports: Vec<String>,
    pub state: ServiceState,
    /// `docker ps` status line, absent when the container is not running.
    pub docker_status: Option<String>,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        self.docker_status
            .as_deref()
            .is_some_and(|s| s.starts_with("Up"))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub networks: Vec<NetworkStatus>,
    pub services: Vec<ServiceStatus>,
}

/// Drives the whole stack: prerequisites, environment, networks, then each
/// service in order through its state machine.
pub struct Orchestrator {
    ctx: StackContext,
    config: StackConfig,
    include_monitoring: bool,
    services: Vec<ServiceDescriptor>,
    states: Vec<ServiceState>,
    /// Set when the service list was supplied explicitly and must not be
    /// rebuilt from the freshly loaded `.env`.
    pinned_services: bool,
    prerequisites: PrerequisiteChecker,
}

impl Orchestrator {
    pub fn new(ctx: StackContext, config: StackConfig, include_monitoring: bool) -> Self {
        let env = match env_file::load(&config.env_path()) {
            Ok(env) => env,
            Err(_) => EnvVariableSet::new(),
        };
        let services = catalog::payment_stack(&config, &env, include_monitoring);
        let prerequisites = PrerequisiteChecker::standard(&config);
        let states = vec![ServiceState::Pending; services.len()];
        Self {
            ctx,
            config,
            include_monitoring,
            services,
            states,
            pinned_services: false,
            prerequisites,
        }
    }

    pub fn with_services(mut self, services: Vec<ServiceDescriptor>) -> Self {
        self.states = vec![ServiceState::Pending; services.len()];
        self.services = services;
        self.pinned_services = true;
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: PrerequisiteChecker) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn state(&self, name: &str) -> Option<ServiceState> {
        self.services
            .iter()
            .position(|d| d.name == name)
            .map(|i| self.states[i])
    }

    /// Bring the stack up.
    ///
    /// Prerequisite, environment and network failures abort with an error.
    /// After that the run is best-effort: a failed service does not stop the
    /// batch, but anything depending on it is skipped.
    pub async fn start_all(&mut self, skip_prerequisites: bool, wait: bool) -> Result<StartReport> {
        self.ctx.reporter.step("Starting payment API stack...");

        if skip_prerequisites {
            self.ctx.reporter.warn("Skipping prerequisite checks");
        } else {
            let report = self.prerequisites.check_all(&self.ctx).await;
            if !report.passed() {
                for suggestion in report.fix_suggestions() {
                    self.ctx.reporter.info(&format!("  Suggestion: {suggestion}"));
                }
                return Err(StackError::Prerequisites(report.errors().join("; ")));
            }
            self.ctx.reporter.success("All prerequisites met");
        }

        let env = env_file::setup(&self.ctx, &self.config)?;
        if !self.pinned_services {
            self.services = catalog::payment_stack(&self.config, &env, self.include_monitoring);
        }
        self.states = vec![ServiceState::Pending; self.services.len()];

        self.ctx.reporter.step("Preparing docker networks...");
        network::create_all(&self.ctx, &self.config.networks).await?;

        let pause = Duration::from_secs(self.config.inter_service_pause_secs);
        let mut launched_any = false;
        for index in 0..self.services.len() {
            if let Some(blocker) = self.blocking_dependency(index) {
                let descriptor = &self.services[index];
                self.ctx.reporter.warn(&format!(
                    "Skipping {}: dependency {blocker} is not ready",
                    descriptor.display_name
                ));
                self.transition(index, ServiceState::Skipped);
                continue;
            }
            if launched_any && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            launched_any = true;
            self.start_one(index, wait).await;
        }

        let report = StartReport {
            services: self
                .services
                .iter()
                .zip(&self.states)
                .map(|(d, state)| ServiceOutcome {
                    name: d.name.clone(),
                    display_name: d.display_name.clone(),
                    state: *state,
                })
                .collect(),
        };
        if report.succeeded() {
            self.ctx.reporter.success("All services started");
        } else {
            self.ctx.reporter.error("Some services did not start");
        }
        Ok(report)
    }

    async fn start_one(&mut self, index: usize, wait: bool) {
        self.transition(index, ServiceState::Starting);
        let descriptor = self.services[index].clone();
        match lifecycle::launch(&self.ctx, &descriptor).await {
            Ok(true) => {}
            Ok(false) => {
                self.transition(index, ServiceState::Failed);
                return;
            }
            Err(e) => {
                self.ctx.reporter.error(&format!(
                    "{} could not be started: {e}",
                    descriptor.display_name
                ));
                self.transition(index, ServiceState::Failed);
                return;
            }
        }
        if !wait {
            self.transition(index, ServiceState::Launched);
            return;
        }

        self.transition(index, ServiceState::Verifying);
        let state = match lifecycle::verify(&self.ctx, &descriptor, descriptor.max_attempts).await {
            VerifyOutcome::Ready => ServiceState::Ready,
            VerifyOutcome::TimedOut | VerifyOutcome::Failed(_) => ServiceState::Failed,
        };
        self.transition(index, state);
    }

    /// First dependency that is part of this run and not Ready.
    fn blocking_dependency(&self, index: usize) -> Option<String> {
        self.services[index]
            .depends_on
            .iter()
            .find(|dep| match self.services.iter().position(|d| &d.name == *dep) {
                Some(i) => !self.states[i].satisfies_dependents(),
                None => false,
            })
            .cloned()
    }

    fn transition(&mut self, index: usize, state: ServiceState) {
        self.states[index] = state;
        let name = &self.services[index].name;
        tracing::info!(service = %name, state = state.label(), "state changed");
        self.ctx
            .reporter
            .info(&format!("{} -> {}", name.to_uppercase(), state.label()));
    }

    /// Stop every service, last started first. Keeps going after failures.
    pub async fn stop_all(&self) -> bool {
        self.ctx.reporter.step("Stopping all services...");
        let mut all_stopped = true;
        for descriptor in self.services.iter().rev() {
            match lifecycle::stop(&self.ctx, descriptor).await {
                Ok(true) => {}
                Ok(false) => all_stopped = false,
                Err(e) => {
                    self.ctx.reporter.error(&format!(
                        "Error stopping {}: {e}",
                        descriptor.display_name
                    ));
                    all_stopped = false;
                }
            }
        }
        all_stopped
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let runner = self.ctx.runner.as_ref();
        let networks = network::network_status(runner, &self.config.networks).await?;
        let mut services = Vec::with_capacity(self.services.len());
        for (descriptor, state) in self.services.iter().zip(&self.states) {
            services.push(ServiceStatus {
                name: descriptor.name.clone(),
                display_name: descriptor.display_name.clone(),
                container_name: descriptor.container_name.clone(),
                ports: descriptor.ports.clone(),
                state: *state,
                docker_status: docker::container_status(runner, &descriptor.container_name).await?,
            });
        }
        Ok(StatusReport { networks, services })
    }

    /// Remove leftover containers. Failures are reported and skipped.
    pub async fn cleanup_all(&self) -> bool {
        self.ctx.reporter.step("Cleaning up existing containers...");
        let mut clean = true;
        for descriptor in &self.services {
            match lifecycle::cleanup_existing(&self.ctx, descriptor).await {
                Ok(true) => self
                    .ctx
                    .reporter
                    .success(&format!("{} cleaned", descriptor.display_name)),
                Ok(false) => clean = false,
                Err(e) => {
                    self.ctx.reporter.warn(&format!(
                        "Error cleaning {}: {e}",
                        descriptor.display_name
                    ));
                    clean = false;
                }
            }
        }
        clean
    }

    pub async fn logs(&self, name: &str, tail: usize, follow: bool) -> Result<bool> {
        let descriptor = catalog::find(&self.services, name)?;
        lifecycle::logs(&self.ctx, descriptor, tail, follow).await
    }

    pub async fn restart(&self, name: &str) -> Result<bool> {
        let descriptor = catalog::find(&self.services, name)?;
        lifecycle::restart(&self.ctx, descriptor).await
    }
}
