use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Where a service sits in the startup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    Datastore,
    Application,
    Observability,
}

/// How the container is brought up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    /// `docker run -d` with flags derived from the descriptor.
    Run,
    /// `docker compose -f <file> up -d <service>`.
    Compose { file: PathBuf, service: String },
}

/// Docker-level health check passed through to `docker run --health-*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub test: Vec<String>,
    pub interval: String,
    pub timeout: String,
    pub retries: u32,
}

impl HealthCheck {
    pub fn new(test: &[&str], interval: &str, timeout: &str, retries: u32) -> Self {
        Self {
            test: test.iter().map(|s| s.to_string()).collect(),
            interval: interval.into(),
            timeout: timeout.into(),
            retries,
        }
    }

    /// The command portion of `test`, without the leading `CMD` / `CMD-SHELL` marker.
    pub fn command_line(&self) -> String {
        match self.test.first().map(String::as_str) {
            Some("CMD") | Some("CMD-SHELL") => self.test[1..].join(" "),
            _ => self.test.join(" "),
        }
    }
}

/// How readiness is decided once the container is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessProbe {
    /// `docker exec <container> <command>`; succeeds on exit 0 and, when set,
    /// when stdout contains `expect`.
    Exec {
        command: Vec<String>,
        expect: Option<String>,
    },
    /// Only require the container to report `Up`.
    ContainerUp,
    /// HTTP GET from the host; any status in `accept` counts as ready.
    Http { url: String, accept: Vec<u16> },
}

/// Static description of one backing service.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub display_name: String,
    pub container_name: String,
    pub image: String,
    pub ports: Vec<String>,
    pub environment: Vec<String>,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,
    pub depends_on: Vec<String>,
    pub health_check: Option<HealthCheck>,
    pub command: Vec<String>,
    pub launch: Launch,
    pub probe: ReadinessProbe,
    pub tier: Tier,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub run_entrypoint: bool,
}

impl ServiceDescriptor {
    pub fn new(name: &str, display_name: &str, container_name: &str, tier: Tier) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            container_name: container_name.into(),
            image: String::new(),
            ports: Vec::new(),
            environment: Vec::new(),
            volumes: Vec::new(),
            networks: Vec::new(),
            depends_on: Vec::new(),
            health_check: None,
            command: Vec::new(),
            launch: Launch::Run,
            probe: ReadinessProbe::ContainerUp,
            tier,
            poll_interval: Duration::from_secs(2),
            max_attempts: 30,
            run_entrypoint: false,
        }
    }

    pub fn image(mut self, image: &str) -> Self {
        self.image = image.into();
        self
    }

    pub fn ports(mut self, ports: &[&str]) -> Self {
        self.ports = to_strings(ports);
        self
    }

    pub fn environment(mut self, environment: Vec<String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn volumes(mut self, volumes: &[&str]) -> Self {
        self.volumes = to_strings(volumes);
        self
    }

    pub fn networks(mut self, networks: &[&str]) -> Self {
        self.networks = to_strings(networks);
        self
    }

    pub fn depends_on(mut self, services: &[&str]) -> Self {
        self.depends_on = to_strings(services);
        self
    }

    pub fn health_check(mut self, health_check: HealthCheck) -> Self {
        self.health_check = Some(health_check);
        self
    }

    pub fn command(mut self, command: &[&str]) -> Self {
        self.command = to_strings(command);
        self
    }

    pub fn compose(mut self, file: PathBuf, service: &str) -> Self {
        self.launch = Launch::Compose {
            file,
            service: service.into(),
        };
        self
    }

    pub fn probe(mut self, probe: ReadinessProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_entrypoint(mut self) -> Self {
        self.run_entrypoint = true;
        self
    }

    pub fn is_compose(&self) -> bool {
        matches!(self.launch, Launch::Compose { .. })
    }

    /// First published host port, for status display.
    pub fn host_port(&self) -> Option<&str> {
        self.ports.first().and_then(|p| p.split(':').next())
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_strips_cmd_marker() {
        let hc = HealthCheck::new(&["CMD", "redis-cli", "ping"], "10s", "3s", 3);
        assert_eq!(hc.command_line(), "redis-cli ping");

        let shell = HealthCheck::new(
            &["CMD-SHELL", "curl -f http://localhost:9200 || exit 1"],
            "30s",
            "10s",
            3,
        );
        assert_eq!(shell.command_line(), "curl -f http://localhost:9200 || exit 1");
    }

    #[test]
    fn host_port_takes_first_mapping() {
        let d = ServiceDescriptor::new("redis", "Redis", "payment-redis", Tier::Datastore)
            .ports(&["6377:6379"]);
        assert_eq!(d.host_port(), Some("6377"));

        let bare = ServiceDescriptor::new("app", "Laravel", "payment-api", Tier::Application);
        assert_eq!(bare.host_port(), None);
    }
}
