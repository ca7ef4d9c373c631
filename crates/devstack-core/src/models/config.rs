use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_NETWORKS: [&str; 3] = [
    "payment-api-main",
    "payment-api-cache",
    "payment-api-monitoring",
];

/// Project layout and tuning knobs, read from `.devstack.yaml` when present.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Resolved at load time; never read from YAML.
    #[serde(skip)]
    pub project_root: PathBuf,
    pub docker_dir: PathBuf,
    pub app_dir: PathBuf,
    pub app_compose_file: String,
    pub env_file: String,
    pub env_template: String,
    pub networks: Vec<String>,
    pub inter_service_pause_secs: u64,
    pub min_disk_gb: f64,
    pub recommended_disk_gb: f64,
    pub services: HashMap<String, ServiceOverride>,
}

/// Per-service overrides applied on top of the built-in catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceOverride {
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ports: Option<Vec<String>>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            docker_dir: PathBuf::from("infra/docker"),
            app_dir: PathBuf::from("api"),
            app_compose_file: "docker-compose.app.yml".into(),
            env_file: ".env".into(),
            env_template: ".env.example".into(),
            networks: DEFAULT_NETWORKS.iter().map(|n| n.to_string()).collect(),
            inter_service_pause_secs: 2,
            min_disk_gb: 5.0,
            recommended_disk_gb: 10.0,
            services: HashMap::new(),
        }
    }
}

impl StackConfig {
    pub fn with_root(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn docker_path(&self) -> PathBuf {
        self.project_root.join(&self.docker_dir)
    }

    pub fn app_path(&self) -> PathBuf {
        self.project_root.join(&self.app_dir)
    }

    pub fn app_compose_path(&self) -> PathBuf {
        self.docker_path().join(&self.app_compose_file)
    }

    pub fn env_path(&self) -> PathBuf {
        self.docker_path().join(&self.env_file)
    }

    pub fn env_template_path(&self) -> PathBuf {
        self.docker_path().join(&self.env_template)
    }

    /// The application's own `.env`, copied into the docker dir before startup.
    pub fn app_env_path(&self) -> PathBuf {
        self.app_path().join(".env")
    }

    pub fn service_override(&self, name: &str) -> Option<&ServiceOverride> {
        self.services.get(name)
    }
}
