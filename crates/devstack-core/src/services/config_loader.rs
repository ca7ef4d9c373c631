use std::path::Path;

use crate::error::{Result, StackError};
use crate::models::StackConfig;

pub const CONFIG_FILENAME: &str = ".devstack.yaml";

/// Load `.devstack.yaml` from `project_root`, or `explicit` when given.
///
/// A missing default file yields the built-in layout; a missing explicit file
/// is an error.
pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<StackConfig> {
    let config_path = match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => project_root.join(path),
        None => project_root.join(CONFIG_FILENAME),
    };
    if !config_path.exists() {
        if explicit.is_some() {
            return Err(StackError::ConfigNotFound(config_path));
        }
        tracing::debug!(path = %config_path.display(), "no config file, using defaults");
        return Ok(StackConfig::with_root(project_root));
    }

    let contents = std::fs::read_to_string(&config_path)?;
    let mut config: StackConfig = if contents.trim().is_empty() {
        StackConfig::default()
    } else {
        serde_yaml::from_str(&contents).map_err(|e| StackError::InvalidConfig(e.to_string()))?
    };
    config.project_root = project_root.to_path_buf();
    validate(&config)?;
    tracing::debug!(path = %config_path.display(), "loaded config");
    Ok(config)
}

fn validate(config: &StackConfig) -> Result<()> {
    if config.networks.is_empty() {
        return Err(StackError::InvalidConfig(
            "at least one network is required".into(),
        ));
    }
    if config.min_disk_gb > config.recommended_disk_gb {
        return Err(StackError::InvalidConfig(format!(
            "min_disk_gb ({}) exceeds recommended_disk_gb ({})",
            config.min_disk_gb, config.recommended_disk_gb
        )));
    }
    for (name, service) in &config.services {
        if service.max_attempts == Some(0) {
            return Err(StackError::InvalidConfig(format!(
                "services.{name}.max_attempts must be positive"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = r#"
docker_dir: docker
app_dir: backend
app_compose_file: compose.app.yml
env_template: .env.dist
networks:
  - payment-api-main
inter_service_pause_secs: 0
min_disk_gb: 2
recommended_disk_gb: 4
services:
  redis:
    container_name: dev-redis
    ports: ["6380:6379"]
  kibana:
    max_attempts: 20
    poll_interval_ms: 3000
"#;
        fs::write(dir.path().join(CONFIG_FILENAME), yaml).unwrap();
        let config = load(dir.path(), None).unwrap();
        assert_eq!(config.project_root, dir.path());
        assert_eq!(config.docker_path(), dir.path().join("docker"));
        assert_eq!(config.app_env_path(), dir.path().join("backend/.env"));
        assert_eq!(
            config.app_compose_path(),
            dir.path().join("docker/compose.app.yml")
        );
        assert_eq!(config.env_template, ".env.dist");
        assert_eq!(config.networks, vec!["payment-api-main"]);
        assert_eq!(config.inter_service_pause_secs, 0);
        let redis = config.service_override("redis").unwrap();
        assert_eq!(redis.container_name.as_deref(), Some("dev-redis"));
        assert_eq!(redis.ports.as_deref(), Some(&["6380:6379".to_string()][..]));
        assert_eq!(config.service_override("kibana").unwrap().max_attempts, Some(20));
    }

    #[test]
    fn parse_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "inter_service_pause_secs: 5\n").unwrap();
        let config = load(dir.path(), None).unwrap();
        assert_eq!(config.inter_service_pause_secs, 5);
        assert_eq!(config.docker_dir, PathBuf::from("infra/docker"));
        assert_eq!(config.networks.len(), 3);
        assert!(config.services.is_empty());
    }

    #[test]
    fn missing_default_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path(), None).unwrap();
        assert_eq!(config.project_root, dir.path());
        assert_eq!(config.env_path(), dir.path().join("infra/docker/.env"));
    }

    #[test]
    fn missing_explicit_config_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(dir.path(), Some(Path::new("custom.yaml"))),
            Err(StackError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn malformed_config_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "networks: {not: [a list\n").unwrap();
        assert!(matches!(
            load(dir.path(), None),
            Err(StackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn inconsistent_disk_thresholds_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            "min_disk_gb: 20\nrecommended_disk_gb: 10\n",
        )
        .unwrap();
        assert!(matches!(
            load(dir.path(), None),
            Err(StackError::InvalidConfig(_))
        ));
    }
}
