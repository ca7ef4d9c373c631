use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("env file not found at {0}")]
    EnvNotFound(PathBuf),

    #[error("env template not found at {0}")]
    TemplateNotFound(PathBuf),

    #[error("required env variables missing or empty: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with code {exit_code}: {stderr}")]
    ProcessFailure {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("network setup failed: {0}")]
    Network(String),

    #[error("prerequisites not met: {0}")]
    Prerequisites(String),

    #[error("entrypoint failed: {0}")]
    Entrypoint(String),

    #[error("git hooks setup failed: {0}")]
    Hooks(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl StackError {
    /// Whether this error comes from configuration files rather than the environment.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StackError::ConfigNotFound(_)
                | StackError::EnvNotFound(_)
                | StackError::TemplateNotFound(_)
                | StackError::MissingEnvVars(_)
                | StackError::InvalidConfig(_)
                | StackError::Dotenv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
