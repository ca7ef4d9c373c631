use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use devstack_core::services::entrypoint::DEFAULT_BASE_PATH;
use devstack_core::services::image::{DEFAULT_DOCKERFILE, DEFAULT_TAG};

#[derive(Debug, Parser)]
#[command(name = "devstack")]
#[command(about = "Bootstrap and manage the payment API development stack")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root containing infra/docker and the application
    #[arg(long, global = true, env = "DEVSTACK_PROJECT_ROOT", default_value = ".")]
    pub project_root: PathBuf,

    /// Configuration file (defaults to .devstack.yaml in the project root)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write debug logs to .devstack-debug.log
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check prerequisites, prepare .env and networks, then start every service
    Start {
        /// Do not wait for services to become ready
        #[arg(long)]
        no_wait: bool,

        /// Include Elasticsearch, Logstash, Kibana and Prometheus
        #[arg(long)]
        monitoring: bool,

        /// Skip the system prerequisite checks
        #[arg(long)]
        skip_prerequisites: bool,
    },

    /// Stop all services
    Stop {
        #[arg(long)]
        monitoring: bool,
    },

    /// Show networks and service status
    Status {
        #[arg(long)]
        monitoring: bool,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove leftover containers
    Cleanup {
        #[arg(long)]
        monitoring: bool,
    },

    /// Install, verify or remove the git quality hooks
    Hooks {
        #[arg(value_enum, default_value_t = HookAction::Install)]
        action: HookAction,
    },

    /// Show logs of one service
    Logs {
        service: String,

        /// Number of lines from the end
        #[arg(long, default_value_t = 100)]
        tail: usize,

        /// Keep streaming new lines
        #[arg(short, long)]
        follow: bool,
    },

    /// Stop and start one service
    Restart { service: String },

    /// Prepare the Laravel application inside its container
    Entrypoint {
        #[arg(long, default_value = "payment-api")]
        container: String,

        /// Application directory inside the container
        #[arg(long, default_value = DEFAULT_BASE_PATH)]
        base_path: String,
    },

    /// Scan a directory for hard-coded credentials
    Scan {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run the system prerequisite checks
    Prerequisites {
        /// Only print the summary
        #[arg(short, long)]
        quiet: bool,

        /// Show fix suggestions
        #[arg(long)]
        fix: bool,
    },

    /// Build the application image
    Build {
        #[arg(default_value = DEFAULT_TAG)]
        tag: String,

        /// Dockerfile relative to the project root
        #[arg(long, default_value = DEFAULT_DOCKERFILE)]
        dockerfile: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HookAction {
    Install,
    Verify,
    Remove,
}
