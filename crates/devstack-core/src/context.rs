use std::sync::Arc;
use std::time::Duration;

use crate::output::{NullReporter, Reporter};
use crate::services::process::{ProcessRunner, SystemRunner};

/// Shared handles every operation needs: how to run commands, where to
/// report progress, and an HTTP client for probes and downloads.
#[derive(Clone)]
pub struct StackContext {
    pub runner: Arc<dyn ProcessRunner>,
    pub reporter: Arc<dyn Reporter>,
    pub http: reqwest::Client,
}

impl StackContext {
    pub fn new(runner: Arc<dyn ProcessRunner>, reporter: Arc<dyn Reporter>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            runner,
            reporter,
            http,
        }
    }

    /// Real processes, messages sent to `reporter`.
    pub fn system(reporter: Arc<dyn Reporter>) -> Self {
        Self::new(Arc::new(SystemRunner), reporter)
    }

    pub fn silent(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::new(runner, Arc::new(NullReporter))
    }
}

impl std::fmt::Debug for StackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackContext").finish_non_exhaustive()
    }
}
