use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceState {
    Pending,
    Starting,
    Verifying,
    /// Started without waiting; readiness was never checked.
    Launched,
    Ready,
    Failed,
    /// Never attempted because a dependency did not become ready.
    Skipped,
}

impl ServiceState {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceState::Pending => "pending",
            ServiceState::Starting => "starting",
            ServiceState::Verifying => "verifying",
            ServiceState::Launched => "launched",
            ServiceState::Ready => "ready",
            ServiceState::Failed => "failed",
            ServiceState::Skipped => "skipped",
        }
    }

    /// Whether a dependent may be started after this one.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, ServiceState::Ready | ServiceState::Launched)
    }
}

/// Result of a readiness poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Ready,
    /// The attempt budget ran out without a successful probe.
    TimedOut,
    /// The probe could not be run at all.
    Failed(String),
}

impl VerifyOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, VerifyOutcome::Ready)
    }
}
