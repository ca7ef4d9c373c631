pub mod check;
pub mod config;
pub mod descriptor;
pub mod env;
pub mod state;

pub use check::{CheckResult, CheckStatus, NamedCheck};
pub use config::{ServiceOverride, StackConfig};
pub use descriptor::{HealthCheck, Launch, ReadinessProbe, ServiceDescriptor, Tier};
pub use env::EnvVariableSet;
pub use state::{ServiceState, VerifyOutcome};
