use std::time::Duration;

use crate::context::StackContext;
use crate::error::Result;
use crate::models::{ReadinessProbe, ServiceDescriptor};
use crate::services::docker;

const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the descriptor's readiness probe once.
///
/// `Ok(false)` means "not ready yet". An `Err` means the probe itself could
/// not be executed, e.g. the docker binary is missing.
pub async fn probe_once(ctx: &StackContext, descriptor: &ServiceDescriptor) -> Result<bool> {
    match &descriptor.probe {
        ReadinessProbe::ContainerUp => {
            docker::is_container_running(ctx.runner.as_ref(), &descriptor.container_name).await
        }
        ReadinessProbe::Exec { command, expect } => {
            let out = docker::exec(
                ctx.runner.as_ref(),
                &descriptor.container_name,
                None,
                command,
            )
            .await?;
            Ok(out.success()
                && expect
                    .as_deref()
                    .is_none_or(|needle| out.stdout.contains(needle)))
        }
        ReadinessProbe::Http { url, accept } => Ok(http_ready(&ctx.http, url, accept).await),
    }
}

/// GET `url`; ready when the status is one of `accept`. Connection errors
/// simply mean "not yet".
pub async fn http_ready(client: &reqwest::Client, url: &str, accept: &[u16]) -> bool {
    match client.get(url).timeout(HTTP_PROBE_TIMEOUT).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            tracing::trace!(url, status, "http probe");
            accept.contains(&status)
        }
        Err(e) => {
            tracing::trace!(url, error = %e, "http probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;
    use crate::models::Tier;
    use crate::services::process::{argv, ProcessOutput};
    use crate::testing::scripted_context;

    fn redis() -> ServiceDescriptor {
        ServiceDescriptor::new("redis", "Redis", "payment-redis", Tier::Datastore).probe(
            ReadinessProbe::Exec {
                command: argv(&["redis-cli", "ping"]),
                expect: Some("PONG".into()),
            },
        )
    }

    #[tokio::test]
    async fn exec_probe_requires_expected_output() {
        let (ctx, runner, _) = scripted_context();
        runner.on("exec payment-redis", ProcessOutput::ok("PONG\n"));
        assert!(probe_once(&ctx, &redis()).await.unwrap());

        runner.on("exec payment-redis", ProcessOutput::ok("LOADING\n"));
        assert!(!probe_once(&ctx, &redis()).await.unwrap());

        runner.on("exec payment-redis", ProcessOutput::failed(1, "Could not connect"));
        assert!(!probe_once(&ctx, &redis()).await.unwrap());
    }

    #[tokio::test]
    async fn exec_probe_without_expectation_uses_exit_code() {
        let (ctx, runner, _) = scripted_context();
        let app = ServiceDescriptor::new("app", "Laravel", "payment-api", Tier::Application)
            .probe(ReadinessProbe::Exec {
                command: argv(&["pgrep", "php-fpm"]),
                expect: None,
            });
        assert!(probe_once(&ctx, &app).await.unwrap());
        assert_eq!(runner.calls(), vec!["docker exec payment-api pgrep php-fpm"]);
    }

    #[tokio::test]
    async fn http_probe_accepts_configured_statuses() {
        let server = MockServer::start_async().await;
        let starting = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/status");
                then.status(503);
            })
            .await;

        let (ctx, _, _) = scripted_context();
        let kibana = ServiceDescriptor::new("kibana", "Kibana", "payment-kibana", Tier::Observability)
            .probe(ReadinessProbe::Http {
                url: server.url("/api/status"),
                accept: vec![200, 503],
            });
        assert!(probe_once(&ctx, &kibana).await.unwrap());
        starting.assert_async().await;

        let strict = kibana.clone().probe(ReadinessProbe::Http {
            url: server.url("/api/status"),
            accept: vec![200],
        });
        assert!(!probe_once(&ctx, &strict).await.unwrap());
    }

    #[tokio::test]
    async fn http_probe_treats_connection_refused_as_not_ready() {
        let client = reqwest::Client::new();
        assert!(!http_ready(&client, "http://127.0.0.1:1/health", &[200]).await);
    }
}
