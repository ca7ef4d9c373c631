mod common;

use devstack_cli::render;
use devstack_core::models::ServiceState;
use devstack_core::services::orchestrator::{StartReport, StatusReport};

use common::{network, outcome, service};

#[test]
fn status_table_renders() {
    let report = StatusReport {
        networks: vec![
            network("payment-api-main", Some("0123456789ab"), 3),
            network("payment-api-cache", Some("0fedcba98765"), 1),
            network("payment-api-monitoring", None, 0),
        ],
        services: vec![
            service(
                "redis",
                ServiceState::Ready,
                Some("Up 3 minutes (healthy)"),
                &["6379:6379"],
                "payment-redis",
            ),
            service(
                "mysql",
                ServiceState::Failed,
                Some("Restarting (1) 5 seconds ago"),
                &["3306:3306"],
                "payment-mysql",
            ),
            service("app", ServiceState::Skipped, None, &[], "payment-api"),
        ],
    };
    insta::assert_snapshot!(render::status(&report), @r###"
    NETWORK                 ID            CONTAINERS
    payment-api-main        0123456789ab  3
    payment-api-cache       0fedcba98765  1
    payment-api-monitoring  missing       0

    SERVICE  STATE    DOCKER                        PORTS      CONTAINER
    redis    ready    Up 3 minutes (healthy)        6379:6379  payment-redis
    mysql    failed   Restarting (1) 5 seconds ago  3306:3306  payment-mysql
    app      skipped  stopped                       -          payment-api
    "###);
}

#[test]
fn start_summary_renders() {
    let report = StartReport {
        services: vec![
            outcome("redis", "Redis", ServiceState::Ready),
            outcome("mysql", "MySQL", ServiceState::Failed),
            outcome("app", "Laravel", ServiceState::Skipped),
        ],
    };
    assert!(!report.succeeded());
    insta::assert_snapshot!(render::start(&report), @r###"
    SERVICE  STATE
    Redis    ready
    MySQL    failed
    Laravel  skipped
    "###);
}

#[test]
fn status_json_uses_camel_case() {
    let report = StatusReport {
        networks: vec![network("payment-api-main", Some("0123456789ab"), 1)],
        services: vec![service(
            "redis",
            ServiceState::Pending,
            None,
            &["6379:6379"],
            "payment-redis",
        )],
    };
    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["services"][0]["containerName"], "payment-redis");
    assert_eq!(json["services"][0]["state"], "pending");
    assert!(json["services"][0]["dockerStatus"].is_null());
    assert_eq!(json["networks"][0]["containers"], 1);
}
