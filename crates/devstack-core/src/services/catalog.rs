use std::time::Duration;

use crate::error::{Result, StackError};
use crate::models::{
    EnvVariableSet, HealthCheck, ReadinessProbe, ServiceDescriptor, ServiceOverride, StackConfig,
    Tier,
};
use crate::services::process::argv;

/// Startup order of every service the tool knows about.
pub const SERVICE_NAMES: [&str; 10] = [
    "redis",
    "mysql",
    "mongodb",
    "app",
    "queue",
    "nginx",
    "elasticsearch",
    "logstash",
    "kibana",
    "prometheus",
];

const MAIN_NETWORK: &str = "payment-api-main";

/// HTTP readiness endpoints of the observability services, as
/// (service, path, accepted statuses). Kibana answers 503 while it boots.
const HTTP_HEALTH: [(&str, &str, &[u16]); 4] = [
    ("elasticsearch", "/_cluster/health", &[200]),
    ("logstash", "/", &[200]),
    ("kibana", "/api/status", &[200, 503]),
    ("prometheus", "/-/healthy", &[200]),
];

/// Descriptors for the payment API stack in startup order, with overrides
/// from `config` applied. Secrets come from `env`, falling back to the
/// process environment.
pub fn payment_stack(
    config: &StackConfig,
    env: &EnvVariableSet,
    include_monitoring: bool,
) -> Vec<ServiceDescriptor> {
    let mut services = vec![redis(config, env), mysql(config, env), mongodb(config, env)];
    services.extend(application_tier(config));
    if include_monitoring {
        services.extend(observability(config));
    }

    for name in config.services.keys() {
        if !SERVICE_NAMES.contains(&name.as_str()) {
            tracing::warn!(service = %name, "override for unknown service ignored");
        }
    }

    services
        .into_iter()
        .map(|d| match config.service_override(&d.name) {
            Some(o) => apply_override(d, o),
            None => d,
        })
        .map(with_http_probe)
        .collect()
}

pub fn find<'a>(services: &'a [ServiceDescriptor], name: &str) -> Result<&'a ServiceDescriptor> {
    services
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| StackError::UnknownService(name.to_string()))
}

fn apply_override(mut d: ServiceDescriptor, o: &ServiceOverride) -> ServiceDescriptor {
    if let Some(container) = &o.container_name {
        d.container_name = container.clone();
    }
    if let Some(image) = &o.image {
        d.image = image.clone();
    }
    if let Some(ports) = &o.ports {
        d.ports = ports.clone();
    }
    if let Some(attempts) = o.max_attempts {
        d.max_attempts = attempts;
    }
    if let Some(ms) = o.poll_interval_ms {
        d.poll_interval = Duration::from_millis(ms);
    }
    d
}

/// HTTP probes target the published host port, so they are derived after
/// port overrides are known.
fn with_http_probe(d: ServiceDescriptor) -> ServiceDescriptor {
    let Some((_, path, accept)) = HTTP_HEALTH.iter().find(|(name, _, _)| *name == d.name) else {
        return d;
    };
    let Some(port) = d.host_port().map(str::to_string) else {
        return d;
    };
    d.probe(ReadinessProbe::Http {
        url: format!("http://localhost:{port}{path}"),
        accept: accept.to_vec(),
    })
}

/// Bind mounts written as `./x` are relative to the docker directory.
fn bind(config: &StackConfig, volume: &str) -> String {
    match volume.strip_prefix("./") {
        Some(rest) => format!("{}/{rest}", config.docker_path().display()),
        None => volume.to_string(),
    }
}

fn binds(config: &StackConfig, volumes: &[&str]) -> Vec<String> {
    volumes.iter().map(|v| bind(config, v)).collect()
}

fn secret(env: &EnvVariableSet, key: &str) -> Option<String> {
    env.resolve(key).filter(|v| !v.is_empty())
}

fn redis(config: &StackConfig, env: &EnvVariableSet) -> ServiceDescriptor {
    let password = secret(env, "REDIS_PASSWORD");
    let mut ping = vec!["redis-cli".to_string()];
    if let Some(pw) = &password {
        ping.extend(["-a".to_string(), pw.clone()]);
    }
    ping.push("ping".to_string());

    let mut d = ServiceDescriptor::new("redis", "Redis", "payment-redis", Tier::Datastore)
        .image("redis:7-alpine")
        .ports(&["6377:6379"])
        .environment(vec![format!(
            "REDIS_PASSWORD={}",
            password.unwrap_or_default()
        )])
        .networks(&[MAIN_NETWORK])
        .health_check(HealthCheck::new(&["CMD", "redis-cli", "ping"], "10s", "3s", 3))
        .command(&["redis-server", "/usr/local/etc/redis/redis.conf"])
        .probe(ReadinessProbe::Exec {
            command: ping,
            expect: Some("PONG".into()),
        })
        .polling(Duration::from_secs(1), 30);
    d.volumes = binds(
        config,
        &[
            "redis_data:/data",
            "./redis/redis.conf:/usr/local/etc/redis/redis.conf",
        ],
    );
    d
}

fn mysql(config: &StackConfig, env: &EnvVariableSet) -> ServiceDescriptor {
    let root_password = secret(env, "MYSQL_ROOT_PASSWORD");
    let mut probe = argv(&["mysql", "-u", "root"]);
    if let Some(pw) = &root_password {
        probe.push(format!("-p{pw}"));
    }
    probe.extend(argv(&["-e", "SELECT 1;"]));

    let mut d = ServiceDescriptor::new("mysql", "MySQL", "payment-mysql", Tier::Datastore)
        .image("mysql:8.0")
        .ports(&["3307:3306"])
        .environment(vec![
            format!("MYSQL_ROOT_PASSWORD={}", root_password.unwrap_or_default()),
            format!(
                "MYSQL_DATABASE={}",
                secret(env, "MYSQL_DATABASE").unwrap_or_else(|| "payment_db".into())
            ),
            format!(
                "MYSQL_USER={}",
                secret(env, "MYSQL_USER").unwrap_or_else(|| "payment_user".into())
            ),
            format!(
                "MYSQL_PASSWORD={}",
                secret(env, "MYSQL_PASSWORD").unwrap_or_default()
            ),
        ])
        .networks(&[MAIN_NETWORK])
        .health_check(HealthCheck::new(
            &["CMD", "mysqladmin", "ping", "-h", "localhost"],
            "10s",
            "5s",
            3,
        ))
        .command(&["--default-authentication-plugin=mysql_native_password"])
        .probe(ReadinessProbe::Exec {
            command: probe,
            expect: None,
        })
        .polling(Duration::from_secs(2), 30);
    d.volumes = binds(
        config,
        &[
            "mysql_data:/var/lib/mysql",
            "./mysql/my.cnf:/etc/mysql/conf.d/my.cnf",
        ],
    );
    d
}

fn mongodb(_config: &StackConfig, env: &EnvVariableSet) -> ServiceDescriptor {
    ServiceDescriptor::new("mongodb", "MongoDB", "mongo", Tier::Datastore)
        .image("mongo:7.0")
        .ports(&["27017:27017"])
        .environment(vec![
            format!(
                "MONGO_INITDB_ROOT_USERNAME={}",
                secret(env, "MONGO_ROOT_USERNAME").unwrap_or_else(|| "root".into())
            ),
            format!(
                "MONGO_INITDB_ROOT_PASSWORD={}",
                secret(env, "MONGO_ROOT_PASSWORD").unwrap_or_else(|| "root".into())
            ),
        ])
        .volumes(&["mongo_data:/data/db"])
        .networks(&[MAIN_NETWORK])
        .probe(ReadinessProbe::Exec {
            command: argv(&["mongosh", "--quiet", "--eval", "db.runCommand({ping: 1})"]),
            expect: Some("ok".into()),
        })
        .polling(Duration::from_secs(2), 30)
}

fn application_tier(config: &StackConfig) -> Vec<ServiceDescriptor> {
    let compose_file = config.app_compose_path();
    vec![
        ServiceDescriptor::new("app", "Laravel", "payment-api", Tier::Application)
            .compose(compose_file.clone(), "app")
            .depends_on(&["redis", "mysql", "mongodb"])
            .probe(ReadinessProbe::Exec {
                command: argv(&["pgrep", "php-fpm"]),
                expect: None,
            })
            .polling(Duration::from_secs(2), 60)
            .with_entrypoint(),
        ServiceDescriptor::new("queue", "Queue (Horizon)", "payment-queue", Tier::Application)
            .compose(compose_file.clone(), "queue")
            .depends_on(&["redis", "mysql", "app"])
            .probe(ReadinessProbe::Exec {
                command: argv(&[
                    "supervisorctl",
                    "-s",
                    "http://127.0.0.1:9001",
                    "status",
                    "horizon",
                ]),
                expect: Some("RUNNING".into()),
            })
            .polling(Duration::from_secs(2), 30),
        ServiceDescriptor::new("nginx", "Nginx", "payment-nginx", Tier::Application)
            .compose(compose_file, "payment-nginx")
            .ports(&["80:80"])
            .depends_on(&["app"])
            .probe(ReadinessProbe::ContainerUp)
            .polling(Duration::from_secs(1), 30),
    ]
}

fn observability(config: &StackConfig) -> Vec<ServiceDescriptor> {
    let mut logstash =
        ServiceDescriptor::new("logstash", "Logstash", "payment-logstash", Tier::Observability)
            .image("logstash:8.11.4")
            .ports(&["9600:9600", "5044:5044", "5000:5000"])
            .networks(&[MAIN_NETWORK])
            .depends_on(&["elasticsearch"])
            .polling(Duration::from_secs(2), 10);
    logstash.volumes = binds(
        config,
        &[
            "./monitoring/logstash.conf:/usr/share/logstash/pipeline/logstash.conf",
            "./monitoring/logstash.yml:/usr/share/logstash/config/logstash.yml",
        ],
    );

    let mut prometheus =
        ServiceDescriptor::new("prometheus", "Prometheus", "payment-prometheus", Tier::Observability)
            .image("prom/prometheus:latest")
            .ports(&["9090:9090"])
            .networks(&[MAIN_NETWORK])
            .command(&[
                "--config.file=/etc/prometheus/prometheus.yml",
                "--storage.tsdb.path=/prometheus",
                "--web.console.libraries=/etc/prometheus/console_libraries",
                "--web.console.templates=/etc/prometheus/consoles",
                "--storage.tsdb.retention.time=200h",
                "--web.enable-lifecycle",
            ])
            .polling(Duration::from_secs(2), 10);
    prometheus.volumes = binds(
        config,
        &[
            "./monitoring/prometheus.yml:/etc/prometheus/prometheus.yml",
            "prometheus_data:/prometheus",
        ],
    );

    vec![
        ServiceDescriptor::new(
            "elasticsearch",
            "Elasticsearch",
            "payment-elasticsearch",
            Tier::Observability,
        )
        .image("elasticsearch:8.11.4")
        .ports(&["9200:9200", "9300:9300"])
        .environment(vec![
            "discovery.type=single-node".into(),
            "xpack.security.enabled=false".into(),
            "ES_JAVA_OPTS=-Xms512m -Xmx512m".into(),
        ])
        .volumes(&["elasticsearch_data:/usr/share/elasticsearch/data"])
        .networks(&[MAIN_NETWORK])
        .health_check(HealthCheck::new(
            &[
                "CMD-SHELL",
                "curl -f http://localhost:9200/_cluster/health || exit 1",
            ],
            "30s",
            "10s",
            3,
        ))
        .polling(Duration::from_secs(2), 10),
        logstash,
        ServiceDescriptor::new("kibana", "Kibana", "payment-kibana", Tier::Observability)
            .image("kibana:8.11.4")
            .ports(&["5601:5601"])
            .environment(vec!["ELASTICSEARCH_HOSTS=http://elasticsearch:9200".into()])
            .networks(&[MAIN_NETWORK])
            .depends_on(&["elasticsearch"])
            .health_check(HealthCheck::new(
                &[
                    "CMD-SHELL",
                    "curl -f http://localhost:5601/api/status || exit 1",
                ],
                "30s",
                "10s",
                3,
            ))
            .polling(Duration::from_secs(2), 10),
        prometheus,
    ]
}
