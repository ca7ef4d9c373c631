use std::fs;
use std::io::Write;
use std::path::Path;

use crate::context::StackContext;
use crate::error::{Result, StackError};
use crate::models::{EnvVariableSet, StackConfig};

/// Keys that must be present with a non-empty value before the stack starts.
pub const REQUIRED_KEYS: [&str; 15] = [
    "DB_CONNECTION",
    "DB_HOST",
    "DB_DATABASE",
    "DB_USERNAME",
    "DB_PASSWORD",
    "DB_DADOS_CONNECTION",
    "DB_DADOS_HOST",
    "DB_DADOS_DATABASE",
    "DB_DADOS_USERNAME",
    "DB_DADOS_PASSWORD",
    "REDIS_HOST",
    "REDIS_PORT",
    "APP_ENV",
    "APP_ROOT",
    "QUEUE_CONNECTION",
];

/// Keys that must be present but may be empty.
pub const OPTIONAL_KEYS: [&str; 2] = ["QUEUE_OPTIONS", "REDIS_PASSWORD"];

const SUMMARY_KEYS: [&str; 12] = [
    "DB_CONNECTION",
    "DB_HOST",
    "DB_DATABASE",
    "DB_PASSWORD",
    "DB_DADOS_CONNECTION",
    "DB_DADOS_HOST",
    "DB_DADOS_DATABASE",
    "REDIS_HOST",
    "REDIS_PORT",
    "REDIS_PASSWORD",
    "APP_ENV",
    "QUEUE_CONNECTION",
];

const THIRD_PARTY_PREFIXES: [&str; 6] = ["AWS_", "PUSHER_", "MAIL_", "MAILGUN_", "SENTRY_", "STRIPE_"];

/// Parse dotenv `contents`. Comments, `export ` prefixes and quoting follow
/// dotenv rules; malformed lines are skipped. The last occurrence of a key wins.
pub fn parse(contents: &str) -> EnvVariableSet {
    collect(dotenvy::from_read_iter(contents.as_bytes()))
}

fn collect<R: std::io::Read>(iter: dotenvy::Iter<R>) -> EnvVariableSet {
    let mut set = EnvVariableSet::new();
    for item in iter {
        match item {
            Ok((key, value)) => set.insert(key, value),
            Err(e) => tracing::warn!(error = %e, "skipping malformed env line"),
        }
    }
    set
}

pub fn load(path: &Path) -> Result<EnvVariableSet> {
    if !path.exists() {
        return Err(StackError::EnvNotFound(path.to_path_buf()));
    }
    Ok(collect(dotenvy::from_path_iter(path)?))
}

fn load_template(template: &Path) -> Result<EnvVariableSet> {
    if !template.exists() {
        return Err(StackError::TemplateNotFound(template.to_path_buf()));
    }
    Ok(collect(dotenvy::from_path_iter(template)?))
}

/// Template keys whose value may legitimately be left empty.
pub fn is_optional_key(key: &str) -> bool {
    key == "APP_KEY"
        || OPTIONAL_KEYS.contains(&key)
        || key.contains("PASSWORD")
        || key.contains("SECRET")
        || key.contains("TOKEN")
        || THIRD_PARTY_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// True iff `path` exists and, when `template` exists, carries every template
/// key with a value (optional keys may be empty).
pub fn validate(path: &Path, template: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    if !template.exists() {
        return Ok(true);
    }
    let env = load(path)?;
    let template = load_template(template)?;
    let complete = template.keys().all(|key| match env.get(key) {
        Some(value) => is_optional_key(key) || !value.trim().is_empty(),
        None => false,
    });
    Ok(complete)
}

/// Append template keys missing from `path`, using the template default.
/// Returns the keys that were appended; a second run appends nothing.
pub fn reconcile(path: &Path, template: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(StackError::EnvNotFound(path.to_path_buf()));
    }
    let template = load_template(template)?;
    let existing = fs::read_to_string(path)?;
    let env = parse(&existing);

    let missing: Vec<(&str, &str)> = template
        .iter()
        .filter(|(key, _)| !env.contains(key))
        .collect();
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let mut file = fs::OpenOptions::new().append(true).open(path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    for (key, value) in &missing {
        writeln!(file, "{key}={}", quote_if_needed(value))?;
    }
    tracing::info!(path = %path.display(), added = missing.len(), "reconciled env file");
    Ok(missing.iter().map(|(k, _)| k.to_string()).collect())
}

fn quote_if_needed(value: &str) -> String {
    if value.contains(char::is_whitespace) || value.contains('#') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Required keys that are absent or blank, then optional keys that are absent.
pub fn missing_required(env: &EnvVariableSet) -> Vec<String> {
    let blank_required = REQUIRED_KEYS
        .iter()
        .filter(|key| env.get(key).is_none_or(|v| v.trim().is_empty()));
    let absent_optional = OPTIONAL_KEYS.iter().filter(|key| !env.contains(key));
    blank_required
        .chain(absent_optional)
        .map(|k| k.to_string())
        .collect()
}

/// The connection settings worth showing, with password-like values masked.
pub fn summary(env: &EnvVariableSet) -> Vec<(String, String)> {
    SUMMARY_KEYS
        .iter()
        .map(|key| {
            let value = match env.get(key) {
                None => "NOT_SET".to_string(),
                Some(_) if key.contains("PASS") => "***".to_string(),
                Some(v) => v.to_string(),
            };
            (key.to_string(), value)
        })
        .collect()
}

/// Prepare the docker-side `.env` before anything starts.
///
/// Copies the application's `.env` over when it exists, fills in keys from the
/// template, and refuses to continue when required keys are missing.
pub fn setup(ctx: &StackContext, config: &StackConfig) -> Result<EnvVariableSet> {
    ctx.reporter.step("Configuring environment...");
    let env_path = config.env_path();
    let app_env = config.app_env_path();
    if app_env.exists() {
        fs::copy(&app_env, &env_path)?;
        ctx.reporter.info(&format!(
            "Copied {} to {}",
            app_env.display(),
            env_path.display()
        ));
    }
    if !env_path.exists() {
        return Err(StackError::EnvNotFound(env_path));
    }

    let template = config.env_template_path();
    if template.exists() {
        let added = reconcile(&env_path, &template)?;
        if !added.is_empty() {
            ctx.reporter.warn(&format!(
                "Added {} key(s) from {}: {}",
                added.len(),
                config.env_template,
                added.join(", ")
            ));
        }
    }

    let env = load(&env_path)?;
    let missing = missing_required(&env);
    if !missing.is_empty() {
        for key in &missing {
            ctx.reporter.error(&format!("Missing env variable: {key}"));
        }
        return Err(StackError::MissingEnvVars(missing));
    }
    for (key, value) in summary(&env) {
        ctx.reporter.info(&format!("  {key}: {value}"));
    }
    ctx.reporter.success("Environment configured");
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scripted_context;

    const COMPLETE: &str = "\
DB_CONNECTION=mysql
DB_HOST=payment-mysql
DB_DATABASE=payment_db
DB_USERNAME=payment_user
DB_PASSWORD=secret
DB_DADOS_CONNECTION=mongodb
DB_DADOS_HOST=mongo
DB_DADOS_DATABASE=dados
DB_DADOS_USERNAME=root
DB_DADOS_PASSWORD=root
REDIS_HOST=payment-redis
REDIS_PORT=6379
REDIS_PASSWORD=
APP_ENV=local
APP_ROOT=/var/www/html
QUEUE_CONNECTION=redis
QUEUE_OPTIONS=
";

    #[test]
    fn parse_handles_comments_quotes_and_export() {
        let env = parse(
            "# comment\n\nexport APP_NAME=\"Payment API\"\nAPP_ENV='local'\nEMPTY=\nURL=http://x?a=b\n",
        );
        assert_eq!(env.get("APP_NAME"), Some("Payment API"));
        assert_eq!(env.get("APP_ENV"), Some("local"));
        assert_eq!(env.get("EMPTY"), Some(""));
        assert_eq!(env.get("URL"), Some("http://x?a=b"));
        assert_eq!(env.len(), 4);
    }

    #[test]
    fn inline_comments_are_not_part_of_values() {
        let env = parse("APP_ENV=local # dev box\nAPP_NAME=\"Pay # API\"\n");
        assert_eq!(env.get("APP_ENV"), Some("local"));
        assert_eq!(env.get("APP_NAME"), Some("Pay # API"));
    }

    #[test]
    fn last_duplicate_wins() {
        let env = parse("APP_ENV=production\nAPP_ENV=local\n");
        assert_eq!(env.get("APP_ENV"), Some("local"));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn load_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join(".env")).unwrap_err();
        assert!(matches!(err, StackError::EnvNotFound(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn validate_against_template() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join(".env");
        let template = dir.path().join(".env.example");

        assert!(!validate(&env, &template).unwrap());

        fs::write(&env, "APP_ENV=local\nAPP_KEY=\n").unwrap();
        assert!(validate(&env, &template).unwrap(), "no template: existence is enough");

        fs::write(&template, "APP_ENV=local\nAPP_KEY=\nDB_HOST=mysql\n").unwrap();
        assert!(!validate(&env, &template).unwrap());

        fs::write(&env, "APP_ENV=local\nAPP_KEY=\nDB_HOST=\n").unwrap();
        assert!(!validate(&env, &template).unwrap(), "DB_HOST may not be empty");

        fs::write(&env, "APP_ENV=local\nAPP_KEY=\nDB_HOST=mysql\n").unwrap();
        assert!(validate(&env, &template).unwrap());
    }

    #[test]
    fn reconcile_appends_missing_keys_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join(".env");
        let template = dir.path().join(".env.example");
        fs::write(&env, "APP_ENV=local").unwrap();
        fs::write(
            &template,
            "APP_ENV=production\nAPP_NAME=\"Payment API\"\nREDIS_PORT=6379\n",
        )
        .unwrap();

        let added = reconcile(&env, &template).unwrap();
        assert_eq!(added, vec!["APP_NAME", "REDIS_PORT"]);
        let once = fs::read_to_string(&env).unwrap();
        assert_eq!(once, "APP_ENV=local\nAPP_NAME=\"Payment API\"\nREDIS_PORT=6379\n");

        assert!(reconcile(&env, &template).unwrap().is_empty());
        assert_eq!(fs::read_to_string(&env).unwrap(), once);
    }

    #[test]
    fn reconcile_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join(".env");
        let template = dir.path().join(".env.example");
        assert!(matches!(
            reconcile(&env, &template),
            Err(StackError::EnvNotFound(_))
        ));
        fs::write(&env, "A=1\n").unwrap();
        assert!(matches!(
            reconcile(&env, &template),
            Err(StackError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn missing_required_distinguishes_optional_keys() {
        assert!(missing_required(&parse(COMPLETE)).is_empty());

        let incomplete = parse("DB_HOST=\nREDIS_PASSWORD=\n");
        let missing = missing_required(&incomplete);
        assert!(missing.contains(&"DB_HOST".to_string()));
        assert!(missing.contains(&"QUEUE_OPTIONS".to_string()));
        assert!(!missing.contains(&"REDIS_PASSWORD".to_string()));
    }

    #[test]
    fn summary_masks_passwords() {
        let mut env = parse(COMPLETE);
        env.insert("DB_PASSWORD", "hunter2");
        let summary = summary(&env);
        assert!(summary.contains(&("DB_PASSWORD".to_string(), "***".to_string())));
        assert!(summary.iter().all(|(_, v)| v != "hunter2"));
        assert!(summary.contains(&("DB_HOST".to_string(), "payment-mysql".to_string())));
    }

    #[test]
    fn setup_copies_app_env_and_checks_keys() {
        let dir = tempfile::tempdir().unwrap();
        let config = StackConfig::with_root(dir.path());
        fs::create_dir_all(config.docker_path()).unwrap();
        fs::create_dir_all(config.app_path()).unwrap();
        fs::write(config.app_env_path(), COMPLETE).unwrap();
        fs::write(config.env_template_path(), "APP_DEBUG=true\n").unwrap();

        let (ctx, _, reporter) = scripted_context();
        let env = setup(&ctx, &config).unwrap();
        assert_eq!(env.get("DB_HOST"), Some("payment-mysql"));
        assert_eq!(env.get("APP_DEBUG"), Some("true"));
        assert!(reporter.contains("APP_DEBUG"));
    }

    #[test]
    fn setup_rejects_missing_required_keys() {
        let dir = tempfile::tempdir().unwrap();
        let config = StackConfig::with_root(dir.path());
        fs::create_dir_all(config.docker_path()).unwrap();
        fs::write(config.env_path(), "APP_ENV=local\n").unwrap();

        let (ctx, _, _) = scripted_context();
        match setup(&ctx, &config) {
            Err(StackError::MissingEnvVars(keys)) => assert!(keys.contains(&"DB_HOST".to_string())),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn setup_without_any_env_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = StackConfig::with_root(dir.path());
        fs::create_dir_all(config.docker_path()).unwrap();
        let (ctx, _, _) = scripted_context();
        assert!(matches!(setup(&ctx, &config), Err(StackError::EnvNotFound(_))));
    }
}
