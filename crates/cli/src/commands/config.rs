use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use gigbook_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: &str, env_keys: &[&str]| {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, value, source));
    };

    push("database.url", &config.database.url, &["GIGBOOK_DATABASE_URL"]);
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        &["GIGBOOK_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        &["GIGBOOK_DATABASE_TIMEOUT_SECS"],
    );

    push(
        "notifications.enabled",
        &config.notifications.enabled.to_string(),
        &["GIGBOOK_NOTIFICATIONS_ENABLED"],
    );
    push(
        "notifications.webhook_url",
        config.notifications.webhook_url.as_deref().unwrap_or("<unset>"),
        &["GIGBOOK_NOTIFICATIONS_WEBHOOK_URL"],
    );
    let signing_secret = config
        .notifications
        .signing_secret
        .as_ref()
        .map(|secret| redact_secret(secret.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    push("notifications.signing_secret", &signing_secret, &["GIGBOOK_NOTIFICATIONS_SIGNING_SECRET"]);
    push(
        "notifications.timeout_secs",
        &config.notifications.timeout_secs.to_string(),
        &["GIGBOOK_NOTIFICATIONS_TIMEOUT_SECS"],
    );

    push(
        "engagement.frequent_collaborator_limit",
        &config.engagement.frequent_collaborator_limit.to_string(),
        &["GIGBOOK_ENGAGEMENT_FREQUENT_COLLABORATOR_LIMIT"],
    );

    push("logging.level", &config.logging.level, &["GIGBOOK_LOGGING_LEVEL", "GIGBOOK_LOG_LEVEL"]);
    push(
        "logging.format",
        &format!("{:?}", config.logging.format).to_ascii_lowercase(),
        &["GIGBOOK_LOGGING_FORMAT", "GIGBOOK_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: Value = "[notifications]\nwebhook_url = \"https://hooks.example.test\"\n"
            .parse()
            .expect("valid toml");
        assert!(contains_path(&doc, "notifications.webhook_url"));
        assert!(!contains_path(&doc, "notifications.signing_secret"));
        assert!(!contains_path(&doc, "database.url"));
    }

    #[test]
    fn secrets_never_render_in_clear() {
        assert_eq!(redact_secret("whsec-123"), "<redacted>");
        assert_eq!(redact_secret("  "), "<empty>");
    }
}
