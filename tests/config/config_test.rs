//! Coverage for config parsing, env overrides, validation, and secrets.

use std::collections::HashMap;

use ticketline::config::{Config, MAX_RECENCY_TTL_HOURS};

fn resolver(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

const FULL: &str = r#"
[server]
host = "127.0.0.1"
port = 9000

[whatsapp]
api_base_url = "https://graph.facebook.com/v19.0"
phone_number_id = "1098765"
business_phone_number = "15550000000"

[pipeline]
dedup_capacity = 10

[storage]
database_path = "/var/lib/ticketline/db.sqlite"

[directory]
path = "customers.toml"

[notify]
operator_email = "ops@example.com"
smtp_host = "smtp.example.com"
username = "mailer"
from = "desk@example.com"
"#;

fn parse(toml_str: &str) -> Config {
    match Config::from_toml(toml_str) {
        Ok(config) => config,
        Err(err) => panic!("config should parse: {err}"),
    }
}

#[test]
fn empty_file_gives_defaults() {
    let config = parse("");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.whatsapp.api_base_url, "https://graph.facebook.com");
    assert_eq!(config.pipeline.dedup_capacity, 5);
    assert_eq!(config.pipeline.recency_ttl_hours, 24);
    assert_eq!(config.notify.smtp_port, 587);
    assert!(config.notify.operator_email.is_none());
    assert!(config.directory.path.is_none());
}

#[test]
fn full_file_parses_and_keeps_unset_defaults() {
    let config = parse(FULL);
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.whatsapp.phone_number_id, "1098765");
    assert_eq!(config.whatsapp.access_token_env, "TICKETLINE_WHATSAPP_TOKEN");
    assert_eq!(config.pipeline.dedup_capacity, 10);
    assert_eq!(config.pipeline.recency_sweep_secs, 300);
    assert_eq!(config.directory.path.as_deref(), Some("customers.toml"));
    assert_eq!(config.notify.smtp_host.as_deref(), Some("smtp.example.com"));
    assert_eq!(config.notify.smtp_port, 587);
    assert!(config.validate().is_ok());
}

#[test]
fn mistyped_field_is_an_error() {
    assert!(Config::from_toml("[server]\nport = \"eighty\"").is_err());
}

#[test]
fn env_overrides_file_values() {
    let mut config = parse(FULL);
    config.apply_overrides(resolver(&[
        ("TICKETLINE_PORT", "7000"),
        ("TICKETLINE_DATABASE_PATH", "/tmp/t.db"),
        ("TICKETLINE_OPERATOR_EMAIL", "oncall@example.com"),
    ]));
    assert_eq!(config.server.port, 7000);
    assert_eq!(config.storage.database_path, "/tmp/t.db");
    assert_eq!(config.notify.operator_email.as_deref(), Some("oncall@example.com"));
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn invalid_port_override_is_ignored() {
    let mut config = parse(FULL);
    config.apply_overrides(resolver(&[("TICKETLINE_PORT", "not-a-port")]));
    assert_eq!(config.server.port, 9000);
}

#[test]
fn validation_requires_phone_settings() {
    let config = parse("");
    assert!(config.validate().is_err());
}

#[test]
fn validation_rejects_zero_ttl() {
    let mut config = parse(FULL);
    config.pipeline.recency_ttl_hours = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validation_bounds_ttl() {
    let mut config = parse(FULL);
    config.pipeline.recency_ttl_hours = MAX_RECENCY_TTL_HOURS;
    assert!(config.validate().is_ok());

    config.pipeline.recency_ttl_hours = i64::MAX;
    let err = config.validate().expect_err("huge ttl rejected");
    assert!(err.to_string().contains("at most"));
}

#[test]
fn secrets_resolve_from_named_variables() {
    let config = parse(FULL);
    let secrets = config
        .resolve_secrets(resolver(&[
            ("TICKETLINE_WHATSAPP_TOKEN", "tok"),
            ("TICKETLINE_VERIFY_TOKEN", "ver"),
            ("TICKETLINE_SMTP_PASSWORD", "pw"),
        ]))
        .expect("secrets resolve");
    assert_eq!(secrets.access_token, "tok");
    assert_eq!(secrets.verify_token, "ver");
    assert_eq!(secrets.smtp_password.as_deref(), Some("pw"));
    assert!(!format!("{secrets:?}").contains("tok"));
}

#[test]
fn missing_secret_is_an_error() {
    let config = parse(FULL);
    let result = config.resolve_secrets(resolver(&[("TICKETLINE_WHATSAPP_TOKEN", "tok")]));
    assert!(result.is_err());
}

#[test]
fn smtp_password_not_needed_without_smtp_host() {
    let config = parse("");
    let secrets = config
        .resolve_secrets(resolver(&[
            ("TICKETLINE_WHATSAPP_TOKEN", "tok"),
            ("TICKETLINE_VERIFY_TOKEN", "ver"),
        ]))
        .expect("secrets resolve");
    assert!(secrets.smtp_password.is_none());
}

#[test]
fn load_reads_file_named_by_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ticketline.toml");
    std::fs::write(&path, FULL).expect("write config");
    let path_str = path.to_string_lossy().into_owned();

    let config = Config::load_with(resolver(&[
        ("TICKETLINE_CONFIG_PATH", path_str.as_str()),
        ("TICKETLINE_HOST", "10.0.0.1"),
    ]))
    .expect("config loads");
    assert_eq!(config.server.host, "10.0.0.1");
    assert_eq!(config.server.port, 9000);
}

#[test]
fn load_without_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    let missing_str = missing.to_string_lossy().into_owned();

    let config = Config::load_with(resolver(&[("TICKETLINE_CONFIG_PATH", missing_str.as_str())]))
        .expect("defaults load");
    assert_eq!(config.server.port, 8080);
}
