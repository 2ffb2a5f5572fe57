use std::io::Write;

use hostflow_core::config::{AppConfig, GatewayKind, Reentry};
use hostflow_core::error::HostflowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[gateway]
kind = "local"
base_url = "http://hosts.internal:8080"
timeout_secs = 12
remote_globals = true

[engine]
reentry = "per_path"
max_node_visits = 4
event_capacity = 1024

[store]
path = "/var/lib/hostflow/hostflow.db"

[log]
dir = "/var/log/hostflow"
level = 3
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.gateway.kind, GatewayKind::Local);
    assert_eq!(config.gateway.base_url, "http://hosts.internal:8080");
    assert_eq!(config.gateway.timeout_secs, 12);
    assert!(config.gateway.remote_globals);
    assert_eq!(config.engine.reentry, Reentry::PerPath);
    assert_eq!(config.engine.max_node_visits, 4);
    assert_eq!(config.engine.event_capacity, 1024);
    assert_eq!(
        config.store_path(),
        std::path::PathBuf::from("/var/lib/hostflow/hostflow.db")
    );
    assert_eq!(
        config.log_dir(),
        Some(std::path::PathBuf::from("/var/log/hostflow"))
    );
    assert_eq!(config.log_level(), 3);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("HOSTFLOW_TEST_BASE_URL", "http://10.1.2.3:5000");

    let toml_content = r#"
[gateway]
base_url = "${HOSTFLOW_TEST_BASE_URL}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.gateway.base_url, "http://10.1.2.3:5000");

    std::env::remove_var("HOSTFLOW_TEST_BASE_URL");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[gateway]
timeout_secs = 5
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.gateway.kind, GatewayKind::Http);
    assert_eq!(config.gateway.base_url, "http://127.0.0.1:5000");
    assert!(!config.gateway.remote_globals);
    assert_eq!(config.engine.reentry, Reentry::Once);
    assert_eq!(config.engine.max_node_visits, 5);
    assert_eq!(config.engine.event_capacity, 256);
    assert!(config.log.is_none());
    assert_eq!(config.log_level(), 2);
}

#[test]
fn test_missing_file_is_reported() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/hostflow.toml")).unwrap_err();
    assert!(matches!(err, HostflowError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[engine]\nreentry = \"sometimes\"\n")
        .expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, HostflowError::Config(_)));
}

#[test]
fn test_zero_event_capacity_is_rejected() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[engine]\nevent_capacity = 0\n")
        .expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    match err {
        HostflowError::Config(msg) => assert!(msg.contains("event_capacity")),
        other => panic!("expected Config error, got {:?}", other),
    }
}
