//! Integration tests for config parsing, validation, and change detection.

use authgate::config::model::Config;
use authgate::config::sources::parse_config_str;
use authgate::config::validation::validate;

const FULL_YAML: &str = "\
upstream:
  url: http://imgsrv:8080
auth:
  enforce: false
forwarding:
  timeout: 10000
  headers:
    add:
      x-gateway: authgate
    strip:
      - x-debug
";

#[cfg(feature = "yaml")]
#[test]
fn yaml_config_loads_and_validates() {
    let config = parse_config_str("yaml", FULL_YAML, "authgate.yaml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.upstream.url, "http://imgsrv:8080");
    assert!(!config.auth.enforce);
    assert_eq!(config.forwarding.timeout, 10_000);
    assert_eq!(
        config.forwarding.headers.add.get("x-gateway").unwrap(),
        "authgate"
    );
    assert_eq!(config.forwarding.headers.strip, vec!["x-debug"]);
}

#[cfg(feature = "yaml")]
#[test]
fn minimal_yaml_uses_defaults() {
    let content = "upstream:\n  url: http://localhost\n";
    let config = parse_config_str("yaml", content, "authgate.yaml").unwrap();
    validate(&config).unwrap();
    assert!(config.auth.enforce);
    assert_eq!(config.forwarding.timeout, 30_000);
    assert!(config.forwarding.forward_headers);
}

#[cfg(feature = "json")]
#[test]
fn json_config_loads_and_validates() {
    let content = r#"{"upstream": {"url": "http://imgsrv:8080"}, "auth": {"enforce": false}}"#;
    let config = parse_config_str("json", content, "authgate.json").unwrap();
    validate(&config).unwrap();
    assert!(!config.auth.enforce);
}

#[cfg(feature = "toml")]
#[test]
fn toml_config_loads_and_validates() {
    let content = "[upstream]\nurl = \"http://imgsrv:8080\"\n\n[auth]\nenforce = false\n";
    let config = parse_config_str("toml", content, "authgate.toml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.upstream.url, "http://imgsrv:8080");
    assert!(!config.auth.enforce);
}

#[test]
fn unsupported_format_returns_error() {
    let result = parse_config_str("xml", "<config/>", "test.xml");
    assert!(result.is_err());
}

#[test]
fn unknown_fields_fail_to_parse() {
    let content = r#"{"upstream": {"url": "http://localhost"}, "listen": {"port": 4010}}"#;
    let result: Result<Config, _> = serde_json::from_str(content);
    assert!(result.is_err());
}

#[test]
fn invalid_config_fails_validation() {
    let content = r#"{"upstream": {"url": ""}}"#;
    let config: Config = serde_json::from_str(content).unwrap();
    assert!(validate(&config).is_err());
}

#[cfg(feature = "yaml")]
#[tokio::test]
async fn file_source_detects_changes() {
    use authgate::config::sources::yaml;
    use authgate::config::ConfigSource;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("authgate.yaml");
    std::fs::write(&path, "upstream:\n  url: http://localhost:8080\n").unwrap();

    let source = yaml::new(path.clone());
    let (config, version) = source.load().await.unwrap();
    assert_eq!(config.upstream.url, "http://localhost:8080");

    // Same content: no change
    assert!(!source.has_changed(&version).await.unwrap());

    // Rewrite with a different upstream: change detected
    std::fs::write(&path, "upstream:\n  url: http://localhost:9090\n").unwrap();
    assert!(source.has_changed(&version).await.unwrap());
}

#[cfg(feature = "yaml")]
#[tokio::test]
async fn file_source_reports_missing_file() {
    use authgate::config::sources::yaml;
    use authgate::config::ConfigSource;

    let source = yaml::new("/nonexistent/authgate.yaml".into());
    let result = source.load().await;
    assert!(matches!(
        result,
        Err(authgate::error::GatewayError::ConfigFileNotFound { .. })
    ));
}
