use bugsnag_link::cli::Cli;
use bugsnag_link::config::{AppConfig, SendFailure};
use bugsnag_link::Level;
use clap::Parser;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    let path = file.path().to_path_buf();
    test_fn(path);
}

#[test]
#[serial]
fn test_load_defaults_without_file() {
    let cli = Cli::try_parse_from(["bugsnag-link"]).unwrap();
    let config = AppConfig::load(&cli).unwrap();

    assert_eq!(config, AppConfig::default());
    assert_eq!(config.log_level, "info");
    assert_eq!(config.link.token, None);
    assert!(config.webhook.is_none());
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        [link]
        token = "abc123"
        logging = false
        release_stages = ["production", "staging"]
        min_log_level = "warn"
        app_version = "2.4.1"
        preset = "dial-once"
        on_send_failure = "log"
        [link.prefix]
        level = true
        request_id = true
        [webhook]
        endpoint = "http://localhost:9000/notify"
        timeout_ms = 2500
    "#;

    with_config_file(toml_content, |path| {
        let cli =
            Cli::try_parse_from(["bugsnag-link", "--config", path.to_str().unwrap()]).unwrap();
        let config = AppConfig::load(&cli).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.link.token.as_deref(), Some("abc123"));
        assert_eq!(config.link.logging, Some(false));
        assert_eq!(
            config.link.release_stages,
            Some(vec!["production".to_string(), "staging".to_string()])
        );
        assert_eq!(config.link.min_log_level, Some(Level::Warn));
        assert_eq!(config.link.app_version.as_deref(), Some("2.4.1"));
        assert_eq!(config.link.preset.as_deref(), Some("dial-once"));
        assert_eq!(config.link.on_send_failure, SendFailure::Log);
        assert!(config.link.prefix.level);
        assert!(config.link.prefix.request_id);
        assert!(!config.link.prefix.timestamp);

        let webhook = config.webhook.expect("webhook section");
        assert_eq!(webhook.endpoint, "http://localhost:9000/notify");
        assert_eq!(webhook.timeout_ms, 2500);
    });
}

#[test]
#[serial]
fn test_webhook_timeout_defaults() {
    let toml_content = r#"
        [webhook]
        endpoint = "http://localhost:9000/notify"
    "#;

    with_config_file(toml_content, |path| {
        let cli =
            Cli::try_parse_from(["bugsnag-link", "-c", path.to_str().unwrap()]).unwrap();
        let config = AppConfig::load(&cli).unwrap();

        assert_eq!(config.webhook.map(|w| w.timeout_ms), Some(10_000));
    });
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let toml_content = r#"
        log_level = "debug"
        [link]
        logging = true
    "#;

    with_config_file(toml_content, |path| {
        std::env::set_var("BUGSNAG_LINK_LOG_LEVEL", "trace");
        std::env::set_var("BUGSNAG_LINK_LINK__LOGGING", "false");

        let cli =
            Cli::try_parse_from(["bugsnag-link", "--config", path.to_str().unwrap()]).unwrap();
        let result = AppConfig::load(&cli);

        std::env::remove_var("BUGSNAG_LINK_LOG_LEVEL");
        std::env::remove_var("BUGSNAG_LINK_LINK__LOGGING");

        let config = result.unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.link.logging, Some(false));
    });
}

#[test]
#[serial]
fn test_cli_overrides_env_and_file() {
    let toml_content = r#"
        log_level = "debug"
        [link]
        logging = false
        [webhook]
        endpoint = "http://file.example/notify"
    "#;

    with_config_file(toml_content, |path| {
        std::env::set_var("BUGSNAG_LINK_LOG_LEVEL", "trace");

        let cli = Cli::try_parse_from([
            "bugsnag-link",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "warn",
            "--logging",
            "true",
            "--endpoint",
            "http://cli.example/notify",
        ])
        .unwrap();
        let result = AppConfig::load(&cli);

        std::env::remove_var("BUGSNAG_LINK_LOG_LEVEL");

        let config = result.unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.link.logging, Some(true));
        let webhook = config.webhook.expect("webhook section");
        assert_eq!(webhook.endpoint, "http://cli.example/notify");
        assert_eq!(webhook.timeout_ms, 10_000);
    });
}

#[test]
#[serial]
fn test_invalid_value_is_a_config_error() {
    let toml_content = r#"
        [link]
        min_log_level = "loud"
    "#;

    with_config_file(toml_content, |path| {
        let cli =
            Cli::try_parse_from(["bugsnag-link", "--config", path.to_str().unwrap()]).unwrap();
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(matches!(err, bugsnag_link::LinkError::Config(_)));
    });
}
