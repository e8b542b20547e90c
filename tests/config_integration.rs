//! Integration tests for configuration loading.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use agent_relay::agents::Agent;
use agent_relay::ai::{Model, ScriptedModel};
use agent_relay::config::{ConfigError, ConfigLoader, ProviderKind};

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        [ai]
        provider = "claude"
        model = "claude-sonnet-4-20250514"
        base_url = "https://api.anthropic.com"
        api_key_env = "ANTHROPIC_API_KEY"

        [supervisor]
        name = "desk"
        system_prompt = "You run the MLOps desk."
        sub_agent_verbosity = true

        [[agents]]
        name = "mlflow-agent"
        system_prompt = "You know MLflow."
        info = "MLflow questions."

        [[agents]]
        name = "notifier"
        system_prompt = "You send notifications."
        info = "Sends notifications."
        "#,
    );

    let loader = ConfigLoader::with_path(path.clone());
    assert_eq!(loader.find_config_file(), Some(path));
    let config = loader.load().unwrap();

    assert_eq!(config.ai.provider, ProviderKind::Claude);
    assert_eq!(config.supervisor.name, "desk");
    assert_eq!(config.agents.len(), 2);

    let lm = Model::new(Arc::new(ScriptedModel::default()));
    let supervisor = config.build_supervisor(&lm).unwrap();
    assert_eq!(supervisor.name(), "desk");
    assert_eq!(supervisor.registry().route_choices(), vec!["mlflow-agent", "notifier", "self"]);
    assert!(supervisor.registry().iter().all(|agent| agent.echo()));
}

#[test]
fn test_empty_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");
    let config = ConfigLoader::with_path(path).load().unwrap();
    assert_eq!(config.ai.api_key_env, "GOOGLEAI_API_KEY");
    assert_eq!(config.agents[0].name, "mlflow-agent");
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[supervisor\nname = ");
    let err = ConfigLoader::with_path(path.clone()).load().unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { path: ref p, .. } if *p == path));
}

#[test]
fn test_invalid_base_url_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[ai]\nbase_url = \"not a url\"\n");
    let err = ConfigLoader::with_path(path).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
}

#[cfg(unix)]
#[test]
fn test_unreadable_path_is_read_error() {
    let dir = TempDir::new().unwrap();
    // A directory exists but cannot be read as a file.
    let err = ConfigLoader::with_path(dir.path().to_path_buf()).load().unwrap_err();
    assert!(matches!(err, ConfigError::ReadError { .. }));
}
