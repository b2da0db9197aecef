use std::io::Write;

use quill_core::config::{AppConfig, CheckpointBackend};

fn load(toml_content: &str) -> AppConfig {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");
    AppConfig::load(tmp.path()).expect("load config")
}

#[test]
fn test_load_full_config_from_file() {
    let config = load(
        r#"
[agent]
max_steps = 12
workspace = "/tmp/quill-test"
system_prompt = "Write for engineers."

[model]
provider = "anthropic"
model_id = "claude-sonnet-4-20250514"
api_key = "sk-test-key"
max_tokens = 4096
temperature = 0.5

[model.retry]
max_retries = 2

[[fallback_models]]
model_id = "claude-haiku"

[checkpoint]
backend = "memory"

[fetch]
timeout_secs = 5
max_length = 1000
user_agent = "QuillTest/1"

[search]
api_key = "tvly-test"
max_results = 3
"#,
    );

    assert_eq!(config.agent.max_steps, 12);
    assert_eq!(config.agent.system_prompt.as_deref(), Some("Write for engineers."));
    assert_eq!(config.model.provider, "anthropic");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 4096);
    assert_eq!(config.model.retry.as_ref().unwrap().max_retries, 2);
    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, "anthropic");
    assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
    assert_eq!(config.fetch.max_length, 1000);
    assert_eq!(config.fetch.user_agent, "QuillTest/1");

    let search = config.search.expect("search present");
    assert_eq!(search.api_key, "tvly-test");
    assert_eq!(search.max_results, 3);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("QUILL_TEST_API_KEY", "expanded-key-value");

    let config = load(
        r#"
[model]
model_id = "test-model"
api_key = "${QUILL_TEST_API_KEY}"
"#,
    );
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("QUILL_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config = load(
        r#"
[model]
model_id = "claude-sonnet-4-20250514"
"#,
    );

    assert_eq!(config.agent.max_steps, 25);
    assert!(config.agent.system_prompt.is_none());
    assert_eq!(config.checkpoint.backend, CheckpointBackend::Sqlite);
    assert!(config.checkpoint_path().ends_with("checkpoints.db"));
    assert_eq!(config.fetch.timeout_secs, 30);
    assert_eq!(config.fetch.max_length, 30_000);
    assert!(config.search.is_none());
    assert!(config.fallback_models.is_empty());
}

#[test]
fn test_explicit_checkpoint_path_wins() {
    let config = load(
        r#"
[model]
model_id = "m"

[checkpoint]
path = "/tmp/quill-elsewhere/cp.db"
"#,
    );
    assert_eq!(
        config.checkpoint_path(),
        std::path::PathBuf::from("/tmp/quill-elsewhere/cp.db")
    );
}

#[test]
fn test_missing_file_is_reported() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/quill.toml")).unwrap_err();
    assert!(matches!(err, quill_core::QuillError::ConfigNotFound(_)));
}
