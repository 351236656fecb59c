use std::collections::HashMap;

use insight::config::{Backend, ConfigManager, InsightConfig};
use insight::error::{InsightError, InsightResult};
use insight::providers::Provider;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| values.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = InsightConfig::default();

    assert_eq!(config.default_provider, Provider::Gemini);
    assert_eq!(config.fallback_providers, vec![Provider::OpenAI]);
    assert_eq!(config.intent.provider, Provider::Claude);
    assert_eq!(config.model_for(Provider::Gemini), Some("gemini-2.0-flash-exp"));
    assert_eq!(config.insight.chain_id, 1);
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.backend, Backend::Insight);
    assert_eq!(config.nebula.base_url, "https://nebula-api.thirdweb.com");
    assert!(config.api_key_status().values().all(|present| !present));
}

#[test]
fn test_environment_overlay() -> InsightResult<()> {
    let mut config = InsightConfig::default();
    config.apply_env(env(&[
        ("THIRDWEB_SECRET_KEY", "tw"),
        ("GOOGLE_API_KEY", "g"),
        ("CLAUDE_API_KEY", "c"),
        ("EXA_API_KEY", "e"),
        ("INSIGHT_CHAIN_ID", "137"),
        ("INSIGHT_PROVIDER", "anthropic"),
    ]))?;

    assert_eq!(config.insight.secret_key.as_deref(), Some("tw"));
    assert_eq!(config.providers.gemini.api_key.as_deref(), Some("g"));
    assert_eq!(config.providers.claude.api_key.as_deref(), Some("c"));
    assert_eq!(config.insight.chain_id, 137);
    assert_eq!(config.default_provider, Provider::Claude);

    let status = config.api_key_status();
    assert_eq!(status["thirdweb"], true);
    assert_eq!(status["exa"], true);
    assert_eq!(status["openai"], false);
    Ok(())
}

#[test]
fn test_nebula_environment() -> InsightResult<()> {
    let mut config = InsightConfig::default();
    config.apply_env(env(&[
        ("THIRDWEB_SECRET_KEY", "tw"),
        ("INSIGHT_BACKEND", "Nebula"),
        ("NEBULA_BASE_URL", "http://localhost:4000"),
    ]))?;

    assert_eq!(config.backend, Backend::Nebula);
    assert_eq!(config.nebula.secret_key.as_deref(), Some("tw"));
    assert_eq!(config.nebula.base_url, "http://localhost:4000");

    let result = config.apply_env(env(&[("INSIGHT_BACKEND", "etherscan")]));
    assert!(matches!(result, Err(InsightError::InvalidInput(_))));
    Ok(())
}

#[test]
fn test_invalid_chain_id() {
    let mut config = InsightConfig::default();
    let result = config.apply_env(env(&[("INSIGHT_CHAIN_ID", "mainnet")]));
    assert!(matches!(result, Err(InsightError::Config(_))));
}

#[tokio::test]
async fn test_save_and_load_file() -> InsightResult<()> {
    let path = std::env::temp_dir().join(format!("insight-{}.toml", uuid::Uuid::new_v4()));
    let manager = ConfigManager::with_path(&path);

    let mut config = InsightConfig::default();
    config.insight.chain_id = 10;
    config.reasoning.max_steps = 4;
    config.providers.openai.api_key = Some("sk-secret".to_string());
    manager.save_config(&config).await?;

    let written = tokio::fs::read_to_string(&path).await?;
    assert!(!written.contains("sk-secret"));

    let loaded = ConfigManager::read_file(&path).await?;
    assert_eq!(loaded.insight.chain_id, 10);
    assert_eq!(loaded.reasoning.max_steps, 4);
    assert_eq!(loaded.providers.openai.api_key, None);

    tokio::fs::remove_file(&path).await?;
    Ok(())
}

#[tokio::test]
async fn test_partial_file_keeps_defaults() -> InsightResult<()> {
    let path = std::env::temp_dir().join(format!("insight-{}.toml", uuid::Uuid::new_v4()));
    tokio::fs::write(
        &path,
        "backend = \"nebula\"\ndefault_provider = \"openai\"\n\n[server]\nport = 9100\n",
    )
    .await?;

    let loaded = ConfigManager::read_file(&path).await?;
    assert_eq!(loaded.backend, Backend::Nebula);
    assert_eq!(loaded.default_provider, Provider::OpenAI);
    assert_eq!(loaded.server.port, 9100);
    assert_eq!(loaded.server.host, "127.0.0.1");
    assert_eq!(loaded.search.num_results, 3);

    tokio::fs::remove_file(&path).await?;
    Ok(())
}

#[tokio::test]
async fn test_explicit_missing_file_is_an_error() {
    let manager = ConfigManager::with_path("/nonexistent/insight/config.toml");
    assert!(manager.load_config().await.is_err());
}
