// Configuration: defaults, then an optional TOML file, then environment variables
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{InsightError, InsightResult};
use crate::providers::Provider;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub backend: Backend,
    pub default_provider: Provider,
    pub fallback_providers: Vec<Provider>,
    pub providers: ProvidersConfig,
    pub intent: IntentConfig,
    pub reasoning: ReasoningConfig,
    pub insight: InsightApiConfig,
    pub nebula: NebulaConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
}

/// Where blockchain answers come from: Insight data tools, or Nebula's `chat` tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Insight,
    Nebula,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Insight => write!(f, "insight"),
            Backend::Nebula => write!(f, "nebula"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insight" => Ok(Backend::Insight),
            "nebula" => Ok(Backend::Nebula),
            _ => Err(InsightError::invalid_input(format!("Unknown backend: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: ProviderConfig,
    pub claude: ProviderConfig,
    pub openai: ProviderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub provider: Provider,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on LLM round trips for a single user message
    pub max_steps: usize,
    pub cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightApiConfig {
    pub base_url: String,
    pub chain_id: u64,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NebulaConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub num_results: u32,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Insight,
            default_provider: Provider::Gemini,
            fallback_providers: vec![Provider::OpenAI],
            providers: ProvidersConfig::default(),
            intent: IntentConfig::default(),
            reasoning: ReasoningConfig::default(),
            insight: InsightApiConfig::default(),
            nebula: NebulaConfig::default(),
            search: SearchConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini: ProviderConfig {
                model: Some("gemini-2.0-flash-exp".to_string()),
                ..Default::default()
            },
            claude: ProviderConfig {
                model: Some("claude-3-haiku-20240307".to_string()),
                ..Default::default()
            },
            openai: ProviderConfig {
                model: Some("gpt-4o-mini".to_string()),
                ..Default::default()
            },
        }
    }
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Claude,
            model: "claude-3-haiku-20240307".to_string(),
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 2048,
            max_steps: 10,
            cache: true,
        }
    }
}

impl Default for InsightApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://insight.thirdweb.com".to_string(),
            chain_id: 1,
            secret_key: None,
        }
    }
}

impl Default for NebulaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nebula-api.thirdweb.com".to_string(),
            secret_key: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exa.ai".to_string(),
            num_results: 3,
            api_key: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Gemini => &self.gemini,
            Provider::Claude => &self.claude,
            Provider::OpenAI => &self.openai,
        }
    }

    pub fn get_mut(&mut self, provider: Provider) -> &mut ProviderConfig {
        match provider {
            Provider::Gemini => &mut self.gemini,
            Provider::Claude => &mut self.claude,
            Provider::OpenAI => &mut self.openai,
        }
    }
}

impl InsightConfig {
    /// Overlay values from an environment lookup. Takes a closure so callers
    /// other than the process environment can feed values in.
    pub fn apply_env<F>(&mut self, lookup: F) -> InsightResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("THIRDWEB_SECRET_KEY") {
            self.insight.secret_key = Some(key.clone());
            self.nebula.secret_key = Some(key);
        }
        if let Some(url) = lookup("NEBULA_BASE_URL") {
            self.nebula.base_url = url;
        }
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.providers.gemini.api_key = Some(key);
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY").or_else(|| lookup("CLAUDE_API_KEY")) {
            self.providers.claude.api_key = Some(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(key);
        }
        if let Some(key) = lookup("EXA_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(chain) = lookup("INSIGHT_CHAIN_ID") {
            self.insight.chain_id = chain
                .trim()
                .parse()
                .map_err(|_| InsightError::config(format!("INSIGHT_CHAIN_ID is not a number: {}", chain)))?;
        }
        if let Some(provider) = lookup("INSIGHT_PROVIDER") {
            self.default_provider = provider.parse()?;
        }
        if let Some(backend) = lookup("INSIGHT_BACKEND") {
            self.backend = backend.parse()?;
        }
        Ok(())
    }

    pub fn model_for(&self, provider: Provider) -> Option<&str> {
        self.providers.get(provider).model.as_deref()
    }

    /// Presence of each third-party key, keyed by service name.
    pub fn api_key_status(&self) -> BTreeMap<String, bool> {
        let mut status = BTreeMap::new();
        status.insert("thirdweb".to_string(), self.insight.secret_key.is_some());
        status.insert("google".to_string(), self.providers.gemini.api_key.is_some());
        status.insert("anthropic".to_string(), self.providers.claude.api_key.is_some());
        status.insert("exa".to_string(), self.search.api_key.is_some());
        status.insert("openai".to_string(), self.providers.openai.api_key.is_some());
        status
    }
}

pub struct ConfigManager {
    path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self { path: None }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("insight").join("config.toml"))
    }

    /// The file this manager reads and writes.
    pub fn path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(Self::default_path)
    }

    /// Explicit paths must exist; the default location is optional.
    pub async fn load_config(&self) -> InsightResult<InsightConfig> {
        let mut config = match &self.path {
            Some(path) => Self::read_file(path).await?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read_file(&path).await?,
                _ => {
                    debug!("No config file found, using defaults");
                    InsightConfig::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub async fn read_file(path: &Path) -> InsightResult<InsightConfig> {
        info!("Loading configuration from {}", path.display());
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&raw)?)
    }

    pub async fn save_config(&self, config: &InsightConfig) -> InsightResult<()> {
        let path = self
            .path()
            .ok_or_else(|| InsightError::config("No configuration directory available"))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let rendered = toml::to_string_pretty(config)
            .map_err(|e| InsightError::config(format!("Failed to render config: {}", e)))?;
        tokio::fs::write(&path, rendered).await?;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
