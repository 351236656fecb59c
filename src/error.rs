use thiserror::Error;

pub type InsightResult<T> = Result<T, InsightError>;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl InsightError {
    pub fn provider<T: Into<String>>(msg: T) -> Self {
        InsightError::Provider(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        InsightError::Config(msg.into())
    }

    pub fn tool<T: Into<String>>(msg: T) -> Self {
        InsightError::Tool(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        InsightError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        InsightError::InvalidInput(msg.into())
    }
}
